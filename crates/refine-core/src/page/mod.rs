//! Host page abstraction.
//!
//! The content context never touches a concrete document. Everything it needs
//! from the page (focus, text controls, document selection, editing) goes
//! through [`HostPage`], so capture and replacement can run against a real
//! browser binding or against [`MemoryPage`].
//!
//! All offsets are character offsets.

mod memory;

pub use memory::MemoryPage;

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Identifies an element (text control or text node) inside one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identifies a nested sub-document (frame) inside its parent document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub u64);

/// What currently holds focus in one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveElement {
    /// A plain text-entry control (input or textarea).
    TextControl(NodeId),
    /// A nested sub-document; focus continues inside it.
    Frame(FrameId),
    /// Anything else (body, editable region, button...).
    Other,
}

/// A contiguous span of text inside a single text node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(node: NodeId, start: usize, end: usize) -> Self {
        Self {
            node,
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn collapsed(node: NodeId, offset: usize) -> Self {
        Self::new(node, offset, offset)
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// The document surface the content context works against.
pub trait HostPage: Send {
    /// Origin of the page, e.g. `https://example.com` or `chrome://settings`.
    fn origin(&self) -> &str;

    fn active_element(&self) -> Option<ActiveElement>;

    fn frame(&self, id: FrameId) -> Option<&dyn HostPage>;

    fn frame_mut(&mut self, id: FrameId) -> Option<&mut dyn HostPage>;

    fn control_value(&self, id: NodeId) -> Option<String>;

    /// Selection offsets of a text control as `(start, end)`.
    fn control_selection(&self, id: NodeId) -> Option<(usize, usize)>;

    fn set_control_value(&mut self, id: NodeId, value: &str) -> Result<()>;

    fn set_control_selection(&mut self, id: NodeId, start: usize, end: usize) -> Result<()>;

    fn focus(&mut self, id: NodeId) -> Result<()>;

    /// Fires the change notification host-page listeners observe after an edit.
    fn dispatch_change(&mut self, id: NodeId);

    /// Ranges of the document-level text selection, in order.
    fn document_selection(&self) -> Vec<TextRange>;

    fn set_document_selection(&mut self, range: &TextRange) -> Result<()>;

    fn range_text(&self, range: &TextRange) -> Option<String>;

    /// Deletes the range's contents, inserts `text` as plain text, and returns
    /// the collapsed range just after the insertion.
    fn replace_range(&mut self, range: &TextRange, text: &str) -> Result<TextRange>;

    fn is_connected(&self, id: NodeId) -> bool;

    /// Counter bumped on every structural mutation (node insertion/removal).
    fn mutation_epoch(&self) -> u64;
}

/// Path from the top-level document down to the document owning an anchor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPath(pub Vec<FrameId>);

impl DocumentPath {
    pub fn resolve<'a>(&self, mut page: &'a dyn HostPage) -> Option<&'a dyn HostPage> {
        for id in &self.0 {
            page = page.frame(*id)?;
        }
        Some(page)
    }

    pub fn resolve_mut<'a>(&self, mut page: &'a mut dyn HostPage) -> Option<&'a mut dyn HostPage> {
        for id in &self.0 {
            page = page.frame_mut(*id)?;
        }
        Some(page)
    }
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Characters `[start, end)` of `text`, clamped to its length.
pub(crate) fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}

/// Replaces characters `[start, end)` of `text` with `insert`.
pub(crate) fn splice_chars(text: &str, start: usize, end: usize, insert: &str) -> String {
    let len = char_len(text);
    let start = start.min(len);
    let end = end.clamp(start, len);
    let mut out: String = text.chars().take(start).collect();
    out.push_str(insert);
    out.extend(text.chars().skip(end));
    out
}
