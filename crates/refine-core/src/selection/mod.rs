//! Selection capture.
//!
//! - `capture`: read-only snapshot of the active selection ([`SelectionInfo`])
//! - `origin`: restricted-origin policy checked before capture runs
//! - `watch`: staleness predicate for a captured anchor ([`AnchorWatch`])

mod capture;
mod origin;
mod watch;

pub use capture::capture;
pub use origin::is_restricted_origin;
pub use watch::AnchorWatch;

use crate::page::{DocumentPath, HostPage, NodeId, TextRange};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    Input,
    Range,
    None,
}

/// Where in the document a replacement should land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Anchor {
    /// Offsets inside a text-entry control.
    Input {
        path: DocumentPath,
        control: NodeId,
        start: usize,
        end: usize,
    },
    /// A cloned document range.
    Range { path: DocumentPath, range: TextRange },
}

impl Anchor {
    pub fn path(&self) -> &DocumentPath {
        match self {
            Anchor::Input { path, .. } | Anchor::Range { path, .. } => path,
        }
    }

    fn node(&self) -> NodeId {
        match self {
            Anchor::Input { control, .. } => *control,
            Anchor::Range { range, .. } => range.node,
        }
    }

    /// Whether the anchor's document and node are still part of the page.
    pub fn is_attached(&self, page: &dyn HostPage) -> bool {
        self.path()
            .resolve(page)
            .is_some_and(|document| document.is_connected(self.node()))
    }
}

/// Immutable snapshot of a user selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionInfo {
    pub kind: SelectionKind,
    /// Captured text, trimmed.
    pub text: String,
    pub anchor: Option<Anchor>,
    pub is_valid: bool,
    /// Set when the anchor was found detached after capture.
    #[serde(default)]
    pub stale: bool,
}

impl SelectionInfo {
    pub fn none() -> Self {
        Self {
            kind: SelectionKind::None,
            text: String::new(),
            anchor: None,
            is_valid: false,
            stale: false,
        }
    }

    pub(crate) fn from_anchor(
        kind: SelectionKind,
        text: String,
        anchor: Anchor,
        selected: bool,
    ) -> Self {
        let is_valid = selected && !text.is_empty();
        Self {
            kind,
            text,
            anchor: Some(anchor),
            is_valid,
            stale: false,
        }
    }

    /// Marks the selection unusable. The text is kept for diagnostics.
    pub fn invalidate(&mut self) {
        self.is_valid = false;
        self.stale = true;
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
