//! Replacement and undo engine.
//!
//! Writes an accepted rewrite back at the captured anchor. Large replacements
//! are gated behind explicit confirmation, and every applied replacement
//! records the prior anchor in a bounded [`UndoStack`].

use crate::error::{RefineError, Result};
use crate::page::{HostPage, TextRange, char_len, splice_chars};
use crate::selection::{Anchor, SelectionInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of undo entries kept per session.
pub const UNDO_CAPACITY: usize = 10;

/// Snapshot needed to restore the selection as it was before a replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoEntry {
    pub prior_anchor: Anchor,
    pub timestamp: DateTime<Utc>,
}

/// Bounded LIFO of undo entries; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct UndoStack {
    entries: VecDeque<UndoEntry>,
    capacity: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::with_capacity(UNDO_CAPACITY)
    }
}

impl UndoStack {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: UndoEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &UndoEntry> {
        self.entries.iter()
    }
}

/// Details shown to the user before a large replacement is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    pub original_len: usize,
    pub new_len: usize,
    /// Start of the new text, truncated with an ellipsis.
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Applied,
    NeedsConfirmation(ConfirmationRequest),
}

impl ReplaceOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, ReplaceOutcome::Applied)
    }
}

/// Applies replacements for one session and owns its undo history.
#[derive(Debug, Clone)]
pub struct Replacer {
    threshold: usize,
    preview_chars: usize,
    undo: UndoStack,
}

impl Replacer {
    pub fn new(threshold: usize, preview_chars: usize) -> Self {
        Self {
            threshold,
            preview_chars,
            undo: UndoStack::default(),
        }
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    /// Writes `text` at the selection's anchor.
    ///
    /// Returns `NeedsConfirmation` without touching the page when `text` is
    /// above the threshold and confirmation was not skipped.
    pub fn replace(
        &mut self,
        page: &mut dyn HostPage,
        selection: &SelectionInfo,
        text: &str,
        skip_confirmation: bool,
    ) -> Result<ReplaceOutcome> {
        let new_len = char_len(text);
        if new_len > self.threshold && !skip_confirmation {
            return Ok(ReplaceOutcome::NeedsConfirmation(ConfirmationRequest {
                original_len: selection.char_count(),
                new_len,
                preview: preview(text, self.preview_chars),
            }));
        }

        let anchor = selection
            .anchor
            .as_ref()
            .ok_or_else(|| RefineError::invalid_state("selection has no anchor"))?;
        if !anchor.is_attached(page) {
            return Err(RefineError::dom(
                "the selected text is no longer part of the page",
            ));
        }

        self.undo.push(UndoEntry {
            prior_anchor: anchor.clone(),
            timestamp: Utc::now(),
        });
        if let Err(err) = apply(page, anchor, text) {
            self.undo.pop();
            return Err(err);
        }
        tracing::debug!(
            "[Replace] Applied {} chars (undo depth {})",
            new_len,
            self.undo.len()
        );
        Ok(ReplaceOutcome::Applied)
    }

    /// Restores the selection recorded by the most recent replacement.
    ///
    /// Returns `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, page: &mut dyn HostPage) -> Result<bool> {
        let Some(entry) = self.undo.pop() else {
            return Ok(false);
        };
        restore(page, &entry.prior_anchor)?;
        Ok(true)
    }
}

fn apply(page: &mut dyn HostPage, anchor: &Anchor, text: &str) -> Result<()> {
    let document = anchor
        .path()
        .resolve_mut(page)
        .ok_or_else(|| RefineError::dom("frame containing the selection is gone"))?;

    match anchor {
        Anchor::Input {
            control, start, end, ..
        } => {
            let current = document
                .control_value(*control)
                .ok_or_else(|| RefineError::dom("text control is gone"))?;
            let len = char_len(&current);
            let start = (*start).min(len);
            let end = (*end).clamp(start, len);
            let updated = splice_chars(&current, start, end, text);
            document.set_control_value(*control, &updated)?;
            let caret = start + char_len(text);
            document.set_control_selection(*control, caret, caret)?;
            document.dispatch_change(*control);
            Ok(())
        }
        Anchor::Range { range, .. } => {
            if !document.is_connected(range.node) {
                return Err(RefineError::dom("range is no longer attached"));
            }
            let end = document.replace_range(range, text)?;
            document.set_document_selection(&end)
        }
    }
}

fn restore(page: &mut dyn HostPage, anchor: &Anchor) -> Result<()> {
    let document = anchor
        .path()
        .resolve_mut(page)
        .ok_or_else(|| RefineError::dom("frame containing the selection is gone"))?;

    match anchor {
        Anchor::Input {
            control, start, end, ..
        } => {
            if !document.is_connected(*control) {
                return Err(RefineError::dom("text control is no longer attached"));
            }
            document.focus(*control)?;
            document.set_control_selection(*control, *start, *end)
        }
        Anchor::Range { range, .. } => {
            if !document.is_connected(range.node) {
                return Err(RefineError::dom("range is no longer attached"));
            }
            document.set_document_selection(&TextRange::new(range.node, range.start, range.end))
        }
    }
}

fn preview(text: &str, limit: usize) -> String {
    if char_len(text) <= limit {
        return text.to_string();
    }
    let mut head: String = text.chars().take(limit).collect();
    head.push('…');
    head
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MemoryPage;
    use crate::selection::capture;

    fn input_page(value: &str, start: usize, end: usize) -> (MemoryPage, crate::page::NodeId) {
        let mut page = MemoryPage::new("https://example.com");
        let input = page.add_text_control(value);
        page.select_in_control(input, start, end);
        (page, input)
    }

    #[test]
    fn test_replace_input_splices_and_moves_caret() {
        let (mut page, input) = input_page("please fix my code now", 7, 18);
        let selection = capture(&page);
        let mut replacer = Replacer::new(1000, 120);

        let outcome = replacer
            .replace(&mut page, &selection, "Please fix my code, including tests.", false)
            .unwrap();

        assert!(outcome.applied());
        assert_eq!(
            page.control_value(input).unwrap(),
            "please Please fix my code, including tests. now"
        );
        assert_eq!(page.control_selection(input), Some((43, 43)));
        assert_eq!(page.change_events(), &[input]);
        assert_eq!(replacer.undo_stack().len(), 1);
    }

    #[test]
    fn test_replace_with_captured_text_is_identity() {
        for (value, start, end) in [
            ("fix my code", 0, 11),
            ("  padded  selection ", 0, 20),
            ("héllo wörld", 2, 9),
            ("x", 0, 1),
        ] {
            let (mut page, input) = input_page(value, start, end);
            let selection = capture(&page);
            assert!(selection.is_valid);
            let text = selection.text.clone();

            Replacer::new(1000, 120)
                .replace(&mut page, &selection, &text, false)
                .unwrap();

            assert_eq!(page.control_value(input).unwrap(), value);
        }
    }

    #[test]
    fn test_large_replacement_requires_confirmation() {
        let (mut page, input) = input_page("short", 0, 5);
        let selection = capture(&page);
        let mut replacer = Replacer::new(1000, 10);
        let long = "y".repeat(1001);

        let outcome = replacer.replace(&mut page, &selection, &long, false).unwrap();

        match outcome {
            ReplaceOutcome::NeedsConfirmation(request) => {
                assert_eq!(request.original_len, 5);
                assert_eq!(request.new_len, 1001);
                assert_eq!(request.preview, format!("{}…", "y".repeat(10)));
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
        assert_eq!(page.control_value(input).unwrap(), "short");
        assert!(page.change_events().is_empty());
        assert!(replacer.undo_stack().is_empty());

        let outcome = replacer.replace(&mut page, &selection, &long, true).unwrap();
        assert!(outcome.applied());
        assert_eq!(page.control_value(input).unwrap(), long);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let (mut page, _) = input_page("short", 0, 5);
        let selection = capture(&page);
        let outcome = Replacer::new(1000, 10)
            .replace(&mut page, &selection, &"z".repeat(1000), false)
            .unwrap();
        assert!(outcome.applied());
    }

    #[test]
    fn test_replace_range_and_collapse_selection() {
        let mut page = MemoryPage::new("https://example.com");
        let text = page.add_text("The quick brown fox");
        page.select_text(text, 4, 9);
        let selection = capture(&page);

        Replacer::new(1000, 120)
            .replace(&mut page, &selection, "slow", false)
            .unwrap();

        assert_eq!(page.text_content(text).unwrap(), "The slow brown fox");
        assert_eq!(page.document_selection(), vec![TextRange::collapsed(text, 8)]);
    }

    #[test]
    fn test_detached_range_fails_without_corruption() {
        let mut page = MemoryPage::new("https://example.com");
        let text = page.add_text("The quick brown fox");
        page.select_text(text, 4, 9);
        let selection = capture(&page);
        page.remove_node(text);
        let mut replacer = Replacer::new(1000, 120);

        let err = replacer
            .replace(&mut page, &selection, "slow", false)
            .unwrap_err();

        assert!(err.is_dom());
        assert!(replacer.undo_stack().is_empty());
        assert_eq!(page.text_content(text).unwrap(), "The quick brown fox");
    }

    #[test]
    fn test_undo_stack_is_bounded_fifo() {
        let mut stack = UndoStack::default();
        let node = crate::page::NodeId(1);
        for i in 0..25 {
            stack.push(UndoEntry {
                prior_anchor: Anchor::Range {
                    path: Default::default(),
                    range: TextRange::new(node, i, i + 1),
                },
                timestamp: Utc::now(),
            });
            assert!(stack.len() <= UNDO_CAPACITY);
        }
        assert_eq!(stack.len(), UNDO_CAPACITY);
        let oldest = stack.iter().next().unwrap();
        assert_eq!(
            oldest.prior_anchor,
            Anchor::Range {
                path: Default::default(),
                range: TextRange::new(node, 15, 16),
            }
        );
    }

    #[test]
    fn test_undo_restores_prior_selection() {
        let (mut page, input) = input_page("please fix my code now", 7, 18);
        let selection = capture(&page);
        let mut replacer = Replacer::new(1000, 120);
        replacer
            .replace(&mut page, &selection, "repair it", false)
            .unwrap();
        page.focus_body();

        assert!(replacer.undo(&mut page).unwrap());

        assert_eq!(page.focused_node(), Some(input));
        assert_eq!(page.control_selection(input), Some((7, 18)));
        assert!(!replacer.undo(&mut page).unwrap());
    }

    #[test]
    fn test_undo_reselects_prior_range() {
        let mut page = MemoryPage::new("https://example.com");
        let text = page.add_text("The quick brown fox");
        page.select_text(text, 4, 9);
        let selection = capture(&page);
        let mut replacer = Replacer::new(1000, 120);
        replacer
            .replace(&mut page, &selection, "slow", false)
            .unwrap();
        page.clear_selection();

        assert!(replacer.undo(&mut page).unwrap());

        assert_eq!(page.document_selection(), vec![TextRange::new(text, 4, 9)]);
        assert!(replacer.undo_stack().is_empty());
    }

    #[test]
    fn test_range_undo_reports_removed_node() {
        let mut page = MemoryPage::new("https://example.com");
        let text = page.add_text("The quick brown fox");
        page.select_text(text, 4, 9);
        let selection = capture(&page);
        let mut replacer = Replacer::new(1000, 120);
        replacer
            .replace(&mut page, &selection, "slow", false)
            .unwrap();
        page.remove_node(text);

        let err = replacer.undo(&mut page).unwrap_err();

        assert!(err.is_dom());
        assert!(page.document_selection().is_empty());
    }

    #[test]
    fn test_undo_reports_detached_anchor() {
        let (mut page, input) = input_page("some text", 0, 4);
        let selection = capture(&page);
        let mut replacer = Replacer::new(1000, 120);
        replacer.replace(&mut page, &selection, "more", false).unwrap();
        page.remove_node(input);

        let err = replacer.undo(&mut page).unwrap_err();

        assert!(err.is_dom());
        assert!(replacer.undo_stack().is_empty());
    }
}
