use super::{Anchor, SelectionInfo};
use crate::page::HostPage;

/// Staleness predicate for a captured anchor.
///
/// Remembers the page's mutation epoch at capture time. Only when the page has
/// mutated structurally since then is the anchor re-checked for attachment.
#[derive(Debug, Clone)]
pub struct AnchorWatch {
    anchor: Option<Anchor>,
    epoch: u64,
}

impl AnchorWatch {
    pub fn new(selection: &SelectionInfo, page: &dyn HostPage) -> Self {
        Self {
            anchor: selection.anchor.clone(),
            epoch: page.mutation_epoch(),
        }
    }

    /// True when the anchor is no longer attached to the document.
    pub fn is_stale(&self, page: &dyn HostPage) -> bool {
        let Some(anchor) = &self.anchor else {
            return false;
        };
        if page.mutation_epoch() == self.epoch {
            return false;
        }
        !anchor.is_attached(page)
    }

    /// Flags `selection` when its anchor went stale. Returns whether it did.
    pub fn check(&self, selection: &mut SelectionInfo, page: &dyn HostPage) -> bool {
        if selection.stale {
            return true;
        }
        if self.is_stale(page) {
            tracing::warn!(
                "[Selection] Anchor detached before use ({} chars kept for diagnostics)",
                selection.char_count()
            );
            selection.invalidate();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MemoryPage;
    use crate::selection::capture;

    #[test]
    fn test_unrelated_mutation_keeps_anchor_fresh() {
        let mut page = MemoryPage::new("https://example.com");
        let text = page.add_text("hello world");
        page.select_text(text, 0, 5);
        let mut info = capture(&page);
        let watch = AnchorWatch::new(&info, &page);

        page.add_text("another paragraph");

        assert!(!watch.is_stale(&page));
        assert!(!watch.check(&mut info, &page));
        assert!(info.is_valid);
    }

    #[test]
    fn test_removed_anchor_is_flagged_not_fixed() {
        let mut page = MemoryPage::new("https://example.com");
        let input = page.add_text_control("some text");
        page.select_in_control(input, 0, 4);
        let mut info = capture(&page);
        let watch = AnchorWatch::new(&info, &page);

        page.remove_node(input);

        assert!(watch.check(&mut info, &page));
        assert!(!info.is_valid);
        assert!(info.stale);
        assert_eq!(info.text, "some");
    }
}
