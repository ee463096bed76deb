use super::{Anchor, SelectionInfo, SelectionKind};
use crate::page::{ActiveElement, DocumentPath, HostPage, NodeId, TextRange, char_slice};

/// Reads the active selection without touching the page.
///
/// Focus is followed through nested frames. A focused text control wins; a
/// collapsed control selection falls through to the document selection of
/// the same document. Offsets are narrowed to the trimmed text so that
/// replacing with the captured text is a no-op.
pub fn capture(page: &dyn HostPage) -> SelectionInfo {
    let mut path = DocumentPath::default();
    let mut document = page;

    loop {
        match document.active_element() {
            Some(ActiveElement::Frame(id)) => match document.frame(id) {
                Some(child) => {
                    path.0.push(id);
                    document = child;
                }
                None => break,
            },
            Some(ActiveElement::TextControl(id)) => {
                if let Some(info) = capture_control(document, &path, id) {
                    return info;
                }
                break;
            }
            Some(ActiveElement::Other) | None => break,
        }
    }

    capture_document_range(document, &path).unwrap_or_else(SelectionInfo::none)
}

fn capture_control(
    document: &dyn HostPage,
    path: &DocumentPath,
    control: NodeId,
) -> Option<SelectionInfo> {
    let value = document.control_value(control)?;
    let (start, end) = document.control_selection(control)?;
    if start == end {
        return None;
    }

    let raw = char_slice(&value, start, end);
    let (lead, trimmed) = trim_with_offset(&raw);
    let trimmed_len = trimmed.chars().count();
    let (start, end) = if trimmed.is_empty() {
        (start, end)
    } else {
        (start + lead, start + lead + trimmed_len)
    };

    let anchor = Anchor::Input {
        path: path.clone(),
        control,
        start,
        end,
    };
    Some(SelectionInfo::from_anchor(
        SelectionKind::Input,
        trimmed,
        anchor,
        start != end,
    ))
}

fn capture_document_range(document: &dyn HostPage, path: &DocumentPath) -> Option<SelectionInfo> {
    let range = document.document_selection().into_iter().next()?;
    let raw = document.range_text(&range)?;
    let (lead, trimmed) = trim_with_offset(&raw);
    if trimmed.is_empty() {
        return None;
    }

    let start = range.start + lead;
    let cloned = TextRange::new(range.node, start, start + trimmed.chars().count());
    let anchor = Anchor::Range {
        path: path.clone(),
        range: cloned,
    };
    Some(SelectionInfo::from_anchor(
        SelectionKind::Range,
        trimmed,
        anchor,
        true,
    ))
}

/// Trims `raw` and returns the number of leading characters removed.
fn trim_with_offset(raw: &str) -> (usize, String) {
    let lead = raw.chars().take_while(|c| c.is_whitespace()).count();
    (lead, raw.trim().to_string())
}
