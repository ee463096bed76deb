use super::{
    ActiveElement, FrameId, HostPage, NodeId, TextRange, char_len, char_slice, splice_chars,
};
use crate::error::{RefineError, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum NodeKind {
    TextControl {
        value: String,
        selection: (usize, usize),
    },
    Text {
        content: String,
    },
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Node(NodeId),
    Frame(FrameId),
    Body,
}

/// In-memory document implementing [`HostPage`].
///
/// Holds text controls, text nodes and nested frames. Used by tests and by the
/// headless CLI.
#[derive(Debug, Clone)]
pub struct MemoryPage {
    origin: String,
    nodes: BTreeMap<NodeId, Node>,
    frames: BTreeMap<FrameId, MemoryPage>,
    focus: Option<Focus>,
    selection: Vec<TextRange>,
    epoch: u64,
    next_id: u64,
    change_events: Vec<NodeId>,
}

impl MemoryPage {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            nodes: BTreeMap::new(),
            frames: BTreeMap::new(),
            focus: None,
            selection: Vec::new(),
            epoch: 0,
            next_id: 1,
            change_events: Vec::new(),
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.allocate());
        self.nodes.insert(
            id,
            Node {
                kind,
                connected: true,
            },
        );
        self.epoch += 1;
        id
    }

    /// Adds a text-entry control with the caret at the end of `value`.
    pub fn add_text_control(&mut self, value: impl Into<String>) -> NodeId {
        let value = value.into();
        let end = char_len(&value);
        self.insert_node(NodeKind::TextControl {
            value,
            selection: (end, end),
        })
    }

    pub fn add_text(&mut self, content: impl Into<String>) -> NodeId {
        self.insert_node(NodeKind::Text {
            content: content.into(),
        })
    }

    pub fn add_frame(&mut self, page: MemoryPage) -> FrameId {
        let id = FrameId(self.allocate());
        self.frames.insert(id, page);
        self.epoch += 1;
        id
    }

    pub fn frame_page_mut(&mut self, id: FrameId) -> Option<&mut MemoryPage> {
        self.frames.get_mut(&id)
    }

    /// Detaches a node from the document, as a script removing it would.
    pub fn remove_node(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.connected = false;
            self.epoch += 1;
        }
        if self.focus == Some(Focus::Node(id)) {
            self.focus = Some(Focus::Body);
        }
        self.selection.retain(|range| range.node != id);
    }

    pub fn focus_frame(&mut self, id: FrameId) {
        self.focus = Some(Focus::Frame(id));
    }

    pub fn focus_body(&mut self) {
        self.focus = Some(Focus::Body);
    }

    /// Focuses a control and selects `[start, end)` inside it.
    pub fn select_in_control(&mut self, id: NodeId, start: usize, end: usize) {
        self.focus = Some(Focus::Node(id));
        let _ = self.set_control_selection(id, start, end);
    }

    /// Moves focus to the body and selects `[start, end)` of a text node.
    pub fn select_text(&mut self, id: NodeId, start: usize, end: usize) {
        self.focus = Some(Focus::Body);
        self.selection = vec![TextRange::new(id, start, end)];
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn text_content(&self, id: NodeId) -> Option<String> {
        match &self.nodes.get(&id)?.kind {
            NodeKind::Text { content } => Some(content.clone()),
            NodeKind::TextControl { .. } => None,
        }
    }

    /// Nodes that received a change notification, oldest first.
    pub fn change_events(&self) -> &[NodeId] {
        &self.change_events
    }

    pub fn focused_node(&self) -> Option<NodeId> {
        match self.focus {
            Some(Focus::Node(id)) => Some(id),
            _ => None,
        }
    }

    fn connected_node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .filter(|node| node.connected)
            .ok_or_else(|| RefineError::dom(format!("node {} is not attached", id.0)))
    }

    fn connected_node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .filter(|node| node.connected)
            .ok_or_else(|| RefineError::dom(format!("node {} is not attached", id.0)))
    }
}

impl HostPage for MemoryPage {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn active_element(&self) -> Option<ActiveElement> {
        match self.focus? {
            Focus::Node(id) => match self.nodes.get(&id) {
                Some(Node {
                    kind: NodeKind::TextControl { .. },
                    connected: true,
                }) => Some(ActiveElement::TextControl(id)),
                _ => Some(ActiveElement::Other),
            },
            Focus::Frame(id) => Some(ActiveElement::Frame(id)),
            Focus::Body => Some(ActiveElement::Other),
        }
    }

    fn frame(&self, id: FrameId) -> Option<&dyn HostPage> {
        self.frames.get(&id).map(|page| page as &dyn HostPage)
    }

    fn frame_mut(&mut self, id: FrameId) -> Option<&mut dyn HostPage> {
        self.frames
            .get_mut(&id)
            .map(|page| page as &mut dyn HostPage)
    }

    fn control_value(&self, id: NodeId) -> Option<String> {
        match &self.nodes.get(&id)?.kind {
            NodeKind::TextControl { value, .. } => Some(value.clone()),
            NodeKind::Text { .. } => None,
        }
    }

    fn control_selection(&self, id: NodeId) -> Option<(usize, usize)> {
        match &self.nodes.get(&id)?.kind {
            NodeKind::TextControl { selection, .. } => Some(*selection),
            NodeKind::Text { .. } => None,
        }
    }

    fn set_control_value(&mut self, id: NodeId, new_value: &str) -> Result<()> {
        match &mut self.connected_node_mut(id)?.kind {
            NodeKind::TextControl { value, selection } => {
                *value = new_value.to_string();
                let len = char_len(new_value);
                *selection = (selection.0.min(len), selection.1.min(len));
                Ok(())
            }
            NodeKind::Text { .. } => Err(RefineError::dom("node is not a text control")),
        }
    }

    fn set_control_selection(&mut self, id: NodeId, start: usize, end: usize) -> Result<()> {
        match &mut self.connected_node_mut(id)?.kind {
            NodeKind::TextControl { value, selection } => {
                let len = char_len(value);
                let (start, end) = (start.min(end), start.max(end));
                *selection = (start.min(len), end.min(len));
                Ok(())
            }
            NodeKind::Text { .. } => Err(RefineError::dom("node is not a text control")),
        }
    }

    fn focus(&mut self, id: NodeId) -> Result<()> {
        self.connected_node(id)?;
        self.focus = Some(Focus::Node(id));
        Ok(())
    }

    fn dispatch_change(&mut self, id: NodeId) {
        self.change_events.push(id);
    }

    fn document_selection(&self) -> Vec<TextRange> {
        self.selection.clone()
    }

    fn set_document_selection(&mut self, range: &TextRange) -> Result<()> {
        let len = match &self.connected_node(range.node)?.kind {
            NodeKind::Text { content } => char_len(content),
            NodeKind::TextControl { .. } => {
                return Err(RefineError::dom("range must target a text node"));
            }
        };
        self.selection = vec![TextRange::new(
            range.node,
            range.start.min(len),
            range.end.min(len),
        )];
        Ok(())
    }

    fn range_text(&self, range: &TextRange) -> Option<String> {
        match &self.nodes.get(&range.node).filter(|node| node.connected)?.kind {
            NodeKind::Text { content } => Some(char_slice(content, range.start, range.end)),
            NodeKind::TextControl { .. } => None,
        }
    }

    fn replace_range(&mut self, range: &TextRange, text: &str) -> Result<TextRange> {
        match &mut self.connected_node_mut(range.node)?.kind {
            NodeKind::Text { content } => {
                *content = splice_chars(content, range.start, range.end, text);
                let offset = range.start.min(char_len(content)) + char_len(text);
                Ok(TextRange::collapsed(range.node, offset.min(char_len(content))))
            }
            NodeKind::TextControl { .. } => Err(RefineError::dom("range must target a text node")),
        }
    }

    fn is_connected(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|node| node.connected)
    }

    fn mutation_epoch(&self) -> u64 {
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_selection_is_clamped() {
        let mut page = MemoryPage::new("https://example.com");
        let input = page.add_text_control("hello");
        page.select_in_control(input, 3, 99);
        assert_eq!(page.control_selection(input), Some((3, 5)));
        assert_eq!(page.active_element(), Some(ActiveElement::TextControl(input)));
    }

    #[test]
    fn test_remove_node_bumps_epoch_and_detaches() {
        let mut page = MemoryPage::new("https://example.com");
        let text = page.add_text("paragraph");
        page.select_text(text, 0, 4);
        let before = page.mutation_epoch();

        page.remove_node(text);

        assert!(page.mutation_epoch() > before);
        assert!(!page.is_connected(text));
        assert!(page.document_selection().is_empty());
        assert!(page.replace_range(&TextRange::new(text, 0, 1), "x").is_err());
    }

    #[test]
    fn test_replace_range_returns_collapsed_end() {
        let mut page = MemoryPage::new("https://example.com");
        let text = page.add_text("one two three");
        let end = page
            .replace_range(&TextRange::new(text, 4, 7), "2")
            .unwrap();
        assert_eq!(page.text_content(text).unwrap(), "one 2 three");
        assert_eq!(end, TextRange::collapsed(text, 5));
    }

    #[test]
    fn test_frames_are_reachable() {
        let mut inner = MemoryPage::new("https://example.com");
        let input = inner.add_text_control("inside");
        let mut page = MemoryPage::new("https://example.com");
        let frame = page.add_frame(inner);
        page.focus_frame(frame);

        assert_eq!(page.active_element(), Some(ActiveElement::Frame(frame)));
        let child = page.frame(frame).unwrap();
        assert_eq!(child.control_value(input).as_deref(), Some("inside"));
    }
}
