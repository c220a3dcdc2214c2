//! An in-memory document the engine can render into.

use eddy_core::{Host, PropPatch, SVG_NAMESPACE, Value};

/// Handle to a node of a [`Document`].
///
/// Slots of released nodes are reused under a new generation, so a stale
/// handle never refers to a different node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// What a document node holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with its attributes in insertion order.
    Element {
        /// Tag name.
        tag: String,
        /// Namespace, `None` for HTML.
        namespace: Option<String>,
        /// Attributes, in the order they were first set.
        attributes: Vec<(String, String)>,
    },
    /// A text node.
    Text(String),
    /// Markup inserted verbatim.
    Raw(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// A change applied to the document, recorded for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// A node was created.
    Create(NodeId),
    /// An attribute was added or changed.
    SetAttribute {
        /// The element.
        node: NodeId,
        /// Attribute name.
        name: String,
        /// New value.
        value: String,
    },
    /// An attribute was removed.
    RemoveAttribute {
        /// The element.
        node: NodeId,
        /// Attribute name.
        name: String,
    },
    /// A text node changed.
    SetText(NodeId),
    /// A node was inserted or moved.
    Insert {
        /// New parent.
        parent: NodeId,
        /// The inserted node.
        child: NodeId,
    },
    /// A node was detached.
    Remove {
        /// Former parent.
        parent: NodeId,
        /// The detached node.
        child: NodeId,
    },
    /// A node was freed; its handle is stale from now on.
    Release(NodeId),
}

/// A tree of elements, text and raw markup.
///
/// Nodes the renderer no longer needs are released and their slots reused.
/// Mutations are only logged by a document created with
/// [`Document::recording`].
#[derive(Debug, Default)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    recording: bool,
    mutations: Vec<Mutation>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            recording: false,
            mutations: Vec::new(),
        }
    }

    /// Creates an empty document that logs every mutation.
    #[must_use]
    pub const fn recording() -> Self {
        let mut document = Self::new();
        document.recording = true;
        document
    }

    /// Starts or stops logging mutations. Stopping drops the current log.
    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
        if !recording {
            self.mutations = Vec::new();
        }
    }

    /// Whether mutations are being logged.
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording
    }

    fn record(&mut self, mutation: Mutation) {
        if self.recording {
            self.mutations.push(mutation);
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let node = Node {
            kind,
            parent: None,
            children: Vec::new(),
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        };
        self.live += 1;
        self.record(Mutation::Create(id));
        id
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Creates a detached element to render into.
    pub fn create_container(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_owned(),
            namespace: None,
            attributes: Vec::new(),
        })
    }

    /// Number of live nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Whether the document has no live nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Whether `node` refers to a live node.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    /// The node's contents, `None` once it has been released.
    #[must_use]
    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.node(node).map(|node| &node.kind)
    }

    /// Tag name of an element node.
    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Namespace of an element node.
    #[must_use]
    pub fn namespace(&self, node: NodeId) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Element { namespace, .. } => namespace.as_deref(),
            _ => None,
        }
    }

    /// Value of an attribute.
    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes(node)
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    /// All attributes of an element node.
    #[must_use]
    pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
        match self.kind(node) {
            Some(NodeKind::Element { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    /// Contents of a text or raw node.
    #[must_use]
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Text(text) | NodeKind::Raw(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    /// Children of a node, in order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map_or(&[], |node| &node.children)
    }

    /// Parent of a node, if attached.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    /// Drains the recorded mutations.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        core::mem::take(&mut self.mutations)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: String) {
        let Some(NodeKind::Element { attributes, .. }) = self.node_mut(node).map(|node| &mut node.kind)
        else {
            return;
        };
        match attributes.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, existing)) => existing.clone_from(&value),
            None => attributes.push((name.to_owned(), value.clone())),
        }
        self.record(Mutation::SetAttribute {
            node,
            name: name.to_owned(),
            value,
        });
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        let Some(NodeKind::Element { attributes, .. }) = self.node_mut(node).map(|node| &mut node.kind)
        else {
            return;
        };
        let before = attributes.len();
        attributes.retain(|(existing, _)| existing != name);
        if attributes.len() != before {
            self.record(Mutation::RemoveAttribute {
                node,
                name: name.to_owned(),
            });
        }
    }

    fn detach(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.node_mut(child)?.parent.take()?;
        if let Some(parent) = self.node_mut(parent) {
            parent.children.retain(|existing| *existing != child);
        }
        Some(parent)
    }
}

/// Maps a property name to the attribute it renders as.
fn attribute_name(name: &str) -> &str {
    match name {
        "className" => "class",
        "htmlFor" => "for",
        other => other,
    }
}

/// Renders a property value as an attribute value; `None` removes it.
fn attribute_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) | Value::Shared(_) => None,
        Value::Bool(true) => Some(String::new()),
        Value::Int(value) => Some(value.to_string()),
        Value::Float(value) => Some(value.to_string()),
        Value::Str(value) => Some(value.to_string()),
    }
}

impl Host for Document {
    type Node = NodeId;

    fn create_element(&mut self, tag: &str, scope: Option<&str>) -> NodeId {
        let namespace = if tag == "svg" {
            Some(SVG_NAMESPACE)
        } else {
            scope
        };
        self.push(NodeKind::Element {
            tag: tag.to_owned(),
            namespace: namespace.map(ToOwned::to_owned),
            attributes: Vec::new(),
        })
    }

    fn patch(&mut self, node: &NodeId, tag: &str, patches: &[PropPatch<'_>]) {
        for patch in patches {
            if patch.name == "innerHTML" {
                tracing::warn!(tag, "innerHTML is not supported, use raw markup instead");
                continue;
            }
            let name = attribute_name(patch.name);
            match attribute_value(patch.new) {
                Some(value) => self.set_attribute(*node, name, value),
                None => self.remove_attribute(*node, name),
            }
        }
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_owned()))
    }

    fn update_text(&mut self, node: &NodeId, text: &str) {
        if let Some(NodeKind::Text(existing)) = self.node_mut(*node).map(|node| &mut node.kind) {
            text.clone_into(existing);
            self.record(Mutation::SetText(*node));
        }
    }

    fn create_raw(&mut self, markup: &str, _scope: Option<&str>) -> NodeId {
        self.push(NodeKind::Raw(markup.to_owned()))
    }

    fn insert_before(&mut self, parent: &NodeId, child: &NodeId, reference: Option<&NodeId>) {
        if !self.contains(*parent) || !self.contains(*child) {
            tracing::debug!(?parent, ?child, "insert with a released node ignored");
            return;
        }
        self.detach(*child);
        if let Some(node) = self.node_mut(*parent) {
            let siblings = &mut node.children;
            let at = reference
                .and_then(|reference| siblings.iter().position(|node| node == reference))
                .unwrap_or(siblings.len());
            siblings.insert(at, *child);
        }
        if let Some(node) = self.node_mut(*child) {
            node.parent = Some(*parent);
        }
        self.record(Mutation::Insert {
            parent: *parent,
            child: *child,
        });
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) {
        if self.parent(*child) != Some(*parent) {
            tracing::debug!(?parent, ?child, "node is not a child of this parent");
            return;
        }
        self.detach(*child);
        self.record(Mutation::Remove {
            parent: *parent,
            child: *child,
        });
    }

    fn release(&mut self, node: &NodeId) {
        let Some(removed) = self
            .slots
            .get_mut(node.index as usize)
            .filter(|slot| slot.generation == node.generation)
            .and_then(|slot| slot.node.take())
        else {
            return;
        };
        if let Some(parent) = removed.parent {
            if let Some(parent_node) = self.node_mut(parent) {
                parent_node.children.retain(|existing| existing != node);
            }
            self.record(Mutation::Remove {
                parent,
                child: *node,
            });
        }
        for child in removed.children {
            if let Some(child) = self.node_mut(child) {
                child.parent = None;
            }
        }
        self.free.push(node.index);
        self.live -= 1;
        self.record(Mutation::Release(*node));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_core::Props;
    use tracing_test::traced_test;

    #[test]
    fn insert_before_moves_nodes() {
        let mut document = Document::new();
        let root = document.create_container("div");
        let a = document.create_text("a");
        let b = document.create_text("b");
        document.insert_before(&root, &a, None);
        document.insert_before(&root, &b, None);
        document.insert_before(&root, &b, Some(&a));
        assert_eq!(document.children(root), [b, a]);
        assert_eq!(document.parent(a), Some(root));
    }

    #[test]
    fn props_map_to_attributes() {
        let mut document = Document::new();
        let input = document.create_element("input", None);
        let props = Props::new()
            .with("className", "field")
            .with("disabled", true)
            .with("maxlength", 8)
            .with("hidden", false);
        document.patch(&input, "input", &props.diff(None));
        assert_eq!(
            document.attributes(input),
            [
                ("class".to_owned(), "field".to_owned()),
                ("disabled".to_owned(), String::new()),
                ("maxlength".to_owned(), "8".to_owned()),
            ]
        );

        let next = Props::new().with("className", "field wide");
        document.patch(&input, "input", &next.diff(Some(&props)));
        assert_eq!(document.attribute(input, "class"), Some("field wide"));
        assert_eq!(document.attribute(input, "disabled"), None);
    }

    #[test]
    fn removing_a_foreign_child_is_ignored() {
        let mut document = Document::recording();
        let first = document.create_container("div");
        let second = document.create_container("div");
        let text = document.create_text("x");
        document.insert_before(&first, &text, None);
        document.take_mutations();
        document.remove_child(&second, &text);
        assert_eq!(document.children(first), [text]);
        assert!(document.take_mutations().is_empty());
    }

    #[test]
    fn mutations_are_only_logged_when_recording() {
        let mut document = Document::new();
        let root = document.create_container("div");
        let text = document.create_text("x");
        document.insert_before(&root, &text, None);
        assert!(document.take_mutations().is_empty());

        document.set_recording(true);
        document.update_text(&text, "y");
        assert_eq!(document.take_mutations(), [Mutation::SetText(text)]);

        document.update_text(&text, "z");
        document.set_recording(false);
        assert!(!document.is_recording());
        assert!(document.take_mutations().is_empty());
    }

    #[test]
    fn released_slots_are_reused_under_a_new_handle() {
        let mut document = Document::new();
        let root = document.create_container("ul");
        let item = document.create_element("li", None);
        let label = document.create_text("one");
        document.insert_before(&root, &item, None);
        document.insert_before(&item, &label, None);

        document.release(&item);
        assert!(document.children(root).is_empty());
        assert_eq!(document.parent(label), None);
        assert!(!document.contains(item));
        assert_eq!(document.len(), 2);

        let next = document.create_element("li", None);
        assert_ne!(next, item);
        assert_eq!(document.len(), 3);
        assert_eq!(document.tag(item), None);
        document.remove_child(&root, &item);
        document.insert_before(&root, &item, None);
        assert!(document.children(root).is_empty());
    }

    #[test]
    #[traced_test]
    fn inner_html_is_skipped_with_a_warning() {
        let mut document = Document::new();
        let div = document.create_element("div", None);
        let props = Props::new().with("innerHTML", "<b>x</b>").with("id", "box");
        document.patch(&div, "div", &props.diff(None));
        assert_eq!(document.attributes(div), [("id".to_owned(), "box".to_owned())]);
        assert!(logs_contain("innerHTML is not supported"));
    }
}
