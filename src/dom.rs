//! In-memory element tree standing in for the host's live UI.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Child-list changes
//! are queued as [`MutationRecord`]s for every observer whose target is the
//! changed parent or one of its ancestors, and handed out in batches by
//! [`UiTree::take_records`].

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
struct Element {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Observation {
    target: NodeId,
    records: Vec<MutationRecord>,
}

#[derive(Debug)]
pub struct UiTree {
    nodes: Vec<Element>,
    root: NodeId,
    observers: BTreeMap<ObserverId, Observation>,
    next_observer: u64,
}

impl Default for UiTree {
    fn default() -> Self {
        Self::new()
    }
}

impl UiTree {
    pub fn new() -> Self {
        let root = Element {
            tag: "body".to_owned(),
            ..Element::default()
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            observers: BTreeMap::new(),
            next_observer: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> &Element {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Element {
        &mut self.nodes[id.0]
    }

    /// Create a detached element. It becomes visible to queries and observers
    /// once appended somewhere under the root.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Element {
            tag: tag.to_owned(),
            ..Element::default()
        });
        id
    }

    /// Create an element with `classes` and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, classes: &[&str]) -> NodeId {
        let id = self.create_element(tag);
        for class in classes {
            self.add_class(id, class);
        }
        self.append_child(parent, id);
        id
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.node(node).tag
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        let classes = &mut self.node_mut(node).classes;
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_owned());
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.node(node).classes.iter().any(|c| c == class)
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.node_mut(node).text = text.to_owned();
    }

    /// Own text followed by the text of every descendant, in document order.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut text = self.node(node).text.clone();
        for descendant in self.descendants(node) {
            text.push_str(&self.node(descendant).text);
        }
        text
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node).attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        self.node_mut(node)
            .attributes
            .insert(name.to_owned(), value.to_owned());
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Option<String> {
        self.node_mut(node).attributes.remove(name)
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<&str> {
        self.node(node).styles.get(property).map(String::as_str)
    }

    pub fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        self.node_mut(node)
            .styles
            .insert(property.to_owned(), value.to_owned());
    }

    pub fn remove_style(&mut self, node: NodeId, property: &str) -> Option<String> {
        self.node_mut(node).styles.remove(property)
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).parent;
        }
        false
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.node(child).parent.is_some() {
            self.remove(child);
        }
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
        self.record(MutationRecord {
            target: parent,
            added_nodes: vec![child],
            removed_nodes: Vec::new(),
        });
    }

    /// Detach `node` (and its subtree) from its parent. Detached nodes keep
    /// their ids and can be re-appended.
    pub fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.node(node).parent else {
            return;
        };
        self.node_mut(parent).children.retain(|&c| c != node);
        self.node_mut(node).parent = None;
        self.record(MutationRecord {
            target: parent,
            added_nodes: Vec::new(),
            removed_nodes: vec![node],
        });
    }

    /// Descendants of `node` in pre-order, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(node).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    pub fn find_first(&self, scope: NodeId, class: &str) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|&id| self.has_class(id, class))
    }

    pub fn find_all(&self, scope: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&id| self.has_class(id, class))
            .collect()
    }

    pub fn find_all_with_attribute(&self, scope: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&id| self.node(id).attributes.contains_key(name))
            .collect()
    }

    pub fn is_or_contains(&self, node: NodeId, class: &str) -> bool {
        self.has_class(node, class) || self.find_first(node, class).is_some()
    }

    /// Start collecting child-list mutations for `target` and its subtree.
    pub fn observe(&mut self, target: NodeId) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.insert(
            id,
            Observation {
                target,
                records: Vec::new(),
            },
        );
        id
    }

    /// Returns false if the observer was already gone.
    pub fn disconnect(&mut self, observer: ObserverId) -> bool {
        self.observers.remove(&observer).is_some()
    }

    pub fn is_observing(&self, observer: ObserverId) -> bool {
        self.observers.contains_key(&observer)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Drain the batch queued for `observer` since the last call.
    pub fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .get_mut(&observer)
            .map(|o| std::mem::take(&mut o.records))
            .unwrap_or_default()
    }

    fn record(&mut self, record: MutationRecord) {
        let interested: Vec<ObserverId> = self
            .observers
            .iter()
            .filter(|(_, o)| self.is_inclusive_ancestor(o.target, record.target))
            .map(|(&id, _)| id)
            .collect();
        for id in interested {
            if let Some(observation) = self.observers.get_mut(&id) {
                observation.records.push(record.clone());
            }
        }
    }
}
