//! Rendering abstraction
//!
//! Components never touch a concrete element type. They hold [`NodeId`]
//! handles and go through the [`Dom`] trait, which the browser binding
//! implements over `web-sys` and [`HeadlessDom`] implements in memory.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Opaque element handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Element attributes
pub type Attributes = BTreeMap<String, String>;

/// Element properties commonly set at creation
#[derive(Debug, Clone, Default)]
pub struct ElementProps {
    pub class_name: Option<String>,
    pub id: Option<String>,
    pub text: Option<String>,
    pub tab_index: Option<i32>,
}

/// Element tree operations the core relies on
pub trait Dom {
    fn create_element(&self, tag: &str) -> NodeId;

    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    fn remove_attribute(&self, node: NodeId, name: &str);

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_text(&self, node: NodeId, text: &str);

    /// Insert `child` under `parent` before `before`, or last when `before`
    /// is `None` or not a child of `parent`. A child attached elsewhere is
    /// moved.
    fn insert_child(&self, parent: NodeId, child: NodeId, before: Option<NodeId>);

    fn remove_child(&self, parent: NodeId, child: NodeId);

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Drop the node and its subtree. Handles become invalid.
    fn release(&self, node: NodeId);

    fn contains(&self, node: NodeId) -> bool;
}

/// Create an element with properties and attributes applied
pub fn create_el(dom: &dyn Dom, tag: &str, props: &ElementProps, attributes: &Attributes) -> NodeId {
    let node = dom.create_element(tag);
    if let Some(class_name) = &props.class_name {
        dom.set_attribute(node, "class", class_name);
    }
    if let Some(id) = &props.id {
        dom.set_attribute(node, "id", id);
    }
    if let Some(tab_index) = props.tab_index {
        dom.set_attribute(node, "tabindex", &tab_index.to_string());
    }
    if let Some(text) = &props.text {
        dom.set_text(node, text);
    }
    for (name, value) in attributes {
        dom.set_attribute(node, name, value);
    }
    node
}

fn class_list(dom: &dyn Dom, node: NodeId) -> Vec<String> {
    dom.attribute(node, "class")
        .map(|classes| classes.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn write_class_list(dom: &dyn Dom, node: NodeId, classes: &[String]) {
    if classes.is_empty() {
        dom.remove_attribute(node, "class");
    } else {
        dom.set_attribute(node, "class", &classes.join(" "));
    }
}

pub fn has_class(dom: &dyn Dom, node: NodeId, class: &str) -> bool {
    class_list(dom, node).iter().any(|c| c == class)
}

pub fn add_class(dom: &dyn Dom, node: NodeId, class: &str) {
    let mut classes = class_list(dom, node);
    for name in class.split_whitespace() {
        if !classes.iter().any(|c| c == name) {
            classes.push(name.to_string());
        }
    }
    write_class_list(dom, node, &classes);
}

pub fn remove_class(dom: &dyn Dom, node: NodeId, class: &str) {
    let mut classes = class_list(dom, node);
    let before = classes.len();
    classes.retain(|c| !class.split_whitespace().any(|name| name == c));
    if classes.len() != before {
        write_class_list(dom, node, &classes);
    }
}

/// Toggle `class`; `force` pins the outcome
pub fn toggle_class(dom: &dyn Dom, node: NodeId, class: &str, force: Option<bool>) {
    let add = force.unwrap_or_else(|| !has_class(dom, node, class));
    if add {
        add_class(dom, node, class);
    } else {
        remove_class(dom, node, class);
    }
}

/// Remove `node` from its parent, if it has one
pub fn detach(dom: &dyn Dom, node: NodeId) {
    if let Some(parent) = dom.parent(node) {
        dom.remove_child(parent, node);
    }
}

#[derive(Debug, Default)]
struct Node {
    tag: String,
    attributes: Attributes,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// In-memory element tree
#[derive(Debug, Default)]
pub struct HeadlessDom {
    nodes: RefCell<HashMap<NodeId, Node>>,
    next_id: Cell<u64>,
}

impl HeadlessDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    pub fn text(&self, node: NodeId) -> Option<String> {
        self.nodes.borrow().get(&node).map(|n| n.text.clone())
    }

    fn unlink(nodes: &mut HashMap<NodeId, Node>, child: NodeId) {
        let parent = nodes.get_mut(&child).and_then(|n| n.parent.take());
        if let Some(parent) = parent.and_then(|p| nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != child);
        }
    }
}

impl Dom for HeadlessDom {
    fn create_element(&self, tag: &str) -> NodeId {
        let id = NodeId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.nodes.borrow_mut().insert(
            id,
            Node {
                tag: tag.to_ascii_lowercase(),
                ..Default::default()
            },
        );
        id
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.nodes.borrow().get(&node).map(|n| n.tag.clone())
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.nodes.borrow_mut().get_mut(&node) {
            n.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some(n) = self.nodes.borrow_mut().get_mut(&node) {
            n.attributes.remove(name);
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes
            .borrow()
            .get(&node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    fn set_text(&self, node: NodeId, text: &str) {
        if let Some(n) = self.nodes.borrow_mut().get_mut(&node) {
            n.text = text.to_string();
        }
    }

    fn insert_child(&self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        let mut nodes = self.nodes.borrow_mut();
        if parent == child || !nodes.contains_key(&parent) || !nodes.contains_key(&child) {
            return;
        }
        Self::unlink(&mut nodes, child);

        if let Some(p) = nodes.get_mut(&parent) {
            let position = before
                .and_then(|reference| p.children.iter().position(|c| *c == reference))
                .unwrap_or(p.children.len());
            p.children.insert(position, child);
        }
        if let Some(c) = nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
    }

    fn remove_child(&self, parent: NodeId, child: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        let is_child = nodes.get(&child).is_some_and(|c| c.parent == Some(parent));
        if is_child {
            Self::unlink(&mut nodes, child);
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.borrow().get(&node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .borrow()
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn release(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        Self::unlink(&mut nodes, node);

        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            if let Some(removed) = nodes.remove(&id) {
                pending.extend(removed.children);
            }
        }
    }

    fn contains(&self, node: NodeId) -> bool {
        self.nodes.borrow().contains_key(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_el_applies_props() {
        let dom = HeadlessDom::new();
        let mut attributes = Attributes::new();
        attributes.insert("role".into(), "region".into());
        let props = ElementProps {
            class_name: Some("kino-player kino-paused".into()),
            tab_index: Some(-1),
            ..Default::default()
        };

        let node = create_el(&dom, "DIV", &props, &attributes);
        assert_eq!(dom.tag_name(node).as_deref(), Some("div"));
        assert_eq!(dom.attribute(node, "role").as_deref(), Some("region"));
        assert_eq!(dom.attribute(node, "tabindex").as_deref(), Some("-1"));
        assert!(has_class(&dom, node, "kino-paused"));
    }

    #[test]
    fn test_class_helpers() {
        let dom = HeadlessDom::new();
        let node = dom.create_element("div");
        add_class(&dom, node, "a b");
        add_class(&dom, node, "a");
        assert_eq!(dom.attribute(node, "class").as_deref(), Some("a b"));

        remove_class(&dom, node, "a");
        toggle_class(&dom, node, "c", None);
        assert_eq!(dom.attribute(node, "class").as_deref(), Some("b c"));

        toggle_class(&dom, node, "c", Some(true));
        assert!(has_class(&dom, node, "c"));
        toggle_class(&dom, node, "b", None);
        toggle_class(&dom, node, "c", None);
        assert_eq!(dom.attribute(node, "class"), None);
    }

    #[test]
    fn test_insert_before_and_move() {
        let dom = HeadlessDom::new();
        let root = dom.create_element("div");
        let other = dom.create_element("div");
        let a = dom.create_element("span");
        let b = dom.create_element("span");
        let c = dom.create_element("span");

        dom.insert_child(root, a, None);
        dom.insert_child(root, c, None);
        dom.insert_child(root, b, Some(c));
        assert_eq!(dom.children(root), vec![a, b, c]);

        dom.insert_child(other, b, None);
        assert_eq!(dom.children(root), vec![a, c]);
        assert_eq!(dom.parent(b), Some(other));

        detach(&dom, b);
        assert_eq!(dom.parent(b), None);
        assert!(dom.children(other).is_empty());
    }

    #[test]
    fn test_release_drops_subtree() {
        let dom = HeadlessDom::new();
        let root = dom.create_element("div");
        let child = dom.create_element("div");
        let grandchild = dom.create_element("div");
        dom.insert_child(root, child, None);
        dom.insert_child(child, grandchild, None);

        dom.release(child);
        assert!(dom.children(root).is_empty());
        assert!(!dom.contains(grandchild));
        assert_eq!(dom.len(), 1);
    }
}
