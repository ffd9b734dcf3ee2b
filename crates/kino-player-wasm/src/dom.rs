//! Browser DOM backend
//!
//! Maps [`NodeId`] handles onto real `web_sys::Element`s.

use kino_player::dom::{Dom, NodeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use tracing::warn;
use web_sys::{Document, Element, Node};

pub struct WebDom {
    document: Document,
    nodes: RefCell<HashMap<NodeId, Element>>,
    next_id: Cell<u64>,
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            nodes: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn allocate(&self) -> NodeId {
        let id = NodeId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        id
    }

    /// Give an element created outside the core (the embed container) a
    /// handle
    pub fn adopt(&self, element: Element) -> NodeId {
        if let Some(node) = self.lookup(&element) {
            return node;
        }
        let node = self.allocate();
        self.nodes.borrow_mut().insert(node, element);
        node
    }

    pub fn element(&self, node: NodeId) -> Option<Element> {
        self.nodes.borrow().get(&node).cloned()
    }

    fn lookup(&self, element: &Element) -> Option<NodeId> {
        self.nodes
            .borrow()
            .iter()
            .find(|(_, candidate)| *candidate == element)
            .map(|(node, _)| *node)
    }
}

impl Dom for WebDom {
    fn create_element(&self, tag: &str) -> NodeId {
        let node = self.allocate();
        match self.document.create_element(tag) {
            Ok(element) => {
                self.nodes.borrow_mut().insert(node, element);
            }
            Err(e) => warn!(tag, error = ?e, "Element creation failed"),
        }
        node
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.element(node).map(|el| el.tag_name().to_ascii_lowercase())
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element(node) {
            if let Err(e) = el.set_attribute(name, value) {
                warn!(%node, name, error = ?e, "setAttribute failed");
            }
        }
    }

    fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some(el) = self.element(node) {
            let _ = el.remove_attribute(name);
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)?.get_attribute(name)
    }

    fn set_text(&self, node: NodeId, text: &str) {
        if let Some(el) = self.element(node) {
            el.set_text_content(Some(text));
        }
    }

    fn insert_child(&self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        let (Some(parent_el), Some(child_el)) = (self.element(parent), self.element(child)) else {
            return;
        };
        let before_el = before
            .filter(|before| self.parent(*before) == Some(parent))
            .and_then(|before| self.element(before));
        if let Err(e) = parent_el.insert_before(&child_el, before_el.as_deref()) {
            warn!(%parent, %child, error = ?e, "insertBefore failed");
        }
    }

    fn remove_child(&self, parent: NodeId, child: NodeId) {
        if let (Some(parent_el), Some(child_el)) = (self.element(parent), self.element(child)) {
            let _ = parent_el.remove_child(&child_el);
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.element(node)?.parent_element()?;
        self.lookup(&parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        let Some(el) = self.element(node) else {
            return Vec::new();
        };
        let children = el.children();
        (0..children.length())
            .filter_map(|i| children.item(i))
            .filter_map(|child| self.lookup(&child))
            .collect()
    }

    fn release(&self, node: NodeId) {
        let Some(el) = self.nodes.borrow_mut().remove(&node) else {
            return;
        };
        el.remove();
        let root: &Node = &el;
        self.nodes.borrow_mut().retain(|_, other| {
            let other: &Node = other;
            !root.contains(Some(other))
        });
    }

    fn contains(&self, node: NodeId) -> bool {
        self.nodes.borrow().contains_key(&node)
    }
}
