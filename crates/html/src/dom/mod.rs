//! In-memory document tree used as the host for atomic style resolution.
//!
//! Every mutation is announced to subscribers as a batch of [`DOMUpdate`]s on a
//! broadcast channel, one batch per mutating call.

pub mod fragment;
pub mod printing;
pub mod updating;

use crate::resources::{LoadState, ResourceRegistry};
use anyhow::{Error, anyhow};
use indextree::{Arena, NodeId};
use smallvec::SmallVec;
use tokio::sync::{broadcast, watch};

pub use fragment::{ElementSpec, NodeSpec};
pub use updating::{DOMMirror, DOMSubscriber, DOMUpdate};

/// Capacity of the mutation broadcast channel. Slow subscribers observe `Lagged`.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Stable handle to a node in a [`Dom`].
///
/// Removed nodes are detached rather than freed, so a key never starts
/// pointing at a different node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeKey(NodeId);

#[derive(Debug, Clone, Default)]
pub enum NodeKind {
    #[default]
    Document,
    Element {
        tag: String,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DOMNode {
    pub kind: NodeKind,
    pub attrs: SmallVec<(String, String), 4>,
    /// Inline style properties in the order they were first written.
    pub inline_style: SmallVec<(String, String), 4>,
}

impl DOMNode {
    fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
            },
            ..Self::default()
        }
    }

    fn text(text: &str) -> Self {
        Self {
            kind: NodeKind::Text {
                text: text.to_owned(),
            },
            ..Self::default()
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag } => Some(tag.as_str()),
            NodeKind::Document | NodeKind::Text { .. } => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn style_property(&self, property: &str) -> Option<&str> {
        self.inline_style
            .iter()
            .find(|(key, _)| key == property)
            .map(|(_, value)| value.as_str())
    }

    fn is_stylesheet_link(&self) -> bool {
        self.tag() == Some("link")
            && self.attribute("rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("stylesheet"))
            })
    }
}

/// The host document: an arena of nodes rooted at a document node with
/// `<html>`, `<head>` and `<body>` already in place.
pub struct Dom {
    arena: Arena<DOMNode>,
    document: NodeKey,
    document_element: NodeKey,
    head: NodeKey,
    body: NodeKey,
    update_sender: broadcast::Sender<Vec<DOMUpdate>>,
    resources: ResourceRegistry,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        let (update_sender, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let mut arena = Arena::new();
        let document = arena.new_node(DOMNode::default());
        let html = arena.new_node(DOMNode::element("html"));
        let head = arena.new_node(DOMNode::element("head"));
        let body = arena.new_node(DOMNode::element("body"));
        document.append(html, &mut arena);
        html.append(head, &mut arena);
        html.append(body, &mut arena);
        Self {
            arena,
            document: NodeKey(document),
            document_element: NodeKey(html),
            head: NodeKey(head),
            body: NodeKey(body),
            update_sender,
            resources: ResourceRegistry::default(),
        }
    }

    pub const fn document(&self) -> NodeKey {
        self.document
    }

    /// The `<html>` element.
    pub const fn document_element(&self) -> NodeKey {
        self.document_element
    }

    pub const fn head(&self) -> NodeKey {
        self.head
    }

    pub const fn body(&self) -> NodeKey {
        self.body
    }

    /// Subscribe to mutation batches emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<DOMUpdate>> {
        self.update_sender.subscribe()
    }

    pub fn node(&self, key: NodeKey) -> Option<&DOMNode> {
        self.arena.get(key.0).map(indextree::Node::get)
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut DOMNode, Error> {
        self.arena
            .get_mut(key.0)
            .map(indextree::Node::get_mut)
            .ok_or_else(|| anyhow!("unknown node {key:?}"))
    }

    pub fn tag_name(&self, key: NodeKey) -> Option<&str> {
        self.node(key).and_then(DOMNode::tag)
    }

    pub fn attribute(&self, key: NodeKey, name: &str) -> Option<&str> {
        self.node(key).and_then(|node| node.attribute(name))
    }

    pub fn style_property(&self, key: NodeKey, property: &str) -> Option<&str> {
        self.node(key).and_then(|node| node.style_property(property))
    }

    /// Serialized inline style, as a `style` attribute would read.
    pub fn inline_style_text(&self, key: NodeKey) -> String {
        self.node(key).map_or_else(String::new, |node| {
            node.inline_style
                .iter()
                .map(|(property, value)| format!("{property}: {value};"))
                .collect::<Vec<_>>()
                .join(" ")
        })
    }

    /// Whether `key` is reachable from the document node.
    pub fn is_connected(&self, key: NodeKey) -> bool {
        self.is_inclusive_ancestor(self.document, key)
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        if self.arena.get(node.0).is_none() {
            return false;
        }
        node.0
            .ancestors(&self.arena)
            .any(|candidate| candidate == ancestor.0)
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.arena
            .get(key.0)
            .and_then(indextree::Node::parent)
            .map(NodeKey)
    }

    pub fn children(&self, key: NodeKey) -> Vec<NodeKey> {
        if self.arena.get(key.0).is_none() {
            return Vec::new();
        }
        key.0.children(&self.arena).map(NodeKey).collect()
    }

    /// Element nodes of the subtree rooted at `root`, in depth-first pre-order,
    /// `root` included when it is an element.
    pub fn elements_in(&self, root: NodeKey) -> Vec<NodeKey> {
        if self.arena.get(root.0).is_none() {
            return Vec::new();
        }
        root.0
            .descendants(&self.arena)
            .filter(|id| {
                self.arena
                    .get(*id)
                    .is_some_and(|node| node.get().tag().is_some())
            })
            .map(NodeKey)
            .collect()
    }

    /// First connected element whose `id` attribute equals `id`, in document order.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeKey> {
        self.elements_in(self.document)
            .into_iter()
            .find(|key| self.attribute(*key, "id") == Some(id))
    }

    /// Create a detached element. Nothing is announced until it is inserted.
    pub fn create_element(&mut self, tag: &str) -> NodeKey {
        NodeKey(self.arena.new_node(DOMNode::element(tag)))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeKey {
        NodeKey(self.arena.new_node(DOMNode::text(text)))
    }

    /// Append `child` (and its subtree) as the last child of `parent`.
    ///
    /// # Errors
    /// Fails when either node is unknown or the append would create a cycle.
    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), Error> {
        let mut batch = Vec::new();
        self.attach(parent, child, &mut batch)?;
        self.forget_disconnected_resources();
        self.emit(batch);
        Ok(())
    }

    /// Build `spec` and append it under `parent`.
    ///
    /// # Errors
    /// Fails when `parent` is unknown.
    pub fn insert(&mut self, parent: NodeKey, spec: impl Into<NodeSpec>) -> Result<NodeKey, Error> {
        let built = self.build(&spec.into());
        self.append_child(parent, built)?;
        Ok(built)
    }

    /// Replace every child of `parent` with freshly built nodes, announcing the
    /// removals and insertions as a single batch (the `innerHTML =` equivalent).
    ///
    /// # Errors
    /// Fails when `parent` is unknown.
    pub fn replace_children<I>(&mut self, parent: NodeKey, specs: I) -> Result<Vec<NodeKey>, Error>
    where
        I: IntoIterator,
        I::Item: Into<NodeSpec>,
    {
        if self.arena.get(parent.0).is_none() {
            return Err(anyhow!("unknown node {parent:?}"));
        }
        let mut batch = Vec::new();
        for old_child in self.children(parent) {
            old_child.0.detach(&mut self.arena);
            batch.push(DOMUpdate::RemoveNode { node: old_child });
        }
        self.forget_disconnected_resources();
        let mut inserted = Vec::new();
        for spec in specs {
            let built = self.build(&spec.into());
            self.attach(parent, built, &mut batch)?;
            inserted.push(built);
        }
        self.emit(batch);
        Ok(inserted)
    }

    /// Detach `node` and its subtree from the document.
    ///
    /// # Errors
    /// Fails when `node` is unknown or is the document itself.
    pub fn remove_node(&mut self, node: NodeKey) -> Result<(), Error> {
        if node == self.document {
            return Err(anyhow!("the document node cannot be removed"));
        }
        if self.arena.get(node.0).is_none() {
            return Err(anyhow!("unknown node {node:?}"));
        }
        node.0.detach(&mut self.arena);
        self.forget_disconnected_resources();
        self.emit(vec![DOMUpdate::RemoveNode { node }]);
        Ok(())
    }

    /// Set (or overwrite) an attribute.
    ///
    /// # Errors
    /// Fails when `node` is unknown or is not an element.
    pub fn set_attribute(&mut self, node: NodeKey, name: &str, value: &str) -> Result<(), Error> {
        let target = self.node_mut(node)?;
        if target.tag().is_none() {
            return Err(anyhow!("attributes can only be set on elements ({node:?})"));
        }
        if let Some(slot) = target.attrs.iter_mut().find(|(key, _)| key == name) {
            value.clone_into(&mut slot.1);
        } else {
            target.attrs.push((name.to_owned(), value.to_owned()));
        }
        self.refresh_stylesheet(node);
        self.emit(vec![DOMUpdate::SetAttr {
            node,
            name: name.to_owned(),
            value: value.to_owned(),
        }]);
        Ok(())
    }

    /// Remove an attribute, returning whether it was present.
    ///
    /// # Errors
    /// Fails when `node` is unknown.
    pub fn remove_attribute(&mut self, node: NodeKey, name: &str) -> Result<bool, Error> {
        let target = self.node_mut(node)?;
        let Some(index) = target.attrs.iter().position(|(key, _)| key == name) else {
            return Ok(false);
        };
        target.attrs.remove(index);
        self.refresh_stylesheet(node);
        self.emit(vec![DOMUpdate::RemoveAttr {
            node,
            name: name.to_owned(),
        }]);
        Ok(true)
    }

    /// Write one inline style property, returning whether the stored value changed.
    ///
    /// Unchanged writes are not announced.
    ///
    /// # Errors
    /// Fails when `node` is unknown or is not an element.
    pub fn set_style_property(&mut self, node: NodeKey, property: &str, value: &str) -> Result<bool, Error> {
        let target = self.node_mut(node)?;
        if target.tag().is_none() {
            return Err(anyhow!("inline styles can only be set on elements ({node:?})"));
        }
        if let Some(slot) = target.inline_style.iter_mut().find(|(key, _)| key == property) {
            if slot.1 == value {
                return Ok(false);
            }
            value.clone_into(&mut slot.1);
        } else {
            target
                .inline_style
                .push((property.to_owned(), value.to_owned()));
        }
        self.emit(vec![DOMUpdate::SetStyle {
            node,
            property: property.to_owned(),
            value: value.to_owned(),
        }]);
        Ok(true)
    }

    /// Mark a linked stylesheet as loaded with the given text.
    ///
    /// # Errors
    /// Fails when `node` is not a registered stylesheet link.
    pub fn complete_resource(&mut self, node: NodeKey, text: &str) -> Result<(), Error> {
        self.resources.complete(node, text)
    }

    /// Mark a linked stylesheet as failed. Failed sheets count as settled.
    ///
    /// # Errors
    /// Fails when `node` is not a registered stylesheet link.
    pub fn fail_resource(&mut self, node: NodeKey, reason: &str) -> Result<(), Error> {
        self.resources.fail(node, reason)
    }

    pub fn resource_state(&self, node: NodeKey) -> Option<LoadState> {
        self.resources.state(node)
    }

    /// Readiness signals of every still-pending stylesheet link under `root`.
    pub fn pending_resources(&self, root: NodeKey) -> Vec<watch::Receiver<LoadState>> {
        self.resources
            .pending()
            .filter(|resource| self.is_inclusive_ancestor(root, resource.node()))
            .map(crate::resources::StylesheetResource::subscribe)
            .collect()
    }

    /// Text of every loaded, connected stylesheet in registration order.
    pub fn loaded_stylesheets(&self) -> impl Iterator<Item = &str> {
        self.resources.loaded()
    }

    fn build(&mut self, spec: &NodeSpec) -> NodeKey {
        match spec {
            NodeSpec::Text(text) => self.create_text(text),
            NodeSpec::Element(element) => {
                let mut node = DOMNode::element(&element.tag);
                for (name, value) in &element.attrs {
                    if let Some(slot) = node.attrs.iter_mut().find(|(key, _)| key == name) {
                        slot.1.clone_from(value);
                    } else {
                        node.attrs.push((name.clone(), value.clone()));
                    }
                }
                let key = NodeKey(self.arena.new_node(node));
                for child_spec in &element.children {
                    let child = self.build(child_spec);
                    key.0.append(child.0, &mut self.arena);
                }
                key
            }
        }
    }

    /// Append without emitting; queue the insertion records for the whole subtree.
    fn attach(&mut self, parent: NodeKey, child: NodeKey, batch: &mut Vec<DOMUpdate>) -> Result<(), Error> {
        if self.arena.get(parent.0).is_none() {
            return Err(anyhow!("unknown parent {parent:?}"));
        }
        if self.arena.get(child.0).is_none() {
            return Err(anyhow!("unknown child {child:?}"));
        }
        child.0.detach(&mut self.arena);
        parent
            .0
            .checked_append(child.0, &mut self.arena)
            .map_err(|err| anyhow!("cannot append {child:?} to {parent:?}: {err:?}"))?;
        let connected = self.is_connected(parent);
        for id in child.0.descendants(&self.arena).collect::<Vec<_>>() {
            let key = NodeKey(id);
            let Some(node_parent) = self.arena.get(id).and_then(indextree::Node::parent) else {
                continue;
            };
            let pos = node_parent
                .children(&self.arena)
                .position(|sibling| sibling == id)
                .unwrap_or_default();
            let Some(node) = self.node(key) else { continue };
            match &node.kind {
                NodeKind::Element { tag } => {
                    batch.push(DOMUpdate::InsertElement {
                        parent: NodeKey(node_parent),
                        node: key,
                        tag: tag.clone(),
                        pos,
                    });
                    for (name, value) in &node.attrs {
                        batch.push(DOMUpdate::SetAttr {
                            node: key,
                            name: name.clone(),
                            value: value.clone(),
                        });
                    }
                }
                NodeKind::Text { text } => batch.push(DOMUpdate::InsertText {
                    parent: NodeKey(node_parent),
                    node: key,
                    text: text.clone(),
                    pos,
                }),
                NodeKind::Document => {}
            }
            if connected {
                self.register_if_stylesheet(key);
            }
        }
        Ok(())
    }

    fn register_if_stylesheet(&mut self, key: NodeKey) {
        let Some(node) = self.node(key) else { return };
        if !node.is_stylesheet_link() || self.resources.state(key).is_some() || !self.is_connected(key) {
            return;
        }
        let href = node.attribute("href").unwrap_or_default().to_owned();
        log::debug!("discovered stylesheet link {href:?} ({key:?})");
        self.resources.register(key, href);
    }

    /// Track or forget `key` after one of its attributes changed.
    fn refresh_stylesheet(&mut self, key: NodeKey) {
        let is_link = self.node(key).is_some_and(DOMNode::is_stylesheet_link);
        if is_link {
            self.register_if_stylesheet(key);
        } else if self.resources.state(key).is_some() {
            log::debug!("{key:?} is no longer a stylesheet link");
            self.resources.forget(key);
        }
    }

    fn forget_disconnected_resources(&mut self) {
        let stale: Vec<NodeKey> = self
            .resources
            .nodes()
            .filter(|node| !self.is_connected(*node))
            .collect();
        for node in stale {
            self.resources.forget(node);
        }
    }

    fn emit(&self, batch: Vec<DOMUpdate>) {
        if batch.is_empty() || self.update_sender.receiver_count() == 0 {
            return;
        }
        if let Err(err) = self.update_sender.send(batch) {
            log::trace!("mutation batch dropped: {err}");
        }
    }
}
