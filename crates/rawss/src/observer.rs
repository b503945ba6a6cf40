//! Subtree mutation watch feeding the lifecycle loop.

use core::mem;
use core::sync::atomic::{AtomicBool, Ordering};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Error;
use html::{DOMMirror, DOMSubscriber, DOMUpdate, NodeKey};
use style_engine::StyleHost;
use tokio::sync::broadcast::Receiver;

/// Nodes touched by the mutations seen since the last `take`.
#[derive(Debug, Default, PartialEq, Eq)]
pub enum Touched {
    #[default]
    Nothing,
    Nodes(Vec<NodeKey>),
    /// Batches were lost; anything may have changed.
    Unknown,
}

#[derive(Debug, PartialEq, Eq)]
struct OwnWrite {
    node: NodeKey,
    property: String,
    value: String,
}

/// Inline style writes made by the controller's passes whose mutation
/// records have not reached the watch yet.
///
/// Writes are only noted once the ledger is active, i.e. once a watch is
/// subscribed that will claim them back.
#[derive(Debug, Default)]
pub struct WriteLedger {
    active: AtomicBool,
    pending: Mutex<Vec<OwnWrite>>,
}

impl WriteLedger {
    fn pending(&self) -> MutexGuard<'_, Vec<OwnWrite>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start noting writes, forgetting anything noted before.
    pub fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
        self.clear();
    }

    pub fn clear(&self) {
        self.pending().clear();
    }

    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }

    fn note(&self, node: NodeKey, property: &str, value: &str) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        self.pending().push(OwnWrite {
            node,
            property: property.to_owned(),
            value: value.to_owned(),
        });
    }

    /// Remove one matching entry, returning whether there was one.
    pub fn claim(&self, node: NodeKey, property: &str, value: &str) -> bool {
        let mut pending = self.pending();
        let found = pending
            .iter()
            .position(|write| write.node == node && write.property == property && write.value == value);
        found.map(|index| pending.remove(index)).is_some()
    }
}

/// A [`StyleHost`] that notes every inline style write in a [`WriteLedger`]
/// before the host announces it.
pub struct LedgeredHost<'host, H: ?Sized> {
    host: &'host mut H,
    ledger: &'host WriteLedger,
}

impl<'host, H: StyleHost + ?Sized> LedgeredHost<'host, H> {
    pub const fn new(host: &'host mut H, ledger: &'host WriteLedger) -> Self {
        Self { host, ledger }
    }
}

impl<H: StyleHost + ?Sized> StyleHost for LedgeredHost<'_, H> {
    fn contains(&self, node: NodeKey) -> bool {
        self.host.contains(node)
    }

    fn element_subtree(&self, root: NodeKey) -> Vec<NodeKey> {
        self.host.element_subtree(root)
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        self.host.is_inclusive_ancestor(ancestor, node)
    }

    fn attribute(&self, node: NodeKey, name: &str) -> Option<&str> {
        self.host.attribute(node, name)
    }

    fn style_property(&self, node: NodeKey, property: &str) -> Option<&str> {
        self.host.style_property(node, property)
    }

    fn set_style_property(&mut self, node: NodeKey, property: &str, value: &str) -> Result<bool, Error> {
        self.ledger.note(node, property, value);
        let written = self.host.set_style_property(node, property, value);
        if !matches!(written, Ok(true)) {
            // Nothing was announced.
            self.ledger.claim(node, property, value);
        }
        written
    }

    fn custom_property(&self, node: NodeKey, name: &str) -> Option<String> {
        self.host.custom_property(node, name)
    }
}

/// Collects nodes affected by insertions, attribute changes and inline style
/// writes that did not come from a pass.
///
/// With an attribute filter only the listed attributes count. Removals are
/// ignored: detaching nodes leaves nothing to resolve.
#[derive(Debug)]
pub struct SubtreeFilter {
    attributes: Option<HashSet<String>>,
    ledger: Arc<WriteLedger>,
    touched: HashSet<NodeKey>,
}

impl SubtreeFilter {
    pub fn new(attributes: Option<Vec<String>>, ledger: Arc<WriteLedger>) -> Self {
        Self {
            attributes: attributes.map(|names| names.into_iter().collect()),
            ledger,
            touched: HashSet::new(),
        }
    }

    fn observes(&self, name: &str) -> bool {
        self.attributes
            .as_ref()
            .is_none_or(|names| names.contains(name))
    }
}

impl DOMSubscriber for SubtreeFilter {
    fn apply_update(&mut self, update: DOMUpdate) -> Result<(), Error> {
        match update {
            DOMUpdate::InsertElement { node, .. } | DOMUpdate::InsertText { node, .. } => {
                self.touched.insert(node);
            }
            DOMUpdate::SetAttr { node, name, .. } | DOMUpdate::RemoveAttr { node, name } => {
                if self.observes(&name) {
                    self.touched.insert(node);
                }
            }
            DOMUpdate::SetStyle { node, property, value } => {
                if !self.ledger.claim(node, &property, &value) {
                    self.touched.insert(node);
                }
            }
            DOMUpdate::RemoveNode { .. } => {}
        }
        Ok(())
    }
}

/// A [`DOMMirror`] over a [`SubtreeFilter`].
pub struct MutationWatch {
    mirror: DOMMirror<SubtreeFilter>,
}

impl MutationWatch {
    /// `attributes` narrows the attribute changes that count; `None` counts all.
    pub fn new(receiver: Receiver<Vec<DOMUpdate>>, attributes: Option<Vec<String>>, ledger: Arc<WriteLedger>) -> Self {
        Self {
            mirror: DOMMirror::new(receiver, SubtreeFilter::new(attributes, ledger)),
        }
    }

    /// Wait for the next mutation batch.
    ///
    /// # Errors
    /// Fails once the document is gone.
    pub async fn next_batch(&mut self) -> Result<(), Error> {
        self.mirror.update().await
    }

    /// Fold every batch already queued.
    ///
    /// # Errors
    /// Fails once the document is gone.
    pub fn drain(&mut self) -> Result<usize, Error> {
        self.mirror.try_update_sync()
    }

    pub fn take(&mut self) -> Touched {
        let filter = self.mirror.mirror_mut();
        let touched = mem::take(&mut filter.touched);
        if self.mirror.take_lagged() > 0 {
            // Records of noted writes may be among the lost batches.
            self.mirror.mirror().ledger.clear();
            return Touched::Unknown;
        }
        if touched.is_empty() {
            Touched::Nothing
        } else {
            Touched::Nodes(touched.into_iter().collect())
        }
    }
}
