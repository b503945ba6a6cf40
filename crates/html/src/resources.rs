//! Linked stylesheet tracking.
//!
//! A `<link rel="stylesheet">` connected to the document is a pending
//! resource until the embedder reports it loaded or failed. Waiters observe
//! the state through a `watch` channel; dropping the registry entry (when the
//! link is disconnected) closes the channel, which waiters treat as settled.

use anyhow::{Error, anyhow};
use tokio::sync::watch;

use crate::dom::NodeKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded,
    Failed,
}

impl LoadState {
    /// Loaded and failed resources no longer block anything.
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Loaded | Self::Failed)
    }
}

#[derive(Debug)]
pub struct StylesheetResource {
    node: NodeKey,
    href: String,
    state: watch::Sender<LoadState>,
    text: Option<String>,
}

impl StylesheetResource {
    pub const fn node(&self) -> NodeKey {
        self.node
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn state(&self) -> LoadState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state.subscribe()
    }
}

/// Stylesheet links in registration order.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    sheets: Vec<StylesheetResource>,
}

impl ResourceRegistry {
    pub fn register(&mut self, node: NodeKey, href: String) {
        if self.sheets.iter().any(|sheet| sheet.node == node) {
            return;
        }
        let (state, _) = watch::channel(LoadState::Pending);
        self.sheets.push(StylesheetResource {
            node,
            href,
            state,
            text: None,
        });
    }

    /// # Errors
    /// Fails when `node` is not registered.
    pub fn complete(&mut self, node: NodeKey, text: &str) -> Result<(), Error> {
        let sheet = self.sheet_mut(node)?;
        sheet.text = Some(text.to_owned());
        sheet.state.send_replace(LoadState::Loaded);
        log::debug!("stylesheet {:?} loaded ({} bytes)", sheet.href, text.len());
        Ok(())
    }

    /// # Errors
    /// Fails when `node` is not registered.
    pub fn fail(&mut self, node: NodeKey, reason: &str) -> Result<(), Error> {
        let sheet = self.sheet_mut(node)?;
        sheet.text = None;
        sheet.state.send_replace(LoadState::Failed);
        log::warn!("stylesheet {:?} failed to load: {reason}", sheet.href);
        Ok(())
    }

    pub fn forget(&mut self, node: NodeKey) {
        self.sheets.retain(|sheet| sheet.node != node);
    }

    pub fn state(&self, node: NodeKey) -> Option<LoadState> {
        self.sheets
            .iter()
            .find(|sheet| sheet.node == node)
            .map(StylesheetResource::state)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeKey> {
        self.sheets.iter().map(|sheet| sheet.node)
    }

    pub fn pending(&self) -> impl Iterator<Item = &StylesheetResource> {
        self.sheets
            .iter()
            .filter(|sheet| sheet.state() == LoadState::Pending)
    }

    pub fn loaded(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().filter_map(|sheet| sheet.text.as_deref())
    }

    fn sheet_mut(&mut self, node: NodeKey) -> Result<&mut StylesheetResource, Error> {
        self.sheets
            .iter_mut()
            .find(|sheet| sheet.node == node)
            .ok_or_else(|| anyhow!("{node:?} is not a tracked stylesheet link"))
    }
}
