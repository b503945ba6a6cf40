use anyhow::{Error, anyhow};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::dom::NodeKey;

/// One mutation record. Batches of these are broadcast by [`crate::dom::Dom`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DOMUpdate {
    InsertElement {
        parent: NodeKey,
        node: NodeKey,
        tag: String,
        pos: usize,
    },
    InsertText {
        parent: NodeKey,
        node: NodeKey,
        text: String,
        pos: usize,
    },
    SetAttr {
        node: NodeKey,
        name: String,
        value: String,
    },
    RemoveAttr {
        node: NodeKey,
        name: String,
    },
    /// An inline style property was written with a new value.
    SetStyle {
        node: NodeKey,
        property: String,
        value: String,
    },
    RemoveNode {
        node: NodeKey,
    },
}

pub trait DOMSubscriber {
    fn apply_update(&mut self, update: DOMUpdate) -> Result<(), Error>;
}

/// Generic mirror that feeds broadcast mutation batches into a [`DOMSubscriber`].
pub struct DOMMirror<T: DOMSubscriber> {
    in_updater: broadcast::Receiver<Vec<DOMUpdate>>,
    mirror: T,
    /// Batches lost because this mirror fell behind the channel capacity.
    lagged: u64,
}

impl<T: DOMSubscriber> DOMMirror<T> {
    pub const fn new(in_updater: broadcast::Receiver<Vec<DOMUpdate>>, mirror: T) -> Self {
        Self {
            in_updater,
            mirror,
            lagged: 0,
        }
    }

    /// Wait for the next batch and apply it.
    ///
    /// # Errors
    /// Fails when the sending document is gone or the subscriber rejects an update.
    pub async fn update(&mut self) -> Result<(), Error> {
        match self.in_updater.recv().await {
            Ok(batch) => self.apply_batch(batch),
            Err(RecvError::Lagged(skipped)) => {
                self.lagged = self.lagged.saturating_add(skipped);
                log::debug!("mirror lagged behind by {skipped} batches");
                Ok(())
            }
            Err(RecvError::Closed) => Err(anyhow!("Recv channel was closed, the document is gone!")),
        }
    }

    /// Drain every batch already queued without waiting.
    ///
    /// # Errors
    /// Fails when the sending document is gone or the subscriber rejects an update.
    pub fn try_update_sync(&mut self) -> Result<usize, Error> {
        let mut applied = 0;
        loop {
            match self.in_updater.try_recv() {
                Ok(batch) => {
                    self.apply_batch(batch)?;
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    self.lagged = self.lagged.saturating_add(skipped);
                }
                Err(TryRecvError::Closed) => {
                    return Err(anyhow!("Recv channel was closed, the document is gone!"));
                }
            }
        }
        Ok(applied)
    }

    fn apply_batch(&mut self, batch: Vec<DOMUpdate>) -> Result<(), Error> {
        for update in batch {
            self.mirror.apply_update(update)?;
        }
        Ok(())
    }

    /// Total number of batches missed through lagging.
    pub const fn lagged(&self) -> u64 {
        self.lagged
    }

    /// Take the lag count, resetting it to zero.
    pub const fn take_lagged(&mut self) -> u64 {
        let lagged = self.lagged;
        self.lagged = 0;
        lagged
    }

    pub const fn mirror(&self) -> &T {
        &self.mirror
    }

    pub const fn mirror_mut(&mut self) -> &mut T {
        &mut self.mirror
    }
}
