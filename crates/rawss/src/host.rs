use html::{DOMUpdate, Dom, LoadState, NodeKey};
use style_engine::StyleHost;
use tokio::sync::{broadcast, watch};

/// What a controller needs from its document beyond [`StyleHost`]:
/// a mutation feed and readiness signals for linked style resources.
pub trait RawssHost: StyleHost + Send + 'static {
    /// Subscribe to mutation batches.
    fn observe(&self) -> broadcast::Receiver<Vec<DOMUpdate>>;

    /// One readiness signal per style-affecting resource under `root` that has
    /// not finished loading yet.
    fn pending_resources(&self, root: NodeKey) -> Vec<watch::Receiver<LoadState>>;
}

#[allow(clippy::same_name_method, reason = "forwards to the inherent Dom methods")]
impl RawssHost for Dom {
    fn observe(&self) -> broadcast::Receiver<Vec<DOMUpdate>> {
        self.subscribe()
    }

    fn pending_resources(&self, root: NodeKey) -> Vec<watch::Receiver<LoadState>> {
        Self::pending_resources(self, root)
    }
}
