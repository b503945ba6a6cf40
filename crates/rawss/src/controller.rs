//! The lifecycle controller: one-shot, continuous and settle-driven passes
//! over a bound root.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use anyhow::{Error, anyhow, bail};
use futures::StreamExt as _;
use futures::stream::FuturesUnordered;
use html::{LoadState, NodeKey};
use log::{debug, trace, warn};
use style_engine::{Engine, PassReport, ProcessorRef};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info_span;

use crate::config::RawssConfig;
use crate::host::RawssHost;
use crate::observer::{LedgeredHost, MutationWatch, Touched, WriteLedger};
use crate::scheduler::{FrameClock, FrameScheduler};
use crate::telemetry::{PassCounters, PassTrigger, counters_json, maybe_emit};

/// A host document shared between the embedder and a controller.
pub type SharedHost<H> = Arc<Mutex<H>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Running,
    Paused,
}

/// Clears the in-flight flag when a pass ends, however it ends.
struct InFlightGuard<'flag>(&'flag AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// State shared between the controller handle and its watch loop.
struct Shared<H: RawssHost> {
    host: SharedHost<H>,
    engine: Engine,
    config: RawssConfig,
    processors: Mutex<Vec<ProcessorRef>>,
    state: Mutex<LifecycleState>,
    in_flight: AtomicBool,
    rerun: AtomicBool,
    counters: Mutex<PassCounters>,
    pass_events: watch::Sender<u64>,
    /// Style writes the watch must not mistake for outside mutations.
    ledger: Arc<WriteLedger>,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<H: RawssHost> Shared<H> {
    fn lock_host(&self) -> Result<MutexGuard<'_, H>, Error> {
        self.host
            .lock()
            .map_err(|_| anyhow!("host document lock is poisoned"))
    }

    fn state(&self) -> LifecycleState {
        *relock(&self.state)
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = relock(&self.state);
        if *state != next {
            debug!("rawss {:?} -> {next:?}", *state);
            *state = next;
        }
    }

    fn bump(&self, field: fn(&mut PassCounters) -> &mut u64) {
        let mut counters = relock(&self.counters);
        let slot = field(&mut counters);
        *slot = slot.saturating_add(1);
    }

    /// Whether any touched node lies under the bound root.
    fn is_relevant(&self, touched: &Touched) -> Result<bool, Error> {
        match touched {
            Touched::Nothing => Ok(false),
            Touched::Unknown => Ok(true),
            Touched::Nodes(nodes) => {
                let host = self.lock_host()?;
                let root = self.engine.root();
                Ok(nodes
                    .iter()
                    .any(|node| host.is_inclusive_ancestor(root, *node)))
            }
        }
    }

    /// Run a pass now, waiting for the host if another pass holds it.
    fn forced_pass(&self, trigger: PassTrigger) -> Result<PassReport, Error> {
        let _span = info_span!("rawss.pass", ?trigger).entered();
        let mut host = self.lock_host()?;
        let mut report = self.resolve_in_flight(&mut host, trigger);
        while self.rerun.swap(false, Ordering::SeqCst) {
            report = self.resolve_in_flight(&mut host, PassTrigger::Rerun);
        }
        Ok(report)
    }

    /// A frame-driven pass; folded into the in-flight pass when there is one.
    fn scheduled_pass(&self) -> Result<(), Error> {
        self.rerun.store(true, Ordering::SeqCst);
        if self.in_flight.load(Ordering::SeqCst) {
            self.bump(|counters| &mut counters.coalesced_requests);
            trace!("pass already in flight; folding request into a rerun");
            return Ok(());
        }
        if !self.rerun.swap(false, Ordering::SeqCst) {
            // Picked up by a pass that finished meanwhile.
            return Ok(());
        }
        self.forced_pass(PassTrigger::Mutation).map(drop)
    }

    /// The flag is cleared before the caller looks for folded requests.
    fn resolve_in_flight(&self, host: &mut H, trigger: PassTrigger) -> PassReport {
        self.in_flight.store(true, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);
        self.resolve(host, trigger)
    }

    fn resolve(&self, host: &mut H, trigger: PassTrigger) -> PassReport {
        let processors = relock(&self.processors).clone();
        let started = Instant::now();
        let report = self.engine.run(&mut LedgeredHost::new(host, &self.ledger), &processors);
        let elapsed = started.elapsed();
        let (total, line) = {
            let mut counters = relock(&self.counters);
            counters.record(trigger, &report, elapsed);
            (counters.passes_total, counters_json(&counters))
        };
        debug!(
            "{trigger:?} pass #{total}: {} styled, {} written, {} failures",
            report.elements_styled,
            report.properties_written,
            report.failures.len()
        );
        maybe_emit(self.config.telemetry_enabled, &line);
        self.pass_events.send_replace(total);
        report
    }
}

/// Continuous observation: one pass per frame with relevant mutations, while running.
async fn watch_loop<H: RawssHost>(
    shared: Arc<Shared<H>>,
    mut watch: MutationWatch,
    mut clock: Box<dyn FrameClock>,
) {
    loop {
        if let Err(err) = watch.next_batch().await {
            debug!("mutation watch stopped: {err}");
            return;
        }
        match shared.is_relevant(&watch.take()) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                warn!("cannot inspect mutations: {err}");
                continue;
            }
        }
        if shared.state() != LifecycleState::Running {
            shared.bump(|counters| &mut counters.dropped_while_paused);
            continue;
        }
        clock.next_frame().await;
        shared.bump(|counters| &mut counters.frames_waited);
        // Everything observed up to the boundary belongs to this pass.
        if let Err(err) = watch.drain() {
            debug!("mutation watch stopped: {err}");
            return;
        }
        watch.take();
        if shared.state() != LifecycleState::Running {
            trace!("paused before the frame fired; skipping pass");
            shared.bump(|counters| &mut counters.cancelled_frames);
            continue;
        }
        if let Err(err) = shared.scheduled_pass() {
            warn!("scheduled pass failed: {err}");
        }
    }
}

/// Resolves a root's atomic styles once, continuously, or after its style
/// resources settle.
pub struct Rawss<H: RawssHost> {
    shared: Arc<Shared<H>>,
    runtime: Handle,
    clock: Mutex<Option<Box<dyn FrameClock>>>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
}

impl<H: RawssHost> core::fmt::Debug for Rawss<H> {
    fn fmt(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        formatter
            .debug_struct("Rawss")
            .field("root", &self.shared.engine.root())
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

/// Bind a controller to `root`, configured from the environment.
///
/// # Errors
/// Fails when `root` is not attached to the host document or when called
/// outside a tokio runtime.
pub fn create_rawss<H: RawssHost>(host: SharedHost<H>, root: NodeKey) -> Result<Rawss<H>, Error> {
    let config = RawssConfig::from_env();
    let clock = Box::new(FrameScheduler::new(config.frame_budget()));
    Rawss::with_config(host, root, config, clock)
}

impl<H: RawssHost> Rawss<H> {
    /// # Errors
    /// Fails when `root` is not attached to the host document or when called
    /// outside a tokio runtime.
    pub fn with_config(
        host: SharedHost<H>,
        root: NodeKey,
        config: RawssConfig,
        clock: Box<dyn FrameClock>,
    ) -> Result<Self, Error> {
        let runtime = Handle::try_current()
            .map_err(|err| anyhow!("rawss needs a tokio runtime to schedule frames: {err}"))?;
        {
            let guard = host
                .lock()
                .map_err(|_| anyhow!("host document lock is poisoned"))?;
            if !guard.contains(root) {
                bail!("{root:?} is not attached to the host document");
            }
        }
        let engine = Engine::with_attribute(root, &config.style_attribute);
        let (pass_events, _) = watch::channel(0);
        Ok(Self {
            shared: Arc::new(Shared {
                host,
                engine,
                config,
                processors: Mutex::new(Vec::new()),
                state: Mutex::new(LifecycleState::Idle),
                in_flight: AtomicBool::new(false),
                rerun: AtomicBool::new(false),
                counters: Mutex::new(PassCounters::default()),
                pass_events,
                ledger: Arc::new(WriteLedger::default()),
            }),
            runtime,
            clock: Mutex::new(Some(clock)),
            watch_task: Mutex::new(None),
        })
    }

    /// Register a processor; it takes part from the next pass on.
    pub fn add(&self, processor: ProcessorRef) {
        debug!("registering processor {}", processor.name());
        relock(&self.shared.processors).push(processor);
    }

    /// Run exactly one pass synchronously. The lifecycle state is unchanged.
    ///
    /// # Errors
    /// Fails when the host document lock is poisoned.
    pub fn once(&self) -> Result<PassReport, Error> {
        self.shared.forced_pass(PassTrigger::Once)
    }

    /// Begin continuous resolution: an immediate pass, then one pass per
    /// frame in which relevant mutations were observed. No-op while running.
    ///
    /// # Errors
    /// Fails when the host document lock is poisoned.
    pub fn start(&self) -> Result<(), Error> {
        if self.shared.state() == LifecycleState::Running {
            debug!("start() while running ignored");
            return Ok(());
        }
        self.ensure_watching()?;
        let previous = self.shared.state();
        self.shared.set_state(LifecycleState::Running);
        if let Err(err) = self.shared.forced_pass(PassTrigger::Start) {
            self.shared.set_state(previous);
            return Err(err);
        }
        Ok(())
    }

    /// Stop reacting to mutations. Only meaningful while running; a pass
    /// already waiting for its frame is skipped.
    pub fn pause(&self) {
        if self.shared.state() == LifecycleState::Running {
            self.shared.set_state(LifecycleState::Paused);
        } else {
            debug!("pause() while {:?} ignored", self.shared.state());
        }
    }

    /// Wait until every style resource under the root has loaded or failed,
    /// including resources discovered while waiting, then run one pass.
    ///
    /// # Errors
    /// Fails when the host document lock is poisoned.
    pub async fn settle(&self) -> Result<PassReport, Error> {
        let root = self.shared.engine.root();
        loop {
            let pending = self.shared.lock_host()?.pending_resources(root);
            if pending.is_empty() {
                break;
            }
            debug!("settle waiting on {} style resources", pending.len());
            let mut outstanding: FuturesUnordered<_> = pending.into_iter().map(wait_settled).collect();
            while outstanding.next().await.is_some() {}
        }
        self.shared.forced_pass(PassTrigger::Settle)
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    pub fn counters(&self) -> PassCounters {
        relock(&self.shared.counters).clone()
    }

    /// Receiver of the number of completed passes, updated after each pass.
    pub fn pass_events(&self) -> watch::Receiver<u64> {
        self.shared.pass_events.subscribe()
    }

    pub fn root(&self) -> NodeKey {
        self.shared.engine.root()
    }

    pub fn config(&self) -> &RawssConfig {
        &self.shared.config
    }

    pub fn host(&self) -> &SharedHost<H> {
        &self.shared.host
    }

    /// Subscribe to the host and spawn the watch loop, once per controller.
    fn ensure_watching(&self) -> Result<(), Error> {
        let mut task = relock(&self.watch_task);
        if task.is_some() {
            return Ok(());
        }
        let Some(clock) = relock(&self.clock).take() else {
            bail!("frame clock already consumed");
        };
        let receiver = {
            // Under the host lock, so no pass writes between the two.
            let host = self.shared.lock_host()?;
            self.shared.ledger.activate();
            host.observe()
        };
        let watch = MutationWatch::new(
            receiver,
            self.shared.config.attribute_filter(),
            Arc::clone(&self.shared.ledger),
        );
        debug!("watching {:?} for mutations", self.shared.engine.root());
        *task = Some(
            self.runtime
                .spawn(watch_loop(Arc::clone(&self.shared), watch, clock)),
        );
        Ok(())
    }
}

impl<H: RawssHost> Drop for Rawss<H> {
    fn drop(&mut self) {
        if let Some(task) = relock(&self.watch_task).take() {
            task.abort();
        }
    }
}

async fn wait_settled(mut state: watch::Receiver<LoadState>) {
    // A closed channel means the resource left the document.
    if state.wait_for(|load| load.is_settled()).await.is_err() {
        trace!("style resource dropped while pending");
    }
}
