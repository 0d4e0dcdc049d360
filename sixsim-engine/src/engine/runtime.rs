//! Simulation engine core: owns the clock and the event queue and drives the
//! dispatch loop.
//!
//! # Locking
//!
//! All mutable engine state sits behind one `ReentrantMutex<RefCell<_>>`.
//! The run loop holds the lock for a whole batch and callbacks re-enter it
//! through the scheduling API. A `RefCell` borrow is never held across a
//! callback invocation; that is what keeps re-entry from panicking.
//!
//! The clock lives outside the lock so `get_asn` never blocks behind a batch.

use std::cell::RefCell;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, ReentrantMutex};
use tracing::{debug, info, instrument, trace, warn};

use sixsim_config::SimSettings;
use sixsim_core::events::EventQueue;
use sixsim_core::sync::PauseGate;
use sixsim_core::time::VirtualClock;
use sixsim_core::{Asn, NodeId};
use sixsim_telemetry::{EventLogger, MetricsRecorder};

use super::control::{END_TAG, PAUSE_TAG};
use super::{EngineError, EventOptions};
use crate::collaborators::{Connectivity, Node, Scenario};

/// A scheduled action. Arguments are whatever the closure captured.
pub type Callback = Box<dyn FnOnce(&SimEngine) -> anyhow::Result<()> + Send>;

/// Lifecycle of an engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Running,
    Paused,
    Ended,
}

/// Why the run loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// No event left to dispatch.
    QueueExhausted,
    /// The run reached its configured length.
    EndOfSimulation,
    /// `terminate_simulation` ended the run, or the engine was destroyed
    /// while running.
    Terminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub stop_reason: StopReason,
    pub final_asn: Asn,
    pub events_dispatched: u64,
    pub batches: u64,
}

pub(super) struct EngineState {
    pub(super) queue: EventQueue<Callback>,
    pub(super) running: bool,
    pub(super) started: bool,
    pub(super) paused: bool,
    /// Set by the pause sentinel; the run loop parks once the batch is done.
    pub(super) park_after_batch: bool,
    pub(super) start_hooks: Vec<Callback>,
    pub(super) end_hooks: Vec<Callback>,
    pub(super) asn_end_experiment: Option<Asn>,
    pub(super) stop_reason: Option<StopReason>,
    /// Bumped by `destroy`. A run loop that outlives its generation leaves
    /// the status alone on exit.
    pub(super) generation: u64,
}

impl EngineState {
    fn new() -> Self {
        Self {
            queue: EventQueue::new(),
            running: false,
            started: false,
            paused: false,
            park_after_batch: false,
            start_hooks: Vec::new(),
            end_hooks: Vec::new(),
            asn_end_experiment: None,
            stop_reason: None,
            generation: 0,
        }
    }
}

pub(super) struct EngineInner {
    pub(super) state: ReentrantMutex<RefCell<EngineState>>,
    pub(super) clock: VirtualClock,
    pub(super) gate: PauseGate,
    pub(super) status: Mutex<EngineStatus>,
    pub(super) status_changed: Condvar,
    pub(super) settings: Arc<SimSettings>,
    pub(super) slot_duration: Duration,
    pub(super) connectivity: Mutex<Option<Box<dyn Connectivity>>>,
    pub(super) nodes: Mutex<Vec<Box<dyn Node>>>,
    pub(super) metrics: Arc<MetricsRecorder>,
}

/// Handle to a simulation engine. Cloning is cheap and every clone drives
/// the same engine.
#[derive(Clone)]
pub struct SimEngine {
    pub(super) inner: Arc<EngineInner>,
}

impl SimEngine {
    /// Creates an engine with no collaborators: no connectivity model, no
    /// nodes. Events are scheduled directly by the caller.
    pub fn new(settings: SimSettings) -> Self {
        let slot_duration = settings.slot_duration();
        Self {
            inner: Arc::new(EngineInner {
                state: ReentrantMutex::new(RefCell::new(EngineState::new())),
                clock: VirtualClock::new(),
                gate: PauseGate::new(),
                status: Mutex::new(EngineStatus::Idle),
                status_changed: Condvar::new(),
                settings: Arc::new(settings),
                slot_duration,
                connectivity: Mutex::new(None),
                nodes: Mutex::new(Vec::new()),
                metrics: Arc::new(MetricsRecorder::new()),
            }),
        }
    }

    /// Builds the connectivity model, the nodes and their placement from
    /// `scenario`, then boots every node once.
    ///
    /// A collaborator failure aborts the boot. The connectivity model, if it
    /// was already built, is destroyed before the error is returned.
    #[instrument(skip_all, fields(conn = %settings.conn.class))]
    pub fn boot(settings: SimSettings, scenario: &dyn Scenario) -> Result<Self, EngineError> {
        let engine = SimEngine::new(settings);
        let settings = Arc::clone(&engine.inner.settings);

        let mut connectivity = scenario
            .connectivity(&settings)
            .map_err(|source| EngineError::Boot {
                stage: "connectivity",
                source,
            })?;

        let nodes = match engine.build_nodes(&settings, scenario, connectivity.as_ref()) {
            Ok(nodes) => nodes,
            Err(err) => {
                warn!("boot aborted: {err}");
                connectivity.destroy();
                return Err(err);
            }
        };

        info!(
            connectivity = connectivity.kind(),
            nodes = nodes.len(),
            "simulation engine booted"
        );
        *engine.inner.connectivity.lock() = Some(connectivity);
        *engine.inner.nodes.lock() = nodes;
        Ok(engine)
    }

    fn build_nodes(
        &self,
        settings: &SimSettings,
        scenario: &dyn Scenario,
        connectivity: &dyn Connectivity,
    ) -> Result<Vec<Box<dyn Node>>, EngineError> {
        let count = settings
            .exec
            .num_motes
            .or_else(|| connectivity.node_count())
            .ok_or_else(|| EngineError::Boot {
                stage: "node count",
                source: anyhow::anyhow!(
                    "exec.num_motes is unset and connectivity '{}' does not define a node count",
                    connectivity.kind()
                ),
            })?;

        let mut nodes = (0..count)
            .map(|id| scenario.node(id as NodeId, settings))
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|source| EngineError::Boot {
                stage: "nodes",
                source,
            })?;

        scenario
            .topology(settings)
            .and_then(|mut topology| topology.create_topology(&mut nodes))
            .map_err(|source| EngineError::Boot {
                stage: "topology",
                source,
            })?;

        for node in nodes.iter_mut() {
            debug!(node = node.id(), "booting node");
            node.boot(self).map_err(|source| EngineError::Boot {
                stage: "node boot",
                source,
            })?;
        }
        Ok(nodes)
    }

    /// Runs the dispatch loop on the calling thread until the queue drains or
    /// the end-of-simulation event fires. An engine runs at most once until
    /// it is destroyed.
    ///
    /// The automatic end of run is only injected when no end event is
    /// pending. A `terminate_simulation` issued before `run` therefore wins
    /// over the configured run length, unlike engines that always schedule
    /// the end at startup and so replace an earlier termination request.
    #[instrument(skip(self), name = "run_loop")]
    pub fn run(&self) -> Result<RunSummary, EngineError> {
        let generation = self.begin_run()?;

        if self.inner.settings.auto_end() && !self.is_scheduled(&END_TAG) {
            let end = self.inner.settings.run_length_slots();
            let scheduled = self.schedule_at_asn(
                end,
                |engine: &SimEngine| {
                    engine.end_simulation(StopReason::EndOfSimulation);
                    Ok(())
                },
                EventOptions::new().tag(END_TAG),
            );
            if let Err(err) = scheduled {
                warn!(asn = end, "cannot schedule end of run: {err}");
                self.finish(generation);
                return Err(err);
            }
        }

        let start_hooks = std::mem::take(&mut self.inner.state.lock().borrow_mut().start_hooks);
        for hook in start_hooks {
            if let Err(source) = hook(self) {
                self.finish(generation);
                return Err(EngineError::Hook {
                    phase: "start",
                    source,
                });
            }
        }

        info!(asn = self.get_asn(), "thread SimEngine starting");
        EventLogger::log_event("start", self.get_asn(), &[]);

        let mut events_dispatched = 0u64;
        let mut batches = 0u64;

        let stop_reason = loop {
            if !self.is_running() {
                let reason = self.inner.state.lock().borrow().stop_reason;
                break reason.unwrap_or(StopReason::Terminated);
            }

            let guard = self.inner.state.lock();

            let next = guard
                .borrow()
                .queue
                .peek()
                .map(|event| (event.time(), event.tag() == Some(&PAUSE_TAG)));
            let Some((time, is_pause)) = next else {
                info!(asn = self.get_asn(), "end of simulation, no more events");
                break StopReason::QueueExhausted;
            };

            let now = self.get_asn();
            if time < now && !is_pause {
                self.finish(generation);
                return Err(EngineError::ClockRegression { now, next: time });
            }
            if time > now {
                self.inner.clock.advance_to(time)?;
            }

            let mut batch = 0usize;
            loop {
                // The borrow ends with this statement, before the callback
                // runs and possibly re-enters the engine.
                let event = guard.borrow_mut().queue.pop_due(time);
                let Some(event) = event else {
                    break;
                };
                let (tag, callback) = event.into_parts();
                trace!(asn = time, tag = ?tag, "dispatching event");
                if let Err(source) = callback(self) {
                    self.finish(generation);
                    return Err(EngineError::Callback { time, tag, source });
                }
                batch += 1;
            }

            let park = {
                let mut state = guard.borrow_mut();
                self.inner.metrics.set_pending(state.queue.len());
                std::mem::take(&mut state.park_after_batch)
            };
            drop(guard);

            if batch > 0 {
                batches += 1;
                events_dispatched += batch as u64;
                self.inner.metrics.record_batch(batch);
                debug!(asn = time, events = batch, "batch dispatched");
            }

            if park {
                self.park();
            }
        };

        let final_asn = self.get_asn();
        self.inner.state.lock().borrow_mut().running = false;

        let end_hooks = std::mem::take(&mut self.inner.state.lock().borrow_mut().end_hooks);
        for hook in end_hooks {
            if let Err(source) = hook(self) {
                self.finish(generation);
                return Err(EngineError::Hook {
                    phase: "end",
                    source,
                });
            }
        }

        self.finish(generation);
        EventLogger::log_event("end", final_asn, &[("reason", format!("{:?}", stop_reason))]);
        info!(asn = final_asn, events_dispatched, batches, "thread SimEngine ends");

        Ok(RunSummary {
            stop_reason,
            final_asn,
            events_dispatched,
            batches,
        })
    }

    /// Runs the dispatch loop on a dedicated thread named `SimEngine`.
    pub fn start(&self) -> Result<JoinHandle<Result<RunSummary, EngineError>>, EngineError> {
        let engine = self.clone();
        let handle = thread::Builder::new()
            .name("SimEngine".into())
            .spawn(move || engine.run())?;
        Ok(handle)
    }

    /// Marks the engine started and returns the generation the run belongs to.
    fn begin_run(&self) -> Result<u64, EngineError> {
        let guard = self.inner.state.lock();
        let mut state = guard.borrow_mut();
        if state.started {
            return Err(EngineError::AlreadyStarted);
        }
        state.started = true;
        state.running = true;
        let generation = state.generation;
        drop(state);
        self.set_status(EngineStatus::Running);
        Ok(generation)
    }

    /// Stops the run of `generation`. An engine destroyed since then stays
    /// `Idle`.
    fn finish(&self, generation: u64) {
        let guard = self.inner.state.lock();
        let mut state = guard.borrow_mut();
        if state.generation != generation {
            debug!(generation, "run loop outlived a destroy, status left idle");
            return;
        }
        state.running = false;
        self.set_status(EngineStatus::Ended);
    }

    pub(super) fn is_running(&self) -> bool {
        self.inner.state.lock().borrow().running
    }

    /// Tears the engine down: the connectivity model is destroyed first, then
    /// the queue, hooks, nodes and clock are cleared. A parked run loop is
    /// released and exits on its next iteration.
    #[instrument(skip(self))]
    pub fn destroy(&self) {
        if let Some(mut connectivity) = self.inner.connectivity.lock().take() {
            debug!(connectivity = connectivity.kind(), "destroying connectivity");
            connectivity.destroy();
        }

        {
            let guard = self.inner.state.lock();
            let mut state = guard.borrow_mut();
            let was_paused = state.paused;
            state.queue.clear();
            state.start_hooks.clear();
            state.end_hooks.clear();
            state.running = false;
            state.started = false;
            state.paused = false;
            state.park_after_batch = false;
            state.asn_end_experiment = None;
            state.stop_reason = None;
            state.generation += 1;
            if was_paused {
                self.inner.gate.signal();
            }
        }

        self.inner.nodes.lock().clear();
        self.inner.clock.reset();
        self.inner.metrics.set_pending(0);
        self.set_status(EngineStatus::Idle);
        info!("simulation engine destroyed");
    }

    /// Current ASN.
    pub fn get_asn(&self) -> Asn {
        self.inner.clock.now()
    }

    pub fn settings(&self) -> &SimSettings {
        &self.inner.settings
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.inner.metrics
    }

    /// ASN at which the last `terminate_simulation` request will end the run.
    pub fn asn_end_experiment(&self) -> Option<Asn> {
        self.inner.state.lock().borrow().asn_end_experiment
    }

    /// Runs `f` against the connectivity model, if the engine has one.
    ///
    /// The engine lock is taken before the connectivity lock, the order a
    /// callback on the run loop takes them in, so `f` may use the
    /// scheduling API.
    pub fn with_connectivity<R>(&self, f: impl FnOnce(&dyn Connectivity) -> R) -> Option<R> {
        let _guard = self.inner.state.lock();
        self.inner.connectivity.lock().as_deref().map(|c| f(c))
    }

    /// Runs `f` against the booted nodes. Locks in the same order as
    /// [`with_connectivity`](Self::with_connectivity).
    pub fn with_nodes<R>(&self, f: impl FnOnce(&[Box<dyn Node>]) -> R) -> R {
        let _guard = self.inner.state.lock();
        f(&self.inner.nodes.lock())
    }

    pub fn node_count(&self) -> usize {
        let _guard = self.inner.state.lock();
        self.inner.nodes.lock().len()
    }

    /// Whether `other` is a handle to the same engine.
    pub fn same_engine(&self, other: &SimEngine) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for SimEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEngine")
            .field("asn", &self.get_asn())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sixsim_core::events::Tag;
    use tracing_test::traced_test;

    fn engine() -> SimEngine {
        let mut settings = SimSettings::default();
        settings.secjoin.enabled = true;
        SimEngine::new(settings)
    }

    #[test]
    fn dispatches_by_time_then_priority() {
        let engine = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for (asn, priority) in [(5, 0), (5, 1), (3, 0)] {
            let seen = Arc::clone(&seen);
            engine
                .schedule_at_asn(
                    asn,
                    move |engine: &SimEngine| {
                        seen.lock().push((asn, priority, engine.get_asn()));
                        Ok(())
                    },
                    EventOptions::new().priority(priority),
                )
                .unwrap();
        }

        let summary = engine.run().unwrap();
        assert_eq!(*seen.lock(), vec![(3, 0, 3), (5, 0, 5), (5, 1, 5)]);
        assert_eq!(summary.stop_reason, StopReason::QueueExhausted);
        assert_eq!(summary.events_dispatched, 3);
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.final_asn, 5);
    }

    #[test]
    fn auto_end_stops_at_run_length() {
        let mut settings = SimSettings::default();
        settings.tsch.slotframe_length = 10;
        settings.exec.num_slotframes_per_run = 2;
        let engine = SimEngine::new(settings);
        let fired = Arc::new(AtomicUsize::new(0));
        for asn in [5, 20, 21, 40] {
            let fired = Arc::clone(&fired);
            engine
                .schedule_at_asn(
                    asn,
                    move |_: &SimEngine| {
                        fired.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    },
                    EventOptions::new(),
                )
                .unwrap();
        }

        let summary = engine.run().unwrap();
        assert_eq!(summary.stop_reason, StopReason::EndOfSimulation);
        assert_eq!(summary.final_asn, 20);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(engine.pending_events(), 2);
    }

    #[test]
    fn callbacks_can_reschedule_themselves() {
        let engine = engine();
        let count = Arc::new(AtomicUsize::new(0));

        fn tick(count: Arc<AtomicUsize>) -> Callback {
            Box::new(move |engine: &SimEngine| {
                if count.fetch_add(1, Ordering::SeqCst) < 4 {
                    engine.schedule_at_asn(
                        engine.get_asn() + 2,
                        tick(Arc::clone(&count)),
                        EventOptions::new().tag(Tag::global("tick")),
                    )?;
                }
                Ok(())
            })
        }

        engine
            .schedule_at_asn(1, tick(Arc::clone(&count)), EventOptions::new())
            .unwrap();
        let summary = engine.run().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(summary.final_asn, 9);
    }

    #[test]
    #[traced_test]
    fn logs_loop_lifecycle() {
        let engine = engine();
        engine
            .schedule_at_asn(2, |_: &SimEngine| Ok(()), EventOptions::new())
            .unwrap();
        engine.run().unwrap();
        assert!(logs_contain("thread SimEngine starting"));
        assert!(logs_contain("end of simulation, no more events"));
        assert!(logs_contain("thread SimEngine ends"));
    }

    #[test]
    fn run_only_once() {
        let engine = engine();
        engine.run().unwrap();
        assert!(matches!(engine.run(), Err(EngineError::AlreadyStarted)));
        assert_eq!(engine.status(), EngineStatus::Ended);
    }

    #[test]
    fn callback_error_aborts_run() {
        let engine = engine();
        let ended = Arc::new(AtomicUsize::new(0));
        {
            let ended = Arc::clone(&ended);
            engine.schedule_at_end(move |_: &SimEngine| {
                ended.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        engine
            .schedule_at_asn(
                2,
                |_: &SimEngine| Err(anyhow::anyhow!("radio on fire")),
                EventOptions::new().tag(Tag::node(4, "tx")),
            )
            .unwrap();
        engine
            .schedule_at_asn(3, |_: &SimEngine| Ok(()), EventOptions::new())
            .unwrap();

        let err = engine.run().unwrap_err();
        match err {
            EngineError::Callback { time, tag, .. } => {
                assert_eq!(time, 2);
                assert_eq!(tag, Some(Tag::node(4, "tx")));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ended.load(Ordering::SeqCst), 0);
        assert_eq!(engine.pending_events(), 1);
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let engine = engine();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["start-a", "start-b"] {
            let log = Arc::clone(&log);
            engine.schedule_at_start(move |_: &SimEngine| {
                log.lock().push(name);
                Ok(())
            });
        }
        for name in ["end-a", "end-b"] {
            let log = Arc::clone(&log);
            engine.schedule_at_end(move |_: &SimEngine| {
                log.lock().push(name);
                Ok(())
            });
        }
        {
            let log = Arc::clone(&log);
            engine
                .schedule_at_asn(
                    1,
                    move |_: &SimEngine| {
                        log.lock().push("event");
                        Ok(())
                    },
                    EventOptions::new(),
                )
                .unwrap();
        }

        engine.run().unwrap();
        assert_eq!(
            *log.lock(),
            vec!["start-a", "start-b", "event", "end-a", "end-b"]
        );
    }

    #[test]
    fn failed_end_of_run_setup_ends_the_engine() {
        let mut settings = SimSettings::default();
        settings.exec.num_slotframes_per_run = 0;
        let engine = SimEngine::new(settings);

        assert!(matches!(
            engine.run(),
            Err(EngineError::ScheduleInPast { asn: 0, now: 0 })
        ));
        assert_eq!(engine.status(), EngineStatus::Ended);
        assert!(engine.wait_until_ended(Duration::ZERO));
        assert!(!engine.is_running());
    }

    #[test]
    fn node_access_while_loop_dispatches() {
        let engine = engine();
        for asn in 1..=200 {
            engine
                .schedule_at_asn(
                    asn,
                    |engine: &SimEngine| {
                        let _ = engine.node_count();
                        let _ = engine.with_connectivity(|c| c.kind().len());
                        Ok(())
                    },
                    EventOptions::new(),
                )
                .unwrap();
        }

        let handle = engine.start().unwrap();
        while !engine.wait_until_ended(Duration::ZERO) {
            engine.with_nodes(|nodes| {
                assert!(nodes.is_empty());
                let _ = engine.pending_events();
            });
        }
        assert_eq!(handle.join().unwrap().unwrap().events_dispatched, 200);
    }

    #[test]
    fn destroy_resets_state() {
        let engine = engine();
        engine
            .schedule_at_asn(4, |_: &SimEngine| Ok(()), EventOptions::new())
            .unwrap();
        engine.run().unwrap();
        engine
            .schedule_at_asn(9, |_: &SimEngine| Ok(()), EventOptions::new())
            .unwrap();
        assert_eq!(engine.get_asn(), 4);

        engine.destroy();
        assert_eq!(engine.get_asn(), 0);
        assert_eq!(engine.pending_events(), 0);
        assert_eq!(engine.status(), EngineStatus::Idle);
    }
}
