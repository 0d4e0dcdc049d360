//! Pause, resume and termination.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use sixsim_core::events::Tag;
use sixsim_core::Asn;
use sixsim_telemetry::EventLogger;

use super::{EngineError, EngineStatus, EventOptions, SimEngine, StopReason};

/// Tag of the pause sentinel. At most one pause is pending.
pub const PAUSE_TAG: Tag = Tag::engine("pause");

/// Tag shared by the automatic end of run and `terminate_simulation`.
pub const END_TAG: Tag = Tag::engine("end_simulation");

impl SimEngine {
    /// Pauses the run loop once the batch at `asn` has been dispatched.
    ///
    /// Does nothing while already paused. A pending pause is replaced.
    /// `asn` may equal the current ASN, in which case the loop stops after
    /// the batch it is dispatching.
    pub fn pause_at_asn(&self, asn: Asn) -> Result<(), EngineError> {
        let guard = self.inner.state.lock();
        if guard.borrow().paused {
            debug!(asn, "already paused, pause request ignored");
            return Ok(());
        }
        let now = self.get_asn();
        if asn < now {
            return Err(EngineError::ScheduleInPast { asn, now });
        }
        self.insert_event(
            asn,
            Box::new(|engine: &SimEngine| {
                engine.action_pause();
                Ok(())
            }),
            EventOptions::new().tag(PAUSE_TAG),
        );
        Ok(())
    }

    /// Resumes a paused run loop. Does nothing unless paused.
    pub fn play(&self) {
        let guard = self.inner.state.lock();
        let mut state = guard.borrow_mut();
        if state.paused {
            state.paused = false;
            self.inner.gate.signal();
            debug!(asn = self.get_asn(), "play");
        }
    }

    /// Ends the run `delay` slots from now. Replaces the automatic end of run
    /// and any earlier termination request. Returns the ASN of the end.
    pub fn terminate_simulation(&self, delay: Asn) -> Result<Asn, EngineError> {
        let guard = self.inner.state.lock();
        let asn = self.asn_after(delay)?;
        self.schedule_at_asn(
            asn,
            |engine: &SimEngine| {
                engine.end_simulation(StopReason::Terminated);
                Ok(())
            },
            EventOptions::new().tag(END_TAG),
        )?;
        guard.borrow_mut().asn_end_experiment = Some(asn);
        info!(asn, "termination scheduled");
        Ok(asn)
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().borrow().paused
    }

    pub fn status(&self) -> EngineStatus {
        *self.inner.status.lock()
    }

    /// Blocks until the run loop is parked on the pause gate. Returns `false`
    /// on timeout.
    pub fn wait_until_paused(&self, timeout: Duration) -> bool {
        self.wait_for_status(timeout, |status| status == EngineStatus::Paused)
    }

    /// Blocks until the run loop has exited. Returns `false` on timeout.
    pub fn wait_until_ended(&self, timeout: Duration) -> bool {
        self.wait_for_status(timeout, |status| status == EngineStatus::Ended)
    }

    fn wait_for_status(&self, timeout: Duration, done: impl Fn(EngineStatus) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut status = self.inner.status.lock();
        while !done(*status) {
            if self
                .inner
                .status_changed
                .wait_until(&mut status, deadline)
                .timed_out()
            {
                return done(*status);
            }
        }
        true
    }

    pub(super) fn set_status(&self, status: EngineStatus) {
        *self.inner.status.lock() = status;
        self.inner.status_changed.notify_all();
    }

    fn action_pause(&self) {
        let guard = self.inner.state.lock();
        let mut state = guard.borrow_mut();
        state.paused = true;
        state.park_after_batch = true;
    }

    pub(super) fn end_simulation(&self, reason: StopReason) {
        let guard = self.inner.state.lock();
        let mut state = guard.borrow_mut();
        state.running = false;
        state.stop_reason = Some(reason);
        debug!(asn = self.get_asn(), ?reason, "end of simulation event");
    }

    /// Parks the run loop until `play`. A `play` that already happened left a
    /// permit on the gate, so the wait returns at once.
    pub(super) fn park(&self) {
        let asn = self.get_asn();
        if self.is_paused() {
            self.set_status(EngineStatus::Paused);
        }
        EventLogger::log_event("pause", asn, &[]);
        info!(asn, "simulation paused");

        self.inner.gate.wait();

        if self.is_running() {
            self.set_status(EngineStatus::Running);
            info!(asn = self.get_asn(), "simulation resumed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sixsim_config::SimSettings;

    fn engine() -> SimEngine {
        let mut settings = SimSettings::default();
        settings.secjoin.enabled = true;
        SimEngine::new(settings)
    }

    #[test]
    fn reserved_tags() {
        assert!(PAUSE_TAG.is_reserved());
        assert!(END_TAG.is_reserved());
        assert_ne!(PAUSE_TAG, END_TAG);
    }

    #[test]
    fn pause_in_past_is_rejected() {
        let engine = engine();
        engine
            .schedule_at_asn(5, |_: &SimEngine| Ok(()), EventOptions::new())
            .unwrap();
        engine.run().unwrap();
        assert!(matches!(
            engine.pause_at_asn(4),
            Err(EngineError::ScheduleInPast { asn: 4, now: 5 })
        ));
        engine.pause_at_asn(5).unwrap();
        assert!(engine.is_scheduled(&PAUSE_TAG));
    }

    #[test]
    fn second_pause_replaces_first() {
        let engine = engine();
        engine.pause_at_asn(10).unwrap();
        engine.pause_at_asn(20).unwrap();
        assert_eq!(engine.pending_events(), 1);
        assert_eq!(engine.next_event_asn(), Some(20));
    }

    #[test]
    fn play_without_pause_is_noop() {
        let engine = engine();
        engine.play();
        assert!(!engine.is_paused());
        assert_eq!(engine.inner.gate.available(), 0);
    }

    #[test]
    fn terminate_replaces_pending_end() {
        let engine = SimEngine::new(SimSettings::default());
        let end = engine.terminate_simulation(10).unwrap();
        assert_eq!(end, 10);
        assert_eq!(engine.asn_end_experiment(), Some(10));

        let end = engine.terminate_simulation(1).unwrap();
        assert_eq!(end, 1);
        assert_eq!(engine.pending_events(), 1);
        assert!(engine.is_scheduled(&END_TAG));
    }

    #[test]
    fn terminate_rejects_overflowing_delay() {
        let engine = engine();
        engine
            .schedule_at_asn(5, |_: &SimEngine| Ok(()), EventOptions::new())
            .unwrap();
        engine.run().unwrap();

        assert!(matches!(
            engine.terminate_simulation(Asn::MAX),
            Err(EngineError::AsnOverflow { now: 5, .. })
        ));
        assert!(matches!(
            engine.terminate_simulation(0),
            Err(EngineError::ScheduleInPast { asn: 5, now: 5 })
        ));
        assert_eq!(engine.asn_end_experiment(), None);
        assert!(!engine.is_scheduled(&END_TAG));
    }

    #[test]
    fn slot_conversion_rejects_huge_delays() {
        let mut settings = SimSettings::default();
        settings.tsch.slot_duration = 0.01;
        let engine = SimEngine::new(settings);
        assert_eq!(engine.slots_in(Duration::from_millis(35)).unwrap(), 3);
        assert!(matches!(
            engine.slots_in(Duration::from_secs(u64::MAX)),
            Err(EngineError::AsnOverflow { now: 0, .. })
        ));
        assert!(matches!(
            engine.schedule_in(
                Duration::from_secs(u64::MAX),
                |_: &SimEngine| Ok(()),
                EventOptions::new()
            ),
            Err(EngineError::AsnOverflow { .. })
        ));
        assert_eq!(engine.pending_events(), 0);
    }

    #[test]
    fn wait_for_status_times_out() {
        let engine = engine();
        assert!(!engine.wait_until_paused(Duration::from_millis(10)));
        assert!(!engine.wait_until_ended(Duration::from_millis(10)));
    }
}
