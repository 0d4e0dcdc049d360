//! Scheduling API exposed to collaborators.
//!
//! Every operation here takes the engine lock, so it is safe to call from a
//! controller thread and from inside a callback that the run loop is
//! currently executing (the lock is reentrant).

use std::time::Duration;

use tracing::trace;

use sixsim_core::events::{EventKey, Tag};
use sixsim_core::Asn;

use super::{Callback, EngineError, SimEngine};

/// Optional arguments of a scheduling call.
#[derive(Clone, Debug)]
pub struct EventOptions {
    tag: Option<Tag>,
    priority: i32,
    except_current: bool,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            tag: None,
            priority: 0,
            except_current: true,
        }
    }
}

impl EventOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the event. Any pending event with the same tag is replaced.
    pub fn tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Lower priorities dispatch first within one ASN.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// When replacing a tagged event, spare the one firing at the current ASN.
    /// Defaults to `true`.
    pub fn except_current(mut self, except_current: bool) -> Self {
        self.except_current = except_current;
        self
    }
}

impl SimEngine {
    /// Registers a hook invoked once, before the first event is dispatched.
    pub fn schedule_at_start<F>(&self, hook: F)
    where
        F: FnOnce(&SimEngine) -> anyhow::Result<()> + Send + 'static,
    {
        let guard = self.inner.state.lock();
        guard.borrow_mut().start_hooks.push(Box::new(hook));
    }

    /// Registers a hook invoked once, after the run loop stops.
    pub fn schedule_at_end<F>(&self, hook: F)
    where
        F: FnOnce(&SimEngine) -> anyhow::Result<()> + Send + 'static,
    {
        let guard = self.inner.state.lock();
        guard.borrow_mut().end_hooks.push(Box::new(hook));
    }

    /// Schedules `callback` at `asn`, which must be after the current ASN.
    pub fn schedule_at_asn<F>(
        &self,
        asn: Asn,
        callback: F,
        options: EventOptions,
    ) -> Result<EventKey, EngineError>
    where
        F: FnOnce(&SimEngine) -> anyhow::Result<()> + Send + 'static,
    {
        let _guard = self.inner.state.lock();
        let now = self.get_asn();
        if asn <= now {
            return Err(EngineError::ScheduleInPast { asn, now });
        }
        Ok(self.insert_event(asn, Box::new(callback), options))
    }

    /// Schedules `callback` `delay` from now. The delay is converted to slots
    /// and rounded down, so a delay shorter than one slot is rejected.
    pub fn schedule_in<F>(
        &self,
        delay: Duration,
        callback: F,
        options: EventOptions,
    ) -> Result<EventKey, EngineError>
    where
        F: FnOnce(&SimEngine) -> anyhow::Result<()> + Send + 'static,
    {
        let _guard = self.inner.state.lock();
        let asn = self.asn_after(self.slots_in(delay)?)?;
        self.schedule_at_asn(asn, callback, options)
    }

    /// Cancels every pending event carrying `tag`. With `except_current`, an
    /// event due at the current ASN is kept. Returns how many were removed.
    pub fn remove_event(&self, tag: &Tag, except_current: bool) -> usize {
        let guard = self.inner.state.lock();
        let spare = except_current.then(|| self.get_asn());
        let mut state = guard.borrow_mut();
        let removed = state.queue.remove_tagged(tag, spare);
        if removed > 0 {
            self.inner.metrics.record_cancelled(removed);
            self.inner.metrics.set_pending(state.queue.len());
        }
        removed
    }

    /// Number of whole slots in `delay`.
    pub fn slots_in(&self, delay: Duration) -> Result<Asn, EngineError> {
        let slots = delay.as_nanos() / self.inner.slot_duration.as_nanos().max(1);
        Asn::try_from(slots).map_err(|_| EngineError::AsnOverflow {
            now: self.get_asn(),
            delay: slots,
        })
    }

    /// The ASN `delay` slots from now.
    pub(super) fn asn_after(&self, delay: Asn) -> Result<Asn, EngineError> {
        let now = self.get_asn();
        now.checked_add(delay).ok_or(EngineError::AsnOverflow {
            now,
            delay: u128::from(delay),
        })
    }

    pub fn is_scheduled(&self, tag: &Tag) -> bool {
        let guard = self.inner.state.lock();
        let state = guard.borrow();
        state.queue.contains_tag(tag)
    }

    pub fn pending_events(&self) -> usize {
        let guard = self.inner.state.lock();
        let state = guard.borrow();
        state.queue.len()
    }

    /// ASN of the earliest pending event.
    pub fn next_event_asn(&self) -> Option<Asn> {
        let guard = self.inner.state.lock();
        let state = guard.borrow();
        state.queue.next_time()
    }

    /// Tag replacement plus ordered insert, without the time check. Sentinels
    /// go through here directly.
    pub(super) fn insert_event(
        &self,
        asn: Asn,
        callback: Callback,
        options: EventOptions,
    ) -> EventKey {
        let guard = self.inner.state.lock();
        if let Some(tag) = &options.tag {
            self.remove_event(tag, options.except_current);
        }
        let mut state = guard.borrow_mut();
        let key = state
            .queue
            .insert(asn, options.priority, options.tag, callback);
        self.inner.metrics.set_pending(state.queue.len());
        trace!(asn, priority = options.priority, pending = state.queue.len(), "event scheduled");
        key
    }
}
