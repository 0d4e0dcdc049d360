//! ## sixsim-core::time
//! **Virtual clock counted in slots**
//!
//! The clock is shared between the run loop, which is the only writer, and
//! any number of controller threads reading the current ASN. Reads never take
//! the engine lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::{Asn, CoreError};

/// A monotonic slot counter.
#[derive(Clone, Debug, Default)]
pub struct VirtualClock {
    asn: Arc<AtomicU64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a clock that already reads `asn`.
    pub fn starting_at(asn: Asn) -> Self {
        Self {
            asn: Arc::new(AtomicU64::new(asn)),
        }
    }

    /// Returns the current ASN.
    #[inline]
    pub fn now(&self) -> Asn {
        self.asn.load(Ordering::Acquire)
    }

    /// Moves the clock to `asn`. Staying on the same value is allowed,
    /// going backwards is not.
    #[inline]
    pub fn advance_to(&self, asn: Asn) -> Result<(), CoreError> {
        let now = self.now();
        if asn < now {
            return Err(CoreError::ClockRegression {
                now,
                requested: asn,
            });
        }
        self.asn.store(asn, Ordering::Release);
        Ok(())
    }

    /// Puts the clock back to zero. Only used when an engine is torn down.
    pub fn reset(&self) {
        self.asn.store(0, Ordering::Release);
    }
}
