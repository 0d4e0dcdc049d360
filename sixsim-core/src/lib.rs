//! # sixsim-core
//!
//! Foundation layer for the discrete-event engine.
//! Everything here is free of engine policy: the queue does not know what a
//! callback is, the clock does not know who advances it.
//!
//! ### Key Submodules:
//! - `events`: `Event`, `Tag`, `EventKey` and the ordered `EventQueue`
//! - `time`: `VirtualClock`, the slot counter read lock-free by controllers
//! - `sync`: `PauseGate`, the counting gate the run loop parks on
//!
//! ### Ordering:
//! Events are ordered by `(time, priority, sequence)` where `sequence` is the
//! insertion counter of the queue. Two runs issuing the same scheduling calls
//! dispatch in the same order.

pub mod error;
pub mod events;
pub mod sync;
pub mod time;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::sync::*;
    pub use crate::time::*;
}

pub use error::CoreError;

/// Index of a simulated node. Nodes are numbered `0..n` at boot.
pub type NodeId = u32;

/// Absolute slot number, the unit of virtual time.
pub type Asn = u64;
