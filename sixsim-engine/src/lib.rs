//! # sixsim-engine
//!
//! The discrete-event engine of the simulator: a [`SimEngine`] handle that
//! owns the clock and the event queue, dispatches events in
//! `(time, priority, insertion)` order and can be paused, resumed and
//! terminated from other threads.
//!
//! ### Key Submodules:
//! - `engine`: scheduling API, run loop and control surface
//! - `collaborators`: traits for the connectivity model, topology and nodes
//! - `registry`: `EngineRegistry`, the holder of a process-wide engine
//!
//! ### Reentrancy:
//! Callbacks receive `&SimEngine` and may schedule or cancel events while the
//! run loop is dispatching them. Dispatch of an ASN only ends once no event
//! due at that ASN remains.

pub mod collaborators;
pub mod engine;
pub mod registry;

pub use collaborators::{Connectivity, Node, Position, Scenario, Topology};
pub use engine::{
    Callback, EngineError, EngineStatus, EventOptions, RunSummary, SimEngine, StopReason,
    END_TAG, PAUSE_TAG,
};
pub use registry::EngineRegistry;

pub mod prelude {
    pub use crate::collaborators::*;
    pub use crate::engine::prelude::*;
    pub use crate::registry::EngineRegistry;
    pub use sixsim_core::events::Tag;
    pub use sixsim_core::{Asn, NodeId};
}
