mod control;
mod error;
mod runtime;
mod schedule;

pub use self::{
    control::{END_TAG, PAUSE_TAG},
    error::EngineError,
    runtime::{Callback, EngineStatus, RunSummary, SimEngine, StopReason},
    schedule::EventOptions,
};

pub mod prelude {
    pub use super::{
        EngineError, EngineStatus, EventOptions, RunSummary, SimEngine, StopReason, END_TAG,
        PAUSE_TAG,
    };
}
