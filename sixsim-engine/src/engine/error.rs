use thiserror::Error;

use sixsim_config::ConfigError;
use sixsim_core::events::Tag;
use sixsim_core::{Asn, CoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Events must be scheduled strictly after the current ASN.
    #[error("cannot schedule at ASN {asn}: current ASN is {now}")]
    ScheduleInPast { asn: Asn, now: Asn },

    #[error("a delay of {delay} slots from ASN {now} overflows the ASN counter")]
    AsnOverflow { now: Asn, delay: u128 },

    #[error("event queue went back in time: next event at ASN {next}, clock at ASN {now}")]
    ClockRegression { now: Asn, next: Asn },

    #[error("simulation engine not initialized")]
    NotInitialized,

    #[error("simulation engine already started")]
    AlreadyStarted,

    #[error("boot failed during {stage}: {source}")]
    Boot {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("callback {} at ASN {time} failed: {source}", display_tag(.tag))]
    Callback {
        time: Asn,
        tag: Option<Tag>,
        #[source]
        source: anyhow::Error,
    },

    #[error("{phase} hook failed: {source}")]
    Hook {
        phase: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn run loop thread: {0}")]
    Spawn(#[from] std::io::Error),
}

fn display_tag(tag: &Option<Tag>) -> String {
    match tag {
        Some(tag) => tag.to_string(),
        None => "<untagged>".into(),
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ClockRegression { now, requested } => {
                EngineError::ClockRegression { now, next: requested }
            }
        }
    }
}
