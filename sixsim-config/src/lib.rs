//! # sixsim Configuration System
//!
//! Hierarchical settings for a simulation run. The engine reads the slot
//! duration, the run length and the termination mode from here; the reference
//! collaborators read the rest.
//!
//! ## Features
//! - **Layered**: defaults, YAML files and `SIXSIM_*` environment variables
//! - **Validation**: every section is checked with `validator` after merging

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

mod connectivity;
mod error;
mod exec;
mod telemetry;
mod topology;
mod tsch;
mod validation;

pub use connectivity::{ConnectivityConfig, PhyConfig, SecjoinConfig};
pub use error::ConfigError;
pub use exec::ExecConfig;
pub use telemetry::TelemetryConfig;
pub use topology::TopologyConfig;
pub use tsch::TschConfig;

/// Top‑level settings of one simulation run.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct SimSettings {
    /// Run length, node count and seed.
    #[validate(nested)]
    #[serde(default)]
    pub exec: ExecConfig,

    /// Slot timing.
    #[validate(nested)]
    #[serde(default)]
    pub tsch: TschConfig,

    /// Join process. When enabled the run ends on an external join
    /// condition instead of an automatic end-of-simulation event.
    #[validate(nested)]
    #[serde(default)]
    pub secjoin: SecjoinConfig,

    /// Connectivity model.
    #[validate(nested)]
    #[serde(default)]
    pub conn: ConnectivityConfig,

    /// Physical layer.
    #[validate(nested)]
    #[serde(default)]
    pub phy: PhyConfig,

    /// Node placement.
    #[validate(nested)]
    #[serde(default)]
    pub topology: TopologyConfig,

    /// Logging.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl SimSettings {
    /// Load settings from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/sixsim.yaml` - Base settings. If missing, defaults are used.
    /// 3. `config/<environment>.yaml` - Overrides picked by `SIXSIM_ENV`.
    /// 4. `SIXSIM_*` environment variables, sections split on `__`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(SimSettings::default()));

        if Path::new("config/sixsim.yaml").exists() {
            figment = figment.merge(Yaml::file("config/sixsim.yaml"));
        } else {
            debug!("config/sixsim.yaml not found, using default settings");
        }

        let env = std::env::var("SIXSIM_ENV").unwrap_or_else(|_| "development".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment)
    }

    /// Load settings from a specific file, on top of defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        let figment =
            Figment::from(Serialized::defaults(SimSettings::default())).merge(Yaml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed("SIXSIM_").ignore(&["env"]).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|settings: Self| {
                settings.validate()?;
                Ok(settings)
            })
    }

    /// Duration of one slot.
    pub fn slot_duration(&self) -> Duration {
        Duration::from_secs_f64(self.tsch.slot_duration)
    }

    /// ASN of the automatic end-of-simulation event.
    pub fn run_length_slots(&self) -> u64 {
        self.tsch.slotframe_length * self.exec.num_slotframes_per_run
    }

    /// Wall length of the configured run, in seconds of virtual time.
    pub fn run_length_secs(&self) -> f64 {
        self.run_length_slots() as f64 * self.tsch.slot_duration
    }

    /// Whether the engine should schedule its own end-of-simulation event.
    pub fn auto_end(&self) -> bool {
        !self.secjoin.enabled
    }
}
