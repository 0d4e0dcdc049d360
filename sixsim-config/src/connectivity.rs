//! Connectivity, physical layer and join settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ConnectivityConfig {
    /// Connectivity model (Linear, FullyMeshed, K7).
    #[validate(custom(function = validation::validate_conn_class))]
    #[serde(default = "default_conn_class")]
    pub class: String,

    /// Trace file for the K7 model.
    #[serde(default)]
    pub trace: Option<PathBuf>,
}

fn default_conn_class() -> String {
    "Linear".into()
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            class: default_conn_class(),
            trace: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct PhyConfig {
    /// Number of channels in use, taken from the front of the hopping
    /// sequence.
    #[validate(range(min = 1, max = 16))]
    #[serde(default = "default_num_chans")]
    pub num_chans: u8,
}

fn default_num_chans() -> u8 {
    16
}

impl Default for PhyConfig {
    fn default() -> Self {
        Self {
            num_chans: default_num_chans(),
        }
    }
}

#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone)]
pub struct SecjoinConfig {
    #[serde(default)]
    pub enabled: bool,
}
