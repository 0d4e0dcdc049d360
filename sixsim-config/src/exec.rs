//! Run length, node count and seed.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ExecConfig {
    /// Number of motes. Left unset when a trace-driven connectivity model
    /// dictates the node count.
    #[validate(range(min = 1, max = 10000))]
    #[serde(default = "default_num_motes")]
    pub num_motes: Option<usize>,

    /// Slotframes in one run. The automatic end-of-simulation event fires at
    /// `tsch.slotframe_length * num_slotframes_per_run`.
    #[validate(range(min = 1))]
    #[serde(default = "default_num_slotframes_per_run")]
    pub num_slotframes_per_run: u64,

    /// Seed for every seeded collaborator (topology, random links).
    #[serde(default)]
    pub random_seed: u64,
}

fn default_num_motes() -> Option<usize> {
    Some(10)
}

fn default_num_slotframes_per_run() -> u64 {
    100
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            num_motes: default_num_motes(),
            num_slotframes_per_run: default_num_slotframes_per_run(),
            random_seed: 0,
        }
    }
}
