//! Slot timing.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TschConfig {
    /// Duration of one slot, in seconds. Delay-based scheduling divides by
    /// this value to find the target ASN.
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    #[serde(default = "default_slot_duration")]
    pub slot_duration: f64,

    /// Slots per slotframe.
    #[validate(range(min = 1, max = 65535))]
    #[serde(default = "default_slotframe_length")]
    pub slotframe_length: u64,
}

fn default_slot_duration() -> f64 {
    0.010
}

fn default_slotframe_length() -> u64 {
    101
}

impl Default for TschConfig {
    fn default() -> Self {
        Self {
            slot_duration: default_slot_duration(),
            slotframe_length: default_slotframe_length(),
        }
    }
}
