//! Node placement.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TopologyConfig {
    /// Placement strategy (Linear, Random).
    #[validate(custom(function = validation::validate_topology_class))]
    #[serde(default = "default_topology_class")]
    pub class: String,

    /// Distance between neighbours on a line, in metres.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_spacing")]
    pub spacing_m: f64,

    /// Side of the square random placements are drawn from, in metres.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_square_side")]
    pub square_side_m: f64,
}

fn default_topology_class() -> String {
    "Linear".into()
}

fn default_spacing() -> f64 {
    30.0
}

fn default_square_side() -> f64 {
    2000.0
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            class: default_topology_class(),
            spacing_m: default_spacing(),
            square_side_m: default_square_side(),
        }
    }
}
