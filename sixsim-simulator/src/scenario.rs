//! The collaborators a run gets unless the caller brings its own.

use std::sync::Arc;

use sixsim_config::SimSettings;
use sixsim_core::NodeId;
use sixsim_engine::{Connectivity, Node, Scenario, Topology};

use crate::connectivity;
use crate::mote::{BeaconMote, BeaconStats};
use crate::topology;

/// Connectivity and topology picked from the settings, one [`BeaconMote`]
/// per node.
#[derive(Debug, Default)]
pub struct DefaultScenario {
    stats: Arc<BeaconStats>,
}

impl DefaultScenario {
    pub fn new() -> Self {
        Self::default()
    }

    /// Beacon counters of every mote this scenario built.
    pub fn stats(&self) -> Arc<BeaconStats> {
        Arc::clone(&self.stats)
    }
}

impl Scenario for DefaultScenario {
    fn connectivity(&self, settings: &SimSettings) -> anyhow::Result<Box<dyn Connectivity>> {
        Ok(Box::new(connectivity::from_settings(settings)?))
    }

    fn topology(&self, settings: &SimSettings) -> anyhow::Result<Box<dyn Topology>> {
        topology::from_settings(settings)
    }

    fn node(&self, id: NodeId, settings: &SimSettings) -> anyhow::Result<Box<dyn Node>> {
        Ok(Box::new(BeaconMote::new(id, settings, self.stats())))
    }
}
