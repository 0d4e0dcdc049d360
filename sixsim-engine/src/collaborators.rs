//! Seams between the engine and the models it drives.
//!
//! The engine never looks inside these objects. It builds them once at boot
//! through a [`Scenario`], boots every node exactly once, and tears the
//! connectivity model down when it is destroyed.

use sixsim_config::SimSettings;
use sixsim_core::NodeId;

use crate::SimEngine;

/// Planar coordinates of a node, in metres.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Radio propagation between nodes.
pub trait Connectivity: Send {
    /// Model name, for logs.
    fn kind(&self) -> &str;

    /// Node count imposed by the model. Trace-driven models know how many
    /// nodes they describe; synthetic ones return `None`.
    fn node_count(&self) -> Option<usize> {
        None
    }

    /// Packet delivery ratio from `src` to `dst` on `channel`, in `[0, 1]`.
    fn pdr(&self, src: NodeId, dst: NodeId, channel: u8) -> f64;

    /// Received signal strength from `src` to `dst` on `channel`, in dBm.
    fn rssi(&self, src: NodeId, dst: NodeId, channel: u8) -> f64;

    /// Releases whatever the model holds. Called once, when the engine is
    /// destroyed or its boot fails.
    fn destroy(&mut self) {}
}

/// Node placement.
pub trait Topology {
    fn create_topology(&mut self, nodes: &mut [Box<dyn Node>]) -> anyhow::Result<()>;
}

/// A simulated device.
pub trait Node: Send {
    fn id(&self) -> NodeId;

    fn position(&self) -> Position;

    fn set_position(&mut self, position: Position);

    /// Called exactly once per node, after placement. Nodes schedule their
    /// first events here.
    fn boot(&mut self, engine: &SimEngine) -> anyhow::Result<()>;
}

/// Builds the collaborators of one engine.
pub trait Scenario {
    fn connectivity(&self, settings: &SimSettings) -> anyhow::Result<Box<dyn Connectivity>>;

    fn topology(&self, settings: &SimSettings) -> anyhow::Result<Box<dyn Topology>>;

    fn node(&self, id: NodeId, settings: &SimSettings) -> anyhow::Result<Box<dyn Node>>;
}
