//! Node placement.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use sixsim_config::SimSettings;
use sixsim_engine::{Node, Position, Topology};

/// Nodes on a line, `spacing_m` apart, in id order.
#[derive(Debug, Clone)]
pub struct LinearTopology {
    spacing_m: f64,
}

impl LinearTopology {
    pub fn new(spacing_m: f64) -> Self {
        Self { spacing_m }
    }
}

impl Topology for LinearTopology {
    fn create_topology(&mut self, nodes: &mut [Box<dyn Node>]) -> anyhow::Result<()> {
        for node in nodes.iter_mut() {
            let x = node.id() as f64 * self.spacing_m;
            node.set_position(Position::new(x, 0.0));
        }
        Ok(())
    }
}

/// Uniform placement in a square. The DAG root (node 0) sits in the middle.
/// Placement depends only on the seed.
#[derive(Debug)]
pub struct RandomTopology {
    side_m: f64,
    rng: SmallRng,
}

impl RandomTopology {
    pub fn new(side_m: f64, seed: u64) -> Self {
        Self {
            side_m,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Topology for RandomTopology {
    fn create_topology(&mut self, nodes: &mut [Box<dyn Node>]) -> anyhow::Result<()> {
        if self.side_m.is_nan() || self.side_m <= 0.0 {
            anyhow::bail!("square side must be positive, got {}", self.side_m);
        }
        for node in nodes.iter_mut() {
            let position = if node.id() == 0 {
                Position::new(self.side_m / 2.0, self.side_m / 2.0)
            } else {
                Position::new(
                    self.rng.random_range(0.0..self.side_m),
                    self.rng.random_range(0.0..self.side_m),
                )
            };
            debug!(node = node.id(), x = position.x, y = position.y, "placed");
            node.set_position(position);
        }
        Ok(())
    }
}

/// Builds the topology named by `topology.class`.
pub fn from_settings(settings: &SimSettings) -> anyhow::Result<Box<dyn Topology>> {
    let topology = &settings.topology;
    match topology.class.as_str() {
        "Linear" => Ok(Box::new(LinearTopology::new(topology.spacing_m))),
        "Random" => Ok(Box::new(RandomTopology::new(
            topology.square_side_m,
            settings.exec.random_seed,
        ))),
        other => anyhow::bail!("unknown topology class '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mote::{BeaconMote, BeaconStats};
    use std::sync::Arc;

    fn nodes(count: u32) -> Vec<Box<dyn Node>> {
        let settings = SimSettings::default();
        let stats = Arc::new(BeaconStats::default());
        (0..count)
            .map(|id| Box::new(BeaconMote::new(id, &settings, Arc::clone(&stats))) as Box<dyn Node>)
            .collect()
    }

    fn positions(nodes: &[Box<dyn Node>]) -> Vec<Position> {
        nodes.iter().map(|n| n.position()).collect()
    }

    #[test]
    fn linear_spacing() {
        let mut nodes = nodes(3);
        LinearTopology::new(30.0).create_topology(&mut nodes).unwrap();
        assert_eq!(
            positions(&nodes),
            vec![
                Position::new(0.0, 0.0),
                Position::new(30.0, 0.0),
                Position::new(60.0, 0.0)
            ]
        );
    }

    #[test]
    fn random_is_seeded() {
        let place = |seed| {
            let mut nodes = nodes(8);
            RandomTopology::new(500.0, seed)
                .create_topology(&mut nodes)
                .unwrap();
            positions(&nodes)
        };

        let a = place(1);
        assert_eq!(a, place(1));
        assert_ne!(a, place(2));
        assert_eq!(a[0], Position::new(250.0, 250.0));
        assert!(a
            .iter()
            .all(|p| (0.0..500.0).contains(&p.x) && (0.0..500.0).contains(&p.y)));
    }

    #[test]
    fn unknown_class() {
        let mut settings = SimSettings::default();
        settings.topology.class = "Grid".into();
        assert!(from_settings(&settings).is_err());
    }
}
