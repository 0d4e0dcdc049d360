//! ## sixsim-simulator::connectivity
//! **Link quality between nodes**
//!
//! Every model here is a static matrix of `(src, dst, channel) -> link`
//! entries. Missing entries mean no link at all.
//!
//! ### Models:
//! - `Linear`: a chain `0 - 1 - 2 - ...`, perfect links between neighbours
//! - `FullyMeshed`: perfect links between every pair
//! - `K7`: links read from a K7 trace file (see [`k7`])

pub mod k7;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sixsim_config::SimSettings;
use sixsim_core::NodeId;
use sixsim_engine::Connectivity;

pub use k7::{TraceError, TraceHeader};

/// Channel hopping sequence. A run with `phy.num_chans = n` uses the first
/// `n` entries.
pub const HOPPING_SEQUENCE: [u8; 16] = [16, 17, 23, 18, 26, 15, 25, 22, 19, 11, 12, 13, 24, 14, 20, 21];

/// Channels used by a run with `num_chans` channels.
pub fn hopping_channels(num_chans: u8) -> &'static [u8] {
    let n = (num_chans as usize).min(HOPPING_SEQUENCE.len());
    &HOPPING_SEQUENCE[..n]
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkQuality {
    /// Packet delivery ratio, in `[0, 1]`.
    pub pdr: f64,
    /// Received signal strength, in dBm.
    pub rssi: f64,
}

impl LinkQuality {
    pub const NONE: LinkQuality = LinkQuality {
        pdr: 0.0,
        rssi: -1000.0,
    };

    pub const PERFECT: LinkQuality = LinkQuality {
        pdr: 1.0,
        rssi: -10.0,
    };
}

#[derive(Serialize)]
struct LinkEntry {
    src: NodeId,
    dst: NodeId,
    channel: u8,
    #[serde(flatten)]
    link: LinkQuality,
}

#[derive(Debug, Clone)]
pub struct ConnectivityMatrix {
    kind: &'static str,
    node_count: Option<usize>,
    links: HashMap<(NodeId, NodeId, u8), LinkQuality>,
}

impl ConnectivityMatrix {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            node_count: None,
            links: HashMap::new(),
        }
    }

    /// Chain topology: node `i` hears `i - 1` and `i + 1` only.
    pub fn linear(num_motes: usize, channels: &[u8]) -> Self {
        let mut matrix = Self::new("Linear");
        for src in 1..num_motes as NodeId {
            for &channel in channels {
                matrix.set_bidirectional(src - 1, src, channel, LinkQuality::PERFECT);
            }
        }
        matrix
    }

    /// Every node hears every other node.
    pub fn fully_meshed(num_motes: usize, channels: &[u8]) -> Self {
        let mut matrix = Self::new("FullyMeshed");
        for src in 0..num_motes as NodeId {
            for dst in (src + 1)..num_motes as NodeId {
                for &channel in channels {
                    matrix.set_bidirectional(src, dst, channel, LinkQuality::PERFECT);
                }
            }
        }
        matrix
    }

    pub(crate) fn with_node_count(mut self, node_count: usize) -> Self {
        self.node_count = Some(node_count);
        self
    }

    pub fn set(&mut self, src: NodeId, dst: NodeId, channel: u8, link: LinkQuality) {
        self.links.insert((src, dst, channel), link);
    }

    pub fn set_bidirectional(&mut self, a: NodeId, b: NodeId, channel: u8, link: LinkQuality) {
        self.set(a, b, channel, link);
        self.set(b, a, channel, link);
    }

    pub fn get(&self, src: NodeId, dst: NodeId, channel: u8) -> LinkQuality {
        self.links
            .get(&(src, dst, channel))
            .copied()
            .unwrap_or(LinkQuality::NONE)
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// JSON dump of every link, sorted by `(src, dst, channel)`.
    pub fn dump(&self) -> serde_json::Result<String> {
        let mut entries: Vec<LinkEntry> = self
            .links
            .iter()
            .map(|(&(src, dst, channel), &link)| LinkEntry {
                src,
                dst,
                channel,
                link,
            })
            .collect();
        entries.sort_by_key(|e| (e.src, e.dst, e.channel));
        serde_json::to_string_pretty(&entries)
    }
}

impl Connectivity for ConnectivityMatrix {
    fn kind(&self) -> &str {
        self.kind
    }

    fn node_count(&self) -> Option<usize> {
        self.node_count
    }

    fn pdr(&self, src: NodeId, dst: NodeId, channel: u8) -> f64 {
        self.get(src, dst, channel).pdr
    }

    fn rssi(&self, src: NodeId, dst: NodeId, channel: u8) -> f64 {
        self.get(src, dst, channel).rssi
    }

    fn destroy(&mut self) {
        debug!(kind = self.kind, links = self.links.len(), "dropping connectivity matrix");
        self.links.clear();
    }
}

/// Builds the model named by `conn.class`.
pub fn from_settings(settings: &SimSettings) -> anyhow::Result<ConnectivityMatrix> {
    let channels = hopping_channels(settings.phy.num_chans);
    let synthetic_motes = || {
        settings.exec.num_motes.ok_or_else(|| {
            anyhow::anyhow!(
                "connectivity '{}' needs exec.num_motes",
                settings.conn.class
            )
        })
    };

    let matrix = match settings.conn.class.as_str() {
        "Linear" => ConnectivityMatrix::linear(synthetic_motes()?, channels),
        "FullyMeshed" => ConnectivityMatrix::fully_meshed(synthetic_motes()?, channels),
        "K7" => {
            let path = settings.conn.trace.as_deref().ok_or(TraceError::MissingPath)?;
            k7::load(path, settings)?
        }
        other => anyhow::bail!("unknown connectivity class '{other}'"),
    };

    info!(
        kind = matrix.kind,
        links = matrix.link_count(),
        channels = channels.len(),
        "connectivity ready"
    );
    Ok(matrix)
}
