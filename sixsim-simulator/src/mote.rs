//! A mote that does nothing but beacon once per slotframe.
//!
//! Each beacon goes out on the channel of the hopping sequence selected by
//! the ASN and the mote id, and counts as heard by every node with a non-zero
//! delivery ratio on that channel. It is enough traffic to exercise the
//! engine and the connectivity models end to end.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use sixsim_config::SimSettings;
use sixsim_core::events::Tag;
use sixsim_core::{Asn, NodeId};
use sixsim_engine::{Callback, EventOptions, Node, Position, SimEngine};

use crate::connectivity::hopping_channels;

/// Counters shared by every mote of a run.
#[derive(Debug, Default)]
pub struct BeaconStats {
    beacons_sent: AtomicU64,
    receptions: AtomicU64,
}

impl BeaconStats {
    pub fn beacons_sent(&self) -> u64 {
        self.beacons_sent.load(Ordering::Relaxed)
    }

    pub fn receptions(&self) -> u64 {
        self.receptions.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct BeaconMote {
    id: NodeId,
    position: Position,
    period: Asn,
    num_chans: u8,
    stats: Arc<BeaconStats>,
}

impl BeaconMote {
    pub fn new(id: NodeId, settings: &SimSettings, stats: Arc<BeaconStats>) -> Self {
        Self {
            id,
            position: Position::default(),
            period: settings.tsch.slotframe_length.max(1),
            num_chans: settings.phy.num_chans,
            stats,
        }
    }

    /// Node 0 roots the DODAG.
    pub fn is_dag_root(&self) -> bool {
        self.id == 0
    }

    pub fn beacon_tag(id: NodeId) -> Tag {
        Tag::node(id, "beacon")
    }

    fn beacon(&self) -> Callback {
        send_beacon(self.id, self.period, self.num_chans, Arc::clone(&self.stats))
    }
}

fn send_beacon(id: NodeId, period: Asn, num_chans: u8, stats: Arc<BeaconStats>) -> Callback {
    Box::new(move |engine: &SimEngine| {
        let asn = engine.get_asn();
        let channels = hopping_channels(num_chans);
        if let Some(&channel) = channels.get((asn + id as Asn) as usize % channels.len().max(1)) {
            let node_count = engine.node_count() as NodeId;
            let heard = engine
                .with_connectivity(|conn| {
                    (0..node_count)
                        .filter(|&dst| dst != id && conn.pdr(id, dst, channel) > 0.0)
                        .count()
                })
                .unwrap_or(0);
            stats.beacons_sent.fetch_add(1, Ordering::Relaxed);
            stats.receptions.fetch_add(heard as u64, Ordering::Relaxed);
            trace!(node = id, asn, channel, heard, "beacon");
        }

        engine.schedule_at_asn(
            asn + period,
            send_beacon(id, period, num_chans, Arc::clone(&stats)),
            EventOptions::new().tag(BeaconMote::beacon_tag(id)),
        )?;
        Ok(())
    })
}

impl Node for BeaconMote {
    fn id(&self) -> NodeId {
        self.id
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    fn boot(&mut self, engine: &SimEngine) -> anyhow::Result<()> {
        let first = engine.get_asn() + 1 + self.id as Asn % self.period;
        debug!(node = self.id, dag_root = self.is_dag_root(), first, "mote booted");
        engine.schedule_at_asn(
            first,
            self.beacon(),
            EventOptions::new().tag(Self::beacon_tag(self.id)),
        )?;
        Ok(())
    }
}
