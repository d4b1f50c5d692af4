//! Passthrough PHY
//!
//! Carries MAC PDUs as unencoded octet packets through the hub with no
//! waveform or channel model. Keeps the node's symbol clock and reports one
//! channel measurement per slot (SRS on a gNB, CSI on a UE) for every peer
//! it received from during the slot, with the transmitter distance as the
//! measured quantity.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use isacsim_common::{CarrierConfig, NodeRole, Rnti, SimTime, SubcarrierSpacing, SYMBOLS_PER_SLOT};
use isacsim_hub::{DistributionHub, InBandPacket, InBandSink, OctetPacket, PacketInbox};
use tracing::{debug, trace, warn};

use crate::error::LayerError;
use crate::layer::{
    CellConfig, ChannelMeasurement, NodeInfo, PhyEntity, PhyIndication, PhyRequest, RxIndication,
};

const LAYER: &str = "PHY";

/// PHY that moves octets instead of samples
#[derive(Debug)]
pub struct PassthroughPhy {
    role: NodeRole,
    node: Option<NodeInfo>,
    cell: Option<CellConfig>,
    carrier: Option<CarrierConfig>,
    hub: Option<Arc<DistributionHub>>,
    rx_queue: PacketInbox<InBandPacket>,
    symbol: u64,
    last_slot: Option<u64>,
    /// Scheduled uplink receptions per UE (gNB)
    expected_ul: BTreeMap<Rnti, usize>,
    /// Peers heard since the last measurement report, with their distance
    heard: BTreeMap<Rnti, f64>,
}

impl PassthroughPhy {
    /// Creates a PHY for a node of the given role
    pub fn new(role: NodeRole) -> Self {
        Self {
            role,
            node: None,
            cell: None,
            carrier: None,
            hub: None,
            rx_queue: PacketInbox::new(),
            symbol: 0,
            last_slot: None,
            expected_ul: BTreeMap::new(),
            heard: BTreeMap::new(),
        }
    }

    /// Symbols elapsed since the start of the run
    pub fn symbol(&self) -> u64 {
        self.symbol
    }

    fn subcarrier_spacing(&self) -> SubcarrierSpacing {
        self.cell
            .map_or(SubcarrierSpacing::Khz15, |cell| cell.subcarrier_spacing)
    }

    fn not_wired(missing: &'static str) -> LayerError {
        LayerError::NotWired {
            layer: LAYER,
            missing,
        }
    }

    fn transmit(&self, rnti: Rnti, payload: bytes::Bytes) -> Result<(), LayerError> {
        let node = self.node.ok_or_else(|| Self::not_wired("node"))?;
        let carrier = self.carrier.as_ref().ok_or_else(|| Self::not_wired("carrier"))?;
        let hub = self.hub.as_ref().ok_or_else(|| Self::not_wired("hub"))?;

        let direction = self.role.tx_direction();
        let packet = InBandPacket::Octets(OctetPacket {
            payload,
            carrier_frequency: carrier.carrier_frequency(direction),
            tx_power_dbm: node.tx_power_dbm,
            position: node.position,
            cell_id: node.cell_id,
            rnti,
            direction,
            sender: node.node_id,
        });
        let delivered = hub.send_in_band(&packet);
        trace!(
            "PHY node {} {} transmission to RNTI {} reached {} receivers",
            node.node_id,
            direction,
            rnti,
            delivered
        );
        Ok(())
    }

    /// Filters a received packet. Returns the indication and the distance
    /// to its transmitter when it is addressed to this node.
    fn accept(&mut self, node: &NodeInfo, packet: InBandPacket) -> Option<(RxIndication, f64)> {
        let octets = match packet {
            InBandPacket::Octets(octets) => octets,
            InBandPacket::Waveform(waveform) => {
                trace!(
                    "PHY node {} ignoring {} waveform samples from node {}",
                    node.node_id,
                    waveform.samples.len(),
                    waveform.sender
                );
                return None;
            }
        };

        // Own transmissions, other cells, the other link direction and other
        // UEs' downlink share the medium
        if octets.sender == node.node_id
            || octets.cell_id != node.cell_id
            || octets.direction != self.role.rx_direction()
        {
            return None;
        }
        match self.role {
            NodeRole::Ue if node.rnti != Some(octets.rnti) => return None,
            NodeRole::Gnb => {
                let Some(expected) = self.expected_ul.get_mut(&octets.rnti) else {
                    warn!(
                        "PHY node {}: unscheduled uplink from RNTI {} dropped",
                        node.node_id, octets.rnti
                    );
                    return None;
                };
                *expected -= 1;
                if *expected == 0 {
                    self.expected_ul.remove(&octets.rnti);
                }
            }
            NodeRole::Ue => {}
        }

        let distance = node.position.distance_to(&octets.position);
        Some((
            RxIndication {
                rnti: octets.rnti,
                payload: octets.payload,
            },
            distance,
        ))
    }
}

impl PhyEntity for PassthroughPhy {
    fn run(&mut self) -> Result<Vec<PhyIndication>, LayerError> {
        let node = self.node.ok_or_else(|| Self::not_wired("node"))?;
        let mut indications = Vec::new();

        for packet in self.rx_queue.drain() {
            if let Some((rx, distance)) = self.accept(&node, packet) {
                self.heard.insert(rx.rnti, distance);
                indications.push(PhyIndication::Rx(rx));
            }
        }

        let slot = self.symbol / u64::from(SYMBOLS_PER_SLOT);
        if self.last_slot != Some(slot) {
            self.last_slot = Some(slot);
            for (rnti, distance_m) in std::mem::take(&mut self.heard) {
                let measurement = ChannelMeasurement {
                    rnti,
                    slot,
                    distance_m,
                };
                indications.push(match self.role {
                    NodeRole::Gnb => PhyIndication::Srs(measurement),
                    NodeRole::Ue => PhyIndication::Csi(measurement),
                });
            }
        }
        Ok(indications)
    }

    fn advance_timer(&mut self, symbols: u32) {
        self.symbol += u64::from(symbols);
    }

    fn current_time(&self) -> SimTime {
        SimTime::from_symbols(self.symbol, self.subcarrier_spacing())
    }

    fn set_cell_config(&mut self, cell: CellConfig) {
        debug!("PHY cell {}: {} RBs at {}", cell.cell_id, cell.num_resource_blocks, cell.subcarrier_spacing);
        self.cell = Some(cell);
    }

    fn set_carrier_information(&mut self, carrier: CarrierConfig) {
        self.carrier = Some(carrier);
    }

    fn register_node(&mut self, node: NodeInfo) {
        self.node = Some(node);
    }

    fn set_in_band_tx(&mut self, hub: Arc<DistributionHub>) {
        self.hub = Some(hub);
    }

    fn in_band_sink(&self) -> Weak<dyn InBandSink> {
        let sink: Arc<dyn InBandSink> = self.rx_queue.queue();
        Arc::downgrade(&sink)
    }

    fn handle_request(&mut self, request: PhyRequest) -> Result<(), LayerError> {
        match request {
            PhyRequest::TxData { rnti, payload } => self.transmit(rnti, payload)?,
            PhyRequest::RxData { rnti } => {
                *self.expected_ul.entry(rnti).or_default() += 1;
            }
            PhyRequest::DlControl(info) | PhyRequest::UlControl(info) => {
                trace!("PHY control for RNTI {}: {} bytes", info.rnti, info.bytes);
            }
        }
        Ok(())
    }
}
