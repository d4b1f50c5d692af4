//! Reference MAC entity
//!
//! Schedules once per slot. On a gNB the slot pass asks the attached
//! [`Scheduler`] for downlink grants, pulls RLC PDUs for each granted UE and
//! multiplexes them into one MAC PDU per UE, then asks for uplink grants over
//! the buffer status the UEs reported and sends the grants out-of-band. On a
//! UE the slot pass reports buffer status out-of-band when it changes and
//! serves the uplink grants received since the previous slot.
//!
//! A UE's scheduling demand is its buffered bytes plus one subheader per
//! logical channel with data.
//!
//! MAC PDU layout, one subheader per RLC PDU:
//!
//! ```text
//! { lcid:u8 length:u16 rlc_pdu[length] }*
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use isacsim_common::{log_mac_pdu, Direction, Lcid, LinkDirection, NodeRole, Rnti, SYMBOLS_PER_SLOT};
use isacsim_hub::{ControlMessage, DistributionHub, OutOfBandPacket, OutOfBandSink, PacketInbox};
use tracing::{debug, trace, warn};

use crate::error::LayerError;
use crate::rlc::MAX_PDU_SIZE;
use crate::layer::{
    BufferStatus, BufferStatusUpdate, ChannelMeasurement, ControlInfo, Grant, LogicalChannelInfo,
    MacEntity, NodeInfo, PhyRequest, RlcInterface, RxIndication, Scheduler, TtiBytes, UeDemand,
};

/// Size of a MAC subheader
pub const MAC_SUBHEADER_LEN: usize = 3;

/// Slots after which a UE repeats an unchanged, non-empty buffer status report
pub const BSR_PERIODIC_SLOTS: u32 = 10;

const LAYER: &str = "MAC";

/// MAC entity for either side of the link
pub struct ReferenceMac {
    role: NodeRole,
    node: Option<NodeInfo>,
    hub: Option<Arc<DistributionHub>>,
    control_rx: PacketInbox<OutOfBandPacket>,
    scheduler: Option<Box<dyn Scheduler>>,
    /// Sorted by priority, then LCID
    channels: Vec<LogicalChannelInfo>,
    buffers: BTreeMap<(Rnti, Lcid), usize>,
    symbol: u64,
    last_slot: Option<u64>,
    tti: TtiBytes,
    measurements: BTreeMap<Rnti, ChannelMeasurement>,
    // gNB
    ul_reports: BTreeMap<(Rnti, Lcid), usize>,
    // UE
    ul_grant: usize,
    last_report: Vec<(Lcid, u32)>,
    slots_since_report: u32,
}

impl std::fmt::Debug for ReferenceMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceMac")
            .field("role", &self.role)
            .field("channels", &self.channels)
            .field("buffers", &self.buffers)
            .field("symbol", &self.symbol)
            .field("tti", &self.tti)
            .finish_non_exhaustive()
    }
}

impl ReferenceMac {
    /// Creates a MAC for a node of the given role
    pub fn new(role: NodeRole) -> Self {
        Self {
            role,
            node: None,
            hub: None,
            control_rx: PacketInbox::new(),
            scheduler: None,
            channels: Vec::new(),
            buffers: BTreeMap::new(),
            symbol: 0,
            last_slot: None,
            tti: TtiBytes::default(),
            measurements: BTreeMap::new(),
            ul_reports: BTreeMap::new(),
            ul_grant: 0,
            last_report: Vec::new(),
            slots_since_report: 0,
        }
    }

    /// Latest SRS (gNB) or CSI (UE) measurement of a peer
    pub fn channel_measurement(&self, rnti: Rnti) -> Option<ChannelMeasurement> {
        self.measurements.get(&rnti).copied()
    }

    /// Uplink bytes a UE reported that have not been granted yet (gNB)
    pub fn reported_uplink(&self, rnti: Rnti) -> usize {
        self.ul_reports
            .range((rnti, 0)..=(rnti, Lcid::MAX))
            .map(|(_, bytes)| bytes)
            .sum()
    }

    /// Uplink grant waiting to be served (UE)
    pub fn pending_grant(&self) -> usize {
        self.ul_grant
    }

    fn node(&self) -> Result<NodeInfo, LayerError> {
        self.node.ok_or(LayerError::NotWired {
            layer: LAYER,
            missing: "node",
        })
    }

    fn send_control(
        &self,
        node: &NodeInfo,
        rnti: Rnti,
        message: ControlMessage,
    ) -> Result<(), LayerError> {
        let hub = self.hub.as_ref().ok_or(LayerError::NotWired {
            layer: LAYER,
            missing: "hub",
        })?;
        let packet = OutOfBandPacket {
            packet_type: message.packet_type(),
            payload: message.encode()?,
            cell_id: node.cell_id,
            rnti,
            sender: node.node_id,
        };
        let delivered = hub.send_out_of_band(&packet);
        trace!("MAC node {} sent {:?} to {} receivers", node.node_id, message, delivered);
        Ok(())
    }

    fn process_control(&mut self, node: &NodeInfo) {
        for packet in self.control_rx.drain() {
            if packet.sender == node.node_id {
                continue;
            }
            let message = match ControlMessage::decode(packet.packet_type, &packet.payload) {
                Ok(message) => message,
                Err(e) => {
                    warn!(
                        "MAC node {}: dropping {} from node {}: {}",
                        node.node_id, packet.packet_type, packet.sender, e
                    );
                    continue;
                }
            };

            match (self.role, message) {
                (NodeRole::Gnb, ControlMessage::BufferStatusReport { entries }) => {
                    let rnti = packet.rnti;
                    self.ul_reports.retain(|&(r, _), _| r != rnti);
                    for (lcid, bytes) in entries.into_iter().filter(|&(_, b)| b > 0) {
                        self.ul_reports.insert((rnti, lcid), bytes as usize);
                    }
                    trace!("BSR from RNTI {}: {} bytes", rnti, self.reported_uplink(rnti));
                }
                (NodeRole::Ue, ControlMessage::UplinkGrant { grant_size })
                    if node.rnti == Some(packet.rnti) =>
                {
                    self.ul_grant += grant_size as usize;
                }
                (_, message) => {
                    trace!("MAC node {} ignoring {:?} for RNTI {}", node.node_id, message, packet.rnti);
                }
            }
        }
    }

    /// Multiplexes PDUs of the UE's channels, highest priority first, into
    /// one MAC PDU of about `budget` bytes. Each additional RLC PDU a channel
    /// returns carries its own subheader on top of its grant.
    fn build_pdu(
        &mut self,
        rnti: Rnti,
        budget: usize,
        rlc: &mut dyn RlcInterface,
    ) -> Result<Option<Bytes>, LayerError> {
        let lcids: Vec<Lcid> = self
            .channels
            .iter()
            .filter(|c| c.rnti == rnti)
            .map(|c| c.lcid)
            .collect();

        let mut pdu = BytesMut::new();
        let mut budget = budget;
        let mut goodput = 0;
        for lcid in lcids {
            if budget <= MAC_SUBHEADER_LEN {
                break;
            }
            let buffered = self.buffers.get(&(rnti, lcid)).copied().unwrap_or(0);
            if buffered == 0 {
                continue;
            }
            let grant = (budget - MAC_SUBHEADER_LEN).min(buffered).min(MAX_PDU_SIZE);
            let remaining = budget - MAC_SUBHEADER_LEN - grant;
            for rlc_pdu in rlc.send_rlc_pdus(rnti, lcid, grant, remaining)? {
                let Ok(len) = u16::try_from(rlc_pdu.len()) else {
                    warn!("MAC RNTI {} LCID {}: dropping {} byte RLC PDU", rnti, lcid, rlc_pdu.len());
                    continue;
                };
                pdu.put_u8(lcid);
                pdu.put_u16(len);
                pdu.extend_from_slice(&rlc_pdu);
                goodput += rlc_pdu.len();
                budget = budget.saturating_sub(MAC_SUBHEADER_LEN + rlc_pdu.len());
            }
        }

        if pdu.is_empty() {
            return Ok(None);
        }
        self.tti.throughput += pdu.len();
        self.tti.goodput += goodput;
        log_mac_pdu(Direction::Tx, rnti, &pdu);
        Ok(Some(pdu.freeze()))
    }

    fn run_gnb(
        &mut self,
        node: &NodeInfo,
        rlc: &mut dyn RlcInterface,
    ) -> Result<Vec<PhyRequest>, LayerError> {
        let mut requests = Vec::new();

        let downlink = demands(&self.buffers, MAC_SUBHEADER_LEN);
        for grant in self.schedule(LinkDirection::Downlink, &downlink)? {
            if let Some(payload) = self.build_pdu(grant.rnti, grant.bytes, rlc)? {
                requests.push(PhyRequest::DlControl(ControlInfo {
                    rnti: grant.rnti,
                    bytes: payload.len(),
                }));
                requests.push(PhyRequest::TxData {
                    rnti: grant.rnti,
                    payload,
                });
            }
        }

        let uplink = demands(&self.ul_reports, MAC_SUBHEADER_LEN);
        for grant in self.schedule(LinkDirection::Uplink, &uplink)? {
            let grant_size = u32::try_from(grant.bytes).unwrap_or(u32::MAX);
            self.send_control(node, grant.rnti, ControlMessage::UplinkGrant { grant_size })?;
            self.consume_report(grant.rnti, grant.bytes);
            requests.push(PhyRequest::RxData { rnti: grant.rnti });
        }
        Ok(requests)
    }

    fn schedule(
        &mut self,
        direction: LinkDirection,
        demands: &[UeDemand],
    ) -> Result<Vec<Grant>, LayerError> {
        if demands.is_empty() {
            return Ok(Vec::new());
        }
        let scheduler = self.scheduler.as_mut().ok_or(LayerError::NotWired {
            layer: LAYER,
            missing: "scheduler",
        })?;
        Ok(scheduler.schedule(direction, demands))
    }

    fn consume_report(&mut self, rnti: Rnti, granted: usize) {
        let mut left = granted;
        for (_, reported) in self.ul_reports.range_mut((rnti, 0)..=(rnti, Lcid::MAX)) {
            let take = left.min(*reported);
            *reported -= take;
            left -= take;
        }
        self.ul_reports.retain(|_, bytes| *bytes > 0);
    }

    fn run_ue(
        &mut self,
        node: &NodeInfo,
        rlc: &mut dyn RlcInterface,
    ) -> Result<Vec<PhyRequest>, LayerError> {
        let rnti = node.rnti.ok_or(LayerError::NotWired {
            layer: LAYER,
            missing: "RNTI",
        })?;
        let mut requests = Vec::new();

        let report: Vec<(Lcid, u32)> = self
            .buffers
            .iter()
            .filter(|(_, &bytes)| bytes > 0)
            .map(|(&(_, lcid), &bytes)| (lcid, u32::try_from(bytes).unwrap_or(u32::MAX)))
            .collect();
        self.slots_since_report += 1;
        let periodic = !report.is_empty() && self.slots_since_report >= BSR_PERIODIC_SLOTS;
        if report != self.last_report || periodic {
            let bytes = report.iter().map(|&(_, b)| b as usize).sum();
            self.send_control(
                node,
                rnti,
                ControlMessage::BufferStatusReport {
                    entries: report.clone(),
                },
            )?;
            requests.push(PhyRequest::UlControl(ControlInfo { rnti, bytes }));
            self.last_report = report;
            self.slots_since_report = 0;
        }

        let grant = std::mem::take(&mut self.ul_grant);
        if grant > 0 {
            if let Some(payload) = self.build_pdu(rnti, grant, rlc)? {
                requests.push(PhyRequest::TxData { rnti, payload });
            }
        }
        Ok(requests)
    }
}

/// Per-UE totals of a per-channel byte map, with `overhead` bytes added for
/// every channel that has data
fn demands(per_channel: &BTreeMap<(Rnti, Lcid), usize>, overhead: usize) -> Vec<UeDemand> {
    let mut totals: BTreeMap<Rnti, usize> = BTreeMap::new();
    for (&(rnti, _), &bytes) in per_channel.iter().filter(|(_, &bytes)| bytes > 0) {
        *totals.entry(rnti).or_default() += bytes + overhead;
    }
    totals
        .into_iter()
        .filter(|&(_, bytes)| bytes > 0)
        .map(|(rnti, bytes)| UeDemand { rnti, bytes })
        .collect()
}

impl MacEntity for ReferenceMac {
    fn run(&mut self, rlc: &mut dyn RlcInterface) -> Result<Vec<PhyRequest>, LayerError> {
        let slot = self.symbol / u64::from(SYMBOLS_PER_SLOT);
        if self.last_slot == Some(slot) {
            return Ok(Vec::new());
        }
        self.last_slot = Some(slot);
        self.tti = TtiBytes::default();

        let node = self.node()?;
        self.process_control(&node);
        match self.role {
            NodeRole::Gnb => self.run_gnb(&node, rlc),
            NodeRole::Ue => self.run_ue(&node, rlc),
        }
    }

    fn advance_timer(&mut self, symbols: u32) {
        self.symbol += u64::from(symbols);
    }

    fn update_buffer_status(&mut self, update: BufferStatusUpdate) {
        self.buffers.insert((update.rnti, update.lcid), update.bytes);
    }

    fn add_logical_channel_info(&mut self, info: LogicalChannelInfo) {
        self.channels.push(info);
        self.channels.sort_by_key(|c| (c.priority, c.lcid));
        self.buffers.entry((info.rnti, info.lcid)).or_insert(0);
    }

    fn buffer_status(&self) -> BufferStatus {
        match self.role {
            NodeRole::Ue => BufferStatus::Uplink(self.buffers.values().sum()),
            NodeRole::Gnb => BufferStatus::Downlink(
                demands(&self.buffers, 0)
                    .into_iter()
                    .map(|d| (d.rnti, d.bytes))
                    .collect(),
            ),
        }
    }

    fn tti_bytes(&self) -> TtiBytes {
        self.tti
    }

    fn connect(&mut self, node: NodeInfo, hub: Arc<DistributionHub>) {
        debug!("MAC of node {} connected to hub", node.node_id);
        self.node = Some(node);
        self.hub = Some(hub);
    }

    fn out_of_band_sink(&self) -> Weak<dyn OutOfBandSink> {
        let sink: Arc<dyn OutOfBandSink> = self.control_rx.queue();
        Arc::downgrade(&sink)
    }

    fn rx_indication(
        &mut self,
        indication: RxIndication,
        rlc: &mut dyn RlcInterface,
    ) -> Result<(), LayerError> {
        let rnti = indication.rnti;
        log_mac_pdu(Direction::Rx, rnti, &indication.payload);

        let mut payload = indication.payload;
        while payload.has_remaining() {
            if payload.remaining() < MAC_SUBHEADER_LEN {
                warn!("MAC PDU from RNTI {}: truncated subheader, {} bytes left", rnti, payload.len());
                break;
            }
            let lcid = payload.get_u8();
            let len = usize::from(payload.get_u16());
            if len > payload.remaining() {
                warn!(
                    "MAC PDU from RNTI {}: LCID {} claims {} bytes, {} left",
                    rnti,
                    lcid,
                    len,
                    payload.remaining()
                );
                break;
            }
            let rlc_pdu = payload.split_to(len);
            if let Err(e) = rlc.receive_rlc_pdu(rnti, lcid, rlc_pdu) {
                warn!("MAC dropping RLC PDU: {}", e);
            }
        }
        Ok(())
    }

    fn srs_indication(&mut self, measurement: ChannelMeasurement) {
        trace!(
            "SRS from RNTI {} in slot {}: {:.1} m",
            measurement.rnti,
            measurement.slot,
            measurement.distance_m
        );
        self.measurements.insert(measurement.rnti, measurement);
    }

    fn csi_indication(&mut self, measurement: ChannelMeasurement) {
        trace!(
            "CSI in slot {}: {:.1} m to serving cell",
            measurement.slot,
            measurement.distance_m
        );
        self.measurements.insert(measurement.rnti, measurement);
    }

    fn add_scheduler(&mut self, scheduler: Box<dyn Scheduler>) {
        if self.role == NodeRole::Ue {
            warn!("Scheduler attached to a UE MAC is never used");
        }
        self.scheduler = Some(scheduler);
    }
}
