//! Layered node kernel
//!
//! [`Node`] owns one application layer, one logical channel table of RLC
//! entities, one MAC and one PHY, and sequences them in simulated time:
//!
//! - [`Node::run`] runs the MAC, forwards its requests to the PHY, runs the
//!   PHY and dispatches its indications back to the MAC.
//! - [`Node::advance_timer`] advances the MAC clock, then once per
//!   millisecond ticks every RLC entity and runs the application layer,
//!   then advances the PHY clock.
//!
//! The MAC reaches RLC only through an [`RlcInterface`] the node lends it
//! for the duration of a call. Buffer occupancy changes caused by those calls
//! are collected and reported back to the MAC once the call returns.

use std::sync::Arc;

use bytes::Bytes;
use isacsim_common::{
    validate_cell_id, CarrierConfig, CellId, Lcid, LogicalChannelConfig, NodeId, NodeLimits,
    NodeRole, Position, Rnti, SimTime, SubcarrierSpacing,
};
use isacsim_hub::{DistributionHub, ReceiverInfo};
use tracing::{debug, trace, warn};

use crate::app::TrafficStats;
use crate::error::{NodeError, RlcError};
use crate::layer::{
    ApplicationLayer, BufferStatus, BufferStatusUpdate, CellConfig, LogicalChannelInfo, MacEntity,
    NodeInfo, PhyEntity, PhyIndication, RlcInterface, RlcSdu, Scheduler, TrafficModel, TtiBytes,
};
use crate::rlc::{RlcEntity, RlcStatsRow};
use crate::table::LogicalChannelTable;

/// Length of one application window in microseconds
pub const APP_WINDOW_US: u64 = 1000;

/// Node kernel shared by the gNB and UE specializations
pub struct Node {
    info: NodeInfo,
    limits: NodeLimits,
    max_applications: usize,
    app: Box<dyn ApplicationLayer>,
    mac: Box<dyn MacEntity>,
    phy: Box<dyn PhyEntity>,
    rlc: LogicalChannelTable,
    carrier: Option<CarrierConfig>,
    hub: Option<Arc<DistributionHub>>,
    hub_slot: Option<usize>,
    symbols_per_ms: u32,
    ms_timer: u32,
    app_next_invoke_time: u64,
    timer_broadcasts: u64,
    app_passes: u64,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("info", &self.info)
            .field("rlc", &self.rlc)
            .field("hub_slot", &self.hub_slot)
            .field("ms_timer", &self.ms_timer)
            .field("app_next_invoke_time", &self.app_next_invoke_time)
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Creates a node with `num_rows` peer rows (forced to one on a UE) and
    /// room for `max_applications` applications.
    ///
    /// Until [`Node::configure_phy`] runs, one millisecond is taken to be 14
    /// symbols (15 kHz numerology).
    pub fn new(
        info: NodeInfo,
        num_rows: usize,
        limits: NodeLimits,
        max_applications: usize,
        app: Box<dyn ApplicationLayer>,
        mac: Box<dyn MacEntity>,
        phy: Box<dyn PhyEntity>,
    ) -> Self {
        debug!(
            "Creating {} node {} with {} peer rows of {} logical channels",
            info.role, info.node_id, num_rows, limits.max_logical_channels
        );
        Self {
            rlc: LogicalChannelTable::new(info.role, num_rows, limits.max_logical_channels),
            info,
            limits,
            max_applications,
            app,
            mac,
            phy,
            carrier: None,
            hub: None,
            hub_slot: None,
            symbols_per_ms: SubcarrierSpacing::Khz15.symbols_per_ms(),
            ms_timer: 0,
            app_next_invoke_time: 0,
            timer_broadcasts: 0,
            app_passes: 0,
        }
    }

    // ========================================================================
    // Identity and state
    // ========================================================================

    /// Identity registered with the PHY
    pub fn info(&self) -> NodeInfo {
        self.info
    }

    /// Node identifier
    pub fn node_id(&self) -> NodeId {
        self.info.node_id
    }

    /// gNB or UE
    pub fn role(&self) -> NodeRole {
        self.info.role
    }

    /// Own RNTI on a UE
    pub fn rnti(&self) -> Option<Rnti> {
        self.info.rnti
    }

    /// Cell the node belongs to
    pub fn cell_id(&self) -> CellId {
        self.info.cell_id
    }

    /// Position in meters
    pub fn position(&self) -> Position {
        self.info.position
    }

    /// Capacity limits
    pub fn limits(&self) -> &NodeLimits {
        &self.limits
    }

    /// Configured carrier, if any
    pub fn carrier(&self) -> Option<&CarrierConfig> {
        self.carrier.as_ref()
    }

    /// Hub slot of the node's receive registration
    pub fn hub_slot(&self) -> Option<usize> {
        self.hub_slot
    }

    /// Symbols in one millisecond at the configured numerology
    pub fn symbols_per_ms(&self) -> u32 {
        self.symbols_per_ms
    }

    /// Symbols accumulated towards the next millisecond boundary
    pub fn ms_timer(&self) -> u32 {
        self.ms_timer
    }

    /// Microseconds until the application layer is next due
    pub fn app_next_invoke_time(&self) -> u64 {
        self.app_next_invoke_time
    }

    /// Number of RLC timer broadcasts so far
    pub fn timer_broadcasts(&self) -> u64 {
        self.timer_broadcasts
    }

    /// Number of completed application passes
    pub fn app_passes(&self) -> u64 {
        self.app_passes
    }

    /// The logical channel table
    pub fn logical_channels(&self) -> &LogicalChannelTable {
        &self.rlc
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Validates the carrier and the node's cell id, hands the cell
    /// parameters and carrier to the PHY and adopts the carrier's numerology
    pub fn configure_phy(&mut self, carrier: CarrierConfig) -> Result<(), NodeError> {
        carrier.validate()?;
        validate_cell_id(self.info.cell_id)?;

        self.phy
            .set_cell_config(CellConfig::new(self.info.cell_id, &carrier));
        self.phy.set_carrier_information(carrier.clone());
        self.symbols_per_ms = carrier.subcarrier_spacing.symbols_per_ms();
        debug!(
            "Node {} carrier: {:?}, DL {} Hz, UL {} Hz, {} RBs at {}",
            self.info.node_id,
            carrier.duplex_mode,
            carrier.dl_carrier_frequency,
            carrier.ul_carrier_frequency,
            carrier.num_resource_blocks,
            carrier.subcarrier_spacing
        );
        self.carrier = Some(carrier);
        Ok(())
    }

    /// Wires the node to the hub.
    ///
    /// Registers the node with its PHY, gives the PHY the hub for in-band
    /// transmission and the MAC the hub for out-of-band transmission, then
    /// registers the node's receive path: a gNB listens on the uplink carrier
    /// without an RNTI, a UE on the downlink carrier with its RNTI. Returns
    /// the hub slot.
    pub fn set_phy_interface(&mut self, hub: Arc<DistributionHub>) -> Result<usize, NodeError> {
        let carrier = self.carrier.as_ref().ok_or(NodeError::CarrierNotConfigured {
            node_id: self.info.node_id,
        })?;
        let receiver = ReceiverInfo {
            carrier_frequency: carrier.carrier_frequency(self.info.role.rx_direction()),
            cell_id: self.info.cell_id,
            rnti: self.info.rnti,
        };

        self.phy.register_node(self.info);
        self.phy.set_in_band_tx(Arc::clone(&hub));
        self.mac.connect(self.info, Arc::clone(&hub));

        let slot = hub.register(
            receiver,
            self.phy.in_band_sink(),
            self.mac.out_of_band_sink(),
        )?;
        debug!("Node {} registered as {} in hub slot {}", self.info.node_id, receiver, slot);
        self.hub = Some(hub);
        self.hub_slot = Some(slot);
        Ok(slot)
    }

    /// Attaches a scheduling algorithm to the MAC
    pub fn add_scheduler(&mut self, scheduler: Box<dyn Scheduler>) {
        self.mac.add_scheduler(scheduler);
    }

    /// Attaches an application sending to `peer` on `lcid`. On a UE the
    /// destination is always the gNB and `peer` is replaced by the UE's RNTI.
    pub fn add_application(
        &mut self,
        peer: Rnti,
        lcid: Lcid,
        model: Box<dyn TrafficModel>,
    ) -> Result<(), NodeError> {
        if self.app.application_count() >= self.max_applications {
            return Err(NodeError::TooManyApplications {
                max: self.max_applications,
            });
        }
        let peer = self.info.rnti.unwrap_or(peer);
        self.app.add_application(peer, lcid, model);
        debug!("Node {} application added: RNTI {}, LCID {}", self.info.node_id, peer, lcid);
        Ok(())
    }

    /// Creates the RLC entity of a logical channel in the lowest free column
    /// of the peer's row and announces the channel to the MAC. Returns the
    /// column.
    pub fn configure_logical_channel(
        &mut self,
        peer: Rnti,
        config: &LogicalChannelConfig,
    ) -> Result<usize, NodeError> {
        config.validate()?;
        let rnti = self.info.rnti.unwrap_or(peer);
        let entity = RlcEntity::new(rnti, config, self.info.role, self.limits.harq_processes);
        let column = self.rlc.insert(rnti, entity)?;
        self.mac
            .add_logical_channel_info(LogicalChannelInfo::from_config(rnti, config));
        debug!(
            "Node {} logical channel RNTI {} LCID {} ({:?}) in column {}",
            self.info.node_id, rnti, config.lcid, config.entity_type, column
        );
        Ok(column)
    }

    // ========================================================================
    // RLC-facing operations
    // ========================================================================

    /// Entity serving `(peer, lcid)`. The row is the UE's own on a UE.
    pub fn rlc_entity(&self, peer: Rnti, lcid: Lcid) -> Option<&RlcEntity> {
        self.rlc.get(peer, lcid)
    }

    /// Routes an application SDU to its RLC entity and reports the new
    /// buffer occupancy to the MAC
    pub fn enqueue_rlc_sdu(&mut self, sdu: RlcSdu) -> Result<(), NodeError> {
        let update = route_sdu(&mut self.rlc, self.info.rnti, sdu)?;
        self.mac.update_buffer_status(update);
        Ok(())
    }

    /// Pulls PDUs from an entity under `grant_size` bytes
    pub fn send_rlc_pdus(
        &mut self,
        peer: Rnti,
        lcid: Lcid,
        grant_size: usize,
        remaining_grant: usize,
    ) -> Result<Vec<Bytes>, NodeError> {
        let mut updates = Vec::new();
        let pdus = self
            .rlc_access(&mut updates)
            .send_rlc_pdus(peer, lcid, grant_size, remaining_grant)
            .map_err(not_present)?;
        self.flush_buffer_updates(updates);
        Ok(pdus)
    }

    /// Pushes a received PDU into an entity; completed SDUs go to the
    /// application layer
    pub fn receive_rlc_pdu(&mut self, peer: Rnti, lcid: Lcid, pdu: Bytes) -> Result<(), NodeError> {
        let mut updates = Vec::new();
        self.rlc_access(&mut updates)
            .receive_rlc_pdu(peer, lcid, pdu)
            .map_err(not_present)?;
        self.flush_buffer_updates(updates);
        Ok(())
    }

    /// Counters of every active channel of one peer row
    pub fn rlc_statistics(&self, peer: Rnti) -> Vec<RlcStatsRow> {
        self.rlc.row(peer).map(RlcEntity::statistics).collect()
    }

    /// Counters of every active channel of the node
    pub fn all_rlc_statistics(&self) -> Vec<RlcStatsRow> {
        self.rlc.iter().map(RlcEntity::statistics).collect()
    }

    /// Application traffic counters
    pub fn traffic_stats(&self) -> Vec<(Rnti, Lcid, TrafficStats)> {
        self.app.traffic_stats()
    }

    fn rlc_access<'a>(&'a mut self, updates: &'a mut Vec<BufferStatusUpdate>) -> RlcAccess<'a> {
        RlcAccess {
            table: &mut self.rlc,
            app: self.app.as_mut(),
            updates,
        }
    }

    fn flush_buffer_updates(&mut self, updates: Vec<BufferStatusUpdate>) {
        for update in updates {
            self.mac.update_buffer_status(update);
        }
    }

    fn refresh_buffer_status(&mut self) {
        for entity in self.rlc.iter() {
            self.mac.update_buffer_status(BufferStatusUpdate {
                rnti: entity.rnti(),
                lcid: entity.lcid(),
                bytes: entity.buffer_status(),
            });
        }
    }

    // ========================================================================
    // MAC / PHY passthroughs
    // ========================================================================

    /// MAC byte accounting of the last TTI
    pub fn tti_bytes(&self) -> TtiBytes {
        self.mac.tti_bytes()
    }

    /// Buffered data as seen by the MAC
    pub fn buffer_status(&self) -> BufferStatus {
        self.mac.buffer_status()
    }

    /// PHY clock
    pub fn current_time(&self) -> SimTime {
        self.phy.current_time()
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// One MAC pass then one PHY pass.
    ///
    /// MAC requests are executed by the PHY before the PHY runs; PHY
    /// indications are dispatched to the MAC after it runs.
    pub fn run(&mut self) -> Result<(), NodeError> {
        if self.hub.is_none() {
            return Err(NodeError::PhyInterfaceNotSet {
                node_id: self.info.node_id,
            });
        }

        let mut updates = Vec::new();
        let requests = {
            let mut access = RlcAccess {
                table: &mut self.rlc,
                app: self.app.as_mut(),
                updates: &mut updates,
            };
            self.mac.run(&mut access)?
        };
        self.flush_buffer_updates(updates);

        for request in requests {
            self.phy.handle_request(request)?;
        }

        for indication in self.phy.run()? {
            self.dispatch_indication(indication)?;
        }
        Ok(())
    }

    fn dispatch_indication(&mut self, indication: PhyIndication) -> Result<(), NodeError> {
        match indication {
            PhyIndication::Rx(rx) => {
                trace!(
                    "Node {} RX indication: RNTI {}, {} bytes",
                    self.info.node_id,
                    rx.rnti,
                    rx.payload.len()
                );
                let mut updates = Vec::new();
                {
                    let mut access = RlcAccess {
                        table: &mut self.rlc,
                        app: self.app.as_mut(),
                        updates: &mut updates,
                    };
                    self.mac.rx_indication(rx, &mut access)?;
                }
                self.flush_buffer_updates(updates);
            }
            PhyIndication::Srs(measurement) if self.info.role == NodeRole::Gnb => {
                self.mac.srs_indication(measurement);
            }
            PhyIndication::Csi(measurement) if self.info.role == NodeRole::Ue => {
                self.mac.csi_indication(measurement);
            }
            other => {
                warn!(
                    "Node {} ({}) dropping indication {:?}",
                    self.info.node_id, self.info.role, other
                );
            }
        }
        Ok(())
    }

    /// Advances the node by `tick` symbols: MAC clock first, then the
    /// millisecond work when a millisecond boundary is reached, then the PHY
    /// clock.
    ///
    /// Millisecond work ticks every RLC entity, refreshes the MAC's buffer
    /// status, runs the application pass and resets the millisecond counter.
    pub fn advance_timer(&mut self, tick: u32) -> Result<(), NodeError> {
        self.mac.advance_timer(tick);

        self.ms_timer += tick;
        if self.ms_timer >= self.symbols_per_ms {
            for entity in self.rlc.iter_mut() {
                entity.timer_tick();
            }
            self.timer_broadcasts += 1;
            self.refresh_buffer_status();
            self.run_app_layer()?;
            self.ms_timer = 0;
        }

        self.phy.advance_timer(tick);
        Ok(())
    }

    /// One application window.
    ///
    /// Invokes the application layer for every pending delay that fits
    /// strictly inside the window, then once more with the rest of the
    /// window. The last returned delay carries into the next window.
    fn run_app_layer(&mut self) -> Result<(), NodeError> {
        let mut accumulated = 0u64;
        while accumulated.saturating_add(self.app_next_invoke_time) < APP_WINDOW_US {
            accumulated += self.app_next_invoke_time;
            // A zero delay would invoke forever within the window
            self.app_next_invoke_time = self.invoke_app(self.app_next_invoke_time)?.max(1);
        }
        self.app_next_invoke_time = self.invoke_app(APP_WINDOW_US - accumulated)?;
        self.app_passes += 1;
        Ok(())
    }

    fn invoke_app(&mut self, elapsed_us: u64) -> Result<u64, NodeError> {
        let own_rnti = self.info.rnti;
        let Self { app, rlc, mac, .. } = self;
        app.run(elapsed_us, &mut |sdu| {
            let update = route_sdu(rlc, own_rnti, sdu)?;
            mac.update_buffer_status(update);
            Ok(())
        })
    }
}

/// Enqueues `sdu` on its entity and returns the entity's new occupancy
fn route_sdu(
    rlc: &mut LogicalChannelTable,
    own_rnti: Option<Rnti>,
    sdu: RlcSdu,
) -> Result<BufferStatusUpdate, NodeError> {
    let peer = own_rnti.unwrap_or(sdu.destination);
    let lcid = sdu.lcid;
    let entity = rlc
        .get_mut(peer, lcid)
        .ok_or(NodeError::RlcEntityNotPresent { rnti: peer, lcid })?;
    trace!("RLC SDU: RNTI {}, LCID {}, {} bytes", peer, lcid, sdu.payload.len());
    entity.enqueue_sdu(sdu.payload)?;
    Ok(BufferStatusUpdate {
        rnti: entity.rnti(),
        lcid,
        bytes: entity.buffer_status(),
    })
}

fn not_present(error: RlcError) -> NodeError {
    match error {
        RlcError::EntityNotPresent { rnti, lcid } => NodeError::RlcEntityNotPresent { rnti, lcid },
        other => NodeError::Rlc(other),
    }
}

/// RLC access lent to the MAC
struct RlcAccess<'a> {
    table: &'a mut LogicalChannelTable,
    app: &'a mut dyn ApplicationLayer,
    updates: &'a mut Vec<BufferStatusUpdate>,
}

impl RlcAccess<'_> {
    fn entity(&mut self, rnti: Rnti, lcid: Lcid) -> Result<&mut RlcEntity, RlcError> {
        self.table
            .get_mut(rnti, lcid)
            .ok_or(RlcError::EntityNotPresent { rnti, lcid })
    }
}

impl RlcInterface for RlcAccess<'_> {
    fn send_rlc_pdus(
        &mut self,
        rnti: Rnti,
        lcid: Lcid,
        grant_size: usize,
        remaining_grant: usize,
    ) -> Result<Vec<Bytes>, RlcError> {
        let entity = self.entity(rnti, lcid)?;
        let pdus = entity.send_pdus(grant_size, remaining_grant);
        let update = BufferStatusUpdate {
            rnti: entity.rnti(),
            lcid,
            bytes: entity.buffer_status(),
        };
        self.updates.push(update);
        Ok(pdus)
    }

    fn receive_rlc_pdu(&mut self, rnti: Rnti, lcid: Lcid, pdu: Bytes) -> Result<(), RlcError> {
        let entity = self.entity(rnti, lcid)?;
        let sdus = entity.receive_pdu(pdu)?;
        let update = BufferStatusUpdate {
            rnti: entity.rnti(),
            lcid,
            bytes: entity.buffer_status(),
        };
        self.updates.push(update);
        for sdu in sdus {
            self.app.receive_packet(update.rnti, lcid, sdu);
        }
        Ok(())
    }
}
