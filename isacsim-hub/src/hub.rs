//! Distribution hub
//!
//! Stands in for the wireless medium. Receivers register a tuning
//! ([`ReceiverInfo`]) together with an in-band and an out-of-band sink:
//!
//! - in-band packets reach every receiver tuned to the packet's carrier
//!   frequency, with no cell or RNTI filtering
//! - out-of-band packets reach every receiver in the packet's cell, whatever
//!   its frequency
//!
//! Delivery is synchronous. The registration table is written during setup
//! and only read while the simulation is ticking.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use isacsim_common::{CellId, HubConfig, Rnti};
use thiserror::Error;
use tracing::{debug, trace};

use crate::protocol::{InBandPacket, OutOfBandPacket};
use crate::sink::{InBandSink, OutOfBandSink};

/// Registration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HubError {
    /// Every registration slot is in use
    #[error("distribution hub full: all {max} receiver slots are registered")]
    CapacityExceeded {
        /// Configured maximum receiver count
        max: usize,
    },
    /// The tuning is already registered with different sinks
    #[error("receiver already registered in slot {slot}: {info}")]
    DuplicateReceiver {
        /// Slot holding the existing registration
        slot: usize,
        /// Tuning of the rejected receiver
        info: ReceiverInfo,
    },
}

/// Receive tuning of a registered node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceiverInfo {
    /// Receive carrier frequency in Hz
    pub carrier_frequency: f64,
    /// Cell the receiver belongs to
    pub cell_id: CellId,
    /// RNTI of a UE receiver, `None` for a gNB's uplink receive path
    pub rnti: Option<Rnti>,
}

impl ReceiverInfo {
    /// Tuning of a gNB uplink receiver
    pub fn gnb(carrier_frequency: f64, cell_id: CellId) -> Self {
        Self {
            carrier_frequency,
            cell_id,
            rnti: None,
        }
    }

    /// Tuning of a UE downlink receiver
    pub fn ue(carrier_frequency: f64, cell_id: CellId, rnti: Rnti) -> Self {
        Self {
            carrier_frequency,
            cell_id,
            rnti: Some(rnti),
        }
    }
}

impl fmt::Display for ReceiverInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rnti {
            Some(rnti) => write!(
                f,
                "{:.3} MHz, cell {}, RNTI {}",
                self.carrier_frequency / 1e6,
                self.cell_id,
                rnti
            ),
            None => write!(
                f,
                "{:.3} MHz, cell {}, gNB",
                self.carrier_frequency / 1e6,
                self.cell_id
            ),
        }
    }
}

struct Registration {
    info: ReceiverInfo,
    phy_sink: Weak<dyn InBandSink>,
    mac_sink: Weak<dyn OutOfBandSink>,
}

impl Registration {
    fn same_sinks(&self, phy_sink: &Weak<dyn InBandSink>, mac_sink: &Weak<dyn OutOfBandSink>) -> bool {
        Weak::ptr_eq(&self.phy_sink, phy_sink) && Weak::ptr_eq(&self.mac_sink, mac_sink)
    }
}

/// In-memory broadcast and selective delivery registry
pub struct DistributionHub {
    max_receivers: usize,
    receivers: RwLock<Vec<Option<Registration>>>,
}

impl DistributionHub {
    /// Creates a hub from its configuration
    pub fn new(config: HubConfig) -> Self {
        Self::with_capacity(config.max_receivers)
    }

    /// Creates a hub holding at most `max_receivers` registrations
    pub fn with_capacity(max_receivers: usize) -> Self {
        Self {
            max_receivers,
            receivers: RwLock::new(Vec::with_capacity(max_receivers)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Option<Registration>>> {
        self.receivers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Option<Registration>>> {
        self.receivers.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a receiver in the first free slot and returns the slot index.
    ///
    /// Registering an already registered tuning again with the same sinks
    /// returns the existing slot. The same tuning with different sinks is
    /// rejected so no receiver ever sees a packet twice.
    pub fn register(
        &self,
        info: ReceiverInfo,
        phy_sink: Weak<dyn InBandSink>,
        mac_sink: Weak<dyn OutOfBandSink>,
    ) -> Result<usize, HubError> {
        let mut receivers = self.write();

        let existing = receivers.iter().enumerate().find_map(|(slot, entry)| {
            entry
                .as_ref()
                .filter(|reg| reg.info == info)
                .map(|reg| (slot, reg))
        });
        if let Some((slot, reg)) = existing {
            if reg.same_sinks(&phy_sink, &mac_sink) {
                return Ok(slot);
            }
            return Err(HubError::DuplicateReceiver { slot, info });
        }

        let registration = Registration {
            info,
            phy_sink,
            mac_sink,
        };
        let slot = match receivers.iter().position(Option::is_none) {
            Some(slot) => {
                receivers[slot] = Some(registration);
                slot
            }
            None if receivers.len() < self.max_receivers => {
                receivers.push(Some(registration));
                receivers.len() - 1
            }
            None => {
                return Err(HubError::CapacityExceeded {
                    max: self.max_receivers,
                })
            }
        };

        debug!("Registered receiver in slot {}: {}", slot, info);
        Ok(slot)
    }

    /// Removes the registration in `slot`, returning its tuning
    pub fn unregister(&self, slot: usize) -> Option<ReceiverInfo> {
        let removed = self.write().get_mut(slot)?.take().map(|reg| reg.info);
        if let Some(info) = &removed {
            debug!("Unregistered receiver in slot {}: {}", slot, info);
        }
        removed
    }

    /// Removes every registration
    pub fn clear(&self) {
        self.write().clear();
        debug!("Cleared all receiver registrations");
    }

    /// Number of live registrations
    pub fn receiver_count(&self) -> usize {
        self.read().iter().filter(|entry| entry.is_some()).count()
    }

    /// Maximum number of registrations
    pub fn capacity(&self) -> usize {
        self.max_receivers
    }

    /// Delivers a packet to every receiver tuned to its carrier frequency.
    ///
    /// Returns the number of sinks that received the packet.
    pub fn send_in_band(&self, packet: &InBandPacket) -> usize {
        let carrier_frequency = packet.carrier_frequency();
        // Collect under the lock, deliver after releasing it
        let sinks: Vec<Arc<dyn InBandSink>> = self
            .read()
            .iter()
            .flatten()
            .filter(|reg| reg.info.carrier_frequency == carrier_frequency)
            .filter_map(|reg| reg.phy_sink.upgrade())
            .collect();

        for sink in &sinks {
            sink.deliver_in_band(packet);
        }
        trace!(
            "In-band packet from node {} at {:.3} MHz delivered to {} receivers",
            packet.sender(),
            carrier_frequency / 1e6,
            sinks.len()
        );
        sinks.len()
    }

    /// Delivers a packet to every receiver in its cell.
    ///
    /// Returns the number of sinks that received the packet.
    pub fn send_out_of_band(&self, packet: &OutOfBandPacket) -> usize {
        let sinks: Vec<Arc<dyn OutOfBandSink>> = self
            .read()
            .iter()
            .flatten()
            .filter(|reg| reg.info.cell_id == packet.cell_id)
            .filter_map(|reg| reg.mac_sink.upgrade())
            .collect();

        for sink in &sinks {
            sink.deliver_out_of_band(packet);
        }
        trace!(
            "Out-of-band {} for RNTI {} in cell {} delivered to {} receivers",
            packet.packet_type,
            packet.rnti,
            packet.cell_id,
            sinks.len()
        );
        sinks.len()
    }
}

impl Default for DistributionHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl fmt::Debug for DistributionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributionHub")
            .field("max_receivers", &self.max_receivers)
            .field("receiver_count", &self.receiver_count())
            .finish()
    }
}
