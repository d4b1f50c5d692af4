//! Round-robin byte scheduler

use isacsim_common::{CarrierConfig, LinkDirection, Rnti, SUBCARRIERS_PER_RB, SYMBOLS_PER_SLOT};
use tracing::trace;

use crate::layer::{Grant, Scheduler, UeDemand};

/// Modulation assumed when deriving a slot budget from a carrier (QPSK)
pub const DEFAULT_BITS_PER_RESOURCE_ELEMENT: u32 = 2;

/// Splits a fixed per-slot byte budget evenly over the UEs with data.
///
/// Shares a UE cannot use are handed to the others. The UE served first
/// rotates every slot, separately per direction, so integer remainders do
/// not always favour the same RNTI.
#[derive(Debug, Clone)]
pub struct RoundRobinScheduler {
    bytes_per_slot: usize,
    last_first: [Option<Rnti>; 2],
}

impl RoundRobinScheduler {
    /// Creates a scheduler with a fixed budget per slot and direction
    pub fn new(bytes_per_slot: usize) -> Self {
        Self {
            bytes_per_slot,
            last_first: [None, None],
        }
    }

    /// Budget of every resource element of a slot at the default modulation
    pub fn for_carrier(carrier: &CarrierConfig) -> Self {
        let elements = carrier.num_resource_blocks * SUBCARRIERS_PER_RB * SYMBOLS_PER_SLOT;
        Self::new((elements * DEFAULT_BITS_PER_RESOURCE_ELEMENT / 8) as usize)
    }

    /// Bytes available per slot and direction
    pub fn bytes_per_slot(&self) -> usize {
        self.bytes_per_slot
    }

    fn cursor(&mut self, direction: LinkDirection) -> &mut Option<Rnti> {
        match direction {
            LinkDirection::Downlink => &mut self.last_first[0],
            LinkDirection::Uplink => &mut self.last_first[1],
        }
    }
}

impl Scheduler for RoundRobinScheduler {
    fn schedule(&mut self, direction: LinkDirection, demands: &[UeDemand]) -> Vec<Grant> {
        let mut order: Vec<UeDemand> = demands.iter().copied().filter(|d| d.bytes > 0).collect();
        if order.is_empty() || self.bytes_per_slot == 0 {
            return Vec::new();
        }
        order.sort_by_key(|d| d.rnti);

        // Start after the UE that went first last time
        let start = match *self.cursor(direction) {
            Some(last) => order.iter().position(|d| d.rnti > last).unwrap_or(0),
            None => 0,
        };
        order.rotate_left(start);
        *self.cursor(direction) = Some(order[0].rnti);

        let mut granted = vec![0usize; order.len()];
        let mut budget = self.bytes_per_slot;
        while budget > 0 {
            let hungry: Vec<usize> = (0..order.len())
                .filter(|&i| granted[i] < order[i].bytes)
                .collect();
            if hungry.is_empty() {
                break;
            }
            let share = (budget / hungry.len()).max(1);
            for i in hungry {
                let take = share.min(order[i].bytes - granted[i]).min(budget);
                granted[i] += take;
                budget -= take;
                if budget == 0 {
                    break;
                }
            }
        }

        let grants: Vec<Grant> = order
            .iter()
            .zip(granted)
            .filter(|(_, bytes)| *bytes > 0)
            .map(|(demand, bytes)| Grant {
                rnti: demand.rnti,
                bytes,
            })
            .collect();
        trace!("{} grants: {:?}", direction, grants);
        grants
    }
}
