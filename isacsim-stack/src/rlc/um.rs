//! Unacknowledged mode entity
//!
//! PDU formats (TS 38.322 6.2.2.3):
//!
//! ```text
//! complete SDU:   | SI=00 | R (6) |                       data
//! 6 bit SN:       | SI | SN (6) |            [SO (16)]  data
//! 12 bit SN:      | SI | R R | SN (12) |     [SO (16)]  data
//! ```
//!
//! Only segmented SDUs consume a sequence number.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use super::segment::{unwrap_sn, wrap_sn, Reassembly, SegmentInfo, Segmenter, SO_LEN};
use super::{check_sdu_len, RlcEntityParams, RlcStatistics, RlcTimer, SduQueue, MAX_PDU_SIZE};
use crate::error::RlcError;

/// Header size of a PDU carrying a complete SDU
const COMPLETE_HEADER_LEN: usize = 1;

/// Unacknowledged mode RLC entity
#[derive(Debug)]
pub struct UmEntity {
    params: RlcEntityParams,
    sdu_queue: SduQueue,
    current: Option<Segmenter>,
    tx_next: u64,
    reassembly: BTreeMap<u64, Reassembly>,
    rx_next_highest: u64,
    reassembly_timer: RlcTimer,
    stats: RlcStatistics,
}

impl UmEntity {
    /// Creates an entity
    pub fn new(params: RlcEntityParams) -> Self {
        Self {
            sdu_queue: SduQueue::new(params.max_tx_buffer_sdus),
            current: None,
            tx_next: 0,
            reassembly: BTreeMap::new(),
            rx_next_highest: 0,
            reassembly_timer: RlcTimer::new(params.reassembly_ms),
            stats: RlcStatistics::default(),
            params,
        }
    }

    /// Construction parameters
    pub fn params(&self) -> &RlcEntityParams {
        &self.params
    }

    /// Counters
    pub fn statistics(&self) -> &RlcStatistics {
        &self.stats
    }

    fn segment_header_len(&self, bits: u8) -> usize {
        if bits == 6 {
            1
        } else {
            2
        }
    }

    /// Queues an SDU
    pub fn enqueue_sdu(&mut self, sdu: Bytes) -> Result<(), RlcError> {
        if !self.params.direction.transmits() {
            return Err(RlcError::NotTransmitting {
                rnti: self.params.rnti,
                lcid: self.params.lcid,
            });
        }
        check_sdu_len(&self.params, &sdu)?;
        self.sdu_queue.push(&self.params, sdu, &mut self.stats);
        Ok(())
    }

    /// Builds PDUs within `grant_size` bytes
    pub fn send_pdus(&mut self, grant_size: usize) -> Vec<Bytes> {
        let mut pdus = Vec::new();
        if !self.params.direction.transmits() {
            return pdus;
        }

        let bits = self.params.tx_sn_field_length;
        let base = self.segment_header_len(bits);
        let mut budget = grant_size.min(MAX_PDU_SIZE);

        loop {
            if self.current.is_none() {
                let Some(front_len) = self.sdu_queue.front_len() else {
                    break;
                };
                if front_len + COMPLETE_HEADER_LEN <= budget {
                    let Some(sdu) = self.sdu_queue.pop() else {
                        break;
                    };
                    let pdu = encode_pdu(bits, SegmentInfo::Complete, 0, 0, &sdu);
                    budget -= pdu.len();
                    self.record_tx(&pdu);
                    pdus.push(pdu);
                    continue;
                }
                if budget <= base {
                    break;
                }
                let Some(sdu) = self.sdu_queue.pop() else {
                    break;
                };
                self.current = Some(Segmenter::new(self.tx_next, sdu, false));
                self.tx_next += 1;
            }

            let Some(segmenter) = self.current.as_mut() else {
                break;
            };
            let header = segmenter.header_len(base);
            if budget <= header {
                break;
            }
            let sn = wrap_sn(segmenter.sn, bits);
            let (si, offset, data) = segmenter.take(budget - header);
            if segmenter.is_done() {
                self.current = None;
            }
            let pdu = encode_pdu(bits, si, sn, offset, &data);
            budget -= pdu.len();
            self.record_tx(&pdu);
            pdus.push(pdu);
        }
        pdus
    }

    fn record_tx(&mut self, pdu: &Bytes) {
        self.stats.tx_data_pdu += 1;
        self.stats.tx_data_bytes += pdu.len() as u64;
    }

    /// Processes a received PDU
    pub fn receive_pdu(&mut self, pdu: Bytes) -> Result<Vec<Bytes>, RlcError> {
        if !self.params.direction.receives() {
            return Err(RlcError::NotReceiving {
                rnti: self.params.rnti,
                lcid: self.params.lcid,
            });
        }
        let malformed = |reason: &str| RlcError::MalformedPdu {
            rnti: self.params.rnti,
            lcid: self.params.lcid,
            reason: reason.to_string(),
        };

        let Some(&first) = pdu.first() else {
            return Err(malformed("empty PDU"));
        };
        let si = SegmentInfo::from_bits(first >> 6);
        if si == SegmentInfo::Complete {
            self.stats.rx_data_pdu += 1;
            self.stats.rx_data_bytes += pdu.len() as u64;
            return Ok(vec![pdu.slice(COMPLETE_HEADER_LEN..)]);
        }

        let bits = self.params.rx_sn_field_length;
        let mut pos = self.segment_header_len(bits);
        let so_len = if si.has_offset() { SO_LEN } else { 0 };
        if pdu.len() <= pos + so_len {
            return Err(malformed("segment shorter than its header"));
        }
        let sn = if bits == 6 {
            u32::from(first & 0x3F)
        } else {
            (u32::from(first & 0x0F) << 8) | u32::from(pdu[1])
        };
        let offset = if si.has_offset() {
            let so = usize::from(u16::from_be_bytes([pdu[pos], pdu[pos + 1]]));
            pos += SO_LEN;
            so
        } else {
            0
        };
        let data = pdu.slice(pos..);
        let count = unwrap_sn(self.rx_next_highest, sn, bits);

        if !self.reassembly.contains_key(&count)
            && self.reassembly.len() >= self.params.reassembly_capacity
        {
            debug!(
                "RLC UM RNTI {} LCID {}: reassembly full, dropping SN {}",
                self.params.rnti, self.params.lcid, sn
            );
            self.stats.rx_data_pdu_dropped += 1;
            self.stats.rx_data_bytes_dropped += pdu.len() as u64;
            return Ok(Vec::new());
        }

        let entry = self.reassembly.entry(count).or_default();
        if !entry.insert(offset, data, si.is_last()) {
            self.stats.rx_data_pdu_duplicate += 1;
            self.stats.rx_data_bytes_duplicate += pdu.len() as u64;
            return Ok(Vec::new());
        }
        self.stats.rx_data_pdu += 1;
        self.stats.rx_data_bytes += pdu.len() as u64;
        self.rx_next_highest = self.rx_next_highest.max(count + 1);

        let mut sdus = Vec::new();
        if entry.is_complete() {
            if let Some(done) = self.reassembly.remove(&count) {
                sdus.push(done.assemble());
            }
        }

        if self.reassembly.is_empty() {
            self.reassembly_timer.stop();
        } else if !self.reassembly_timer.is_running() {
            self.reassembly_timer.start();
        }
        Ok(sdus)
    }

    /// Advances timers by one millisecond; an expired t-Reassembly discards
    /// every incomplete SDU
    pub fn timer_tick(&mut self) {
        if self.reassembly_timer.perform_tick() {
            self.stats.timer_reassembly_timed_out += 1;
            for (_, partial) in std::mem::take(&mut self.reassembly) {
                self.stats.rx_data_pdu_dropped += partial.segment_count() as u64;
                self.stats.rx_data_bytes_dropped += partial.bytes() as u64;
            }
        }
    }

    /// Bytes waiting for transmission, headers included
    pub fn buffer_status(&self) -> usize {
        let base = self.segment_header_len(self.params.tx_sn_field_length);
        let queued = self.sdu_queue.bytes() + self.sdu_queue.len() * COMPLETE_HEADER_LEN;
        let current = self
            .current
            .as_ref()
            .map_or(0, |s| s.remaining() + s.header_len(base));
        queued + current
    }
}

fn encode_pdu(bits: u8, si: SegmentInfo, sn: u32, offset: usize, data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(data.len() + 4);
    let si_bits = (si as u8) << 6;
    match si {
        SegmentInfo::Complete => buf.put_u8(si_bits),
        _ if bits == 6 => buf.put_u8(si_bits | (sn as u8 & 0x3F)),
        _ => {
            buf.put_u8(si_bits | ((sn >> 8) as u8 & 0x0F));
            buf.put_u8(sn as u8);
        }
    }
    if si.has_offset() {
        // SDUs are bounded by MAX_SDU_SIZE at enqueue
        debug_assert!(offset <= usize::from(u16::MAX));
        buf.put_u16(offset as u16);
    }
    buf.extend_from_slice(data);
    buf.freeze()
}
