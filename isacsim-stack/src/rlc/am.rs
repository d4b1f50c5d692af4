//! Acknowledged mode entity
//!
//! Data PDU (TS 38.322 6.2.2.4), SO present for last and middle segments:
//!
//! ```text
//! 12 bit SN:  | D/C=1 | P | SI (2) | SN (12) |            [SO (16)] data
//! 18 bit SN:  | D/C=1 | P | SI (2) | R R | SN (18) |      [SO (16)] data
//! ```
//!
//! Status PDU, with the SN fields as wide as the data PDU header:
//!
//! ```text
//! | D/C=0 | CPT=000 | ACK_SN | NACK count (8) | NACK_SN * count
//! ```
//!
//! `ACK_SN` is the first SN not reported on; every SN below it that is not
//! listed as a NACK has been received. Negatively acknowledged SDUs are
//! retransmitted whole.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use super::segment::{unwrap_sn, wrap_sn, Reassembly, SegmentInfo, Segmenter, SO_LEN};
use super::{check_sdu_len, RlcEntityParams, RlcStatistics, RlcTimer, SduQueue, MAX_PDU_SIZE};
use crate::error::RlcError;

/// Largest number of NACKs in one status PDU
const MAX_NACKS: usize = u8::MAX as usize;

/// Width in bytes of the SN-carrying header part for a SN length
fn sn_bytes(bits: u8) -> usize {
    if bits == 18 {
        3
    } else {
        2
    }
}

/// Acknowledged mode RLC entity
#[derive(Debug)]
pub struct AmEntity {
    params: RlcEntityParams,
    stats: RlcStatistics,

    // Transmitting side
    sdu_queue: SduQueue,
    current: Option<Segmenter>,
    retx_queue: VecDeque<u64>,
    /// Transmitted SDUs awaiting acknowledgement, by SN
    tx_window: BTreeMap<u64, Bytes>,
    tx_next: u64,
    pdu_without_poll: u32,
    poll_sn: Option<u64>,
    poll_pending: bool,
    poll_retransmit_timer: RlcTimer,

    // Receiving side
    rx_next: u64,
    rx_next_highest: u64,
    reassembly: BTreeMap<u64, Reassembly>,
    /// Delivered SNs at or above `rx_next`
    delivered: BTreeSet<u64>,
    status_triggered: bool,
    reassembly_timer: RlcTimer,
    status_prohibit_timer: RlcTimer,
}

impl AmEntity {
    /// Creates an entity
    pub fn new(params: RlcEntityParams) -> Self {
        Self {
            stats: RlcStatistics::default(),
            sdu_queue: SduQueue::new(params.max_tx_buffer_sdus),
            current: None,
            retx_queue: VecDeque::new(),
            tx_window: BTreeMap::new(),
            tx_next: 0,
            pdu_without_poll: 0,
            poll_sn: None,
            poll_pending: false,
            poll_retransmit_timer: RlcTimer::new(params.poll_retransmit_ms),
            rx_next: 0,
            rx_next_highest: 0,
            reassembly: BTreeMap::new(),
            delivered: BTreeSet::new(),
            status_triggered: false,
            reassembly_timer: RlcTimer::new(params.reassembly_ms),
            status_prohibit_timer: RlcTimer::new(params.status_prohibit_ms),
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

    /// Number of transmitted SDUs not yet acknowledged
    pub fn unacknowledged(&self) -> usize {
        self.tx_window.len()
    }

    fn tx_window_size(&self) -> u64 {
        1u64 << (self.params.tx_sn_field_length - 1)
    }

    fn rx_window_size(&self) -> u64 {
        1u64 << (self.params.rx_sn_field_length - 1)
    }

    fn tx_next_ack(&self) -> u64 {
        self.tx_window.keys().next().copied().unwrap_or(self.tx_next)
    }

    /// Queues an SDU
    pub fn enqueue_sdu(&mut self, sdu: Bytes) -> Result<(), RlcError> {
        check_sdu_len(&self.params, &sdu)?;
        self.sdu_queue.push(&self.params, sdu, &mut self.stats);
        Ok(())
    }

    // ========================================================================
    // Transmission
    // ========================================================================

    /// Builds PDUs within `grant_size` bytes, status PDU first
    pub fn send_pdus(&mut self, grant_size: usize) -> Vec<Bytes> {
        let mut pdus = Vec::new();
        let mut budget = grant_size.min(MAX_PDU_SIZE);

        if self.status_triggered && !self.status_prohibit_timer.is_running() {
            if let Some(status) = self.build_status(budget) {
                budget -= status.len();
                self.stats.tx_control_pdu += 1;
                self.stats.tx_control_bytes += status.len() as u64;
                self.status_triggered = false;
                self.status_prohibit_timer.start();
                pdus.push(status);
            }
        }

        let bits = self.params.tx_sn_field_length;
        let base = sn_bytes(bits);
        loop {
            if self.current.is_none() {
                self.current = self.next_segmenter();
            }
            let Some(segmenter) = self.current.as_mut() else {
                break;
            };
            let header = segmenter.header_len(base);
            if budget <= header {
                break;
            }
            let sn = segmenter.sn;
            let is_retx = segmenter.is_retx;
            let (si, offset, data) = segmenter.take(budget - header);
            if segmenter.is_done() {
                self.current = None;
            }

            let poll = self.should_poll();
            let pdu = encode_data_pdu(bits, poll, si, wrap_sn(sn, bits), offset, &data);
            budget -= pdu.len();
            if is_retx {
                self.stats.retx_data_pdu += 1;
                self.stats.retx_data_bytes += pdu.len() as u64;
            } else {
                self.stats.tx_data_pdu += 1;
                self.stats.tx_data_bytes += pdu.len() as u64;
            }
            pdus.push(pdu);
        }
        pdus
    }

    /// Next SDU to segment: pending retransmissions first, then new data
    /// while the transmit window has room
    fn next_segmenter(&mut self) -> Option<Segmenter> {
        while let Some(sn) = self.retx_queue.pop_front() {
            if let Some(sdu) = self.tx_window.get(&sn) {
                return Some(Segmenter::new(sn, sdu.clone(), true));
            }
        }

        if self.tx_next - self.tx_next_ack() >= self.tx_window_size() {
            return None;
        }
        let sdu = self.sdu_queue.pop()?;
        let sn = self.tx_next;
        self.tx_next += 1;
        self.tx_window.insert(sn, sdu.clone());
        Some(Segmenter::new(sn, sdu, false))
    }

    fn should_poll(&mut self) -> bool {
        self.pdu_without_poll += 1;
        let drained =
            self.sdu_queue.is_empty() && self.retx_queue.is_empty() && self.current.is_none();
        if !(self.poll_pending || drained || self.pdu_without_poll >= self.params.poll_pdu) {
            return false;
        }
        self.pdu_without_poll = 0;
        self.poll_pending = false;
        self.poll_sn = Some(self.tx_next.saturating_sub(1));
        self.poll_retransmit_timer.start();
        true
    }

    fn build_status(&self, budget: usize) -> Option<Bytes> {
        let width = sn_bytes(self.params.rx_sn_field_length);
        if budget < width + 1 {
            return None;
        }
        let missing: Vec<u64> = (self.rx_next..self.rx_next_highest)
            .filter(|sn| !self.delivered.contains(sn))
            .collect();
        let max_nacks = ((budget - width - 1) / width).min(MAX_NACKS);

        // A truncated list acknowledges only up to the first omitted NACK
        let (ack_sn, nacks) = if missing.len() > max_nacks {
            (missing[max_nacks], &missing[..max_nacks])
        } else {
            (self.rx_next_highest, &missing[..])
        };
        Some(encode_status_pdu(self.params.rx_sn_field_length, ack_sn, nacks))
    }

    // ========================================================================
    // Reception
    // ========================================================================

    fn malformed(&self, reason: &str) -> RlcError {
        RlcError::MalformedPdu {
            rnti: self.params.rnti,
            lcid: self.params.lcid,
            reason: reason.to_string(),
        }
    }

    /// Processes a received data or status PDU
    pub fn receive_pdu(&mut self, pdu: Bytes) -> Result<Vec<Bytes>, RlcError> {
        let Some(&first) = pdu.first() else {
            return Err(self.malformed("empty PDU"));
        };
        if first & 0x80 == 0 {
            self.receive_status(&pdu)?;
            return Ok(Vec::new());
        }
        self.receive_data(pdu, first)
    }

    fn receive_status(&mut self, pdu: &[u8]) -> Result<(), RlcError> {
        let bits = self.params.tx_sn_field_length;
        let width = sn_bytes(bits);
        if pdu.len() < width + 1 {
            return Err(self.malformed("status PDU shorter than its header"));
        }
        let count = usize::from(pdu[width]);
        if pdu.len() < width + 1 + count * width {
            return Err(self.malformed("status PDU truncated NACK list"));
        }
        self.stats.rx_control_pdu += 1;
        self.stats.rx_control_bytes += pdu.len() as u64;

        let read_sn = |at: usize| -> u32 {
            let mut sn = 0u32;
            for byte in &pdu[at..at + width] {
                sn = (sn << 8) | u32::from(*byte);
            }
            sn & ((1u32 << bits) - 1)
        };
        let ack_sn = unwrap_sn(self.tx_next, read_sn(0), bits);
        let nacks: BTreeSet<u64> = (0..count)
            .map(|i| unwrap_sn(self.tx_next, read_sn(width + 1 + i * width), bits))
            .collect();

        let acked: Vec<u64> = self
            .tx_window
            .range(..ack_sn)
            .map(|(&sn, _)| sn)
            .filter(|sn| !nacks.contains(sn))
            .collect();
        for sn in &acked {
            self.tx_window.remove(sn);
        }

        let in_progress = self.current.as_ref().map(|s| s.sn);
        for &sn in &nacks {
            if self.tx_window.contains_key(&sn)
                && !self.retx_queue.contains(&sn)
                && in_progress != Some(sn)
            {
                self.retx_queue.push_back(sn);
            }
        }

        if self.poll_sn.is_some_and(|poll_sn| poll_sn < ack_sn) {
            self.poll_retransmit_timer.stop();
            self.poll_sn = None;
        }
        trace!(
            "RLC AM RNTI {} LCID {}: status ACK_SN {} acked {} NACKs {}",
            self.params.rnti,
            self.params.lcid,
            ack_sn,
            acked.len(),
            nacks.len()
        );
        Ok(())
    }

    fn receive_data(&mut self, pdu: Bytes, first: u8) -> Result<Vec<Bytes>, RlcError> {
        let bits = self.params.rx_sn_field_length;
        let width = sn_bytes(bits);
        let poll = first & 0x40 != 0;
        let si = SegmentInfo::from_bits(first >> 4);
        let so_len = if si.has_offset() { SO_LEN } else { 0 };
        if pdu.len() <= width + so_len {
            return Err(self.malformed("data PDU shorter than its header"));
        }

        let sn = if bits == 18 {
            (u32::from(first & 0x03) << 16) | (u32::from(pdu[1]) << 8) | u32::from(pdu[2])
        } else {
            (u32::from(first & 0x0F) << 8) | u32::from(pdu[1])
        };
        let offset = if si.has_offset() {
            usize::from(u16::from_be_bytes([pdu[width], pdu[width + 1]]))
        } else {
            0
        };
        let data = pdu.slice(width + so_len..);
        let count = unwrap_sn(self.rx_next, sn, bits);

        if poll {
            self.status_triggered = true;
        }

        let duplicate = count < self.rx_next
            || self.delivered.contains(&count)
            || self
                .reassembly
                .get(&count)
                .is_some_and(|r| r.covers(offset, data.len()));
        if duplicate {
            self.stats.rx_data_pdu_duplicate += 1;
            self.stats.rx_data_bytes_duplicate += pdu.len() as u64;
            return Ok(Vec::new());
        }

        let outside_window = count >= self.rx_next + self.rx_window_size();
        let buffer_full = !self.reassembly.contains_key(&count)
            && self.reassembly.len() >= self.params.reassembly_capacity;
        if outside_window || buffer_full {
            debug!(
                "RLC AM RNTI {} LCID {}: dropping SN {} (outside window: {}, reassembly full: {})",
                self.params.rnti, self.params.lcid, sn, outside_window, buffer_full
            );
            self.stats.rx_data_pdu_dropped += 1;
            self.stats.rx_data_bytes_dropped += pdu.len() as u64;
            return Ok(Vec::new());
        }

        self.stats.rx_data_pdu += 1;
        self.stats.rx_data_bytes += pdu.len() as u64;
        self.rx_next_highest = self.rx_next_highest.max(count + 1);

        let entry = self.reassembly.entry(count).or_default();
        entry.insert(offset, data, si.is_last());
        let mut sdus = Vec::new();
        if entry.is_complete() {
            if let Some(done) = self.reassembly.remove(&count) {
                sdus.push(done.assemble());
                self.delivered.insert(count);
            }
        }
        while self.delivered.remove(&self.rx_next) {
            self.rx_next += 1;
        }

        if self.rx_next >= self.rx_next_highest {
            self.reassembly_timer.stop();
        } else if !self.reassembly_timer.is_running() {
            self.reassembly_timer.start();
        }
        Ok(sdus)
    }

    // ========================================================================
    // Timers and buffer status
    // ========================================================================

    /// Advances timers by one millisecond
    pub fn timer_tick(&mut self) {
        if self.poll_retransmit_timer.perform_tick() {
            self.stats.timer_poll_retransmit_timed_out += 1;
            let idle =
                self.sdu_queue.is_empty() && self.current.is_none() && self.retx_queue.is_empty();
            if idle {
                if let Some(&highest) = self.tx_window.keys().next_back() {
                    self.retx_queue.push_back(highest);
                }
            }
            self.poll_pending = !self.tx_window.is_empty();
        }

        if self.reassembly_timer.perform_tick() {
            self.stats.timer_reassembly_timed_out += 1;
            self.status_triggered = true;
            if self.rx_next < self.rx_next_highest {
                self.reassembly_timer.start();
            }
        }

        if self.status_prohibit_timer.perform_tick() {
            self.stats.timer_status_prohibit_timed_out += 1;
        }
    }

    /// Bytes waiting for transmission, headers and pending status included
    pub fn buffer_status(&self) -> usize {
        let base = sn_bytes(self.params.tx_sn_field_length);
        let status = if self.status_triggered && !self.status_prohibit_timer.is_running() {
            let width = sn_bytes(self.params.rx_sn_field_length);
            let missing = (self.rx_next..self.rx_next_highest)
                .filter(|sn| !self.delivered.contains(sn))
                .count()
                .min(MAX_NACKS);
            width + 1 + missing * width
        } else {
            0
        };
        let queued = self.sdu_queue.bytes() + self.sdu_queue.len() * base;
        let current = self
            .current
            .as_ref()
            .map_or(0, |s| s.remaining() + s.header_len(base));
        let retx: usize = self
            .retx_queue
            .iter()
            .filter_map(|sn| self.tx_window.get(sn))
            .map(|sdu| sdu.len() + base)
            .sum();
        status + queued + current + retx
    }
}

fn put_sn(buf: &mut BytesMut, high_bits: u8, sn: u32, bits: u8) {
    if bits == 18 {
        buf.put_u8(high_bits | ((sn >> 16) as u8 & 0x03));
        buf.put_u8((sn >> 8) as u8);
    } else {
        buf.put_u8(high_bits | ((sn >> 8) as u8 & 0x0F));
    }
    buf.put_u8(sn as u8);
}

fn encode_data_pdu(
    bits: u8,
    poll: bool,
    si: SegmentInfo,
    sn: u32,
    offset: usize,
    data: &[u8],
) -> Bytes {
    let mut buf = BytesMut::with_capacity(data.len() + 5);
    let high = 0x80 | (u8::from(poll) << 6) | ((si as u8) << 4);
    put_sn(&mut buf, high, sn, bits);
    if si.has_offset() {
        // SDUs are bounded by MAX_SDU_SIZE at enqueue
        debug_assert!(offset <= usize::from(u16::MAX));
        buf.put_u16(offset as u16);
    }
    buf.extend_from_slice(data);
    buf.freeze()
}

fn encode_status_pdu(bits: u8, ack_sn: u64, nacks: &[u64]) -> Bytes {
    let width = sn_bytes(bits);
    let mut buf = BytesMut::with_capacity(width + 1 + nacks.len() * width);
    put_sn(&mut buf, 0x00, wrap_sn(ack_sn, bits), bits);
    buf.put_u8(nacks.len() as u8);
    for &nack in nacks {
        let sn = wrap_sn(nack, bits);
        if width == 3 {
            buf.put_u8((sn >> 16) as u8);
        }
        buf.put_u8((sn >> 8) as u8);
        buf.put_u8(sn as u8);
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use isacsim_common::{LogicalChannelConfig, NodeRole, RlcEntityType};

    fn pair(sn: u8) -> (AmEntity, AmEntity) {
        let mut config = LogicalChannelConfig::new(RlcEntityType::Am, 4);
        config.sn_field_length_dl = sn;
        config.sn_field_length_ul = sn;
        config.poll_pdu = 4;
        (
            AmEntity::new(RlcEntityParams::new(1, &config, NodeRole::Gnb, 16)),
            AmEntity::new(RlcEntityParams::new(1, &config, NodeRole::Ue, 16)),
        )
    }

    fn sdu(tag: u8, len: usize) -> Bytes {
        Bytes::from(vec![tag; len])
    }

    #[test]
    fn test_data_header_12_bit() {
        let pdu = encode_data_pdu(12, true, SegmentInfo::Complete, 0x123, 0, b"ab");
        assert_eq!(&pdu[..], &[0xc1, 0x23, b'a', b'b']);
        let pdu = encode_data_pdu(18, false, SegmentInfo::Last, 0x2_0304, 7, b"z");
        assert_eq!(&pdu[..], &[0xa2, 0x03, 0x04, 0x00, 0x07, b'z']);
    }

    #[test]
    fn test_transfer_and_acknowledge() {
        let (mut tx, mut rx) = pair(12);
        tx.enqueue_sdu(sdu(1, 100)).unwrap();
        tx.enqueue_sdu(sdu(2, 100)).unwrap();

        let mut delivered = Vec::new();
        for pdu in tx.send_pdus(1000) {
            delivered.extend(rx.receive_pdu(pdu).unwrap());
        }
        assert_eq!(delivered, vec![sdu(1, 100), sdu(2, 100)]);
        assert_eq!(tx.unacknowledged(), 2);

        // Last PDU carried the poll bit, so a status report is pending
        assert_eq!(rx.buffer_status(), 3);
        let status = rx.send_pdus(100);
        assert_eq!(status.len(), 1);
        tx.receive_pdu(status[0].clone()).unwrap();

        assert_eq!(tx.unacknowledged(), 0);
        assert_eq!(tx.statistics().tx_data_pdu, 2);
        assert_eq!(tx.statistics().rx_control_pdu, 1);
        assert_eq!(rx.statistics().tx_control_pdu, 1);
    }

    #[test]
    fn test_nack_triggers_retransmission() {
        let (mut tx, mut rx) = pair(12);
        for tag in 0..3 {
            tx.enqueue_sdu(sdu(tag, 10)).unwrap();
        }
        let pdus = tx.send_pdus(1000);
        assert_eq!(pdus.len(), 3);

        // SN 1 is lost
        rx.receive_pdu(pdus[0].clone()).unwrap();
        rx.receive_pdu(pdus[2].clone()).unwrap();
        let status = rx.send_pdus(100);
        assert_eq!(&status[0][..], &[0x00, 0x03, 1, 0x00, 0x01]);

        tx.receive_pdu(status[0].clone()).unwrap();
        assert_eq!(tx.unacknowledged(), 1);
        assert_eq!(tx.buffer_status(), 12);

        let retx = tx.send_pdus(1000);
        assert_eq!(retx.len(), 1);
        assert_eq!(tx.statistics().retx_data_pdu, 1);
        assert_eq!(rx.receive_pdu(retx[0].clone()).unwrap(), vec![sdu(1, 10)]);
    }

    #[test]
    fn test_duplicate_detected() {
        let (mut tx, mut rx) = pair(18);
        tx.enqueue_sdu(sdu(9, 20)).unwrap();
        let pdu = tx.send_pdus(100).remove(0);
        assert_eq!(rx.receive_pdu(pdu.clone()).unwrap().len(), 1);
        assert!(rx.receive_pdu(pdu).unwrap().is_empty());
        assert_eq!(rx.statistics().rx_data_pdu_duplicate, 1);
    }

    #[test]
    fn test_poll_retransmit_timeout() {
        let (mut tx, _rx) = pair(12);
        tx.enqueue_sdu(sdu(1, 10)).unwrap();
        let lost = tx.send_pdus(100);
        assert_eq!(lost.len(), 1);
        assert_eq!(tx.buffer_status(), 0);

        for _ in 0..20 {
            tx.timer_tick();
        }
        assert_eq!(tx.statistics().timer_poll_retransmit_timed_out, 1);
        assert_eq!(tx.buffer_status(), 12);
        let retx = tx.send_pdus(100);
        assert_eq!(retx.len(), 1);
        // Retransmission carries a poll
        assert_eq!(retx[0][0] & 0x40, 0x40);
    }

    #[test]
    fn test_status_prohibit_delays_second_report() {
        let (mut tx, mut rx) = pair(12);
        tx.enqueue_sdu(sdu(1, 10)).unwrap();
        tx.enqueue_sdu(sdu(2, 10)).unwrap();
        let pdus = tx.send_pdus(1000);

        rx.receive_pdu(pdus[0].clone()).unwrap();
        rx.status_triggered = true;
        assert_eq!(rx.send_pdus(100).len(), 1);

        rx.receive_pdu(pdus[1].clone()).unwrap();
        assert!(rx.send_pdus(100).is_empty());
        for _ in 0..5 {
            rx.timer_tick();
        }
        assert_eq!(rx.statistics().timer_status_prohibit_timed_out, 1);
        assert_eq!(rx.send_pdus(100).len(), 1);
    }

    #[test]
    fn test_segmented_sdu_reassembled() {
        let (mut tx, mut rx) = pair(12);
        tx.enqueue_sdu(sdu(7, 50)).unwrap();
        let mut delivered = Vec::new();
        for _ in 0..4 {
            for pdu in tx.send_pdus(20) {
                delivered.extend(rx.receive_pdu(pdu).unwrap());
            }
        }
        assert_eq!(delivered, vec![sdu(7, 50)]);
        assert_eq!(tx.statistics().tx_data_pdu, 3);
    }

    #[test]
    fn test_truncated_status_rejected() {
        let (mut tx, _) = pair(12);
        assert!(matches!(
            tx.receive_pdu(Bytes::from_static(&[0x00, 0x01, 2, 0x00])),
            Err(RlcError::MalformedPdu { .. })
        ));
    }
}
