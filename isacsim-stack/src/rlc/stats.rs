//! Per-entity RLC counters

use isacsim_common::{Lcid, Rnti};

/// Number of columns in a statistics row (RNTI, LCID and the counters)
pub const RLC_STATS_COLUMNS: usize = 21;

/// Counters kept by every RLC entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RlcStatistics {
    /// New data PDUs transmitted
    pub tx_data_pdu: u64,
    /// New data PDU bytes transmitted
    pub tx_data_bytes: u64,
    /// Data PDUs retransmitted
    pub retx_data_pdu: u64,
    /// Data PDU bytes retransmitted
    pub retx_data_bytes: u64,
    /// Status PDUs transmitted
    pub tx_control_pdu: u64,
    /// Status PDU bytes transmitted
    pub tx_control_bytes: u64,
    /// SDUs dropped because the transmit buffer was full
    pub tx_packets_dropped: u64,
    /// Bytes of dropped SDUs
    pub tx_bytes_dropped: u64,
    /// t-PollRetransmit expiries
    pub timer_poll_retransmit_timed_out: u64,
    /// Data PDUs received
    pub rx_data_pdu: u64,
    /// Data PDU bytes received
    pub rx_data_bytes: u64,
    /// Received data PDUs discarded
    pub rx_data_pdu_dropped: u64,
    /// Bytes of discarded data PDUs
    pub rx_data_bytes_dropped: u64,
    /// Duplicate data PDUs received
    pub rx_data_pdu_duplicate: u64,
    /// Bytes of duplicate data PDUs
    pub rx_data_bytes_duplicate: u64,
    /// Status PDUs received
    pub rx_control_pdu: u64,
    /// Status PDU bytes received
    pub rx_control_bytes: u64,
    /// t-Reassembly expiries
    pub timer_reassembly_timed_out: u64,
    /// t-StatusProhibit expiries
    pub timer_status_prohibit_timed_out: u64,
}

/// Statistics of one logical channel tagged with its identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RlcStatsRow {
    /// Peer RNTI
    pub rnti: Rnti,
    /// Logical channel
    pub lcid: Lcid,
    /// Counters
    pub stats: RlcStatistics,
}

impl RlcStatsRow {
    /// Column names, in the order of [`RlcStatsRow::values`]
    pub const COLUMNS: [&'static str; RLC_STATS_COLUMNS] = [
        "RNTI",
        "LCID",
        "TxDataPDU",
        "TxDataBytes",
        "ReTxDataPDU",
        "ReTxDataBytes",
        "TxControlPDU",
        "TxControlBytes",
        "TxPacketsDropped",
        "TxBytesDropped",
        "TimerPollRetransmitTimedOut",
        "RxDataPDU",
        "RxDataBytes",
        "RxDataPDUDropped",
        "RxDataBytesDropped",
        "RxDataPDUDuplicate",
        "RxDataBytesDuplicate",
        "RxControlPDU",
        "RxControlBytes",
        "TimerReassemblyTimedOut",
        "TimerStatusProhibitTimedOut",
    ];

    /// Flattens the row into its numeric columns
    pub fn values(&self) -> [u64; RLC_STATS_COLUMNS] {
        let s = &self.stats;
        [
            u64::from(self.rnti),
            u64::from(self.lcid),
            s.tx_data_pdu,
            s.tx_data_bytes,
            s.retx_data_pdu,
            s.retx_data_bytes,
            s.tx_control_pdu,
            s.tx_control_bytes,
            s.tx_packets_dropped,
            s.tx_bytes_dropped,
            s.timer_poll_retransmit_timed_out,
            s.rx_data_pdu,
            s.rx_data_bytes,
            s.rx_data_pdu_dropped,
            s.rx_data_bytes_dropped,
            s.rx_data_pdu_duplicate,
            s.rx_data_bytes_duplicate,
            s.rx_control_pdu,
            s.rx_control_bytes,
            s.timer_reassembly_timed_out,
            s.timer_status_prohibit_timed_out,
        ]
    }
}
