//! Segmentation, reassembly and sequence number helpers shared by AM and UM

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};

/// Size of the segment offset field
pub(crate) const SO_LEN: usize = 2;

/// Segmentation information field (TS 38.322 6.2.3.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentInfo {
    /// Complete SDU
    Complete = 0,
    /// First segment
    First = 1,
    /// Last segment
    Last = 2,
    /// Neither first nor last
    Middle = 3,
}

impl SegmentInfo {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Complete,
            1 => Self::First,
            2 => Self::Last,
            _ => Self::Middle,
        }
    }

    /// SI of the segment covering `offset..end` of a `total` byte SDU
    pub(crate) fn for_range(offset: usize, end: usize, total: usize) -> Self {
        match (offset == 0, end >= total) {
            (true, true) => Self::Complete,
            (true, false) => Self::First,
            (false, true) => Self::Last,
            (false, false) => Self::Middle,
        }
    }

    /// Last and middle segments carry a segment offset
    pub(crate) fn has_offset(self) -> bool {
        matches!(self, Self::Last | Self::Middle)
    }

    pub(crate) fn is_last(self) -> bool {
        matches!(self, Self::Complete | Self::Last)
    }
}

/// Maps a received `bits`-wide sequence number onto the unbounded count
/// closest to `reference`.
pub(crate) fn unwrap_sn(reference: u64, sn: u32, bits: u8) -> u64 {
    let modulus = 1u64 << bits;
    let half = modulus / 2;
    let mut candidate = (reference & !(modulus - 1)) | u64::from(sn);
    if candidate + half < reference {
        candidate += modulus;
    } else if candidate >= reference + half && candidate >= modulus {
        candidate -= modulus;
    }
    candidate
}

/// Wire value of an unbounded sequence count
pub(crate) fn wrap_sn(count: u64, bits: u8) -> u32 {
    (count & ((1u64 << bits) - 1)) as u32
}

/// SDU being cut into PDUs across grants
#[derive(Debug, Clone)]
pub(crate) struct Segmenter {
    pub(crate) sn: u64,
    pub(crate) sdu: Bytes,
    pub(crate) offset: usize,
    pub(crate) is_retx: bool,
}

impl Segmenter {
    pub(crate) fn new(sn: u64, sdu: Bytes, is_retx: bool) -> Self {
        Self {
            sn,
            sdu,
            offset: 0,
            is_retx,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.sdu.len() - self.offset
    }

    pub(crate) fn is_done(&self) -> bool {
        self.offset >= self.sdu.len()
    }

    /// Header bytes the next segment needs on top of `base_header`
    pub(crate) fn header_len(&self, base_header: usize) -> usize {
        if self.offset > 0 {
            base_header + SO_LEN
        } else {
            base_header
        }
    }

    /// Takes up to `max_payload` bytes. Returns the SI, offset and data.
    pub(crate) fn take(&mut self, max_payload: usize) -> (SegmentInfo, usize, Bytes) {
        let offset = self.offset;
        let end = (offset + max_payload).min(self.sdu.len());
        let si = SegmentInfo::for_range(offset, end, self.sdu.len());
        self.offset = end;
        (si, offset, self.sdu.slice(offset..end))
    }
}

/// Segments of one SDU received so far
#[derive(Debug, Default)]
pub(crate) struct Reassembly {
    segments: BTreeMap<usize, Bytes>,
    total: Option<usize>,
}

impl Reassembly {
    /// Stores a segment. Returns false if an identical segment was already held.
    pub(crate) fn insert(&mut self, offset: usize, data: Bytes, is_last: bool) -> bool {
        if is_last {
            self.total = Some(offset + data.len());
        }
        match self.segments.get(&offset) {
            Some(existing) if existing.len() >= data.len() => false,
            _ => {
                self.segments.insert(offset, data);
                true
            }
        }
    }

    /// Returns true if a segment starting at `offset` with `len` bytes is
    /// already covered by stored segments
    pub(crate) fn covers(&self, offset: usize, len: usize) -> bool {
        self.segments
            .range(..=offset)
            .next_back()
            .map(|(&start, data)| start + data.len() >= offset + len)
            .unwrap_or(false)
    }

    pub(crate) fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Payload bytes held
    pub(crate) fn bytes(&self) -> usize {
        self.segments.values().map(Bytes::len).sum()
    }

    pub(crate) fn is_complete(&self) -> bool {
        let Some(total) = self.total else {
            return false;
        };
        let mut covered = 0;
        for (&offset, data) in &self.segments {
            if offset > covered {
                return false;
            }
            covered = covered.max(offset + data.len());
        }
        covered >= total
    }

    /// Joins the segments; only meaningful once complete
    pub(crate) fn assemble(self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.total.unwrap_or(0));
        for (offset, data) in self.segments {
            let covered = out.len();
            if offset + data.len() > covered {
                out.extend_from_slice(&data[covered - offset..]);
            }
        }
        out.freeze()
    }
}
