//! Out-of-band control payload codec
//!
//! Encodes and decodes the payloads carried in [`OutOfBandPacket`]s:
//!
//! ```text
//! Buffer status report:  count:u8 { lcid:u8 bytes:u32 }*count
//! Uplink grant:          grant_size:u32
//! Scheduling request:    (empty)
//! ```
//!
//! All multi-byte fields are big-endian.
//!
//! [`OutOfBandPacket`]: crate::protocol::OutOfBandPacket

use bytes::{Buf, BufMut, Bytes, BytesMut};
use isacsim_common::Lcid;
use thiserror::Error;

use crate::protocol::OutOfBandType;

/// Size of one buffer status entry
const BSR_ENTRY_SIZE: usize = 5;

/// Errors that can occur during control payload decoding
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Payload is shorter than its fields require
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort {
        /// Bytes needed
        needed: usize,
        /// Bytes available
        available: usize,
    },
    /// A buffer status report lists more entries than fit in one octet
    #[error("too many buffer status entries: {0}")]
    TooManyEntries(usize),
    /// Bytes left over after the last field
    #[error("{0} trailing bytes after control payload")]
    TrailingBytes(usize),
}

/// Decoded out-of-band control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Per-logical-channel uplink buffer occupancy in bytes
    BufferStatusReport {
        /// `(lcid, bytes)` entries
        entries: Vec<(Lcid, u32)>,
    },
    /// Bytes the UE may transmit in the next uplink slot
    UplinkGrant {
        /// Grant size in bytes
        grant_size: u32,
    },
    /// Request for uplink resources
    SchedulingRequest,
}

impl ControlMessage {
    /// Out-of-band packet type that carries this message
    pub fn packet_type(&self) -> OutOfBandType {
        match self {
            Self::BufferStatusReport { .. } => OutOfBandType::BufferStatusReport,
            Self::UplinkGrant { .. } => OutOfBandType::UplinkGrant,
            Self::SchedulingRequest => OutOfBandType::SchedulingRequest,
        }
    }

    /// Encodes the message payload
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        match self {
            Self::BufferStatusReport { entries } => {
                let count = u8::try_from(entries.len())
                    .map_err(|_| CodecError::TooManyEntries(entries.len()))?;
                let mut buf = BytesMut::with_capacity(1 + entries.len() * BSR_ENTRY_SIZE);
                buf.put_u8(count);
                for &(lcid, bytes) in entries {
                    buf.put_u8(lcid);
                    buf.put_u32(bytes);
                }
                Ok(buf.freeze())
            }
            Self::UplinkGrant { grant_size } => {
                let mut buf = BytesMut::with_capacity(4);
                buf.put_u32(*grant_size);
                Ok(buf.freeze())
            }
            Self::SchedulingRequest => Ok(Bytes::new()),
        }
    }

    /// Decodes a payload of the given packet type
    pub fn decode(packet_type: OutOfBandType, payload: &[u8]) -> Result<Self, CodecError> {
        let mut buf = payload;
        let message = match packet_type {
            OutOfBandType::BufferStatusReport => {
                ensure_remaining(&buf, 1)?;
                let count = buf.get_u8() as usize;
                ensure_remaining(&buf, count * BSR_ENTRY_SIZE)?;
                let entries = (0..count)
                    .map(|_| {
                        let lcid = buf.get_u8();
                        let bytes = buf.get_u32();
                        (lcid, bytes)
                    })
                    .collect();
                Self::BufferStatusReport { entries }
            }
            OutOfBandType::UplinkGrant => {
                ensure_remaining(&buf, 4)?;
                Self::UplinkGrant {
                    grant_size: buf.get_u32(),
                }
            }
            OutOfBandType::SchedulingRequest => Self::SchedulingRequest,
        };

        if buf.has_remaining() {
            return Err(CodecError::TrailingBytes(buf.remaining()));
        }
        Ok(message)
    }
}

fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<(), CodecError> {
    if buf.remaining() < needed {
        return Err(CodecError::BufferTooShort {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}
