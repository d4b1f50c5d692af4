//! Distribution hub for isacsim
//!
//! Emulates the broadcast wireless medium between simulated nodes: in-band
//! packets are delivered by carrier frequency, out-of-band control packets by
//! cell. See [`DistributionHub`].

pub mod codec;
pub mod hub;
pub mod protocol;
pub mod sink;

pub use codec::{CodecError, ControlMessage};
pub use hub::{DistributionHub, HubError, ReceiverInfo};
pub use protocol::{InBandPacket, OctetPacket, OutOfBandPacket, OutOfBandType, WaveformPacket};
pub use sink::{InBandSink, OutOfBandSink, PacketInbox, PacketQueue};
