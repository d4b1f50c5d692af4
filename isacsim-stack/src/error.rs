//! Error types for the node kernel

use isacsim_common::{ConfigValidationError, Lcid, NodeId, Rnti};
use isacsim_hub::{CodecError, HubError};
use thiserror::Error;

use crate::rlc::MAX_SDU_SIZE;

/// Errors raised by RLC entities and by RLC access from the MAC
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RlcError {
    /// No entity is configured for the channel
    #[error("no RLC entity for RNTI {rnti}, LCID {lcid}")]
    EntityNotPresent {
        /// Peer RNTI
        rnti: Rnti,
        /// Logical channel
        lcid: Lcid,
    },
    /// SDU offered to a receive-only entity
    #[error("RLC entity RNTI {rnti}, LCID {lcid} is receive-only")]
    NotTransmitting {
        /// Peer RNTI
        rnti: Rnti,
        /// Logical channel
        lcid: Lcid,
    },
    /// PDU offered to a transmit-only entity
    #[error("RLC entity RNTI {rnti}, LCID {lcid} is transmit-only")]
    NotReceiving {
        /// Peer RNTI
        rnti: Rnti,
        /// Logical channel
        lcid: Lcid,
    },
    /// SDU longer than an entity accepts
    #[error("SDU of {len} bytes on RNTI {rnti}, LCID {lcid} exceeds {max} bytes", max = MAX_SDU_SIZE)]
    SduTooLarge {
        /// Peer RNTI
        rnti: Rnti,
        /// Logical channel
        lcid: Lcid,
        /// Offered SDU length
        len: usize,
    },
    /// PDU could not be parsed
    #[error("malformed RLC PDU on RNTI {rnti}, LCID {lcid}: {reason}")]
    MalformedPdu {
        /// Peer RNTI
        rnti: Rnti,
        /// Logical channel
        lcid: Lcid,
        /// What was wrong
        reason: String,
    },
}

/// Errors raised by MAC and PHY collaborators
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayerError {
    /// A wiring step has not been performed
    #[error("{layer} used before {missing} was set")]
    NotWired {
        /// Layer reporting the error
        layer: &'static str,
        /// Missing piece of wiring
        missing: &'static str,
    },
    /// RLC access failed
    #[error("RLC access failed: {0}")]
    Rlc(#[from] RlcError),
    /// Control payload could not be encoded or decoded
    #[error("control payload error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors raised by node operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    /// Every logical channel column of the row is occupied
    #[error("too many logical channels for RNTI {rnti}: limit is {max}")]
    TooManyLogicalChannels {
        /// Peer RNTI of the full row
        rnti: Rnti,
        /// Configured per-row limit
        max: usize,
    },
    /// The LCID is already configured in the row
    #[error("logical channel {lcid} already configured for RNTI {rnti}")]
    DuplicateLogicalChannel {
        /// Peer RNTI
        rnti: Rnti,
        /// Duplicate logical channel
        lcid: Lcid,
    },
    /// No entity is configured for the channel
    #[error("RLC entity not present for RNTI {rnti}, LCID {lcid}")]
    RlcEntityNotPresent {
        /// Peer RNTI
        rnti: Rnti,
        /// Logical channel
        lcid: Lcid,
    },
    /// The RNTI has no row in the logical channel table
    #[error("unknown peer RNTI {rnti}: node serves {rows} peers")]
    UnknownPeer {
        /// Offending RNTI
        rnti: Rnti,
        /// Number of rows in the table
        rows: usize,
    },
    /// The application layer is full
    #[error("too many applications: limit is {max}")]
    TooManyApplications {
        /// Configured limit
        max: usize,
    },
    /// The node has not been wired to the hub
    #[error("PHY interface not set on node {node_id}")]
    PhyInterfaceNotSet {
        /// Node identifier
        node_id: NodeId,
    },
    /// The PHY has no carrier yet
    #[error("carrier not configured on node {node_id}")]
    CarrierNotConfigured {
        /// Node identifier
        node_id: NodeId,
    },
    /// RLC entity error
    #[error(transparent)]
    Rlc(#[from] RlcError),
    /// MAC or PHY error
    #[error(transparent)]
    Layer(#[from] LayerError),
    /// Hub registration error
    #[error(transparent)]
    Hub(#[from] HubError),
    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigValidationError),
}

/// Errors raised by the network driver
#[derive(Debug, Error)]
pub enum NetworkError {
    /// A node operation failed
    #[error("node {node_id}: {source}")]
    Node {
        /// Node that failed
        node_id: NodeId,
        /// Underlying error
        #[source]
        source: NodeError,
    },
    /// A parallel simulation worker did not complete
    #[error("simulation worker failed: {0}")]
    Worker(String),
}
