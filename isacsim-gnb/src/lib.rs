//! isacsim-gnb - base station node
//!
//! A [`GnbNode`] wraps the node kernel with the base station's construction
//! rules: one logical channel row per served UE, application capacity scaled
//! by the UE count, and an uplink receive path registered with the hub.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use isacsim_common::{CarrierConfig, GnbConfig, NodeLimits, Position, SubcarrierSpacing};
//! use isacsim_gnb::GnbNode;
//! use isacsim_hub::DistributionHub;
//!
//! let hub = Arc::new(DistributionHub::with_capacity(64));
//! let config = GnbConfig::new(1, Position::new(0.0, 0.0, 25.0), 4, 1);
//! let mut gnb = GnbNode::with_reference_stack(config, NodeLimits::default())?;
//! gnb.configure_phy(CarrierConfig::tdd(3.5e9, 52, SubcarrierSpacing::Khz30))?;
//! gnb.set_phy_interface(hub)?;
//! ```

pub mod node;

pub use node::GnbNode;
