//! isacsim-ue - terminal node
//!
//! A [`UeNode`] wraps the node kernel with the terminal's construction rules:
//! a single logical channel row, an RNTI assigned by the serving cell, a
//! line-of-sight flag, and a downlink receive path registered with the hub
//! under that RNTI.

pub mod node;

pub use node::UeNode;
