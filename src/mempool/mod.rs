//! Mempool Feed Module
//!
//! Purpose:
//!     Deliver pending transactions of the watched account to the reaction
//!     pipeline, validated and in arrival order.
//!
//! Architecture:
//!     types.rs    — wire payload → ObservedTransaction, ReconnectPolicy
//!     decoder.rs  — calldata decoding against a resolved contract schema
//!     monitor.rs  — WS subscription loop with bounded reconnect backoff
//!
//! Usage:
//!     Spawned from main.rs; feeds a bounded mpsc channel drained by
//!     pipeline::Pipeline::run.

pub mod decoder;
pub mod monitor;
pub mod types;

pub use decoder::{decode_with_schema, selector_hex, DecodedCall};
pub use monitor::FeedSubscriber;
pub use types::ReconnectPolicy;
