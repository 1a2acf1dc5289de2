//! Transaction filtering
//!
//! Watch-list matching of observed transactions against the configured
//! recipient addresses.

pub mod watchlist;

pub use watchlist::{AddressFilter, FilterDecision, RejectReason};
