//! Contract metadata
//!
//! Best-effort resolution of contract call-interface schemas, used only to
//! decode observed calldata for the logs.

pub mod resolver;
pub mod sources;

pub use resolver::{MetadataResolver, ResolvedSchema};
pub use sources::{EtherscanClient, LocalAbiDir, SchemaSource};
