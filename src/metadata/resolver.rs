//! Metadata Resolver
//!
//! Resolves a contract address to its call-interface schema: in-memory cache,
//! then each configured source in order (local dir, then Etherscan).
//!
//! Design:
//!     - One OnceCell per address in a DashMap. Concurrent callers for the same
//!       address await the first caller's in-flight lookup instead of issuing
//!       their own (write-once-per-key, read-through)
//!     - Successful resolutions are kept for the process lifetime; failures are
//!       not cached, the next caller tries again
//!     - `resolve_within` bounds the wait; the lookup itself keeps running in a
//!       detached task so a slow response still warms the cache

use alloy::json_abi::JsonAbi;
use alloy::primitives::Address;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::ExternalServiceError;

use super::sources::SchemaSource;

/// Schema usable for decoding calldata; shared, never mutated
pub type ResolvedSchema = Arc<JsonAbi>;

#[derive(Clone)]
pub struct MetadataResolver {
    inner: Arc<Inner>,
}

struct Inner {
    sources: Vec<Arc<dyn SchemaSource>>,
    entries: DashMap<Address, Arc<OnceCell<ResolvedSchema>>>,
    timeout: Duration,
}

impl MetadataResolver {
    /// `sources` are tried in order on a cache miss.
    pub fn new(sources: Vec<Arc<dyn SchemaSource>>, timeout: Duration) -> Self {
        Self { inner: Arc::new(Inner { sources, entries: DashMap::new(), timeout }) }
    }

    /// Resolve a schema, or None if no source has it. Never fails the caller.
    pub async fn resolve(&self, address: Address) -> Option<ResolvedSchema> {
        // Clone the cell out so the map shard lock is not held across .await
        let cell = self
            .inner
            .entries
            .entry(address)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        if let Some(schema) = cell.get() {
            return Some(schema.clone());
        }

        match cell.get_or_try_init(|| self.lookup(address)).await {
            Ok(schema) => Some(schema.clone()),
            Err(e) => {
                debug!("Schema for {:?} unavailable: {}", address, e);
                None
            }
        }
    }

    /// `resolve` bounded by the configured timeout; on timeout, None.
    pub async fn resolve_within(&self, address: Address) -> Option<ResolvedSchema> {
        if let Some(schema) = self.cached(address) {
            return Some(schema);
        }

        let this = self.clone();
        let lookup = tokio::spawn(async move { this.resolve(address).await });

        match tokio::time::timeout(self.inner.timeout, lookup).await {
            Ok(Ok(schema)) => schema,
            Ok(Err(e)) => {
                warn!("Schema lookup task for {:?} failed: {}", address, e);
                None
            }
            Err(_) => {
                debug!(
                    "Schema lookup for {:?} exceeded {}ms, continuing without it",
                    address,
                    self.inner.timeout.as_millis()
                );
                None
            }
        }
    }

    /// Cached schema without triggering a lookup
    pub fn cached(&self, address: Address) -> Option<ResolvedSchema> {
        self.inner.entries.get(&address).and_then(|cell| cell.get().cloned())
    }

    /// Resolve every address concurrently (startup warm-up). Returns how many resolved.
    pub async fn prefetch(&self, addresses: &[Address]) -> usize {
        let results = join_all(addresses.iter().map(|a| self.resolve(*a))).await;
        let resolved = results.iter().filter(|r| r.is_some()).count();
        info!("Schema prefetch: {}/{} contracts resolved", resolved, addresses.len());
        for (addr, result) in addresses.iter().zip(results.iter()) {
            if result.is_none() {
                warn!("  No schema for {:?}; calldata will be logged undecoded", addr);
            }
        }
        resolved
    }

    async fn lookup(&self, address: Address) -> Result<ResolvedSchema, ExternalServiceError> {
        let mut last_err = ExternalServiceError::NoResult("no schema sources configured".to_string());

        for source in &self.inner.sources {
            match source.fetch(address).await {
                Ok(abi) => {
                    debug!("Schema for {:?} resolved via {}", address, source.name());
                    return Ok(Arc::new(abi));
                }
                Err(e) => {
                    debug!("Schema source {} missed {:?}: {}", source.name(), address, e);
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }
}
