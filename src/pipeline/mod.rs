//! Reaction Pipeline
//!
//! Consumes observed transactions from the feed channel in arrival order and
//! spawns one reaction task per event:
//!
//! ```text
//! filter → (resolve schema ∥ price) → build → submit
//! ```
//!
//! Reaction tasks run concurrently and may finish out of order. Nonce
//! issuance is serialized inside the builder's sequencer, nothing else is.
//! A failed reaction is logged and dropped; it never stops the loop.

pub mod dedupe;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{BuildError, RejectionKind};
use crate::execution::{CandidateBuilder, SubmissionRouter};
use crate::filters::{AddressFilter, FilterDecision, RejectReason};
use crate::gas::{FeeOracle, FeeReferenceMode};
use crate::mempool::{decode_with_schema, selector_hex};
use crate::metadata::MetadataResolver;
use crate::types::{CandidateTransaction, ObservedTransaction, SubmissionResult, SubmissionStatus};

pub use dedupe::RecentHashes;

/// Tunables that are not owned by any single stage
#[derive(Debug, Clone, Copy)]
pub struct ReactionSettings {
    pub fee_reference: FeeReferenceMode,
    /// Extra attempts after a retryable rejection (stale nonce, underpriced)
    pub submission_retries: u32,
    pub dedupe_window: Duration,
}

/// What one reaction task ended with
#[derive(Debug)]
pub enum ReactionOutcome {
    Skipped(RejectReason),
    BuildFailed(BuildError),
    Submitted {
        candidate: CandidateTransaction,
        result: SubmissionResult,
        attempts: u32,
    },
}

/// Running totals, logged at shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: u64,
    pub duplicates: u64,
    pub matched: u64,
    pub sent: u64,
    pub rejected: u64,
    pub errors: u64,
    pub build_failures: u64,
    pub dry_runs: u64,
}

impl PipelineStats {
    fn record(&mut self, outcome: &ReactionOutcome) {
        match outcome {
            ReactionOutcome::Skipped(_) => {}
            ReactionOutcome::BuildFailed(_) => {
                self.matched += 1;
                self.build_failures += 1;
            }
            ReactionOutcome::Submitted { result, .. } => {
                self.matched += 1;
                match result.status {
                    SubmissionStatus::Sent => self.sent += 1,
                    SubmissionStatus::Rejected => self.rejected += 1,
                    SubmissionStatus::Error => self.errors += 1,
                    SubmissionStatus::DryRun => self.dry_runs += 1,
                }
            }
        }
    }
}

pub struct ReactionPipeline {
    filter: AddressFilter,
    resolver: MetadataResolver,
    oracle: FeeOracle,
    builder: CandidateBuilder,
    router: SubmissionRouter,
    settings: ReactionSettings,
}

impl ReactionPipeline {
    pub fn new(
        filter: AddressFilter,
        resolver: MetadataResolver,
        oracle: FeeOracle,
        builder: CandidateBuilder,
        router: SubmissionRouter,
        settings: ReactionSettings,
    ) -> Self {
        Self { filter, resolver, oracle, builder, router, settings }
    }

    /// Drain the feed channel until every sender is dropped, then wait for
    /// in-flight reactions.
    pub async fn run(self: Arc<Self>, rx: mpsc::Receiver<ObservedTransaction>) -> PipelineStats {
        let mut feed = ReceiverStream::new(rx);
        let mut stats = PipelineStats::default();
        let mut recent = RecentHashes::new(self.settings.dedupe_window);
        let mut tasks: JoinSet<ReactionOutcome> = JoinSet::new();

        info!(
            "Reaction pipeline running | recipients={} dispatch={} fee_reference={}",
            self.filter.recipient_count(),
            self.router.mode(),
            self.settings.fee_reference
        );

        loop {
            tokio::select! {
                received = feed.next() => match received {
                    Some(observed) => {
                        stats.received += 1;
                        if !recent.first_sighting(observed.hash, Instant::now()) {
                            stats.duplicates += 1;
                            debug!("Duplicate delivery of {:?}, ignored", observed.hash);
                            continue;
                        }

                        let pipeline = self.clone();
                        let span = info_span!("reaction", tx = %observed.hash);
                        tasks.spawn(async move { pipeline.react(&observed).await }.instrument(span));
                    }
                    None => break,
                },
                Some(done) = tasks.join_next(), if !tasks.is_empty() => {
                    Self::reap(&mut stats, done);
                }
            }
        }

        if !tasks.is_empty() {
            info!("Feed closed, waiting for {} in-flight reaction(s)", tasks.len());
        }
        while let Some(done) = tasks.join_next().await {
            Self::reap(&mut stats, done);
        }

        info!(
            "Pipeline stopped | received={} duplicates={} matched={} sent={} rejected={} errors={} build_failures={}",
            stats.received,
            stats.duplicates,
            stats.matched,
            stats.sent,
            stats.rejected,
            stats.errors,
            stats.build_failures
        );
        stats
    }

    fn reap(stats: &mut PipelineStats, done: Result<ReactionOutcome, tokio::task::JoinError>) {
        match done {
            Ok(outcome) => stats.record(&outcome),
            Err(e) => {
                stats.errors += 1;
                error!("Reaction task aborted: {}", e);
            }
        }
    }

    /// Run one observed transaction through every stage.
    pub async fn react(&self, observed: &ObservedTransaction) -> ReactionOutcome {
        let recipient = match self.filter.evaluate(observed) {
            FilterDecision::Match { recipient, index } => {
                info!(
                    "[filter] 🎯 Matched {:?} → {:?} (watch-list #{}) gas={} fee={}",
                    observed.hash,
                    recipient,
                    index,
                    observed.gas_limit,
                    observed.fee.reference_fee()
                );
                recipient
            }
            FilterDecision::NoMatch(reason) => {
                debug!("[filter] {:?} skipped: {:?}", observed.hash, reason);
                return ReactionOutcome::Skipped(reason);
            }
        };

        // Schema lookup is diagnostic only and never holds up pricing
        let (schema, reference) =
            tokio::join!(self.resolver.resolve_within(recipient), self.reference_fee(observed));

        match schema.as_deref().and_then(|abi| decode_with_schema(abi, &observed.input)) {
            Some(call) => info!("[metadata] {:?}: {}", observed.hash, call.summary()),
            None => info!(
                "[metadata] {:?}: selector {} ({} bytes, undecoded)",
                observed.hash,
                selector_hex(&observed.input),
                observed.input.len()
            ),
        }

        let mut reference = match reference {
            Ok(wei) => wei,
            Err(e) => {
                error!("[fee] {:?}: {}", observed.hash, e);
                return ReactionOutcome::BuildFailed(e);
            }
        };

        let mut attempts = 0u32;
        loop {
            attempts += 1;

            let candidate = match self.builder.build(observed, reference).await {
                Ok(candidate) => candidate,
                Err(e) => {
                    error!("[build] {:?}: {}", observed.hash, e);
                    return ReactionOutcome::BuildFailed(e);
                }
            };

            let result = self.router.submit(&candidate).await;

            match result.status {
                SubmissionStatus::Sent => {}
                // A dispatch that failed in transit may still have landed; if it
                // did, the node's pending count moves past the nonce anyway
                SubmissionStatus::Error | SubmissionStatus::DryRun => {
                    self.builder.sequencer().release(candidate.nonce).await
                }
                SubmissionStatus::Rejected => {
                    self.builder.sequencer().release(candidate.nonce).await;

                    let kind = RejectionKind::classify(result.error.as_deref().unwrap_or_default());
                    if kind.is_retryable() && attempts <= self.settings.submission_retries {
                        warn!(
                            "[submit] {:?} rejected ({:?}), rebuilding (attempt {}/{})",
                            observed.hash,
                            kind,
                            attempts + 1,
                            self.settings.submission_retries + 1
                        );
                        reference = match self.reference_fee(observed).await {
                            Ok(wei) => wei,
                            Err(e) => {
                                error!("[fee] {:?}: {}", observed.hash, e);
                                return ReactionOutcome::Submitted { candidate, result, attempts };
                            }
                        };
                        continue;
                    }
                }
            }

            return ReactionOutcome::Submitted { candidate, result, attempts };
        }
    }

    /// Fee the premium is added to, per the configured reference mode
    async fn reference_fee(&self, observed: &ObservedTransaction) -> Result<u128, BuildError> {
        let observed_fee = observed.fee.reference_fee();
        let mode = self.settings.fee_reference;

        if !mode.needs_oracle() {
            return Ok(observed_fee);
        }

        match self.oracle.quote().await {
            Ok(quote) => {
                let reference = mode.select(Some(quote.wei), observed_fee);
                debug!(
                    "[fee] {:?}: quote {} ({}), observed {}, reference {}",
                    observed.hash, quote.wei, quote.source, observed_fee, reference
                );
                Ok(reference)
            }
            Err(e) if mode == FeeReferenceMode::Highest => {
                warn!("[fee] {:?}: {}, using observed fee", observed.hash, e);
                Ok(observed_fee)
            }
            Err(e) => Err(e),
        }
    }
}
