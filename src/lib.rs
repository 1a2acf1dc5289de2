//! Mempool front-running bot
//!
//! Watches pending transactions sent by one account and, for each one that
//! targets a watched recipient, builds and dispatches a competing transaction
//! with a higher fee bid.
//!
//! Modules:
//!     mempool   - pending-transaction feed, payload validation, calldata decoding
//!     filters   - recipient watch-list
//!     metadata  - contract schema resolution (local files, Etherscan)
//!     gas       - fee oracle (gas tracker, node fallback)
//!     execution - nonce sequencing, candidate building, signing, dispatch
//!     pipeline  - per-event reaction tasks tying the stages together

pub mod chain;
pub mod config;
pub mod error;
pub mod execution;
pub mod filters;
pub mod gas;
pub mod mempool;
pub mod metadata;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use config::{load_config_from_file, BotConfig, CliOverrides, WatchConfig};
pub use error::{BuildError, ConfigError, ExternalServiceError, FeedError, SubmissionError};
pub use pipeline::{PipelineStats, ReactionOutcome, ReactionPipeline};
pub use types::{CandidateTransaction, Network, ObservedTransaction, SubmissionResult, SubmissionStatus};
