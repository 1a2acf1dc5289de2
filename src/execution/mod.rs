//! Candidate construction and dispatch
//!
//! nonce    - single-flight sequence numbers for the bot's address
//! builder  - observed transaction → candidate
//! relay    - private relay client (Flashbots protocol)
//! router   - sign + dispatch down the network's path
//! receipts - detached inclusion tracking

pub mod builder;
pub mod nonce;
pub mod receipts;
pub mod relay;
pub mod router;

pub use builder::{fee_bid, CandidateBuilder};
pub use nonce::NonceSequencer;
pub use receipts::{ReceiptOutcome, ReceiptWatcher};
pub use relay::{FlashbotsRelay, PrivateRelay, RelayStatus};
pub use router::{DispatchMode, SignedCandidate, SubmissionRouter};
