//! Polls
//!
//! Durable poll metadata and vote decryption.

pub mod decrypt;
pub mod store;

pub use decrypt::{
    match_options, option_hash, AadCandidate, PollMetadata, PollVoteDecryptor, ResolvedVote,
    UndecryptableReason, VoteOutcome, VoteSource, AAD_CANDIDATES,
};
pub use store::{PollRecord, PollStore, PollStoreError, POLL_STORE_FILE};
