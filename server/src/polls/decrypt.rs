//! Poll Vote Decryption
//!
//! Recovers the options selected in an encrypted poll vote.
//!
//! The protocol client's own decryption is tried first. It fails for polls
//! whose session state did not survive a restart, in which case the vote is
//! decrypted manually from the poll secret kept in the [`PollStore`]:
//!
//! 1. key = HKDF-SHA256(secret, info = `"WhatsApp Poll Encryption"`), 32 bytes
//! 2. AES-256-GCM open with the vote IV, trying each [`AadCandidate`] in order
//! 3. plaintext = concatenated 32-byte SHA-256 hashes of the selected options
//!
//! Failure is reported as [`VoteOutcome::Undecryptable`], never as an error.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::store::{PollRecord, PollStore};
use crate::protocol::{
    ChatStorage, MessageEvent, PollUpdateMessage, ProtocolClient, StoredMessage,
};

/// HKDF info label for poll vote keys.
pub const POLL_ENCRYPTION_LABEL: &[u8] = b"WhatsApp Poll Encryption";

/// Size of one selected-option hash in the vote plaintext.
pub const OPTION_HASH_LEN: usize = 32;

const GCM_NONCE_LEN: usize = 12;

pub type OptionHash = [u8; OPTION_HASH_LEN];

/// Additional-authenticated-data constructions for the manual fallback.
///
/// The encoder's real AAD is not documented anywhere observable; these are
/// unverified guesses. All five are kept, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AadCandidate {
    PollMessageId,
    VoterId,
    VoteMessageId,
    PollMessageIdAndVoterId,
    Empty,
}

/// Fallback AAD search order.
pub const AAD_CANDIDATES: [AadCandidate; 5] = [
    AadCandidate::PollMessageId,
    AadCandidate::VoterId,
    AadCandidate::VoteMessageId,
    AadCandidate::PollMessageIdAndVoterId,
    AadCandidate::Empty,
];

/// Inputs the AAD candidates are built from.
#[derive(Debug, Clone, Copy)]
pub struct AadContext<'a> {
    pub poll_message_id: &'a str,
    pub voter: &'a str,
    pub vote_message_id: &'a str,
}

impl AadCandidate {
    pub fn build(self, ctx: &AadContext<'_>) -> Vec<u8> {
        match self {
            Self::PollMessageId => ctx.poll_message_id.as_bytes().to_vec(),
            Self::VoterId => ctx.voter.as_bytes().to_vec(),
            Self::VoteMessageId => ctx.vote_message_id.as_bytes().to_vec(),
            Self::PollMessageIdAndVoterId => {
                [ctx.poll_message_id.as_bytes(), ctx.voter.as_bytes()].concat()
            }
            Self::Empty => Vec::new(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PollMessageId => "poll_message_id",
            Self::VoterId => "voter_id",
            Self::VoteMessageId => "vote_message_id",
            Self::PollMessageIdAndVoterId => "poll_message_id_and_voter_id",
            Self::Empty => "empty",
        }
    }
}

/// Where a successful decryption came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum VoteSource {
    Library,
    Fallback { aad: AadCandidate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UndecryptableReason {
    /// No poll secret in the poll store or chat storage.
    MissingSecret,
    /// IV or ciphertext of the wrong shape.
    MalformedVote,
    /// No AAD candidate authenticated.
    AuthenticationFailed,
    KeyDerivation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Decrypted {
        hashes: Vec<OptionHash>,
        source: VoteSource,
    },
    Undecryptable(UndecryptableReason),
}

/// Question and options of the poll a vote refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollMetadata {
    pub question: String,
    pub options: Vec<String>,
}

/// A decrypted vote matched against its poll.
#[derive(Debug, Clone)]
pub struct ResolvedVote {
    pub outcome: VoteOutcome,
    pub metadata: Option<PollMetadata>,
    /// Option strings whose hash matched, in vote order.
    pub selected: Vec<String>,
}

/// Decrypts poll votes.
#[derive(Clone)]
pub struct PollVoteDecryptor {
    client: Arc<dyn ProtocolClient>,
    polls: Arc<PollStore>,
    storage: Arc<dyn ChatStorage>,
}

impl PollVoteDecryptor {
    pub fn new(
        client: Arc<dyn ProtocolClient>,
        polls: Arc<PollStore>,
        storage: Arc<dyn ChatStorage>,
    ) -> Self {
        Self {
            client,
            polls,
            storage,
        }
    }

    /// Decrypt the vote and match it against the poll's options.
    ///
    /// The poll store and chat storage are each read at most once; chat
    /// storage only when the store cannot supply what the vote needs.
    pub async fn resolve(&self, event: &MessageEvent, update: &PollUpdateMessage) -> ResolvedVote {
        let poll_id = update.poll_creation_message_key.id.as_str();
        let record = self.polls.get(poll_id).await;
        let library = self.library_decrypt(event, poll_id).await;

        let keyless = record.as_ref().is_none_or(|r| r.enc_key.is_empty());
        let stored = if record.is_none() || (library.is_none() && keyless) {
            self.stored_poll(poll_id).await
        } else {
            None
        };

        let outcome = match library {
            Some(outcome) => outcome,
            None => {
                let secret = poll_secret(poll_id, record.as_ref(), stored.as_ref());
                fallback_decrypt(event, update, secret)
            }
        };
        let metadata = poll_metadata(record, stored);

        let selected = match (&outcome, &metadata) {
            (VoteOutcome::Decrypted { hashes, .. }, Some(meta)) => {
                let matched = match_options(hashes, &meta.options);
                if matched.is_empty() {
                    warn!(poll_id, "Decrypted poll vote matched no stored option");
                } else {
                    info!(poll_id, selected = ?matched, "Matched poll vote");
                }
                matched
            }
            _ => Vec::new(),
        };

        ResolvedVote {
            outcome,
            metadata,
            selected,
        }
    }

    /// Protocol client decryption. `None` means the fallback must run.
    async fn library_decrypt(&self, event: &MessageEvent, poll_id: &str) -> Option<VoteOutcome> {
        match self.client.decrypt_poll_vote(event).await {
            Ok(raw) if !raw.is_empty() => {
                let hashes: Vec<OptionHash> = raw
                    .into_iter()
                    .filter_map(|h| OptionHash::try_from(h.as_slice()).ok())
                    .collect();
                if !hashes.is_empty() {
                    debug!(poll_id, "Poll vote decrypted by protocol client");
                    return Some(VoteOutcome::Decrypted {
                        hashes,
                        source: VoteSource::Library,
                    });
                }
                debug!(poll_id, "Protocol client returned malformed option hashes, using fallback");
            }
            Ok(_) => debug!(poll_id, "Protocol client returned no options, using fallback"),
            Err(e) => {
                debug!(poll_id, error = %e, "Protocol client poll decryption failed, using fallback");
            }
        }
        None
    }

    async fn stored_poll(&self, poll_id: &str) -> Option<StoredMessage> {
        match self.storage.get_message_by_id(poll_id).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(poll_id, error = %e, "Failed to look up poll message in chat storage");
                None
            }
        }
    }
}

/// Manual decryption from the poll secret.
fn fallback_decrypt(
    event: &MessageEvent,
    update: &PollUpdateMessage,
    secret: Option<Vec<u8>>,
) -> VoteOutcome {
    let poll_id = update.poll_creation_message_key.id.as_str();
    let Some(secret) = secret else {
        warn!(poll_id, "No poll secret available, vote is undecryptable");
        return VoteOutcome::Undecryptable(UndecryptableReason::MissingSecret);
    };

    let voter = event.info.sender.to_string();
    let ctx = AadContext {
        poll_message_id: poll_id,
        voter: &voter,
        vote_message_id: &event.info.id,
    };

    let outcome = decrypt_with_secret(&secret, &update.vote.enc_iv, &update.vote.enc_payload, &ctx);
    match &outcome {
        VoteOutcome::Decrypted { hashes, source } => {
            info!(poll_id, options = hashes.len(), source = ?source, "Poll vote decrypted by fallback");
        }
        VoteOutcome::Undecryptable(reason) => {
            warn!(poll_id, reason = ?reason, "Poll vote fallback decryption failed");
        }
    }
    outcome
}

/// Poll secret from the poll store record, then from the stored message.
fn poll_secret(
    poll_id: &str,
    record: Option<&PollRecord>,
    stored: Option<&StoredMessage>,
) -> Option<Vec<u8>> {
    if let Some(record) = record.filter(|r| !r.enc_key.is_empty()) {
        return Some(record.enc_key.clone());
    }

    let secret = stored?.poll_secret.as_deref().filter(|s| !s.is_empty())?;
    match hex::decode(secret) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(poll_id, error = %e, "Stored poll secret is not valid hex");
            None
        }
    }
}

/// Question and options from the poll store record, then from a stored poll message.
fn poll_metadata(record: Option<PollRecord>, stored: Option<StoredMessage>) -> Option<PollMetadata> {
    if let Some(record) = record {
        return Some(PollMetadata {
            question: record.question,
            options: record.options,
        });
    }

    stored.filter(StoredMessage::is_poll).map(|stored| PollMetadata {
        question: stored.poll_title.unwrap_or_default(),
        options: stored.poll_options,
    })
}

/// Derive the vote decryption key from a poll secret.
pub fn derive_vote_key(secret: &[u8]) -> Option<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(None, secret);
    let mut key = [0u8; 32];
    hkdf.expand(POLL_ENCRYPTION_LABEL, &mut key).ok()?;
    Some(key)
}

/// Manual decryption: derive the key, then try each AAD candidate in order.
pub fn decrypt_with_secret(
    secret: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    ctx: &AadContext<'_>,
) -> VoteOutcome {
    if iv.len() != GCM_NONCE_LEN || ciphertext.is_empty() {
        return VoteOutcome::Undecryptable(UndecryptableReason::MalformedVote);
    }

    let Some(key) = derive_vote_key(secret) else {
        return VoteOutcome::Undecryptable(UndecryptableReason::KeyDerivation);
    };
    let Ok(cipher) = Aes256Gcm::new_from_slice(&key) else {
        return VoteOutcome::Undecryptable(UndecryptableReason::KeyDerivation);
    };
    let nonce = Nonce::from_slice(iv);

    for (index, candidate) in AAD_CANDIDATES.iter().enumerate() {
        let aad = candidate.build(ctx);
        match cipher.decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        ) {
            Ok(plaintext) => {
                debug!(index, aad = candidate.as_str(), "Poll vote authenticated");
                return VoteOutcome::Decrypted {
                    hashes: split_option_hashes(&plaintext),
                    source: VoteSource::Fallback { aad: *candidate },
                };
            }
            Err(_) => debug!(index, aad = candidate.as_str(), "Poll vote AAD candidate rejected"),
        }
    }

    VoteOutcome::Undecryptable(UndecryptableReason::AuthenticationFailed)
}

/// Split a vote plaintext into option hashes, dropping a trailing partial block.
pub fn split_option_hashes(plaintext: &[u8]) -> Vec<OptionHash> {
    plaintext
        .chunks_exact(OPTION_HASH_LEN)
        .filter_map(|chunk| OptionHash::try_from(chunk).ok())
        .collect()
}

pub fn option_hash(option: &str) -> OptionHash {
    Sha256::digest(option.as_bytes()).into()
}

/// Options whose SHA-256 matches one of `hashes`. Unmatched hashes are dropped.
pub fn match_options(hashes: &[OptionHash], options: &[String]) -> Vec<String> {
    let digests: Vec<(OptionHash, &String)> =
        options.iter().map(|o| (option_hash(o), o)).collect();

    hashes
        .iter()
        .filter_map(|hash| {
            digests
                .iter()
                .find(|(digest, _)| digest == hash)
                .map(|(_, option)| (*option).clone())
        })
        .collect()
}
