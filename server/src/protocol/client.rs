//! Protocol Collaborators
//!
//! The messaging client and its chat storage are external to this crate.
//! The pipeline only sees them through these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::events::{MediaMessage, MessageEvent};
use super::jid::Jid;

/// Errors surfaced by protocol collaborators.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Protocol client unavailable")]
    Unavailable,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("{0}")]
    Rejected(String),
    #[error("Invalid protocol API URL: {0}")]
    InvalidBaseUrl(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// The logged-in account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnIdentity {
    pub jid: Jid,
    #[serde(default)]
    pub push_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl Contact {
    /// Push name, falling back to the full name.
    pub fn display_name(&self) -> Option<&str> {
        self.push_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| self.full_name.as_deref().filter(|n| !n.is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
}

/// A message previously persisted by the chat storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub chat_jid: String,
    pub sender: String,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_from_me: bool,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub poll_title: Option<String>,
    #[serde(default)]
    pub poll_options: Vec<String>,
    /// Hex-encoded poll message secret.
    #[serde(default)]
    pub poll_secret: Option<String>,
}

impl StoredMessage {
    pub fn is_poll(&self) -> bool {
        self.media_type.as_deref() == Some("poll")
    }
}

/// Operations offered by the messaging protocol client.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Identity of the logged-in account, if any.
    async fn own_identity(&self) -> Option<OwnIdentity>;

    /// Library decryption of a poll vote. Returns the selected option hashes.
    async fn decrypt_poll_vote(&self, event: &MessageEvent) -> Result<Vec<Vec<u8>>, ClientError>;

    /// Resolve an alias identifier to its phone identifier.
    async fn pn_for_lid(&self, lid: &Jid) -> Result<Option<Jid>, ClientError>;

    async fn get_contact(&self, jid: &Jid) -> Result<Option<Contact>, ClientError>;

    async fn get_group_info(&self, jid: &Jid) -> Result<Option<GroupInfo>, ClientError>;

    /// Download and decrypt a media attachment.
    async fn download_media(&self, media: &MediaMessage) -> Result<Vec<u8>, ClientError>;
}

/// Message lookups against the chat storage.
#[async_trait]
pub trait ChatStorage: Send + Sync {
    async fn get_message_by_id(&self, id: &str) -> Result<Option<StoredMessage>, ClientError>;
}

/// Collaborator used when no protocol client is attached.
///
/// Every lookup comes back empty and library decryption is unavailable, so
/// the pipeline runs entirely on its own fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

#[async_trait]
impl ProtocolClient for Detached {
    async fn own_identity(&self) -> Option<OwnIdentity> {
        None
    }

    async fn decrypt_poll_vote(&self, _event: &MessageEvent) -> Result<Vec<Vec<u8>>, ClientError> {
        Err(ClientError::Unavailable)
    }

    async fn pn_for_lid(&self, _lid: &Jid) -> Result<Option<Jid>, ClientError> {
        Ok(None)
    }

    async fn get_contact(&self, _jid: &Jid) -> Result<Option<Contact>, ClientError> {
        Ok(None)
    }

    async fn get_group_info(&self, _jid: &Jid) -> Result<Option<GroupInfo>, ClientError> {
        Ok(None)
    }

    async fn download_media(&self, _media: &MediaMessage) -> Result<Vec<u8>, ClientError> {
        Err(ClientError::Unavailable)
    }
}

#[async_trait]
impl ChatStorage for Detached {
    async fn get_message_by_id(&self, _id: &str) -> Result<Option<StoredMessage>, ClientError> {
        Ok(None)
    }
}
