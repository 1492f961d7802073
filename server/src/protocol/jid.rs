//! Protocol Identifiers
//!
//! `user[:device]@server` identifiers as emitted by the protocol client.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server of privacy-preserving alias identifiers.
pub const HIDDEN_USER_SERVER: &str = "lid";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JidError {
    #[error("Invalid device index in identifier: {0}")]
    InvalidDevice(String),
}

/// A protocol identifier.
///
/// `device` is the linked-device index; 0 is the primary device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid {
    pub user: String,
    pub server: String,
    pub device: u16,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
            device: 0,
        }
    }

    /// Parse from the string form (e.g., `"5511999999999:3@s.whatsapp.net"`).
    pub fn parse(s: &str) -> Result<Self, JidError> {
        let Some((user_part, server)) = s.rsplit_once('@') else {
            // Server-only identifiers such as `status@broadcast` without a user
            return Ok(Self::new("", s));
        };

        let (user, device) = match user_part.split_once(':') {
            Some((user, device)) => {
                let device = device
                    .parse::<u16>()
                    .map_err(|_| JidError::InvalidDevice(s.to_string()))?;
                (user, device)
            }
            None => (user_part, 0),
        };

        Ok(Self {
            user: user.to_string(),
            server: server.to_string(),
            device,
        })
    }

    /// Whether this is an alias (privacy-preserving) identifier.
    pub fn is_alias(&self) -> bool {
        self.server == HIDDEN_USER_SERVER
    }

    /// Same identifier without the device index.
    #[must_use]
    pub fn to_non_device(&self) -> Self {
        Self {
            user: self.user.clone(),
            server: self.server.clone(),
            device: 0,
        }
    }

    #[must_use]
    pub const fn with_device(mut self, device: u16) -> Self {
        self.device = device;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.server.is_empty()
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            return f.write_str(&self.server);
        }
        if self.device > 0 {
            write!(f, "{}:{}@{}", self.user, self.device, self.server)
        } else {
            write!(f, "{}@{}", self.user, self.server)
        }
    }
}

impl TryFrom<String> for Jid {
    type Error = JidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}
