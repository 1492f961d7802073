//! REST bridge to a protocol client sidecar.
//!
//! The sidecar owns the protocol session; this crate only calls its lookup
//! endpoints. A 404 is an empty lookup, not an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;
use url::Url;

use super::client::{
    ChatStorage, ClientError, Contact, GroupInfo, OwnIdentity, ProtocolClient, StoredMessage,
};
use super::events::{MediaMessage, MessageEvent};
use super::jid::Jid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct DecryptedVote {
    /// Hex-encoded option hashes.
    selected_options: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PhoneLookup {
    jid: Option<Jid>,
}

/// Protocol client and chat storage backed by a sidecar REST API.
#[derive(Debug, Clone)]
pub struct HttpBridge {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpBridge {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, base_url })
    }

    /// Endpoint under the base URL; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_optional<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Option<T>, ClientError> {
        let url = self.endpoint(segments)?;
        let resp = self.http.get(url.clone()).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(resp.json().await?)),
            status => Err(ClientError::Rejected(format!("HTTP {status} for {}", url.path()))),
        }
    }
}

#[async_trait]
impl ProtocolClient for HttpBridge {
    async fn own_identity(&self) -> Option<OwnIdentity> {
        match self.get_optional(&["identity"]).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Failed to fetch own identity from protocol client");
                None
            }
        }
    }

    async fn decrypt_poll_vote(&self, event: &MessageEvent) -> Result<Vec<Vec<u8>>, ClientError> {
        let resp = self
            .http
            .post(self.endpoint(&["polls", "decrypt"])?)
            .json(event)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ClientError::Rejected(format!(
                "poll decrypt returned HTTP {}",
                resp.status()
            )));
        }
        let vote: DecryptedVote = resp.json().await?;
        vote.selected_options
            .iter()
            .map(|h| hex::decode(h).map_err(|e| ClientError::Decode(e.to_string())))
            .collect()
    }

    async fn pn_for_lid(&self, lid: &Jid) -> Result<Option<Jid>, ClientError> {
        let lid = lid.to_non_device().to_string();
        let lookup: Option<PhoneLookup> = self.get_optional(&["lids", lid.as_str(), "pn"]).await?;
        Ok(lookup.and_then(|l| l.jid))
    }

    async fn get_contact(&self, jid: &Jid) -> Result<Option<Contact>, ClientError> {
        let jid = jid.to_non_device().to_string();
        self.get_optional(&["contacts", jid.as_str()]).await
    }

    async fn get_group_info(&self, jid: &Jid) -> Result<Option<GroupInfo>, ClientError> {
        self.get_optional(&["groups", jid.to_string().as_str()]).await
    }

    async fn download_media(&self, media: &MediaMessage) -> Result<Vec<u8>, ClientError> {
        let resp = self
            .http
            .post(self.endpoint(&["media", "download"])?)
            .json(media)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ClientError::Rejected(format!(
                "media download returned HTTP {}",
                resp.status()
            )));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ChatStorage for HttpBridge {
    async fn get_message_by_id(&self, id: &str) -> Result<Option<StoredMessage>, ClientError> {
        self.get_optional(&["messages", id]).await
    }
}
