//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::payload::{MediaResolver, PayloadBuilder};
use crate::pipeline::Pipeline;
use crate::polls::{PollStore, POLL_STORE_FILE};
use crate::protocol::{
    ChatStorage, ClientError, Contact, GroupInfo, Jid, MediaMessage, MessageContent,
    MessageEvent, MessageInfo, OwnIdentity, ProtocolClient, StoredMessage,
};
use crate::receipts::ReceiptGate;
use crate::router::EventRouter;
use crate::webhooks::{WebhookDispatcher, DEFAULT_DELIVERY_TIMEOUT};

/// Configurable protocol client.
#[derive(Default)]
pub struct FakeClient {
    pub mappings: HashMap<String, Jid>,
    pub contacts: HashMap<String, Contact>,
    pub groups: HashMap<String, GroupInfo>,
    pub own: Option<OwnIdentity>,
    /// `None` makes library decryption fail.
    pub library_votes: Option<Vec<Vec<u8>>>,
    pub media: Option<Vec<u8>>,
    pub fail_lookups: bool,
    pub lookups: AtomicUsize,
    pub decrypt_calls: AtomicUsize,
}

impl FakeClient {
    pub fn map_lid(mut self, lid: &str, pn: &str) -> Self {
        self.mappings
            .insert(lid.to_string(), Jid::parse(pn).expect("valid pn"));
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn decrypt_count(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtocolClient for FakeClient {
    async fn own_identity(&self) -> Option<OwnIdentity> {
        self.own.clone()
    }

    async fn decrypt_poll_vote(&self, _event: &MessageEvent) -> Result<Vec<Vec<u8>>, ClientError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.library_votes
            .clone()
            .ok_or_else(|| ClientError::Rejected("no session for poll".into()))
    }

    async fn pn_for_lid(&self, lid: &Jid) -> Result<Option<Jid>, ClientError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups {
            return Err(ClientError::Transport("connection reset".into()));
        }
        Ok(self.mappings.get(&lid.to_string()).cloned())
    }

    async fn get_contact(&self, jid: &Jid) -> Result<Option<Contact>, ClientError> {
        Ok(self.contacts.get(&jid.to_non_device().to_string()).cloned())
    }

    async fn get_group_info(&self, jid: &Jid) -> Result<Option<GroupInfo>, ClientError> {
        Ok(self.groups.get(&jid.to_string()).cloned())
    }

    async fn download_media(&self, _media: &MediaMessage) -> Result<Vec<u8>, ClientError> {
        self.media.clone().ok_or(ClientError::Unavailable)
    }
}

/// Chat storage over a fixed message set.
#[derive(Default)]
pub struct FakeStorage {
    pub messages: Mutex<HashMap<String, StoredMessage>>,
    pub lookups: AtomicUsize,
}

impl FakeStorage {
    pub fn with(message: StoredMessage) -> Self {
        let storage = Self::default();
        storage
            .messages
            .lock()
            .expect("lock")
            .insert(message.id.clone(), message);
        storage
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatStorage for FakeStorage {
    async fn get_message_by_id(&self, id: &str) -> Result<Option<StoredMessage>, ClientError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.messages.lock().expect("lock").get(id).cloned())
    }
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn jid(s: &str) -> Jid {
    Jid::parse(s).expect("valid jid")
}

/// Incoming one-to-one message from `sender`.
pub fn message_event(id: &str, sender: &str, message: MessageContent) -> MessageEvent {
    MessageEvent {
        info: MessageInfo {
            id: id.to_string(),
            chat: jid(sender).to_non_device(),
            sender: jid(sender),
            is_from_me: false,
            is_group: false,
            push_name: Some("Ana".into()),
            timestamp: fixed_time(),
        },
        message,
        is_view_once: false,
    }
}

pub fn text(body: &str) -> MessageContent {
    MessageContent {
        conversation: Some(body.to_string()),
        ..MessageContent::default()
    }
}

/// Pipeline over fake collaborators with its poll store under `dir`.
pub async fn pipeline(dir: &Path, destinations: Vec<String>) -> (Arc<PollStore>, Pipeline) {
    let polls = Arc::new(PollStore::open(dir.join(POLL_STORE_FILE)).await);
    let client: Arc<dyn ProtocolClient> = Arc::new(FakeClient::default());
    let media = MediaResolver::new(client.clone(), false, dir);
    let builder = PayloadBuilder::new(client, Arc::new(FakeStorage::default()), polls.clone(), media, None);
    let router = EventRouter::new(builder, Arc::new(ReceiptGate::default()), "device-1");
    let dispatcher = WebhookDispatcher::new(destinations, None, DEFAULT_DELIVERY_TIMEOUT).expect("dispatcher");
    (polls, Pipeline::new(router, dispatcher))
}
