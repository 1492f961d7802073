//! Raw Protocol Events
//!
//! Event notifications as delivered by the protocol client, before any
//! classification or enrichment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::jid::Jid;

/// An event emitted by the protocol client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    Message(MessageEvent),
    Receipt(ReceiptEvent),
    GroupInfo(GroupInfoEvent),
    DeleteForMe(DeleteForMeEvent),
}

impl RawEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Receipt(_) => "receipt",
            Self::GroupInfo(_) => "group_info",
            Self::DeleteForMe(_) => "delete_for_me",
        }
    }
}

/// Metadata of a received or sent message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: String,
    pub chat: Jid,
    pub sender: Jid,
    #[serde(default)]
    pub is_from_me: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub push_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub info: MessageInfo,
    pub message: MessageContent,
    #[serde(default)]
    pub is_view_once: bool,
}

/// Reference to another message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageKey {
    #[serde(default)]
    pub remote_jid: String,
    #[serde(default)]
    pub from_me: bool,
    pub id: String,
    #[serde(default)]
    pub participant: Option<String>,
}

/// Message body. At most a handful of these fields are set for any one
/// message; the router decides which one wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageContent {
    pub conversation: Option<String>,
    pub extended_text: Option<ExtendedText>,
    pub protocol: Option<ProtocolMessage>,
    pub reaction: Option<ReactionMessage>,
    pub poll_update: Option<PollUpdateMessage>,
    pub poll_creation: Option<PollCreationMessage>,
    pub image: Option<MediaMessage>,
    pub video: Option<MediaMessage>,
    pub ptv: Option<MediaMessage>,
    pub audio: Option<MediaMessage>,
    pub document: Option<MediaMessage>,
    pub sticker: Option<MediaMessage>,
    pub location: Option<LocationMessage>,
    pub live_location: Option<LiveLocationMessage>,
    pub contact: Option<ContactMessage>,
    pub context_info: Option<ContextInfo>,
}

impl MessageContent {
    /// Text body of the message, from a plain conversation, extended text,
    /// or a media caption.
    pub fn text(&self) -> Option<&str> {
        self.conversation
            .as_deref()
            .or_else(|| self.extended_text.as_ref().map(|t| t.text.as_str()))
            .or_else(|| {
                [&self.image, &self.video, &self.document]
                    .into_iter()
                    .flatten()
                    .find_map(|m| m.caption.as_deref())
            })
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedText {
    pub text: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolKind {
    Revoke,
    MessageEdit,
    EphemeralSetting,
    #[serde(other)]
    Other,
}

/// Protocol control message (revoke, edit, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub kind: ProtocolKind,
    #[serde(default)]
    pub key: Option<MessageKey>,
    #[serde(default)]
    pub edited_message: Option<Box<MessageContent>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionMessage {
    pub key: MessageKey,
    /// Empty text means the reaction was removed.
    #[serde(default)]
    pub text: String,
}

/// Encrypted selection of a poll vote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptedVote {
    #[serde(with = "super::base64_bytes")]
    pub enc_payload: Vec<u8>,
    #[serde(with = "super::base64_bytes")]
    pub enc_iv: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollUpdateMessage {
    pub poll_creation_message_key: MessageKey,
    pub vote: EncryptedVote,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollCreationMessage {
    pub name: String,
    pub options: Vec<String>,
    pub selectable_options_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaMessage {
    pub url: Option<String>,
    pub mimetype: Option<String>,
    pub caption: Option<String>,
    pub file_name: Option<String>,
    pub gif_playback: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationMessage {
    pub degrees_latitude: f64,
    pub degrees_longitude: f64,
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveLocationMessage {
    pub degrees_latitude: f64,
    pub degrees_longitude: f64,
    pub sequence_number: i64,
    pub time_offset: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactMessage {
    pub display_name: String,
    pub vcard: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextInfo {
    pub mentioned_jids: Vec<Jid>,
    pub is_forwarded: bool,
    #[serde(with = "super::base64_bytes_opt")]
    pub message_secret: Option<Vec<u8>>,
}

/// Receipt types reported by the protocol client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptType {
    #[serde(rename = "", alias = "delivered")]
    Delivered,
    #[serde(rename = "sender")]
    Sender,
    #[serde(rename = "retry")]
    Retry,
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "read-self")]
    ReadSelf,
    #[serde(rename = "played")]
    Played,
    #[serde(rename = "played-self")]
    PlayedSelf,
    #[serde(other)]
    Other,
}

impl ReceiptType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Sender => "sender",
            Self::Retry => "retry",
            Self::Read => "read",
            Self::ReadSelf => "read-self",
            Self::Played => "played",
            Self::PlayedSelf => "played-self",
            Self::Other => "other",
        }
    }

    /// Human readable meaning of the receipt.
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Delivered => "The message was delivered to the device, but the user may not have noticed it.",
            Self::Sender => "Sent by your other devices when a message you sent is delivered to them.",
            Self::Retry => "The message was delivered to the device, but decryption failed.",
            Self::Read => "The user opened the chat and saw the message.",
            Self::ReadSelf => "The current user read a message from a different device and has read receipts disabled.",
            Self::Played => "The media message was played.",
            Self::PlayedSelf => "The current user opened a view-once media message on a different device and has read receipts disabled.",
            Self::Other => "Unknown receipt type.",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptEvent {
    pub chat: Jid,
    pub sender: Jid,
    #[serde(default)]
    pub is_from_me: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub message_ids: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "receipt_type")]
    pub kind: ReceiptType,
}

/// Group metadata change. Only participant changes are forwarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfoEvent {
    pub jid: Jid,
    #[serde(default)]
    pub sender: Option<Jid>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub join: Vec<Jid>,
    #[serde(default)]
    pub leave: Vec<Jid>,
    #[serde(default)]
    pub promote: Vec<Jid>,
    #[serde(default)]
    pub demote: Vec<Jid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteForMeEvent {
    pub chat: Jid,
    pub sender: Jid,
    #[serde(default)]
    pub is_from_me: bool,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
}
