//! Webhook payload types.
//!
//! One struct per event kind. Optional fields are omitted from the JSON when
//! unset.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::polls::{PollMetadata, UndecryptableReason, VoteOutcome, VoteSource};
use crate::protocol::{ContactMessage, LiveLocationMessage, LocationMessage};

/// Webhook event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    #[serde(rename = "message")]
    Message,
    #[serde(rename = "message.reaction")]
    Reaction,
    #[serde(rename = "message.revoked")]
    Revoked,
    #[serde(rename = "message.edited")]
    Edited,
    #[serde(rename = "message.poll_vote")]
    PollVote,
    #[serde(rename = "message.ack")]
    Ack,
    #[serde(rename = "group.participants")]
    GroupParticipants,
    #[serde(rename = "message.deleted")]
    Deleted,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Reaction => "message.reaction",
            Self::Revoked => "message.revoked",
            Self::Edited => "message.edited",
            Self::PollVote => "message.poll_vote",
            Self::Ack => "message.ack",
            Self::GroupParticipants => "group.participants",
            Self::Deleted => "message.deleted",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized event ready for delivery.
///
/// Serializes to `{event, device_id, timestamp, payload}`; the event name is
/// always derived from the payload variant.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: WebhookPayload,
}

impl WebhookEvent {
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Utc>, payload: WebhookPayload) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            payload,
        }
    }

    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

impl Serialize for WebhookEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = serializer.serialize_struct("WebhookEvent", 4)?;
        body.serialize_field("event", self.kind().as_str())?;
        body.serialize_field("device_id", &self.device_id)?;
        body.serialize_field(
            "timestamp",
            &self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        body.serialize_field("payload", &self.payload)?;
        body.end()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WebhookPayload {
    Message(Box<MessagePayload>),
    Reaction(ReactionPayload),
    Revoked(RevokePayload),
    Edited(EditPayload),
    PollVote(Box<PollVotePayload>),
    Ack(ReceiptPayload),
    GroupParticipants(GroupParticipantsPayload),
    Deleted(DeletePayload),
}

impl WebhookPayload {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::Reaction(_) => EventKind::Reaction,
            Self::Revoked(_) => EventKind::Revoked,
            Self::Edited(_) => EventKind::Edited,
            Self::PollVote(_) => EventKind::PollVote,
            Self::Ack(_) => EventKind::Ack,
            Self::GroupParticipants(_) => EventKind::GroupParticipants,
            Self::Deleted(_) => EventKind::Deleted,
        }
    }
}

/// `type_message` of a message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageType {
    #[serde(rename = "text_message")]
    Text,
    #[serde(rename = "link_message")]
    Link,
    #[serde(rename = "emoji_message")]
    Emoji,
    #[serde(rename = "image_message")]
    Image,
    #[serde(rename = "video_message")]
    Video,
    #[serde(rename = "audio_message")]
    Audio,
    #[serde(rename = "document_message")]
    Document,
    #[serde(rename = "sticker_message")]
    Sticker,
    #[serde(rename = "video_note_message")]
    VideoNote,
    #[serde(rename = "location_message")]
    Location,
    #[serde(rename = "live_location_message")]
    LiveLocation,
    #[serde(rename = "contact_message")]
    Contact,
    #[serde(rename = "poll_message")]
    Poll,
}

impl MessageType {
    /// Media kind carried by this message type, if any.
    pub const fn media_kind(self) -> Option<MediaKind> {
        match self {
            Self::Image => Some(MediaKind::Image),
            Self::Video => Some(MediaKind::Video),
            Self::Audio => Some(MediaKind::Audio),
            Self::Document => Some(MediaKind::Document),
            Self::Sticker => Some(MediaKind::Sticker),
            Self::VideoNote => Some(MediaKind::VideoNote),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    VideoNote,
}

impl MediaKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Sticker => "sticker",
            Self::VideoNote => "video_note",
        }
    }
}

/// Where a media attachment can be fetched from. Never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaRef {
    /// Saved under the media directory.
    Path(String),
    /// Remote URL on the protocol's media servers.
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    /// Absent when download was enabled but failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<MediaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    /// Including the leading dot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkPreview {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollCreationInfo {
    pub question: String,
    pub options: Vec<String>,
    pub selectable_options_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagePayload {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub chat_id: String,
    pub sender: String,
    pub sender_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_push_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_push_name: Option<String>,
    pub from_me: bool,
    pub is_group: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    pub type_message: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Mentioned identifiers, phone form where resolvable.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub forwarded: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub view_once: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaAttachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<LinkPreview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollCreationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_location: Option<LiveLocationMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactMessage>,
    /// Hex-encoded message secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionPayload {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub chat_id: String,
    pub sender: String,
    pub from_me: bool,
    pub reacted_message_id: String,
    pub emoji: String,
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevokePayload {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub chat_id: String,
    pub sender: String,
    pub from_me: bool,
    pub revoked_message_id: String,
    /// Participant whose message was revoked, when it differs from the sender.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_from: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditPayload {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub chat_id: String,
    pub sender: String,
    pub from_me: bool,
    pub edited_message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_text: Option<String>,
}

/// Decryption state of a poll vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VoteStatus {
    Decrypted {
        #[serde(flatten)]
        source: VoteSource,
    },
    /// Placeholder delivered in place of the vote contents.
    Undecryptable {
        reason: UndecryptableReason,
        detail: &'static str,
    },
}

pub const UNDECRYPTABLE_DETAIL: &str = "votes undecryptable";

impl From<&VoteOutcome> for VoteStatus {
    fn from(outcome: &VoteOutcome) -> Self {
        match outcome {
            VoteOutcome::Decrypted { source, .. } => Self::Decrypted { source: *source },
            VoteOutcome::Undecryptable(reason) => Self::Undecryptable {
                reason: *reason,
                detail: UNDECRYPTABLE_DETAIL,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PollVotePayload {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub chat_id: String,
    pub sender: String,
    pub from_me: bool,
    pub poll_message_id: String,
    /// Hex-encoded.
    pub encrypted_payload: String,
    /// Hex-encoded.
    pub encrypted_iv: String,
    /// Hex-encoded option hashes.
    pub selected_option_hashes: Vec<String>,
    pub selected_options: Vec<String>,
    pub vote: VoteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptTarget {
    PollMessage,
    ReceiptMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptPayload {
    pub ids: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub chat_id: String,
    pub sender: String,
    /// Original alias identifier when the sender was alias-form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_lid: Option<String>,
    pub receipt_type: &'static str,
    pub receipt_type_description: &'static str,
    pub from_me: bool,
    #[serde(rename = "type")]
    pub target: ReceiptTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupAction {
    Join,
    Leave,
    Promote,
    Demote,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupParticipantsPayload {
    pub chat_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub action: GroupAction,
    pub jids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// Stored copy of a message deleted for me.
#[derive(Debug, Clone, Serialize)]
pub struct OriginalMessage {
    pub content: String,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    pub was_from_me: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletePayload {
    pub deleted_message_id: String,
    pub timestamp: DateTime<Utc>,
    pub chat_id: String,
    pub sender: String,
    pub sender_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub from_me: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<OriginalMessage>,
}
