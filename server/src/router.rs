//! Event Router
//!
//! Classifies raw protocol events and turns each into zero or more webhook
//! events. A message yields exactly one kind, decided by structural
//! precedence:
//!
//! protocol control (revoke, edit) > reaction > poll vote > poll creation >
//! media, location, contact > text
//!
//! Text is further split into link, emoji-only, and plain.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::payload::link_preview::contains_url;
use crate::payload::{MessageType, PayloadBuilder, WebhookEvent, WebhookPayload};
use crate::protocol::{
    MessageContent, MessageEvent, PollUpdateMessage, ProtocolKind, ProtocolMessage, RawEvent,
    ReactionMessage,
};
use crate::receipts::ReceiptGate;

static EMOJI_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\p{So}|\p{Sk}|\p{S})+$").expect("valid regex"));

/// Classification of a message event.
#[derive(Debug, Clone, Copy)]
pub enum MessageClass<'a> {
    Revoke(&'a ProtocolMessage),
    Edit(&'a ProtocolMessage),
    Reaction(&'a ReactionMessage),
    PollVote(&'a PollUpdateMessage),
    Content(MessageType),
    /// Nothing to forward; carries the reason.
    Ignored(&'static str),
}

/// Classify a message body.
pub fn classify(content: &MessageContent) -> MessageClass<'_> {
    if let Some(protocol) = &content.protocol {
        return match protocol.kind {
            ProtocolKind::Revoke if protocol.key.is_some() => MessageClass::Revoke(protocol),
            ProtocolKind::MessageEdit if protocol.key.is_some() => MessageClass::Edit(protocol),
            ProtocolKind::Revoke | ProtocolKind::MessageEdit => {
                MessageClass::Ignored("protocol message without target key")
            }
            _ => MessageClass::Ignored("unsupported protocol message"),
        };
    }

    if let Some(reaction) = &content.reaction {
        return MessageClass::Reaction(reaction);
    }
    if let Some(update) = &content.poll_update {
        return MessageClass::PollVote(update);
    }
    if content.poll_creation.is_some() {
        return MessageClass::Content(MessageType::Poll);
    }

    if let Some(kind) = media_type(content) {
        return MessageClass::Content(kind);
    }

    match content.text() {
        Some(text) => MessageClass::Content(classify_text(text)),
        None => MessageClass::Ignored("empty message"),
    }
}

fn media_type(content: &MessageContent) -> Option<MessageType> {
    let kind = if content.audio.is_some() {
        MessageType::Audio
    } else if content.document.is_some() {
        MessageType::Document
    } else if content.image.is_some() {
        MessageType::Image
    } else if content.sticker.is_some() {
        MessageType::Sticker
    } else if content.ptv.is_some() {
        MessageType::VideoNote
    } else if let Some(video) = &content.video {
        if video.gif_playback {
            MessageType::Sticker
        } else {
            MessageType::Video
        }
    } else if content.location.is_some() {
        MessageType::Location
    } else if content.live_location.is_some() {
        MessageType::LiveLocation
    } else if content.contact.is_some() {
        MessageType::Contact
    } else {
        return None;
    };
    Some(kind)
}

/// Link if the text contains a URL, emoji if it consists only of symbol
/// characters, plain text otherwise.
pub fn classify_text(text: &str) -> MessageType {
    if contains_url(text) {
        MessageType::Link
    } else if EMOJI_ONLY.is_match(text) {
        MessageType::Emoji
    } else {
        MessageType::Text
    }
}

/// Turns raw events into webhook events.
pub struct EventRouter {
    builder: PayloadBuilder,
    receipts: Arc<ReceiptGate>,
    device_id: String,
}

impl EventRouter {
    pub fn new(builder: PayloadBuilder, receipts: Arc<ReceiptGate>, device_id: impl Into<String>) -> Self {
        Self {
            builder,
            receipts,
            device_id: device_id.into(),
        }
    }

    /// Webhook events for one raw event. Empty for ignored messages and
    /// gated receipts; one per action for group participant changes.
    pub async fn route(&self, event: &RawEvent) -> Vec<WebhookEvent> {
        match event {
            RawEvent::Message(message) => self.route_message(message).await.into_iter().collect(),
            RawEvent::Receipt(receipt) => {
                let verdict = self.receipts.check(receipt).await;
                if !verdict.is_forward() {
                    debug!(chat = %receipt.chat, verdict = ?verdict, "Receipt not forwarded");
                    return Vec::new();
                }
                let payload = self.builder.receipt(receipt).await;
                vec![self.wrap(receipt.timestamp, WebhookPayload::Ack(payload))]
            }
            RawEvent::GroupInfo(group) => self
                .builder
                .group_participants(group)
                .await
                .into_iter()
                .map(|p| self.wrap(group.timestamp, WebhookPayload::GroupParticipants(p)))
                .collect(),
            RawEvent::DeleteForMe(deleted) => {
                let payload = self.builder.deleted(deleted).await;
                vec![self.wrap(deleted.timestamp, WebhookPayload::Deleted(payload))]
            }
        }
    }

    async fn route_message(&self, event: &MessageEvent) -> Option<WebhookEvent> {
        let payload = match classify(&event.message) {
            MessageClass::Revoke(protocol) => {
                let key = protocol.key.as_ref()?;
                WebhookPayload::Revoked(self.builder.revoke(event, key).await)
            }
            MessageClass::Edit(protocol) => WebhookPayload::Edited(self.builder.edit(event, protocol).await),
            MessageClass::Reaction(reaction) => {
                WebhookPayload::Reaction(self.builder.reaction(event, reaction).await)
            }
            MessageClass::PollVote(update) => {
                WebhookPayload::PollVote(Box::new(self.builder.poll_vote(event, update).await))
            }
            MessageClass::Content(kind) => {
                WebhookPayload::Message(Box::new(self.builder.message(event, kind).await))
            }
            MessageClass::Ignored(reason) => {
                debug!(message_id = %event.info.id, reason, "Message not forwarded");
                return None;
            }
        };
        Some(self.wrap(event.info.timestamp, payload))
    }

    fn wrap(&self, timestamp: chrono::DateTime<chrono::Utc>, payload: WebhookPayload) -> WebhookEvent {
        WebhookEvent::new(self.device_id.clone(), timestamp, payload)
    }
}
