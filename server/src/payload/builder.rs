//! Payload Builder
//!
//! Builds the typed payload for each event kind. Every lookup here is an
//! enrichment: a failed contact, group, media, preview, or decryption lookup
//! leaves its field out and the payload is still produced.

use std::sync::Arc;

use tracing::{debug, warn};

use super::link_preview::{first_url, LinkPreviewFetcher};
use super::media::MediaResolver;
use super::mentions::resolve_mentions;
use super::types::{
    DeletePayload, EditPayload, GroupAction, GroupParticipantsPayload, LinkPreview,
    MessagePayload, MessageType, OriginalMessage, PollCreationInfo, PollVotePayload,
    ReactionPayload, ReceiptPayload, ReceiptTarget, RevokePayload, VoteStatus,
};
use crate::identity::IdentityNormalizer;
use crate::polls::{PollMetadata, PollStore, PollVoteDecryptor, VoteOutcome};
use crate::protocol::{
    ChatStorage, DeleteForMeEvent, GroupInfoEvent, Jid, MediaMessage, MessageContent,
    MessageEvent, MessageKey, PollUpdateMessage, ProtocolClient, ProtocolMessage,
    ReactionMessage, ReceiptEvent,
};

/// Builds webhook payloads from raw events.
#[derive(Clone)]
pub struct PayloadBuilder {
    client: Arc<dyn ProtocolClient>,
    storage: Arc<dyn ChatStorage>,
    polls: Arc<PollStore>,
    identity: IdentityNormalizer,
    decryptor: PollVoteDecryptor,
    media: MediaResolver,
    previews: Option<LinkPreviewFetcher>,
}

impl PayloadBuilder {
    /// `previews: None` disables link preview fetching; previews then come
    /// only from the message itself.
    pub fn new(
        client: Arc<dyn ProtocolClient>,
        storage: Arc<dyn ChatStorage>,
        polls: Arc<PollStore>,
        media: MediaResolver,
        previews: Option<LinkPreviewFetcher>,
    ) -> Self {
        Self {
            identity: IdentityNormalizer::new(client.clone()),
            decryptor: PollVoteDecryptor::new(client.clone(), polls.clone(), storage.clone()),
            client,
            storage,
            polls,
            media,
            previews,
        }
    }

    /// Normalized identifier without device suffix.
    async fn normalized(&self, jid: &Jid) -> Jid {
        self.identity.normalize(jid).await.to_non_device()
    }

    pub async fn message(&self, event: &MessageEvent, type_message: MessageType) -> MessagePayload {
        let info = &event.info;
        let content = &event.message;
        let chat = self.normalized(&info.chat).await;

        let mut sender = self.normalized(&info.sender).await;
        let mut sender_push_name = info.push_name.clone().filter(|n| !n.is_empty());
        let mut receiver_number = None;
        let mut receiver_push_name = None;

        let own = self.client.own_identity().await;
        if info.is_from_me {
            if let Some(own) = &own {
                sender = self.normalized(&own.jid).await;
                sender_push_name = own.push_name.clone().filter(|n| !n.is_empty());
            }
            if !info.is_group {
                receiver_number = Some(chat.user.clone());
                receiver_push_name = self.contact_name(&chat).await;
            }
        } else {
            receiver_push_name = own.and_then(|o| o.push_name).filter(|n| !n.is_empty());
        }

        let group_name = if info.is_group {
            match self.client.get_group_info(&info.chat).await {
                Ok(group) => group.map(|g| g.name),
                Err(e) => {
                    debug!(chat = %info.chat, error = %e, "Group info lookup failed");
                    None
                }
            }
        } else {
            None
        };

        let context = content.context_info.as_ref();
        let mentioned = context.map_or(&[][..], |c| c.mentioned_jids.as_slice());
        let mentions = resolve_mentions(&self.identity, content.text(), mentioned).await;

        let link_preview = if type_message == MessageType::Link {
            self.link_preview(content).await
        } else {
            None
        };

        let media = match (type_message.media_kind(), media_message(content, type_message)) {
            (Some(kind), Some(media)) => Some(self.media.resolve(&info.id, kind, media).await),
            _ => None,
        };

        MessagePayload {
            id: info.id.clone(),
            timestamp: info.timestamp,
            chat_id: chat.to_string(),
            sender_number: sender.user.clone(),
            sender: sender.to_string(),
            sender_push_name,
            receiver_number,
            receiver_push_name,
            from_me: info.is_from_me,
            is_group: info.is_group,
            group_name,
            type_message,
            text: mentions.text,
            mentions: mentions.jids,
            forwarded: context.is_some_and(|c| c.is_forwarded),
            view_once: event.is_view_once,
            media,
            link_preview,
            poll: content.poll_creation.as_ref().map(|p| PollCreationInfo {
                question: p.name.clone(),
                options: p.options.clone(),
                selectable_options_count: p.selectable_options_count,
            }),
            location: content.location.clone(),
            live_location: content.live_location.clone(),
            contact: content.contact.clone(),
            message_secret: context
                .and_then(|c| c.message_secret.as_deref())
                .map(hex::encode),
        }
    }

    /// Fetched preview of the first URL, else the preview embedded in the message.
    async fn link_preview(&self, content: &MessageContent) -> Option<LinkPreview> {
        let url = first_url(content.text()?)?;

        if let Some(fetcher) = &self.previews {
            match fetcher.fetch(url).await {
                Ok(preview) => return Some(preview),
                Err(e) => debug!(url, error = %e, "Link preview fetch failed"),
            }
        }

        let embedded = content.extended_text.as_ref()?;
        let title = embedded.title.clone().filter(|t| !t.is_empty());
        let description = embedded.description.clone().filter(|d| !d.is_empty());
        if title.is_none() && description.is_none() {
            return None;
        }
        Some(LinkPreview {
            url: url.to_string(),
            title,
            description,
        })
    }

    async fn contact_name(&self, jid: &Jid) -> Option<String> {
        match self.client.get_contact(jid).await {
            Ok(contact) => contact.and_then(|c| c.display_name().map(str::to_string)),
            Err(e) => {
                debug!(jid = %jid, error = %e, "Contact lookup failed");
                None
            }
        }
    }

    pub async fn reaction(&self, event: &MessageEvent, reaction: &ReactionMessage) -> ReactionPayload {
        ReactionPayload {
            id: event.info.id.clone(),
            timestamp: event.info.timestamp,
            chat_id: self.normalized(&event.info.chat).await.to_string(),
            sender: self.normalized(&event.info.sender).await.to_string(),
            from_me: event.info.is_from_me,
            reacted_message_id: reaction.key.id.clone(),
            emoji: reaction.text.clone(),
            removed: reaction.text.is_empty(),
        }
    }

    pub async fn revoke(&self, event: &MessageEvent, key: &MessageKey) -> RevokePayload {
        let revoked_from = match key.participant.as_deref().filter(|p| !p.is_empty()) {
            Some(participant) => match Jid::parse(participant) {
                Ok(jid) => Some(self.normalized(&jid).await.to_string()),
                Err(_) => Some(participant.to_string()),
            },
            None => None,
        };

        RevokePayload {
            id: event.info.id.clone(),
            timestamp: event.info.timestamp,
            chat_id: self.normalized(&event.info.chat).await.to_string(),
            sender: self.normalized(&event.info.sender).await.to_string(),
            from_me: event.info.is_from_me,
            revoked_message_id: key.id.clone(),
            revoked_from,
        }
    }

    pub async fn edit(&self, event: &MessageEvent, protocol: &ProtocolMessage) -> EditPayload {
        EditPayload {
            id: event.info.id.clone(),
            timestamp: event.info.timestamp,
            chat_id: self.normalized(&event.info.chat).await.to_string(),
            sender: self.normalized(&event.info.sender).await.to_string(),
            from_me: event.info.is_from_me,
            edited_message_id: protocol.key.as_ref().map(|k| k.id.clone()).unwrap_or_default(),
            new_text: protocol
                .edited_message
                .as_deref()
                .and_then(MessageContent::text)
                .map(str::to_string),
        }
    }

    pub async fn poll_vote(&self, event: &MessageEvent, update: &PollUpdateMessage) -> PollVotePayload {
        let resolved = self.decryptor.resolve(event, update).await;

        let selected_option_hashes = match &resolved.outcome {
            VoteOutcome::Decrypted { hashes, .. } => hashes.iter().map(hex::encode).collect(),
            VoteOutcome::Undecryptable(_) => Vec::new(),
        };

        PollVotePayload {
            id: event.info.id.clone(),
            timestamp: event.info.timestamp,
            chat_id: self.normalized(&event.info.chat).await.to_string(),
            sender: self.normalized(&event.info.sender).await.to_string(),
            from_me: event.info.is_from_me,
            poll_message_id: update.poll_creation_message_key.id.clone(),
            encrypted_payload: hex::encode(&update.vote.enc_payload),
            encrypted_iv: hex::encode(&update.vote.enc_iv),
            selected_option_hashes,
            selected_options: resolved.selected,
            vote: VoteStatus::from(&resolved.outcome),
            poll: resolved.metadata,
        }
    }

    pub async fn receipt(&self, receipt: &ReceiptEvent) -> ReceiptPayload {
        let poll = match receipt.message_ids.first() {
            Some(id) => self.polls.get(id).await.map(|record| PollMetadata {
                question: record.question,
                options: record.options,
            }),
            None => None,
        };

        ReceiptPayload {
            ids: receipt.message_ids.clone(),
            timestamp: receipt.timestamp,
            chat_id: self.normalized(&receipt.chat).await.to_string(),
            sender: self.normalized(&receipt.sender).await.to_string(),
            from_lid: receipt
                .sender
                .is_alias()
                .then(|| receipt.sender.to_non_device().to_string()),
            receipt_type: receipt.kind.as_str(),
            receipt_type_description: receipt.kind.description(),
            from_me: receipt.is_from_me,
            target: if poll.is_some() {
                ReceiptTarget::PollMessage
            } else {
                ReceiptTarget::ReceiptMessage
            },
            poll,
        }
    }

    /// One payload per non-empty participant action, in join, leave,
    /// promote, demote order.
    pub async fn group_participants(&self, event: &GroupInfoEvent) -> Vec<GroupParticipantsPayload> {
        let sender = match &event.sender {
            Some(sender) => Some(self.normalized(sender).await.to_string()),
            None => None,
        };

        let actions = [
            (GroupAction::Join, &event.join),
            (GroupAction::Leave, &event.leave),
            (GroupAction::Promote, &event.promote),
            (GroupAction::Demote, &event.demote),
        ];

        let mut payloads = Vec::new();
        for (action, jids) in actions {
            if jids.is_empty() {
                continue;
            }
            let normalized = self.identity.normalize_all(jids).await;
            payloads.push(GroupParticipantsPayload {
                chat_id: event.jid.to_string(),
                timestamp: event.timestamp,
                action,
                jids: normalized.iter().map(|j| j.to_non_device().to_string()).collect(),
                sender: sender.clone(),
            });
        }
        payloads
    }

    pub async fn deleted(&self, event: &DeleteForMeEvent) -> DeletePayload {
        let sender = self.normalized(&event.sender).await;

        let original = match self.storage.get_message_by_id(&event.message_id).await {
            Ok(stored) => stored.map(|m| OriginalMessage {
                content: m.content,
                sender: m.sender,
                timestamp: m.timestamp,
                was_from_me: m.is_from_me,
                media_type: m.media_type.filter(|t| !t.is_empty()),
                filename: m.filename,
            }),
            Err(e) => {
                warn!(message_id = %event.message_id, error = %e, "Failed to look up deleted message");
                None
            }
        };

        DeletePayload {
            deleted_message_id: event.message_id.clone(),
            timestamp: event.timestamp,
            chat_id: self.normalized(&event.chat).await.to_string(),
            sender_number: sender.user.clone(),
            sender_name: self.contact_name(&event.sender).await,
            sender: sender.to_string(),
            from_me: event.is_from_me,
            original,
        }
    }
}

/// The attachment a media message type refers to.
fn media_message(content: &MessageContent, type_message: MessageType) -> Option<&MediaMessage> {
    match type_message {
        MessageType::Image => content.image.as_ref(),
        MessageType::Audio => content.audio.as_ref(),
        MessageType::Document => content.document.as_ref(),
        MessageType::VideoNote => content.ptv.as_ref(),
        MessageType::Video => content.video.as_ref(),
        // GIF-playback videos are delivered as stickers
        MessageType::Sticker => content.sticker.as_ref().or(content.video.as_ref()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::types::{MediaKind, MediaRef, UNDECRYPTABLE_DETAIL};
    use crate::polls::{PollRecord, UndecryptableReason, POLL_STORE_FILE};
    use crate::protocol::{
        ContactMessage, ContextInfo, Contact, EncryptedVote, ExtendedText, GroupInfo,
        OwnIdentity, ProtocolKind, ReceiptType, StoredMessage,
    };
    use crate::test_utils::{fixed_time, jid, message_event, text, FakeClient, FakeStorage};

    struct Fixture {
        _dir: tempfile::TempDir,
        polls: Arc<PollStore>,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let polls = Arc::new(PollStore::open(dir.path().join(POLL_STORE_FILE)).await);
        Fixture { _dir: dir, polls }
    }

    fn builder(client: FakeClient, storage: FakeStorage, polls: Arc<PollStore>) -> PayloadBuilder {
        let client: Arc<dyn ProtocolClient> = Arc::new(client);
        let media = MediaResolver::new(client.clone(), false, "statics/media");
        PayloadBuilder::new(client, Arc::new(storage), polls, media, None)
    }

    fn lid_client() -> FakeClient {
        FakeClient::default().map_lid("777@lid", "5511988887777@s.whatsapp.net")
    }

    #[tokio::test]
    async fn incoming_text_normalizes_sender_and_mentions() {
        let f = fixture().await;
        let mut client = lid_client();
        client.own = Some(OwnIdentity {
            jid: jid("5511900000000@s.whatsapp.net"),
            push_name: Some("Me".into()),
        });
        let b = builder(client, FakeStorage::default(), f.polls.clone());

        let mut content = text("hey @777");
        content.context_info = Some(ContextInfo {
            mentioned_jids: vec![jid("777@lid")],
            is_forwarded: true,
            message_secret: Some(vec![0xab, 0xcd]),
        });
        let event = message_event("3EB0A", "777:5@lid", content);

        let p = b.message(&event, MessageType::Text).await;
        assert_eq!(p.sender, "5511988887777@s.whatsapp.net");
        assert_eq!(p.sender_number, "5511988887777");
        assert_eq!(p.chat_id, "5511988887777@s.whatsapp.net");
        assert_eq!(p.sender_push_name.as_deref(), Some("Ana"));
        assert_eq!(p.receiver_push_name.as_deref(), Some("Me"));
        assert_eq!(p.text.as_deref(), Some("hey @5511988887777"));
        assert_eq!(p.mentions, vec!["5511988887777@s.whatsapp.net".to_string()]);
        assert!(p.forwarded);
        assert_eq!(p.message_secret.as_deref(), Some("abcd"));
        assert!(p.media.is_none());
    }

    #[tokio::test]
    async fn outgoing_message_uses_own_identity_and_receiver_contact() {
        let f = fixture().await;
        let mut client = FakeClient::default();
        client.own = Some(OwnIdentity {
            jid: jid("5511900000000:7@s.whatsapp.net"),
            push_name: Some("Me".into()),
        });
        client.contacts.insert(
            "5511988887777@s.whatsapp.net".into(),
            Contact {
                push_name: None,
                full_name: Some("Bia Lima".into()),
            },
        );
        let b = builder(client, FakeStorage::default(), f.polls.clone());

        let mut event = message_event("3EB0B", "5511900000000:7@s.whatsapp.net", text("hi"));
        event.info.is_from_me = true;
        event.info.chat = jid("5511988887777@s.whatsapp.net");

        let p = b.message(&event, MessageType::Text).await;
        assert_eq!(p.sender, "5511900000000@s.whatsapp.net");
        assert_eq!(p.sender_push_name.as_deref(), Some("Me"));
        assert_eq!(p.receiver_number.as_deref(), Some("5511988887777"));
        assert_eq!(p.receiver_push_name.as_deref(), Some("Bia Lima"));
    }

    #[tokio::test]
    async fn group_message_carries_group_name() {
        let f = fixture().await;
        let mut client = FakeClient::default();
        client.groups.insert("120363@g.us".into(), GroupInfo { name: "Family".into() });
        let b = builder(client, FakeStorage::default(), f.polls.clone());

        let mut event = message_event("3EB0C", "5511988887777@s.whatsapp.net", text("hello"));
        event.info.is_group = true;
        event.info.chat = jid("120363@g.us");

        let p = b.message(&event, MessageType::Text).await;
        assert_eq!(p.group_name.as_deref(), Some("Family"));
        assert_eq!(p.chat_id, "120363@g.us");
    }

    #[tokio::test]
    async fn media_and_embedded_link_preview() {
        let f = fixture().await;
        let b = builder(FakeClient::default(), FakeStorage::default(), f.polls.clone());

        let content = MessageContent {
            image: Some(MediaMessage {
                url: Some("https://mmg.example.net/img".into()),
                mimetype: Some("image/jpeg".into()),
                caption: Some("look".into()),
                ..MediaMessage::default()
            }),
            ..MessageContent::default()
        };
        let p = b
            .message(&message_event("3EB0D", "1@s.whatsapp.net", content), MessageType::Image)
            .await;
        let media = p.media.unwrap();
        assert_eq!(media.kind, MediaKind::Image);
        assert_eq!(media.source, Some(MediaRef::Url("https://mmg.example.net/img".into())));
        assert_eq!(p.text.as_deref(), Some("look"));

        let content = MessageContent {
            extended_text: Some(ExtendedText {
                text: "read https://example.com/post".into(),
                title: Some("Post".into()),
                description: Some(String::new()),
            }),
            ..MessageContent::default()
        };
        let p = b
            .message(&message_event("3EB0E", "1@s.whatsapp.net", content), MessageType::Link)
            .await;
        assert_eq!(
            p.link_preview,
            Some(LinkPreview {
                url: "https://example.com/post".into(),
                title: Some("Post".into()),
                description: None,
            })
        );
    }

    #[tokio::test]
    async fn loopback_link_gets_no_preview() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = axum::Router::new().route(
            "/admin",
            axum::routing::get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { axum::response::Html("<title>INTERNAL admin token=abc123</title>") }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let f = fixture().await;
        let client: Arc<dyn ProtocolClient> = Arc::new(FakeClient::default());
        let media = MediaResolver::new(client.clone(), false, "statics/media");
        let b = PayloadBuilder::new(
            client,
            Arc::new(FakeStorage::default()),
            f.polls.clone(),
            media,
            Some(LinkPreviewFetcher::new(Duration::from_secs(5))),
        );

        let body = format!("look http://{addr}/admin");
        let p = b
            .message(&message_event("3EB0L", "1@s.whatsapp.net", text(&body)), MessageType::Link)
            .await;
        assert_eq!(p.link_preview, None);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn gif_video_is_sticker_media() {
        let f = fixture().await;
        let b = builder(FakeClient::default(), FakeStorage::default(), f.polls.clone());
        let content = MessageContent {
            video: Some(MediaMessage {
                url: Some("https://mmg.example.net/gif".into()),
                gif_playback: true,
                ..MediaMessage::default()
            }),
            ..MessageContent::default()
        };

        let p = b
            .message(&message_event("3EB0F", "1@s.whatsapp.net", content), MessageType::Sticker)
            .await;
        assert_eq!(p.media.unwrap().kind, MediaKind::Sticker);
    }

    #[tokio::test]
    async fn contact_card_is_copied() {
        let f = fixture().await;
        let b = builder(FakeClient::default(), FakeStorage::default(), f.polls.clone());
        let content = MessageContent {
            contact: Some(ContactMessage {
                display_name: "Ana".into(),
                vcard: "BEGIN:VCARD\nEND:VCARD".into(),
            }),
            ..MessageContent::default()
        };

        let p = b
            .message(&message_event("3EB10", "1@s.whatsapp.net", content), MessageType::Contact)
            .await;
        assert_eq!(p.contact.unwrap().display_name, "Ana");
    }

    #[tokio::test]
    async fn reaction_revoke_and_edit() {
        let f = fixture().await;
        let b = builder(lid_client(), FakeStorage::default(), f.polls.clone());
        let event = message_event("3EB11", "777@lid", MessageContent::default());
        let key = MessageKey {
            id: "3EB0TARGET".into(),
            participant: Some("777@lid".into()),
            ..MessageKey::default()
        };

        let r = b
            .reaction(&event, &ReactionMessage { key: key.clone(), text: String::new() })
            .await;
        assert!(r.removed);
        assert_eq!(r.reacted_message_id, "3EB0TARGET");
        assert_eq!(r.sender, "5511988887777@s.whatsapp.net");

        let revoke = b.revoke(&event, &key).await;
        assert_eq!(revoke.revoked_message_id, "3EB0TARGET");
        assert_eq!(revoke.revoked_from.as_deref(), Some("5511988887777@s.whatsapp.net"));

        let edit = b
            .edit(
                &event,
                &ProtocolMessage {
                    kind: ProtocolKind::MessageEdit,
                    key: Some(key),
                    edited_message: Some(Box::new(text("fixed typo"))),
                },
            )
            .await;
        assert_eq!(edit.edited_message_id, "3EB0TARGET");
        assert_eq!(edit.new_text.as_deref(), Some("fixed typo"));
    }

    #[tokio::test]
    async fn undecryptable_vote_still_builds_payload() {
        let f = fixture().await;
        let b = builder(FakeClient::default(), FakeStorage::default(), f.polls.clone());
        let update = PollUpdateMessage {
            poll_creation_message_key: MessageKey {
                id: "3EB0POLL".into(),
                ..MessageKey::default()
            },
            vote: EncryptedVote {
                enc_payload: vec![0xde, 0xad],
                enc_iv: vec![1; 12],
            },
        };
        let event = message_event("3EB12", "1@s.whatsapp.net", MessageContent::default());

        let p = b.poll_vote(&event, &update).await;
        assert_eq!(p.poll_message_id, "3EB0POLL");
        assert_eq!(p.encrypted_payload, "dead");
        assert!(p.selected_options.is_empty());
        assert_eq!(
            p.vote,
            VoteStatus::Undecryptable {
                reason: UndecryptableReason::MissingSecret,
                detail: UNDECRYPTABLE_DETAIL,
            }
        );
    }

    #[tokio::test]
    async fn receipt_for_stored_poll() {
        let f = fixture().await;
        f.polls
            .put(
                "3EB0POLL",
                PollRecord {
                    question: "Lunch?".into(),
                    options: vec!["Pizza".into(), "Sushi".into()],
                    enc_key: vec![1; 32],
                },
            )
            .await;
        let b = builder(lid_client(), FakeStorage::default(), f.polls.clone());
        let receipt = ReceiptEvent {
            chat: jid("777@lid"),
            sender: jid("777@lid"),
            is_from_me: false,
            is_group: false,
            message_ids: vec!["3EB0POLL".into(), "3EB0OTHER".into()],
            timestamp: fixed_time(),
            kind: ReceiptType::Read,
        };

        let p = b.receipt(&receipt).await;
        assert_eq!(p.target, ReceiptTarget::PollMessage);
        assert_eq!(p.poll.unwrap().question, "Lunch?");
        assert_eq!(p.from_lid.as_deref(), Some("777@lid"));
        assert_eq!(p.sender, "5511988887777@s.whatsapp.net");
        assert_eq!(p.receipt_type, "read");

        let plain = ReceiptEvent {
            message_ids: vec!["3EB0OTHER".into()],
            sender: jid("5511911112222@s.whatsapp.net"),
            ..receipt
        };
        let p = b.receipt(&plain).await;
        assert_eq!(p.target, ReceiptTarget::ReceiptMessage);
        assert!(p.from_lid.is_none());
    }

    #[tokio::test]
    async fn one_group_payload_per_action() {
        let f = fixture().await;
        let b = builder(lid_client(), FakeStorage::default(), f.polls.clone());
        let event = GroupInfoEvent {
            jid: jid("120363@g.us"),
            sender: Some(jid("5511900000000@s.whatsapp.net")),
            timestamp: fixed_time(),
            join: vec![jid("777@lid"), jid("5511911112222@s.whatsapp.net")],
            leave: Vec::new(),
            promote: vec![jid("5511933334444@s.whatsapp.net")],
            demote: Vec::new(),
        };

        let payloads = b.group_participants(&event).await;
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].action, GroupAction::Join);
        assert_eq!(
            payloads[0].jids,
            vec![
                "5511988887777@s.whatsapp.net".to_string(),
                "5511911112222@s.whatsapp.net".to_string()
            ]
        );
        assert_eq!(payloads[1].action, GroupAction::Promote);
    }

    #[tokio::test]
    async fn delete_for_me_includes_stored_original() {
        let f = fixture().await;
        let mut client = FakeClient::default();
        client.contacts.insert(
            "5511988887777@s.whatsapp.net".into(),
            Contact {
                push_name: Some("Bia".into()),
                full_name: Some("Bia Lima".into()),
            },
        );
        let storage = FakeStorage::with(StoredMessage {
            id: "3EB0GONE".into(),
            chat_jid: "5511988887777@s.whatsapp.net".into(),
            sender: "5511988887777@s.whatsapp.net".into(),
            content: "secret plan".into(),
            timestamp: fixed_time(),
            is_from_me: false,
            media_type: Some(String::new()),
            filename: None,
            poll_title: None,
            poll_options: Vec::new(),
            poll_secret: None,
        });
        let b = builder(client, storage, f.polls.clone());
        let event = DeleteForMeEvent {
            chat: jid("5511988887777@s.whatsapp.net"),
            sender: jid("5511988887777@s.whatsapp.net"),
            is_from_me: true,
            message_id: "3EB0GONE".into(),
            timestamp: fixed_time(),
        };

        let p = b.deleted(&event).await;
        assert_eq!(p.sender_name.as_deref(), Some("Bia"));
        let original = p.original.unwrap();
        assert_eq!(original.content, "secret plan");
        assert!(original.media_type.is_none());
    }
}
