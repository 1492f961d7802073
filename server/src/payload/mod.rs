//! Webhook payload construction.

pub mod builder;
pub mod link_preview;
pub mod media;
pub mod mentions;
pub mod ssrf;
pub mod types;

pub use builder::PayloadBuilder;
pub use link_preview::LinkPreviewFetcher;
pub use media::MediaResolver;
pub use types::{
    EventKind, LinkPreview, MediaAttachment, MediaKind, MediaRef, MessageType, VoteStatus,
    WebhookEvent, WebhookPayload,
};
