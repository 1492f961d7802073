//! Media attachments.
//!
//! With auto-download on, attachments are downloaded through the protocol
//! client and saved under the media directory; the payload carries the local
//! path. With it off, the payload carries the remote URL.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::types::{MediaAttachment, MediaKind, MediaRef};
use crate::protocol::{MediaMessage, ProtocolClient};

/// Extensions for mime types whose first guess is not the usual one.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/webp", ".webp"),
    ("video/mp4", ".mp4"),
    ("audio/ogg", ".ogg"),
    ("audio/mpeg", ".mp3"),
    ("audio/mp4", ".m4a"),
    ("application/pdf", ".pdf"),
];

/// Extension (with leading dot) for an attachment.
///
/// Documents use their file name; everything else is guessed from the mime
/// type. Opus voice notes get `.opus`.
pub fn media_extension(kind: MediaKind, media: &MediaMessage) -> Option<String> {
    if kind == MediaKind::Document {
        if let Some(ext) = media
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
        {
            return Some(format!(".{ext}"));
        }
    }

    let mimetype = media.mimetype.as_deref()?;
    let essence = mimetype.split(';').next().unwrap_or_default().trim();

    let guessed = PREFERRED_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| (*ext).to_string())
        .or_else(|| {
            mime_guess::get_mime_extensions_str(essence)
                .and_then(|exts| exts.first())
                .map(|ext| format!(".{ext}"))
        });

    if kind == MediaKind::Audio
        && mimetype.contains("codecs=opus")
        && matches!(guessed.as_deref(), None | Some(".ogg"))
    {
        return Some(".opus".to_string());
    }
    guessed
}

/// Builds media attachments according to the auto-download policy.
#[derive(Clone)]
pub struct MediaResolver {
    client: Arc<dyn ProtocolClient>,
    auto_download: bool,
    media_dir: PathBuf,
}

impl MediaResolver {
    pub fn new(client: Arc<dyn ProtocolClient>, auto_download: bool, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            auto_download,
            media_dir: media_dir.into(),
        }
    }

    pub fn auto_download(&self) -> bool {
        self.auto_download
    }

    pub async fn resolve(&self, message_id: &str, kind: MediaKind, media: &MediaMessage) -> MediaAttachment {
        let extension = media_extension(kind, media);

        let source = if self.auto_download {
            self.download(message_id, kind, media, extension.as_deref())
                .await
                .map(MediaRef::Path)
        } else {
            media.url.clone().filter(|u| !u.is_empty()).map(MediaRef::Url)
        };

        MediaAttachment {
            kind,
            source,
            mimetype: media.mimetype.clone(),
            extension,
            caption: media.caption.clone().filter(|c| !c.is_empty()),
            file_name: media.file_name.clone(),
        }
    }

    async fn download(
        &self,
        message_id: &str,
        kind: MediaKind,
        media: &MediaMessage,
        extension: Option<&str>,
    ) -> Option<String> {
        let bytes = match self.client.download_media(media).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(message_id, kind = kind.as_str(), error = %e, "Media download failed");
                return None;
            }
        };

        let path = self.media_dir.join(file_name(message_id, kind, extension));
        if let Err(e) = tokio::fs::create_dir_all(&self.media_dir).await {
            warn!(dir = %self.media_dir.display(), error = %e, "Failed to create media directory");
            return None;
        }
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            warn!(path = %path.display(), error = %e, "Failed to save media");
            return None;
        }

        debug!(message_id, path = %path.display(), size = bytes.len(), "Saved media");
        Some(path.to_string_lossy().into_owned())
    }
}

/// `<kind>-<message id><ext>`, keeping only filename-safe characters of the id.
fn file_name(message_id: &str, kind: MediaKind, extension: Option<&str>) -> String {
    let id: String = message_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    format!("{}-{id}{}", kind.as_str(), extension.unwrap_or_default())
}
