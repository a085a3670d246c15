/// Draft and staged-file persistence across popup teardowns
///
/// The popup is destroyed whenever it loses focus, e.g. when the file picker
/// window opens. The draft keeps the typed fields; the staged file keeps the
/// chosen attachment, written by the picker window. Both live in the local
/// area. A marker in the session area (wiped by the browser on restart) tells
/// whether a staged file belongs to the current browser session.

use crate::config::Priority;
use crate::request::Attachment;
use crate::storage::{KeyValueStore, StorageError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const KEY_STORED_FILE: &str = "storedFile";
pub const KEY_DRAFT: &str = "draftState";
pub const KEY_SESSION_ACTIVE: &str = "sessionActive";

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum StagingError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("staged file `{0}` has no base64 payload")]
    MalformedPayload(String),
    #[error("staged file `{name}` could not be decoded: {reason}")]
    Decode { name: String, reason: String },
}

/// Unsent form fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

/// Attachment waiting to be sent, stored as a data URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedFile {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    pub size: u64,
    pub data: String,
}

impl StagedFile {
    pub fn from_bytes(name: &str, mime_type: &str, bytes: &[u8]) -> StagedFile {
        let media_type = if mime_type.is_empty() { FALLBACK_MIME } else { mime_type };
        StagedFile {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: bytes.len() as u64,
            data: format!("data:{};base64,{}", media_type, STANDARD.encode(bytes)),
        }
    }

    /// Decode the payload after the data URL's comma
    pub fn bytes(&self) -> Result<Vec<u8>, StagingError> {
        let (_, payload) = self
            .data
            .split_once(',')
            .ok_or_else(|| StagingError::MalformedPayload(self.name.clone()))?;

        STANDARD.decode(payload.trim()).map_err(|e| StagingError::Decode {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }

    pub fn to_attachment(&self) -> Result<Attachment, StagingError> {
        Ok(Attachment {
            filename: self.name.clone(),
            bytes: self.bytes()?,
        })
    }

    pub fn display_size(&self) -> String {
        format_file_size(self.size)
    }
}

/// Human-readable size: `B` below 1 KiB, then `KB`/`MB` with one decimal
pub fn format_file_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;

    if bytes < KIB {
        format!("{} B", bytes)
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    }
}

/// Single-slot draft and staged-file storage
pub struct Staging<L, S> {
    local: L,
    session: S,
}

impl<L: KeyValueStore, S: KeyValueStore> Staging<L, S> {
    pub fn new(local: L, session: S) -> Self {
        Staging { local, session }
    }

    /// Overwrite the current draft
    pub async fn save_draft(&self, draft: &Draft) -> Result<(), StagingError> {
        self.local.set(KEY_DRAFT, draft).await?;
        Ok(())
    }

    /// Return the draft and remove it, so it is restored at most once
    pub async fn load_and_clear_draft(&self) -> Result<Option<Draft>, StagingError> {
        let draft = match self.local.get::<Draft>(KEY_DRAFT).await {
            Ok(draft) => draft,
            Err(StorageError::Serde { reason, .. }) => {
                log::warn!("Discarding unreadable draft: {}", reason);
                None
            }
            Err(e) => return Err(e.into()),
        };

        self.local.remove(KEY_DRAFT).await?;
        Ok(draft)
    }

    pub async fn clear_draft(&self) -> Result<(), StagingError> {
        self.local.remove(KEY_DRAFT).await?;
        Ok(())
    }

    /// Arm the session marker. On the first call after a browser restart the
    /// marker is missing: any staged file left over is discarded and `true`
    /// is returned.
    pub async fn ensure_session(&self) -> Result<bool, StagingError> {
        let active: Option<bool> = self.session.get(KEY_SESSION_ACTIVE).await?;
        if active == Some(true) {
            return Ok(false);
        }

        log::info!("New browser session detected, discarding staged file");
        self.local.remove(KEY_STORED_FILE).await?;
        self.session.set(KEY_SESSION_ACTIVE, &true).await?;
        Ok(true)
    }

    /// Stage an attachment, replacing any previous one
    pub async fn stage_file(
        &self,
        bytes: &[u8],
        name: &str,
        mime_type: &str,
    ) -> Result<StagedFile, StagingError> {
        // A file staged before the marker exists would be wiped by the next check
        self.ensure_session().await?;

        let file = StagedFile::from_bytes(name, mime_type, bytes);
        self.local.set(KEY_STORED_FILE, &file).await?;
        log::debug!("Staged {} ({})", file.name, file.display_size());
        Ok(file)
    }

    pub async fn load_staged_file(&self) -> Result<Option<StagedFile>, StagingError> {
        self.ensure_session().await?;
        Ok(self.local.get(KEY_STORED_FILE).await?)
    }

    /// No-op when nothing is staged
    pub async fn clear_staged_file(&self) -> Result<(), StagingError> {
        self.local.remove(KEY_STORED_FILE).await?;
        Ok(())
    }

    /// Drop everything tied to a notification that was just sent
    pub async fn clear_after_send(&self) -> Result<(), StagingError> {
        self.clear_staged_file().await?;
        self.clear_draft().await
    }
}
