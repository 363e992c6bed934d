//! File attachments for outgoing messages
//!
//! An attachment is uploaded to the workspace up front and then merged into
//! the next outgoing message as a short summary line. Text content is fetched
//! back through the preview endpoint for textual files only.

use crate::client::{ChatBackend, ExchangeError, FileUpload};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Input length (in characters) above which a paste becomes an attachment
pub const DEFAULT_PASTE_THRESHOLD: usize = 2000;

const FILE_ONLY_TEXT: &str = "File sent";
const PASTE_NOTICE: &str = "Long text converted to attached file";
const TEXT_EXTENSIONS: [&str; 3] = ["txt", "md", "json"];

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Upload(#[from] ExchangeError),
}

/// File artifact waiting to be merged into the next send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub byte_size: u64,
    pub mime_type: String,
    pub text_content: Option<String>,
    /// Server-side path returned by the upload
    pub storage_reference: String,
    pub is_content_readable: bool,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        byte_size: u64,
        mime_type: impl Into<String>,
        storage_reference: impl Into<String>,
        text_content: Option<String>,
    ) -> Self {
        let text_content = text_content.filter(|t| !t.is_empty());
        Self {
            name: name.into(),
            byte_size,
            mime_type: mime_type.into(),
            is_content_readable: text_content.is_some(),
            text_content,
            storage_reference: storage_reference.into(),
        }
    }

    /// One-line human-readable description, e.g. `📎 Attached file: a.md (1.5 KB)`
    #[allow(clippy::cast_precision_loss)] // display only
    pub fn summary(&self) -> String {
        let kb = self.byte_size as f64 / 1024.0;
        format!("📎 Attached file: {} ({kb:.1} KB)", self.name)
    }
}

/// Text sent (and recorded) for a turn, with the attachment summary appended
pub fn compose_message(text: &str, attachment: Option<&Attachment>) -> String {
    match attachment {
        None => text.to_string(),
        Some(attachment) => {
            let text = if text.is_empty() { FILE_ONLY_TEXT } else { text };
            format!("{text}\n\n{}", attachment.summary())
        }
    }
}

/// Whether a preview should be requested for this file
pub fn is_textual(name: &str, mime_type: &str) -> bool {
    if mime_type.starts_with("text/") {
        return true;
    }
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)))
}

fn guess_mime(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Upload raw bytes and build the attachment.
///
/// A failed preview only means the content is not readable; the upload
/// itself must succeed.
pub async fn attach_file<B: ChatBackend + ?Sized>(
    backend: &B,
    name: &str,
    bytes: Vec<u8>,
    mime_type: Option<&str>,
) -> Result<Attachment, AttachmentError> {
    let mime_type = mime_type.map_or_else(|| guess_mime(name), str::to_string);
    let byte_size = bytes.len() as u64;

    let receipt = backend
        .upload(FileUpload {
            name: name.to_string(),
            mime_type: mime_type.clone(),
            bytes,
        })
        .await?;

    let text_content = if is_textual(name, &mime_type) {
        match backend.preview(name).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "Could not read file content");
                None
            }
        }
    } else {
        None
    };

    let attachment = Attachment::new(name, byte_size, mime_type, receipt.saved_path, text_content);
    tracing::info!(
        file = %attachment.name,
        readable = attachment.is_content_readable,
        "File attached"
    );
    Ok(attachment)
}

/// Read a file from disk and attach it
pub async fn attach_path<B: ChatBackend + ?Sized>(
    backend: &B,
    path: &Path,
) -> Result<Attachment, AttachmentError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| AttachmentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy())
        .into_owned();
    attach_file(backend, &name, bytes, None).await
}

/// Result of converting an oversized paste into an attachment
#[derive(Debug, Clone)]
pub struct PasteConversion {
    pub attachment: Attachment,
    /// What the input box should now contain
    pub replacement_input: String,
}

/// Convert a paste into an uploaded text file when the resulting input would
/// exceed `threshold` characters. Returns `None` when the paste fits.
pub async fn attach_paste<B: ChatBackend + ?Sized>(
    backend: &B,
    current_input: &str,
    pasted: &str,
    threshold: usize,
) -> Result<Option<PasteConversion>, AttachmentError> {
    let combined = current_input.chars().count() + pasted.chars().count();
    if combined <= threshold {
        return Ok(None);
    }

    let name = format!("pasted_text_{}.txt", chrono::Utc::now().timestamp_millis());
    let byte_size = pasted.len() as u64;
    let receipt = backend
        .upload(FileUpload {
            name: name.clone(),
            mime_type: "text/plain".to_string(),
            bytes: pasted.as_bytes().to_vec(),
        })
        .await?;

    tracing::info!(file = %name, chars = combined, "Long text converted to file");
    Ok(Some(PasteConversion {
        attachment: Attachment::new(
            name,
            byte_size,
            "text/plain",
            receipt.saved_path,
            Some(pasted.to_string()),
        ),
        replacement_input: PASTE_NOTICE.to_string(),
    }))
}
