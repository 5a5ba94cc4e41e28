pub mod share_link;

pub use share_link::{direct_download_url, extract_file_id, ShareLinkFetcher, TempAttachment};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Attachment resolution errors
#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("Attachment not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid share link format: {0}")]
    InvalidLinkFormat(String),

    #[error("Invalid download endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("Failed to download (status {0})")]
    DownloadFailed(reqwest::StatusCode),

    #[error("Download request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("A display filename can only be given for a single attachment, got {0}")]
    AmbiguousDisplayName(usize),

    #[error("Attachment I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AttachmentResult<T> = Result<T, AttachmentError>;

/// A file to attach and the filename shown to the recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub file_path: PathBuf,
    pub display_filename: String,
}

impl AttachmentRef {
    /// Attach `path` under its own file name
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let file_path = path.into();
        let display_filename = file_name_of(&file_path);
        Self {
            file_path,
            display_filename,
        }
    }

    /// Present the attachment to the recipient under a different name
    pub fn with_display_filename(mut self, name: impl Into<String>) -> Self {
        self.display_filename = name.into();
        self
    }

    /// MIME type inferred from the display filename's extension
    pub fn mime_type(&self) -> &'static str {
        let extension = Path::new(&self.display_filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => "application/pdf",
            Some("doc") => "application/msword",
            Some("docx") => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Some("txt") => "text/plain",
            _ => "application/octet-stream",
        }
    }

    /// Read the attachment contents into memory
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.file_path)
    }
}

/// Check that every local attachment exists before anything is sent.
///
/// `display_name` renames the attachment shown to recipients and is only
/// accepted when exactly one path is given.
pub fn resolve_local(
    paths: &[PathBuf],
    display_name: Option<&str>,
) -> AttachmentResult<Vec<AttachmentRef>> {
    if display_name.is_some() && paths.len() != 1 {
        return Err(AttachmentError::AmbiguousDisplayName(paths.len()));
    }

    let mut attachments = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.is_file() {
            return Err(AttachmentError::NotFound(path.clone()));
        }

        let mut attachment = AttachmentRef::new(path.clone());
        if let Some(name) = display_name {
            attachment = attachment.with_display_filename(name);
        }
        attachments.push(attachment);
    }

    Ok(attachments)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}
