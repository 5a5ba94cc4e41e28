use crate::attachments::{AttachmentError, AttachmentRef, AttachmentResult};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

/// Direct-download endpoint for public share links
pub const DEFAULT_DOWNLOAD_ENDPOINT: &str = "https://drive.google.com/uc";

/// On-disk name of a downloaded attachment inside its temporary directory
const DOWNLOAD_FILENAME: &str = "resume.pdf";

/// Pull the resource identifier out of a share link.
///
/// Accepts `...?id=<ID>&...` and `.../d/<ID>/...` shapes.
pub fn extract_file_id(link: &str) -> AttachmentResult<String> {
    let id = if let Some((_, rest)) = link.split_once("id=") {
        rest.split('&').next()
    } else if let Some((_, rest)) = link.split_once("/d/") {
        rest.split(['/', '?', '#']).next()
    } else {
        None
    };

    match id {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(AttachmentError::InvalidLinkFormat(link.to_string())),
    }
}

/// Build the direct-download URL for a resource identifier
pub fn direct_download_url(endpoint: &str, file_id: &str) -> AttachmentResult<Url> {
    let url = Url::parse_with_params(endpoint, &[("export", "download"), ("id", file_id)])?;
    Ok(url)
}

/// A downloaded attachment that lives only as long as this guard.
///
/// The file and its temporary directory are removed on drop, whichever way
/// the run ends.
#[derive(Debug)]
pub struct TempAttachment {
    attachment: AttachmentRef,
    dir: TempDir,
}

impl TempAttachment {
    pub fn attachment(&self) -> &AttachmentRef {
        &self.attachment
    }

    pub fn path(&self) -> &Path {
        &self.attachment.file_path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

impl Drop for TempAttachment {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.attachment.file_path) {
            Ok(()) => tracing::debug!(
                "Removed temporary attachment {}",
                self.attachment.file_path.display()
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove temporary attachment {}: {}",
                self.attachment.file_path.display(),
                e
            ),
        }
    }
}

/// Fetches a single file from a public share link
#[derive(Debug, Clone)]
pub struct ShareLinkFetcher {
    client: reqwest::Client,
    endpoint: String,
    display_filename: String,
}

impl ShareLinkFetcher {
    /// Create a fetcher that presents the download as `display_filename`
    pub fn new(display_filename: impl Into<String>) -> AttachmentResult<Self> {
        Self::with_timeout(display_filename, Duration::from_secs(60))
    }

    pub fn with_timeout(
        display_filename: impl Into<String>,
        timeout: Duration,
    ) -> AttachmentResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: DEFAULT_DOWNLOAD_ENDPOINT.to_string(),
            display_filename: display_filename.into(),
        })
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Point the fetcher at a different direct-download endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Download the file behind `link` into a fresh temporary directory
    pub async fn fetch(&self, link: &str) -> AttachmentResult<TempAttachment> {
        let file_id = extract_file_id(link)?;
        let url = direct_download_url(&self.endpoint, &file_id)?;

        tracing::info!("Downloading attachment from share link (id {})", file_id);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!("Share link download returned status {}", status);
            return Err(AttachmentError::DownloadFailed(status));
        }

        let bytes = response.bytes().await?;

        let dir = tempfile::Builder::new().prefix("recruiter-mailer").tempdir()?;
        let file_path = dir.path().join(DOWNLOAD_FILENAME);
        tokio::fs::write(&file_path, &bytes).await?;

        tracing::info!(
            "Attachment downloaded: {} ({} bytes)",
            file_path.display(),
            bytes.len()
        );

        Ok(TempAttachment {
            attachment: AttachmentRef::new(file_path)
                .with_display_filename(self.display_filename.clone()),
            dir,
        })
    }
}
