use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: MessageId,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Local>,
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// Clock time shown under the bubble.
    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M").to_string()
    }
}

/// Where an attachment's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub source: AttachmentSource,
    /// Set once the uploader has published the file.
    pub url: Option<String>,
}

impl Attachment {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        Attachment {
            mime_type: guess_mime(&name),
            size: bytes.len() as u64,
            name,
            source: AttachmentSource::Bytes(bytes),
            url: None,
        }
    }

    /// Builds a path-backed attachment from file metadata; the content is read at upload time.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("cannot stat {}", path.display()))?;
        if !metadata.is_file() {
            anyhow::bail!("{} is not a regular file", path.display());
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Attachment {
            mime_type: guess_mime(&name),
            size: metadata.len(),
            name,
            source: AttachmentSource::Path(path.to_path_buf()),
            url: None,
        })
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.source {
            AttachmentSource::Bytes(bytes) => Ok(bytes.clone()),
            AttachmentSource::Path(path) => tokio::fs::read(path)
                .await
                .with_context(|| format!("cannot read {}", path.display())),
        }
    }

    /// URL the completion endpoint can fetch; local `file:`/`data:` references stay on this side.
    pub fn remote_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .filter(|url| url.starts_with("https://") || url.starts_with("http://"))
    }

    /// One line of the textual description sent with the prompt.
    pub fn describe(&self) -> String {
        let mut line = format!("{} ({}, {})", self.name, self.mime_type, format_size(self.size));
        if let Some(url) = self.remote_url() {
            line.push_str(&format!(" at {url}"));
        }
        line
    }
}

fn guess_mime(name: &str) -> String {
    mime_guess::from_path(name)
        .first_raw()
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}

pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} bytes")
    }
}
