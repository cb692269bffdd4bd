use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::message::{Attachment, AttachmentSource};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("cannot read attachment: {0}")]
    Read(String),
    #[error("upload request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upload endpoint returned HTTP {0}")]
    Status(u16),
    #[error("upload endpoint returned {got} urls for {expected} files")]
    CountMismatch { expected: usize, got: usize },
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    urls: Vec<String>,
}

/// Publishes attachments so the prompt can reference them by URL.
#[derive(Debug, Clone)]
pub enum Uploader {
    Remote { endpoint: String, client: reqwest::Client },
    Local,
}

impl Uploader {
    pub fn new(endpoint: Option<String>) -> Self {
        match endpoint.filter(|e| !e.trim().is_empty()) {
            Some(endpoint) => {
                let client = reqwest::Client::builder()
                    .timeout(UPLOAD_TIMEOUT)
                    .build()
                    .unwrap_or_else(|e| {
                        tracing::warn!("cannot build upload client ({e}); using default client");
                        reqwest::Client::new()
                    });
                Uploader::Remote { endpoint, client }
            }
            None => Uploader::Local,
        }
    }

    /// Assigns a URL to every attachment. Remote failures fall back to local URLs.
    pub async fn publish(&self, attachments: &mut [Attachment]) {
        if attachments.is_empty() {
            return;
        }

        if let Uploader::Remote { endpoint, client } = self {
            match upload(client, endpoint, attachments).await {
                Ok(urls) => {
                    for (file, url) in attachments.iter_mut().zip(urls) {
                        file.url = Some(url);
                    }
                    return;
                }
                Err(e) => tracing::warn!(%endpoint, "upload failed, keeping attachments local: {e}"),
            }
        }

        for file in attachments.iter_mut() {
            file.url = Some(local_url(file));
        }
    }
}

async fn upload(client: &reqwest::Client, endpoint: &str, attachments: &[Attachment]) -> Result<Vec<String>, UploadError> {
    let mut form = Form::new();
    for file in attachments {
        let bytes = file
            .read_bytes()
            .await
            .map_err(|e| UploadError::Read(format!("{e:#}")))?;
        let part = Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?;
        form = form.part("files", part);
    }

    tracing::debug!(count = attachments.len(), %endpoint, "uploading attachments");

    let response = client.post(endpoint).multipart(form).send().await?;
    if !response.status().is_success() {
        return Err(UploadError::Status(response.status().as_u16()));
    }

    let body: UploadResponse = response.json().await?;
    if body.urls.len() != attachments.len() {
        return Err(UploadError::CountMismatch {
            expected: attachments.len(),
            got: body.urls.len(),
        });
    }
    Ok(body.urls)
}

/// A URL that needs no network: the file itself, or its bytes inlined.
pub fn local_url(file: &Attachment) -> String {
    match &file.source {
        AttachmentSource::Path(path) => {
            let absolute = std::path::absolute(path).unwrap_or_else(|_| path.clone());
            format!("file://{}", absolute.display())
        }
        AttachmentSource::Bytes(bytes) => {
            format!("data:{};base64,{}", file.mime_type, STANDARD.encode(bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_blank_endpoint_means_local() {
        assert!(matches!(Uploader::new(None), Uploader::Local));
        assert!(matches!(Uploader::new(Some("  ".to_string())), Uploader::Local));
        assert!(matches!(
            Uploader::new(Some("http://localhost:9/upload".to_string())),
            Uploader::Remote { .. }
        ));
    }

    #[test]
    fn test_local_url_for_bytes_is_data_url() {
        let file = Attachment::from_bytes("hi.txt", b"hi".to_vec());
        assert_eq!(local_url(&file), "data:text/plain;base64,aGk=");
    }

    #[test]
    fn test_local_url_for_path_is_file_url() {
        let file = Attachment {
            name: "x.bin".to_string(),
            mime_type: "application/octet-stream".to_string(),
            size: 0,
            source: AttachmentSource::Path(PathBuf::from("/tmp/x.bin")),
            url: None,
        };
        assert_eq!(local_url(&file), "file:///tmp/x.bin");
    }

    #[tokio::test]
    async fn test_local_publish_sets_every_url() {
        let mut files = vec![
            Attachment::from_bytes("a.txt", b"a".to_vec()),
            Attachment::from_bytes("b.txt", b"b".to_vec()),
        ];
        Uploader::Local.publish(&mut files).await;
        assert!(files.iter().all(|f| f.url.as_deref().is_some_and(|u| u.starts_with("data:text/plain"))));
    }
}
