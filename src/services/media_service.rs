// ==================== MEDIA HOSTING ====================
// ID cards, profile images, resumes and offer letters are pushed to a Cloudinary-style
// media host and only their URL is stored. Without credentials files stay in memory.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::CloudinaryConfig;
use crate::utils::UploadedFile;

const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug)]
pub enum MediaError {
    Request(String),
    Rejected { status: u16, body: String },
    InvalidResponse(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Request(e) => write!(f, "MediaError: request failed: {}", e),
            MediaError::Rejected { status, body } => {
                write!(f, "MediaError: upload rejected ({}): {}", status, body)
            }
            MediaError::InvalidResponse(e) => write!(f, "MediaError: invalid response: {}", e),
        }
    }
}

impl std::error::Error for MediaError {}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    pub url: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, file: UploadedFile, folder: &str) -> Result<StoredMedia, MediaError>;
}

#[derive(Debug, Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

pub struct CloudinaryClient {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Result<Self, MediaError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| MediaError::Request(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/auto/upload", CLOUDINARY_API_BASE, self.config.cloud_name)
    }
}

/// Signature over the sorted `key=value` pairs followed by the API secret.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);

    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl MediaStore for CloudinaryClient {
    async fn upload(&self, file: UploadedFile, folder: &str) -> Result<StoredMedia, MediaError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = [("folder", folder.to_string()), ("timestamp", timestamp.clone())];
        let signature = sign_params(&signed, &self.config.api_secret);

        log::info!("☁️  Uploading {} ({} bytes) to {}", file.file_name, file.bytes.len(), folder);

        let part = Part::bytes(file.bytes).file_name(file.file_name.clone());
        let part = match &file.content_type {
            Some(content_type) => part
                .mime_str(content_type)
                .map_err(|e| MediaError::Request(e.to_string()))?,
            None => part,
        };

        let form = Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .http
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| MediaError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let uploaded: CloudinaryUploadResponse = response
            .json()
            .await
            .map_err(|e| MediaError::InvalidResponse(e.to_string()))?;

        uploaded
            .secure_url
            .or(uploaded.url)
            .map(|url| StoredMedia { url })
            .ok_or_else(|| MediaError::InvalidResponse("response carried no URL".to_string()))
    }
}

/// Holds uploads in process memory and hands out `memory://` URLs.
#[derive(Default)]
pub struct MemoryMediaStore {
    objects: Mutex<HashMap<String, UploadedFile>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<UploadedFile> {
        self.objects.lock().ok()?.get(url).cloned()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, file: UploadedFile, folder: &str) -> Result<StoredMedia, MediaError> {
        let url = format!(
            "memory://{}/{}-{}",
            folder,
            uuid::Uuid::new_v4(),
            file.file_name
        );
        log::info!("🗂️  [media disabled] stored {} as {}", file.file_name, url);
        self.objects
            .lock()
            .map_err(|_| MediaError::Request("memory media lock poisoned".to_string()))?
            .insert(url.clone(), file);
        Ok(StoredMedia { url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_order_independent() {
        let a = sign_params(
            &[("timestamp", "1700000000".into()), ("folder", "idCards".into())],
            "secret",
        );
        let b = sign_params(
            &[("folder", "idCards".into()), ("timestamp", "1700000000".into())],
            "secret",
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut hasher = Sha256::new();
        hasher.update(b"folder=idCards&timestamp=1700000000secret");
        assert_eq!(a, format!("{:x}", hasher.finalize()));

        assert_ne!(a, sign_params(&[("folder", "idCards".into())], "other"));
    }

    #[test]
    fn test_upload_url() {
        let client = CloudinaryClient::new(CloudinaryConfig {
            cloud_name: "demo".into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
        })
        .unwrap();
        assert_eq!(
            client.upload_url(),
            "https://api.cloudinary.com/v1_1/demo/auto/upload"
        );
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryMediaStore::new();
        let file = UploadedFile {
            file_name: "card.png".into(),
            content_type: Some("image/png".into()),
            bytes: vec![1, 2, 3],
        };

        let stored = store.upload(file, "idCards").await.unwrap();
        assert!(stored.url.starts_with("memory://idCards/"));
        assert!(stored.url.ends_with("-card.png"));
        assert_eq!(store.get(&stored.url).unwrap().bytes, vec![1, 2, 3]);
    }
}
