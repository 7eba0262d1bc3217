//! Cloudinary image upload client
//!
//! Uses the signed upload API: the request parameters (minus the file and
//! the api key) are sorted, joined as `k=v&k=v`, suffixed with the API secret,
//! and hashed with SHA-256.

use super::{MediaError, MediaStore, UploadFile, ALLOWED_FORMATS};
use async_trait::async_trait;
use netcc_core::MediaConfig;
use reqwest::{multipart, Client};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<UploadErrorBody>,
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    message: String,
}

/// Signed-upload client for Cloudinary
pub struct CloudinaryStore {
    client: Client,
    upload_url: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

impl CloudinaryStore {
    /// Build from config; all three credentials must be set
    pub fn from_config(config: &MediaConfig) -> Result<Self, MediaError> {
        let (Some(cloud_name), Some(api_key), Some(api_secret)) = (
            config.cloud_name.as_ref(),
            config.api_key.as_ref(),
            config.api_secret.as_ref(),
        ) else {
            return Err(MediaError::Upload(
                "Cloudinary credentials are not configured".to_string(),
            ));
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            upload_url: format!(
                "{}/{}/image/upload",
                config.api_base_url.trim_end_matches('/'),
                cloud_name
            ),
            api_key: api_key.clone(),
            api_secret: api_secret.clone(),
            folder: config.folder.clone(),
        })
    }

    /// Parameters that are both sent and signed
    fn signed_params(&self, timestamp: i64) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("allowed_formats", ALLOWED_FORMATS.join(","));
        params.insert("folder", self.folder.clone());
        params.insert("timestamp", timestamp.to_string());
        params
    }
}

/// Hex SHA-256 over the sorted `k=v` pairs followed by the secret
pub fn sign_params(params: &BTreeMap<&'static str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(&self, file: UploadFile) -> Result<String, MediaError> {
        let format = file.format()?;

        let params = self.signed_params(chrono::Utc::now().timestamp());
        let signature = sign_params(&params, &self.api_secret);

        let file_name = file
            .file_name
            .clone()
            .unwrap_or_else(|| format!("upload.{format}"));
        let mut part = multipart::Part::bytes(file.bytes).file_name(file_name);
        if let Some(content_type) = file.content_type.as_deref() {
            part = part.mime_str(content_type)?;
        }

        let mut form = multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        debug!(url = %self.upload_url, folder = %self.folder, "uploading image");

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| MediaError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            let message = body
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(MediaError::Upload(message));
        }

        body.secure_url
            .ok_or_else(|| MediaError::InvalidResponse("missing secure_url".to_string()))
    }
}
