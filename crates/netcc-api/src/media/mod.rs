//! Image hosting for comic thumbnails and chapter episodes
//!
//! `MediaStore` takes an uploaded image and returns the public URL it is
//! served from. `CloudinaryStore` talks to the hosted service;
//! `MemoryMediaStore` keeps uploads in process for development and tests.

pub mod cloudinary;
pub mod memory;

pub use cloudinary::CloudinaryStore;
pub use memory::MemoryMediaStore;

use async_trait::async_trait;
use thiserror::Error;

/// Image formats accepted for upload
pub const ALLOWED_FORMATS: &[&str] = &["jpg", "png", "jpeg"];

/// Media upload errors
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Unsupported image format: {0} (allowed: jpg, png, jpeg)")]
    UnsupportedFormat(String),

    #[error("Upload rejected: {0}")]
    Upload(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid upload response: {0}")]
    InvalidResponse(String),
}

/// A file received from a multipart request
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Image format of the file, from its extension or else its content type
    pub fn format(&self) -> Result<&'static str, MediaError> {
        if let Some(ext) = self
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
        {
            return ALLOWED_FORMATS
                .iter()
                .copied()
                .find(|allowed| *allowed == ext)
                .ok_or(MediaError::UnsupportedFormat(ext));
        }

        match self.content_type.as_deref() {
            Some("image/jpeg") | Some("image/jpg") => Ok("jpg"),
            Some("image/png") => Ok("png"),
            Some(other) => Err(MediaError::UnsupportedFormat(other.to_string())),
            None => Err(MediaError::UnsupportedFormat("unknown".to_string())),
        }
    }
}

/// Storage backend for uploaded images
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store the image and return its public URL
    async fn upload(&self, file: UploadFile) -> Result<String, MediaError>;
}
