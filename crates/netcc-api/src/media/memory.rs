use super::{MediaError, MediaStore, UploadFile};
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-process media store returning `memory://` URLs
#[derive(Debug)]
pub struct MemoryMediaStore {
    folder: String,
    uploads: Mutex<Vec<String>>,
}

impl MemoryMediaStore {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// URLs handed out so far, in upload order
    pub async fn uploads(&self) -> Vec<String> {
        self.uploads.lock().await.clone()
    }
}

impl Default for MemoryMediaStore {
    fn default() -> Self {
        Self::new(netcc_core::MediaConfig::default().folder)
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, file: UploadFile) -> Result<String, MediaError> {
        let format = file.format()?;
        let url = format!("memory://{}/{}.{}", self.folder, Uuid::new_v4(), format);
        self.uploads.lock().await.push(url.clone());
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_records_url() {
        let store = MemoryMediaStore::default();
        let url = store
            .upload(UploadFile {
                file_name: Some("cover.png".to_string()),
                content_type: Some("image/png".to_string()),
                bytes: vec![1, 2, 3],
            })
            .await
            .unwrap();

        assert!(url.starts_with("memory://netcc_comics/"));
        assert!(url.ends_with(".png"));
        assert_eq!(store.uploads().await, vec![url]);
    }

    #[tokio::test]
    async fn test_rejected_upload_is_not_recorded() {
        let store = MemoryMediaStore::new("test");
        let result = store
            .upload(UploadFile {
                file_name: Some("notes.txt".to_string()),
                content_type: None,
                bytes: vec![],
            })
            .await;

        assert!(result.is_err());
        assert!(store.uploads().await.is_empty());
    }
}
