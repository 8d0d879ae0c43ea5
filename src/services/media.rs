use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5 MB

/// Storage hints passed to the media collaborator. The local store keeps
/// originals; the transformation hints are honored by the image CDN in
/// front of `/uploads`.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub folder: &'static str,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub gravity: Option<&'static str>,
    pub crop: Option<&'static str>,
}

impl UploadOptions {
    pub fn media() -> Self {
        Self {
            folder: "lms",
            width: None,
            height: None,
            gravity: None,
            crop: None,
        }
    }

    /// Avatars are cropped square around the face.
    pub fn avatar() -> Self {
        Self {
            width: Some(250),
            height: Some(250),
            gravity: Some("faces"),
            crop: Some("fill"),
            ..Self::media()
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub public_id: String,
    pub secure_url: String,
}

/// Media upload boundary: takes a staged local file, returns the stored
/// identity. The caller owns the staged file and removes it afterwards
/// with [`discard_staged`], whatever the outcome here.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, local_path: &Path, options: &UploadOptions) -> AppResult<StoredMedia>;
    async fn delete(&self, public_id: &str) -> AppResult<()>;
}

#[derive(Clone)]
pub struct MediaConfig {
    pub upload_dir: String,
}

impl MediaConfig {
    pub fn from_env() -> Self {
        Self {
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
        }
    }

    /// Incoming multipart payloads land here before the store accepts them.
    pub fn staging_dir(&self) -> PathBuf {
        Path::new(&self.upload_dir).join("tmp")
    }
}

/// Identify an image by magic bytes; returns the file extension.
fn detect_image_format(data: &[u8]) -> Option<&'static str> {
    if data.len() >= 3 && data[..3] == [0xFF, 0xD8, 0xFF] {
        return Some("jpg");
    }
    if data.len() >= 4 && data[..4] == [0x89, 0x50, 0x4E, 0x47] {
        return Some("png");
    }
    if data.len() >= 4 && data[..4] == [0x47, 0x49, 0x46, 0x38] {
        return Some("gif");
    }
    if data.len() >= 12
        && data[..4] == [0x52, 0x49, 0x46, 0x46]
        && data[8..12] == [0x57, 0x45, 0x42, 0x50]
    {
        return Some("webp");
    }
    None
}

/// Disk-backed media store serving files under `/uploads`.
pub struct LocalMediaStore {
    config: MediaConfig,
}

impl LocalMediaStore {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, local_path: &Path, options: &UploadOptions) -> AppResult<StoredMedia> {
        let data = fs::read(local_path)
            .await
            .map_err(|e| AppError::Upload(format!("failed to read staged file: {e}")))?;

        if data.len() > MAX_FILE_SIZE {
            return Err(AppError::PayloadTooLarge);
        }

        let ext = detect_image_format(&data).ok_or_else(|| {
            AppError::Validation(
                "Unsupported file type. Allowed: jpeg, png, gif, webp".to_string(),
            )
        })?;

        let filename = format!("{}.{}", Uuid::new_v4(), ext);
        let dir = Path::new(&self.config.upload_dir).join(options.folder);

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Upload(format!("failed to create media directory: {e}")))?;

        fs::write(dir.join(&filename), &data)
            .await
            .map_err(|e| AppError::Upload(format!("failed to write file: {e}")))?;

        let public_id = format!("{}/{}", options.folder, filename);
        Ok(StoredMedia {
            secure_url: format!("/uploads/{public_id}"),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> AppResult<()> {
        if public_id.contains("..") {
            return Err(AppError::Validation("Invalid media id".to_string()));
        }

        let path = Path::new(&self.config.upload_dir).join(public_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Upload(format!("failed to delete media: {e}"))),
        }
    }
}

/// Write an incoming multipart payload to the staging area and return
/// its path.
pub async fn stage_upload(config: &MediaConfig, data: &[u8]) -> AppResult<PathBuf> {
    if data.len() > MAX_FILE_SIZE {
        return Err(AppError::PayloadTooLarge);
    }

    let dir = config.staging_dir();
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Upload(format!("failed to create staging directory: {e}")))?;

    let path = dir.join(format!("{}.upload", Uuid::new_v4()));
    fs::write(&path, data)
        .await
        .map_err(|e| AppError::Upload(format!("failed to stage upload: {e}")))?;

    Ok(path)
}

/// Remove a staged file. Cleanup is log-and-continue, never surfaced.
pub async fn discard_staged(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to remove staged upload {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn temp_config() -> MediaConfig {
        MediaConfig {
            upload_dir: std::env::temp_dir()
                .join(format!("lms-media-{}", Uuid::new_v4()))
                .to_string_lossy()
                .into_owned(),
        }
    }

    #[test]
    fn jpeg_magic_bytes_detected() {
        assert_eq!(
            detect_image_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]),
            Some("jpg")
        );
    }

    #[test]
    fn png_magic_bytes_detected() {
        assert_eq!(detect_image_format(PNG), Some("png"));
    }

    #[test]
    fn gif_magic_bytes_detected() {
        assert_eq!(
            detect_image_format(&[0x47, 0x49, 0x46, 0x38, 0x39, 0x61]),
            Some("gif")
        );
    }

    #[test]
    fn webp_magic_bytes_detected() {
        let data = [
            0x52, 0x49, 0x46, 0x46, // RIFF
            0x00, 0x00, 0x00, 0x00, // size
            0x57, 0x45, 0x42, 0x50, // WEBP
        ];
        assert_eq!(detect_image_format(&data), Some("webp"));
    }

    #[test]
    fn unknown_or_short_data_rejected() {
        assert_eq!(detect_image_format(&[]), None);
        assert_eq!(detect_image_format(&[0xFF, 0xD8]), None);
        assert_eq!(detect_image_format(b"%PDF-1.4"), None);
    }

    #[tokio::test]
    async fn stage_upload_and_store_round_trip() {
        let config = temp_config();
        let store = LocalMediaStore::new(config.clone());

        let staged = stage_upload(&config, PNG).await.unwrap();
        assert!(staged.exists());

        let stored = store
            .upload(&staged, &UploadOptions::avatar())
            .await
            .unwrap();
        assert!(stored.public_id.starts_with("lms/"));
        assert!(stored.public_id.ends_with(".png"));
        assert_eq!(stored.secure_url, format!("/uploads/{}", stored.public_id));

        discard_staged(&staged).await;
        assert!(!staged.exists());

        store.delete(&stored.public_id).await.unwrap();
        // Deleting again is fine.
        store.delete(&stored.public_id).await.unwrap();
    }

    #[tokio::test]
    async fn upload_rejects_non_image_payload() {
        let config = temp_config();
        let store = LocalMediaStore::new(config.clone());

        let staged = stage_upload(&config, b"just text").await.unwrap();
        let err = store
            .upload(&staged, &UploadOptions::media())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        discard_staged(&staged).await;
    }

    #[tokio::test]
    async fn delete_rejects_path_traversal() {
        let store = LocalMediaStore::new(temp_config());
        let err = store.delete("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
