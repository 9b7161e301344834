use chrono::Utc;
use futures::future::join_all;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ColorType};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::storage::{key_from_url, object_key, ObjectStore, StorageError};
use crate::config::StorageConfig;
use crate::models::ApiResult;
use crate::utils::multipart::UploadedFile;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("{0} is not an image")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Resize to a fixed width and re-encode as JPEG
#[derive(Debug, Clone, Copy)]
pub struct ImageProcessor {
    width: u32,
    quality: u8,
}

impl ImageProcessor {
    pub fn new(width: u32, quality: u8) -> Self {
        Self {
            width: width.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    /// Decode `bytes`, scale to the configured width keeping the aspect ratio
    /// and return the JPEG encoding
    pub fn process(&self, bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
        let img = image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;
        let rgb = img.resize(self.width, u32::MAX, FilterType::Lanczos3).to_rgb8();

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| ImageError::Encode(e.to_string()))?;

        Ok(out)
    }
}

fn ensure_image(file: &UploadedFile) -> Result<(), ImageError> {
    let declared = file
        .content_type
        .as_deref()
        .map(|ct| ct.starts_with("image/"))
        .unwrap_or(false);

    if declared || image::guess_format(&file.bytes).is_ok() {
        Ok(())
    } else {
        Err(ImageError::UnsupportedFormat(file.file_name.clone()))
    }
}

/// Image uploads and deletions against the object store
#[derive(Clone)]
pub struct MediaStore {
    store: Arc<dyn ObjectStore>,
    processor: ImageProcessor,
    upload_folder: String,
    public_base_url: String,
}

impl MediaStore {
    pub fn new(store: Arc<dyn ObjectStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            processor: ImageProcessor::new(config.image_width, config.jpeg_quality),
            upload_folder: config.upload_folder.clone(),
            public_base_url: config.public_base_url(),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Process and upload one image, returning its public URL
    pub async fn upload_image(&self, file: &UploadedFile) -> ApiResult<String> {
        ensure_image(file)?;

        let processor = self.processor;
        let bytes = file.bytes.clone();
        let jpeg = tokio::task::spawn_blocking(move || processor.process(&bytes)).await??;

        let key = object_key(
            &self.upload_folder,
            Utc::now().timestamp_millis(),
            &file.file_name,
        );
        self.store.put_object(&key, jpeg, "image/jpeg").await?;

        info!(key = %key, field = %file.field, "Image uploaded");
        Ok(self.public_url(&key))
    }

    /// Upload several images; on failure the ones already stored are removed
    pub async fn upload_images(&self, files: &[UploadedFile]) -> ApiResult<Vec<String>> {
        let mut urls = Vec::with_capacity(files.len());

        for file in files {
            match self.upload_image(file).await {
                Ok(url) => urls.push(url),
                Err(e) => {
                    self.discard(&urls).await;
                    return Err(e);
                }
            }
        }

        Ok(urls)
    }

    pub async fn delete_url(&self, url: &str) -> Result<(), StorageError> {
        let key = key_from_url(url, &self.public_base_url)?;
        self.store.delete_object(&key).await
    }

    /// Best-effort removal; failures are logged and swallowed
    pub async fn discard(&self, urls: &[String]) {
        join_all(urls.iter().map(|url| async move {
            if let Err(e) = self.delete_url(url).await {
                warn!(url = %url, error = %e, "Failed to delete stored image");
            }
        }))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::MockObjectStore;
    use bytes::Bytes;
    use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb([200u8, 30, 30]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn upload(name: &str, content_type: &str, bytes: Vec<u8>) -> UploadedFile {
        UploadedFile {
            field: "image".into(),
            file_name: name.into(),
            content_type: Some(content_type.into()),
            bytes: Bytes::from(bytes),
        }
    }

    fn config() -> StorageConfig {
        StorageConfig {
            bucket: "assets".into(),
            region: "blr1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_process_resizes_to_width() {
        let jpeg = ImageProcessor::new(800, 80).process(&png(1600, 400)).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 200));
        assert_eq!(image::guess_format(&jpeg).unwrap(), image::ImageFormat::Jpeg);
    }

    #[test]
    fn test_process_rejects_garbage() {
        let err = ImageProcessor::new(800, 80).process(b"definitely not an image");
        assert!(matches!(err, Err(ImageError::Decode(_))));
    }

    #[test]
    fn test_ensure_image() {
        assert!(ensure_image(&upload("a.txt", "text/plain", b"hello".to_vec())).is_err());
        assert!(ensure_image(&upload("a.png", "application/octet-stream", png(2, 2))).is_ok());
    }

    #[tokio::test]
    async fn test_upload_image_returns_public_url() {
        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .withf(|key, _body, content_type| {
                key.starts_with("uploads/") && key.ends_with("-front-view.png")
                    && content_type.starts_with("image/jpeg")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let media = MediaStore::new(Arc::new(store), &config());
        let url = media
            .upload_image(&upload("Front View.png", "image/png", png(10, 10)))
            .await
            .unwrap();

        assert!(url.starts_with("https://assets.blr1.digitaloceanspaces.com/uploads/"));
    }

    #[tokio::test]
    async fn test_upload_images_cleans_up_on_failure() {
        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .times(1)
            .returning(|_, _, _| Ok(()));
        store
            .expect_delete_object()
            .withf(|key| key.starts_with("uploads/"))
            .times(1)
            .returning(|_| Ok(()));

        let media = MediaStore::new(Arc::new(store), &config());
        let files = vec![
            upload("one.png", "image/png", png(4, 4)),
            upload("notes.txt", "text/plain", b"plain text".to_vec()),
        ];

        assert!(media.upload_images(&files).await.is_err());
    }
}
