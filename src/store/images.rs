use std::path::PathBuf;

use super::{ImageStore, StoreError};
use crate::vision::ImageFormat;

/// Writes images to `{root}/disaster_images/{id}.{ext}` and serves them under
/// `{public_base}/disaster_images/{id}.{ext}`. The extension follows the sniffed
/// format; unrecognised bytes are kept as `.bin`.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    root: PathBuf,
    public_base: String,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    fn relative_path(disaster_id: &str, image: &[u8]) -> String {
        let ext = ImageFormat::sniff(image).map_or("bin", ImageFormat::extension);
        format!("disaster_images/{disaster_id}.{ext}")
    }
}

#[async_trait::async_trait]
impl ImageStore for FsImageStore {
    #[tracing::instrument(name = "store.image.put", skip(self, image), fields(image.bytes = image.len()))]
    async fn put(&self, disaster_id: &str, image: &[u8]) -> Result<String, StoreError> {
        let relative = Self::relative_path(disaster_id, image);
        let path = self.root.join(&relative);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, image).await?;

        Ok(format!("{}/{}", self.public_base, relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_writes_file_and_returns_public_url() {
        let root = std::env::temp_dir().join(format!("image-store-{}", uuid::Uuid::new_v4()));
        let store = FsImageStore::new(&root, "http://localhost:8080/images/");

        let url = store.put("u4pr_1700000000_ab12cd34", b"\xFF\xD8\xFFdata").await.unwrap();

        assert_eq!(
            url,
            "http://localhost:8080/images/disaster_images/u4pr_1700000000_ab12cd34.jpg"
        );
        let written = tokio::fs::read(root.join("disaster_images/u4pr_1700000000_ab12cd34.jpg"))
            .await
            .unwrap();
        assert_eq!(written, b"\xFF\xD8\xFFdata");

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_names_file_after_sniffed_format() {
        let root = std::env::temp_dir().join(format!("image-store-{}", uuid::Uuid::new_v4()));
        let store = FsImageStore::new(&root, "http://localhost:8080/images");
        let png = b"\x89PNG\r\n\x1a\ndata";

        let url = store.put("u4pr_1700000000_ab12cd34", png).await.unwrap();

        assert!(url.ends_with("/disaster_images/u4pr_1700000000_ab12cd34.png"));
        assert!(root.join("disaster_images/u4pr_1700000000_ab12cd34.png").exists());

        let url = store.put("u4pr_1700000001_ab12cd34", b"not an image").await.unwrap();
        assert!(url.ends_with("/disaster_images/u4pr_1700000001_ab12cd34.bin"));

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
