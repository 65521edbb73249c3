use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Byte storage for uploaded inputs and generated artifacts. Artifacts are
/// written once and never removed.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    /// Writes `content`, creating parent directories as needed.
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
}

pub struct NativeStorage;

impl NativeStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for NativeStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }
}

/// Builds a collision-resistant file name such as `manga_page_1a2b3c4d.png`.
pub fn unique_file_name(prefix: &str, extension: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}.{}", prefix, &id[..8], extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parent_directories() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("audio").join("nested").join("voice.mp3");
        let path_str = path.to_string_lossy().to_string();
        let storage = NativeStorage::new();

        assert!(!storage.exists(&path_str).await?);
        storage.write(&path_str, b"ID3").await?;
        assert!(storage.exists(&path_str).await?);
        assert_eq!(storage.read(&path_str).await?, b"ID3");
        Ok(())
    }

    #[test]
    fn test_unique_file_name_shape() {
        let a = unique_file_name("manga_page", "png");
        let b = unique_file_name("manga_page", "png");
        assert!(a.starts_with("manga_page_"));
        assert!(a.ends_with(".png"));
        assert_eq!(a.len(), "manga_page_".len() + 8 + ".png".len());
        assert_ne!(a, b);
    }
}
