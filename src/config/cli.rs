use crate::core::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// 把報表寫到本機輸出目錄
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        Ok(tokio::fs::read(full_path).await?)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full_path, data).await?;
        tracing::debug!("💾 Wrote {} ({} bytes)", full_path.display(), data.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_output_directory() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("reports/2024-06"));

        storage.write_file("q1_population_mix.csv", b"Animal_Type\n").await.unwrap();

        let content = storage.read_file("q1_population_mix.csv").await.unwrap();
        assert_eq!(content, b"Animal_Type\n");
        assert!(storage.base_path().ends_with("reports/2024-06"));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        let result = storage.read_file("missing.csv").await;
        assert!(matches!(result, Err(crate::utils::error::ReportError::IoError(_))));
    }
}
