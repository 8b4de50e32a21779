use crate::core::{Result, SnapshotSource, TableName};
use std::io::ErrorKind;
use std::path::PathBuf;

/// 本機目錄中的快照，每張表一個 CSV 檔
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SnapshotSource for DirectorySource {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    async fn fetch_table(&self, table: TableName) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(table.file_name());
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
