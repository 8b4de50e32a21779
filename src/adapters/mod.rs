// Adapters layer: concrete snapshot sources (local directory, HTTP export).

pub mod directory;
pub mod http;

pub use directory::DirectorySource;
pub use http::HttpSource;

use crate::core::{ConfigProvider, Result, SnapshotSource, TableName};
use std::time::Duration;

/// 依設定的位置選擇來源：`http://` 或 `https://` 開頭走 HTTP，其餘視為本機目錄
#[derive(Debug, Clone)]
pub enum ConfiguredSource {
    Directory(DirectorySource),
    Http(HttpSource),
}

impl ConfiguredSource {
    pub fn from_location(location: &str) -> Result<Self> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Ok(Self::Http(HttpSource::new(location)?))
        } else {
            Ok(Self::Directory(DirectorySource::new(location)))
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        match Self::from_location(config.source_location())? {
            Self::Http(source) => match config.source_timeout_seconds() {
                Some(seconds) => Ok(Self::Http(source.with_timeout(Duration::from_secs(seconds)))),
                None => Ok(Self::Http(source)),
            },
            directory => Ok(directory),
        }
    }
}

impl SnapshotSource for ConfiguredSource {
    fn describe(&self) -> String {
        match self {
            Self::Directory(source) => source.describe(),
            Self::Http(source) => source.describe(),
        }
    }

    async fn fetch_table(&self, table: TableName) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Directory(source) => source.fetch_table(table).await,
            Self::Http(source) => source.fetch_table(table).await,
        }
    }
}
