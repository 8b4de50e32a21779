use crate::core::queries::QueryParams;
use crate::domain::model::{Snapshot, TableName};
use crate::domain::report::ReportSet;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 快照來源；來源沒有某張表時回傳 `Ok(None)`，而不是錯誤
pub trait SnapshotSource: Send + Sync {
    fn describe(&self) -> String;
    fn fetch_table(
        &self,
        table: TableName,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn source_location(&self) -> &str;
    fn source_timeout_seconds(&self) -> Option<u64> {
        None
    }
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    /// 有值時把所有輸出打包成這個 ZIP 檔
    fn archive_name(&self) -> Option<&str>;
    fn query_params(&self) -> Result<QueryParams>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Snapshot>;
    async fn transform(&self, snapshot: Snapshot) -> Result<ReportSet>;
    async fn load(&self, reports: ReportSet) -> Result<String>;
}
