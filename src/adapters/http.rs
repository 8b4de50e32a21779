use crate::core::{Result, SnapshotSource, TableName};
use crate::utils::error::ReportError;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// 以 `GET <base>/<file>` 取得每張表的 HTTP 匯出
#[derive(Debug, Clone)]
pub struct HttpSource {
    base: Url,
    client: Client,
    timeout: Option<Duration>,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self> {
        // 確保結尾有斜線，join 時才不會吃掉最後一段路徑
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized).map_err(|e| ReportError::InvalidConfigValueError {
            field: "source.location".to_string(),
            value: base_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;

        Ok(Self {
            base,
            client: Client::new(),
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn table_url(&self, table: TableName) -> Result<Url> {
        self.base
            .join(table.file_name())
            .map_err(|e| ReportError::ProcessingError {
                message: format!("cannot build URL for {}: {}", table.file_name(), e),
            })
    }
}

impl SnapshotSource for HttpSource {
    fn describe(&self) -> String {
        format!("HTTP export {}", self.base)
    }

    async fn fetch_table(&self, table: TableName) -> Result<Option<Vec<u8>>> {
        let url = self.table_url(table)?;
        tracing::debug!("Making HTTP request to: {}", url);

        let mut request = self.client.get(url.clone());
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        tracing::debug!("HTTP response status: {}", response.status());

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            status => Err(ReportError::HttpStatusError {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}
