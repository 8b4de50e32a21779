use crate::domain::model::TableName;
use thiserror::Error;

/// 單張資料表載入失敗的原因；可複製，讓每個用到該表的問題都能各自回報
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("table {table} is missing from the snapshot")]
    MissingTable { table: TableName },

    #[error("table {table} could not be read as CSV: {message}")]
    MalformedTable { table: TableName, message: String },

    #[error("schema mismatch in {table} row {row}: field `{field}` is absent")]
    SchemaMismatch {
        table: TableName,
        row: usize,
        field: String,
    },

    #[error("type coercion failed in {table} row {row}: field `{field}` value {value:?} is not a valid {expected}")]
    TypeCoercion {
        table: TableName,
        row: usize,
        field: String,
        value: String,
        expected: &'static str,
    },
}

impl FieldError {
    pub fn table(&self) -> TableName {
        match self {
            FieldError::MissingTable { table }
            | FieldError::MalformedTable { table, .. }
            | FieldError::SchemaMismatch { table, .. }
            | FieldError::TypeCoercion { table, .. } => *table,
        }
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Snapshot data error: {0}")]
    DataError(#[from] FieldError),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatusError { url: String, status: u16 },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for `{field}`: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value {value:?} for `{field}`: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration `{field}`")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("{failed} of {total} questions failed")]
    PartialFailure { failed: usize, total: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Data,
    Source,
    Output,
    Configuration,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 命令列的退出碼；部分成功為 2，其餘錯誤不為 0
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl ReportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReportError::DataError(_) | ReportError::CsvError(_) => ErrorCategory::Data,
            ReportError::ApiError(_) | ReportError::HttpStatusError { .. } => ErrorCategory::Source,
            ReportError::ZipError(_)
            | ReportError::IoError(_)
            | ReportError::SerializationError(_) => ErrorCategory::Output,
            ReportError::ConfigError { .. }
            | ReportError::ConfigValidationError { .. }
            | ReportError::InvalidConfigValueError { .. }
            | ReportError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ReportError::ProcessingError { .. } | ReportError::PartialFailure { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ReportError::PartialFailure { .. } => ErrorSeverity::Medium,
            ReportError::DataError(_) | ReportError::CsvError(_) => ErrorSeverity::Medium,
            ReportError::ApiError(_) | ReportError::HttpStatusError { .. } => ErrorSeverity::High,
            ReportError::ProcessingError { .. } => ErrorSeverity::High,
            ReportError::ConfigError { .. }
            | ReportError::ConfigValidationError { .. }
            | ReportError::InvalidConfigValueError { .. }
            | ReportError::MissingConfigError { .. } => ErrorSeverity::High,
            ReportError::ZipError(_)
            | ReportError::IoError(_)
            | ReportError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ReportError::DataError(FieldError::MissingTable { table }) => format!(
                "Add {} to the snapshot source",
                table.file_name()
            ),
            ReportError::DataError(FieldError::MalformedTable { table, .. }) => format!(
                "Check that {} is a comma separated file with a header row",
                table.file_name()
            ),
            ReportError::DataError(FieldError::SchemaMismatch { table, field, .. }) => format!(
                "Make sure every row of {} has a value for `{}`",
                table.file_name(),
                field
            ),
            ReportError::DataError(FieldError::TypeCoercion { field, expected, .. }) => format!(
                "Fix the `{}` value; expected a {} (dates as YYYY-MM-DD or MM/DD/YYYY)",
                field, expected
            ),
            ReportError::ApiError(_) | ReportError::HttpStatusError { .. } => {
                "Check the snapshot URL and that the export is reachable".to_string()
            }
            ReportError::CsvError(_) => "Check the CSV files for malformed rows".to_string(),
            ReportError::ConfigError { .. }
            | ReportError::ConfigValidationError { .. }
            | ReportError::InvalidConfigValueError { .. }
            | ReportError::MissingConfigError { .. } => {
                "Review the configuration file and command line flags".to_string()
            }
            ReportError::ZipError(_) | ReportError::IoError(_) => {
                "Check that the output path exists and is writable".to_string()
            }
            ReportError::SerializationError(_) | ReportError::ProcessingError { .. } => {
                "Re-run with --verbose and inspect the logs".to_string()
            }
            ReportError::PartialFailure { .. } => {
                "See failures.json in the output for the questions that did not run".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Data => format!("The shelter snapshot contains invalid data: {}", self),
            ErrorCategory::Source => format!("Could not fetch the shelter snapshot: {}", self),
            ErrorCategory::Output => format!("Could not write the reports: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Processing => format!("Report generation problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
