pub mod classify;
pub mod dataset;
pub mod etl;
pub mod ops;
pub mod pipeline;
pub mod queries;

pub use crate::domain::model::{Snapshot, TableName};
pub use crate::domain::ports::{ConfigProvider, Pipeline, SnapshotSource, Storage};
pub use crate::domain::report::{ReportSet, ReportTable};
pub use crate::utils::error::Result;
