pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliConfig};

pub use adapters::{ConfiguredSource, DirectorySource, HttpSource};
pub use config::{ParameterConfig, TomlConfig};
pub use crate::core::dataset::Dataset;
pub use crate::core::etl::{ReportEngine, RunSummary};
pub use crate::core::pipeline::ShelterPipeline;
pub use crate::core::queries::{QueryParams, Question};
pub use utils::error::{ReportError, Result};
