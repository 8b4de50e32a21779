#[cfg(feature = "cli")]
pub mod cli;
pub mod parameters;
pub mod toml_config;

pub use parameters::ParameterConfig;
pub use toml_config::TomlConfig;

#[cfg(feature = "cli")]
pub use cli_config::CliConfig;

#[cfg(feature = "cli")]
mod cli_config {
    use super::toml_config::CompressionConfig;
    use super::{ParameterConfig, TomlConfig};
    use crate::core::pipeline::{DEFAULT_ARCHIVE_NAME, OUTPUT_FORMATS};
    use crate::core::queries::QueryParams;
    use crate::core::ConfigProvider;
    use crate::utils::error::Result;
    use crate::utils::validation::{
        validate_output_formats, validate_path, validate_source_location, Validate,
    };
    use clap::Parser;
    use serde::{Deserialize, Serialize};
    use std::path::PathBuf;
    use std::sync::LazyLock;

    pub const DEFAULT_SOURCE: &str = "./data";
    pub const DEFAULT_OUTPUT_PATH: &str = "./output";

    static DEFAULT_FORMATS: LazyLock<Vec<String>> = LazyLock::new(|| vec!["csv".to_string()]);

    #[derive(Debug, Clone, Serialize, Deserialize, Parser)]
    #[command(name = "shelter-insights")]
    #[command(about = "Answers eight analytic questions over an animal shelter snapshot")]
    pub struct CliConfig {
        // 命令列旗標會覆蓋檔案中的值
        #[arg(long, short, help = "TOML configuration file")]
        pub config: Option<PathBuf>,

        #[arg(long, help = "Snapshot directory or http(s) export URL [default: ./data]")]
        pub source: Option<String>,

        #[arg(long, help = "Directory the reports are written to [default: ./output]")]
        pub output_path: Option<String>,

        #[arg(long, value_delimiter = ',', help = "Comma separated output formats: csv, tsv, json [default: csv]")]
        pub formats: Vec<String>,

        #[arg(long, help = "Bundle every report into shelter_reports.zip")]
        pub compress: bool,

        #[command(flatten)]
        pub parameters: ParameterConfig,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Emit logs as JSON lines")]
        pub log_json: bool,

        #[arg(long, help = "Validate the configuration and exit")]
        pub dry_run: bool,
    }

    impl ConfigProvider for CliConfig {
        fn source_location(&self) -> &str {
            self.source.as_deref().unwrap_or(DEFAULT_SOURCE)
        }

        fn output_path(&self) -> &str {
            self.output_path.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH)
        }

        fn output_formats(&self) -> &[String] {
            if self.formats.is_empty() {
                DEFAULT_FORMATS.as_slice()
            } else {
                self.formats.as_slice()
            }
        }

        fn archive_name(&self) -> Option<&str> {
            self.compress.then_some(DEFAULT_ARCHIVE_NAME)
        }

        fn query_params(&self) -> Result<QueryParams> {
            self.parameters.to_query_params()
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validate_source_location("--source", self.source_location())?;
            validate_path("--output-path", self.output_path())?;
            validate_output_formats("--formats", self.output_formats(), &OUTPUT_FORMATS)?;
            self.parameters.validate("parameters")
        }
    }

    impl TomlConfig {
        /// 以命令列中明確給定的旗標覆蓋檔案設定
        pub fn apply_cli_overrides(&mut self, cli: &CliConfig) {
            if let Some(source) = &cli.source {
                self.source.location = source.clone();
            }
            if let Some(output_path) = &cli.output_path {
                self.load.output_path = output_path.clone();
            }
            if !cli.formats.is_empty() {
                self.load.output_formats = cli.formats.clone();
            }
            if cli.compress {
                let filename = self
                    .load
                    .compression
                    .as_ref()
                    .map(|c| c.filename.clone())
                    .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());
                self.load.compression = Some(CompressionConfig {
                    enabled: true,
                    filename,
                });
            }
            self.parameters.merge(&cli.parameters);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::core::classify::FirstPeriodPolicy;

        #[test]
        fn test_defaults() {
            let cli = CliConfig::try_parse_from(["shelter-insights"]).unwrap();

            assert_eq!(cli.source_location(), "./data");
            assert_eq!(cli.output_path(), "./output");
            assert_eq!(cli.output_formats(), &["csv".to_string()]);
            assert_eq!(cli.archive_name(), None);
            assert!(cli.validate().is_ok());
        }

        #[test]
        fn test_parse_flags() {
            let cli = CliConfig::try_parse_from([
                "shelter-insights",
                "--source",
                "https://exports.example.org/shelter",
                "--formats",
                "csv,json",
                "--compress",
                "--as-of",
                "2024-06-30",
                "--staff-month",
                "2024-05",
                "--staff-top-n",
                "3",
                "--first-period-policy",
                "no-change",
            ])
            .unwrap();

            assert_eq!(cli.output_formats(), &["csv".to_string(), "json".to_string()]);
            assert_eq!(cli.archive_name(), Some("shelter_reports.zip"));
            assert!(cli.validate().is_ok());

            let params = cli.query_params().unwrap();
            assert_eq!(params.as_of.to_string(), "2024-06-30");
            assert_eq!(params.staff_month.to_string(), "2024-05");
            assert_eq!(params.staff_top_n, 3);
            assert_eq!(params.first_period_policy, FirstPeriodPolicy::NoChange);
        }

        #[test]
        fn test_rejects_malformed_month() {
            let result = CliConfig::try_parse_from(["shelter-insights", "--staff-month", "May 2024"]);
            assert!(result.is_err());
        }

        #[test]
        fn test_validate_rejects_unknown_format() {
            let cli = CliConfig::try_parse_from(["shelter-insights", "--formats", "xml"]).unwrap();
            assert!(cli.validate().is_err());
        }

        #[test]
        fn test_cli_overrides_toml() {
            let mut config = TomlConfig::from_toml_str(
                r#"
[report]
name = "nightly"

[source]
location = "./exports"

[parameters]
as_of = "2024-01-31"
staff_top_n = 4

[load]
output_path = "./reports"
output_formats = ["json"]
"#,
            )
            .unwrap();
            let cli = CliConfig::try_parse_from([
                "shelter-insights",
                "--output-path",
                "./elsewhere",
                "--compress",
                "--staff-top-n",
                "2",
            ])
            .unwrap();

            config.apply_cli_overrides(&cli);

            assert_eq!(config.source_location(), "./exports");
            assert_eq!(config.output_path(), "./elsewhere");
            assert_eq!(config.output_formats(), &["json".to_string()]);
            assert_eq!(config.archive_name(), Some("shelter_reports.zip"));
            assert_eq!(config.parameters.staff_top_n, Some(2));
            assert_eq!(config.parameters.as_of.map(|d| d.to_string()).as_deref(), Some("2024-01-31"));
        }
    }
}
