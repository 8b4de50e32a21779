use chrono::Local;
use clap::Parser;
use shelter_insights::core::ConfigProvider;
use shelter_insights::utils::error::ReportError;
use shelter_insights::utils::logger::{self, LogFormat};
use shelter_insights::utils::validation::Validate;
use shelter_insights::{
    CliConfig, ConfiguredSource, LocalStorage, ReportEngine, RunSummary, ShelterPipeline,
    TomlConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(LogFormat::from_json_flag(cli.log_json), cli.verbose);

    tracing::info!("Starting shelter-insights CLI");
    tracing::debug!("CLI config: {:?}", cli);

    let today = Local::now().date_naive();
    let result = match cli.config.clone() {
        Some(path) => {
            tracing::info!("📄 Loading configuration from {}", path.display());
            match TomlConfig::from_file(&path) {
                Ok(mut config) => {
                    tracing::info!("📊 Report: {}", config.report.name);
                    config.apply_cli_overrides(&cli);
                    let as_of = config.parameters.as_of_or(today);
                    tracing::info!("📅 Reporting as of {}", as_of);
                    run(config, cli.dry_run).await
                }
                Err(e) => Err(e),
            }
        }
        None => {
            let as_of = cli.parameters.as_of_or(today);
            tracing::info!("📅 Reporting as of {}", as_of);
            let dry_run = cli.dry_run;
            run(cli, dry_run).await
        }
    };

    match result {
        Ok(Some(summary)) => {
            tracing::info!("✅ Shelter reports completed successfully!");
            println!("✅ {} reports written", summary.tables_written);
            println!("📁 Output saved to: {}", summary.output_path);
        }
        Ok(None) => {
            println!("✅ Configuration is valid");
        }
        Err(e) => {
            tracing::error!(
                "❌ Report run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            std::process::exit(e.severity().exit_code());
        }
    }

    Ok(())
}

/// 驗證設定後執行；dry run 時只驗證，回傳 `None`
async fn run<C>(config: C, dry_run: bool) -> Result<Option<RunSummary>, ReportError>
where
    C: ConfigProvider + Validate,
{
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        return Err(e);
    }

    let params = config.query_params()?;
    tracing::info!(
        "Staff month {}, adoption window {} months, top {} staff, {} longest stays",
        params.staff_month,
        params.adoption_window_months,
        params.staff_top_n,
        params.longest_stay_limit
    );

    if dry_run {
        tracing::info!("🔍 Dry run: configuration is valid, nothing was written");
        return Ok(None);
    }

    let source = ConfiguredSource::from_config(&config)?;
    let storage = LocalStorage::new(config.output_path());
    let pipeline = ShelterPipeline::new(storage, source, config);

    let engine = ReportEngine::new(pipeline);
    let summary = engine.run().await?;

    for question in &summary.failed_questions {
        tracing::warn!("⚠️ {} did not produce a report", question);
    }

    summary.into_result().map(Some)
}
