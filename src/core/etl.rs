use crate::core::queries::Question;
use crate::core::Pipeline;
use crate::utils::error::{ReportError, Result};
use std::time::Instant;

/// 一次執行的結果摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub output_path: String,
    pub tables_written: usize,
    pub failed_questions: Vec<String>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.failed_questions.is_empty()
    }

    /// 有問題失敗時轉成 `PartialFailure`，輸出檔仍已寫出
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(ReportError::PartialFailure {
                failed: self.failed_questions.len(),
                total: Question::ALL.len(),
            })
        }
    }
}

pub struct ReportEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> ReportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        tracing::info!("📊 Starting shelter report run...");

        // Extract
        let snapshot = self.pipeline.extract().await?;
        tracing::info!("Extracted {} snapshot tables", snapshot.present_tables());

        // Transform
        let reports = self.pipeline.transform(snapshot).await?;
        tracing::info!(
            "Answered {} of {} questions",
            reports.tables.len(),
            Question::ALL.len()
        );

        let tables_written = reports.tables.len();
        let failed_questions = reports
            .failures
            .iter()
            .map(|f| f.question.clone())
            .collect();

        // Load
        let output_path = self.pipeline.load(reports).await?;
        tracing::info!(
            "Output saved to: {} ({} ms)",
            output_path,
            started.elapsed().as_millis()
        );

        Ok(RunSummary {
            output_path,
            tables_written,
            failed_questions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ReportSet, ReportTable, Snapshot, TableName};
    use crate::domain::report::QuestionFailure;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubPipeline {
        failures: Vec<&'static str>,
        loads: AtomicUsize,
    }

    impl StubPipeline {
        fn new(failures: Vec<&'static str>) -> Self {
            Self {
                failures,
                loads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Pipeline for StubPipeline {
        async fn extract(&self) -> Result<Snapshot> {
            let mut snapshot = Snapshot::default();
            snapshot.insert(TableName::KennelStatusLog, Some(b"Kennel_Number\n".to_vec()));
            Ok(snapshot)
        }

        async fn transform(&self, _snapshot: Snapshot) -> Result<ReportSet> {
            Ok(ReportSet {
                tables: vec![ReportTable {
                    name: "q7_kennel_availability".to_string(),
                    title: "Kennel availability".to_string(),
                    columns: vec!["Kennel_Status".to_string()],
                    rows: vec![],
                }],
                failures: self
                    .failures
                    .iter()
                    .map(|q| QuestionFailure {
                        question: q.to_string(),
                        category: "Data".to_string(),
                        message: "table AnimalAdmission is missing from the snapshot".to_string(),
                    })
                    .collect(),
            })
        }

        async fn load(&self, _reports: ReportSet) -> Result<String> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok("out".to_string())
        }
    }

    #[tokio::test]
    async fn test_run_reports_summary() {
        let engine = ReportEngine::new(StubPipeline::new(vec![]));

        let summary = engine.run().await.unwrap();

        assert_eq!(summary.output_path, "out");
        assert_eq!(summary.tables_written, 1);
        assert!(summary.is_complete());
        assert!(summary.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_partial_failure_still_loads() {
        let engine = ReportEngine::new(StubPipeline::new(vec!["q1_population_mix"]));

        let summary = engine.run().await.unwrap();
        assert_eq!(engine.pipeline.loads.load(Ordering::SeqCst), 1);
        assert_eq!(summary.failed_questions, vec!["q1_population_mix"]);

        match summary.into_result() {
            Err(ReportError::PartialFailure { failed, total }) => {
                assert_eq!(failed, 1);
                assert_eq!(total, 8);
            }
            other => panic!("expected PartialFailure, got {:?}", other),
        }
    }
}
