use crate::core::dataset::Dataset;
use crate::core::queries::Question;
use crate::core::{ConfigProvider, Pipeline, ReportSet, Result, Snapshot, SnapshotSource, Storage, TableName};
use crate::domain::report::QuestionFailure;
use crate::utils::error::{ReportError, ReportError::ProcessingError};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};
use zip::DateTime;

pub const FAILURES_FILE: &str = "failures.json";
pub const DEFAULT_ARCHIVE_NAME: &str = "shelter_reports.zip";
pub const OUTPUT_FORMATS: [&str; 3] = ["csv", "tsv", "json"];

/// 依輸出格式產生的檔案：(檔名, 內容)
fn render_files(reports: &ReportSet, formats: &[String]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();

    for table in &reports.tables {
        for format in formats {
            let content = match format.as_str() {
                "csv" => table.to_delimited(b',')?.into_bytes(),
                "tsv" => table.to_delimited(b'\t')?.into_bytes(),
                "json" => serde_json::to_vec_pretty(&table.to_json())?,
                other => {
                    return Err(ReportError::InvalidConfigValueError {
                        field: "output_formats".to_string(),
                        value: other.to_string(),
                        reason: "Unsupported format".to_string(),
                    })
                }
            };
            files.push((format!("{}.{}", table.name, format), content));
        }
    }

    if reports.has_failures() {
        files.push((
            FAILURES_FILE.to_string(),
            serde_json::to_vec_pretty(&reports.failures)?,
        ));
    }

    Ok(files)
}

pub struct ShelterPipeline<S: Storage, Src: SnapshotSource, C: ConfigProvider> {
    storage: S,
    source: Src,
    config: C,
}

impl<S: Storage, Src: SnapshotSource, C: ConfigProvider> ShelterPipeline<S, Src, C> {
    pub fn new(storage: S, source: Src, config: C) -> Self {
        Self {
            storage,
            source,
            config,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, Src: SnapshotSource, C: ConfigProvider> Pipeline for ShelterPipeline<S, Src, C> {
    async fn extract(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot::default();

        tracing::debug!("Reading snapshot from {}", self.source.describe());
        for table in TableName::ALL {
            let content = self.source.fetch_table(table).await?;
            match &content {
                Some(bytes) => tracing::debug!("📥 {} ({} bytes)", table.file_name(), bytes.len()),
                None => tracing::warn!("⚠️ {} not found in {}", table.file_name(), self.source.describe()),
            }
            snapshot.insert(table, content);
        }

        if snapshot.present_tables() == 0 {
            return Err(ProcessingError {
                message: format!("no snapshot tables found in {}", self.source.describe()),
            });
        }

        Ok(snapshot)
    }

    async fn transform(&self, snapshot: Snapshot) -> Result<ReportSet> {
        let params = self.config.query_params()?;
        tracing::debug!("Query parameters: {:?}", params);

        let dataset = Dataset::from_snapshot(&snapshot);
        let mut reports = ReportSet::default();

        // 每個問題各自執行，單一問題失敗不影響其他問題
        for question in Question::ALL {
            match question.run(&dataset, &params) {
                Ok(table) => {
                    tracing::info!("✅ {} ({} rows)", question, table.len());
                    reports.tables.push(table);
                }
                Err(e) => {
                    tracing::warn!("❌ {} failed: {}", question, e);
                    reports.failures.push(QuestionFailure {
                        question: question.slug().to_string(),
                        category: format!("{:?}", e.category()),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(reports)
    }

    async fn load(&self, reports: ReportSet) -> Result<String> {
        let files = render_files(&reports, self.config.output_formats())?;
        tracing::debug!("Rendered {} report files", files.len());

        match self.config.archive_name() {
            Some(archive_name) => {
                let zip_data = {
                    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                    for (name, content) in &files {
                        // 固定檔案時間，相同輸入產生相同的 ZIP
                        let options: FileOptions<()> =
                            FileOptions::default().last_modified_time(DateTime::default());
                        zip.start_file(name.as_str(), options)?;
                        zip.write_all(content)?;
                    }
                    zip.finish()?.into_inner()
                };

                tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
                self.storage.write_file(archive_name, &zip_data).await?;
                Ok(format!("{}/{}", self.config.output_path(), archive_name))
            }
            None => {
                for (name, content) in &files {
                    self.storage.write_file(name, content).await?;
                }
                Ok(self.config.output_path().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::queries::QueryParams;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }

        async fn file_names(&self) -> Vec<String> {
            let files = self.files.lock().await;
            let mut names: Vec<String> = files.keys().cloned().collect();
            names.sort();
            names
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                ReportError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockSource {
        tables: HashMap<TableName, &'static str>,
    }

    impl MockSource {
        fn new(tables: &[(TableName, &'static str)]) -> Self {
            Self {
                tables: tables.iter().copied().collect(),
            }
        }
    }

    impl SnapshotSource for MockSource {
        fn describe(&self) -> String {
            "mock source".to_string()
        }

        async fn fetch_table(&self, table: TableName) -> Result<Option<Vec<u8>>> {
            Ok(self.tables.get(&table).map(|c| c.as_bytes().to_vec()))
        }
    }

    struct MockConfig {
        output_formats: Vec<String>,
        archive_name: Option<String>,
    }

    impl MockConfig {
        fn new(formats: &[&str], archive_name: Option<&str>) -> Self {
            Self {
                output_formats: formats.iter().map(|f| f.to_string()).collect(),
                archive_name: archive_name.map(str::to_string),
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn source_location(&self) -> &str {
            "mock"
        }

        fn output_path(&self) -> &str {
            "test_output"
        }

        fn output_formats(&self) -> &[String] {
            &self.output_formats
        }

        fn archive_name(&self) -> Option<&str> {
            self.archive_name.as_deref()
        }

        fn query_params(&self) -> Result<QueryParams> {
            Ok(QueryParams::new(
                NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
                "2024-03".parse().unwrap(),
            ))
        }
    }

    const ADMISSIONS: &str = "Animal_Id,Impound_Number,Intake_Date,Intake_Type
D1,K1,2024-03-01,Owner Surrender
D2,K2,2024-03-02,Stray
C1,K3,2024-03-03,Owner Surrender
";
    const DETAILS: &str = "Animal_Id,Animal_Type,Animal_Breed
D1,Dog,Beagle
D2,Dog,Poodle
C1,Cat,Siamese
";
    const EXITS: &str = "Impound_Number,Outcome_Date,Outcome_Type
K2,2024-03-20,Adoption
";
    const KENNELS: &str = "Kennel_Number,Log_Id,Kennel_Status
KN-1,1,Available
KN-2,2,Occupied
";

    fn full_source() -> MockSource {
        MockSource::new(&[
            (TableName::AnimalAdmission, ADMISSIONS),
            (TableName::AnimalDetails, DETAILS),
            (TableName::ExitStatus, EXITS),
            (TableName::MedicalHistory, "Animal_Id,Impound_Number,Intake_Condition\n"),
            (TableName::ShelterStayDetails, "Impound_Number,Staff_Id\nK1,S1\nK2,S1\nK3,S2\n"),
            (TableName::KennelStatusLog, KENNELS),
        ])
    }

    #[tokio::test]
    async fn test_extract_collects_all_tables() {
        let pipeline = ShelterPipeline::new(MockStorage::new(), full_source(), MockConfig::new(&["csv"], None));

        let snapshot = pipeline.extract().await.unwrap();

        assert_eq!(snapshot.present_tables(), 6);
        assert!(snapshot.table(TableName::KennelStatusLog).is_some());
    }

    #[tokio::test]
    async fn test_extract_fails_when_source_is_empty() {
        let pipeline = ShelterPipeline::new(MockStorage::new(), MockSource::new(&[]), MockConfig::new(&["csv"], None));

        let result = pipeline.extract().await;
        assert!(matches!(result, Err(ReportError::ProcessingError { .. })));
    }

    #[tokio::test]
    async fn test_transform_runs_every_question() {
        let pipeline = ShelterPipeline::new(MockStorage::new(), full_source(), MockConfig::new(&["csv"], None));

        let snapshot = pipeline.extract().await.unwrap();
        let reports = pipeline.transform(snapshot).await.unwrap();

        assert!(!reports.has_failures(), "{:?}", reports.failures);
        assert_eq!(reports.tables.len(), 8);

        let population = reports.table("q1_population_mix").unwrap();
        assert_eq!(population.len(), 2);

        let staff = reports.table("q4_staff_workload").unwrap();
        assert_eq!(staff.rows[0][0].to_string(), "S1");
        assert_eq!(staff.rows[0][1].to_string(), "2");
    }

    #[tokio::test]
    async fn test_transform_isolates_failing_questions() {
        let source = MockSource::new(&[
            (TableName::AnimalAdmission, ADMISSIONS),
            (TableName::AnimalDetails, DETAILS),
            (TableName::ExitStatus, "Impound_Number,Outcome_Date,Outcome_Type\nK2,tomorrow,Adoption\n"),
            (TableName::KennelStatusLog, KENNELS),
        ]);
        let pipeline = ShelterPipeline::new(MockStorage::new(), source, MockConfig::new(&["csv"], None));

        let snapshot = pipeline.extract().await.unwrap();
        let reports = pipeline.transform(snapshot).await.unwrap();

        // 用到 ExitStatus / MedicalHistory / ShelterStayDetails 的問題會失敗
        let failed: Vec<&str> = reports.failures.iter().map(|f| f.question.as_str()).collect();
        assert_eq!(
            failed,
            vec![
                "q1_population_mix",
                "q2_intake_trend",
                "q4_staff_workload",
                "q5_adoption_trend",
                "q6_critical_euthanasia",
                "q8_longest_stays",
            ]
        );
        assert!(reports.failures[0].message.contains("Outcome_Date"));

        let succeeded: Vec<&str> = reports.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(succeeded, vec!["q3_surrender_patterns", "q7_kennel_availability"]);
    }

    #[tokio::test]
    async fn test_load_writes_plain_files() {
        let storage = MockStorage::new();
        let pipeline = ShelterPipeline::new(storage.clone(), full_source(), MockConfig::new(&["csv", "json"], None));

        let snapshot = pipeline.extract().await.unwrap();
        let reports = pipeline.transform(snapshot).await.unwrap();
        let output_path = pipeline.load(reports).await.unwrap();

        assert_eq!(output_path, "test_output");
        let names = storage.file_names().await;
        assert_eq!(names.len(), 16);
        assert!(names.contains(&"q7_kennel_availability.csv".to_string()));
        assert!(names.contains(&"q7_kennel_availability.json".to_string()));
        assert!(!names.contains(&FAILURES_FILE.to_string()));

        let csv = storage.get_file("q7_kennel_availability.csv").await.unwrap();
        let csv = String::from_utf8(csv).unwrap();
        assert_eq!(
            csv.lines().collect::<Vec<_>>(),
            vec![
                "Kennel_Status,Kennel_Count,Percentage",
                "Available,1,50.00",
                "Occupied,1,50.00",
            ]
        );
    }

    #[tokio::test]
    async fn test_load_zip_contains_reports_and_failures() {
        let storage = MockStorage::new();
        let source = MockSource::new(&[(TableName::KennelStatusLog, KENNELS)]);
        let pipeline = ShelterPipeline::new(
            storage.clone(),
            source,
            MockConfig::new(&["tsv"], Some("shelter_reports.zip")),
        );

        let snapshot = pipeline.extract().await.unwrap();
        let reports = pipeline.transform(snapshot).await.unwrap();
        let output_path = pipeline.load(reports).await.unwrap();

        assert_eq!(output_path, "test_output/shelter_reports.zip");

        let zip_bytes = storage.get_file("shelter_reports.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();

        let mut file_names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        file_names.sort();
        assert_eq!(file_names, vec!["failures.json", "q7_kennel_availability.tsv"]);

        let failures: Vec<QuestionFailure> = {
            let file = archive.by_name(FAILURES_FILE).unwrap();
            serde_json::from_reader(file).unwrap()
        };
        assert_eq!(failures.len(), 7);
        assert!(failures.iter().all(|f| f.category == "Data"));
    }

    #[test]
    fn test_render_files_rejects_unknown_format() {
        let reports = ReportSet {
            tables: vec![crate::domain::report::ReportTable {
                name: "t".to_string(),
                title: "t".to_string(),
                columns: vec!["A".to_string()],
                rows: vec![],
            }],
            failures: vec![],
        };
        assert!(render_files(&reports, &["xml".to_string()]).is_err());
    }
}
