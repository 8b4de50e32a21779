use crate::domain::model::YearMonth;
use crate::utils::error::{ReportError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 百分比，以「百分之一個百分點」為單位的整數保存，避免浮點誤差影響排序與比對
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Percentage(i64);

impl Percentage {
    pub fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    pub fn hundredths(&self) -> i64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// 結果表中的一個儲存格；`Absent` 是明確的缺值標記（left join 沒配對、分母為零、第一期沒有前值）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Absent,
    Int(i64),
    Percent(Percentage),
    Date(NaiveDate),
    Month(YearMonth),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Absent => serde_json::Value::Null,
            Value::Int(v) => serde_json::Value::Number((*v).into()),
            Value::Percent(p) => serde_json::Number::from_f64(p.as_f64())
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => Ok(()),
            Value::Int(v) => write!(f, "{}", v),
            Value::Percent(p) => write!(f, "{}", p),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Month(m) => write!(f, "{}", m),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<Option<Value>> for Value {
    fn from(value: Option<Value>) -> Self {
        value.unwrap_or(Value::Absent)
    }
}

/// 可以放進結果表的一列
pub trait ReportRow {
    const COLUMNS: &'static [&'static str];

    fn cells(&self) -> Vec<Value>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub name: String,
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ReportTable {
    pub fn from_rows<R: ReportRow>(name: &str, title: &str, rows: &[R]) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            columns: R::COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: rows.iter().map(ReportRow::cells).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 取出某欄位的所有值
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().filter_map(|row| row.get(idx)).collect())
    }

    /// 以指定分隔符號輸出（`b','` 為 CSV、`b'\t'` 為 TSV）
    pub fn to_delimited(&self, delimiter: u8) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(Vec::new());

        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }

        let bytes = writer.into_inner().map_err(|e| ReportError::ProcessingError {
            message: format!("failed to flush {} output: {}", self.name, e),
        })?;
        String::from_utf8(bytes).map_err(|e| ReportError::ProcessingError {
            message: format!("{} output is not valid UTF-8: {}", self.name, e),
        })
    }

    /// JSON 陣列，每列為以欄位名稱為 key 的物件，key 順序與欄位順序相同
    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(Value::to_json))
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionFailure {
    pub question: String,
    pub category: String,
    pub message: String,
}

/// 一次批次執行的所有結果
#[derive(Debug, Clone, Default)]
pub struct ReportSet {
    pub tables: Vec<ReportTable>,
    pub failures: Vec<QuestionFailure>,
}

impl ReportSet {
    pub fn table(&self, name: &str) -> Option<&ReportTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair {
        label: &'static str,
        share: Option<Percentage>,
    }

    impl ReportRow for Pair {
        const COLUMNS: &'static [&'static str] = &["Label", "Share"];

        fn cells(&self) -> Vec<Value> {
            vec![
                Value::text(self.label),
                self.share.map(Value::Percent).into(),
            ]
        }
    }

    fn sample() -> ReportTable {
        let rows = vec![
            Pair {
                label: "Dog",
                share: Some(Percentage::from_hundredths(6667)),
            },
            Pair {
                label: "Bird, exotic",
                share: None,
            },
        ];
        ReportTable::from_rows("sample", "Sample", &rows)
    }

    #[test]
    fn test_percentage_display() {
        assert_eq!(Percentage::from_hundredths(6667).to_string(), "66.67");
        assert_eq!(Percentage::from_hundredths(5).to_string(), "0.05");
        assert_eq!(Percentage::from_hundredths(10000).to_string(), "100.00");
        assert_eq!(Percentage::from_hundredths(-250).to_string(), "-2.50");
    }

    #[test]
    fn test_to_delimited_renders_absent_as_empty() {
        let table = sample();

        let csv = table.to_delimited(b',').unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Label,Share");
        assert_eq!(lines[1], "Dog,66.67");
        assert_eq!(lines[2], "\"Bird, exotic\",");

        let tsv = table.to_delimited(b'\t').unwrap();
        assert_eq!(tsv.lines().nth(2).unwrap(), "Bird, exotic\t");
    }

    #[test]
    fn test_to_json_uses_null_for_absent() {
        let json = sample().to_json();
        assert_eq!(json[0]["Label"], "Dog");
        assert_eq!(json[0]["Share"], 66.67);
        assert!(json[1]["Share"].is_null());
    }

    #[test]
    fn test_to_json_keeps_column_order() {
        let table = ReportTable {
            name: "q1_population_mix".to_string(),
            title: "Population mix".to_string(),
            columns: vec!["Animal_Type".to_string(), "Animal_Count".to_string(), "Percentage".to_string()],
            rows: vec![vec![
                Value::text("Dog"),
                Value::Int(2),
                Value::Percent(Percentage::from_hundredths(6667)),
            ]],
        };

        let json = table.to_json();
        let keys: Vec<&str> = json[0].as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Animal_Type", "Animal_Count", "Percentage"]);

        let text = serde_json::to_string(&json).unwrap();
        assert_eq!(text, r#"[{"Animal_Type":"Dog","Animal_Count":2,"Percentage":66.67}]"#);
    }

    #[test]
    fn test_column_lookup() {
        let table = sample();
        let labels = table.column("Label").unwrap();
        assert_eq!(labels, vec![&Value::text("Dog"), &Value::text("Bird, exotic")]);
        assert!(table.column("Missing").is_none());
    }
}
