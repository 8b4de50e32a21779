use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// 快照中的六張資料表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableName {
    AnimalAdmission,
    AnimalDetails,
    ExitStatus,
    MedicalHistory,
    ShelterStayDetails,
    KennelStatusLog,
}

impl TableName {
    pub const ALL: [TableName; 6] = [
        TableName::AnimalAdmission,
        TableName::AnimalDetails,
        TableName::ExitStatus,
        TableName::MedicalHistory,
        TableName::ShelterStayDetails,
        TableName::KennelStatusLog,
    ];

    /// 快照目錄 / URL 下對應的檔名
    pub fn file_name(&self) -> &'static str {
        match self {
            TableName::AnimalAdmission => "animal_admission.csv",
            TableName::AnimalDetails => "animal_details.csv",
            TableName::ExitStatus => "exit_status.csv",
            TableName::MedicalHistory => "medical_history.csv",
            TableName::ShelterStayDetails => "shelter_stay_details.csv",
            TableName::KennelStatusLog => "kennel_status_log.csv",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableName::AnimalAdmission => "AnimalAdmission",
            TableName::AnimalDetails => "AnimalDetails",
            TableName::ExitStatus => "ExitStatus",
            TableName::MedicalHistory => "MedicalHistory",
            TableName::ShelterStayDetails => "ShelterStayDetails",
            TableName::KennelStatusLog => "KennelStatusLog",
        };
        f.write_str(name)
    }
}

/// 尚未轉型的一列資料，`line` 為 CSV 中的資料列序號（從 1 起算，不含標頭）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub line: usize,
    pub fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            fields: HashMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: &str) -> Self {
        self.fields.insert(field.to_string(), value.to_string());
        self
    }
}

/// 從來源讀到的原始快照：每張表的位元組內容，`None` 表示來源沒有該檔案
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub tables: HashMap<TableName, Option<Vec<u8>>>,
}

impl Snapshot {
    pub fn insert(&mut self, table: TableName, content: Option<Vec<u8>>) {
        self.tables.insert(table, content);
    }

    pub fn table(&self, table: TableName) -> Option<&[u8]> {
        self.tables.get(&table).and_then(|c| c.as_deref())
    }

    pub fn present_tables(&self) -> usize {
        self.tables.values().filter(|c| c.is_some()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimalAdmission {
    pub animal_id: String,
    pub impound_number: String,
    pub intake_date: NaiveDate,
    pub intake_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimalDetails {
    pub animal_id: String,
    pub animal_type: String,
    pub animal_breed: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub impound_number: String,
    pub outcome_date: NaiveDate,
    pub outcome_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalHistory {
    pub animal_id: String,
    pub impound_number: String,
    pub intake_condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelterStayDetails {
    pub impound_number: String,
    pub staff_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KennelStatusLog {
    pub kennel_number: String,
    pub log_id: i64,
    pub kennel_status: String,
}

/// 年月，例如 `2024-03`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// 當月最後一天（SQL 的 `LAST_DAY`）
    pub fn last_day(&self) -> NaiveDate {
        self.first_day()
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got {:?}", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in {:?}", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in {:?}", s))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month out of range in {:?}", s))
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}
