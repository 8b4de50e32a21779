//! 記憶體中的關聯資料集：六張具型別的資料表，以及依 `Impound_Number` / `Animal_Id` 的索引。
//!
//! 載入只發生一次。每張表各自保存載入結果，某張表有問題時只有用到它的問題會失敗。

use crate::domain::model::{
    AnimalAdmission, AnimalDetails, ExitStatus, KennelStatusLog, MedicalHistory, RawRow,
    ShelterStayDetails, Snapshot, TableName,
};
use crate::utils::error::{FieldError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
];

/// 解析日期；也接受含時間的格式（時間部分忽略）
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
                .map(|dt| dt.date())
        })
}

/// 讀取單一列的欄位，失敗時帶上資料表、列號與欄位名稱
struct FieldReader<'a> {
    table: TableName,
    raw: &'a RawRow,
}

impl<'a> FieldReader<'a> {
    fn new(table: TableName, raw: &'a RawRow) -> Self {
        Self { table, raw }
    }

    fn text(&self, field: &str) -> std::result::Result<String, FieldError> {
        self.raw
            .fields
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| FieldError::SchemaMismatch {
                table: self.table,
                row: self.raw.line,
                field: field.to_string(),
            })
    }

    fn date(&self, field: &str) -> std::result::Result<NaiveDate, FieldError> {
        let value = self.text(field)?;
        parse_date(&value).ok_or_else(|| FieldError::TypeCoercion {
            table: self.table,
            row: self.raw.line,
            field: field.to_string(),
            value,
            expected: "date",
        })
    }

    fn int(&self, field: &str) -> std::result::Result<i64, FieldError> {
        let value = self.text(field)?;
        value.parse().map_err(|_| FieldError::TypeCoercion {
            table: self.table,
            row: self.raw.line,
            field: field.to_string(),
            value,
            expected: "integer",
        })
    }
}

/// 可由原始列轉型而來的資料表列
pub trait TableRow: Sized {
    const TABLE: TableName;

    fn from_raw(raw: &RawRow) -> std::result::Result<Self, FieldError>;

    fn impound_key(&self) -> Option<&str> {
        None
    }

    fn animal_key(&self) -> Option<&str> {
        None
    }
}

impl TableRow for AnimalAdmission {
    const TABLE: TableName = TableName::AnimalAdmission;

    fn from_raw(raw: &RawRow) -> std::result::Result<Self, FieldError> {
        let r = FieldReader::new(Self::TABLE, raw);
        Ok(Self {
            animal_id: r.text("Animal_Id")?,
            impound_number: r.text("Impound_Number")?,
            intake_date: r.date("Intake_Date")?,
            intake_type: r.text("Intake_Type")?,
        })
    }

    fn impound_key(&self) -> Option<&str> {
        Some(&self.impound_number)
    }

    fn animal_key(&self) -> Option<&str> {
        Some(&self.animal_id)
    }
}

impl TableRow for AnimalDetails {
    const TABLE: TableName = TableName::AnimalDetails;

    fn from_raw(raw: &RawRow) -> std::result::Result<Self, FieldError> {
        let r = FieldReader::new(Self::TABLE, raw);
        Ok(Self {
            animal_id: r.text("Animal_Id")?,
            animal_type: r.text("Animal_Type")?,
            animal_breed: r.text("Animal_Breed")?,
        })
    }

    fn animal_key(&self) -> Option<&str> {
        Some(&self.animal_id)
    }
}

impl TableRow for ExitStatus {
    const TABLE: TableName = TableName::ExitStatus;

    fn from_raw(raw: &RawRow) -> std::result::Result<Self, FieldError> {
        let r = FieldReader::new(Self::TABLE, raw);
        Ok(Self {
            impound_number: r.text("Impound_Number")?,
            outcome_date: r.date("Outcome_Date")?,
            outcome_type: r.text("Outcome_Type")?,
        })
    }

    fn impound_key(&self) -> Option<&str> {
        Some(&self.impound_number)
    }
}

impl TableRow for MedicalHistory {
    const TABLE: TableName = TableName::MedicalHistory;

    fn from_raw(raw: &RawRow) -> std::result::Result<Self, FieldError> {
        let r = FieldReader::new(Self::TABLE, raw);
        Ok(Self {
            animal_id: r.text("Animal_Id")?,
            impound_number: r.text("Impound_Number")?,
            intake_condition: r.text("Intake_Condition")?,
        })
    }

    fn impound_key(&self) -> Option<&str> {
        Some(&self.impound_number)
    }

    fn animal_key(&self) -> Option<&str> {
        Some(&self.animal_id)
    }
}

impl TableRow for ShelterStayDetails {
    const TABLE: TableName = TableName::ShelterStayDetails;

    fn from_raw(raw: &RawRow) -> std::result::Result<Self, FieldError> {
        let r = FieldReader::new(Self::TABLE, raw);
        Ok(Self {
            impound_number: r.text("Impound_Number")?,
            staff_id: r.text("Staff_Id")?,
        })
    }

    fn impound_key(&self) -> Option<&str> {
        Some(&self.impound_number)
    }
}

impl TableRow for KennelStatusLog {
    const TABLE: TableName = TableName::KennelStatusLog;

    fn from_raw(raw: &RawRow) -> std::result::Result<Self, FieldError> {
        let r = FieldReader::new(Self::TABLE, raw);
        Ok(Self {
            kennel_number: r.text("Kennel_Number")?,
            log_id: r.int("Log_Id")?,
            kennel_status: r.text("Kennel_Status")?,
        })
    }
}

/// 把 CSV 內容切成原始列，欄位名稱取自標頭
pub fn parse_csv(table: TableName, bytes: &[u8]) -> std::result::Result<Vec<RawRow>, FieldError> {
    let malformed = |e: csv::Error| FieldError::MalformedTable {
        table,
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers = reader.headers().map_err(malformed)?.clone();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(malformed)?;
        let fields = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(RawRow { line: i + 1, fields });
    }
    Ok(rows)
}

/// 一張具型別的資料表，保留原始順序並建立索引
#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: Vec<T>,
    by_impound: HashMap<String, Vec<usize>>,
    by_animal: HashMap<String, Vec<usize>>,
}

impl<T: TableRow> Table<T> {
    pub fn new(rows: Vec<T>) -> Self {
        let mut by_impound: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_animal: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            if let Some(key) = row.impound_key() {
                by_impound.entry(key.to_string()).or_default().push(i);
            }
            if let Some(key) = row.animal_key() {
                by_animal.entry(key.to_string()).or_default().push(i);
            }
        }
        Self {
            rows,
            by_impound,
            by_animal,
        }
    }

    pub fn from_raw_rows(raw: &[RawRow]) -> std::result::Result<Self, FieldError> {
        let rows = raw
            .iter()
            .map(T::from_raw)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(rows))
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn by_impound<'a>(&'a self, impound_number: &str) -> impl Iterator<Item = &'a T> + 'a {
        let hits = self.by_impound.get(impound_number).map(Vec::as_slice).unwrap_or(&[]);
        hits.iter().map(move |&i| &self.rows[i])
    }

    pub fn by_animal<'a>(&'a self, animal_id: &str) -> impl Iterator<Item = &'a T> + 'a {
        let hits = self.by_animal.get(animal_id).map(Vec::as_slice).unwrap_or(&[]);
        hits.iter().map(move |&i| &self.rows[i])
    }

    /// 同一個 key 出現超過一次時，以第一列為準
    pub fn first_by_impound(&self, impound_number: &str) -> Option<&T> {
        self.by_impound(impound_number).next()
    }

    pub fn first_by_animal(&self, animal_id: &str) -> Option<&T> {
        self.by_animal(animal_id).next()
    }

    pub fn duplicate_impound_keys(&self) -> Vec<&str> {
        duplicates(&self.by_impound)
    }

    pub fn duplicate_animal_keys(&self) -> Vec<&str> {
        duplicates(&self.by_animal)
    }
}

fn duplicates(index: &HashMap<String, Vec<usize>>) -> Vec<&str> {
    let mut keys: Vec<&str> = index
        .iter()
        .filter(|(_, hits)| hits.len() > 1)
        .map(|(k, _)| k.as_str())
        .collect();
    keys.sort_unstable();
    keys
}

type Loaded<T> = std::result::Result<Table<T>, FieldError>;

fn load_table<T: TableRow>(snapshot: &Snapshot) -> Loaded<T> {
    let bytes = snapshot
        .table(T::TABLE)
        .ok_or(FieldError::MissingTable { table: T::TABLE })?;
    let raw = parse_csv(T::TABLE, bytes)?;
    let table = Table::from_raw_rows(&raw)?;
    tracing::debug!("Loaded {} rows into {}", table.len(), T::TABLE);
    Ok(table)
}

fn borrow<T>(loaded: &Loaded<T>) -> Result<&Table<T>> {
    loaded.as_ref().map_err(|e| e.clone().into())
}

/// 某隻動物目前在收容所內的那次入所紀錄
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentAdmission<'a> {
    pub admission: &'a AnimalAdmission,
    /// 沒有對應的 AnimalDetails 列時為 `None`
    pub details: Option<&'a AnimalDetails>,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    admissions: Loaded<AnimalAdmission>,
    details: Loaded<AnimalDetails>,
    exits: Loaded<ExitStatus>,
    medical: Loaded<MedicalHistory>,
    stays: Loaded<ShelterStayDetails>,
    kennels: Loaded<KennelStatusLog>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            admissions: Ok(Table::new(Vec::new())),
            details: Ok(Table::new(Vec::new())),
            exits: Ok(Table::new(Vec::new())),
            medical: Ok(Table::new(Vec::new())),
            stays: Ok(Table::new(Vec::new())),
            kennels: Ok(Table::new(Vec::new())),
        }
    }
}

impl Dataset {
    /// 一次載入整份快照
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let dataset = Self {
            admissions: load_table(snapshot),
            details: load_table(snapshot),
            exits: load_table(snapshot),
            medical: load_table(snapshot),
            stays: load_table(snapshot),
            kennels: load_table(snapshot),
        };

        for error in dataset.load_errors() {
            tracing::warn!("⚠️ {}", error);
        }
        dataset.warn_duplicate_keys();
        dataset
    }

    pub fn with_admissions(mut self, rows: Vec<AnimalAdmission>) -> Self {
        self.admissions = Ok(Table::new(rows));
        self
    }

    pub fn with_details(mut self, rows: Vec<AnimalDetails>) -> Self {
        self.details = Ok(Table::new(rows));
        self
    }

    pub fn with_exits(mut self, rows: Vec<ExitStatus>) -> Self {
        self.exits = Ok(Table::new(rows));
        self
    }

    pub fn with_medical(mut self, rows: Vec<MedicalHistory>) -> Self {
        self.medical = Ok(Table::new(rows));
        self
    }

    pub fn with_stays(mut self, rows: Vec<ShelterStayDetails>) -> Self {
        self.stays = Ok(Table::new(rows));
        self
    }

    pub fn with_kennels(mut self, rows: Vec<KennelStatusLog>) -> Self {
        self.kennels = Ok(Table::new(rows));
        self
    }

    fn warn_duplicate_keys(&self) {
        if let Ok(exits) = &self.exits {
            for key in exits.duplicate_impound_keys() {
                tracing::warn!("⚠️ ExitStatus has more than one row for impound {}; using the first", key);
            }
        }
        if let Ok(details) = &self.details {
            for key in details.duplicate_animal_keys() {
                tracing::warn!("⚠️ AnimalDetails has more than one row for animal {}; using the first", key);
            }
        }
    }

    pub fn load_errors(&self) -> Vec<&FieldError> {
        [
            self.admissions.as_ref().err(),
            self.details.as_ref().err(),
            self.exits.as_ref().err(),
            self.medical.as_ref().err(),
            self.stays.as_ref().err(),
            self.kennels.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn admissions(&self) -> Result<&Table<AnimalAdmission>> {
        borrow(&self.admissions)
    }

    pub fn details(&self) -> Result<&Table<AnimalDetails>> {
        borrow(&self.details)
    }

    pub fn exits(&self) -> Result<&Table<ExitStatus>> {
        borrow(&self.exits)
    }

    pub fn medical(&self) -> Result<&Table<MedicalHistory>> {
        borrow(&self.medical)
    }

    pub fn stays(&self) -> Result<&Table<ShelterStayDetails>> {
        borrow(&self.stays)
    }

    pub fn kennels(&self) -> Result<&Table<KennelStatusLog>> {
        borrow(&self.kennels)
    }

    /// 最近一次入所：入所日期最晚者，同日則取 Impound_Number 較大者
    pub fn latest_admission(&self, animal_id: &str) -> Result<Option<&AnimalAdmission>> {
        Ok(self
            .admissions()?
            .by_animal(animal_id)
            .max_by(|a, b| {
                a.intake_date
                    .cmp(&b.intake_date)
                    .then_with(|| a.impound_number.cmp(&b.impound_number))
            }))
    }

    /// 最近一次入所沒有離所紀錄，就代表動物目前還在收容所
    pub fn is_currently_in_shelter(&self, animal_id: &str) -> Result<bool> {
        let exits = self.exits()?;
        Ok(self
            .latest_admission(animal_id)?
            .is_some_and(|a| exits.first_by_impound(&a.impound_number).is_none()))
    }

    /// 所有目前在所動物的最近一次入所，依 Animal_Id 排序
    pub fn current_admissions(&self) -> Result<Vec<CurrentAdmission<'_>>> {
        let admissions = self.admissions()?;
        let exits = self.exits()?;
        let details = self.details()?;

        let mut latest: BTreeMap<&str, &AnimalAdmission> = BTreeMap::new();
        for admission in admissions.rows() {
            latest
                .entry(admission.animal_id.as_str())
                .and_modify(|current| {
                    let newer = (admission.intake_date, &admission.impound_number)
                        > (current.intake_date, &current.impound_number);
                    if newer {
                        *current = admission;
                    }
                })
                .or_insert(admission);
        }

        Ok(latest
            .into_values()
            .filter(|admission| exits.first_by_impound(&admission.impound_number).is_none())
            .map(|admission| CurrentAdmission {
                admission,
                details: details.first_by_animal(&admission.animal_id),
            })
            .collect())
    }
}
