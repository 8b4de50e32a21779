//! 八個分析問題。每個問題都是對整份資料集的純轉換：過濾 → join → 分組 → 排名或前值 → 百分比。

use crate::core::classify::{bucketize, trend_label, FirstPeriodPolicy};
use crate::core::dataset::{CurrentAdmission, Dataset};
use crate::core::ops::{self, Aggregate, SortDirection};
use crate::domain::model::{
    AnimalAdmission, AnimalDetails, ExitStatus, KennelStatusLog, ShelterStayDetails, YearMonth,
};
use crate::domain::report::{Percentage, ReportRow, ReportTable, Value};
use crate::utils::error::Result;
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const UNKNOWN_TYPE: &str = "Unknown";
const OWNER_SURRENDER: &str = "Owner Surrender";
const ADOPTION: &str = "Adoption";
const EUTHANASIA: &str = "Euthanasia";
const CRITICAL: &str = "Critical";
const INTAKE_LEVELS: [&str; 3] = ["Low Intake", "Moderate Intake", "High Intake"];

/// 各問題的參數；「今天」由呼叫端注入，不直接讀系統時鐘
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    pub as_of: NaiveDate,
    pub trend_reference_month: Option<YearMonth>,
    pub adoption_window_months: u32,
    pub staff_month: YearMonth,
    pub longest_stay_limit: usize,
    pub staff_top_n: usize,
    pub first_period_policy: FirstPeriodPolicy,
}

impl QueryParams {
    pub const DEFAULT_ADOPTION_WINDOW_MONTHS: u32 = 12;
    pub const DEFAULT_LONGEST_STAY_LIMIT: usize = 10;
    pub const DEFAULT_STAFF_TOP_N: usize = 5;

    pub fn new(as_of: NaiveDate, staff_month: YearMonth) -> Self {
        Self {
            as_of,
            trend_reference_month: None,
            adoption_window_months: Self::DEFAULT_ADOPTION_WINDOW_MONTHS,
            staff_month,
            longest_stay_limit: Self::DEFAULT_LONGEST_STAY_LIMIT,
            staff_top_n: Self::DEFAULT_STAFF_TOP_N,
            first_period_policy: FirstPeriodPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Question {
    PopulationMix,
    IntakeTrend,
    SurrenderPatterns,
    StaffWorkload,
    AdoptionTrend,
    CriticalEuthanasia,
    KennelAvailability,
    LongestStays,
}

impl Question {
    pub const ALL: [Question; 8] = [
        Question::PopulationMix,
        Question::IntakeTrend,
        Question::SurrenderPatterns,
        Question::StaffWorkload,
        Question::AdoptionTrend,
        Question::CriticalEuthanasia,
        Question::KennelAvailability,
        Question::LongestStays,
    ];

    pub fn number(&self) -> usize {
        match self {
            Question::PopulationMix => 1,
            Question::IntakeTrend => 2,
            Question::SurrenderPatterns => 3,
            Question::StaffWorkload => 4,
            Question::AdoptionTrend => 5,
            Question::CriticalEuthanasia => 6,
            Question::KennelAvailability => 7,
            Question::LongestStays => 8,
        }
    }

    /// 輸出檔名用的代稱，例如 `q1_population_mix`
    pub fn slug(&self) -> &'static str {
        match self {
            Question::PopulationMix => "q1_population_mix",
            Question::IntakeTrend => "q2_intake_trend",
            Question::SurrenderPatterns => "q3_surrender_patterns",
            Question::StaffWorkload => "q4_staff_workload",
            Question::AdoptionTrend => "q5_adoption_trend",
            Question::CriticalEuthanasia => "q6_critical_euthanasia",
            Question::KennelAvailability => "q7_kennel_availability",
            Question::LongestStays => "q8_longest_stays",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Question::PopulationMix => "Current population mix by animal type",
            Question::IntakeTrend => "Monthly intake trend classification",
            Question::SurrenderPatterns => "Most surrendered breed per animal type",
            Question::StaffWorkload => "Staff workload ranking",
            Question::AdoptionTrend => "Month over month adoption trend",
            Question::CriticalEuthanasia => "Euthanasia rate among critical intakes",
            Question::KennelAvailability => "Current kennel availability",
            Question::LongestStays => "Animals with the longest current stay",
        }
    }

    pub fn run(&self, dataset: &Dataset, params: &QueryParams) -> Result<ReportTable> {
        let (slug, title) = (self.slug(), self.title());
        Ok(match self {
            Question::PopulationMix => ReportTable::from_rows(slug, title, &population_mix(dataset)?),
            Question::IntakeTrend => ReportTable::from_rows(slug, title, &intake_trend(dataset, params)?),
            Question::SurrenderPatterns => {
                ReportTable::from_rows(slug, title, &surrender_patterns(dataset)?)
            }
            Question::StaffWorkload => ReportTable::from_rows(slug, title, &staff_workload(dataset, params)?),
            Question::AdoptionTrend => ReportTable::from_rows(slug, title, &adoption_trend(dataset, params)?),
            Question::CriticalEuthanasia => {
                ReportTable::from_rows(slug, title, &critical_euthanasia(dataset)?)
            }
            Question::KennelAvailability => {
                ReportTable::from_rows(slug, title, &kennel_availability(dataset)?)
            }
            Question::LongestStays => ReportTable::from_rows(slug, title, &longest_stays(dataset, params)?),
        })
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{} {}", self.number(), self.title())
    }
}

fn animal_type_of(current: &CurrentAdmission<'_>) -> String {
    current
        .details
        .map(|d| d.animal_type.clone())
        .unwrap_or_else(|| UNKNOWN_TYPE.to_string())
}

fn text_or_absent(value: Option<&str>) -> Value {
    value.map(|s| Value::text(s)).into()
}

// ---------------------------------------------------------------------------
// Q1

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopulationShare {
    pub animal_type: String,
    pub animal_count: i64,
    pub percentage: Option<Percentage>,
}

impl ReportRow for PopulationShare {
    const COLUMNS: &'static [&'static str] = &["Animal_Type", "Animal_Count", "Percentage"];

    fn cells(&self) -> Vec<Value> {
        vec![
            Value::text(&self.animal_type),
            Value::Int(self.animal_count),
            self.percentage.map(Value::Percent).into(),
        ]
    }
}

pub fn population_mix(dataset: &Dataset) -> Result<Vec<PopulationShare>> {
    let current = dataset.current_admissions()?;
    let groups = ops::group_by(
        &current,
        animal_type_of,
        &[Aggregate::count_distinct(|c: &CurrentAdmission<'_>| {
            Value::text(&c.admission.animal_id)
        })],
    );

    let total: i64 = groups.iter().map(|g| g.int(0)).sum();
    let mut rows: Vec<PopulationShare> = groups
        .into_iter()
        .map(|g| PopulationShare {
            animal_count: g.int(0),
            percentage: ops::percentage_of(g.int(0) as u64, total as u64),
            animal_type: g.key,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.animal_count
            .cmp(&a.animal_count)
            .then_with(|| a.animal_type.cmp(&b.animal_type))
    });
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Q2

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeTrendRow {
    pub intake_month: YearMonth,
    pub intake_count: i64,
    pub intake_level: String,
}

impl ReportRow for IntakeTrendRow {
    const COLUMNS: &'static [&'static str] = &["Intake_Month", "Intake_Count", "Intake_Level"];

    fn cells(&self) -> Vec<Value> {
        vec![
            Value::Month(self.intake_month),
            Value::Int(self.intake_count),
            Value::text(&self.intake_level),
        ]
    }
}

/// `Outcome_Date IS NULL OR Outcome_Date > LAST_DAY(ref)`，`ref` 預設為入所當月
fn counts_toward_trend(
    admission: &AnimalAdmission,
    exit: Option<&ExitStatus>,
    reference: Option<YearMonth>,
) -> bool {
    let cutoff = reference
        .unwrap_or_else(|| YearMonth::of(admission.intake_date))
        .last_day();
    exit.map_or(true, |e| e.outcome_date > cutoff)
}

pub fn intake_trend(dataset: &Dataset, params: &QueryParams) -> Result<Vec<IntakeTrendRow>> {
    let admissions = dataset.admissions()?;
    let exits = dataset.exits()?;

    // 同一 Impound_Number 有多筆離所紀錄時以第一筆為準
    let open: Vec<(&AnimalAdmission, Option<&ExitStatus>)> = admissions
        .rows()
        .iter()
        .map(|a| (a, exits.first_by_impound(&a.impound_number)))
        .filter(|(a, e)| counts_toward_trend(a, *e, params.trend_reference_month))
        .collect();

    let groups = ops::group_by(
        &open,
        |(a, _)| YearMonth::of(a.intake_date),
        &[Aggregate::count_distinct(
            |(a, _): &(&AnimalAdmission, Option<&ExitStatus>)| Value::text(&a.impound_number),
        )],
    );

    let counts: Vec<i64> = groups.iter().map(|g| g.int(0)).collect();
    let min = counts.iter().copied().min().unwrap_or(0);
    let max = counts.iter().copied().max().unwrap_or(0);
    let range = (max - min) as f64;

    Ok(groups
        .into_iter()
        .map(|g| IntakeTrendRow {
            intake_month: g.key,
            intake_count: g.int(0),
            intake_level: bucketize(g.int(0) as f64, min as f64, range, &INTAKE_LEVELS).to_string(),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Q3

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurrenderPattern {
    pub animal_type: String,
    pub animal_breed: String,
    pub surrender_count: i64,
    pub breed_rank: usize,
}

impl ReportRow for SurrenderPattern {
    const COLUMNS: &'static [&'static str] =
        &["Animal_Type", "Animal_Breed", "Surrender_Count", "Breed_Rank"];

    fn cells(&self) -> Vec<Value> {
        vec![
            Value::text(&self.animal_type),
            Value::text(&self.animal_breed),
            Value::Int(self.surrender_count),
            Value::Int(self.breed_rank as i64),
        ]
    }
}

pub fn surrender_patterns(dataset: &Dataset) -> Result<Vec<SurrenderPattern>> {
    let admissions = dataset.admissions()?;
    let details = dataset.details()?;

    let surrendered: Vec<&AnimalAdmission> = admissions
        .rows()
        .iter()
        .filter(|a| a.intake_type.trim().eq_ignore_ascii_case(OWNER_SURRENDER))
        .collect();

    // 沒有明細的動物不列入；重複的明細以第一筆為準
    let joined: Vec<(&AnimalAdmission, &AnimalDetails)> = surrendered
        .into_iter()
        .filter_map(|a| details.first_by_animal(&a.animal_id).map(|d| (a, d)))
        .collect();

    let groups = ops::group_by(
        &joined,
        |(_, d)| (d.animal_type.clone(), d.animal_breed.clone()),
        &[Aggregate::count_distinct(
            |(a, _): &(&AnimalAdmission, &AnimalDetails)| Value::text(&a.animal_id),
        )],
    );

    let ranked = ops::window_rank(
        groups,
        |g| g.key.0.clone(),
        |g| g.int(0),
        SortDirection::Descending,
    );

    let mut rows: Vec<SurrenderPattern> = ranked
        .into_iter()
        .filter(|r| r.rank == 1)
        .map(|r| SurrenderPattern {
            surrender_count: r.row.int(0),
            breed_rank: r.rank,
            animal_type: r.row.key.0,
            animal_breed: r.row.key.1,
        })
        .collect();

    rows.sort_by(|a, b| {
        a.animal_type
            .cmp(&b.animal_type)
            .then_with(|| a.animal_breed.cmp(&b.animal_breed))
    });
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Q4

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffWorkload {
    pub staff_id: String,
    pub animals_handled: i64,
    pub workload_rank: usize,
}

impl ReportRow for StaffWorkload {
    const COLUMNS: &'static [&'static str] = &["Staff_Id", "Animals_Handled", "Workload_Rank"];

    fn cells(&self) -> Vec<Value> {
        vec![
            Value::text(&self.staff_id),
            Value::Int(self.animals_handled),
            Value::Int(self.workload_rank as i64),
        ]
    }
}

pub fn staff_workload(dataset: &Dataset, params: &QueryParams) -> Result<Vec<StaffWorkload>> {
    let admissions = dataset.admissions()?;
    let stays = dataset.stays()?;

    let in_month: Vec<&AnimalAdmission> = admissions
        .rows()
        .iter()
        .filter(|a| params.staff_month.contains(a.intake_date))
        .collect();

    let joined = ops::inner_join_on(
        stays.rows(),
        &in_month,
        |s| s.impound_number.as_str(),
        |a| a.impound_number.as_str(),
    );

    let groups = ops::group_by(
        &joined,
        |(s, _)| s.staff_id.clone(),
        &[Aggregate::count_distinct(
            |(s, _): &(&ShelterStayDetails, &&AnimalAdmission)| Value::text(&s.impound_number),
        )],
    );

    let ranked = ops::window_rank(groups, |_| (), |g| g.int(0), SortDirection::Descending);

    let mut rows: Vec<StaffWorkload> = ranked
        .into_iter()
        .filter(|r| r.rank <= params.staff_top_n)
        .map(|r| StaffWorkload {
            animals_handled: r.row.int(0),
            workload_rank: r.rank,
            staff_id: r.row.key,
        })
        .collect();

    rows.sort_by(|a, b| {
        a.workload_rank
            .cmp(&b.workload_rank)
            .then_with(|| a.staff_id.cmp(&b.staff_id))
    });
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Q5

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdoptionTrendRow {
    pub outcome_month: YearMonth,
    pub adoptions: i64,
    pub previous_adoptions: Option<i64>,
    pub change: Option<i64>,
    pub trend: Option<&'static str>,
}

impl ReportRow for AdoptionTrendRow {
    const COLUMNS: &'static [&'static str] =
        &["Outcome_Month", "Adoptions", "Previous_Adoptions", "Change", "Trend"];

    fn cells(&self) -> Vec<Value> {
        vec![
            Value::Month(self.outcome_month),
            Value::Int(self.adoptions),
            self.previous_adoptions.map(Value::Int).into(),
            self.change.map(Value::Int).into(),
            text_or_absent(self.trend),
        ]
    }
}

pub fn adoption_trend(dataset: &Dataset, params: &QueryParams) -> Result<Vec<AdoptionTrendRow>> {
    let exits = dataset.exits()?;
    let window_start = params
        .as_of
        .checked_sub_months(Months::new(params.adoption_window_months))
        .unwrap_or(NaiveDate::MIN);

    let adoptions: Vec<&ExitStatus> = exits
        .rows()
        .iter()
        .filter(|e| e.outcome_type.trim().eq_ignore_ascii_case(ADOPTION))
        .filter(|e| e.outcome_date > window_start && e.outcome_date <= params.as_of)
        // 同一 Impound_Number 只採用第一筆離所紀錄
        .filter(|e| {
            exits
                .first_by_impound(&e.impound_number)
                .is_some_and(|first| std::ptr::eq(first, *e))
        })
        .collect();

    let groups = ops::group_by(
        &adoptions,
        |e| YearMonth::of(e.outcome_date),
        &[Aggregate::count_distinct(|e: &&ExitStatus| Value::text(&e.impound_number))],
    );

    let lagged = ops::window_lag(groups, |g| g.key, |g| g.int(0), 1);

    Ok(lagged
        .into_iter()
        .map(|l| {
            let adoptions = l.row.int(0);
            let change = l.lag.map(|previous| adoptions - previous);
            AdoptionTrendRow {
                outcome_month: l.row.key,
                adoptions,
                previous_adoptions: l.lag,
                change,
                trend: params.first_period_policy.render(trend_label(change)),
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Q6

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalOutcome {
    pub animal_type: String,
    pub critical_intakes: i64,
    pub euthanized: i64,
    pub euthanasia_rate: Option<Percentage>,
}

impl ReportRow for CriticalOutcome {
    const COLUMNS: &'static [&'static str] =
        &["Animal_Type", "Critical_Intakes", "Euthanized", "Euthanasia_Rate"];

    fn cells(&self) -> Vec<Value> {
        vec![
            Value::text(&self.animal_type),
            Value::Int(self.critical_intakes),
            Value::Int(self.euthanized),
            self.euthanasia_rate.map(Value::Percent).into(),
        ]
    }
}

pub fn critical_euthanasia(dataset: &Dataset) -> Result<Vec<CriticalOutcome>> {
    let admissions = dataset.admissions()?;
    let medical = dataset.medical()?;
    let exits = dataset.exits()?;
    let details = dataset.details()?;

    // 同一次入所可能有多筆醫療紀錄，先去重
    let critical_impounds: BTreeSet<&str> = medical
        .rows()
        .iter()
        .filter(|m| m.intake_condition.trim().eq_ignore_ascii_case(CRITICAL))
        .map(|m| m.impound_number.as_str())
        .collect();

    // 入所與離所重複的 Impound_Number 都以第一筆為準，每次入所只算一列
    let with_exit: Vec<(&AnimalAdmission, Option<&ExitStatus>)> = critical_impounds
        .into_iter()
        .filter_map(|impound| admissions.first_by_impound(impound))
        .map(|a| (a, exits.first_by_impound(&a.impound_number)))
        .collect();

    let groups = ops::group_by(
        &with_exit,
        |(a, _)| {
            details
                .first_by_animal(&a.animal_id)
                .map(|d| d.animal_type.clone())
                .unwrap_or_else(|| UNKNOWN_TYPE.to_string())
        },
        &[
            Aggregate::count_distinct(|(a, _): &(&AnimalAdmission, Option<&ExitStatus>)| {
                Value::text(&a.impound_number)
            }),
            Aggregate::sum(|(_, e): &(&AnimalAdmission, Option<&ExitStatus>)| {
                let euthanized = e.is_some_and(|e| e.outcome_type.trim().eq_ignore_ascii_case(EUTHANASIA));
                i64::from(euthanized)
            }),
        ],
    );

    let mut rows: Vec<CriticalOutcome> = groups
        .into_iter()
        .map(|g| CriticalOutcome {
            critical_intakes: g.int(0),
            euthanized: g.int(1),
            euthanasia_rate: ops::percentage_of(g.int(1) as u64, g.int(0) as u64),
            animal_type: g.key,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.euthanasia_rate
            .cmp(&a.euthanasia_rate)
            .then_with(|| a.animal_type.cmp(&b.animal_type))
    });
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Q7

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KennelStatusShare {
    pub kennel_status: String,
    pub kennel_count: i64,
    pub percentage: Option<Percentage>,
}

impl ReportRow for KennelStatusShare {
    const COLUMNS: &'static [&'static str] = &["Kennel_Status", "Kennel_Count", "Percentage"];

    fn cells(&self) -> Vec<Value> {
        vec![
            Value::text(&self.kennel_status),
            Value::Int(self.kennel_count),
            self.percentage.map(Value::Percent).into(),
        ]
    }
}

/// 每個籠位最新的一筆狀態紀錄
pub fn latest_kennel_status(logs: &[KennelStatusLog]) -> Vec<&KennelStatusLog> {
    let ranked = ops::window_rank(
        logs.iter().collect(),
        |k: &&KennelStatusLog| k.kennel_number.clone(),
        |k: &&KennelStatusLog| k.log_id,
        SortDirection::Descending,
    );

    let mut latest: Vec<&KennelStatusLog> = ranked
        .into_iter()
        .filter(|r| r.rank == 1)
        .map(|r| r.row)
        .collect();
    // Log_Id 重複時每個籠位只留一筆
    latest.dedup_by(|a, b| a.kennel_number == b.kennel_number);
    latest
}

pub fn kennel_availability(dataset: &Dataset) -> Result<Vec<KennelStatusShare>> {
    let kennels = dataset.kennels()?;
    let latest = latest_kennel_status(kennels.rows());

    let groups = ops::group_by(&latest, |k| k.kennel_status.clone(), &[Aggregate::Count]);
    let total = latest.len() as u64;

    let mut rows: Vec<KennelStatusShare> = groups
        .into_iter()
        .map(|g| KennelStatusShare {
            kennel_count: g.int(0),
            percentage: ops::percentage_of(g.int(0) as u64, total),
            kennel_status: g.key,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.kennel_count
            .cmp(&a.kennel_count)
            .then_with(|| a.kennel_status.cmp(&b.kennel_status))
    });
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Q8

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LongestStay {
    pub animal_id: String,
    pub animal_type: Option<String>,
    pub animal_breed: Option<String>,
    pub impound_number: String,
    pub intake_date: NaiveDate,
    pub days_in_shelter: i64,
}

impl ReportRow for LongestStay {
    const COLUMNS: &'static [&'static str] = &[
        "Animal_Id",
        "Animal_Type",
        "Animal_Breed",
        "Impound_Number",
        "Intake_Date",
        "Days_In_Shelter",
    ];

    fn cells(&self) -> Vec<Value> {
        vec![
            Value::text(&self.animal_id),
            text_or_absent(self.animal_type.as_deref()),
            text_or_absent(self.animal_breed.as_deref()),
            Value::text(&self.impound_number),
            Value::Date(self.intake_date),
            Value::Int(self.days_in_shelter),
        ]
    }
}

pub fn longest_stays(dataset: &Dataset, params: &QueryParams) -> Result<Vec<LongestStay>> {
    let mut rows: Vec<LongestStay> = dataset
        .current_admissions()?
        .into_iter()
        // as_of 之後才入所的不列入，天數不會是負的
        .filter(|c| c.admission.intake_date <= params.as_of)
        .map(|c| LongestStay {
            animal_id: c.admission.animal_id.clone(),
            animal_type: c.details.map(|d| d.animal_type.clone()),
            animal_breed: c.details.map(|d| d.animal_breed.clone()),
            impound_number: c.admission.impound_number.clone(),
            intake_date: c.admission.intake_date,
            days_in_shelter: (params.as_of - c.admission.intake_date).num_days(),
        })
        .collect();

    rows.sort_by(|a, b| {
        b.days_in_shelter
            .cmp(&a.days_in_shelter)
            .then_with(|| a.animal_id.cmp(&b.animal_id))
    });
    rows.truncate(params.longest_stay_limit);
    Ok(rows)
}
