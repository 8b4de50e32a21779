use crate::core::classify::FirstPeriodPolicy;
use crate::core::queries::QueryParams;
use crate::domain::model::YearMonth;
use crate::utils::error::{ReportError, Result};
use crate::utils::validation::{validate_positive_number, validate_range};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MAX_ADOPTION_WINDOW_MONTHS: u32 = 120;

/// 問題參數；TOML 的 `[parameters]` 與命令列旗標共用同一份定義
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
#[serde(default)]
pub struct ParameterConfig {
    // 未指定時使用執行當天
    #[cfg_attr(feature = "cli", arg(long, help = "Report date (YYYY-MM-DD) [default: today]"))]
    pub as_of: Option<NaiveDate>,

    #[cfg_attr(feature = "cli", arg(long, help = "Month for the staff workload report (YYYY-MM) [default: month of --as-of]"))]
    pub staff_month: Option<YearMonth>,

    #[cfg_attr(feature = "cli", arg(long, help = "Reference month for the intake trend (YYYY-MM)"))]
    pub trend_reference_month: Option<YearMonth>,

    #[cfg_attr(feature = "cli", arg(long, help = "Trailing window for the adoption trend [default: 12]"))]
    pub adoption_window_months: Option<u32>,

    #[cfg_attr(feature = "cli", arg(long, help = "Rows in the longest stays report [default: 10]"))]
    pub longest_stay_limit: Option<usize>,

    #[cfg_attr(feature = "cli", arg(long, help = "Workload ranks to keep [default: 5]"))]
    pub staff_top_n: Option<usize>,

    #[cfg_attr(feature = "cli", arg(long, help = "Trend of the first month: absent or no-change [default: absent]"))]
    pub first_period_policy: Option<FirstPeriodPolicy>,
}

impl ParameterConfig {
    /// 以 `overrides` 中有值的欄位覆蓋目前設定
    pub fn merge(&mut self, overrides: &ParameterConfig) {
        if overrides.as_of.is_some() {
            self.as_of = overrides.as_of;
        }
        if overrides.staff_month.is_some() {
            self.staff_month = overrides.staff_month;
        }
        if overrides.trend_reference_month.is_some() {
            self.trend_reference_month = overrides.trend_reference_month;
        }
        if overrides.adoption_window_months.is_some() {
            self.adoption_window_months = overrides.adoption_window_months;
        }
        if overrides.longest_stay_limit.is_some() {
            self.longest_stay_limit = overrides.longest_stay_limit;
        }
        if overrides.staff_top_n.is_some() {
            self.staff_top_n = overrides.staff_top_n;
        }
        if overrides.first_period_policy.is_some() {
            self.first_period_policy = overrides.first_period_policy;
        }
    }

    /// 沒有設定 as_of 時填入 `today`，回傳實際使用的日期
    pub fn as_of_or(&mut self, today: NaiveDate) -> NaiveDate {
        *self.as_of.get_or_insert(today)
    }

    pub fn validate(&self, section: &str) -> Result<()> {
        if let Some(window) = self.adoption_window_months {
            validate_range(
                &format!("{}.adoption_window_months", section),
                window,
                1,
                MAX_ADOPTION_WINDOW_MONTHS,
            )?;
        }
        if let Some(limit) = self.longest_stay_limit {
            validate_positive_number(&format!("{}.longest_stay_limit", section), limit, 1)?;
        }
        if let Some(top_n) = self.staff_top_n {
            validate_positive_number(&format!("{}.staff_top_n", section), top_n, 1)?;
        }
        Ok(())
    }

    pub fn to_query_params(&self) -> Result<QueryParams> {
        let as_of = self.as_of.ok_or_else(|| ReportError::MissingConfigError {
            field: "parameters.as_of".to_string(),
        })?;
        let staff_month = self.staff_month.unwrap_or_else(|| YearMonth::of(as_of));

        let mut params = QueryParams::new(as_of, staff_month);
        params.trend_reference_month = self.trend_reference_month;
        if let Some(window) = self.adoption_window_months {
            params.adoption_window_months = window;
        }
        if let Some(limit) = self.longest_stay_limit {
            params.longest_stay_limit = limit;
        }
        if let Some(top_n) = self.staff_top_n {
            params.staff_top_n = top_n;
        }
        if let Some(policy) = self.first_period_policy {
            params.first_period_policy = policy;
        }
        Ok(params)
    }
}
