use serde::{Deserialize, Serialize};
use std::fmt;

/// 把 `[min, min + range]` 等分成三段，回傳 `value` 所在那段的標籤。
///
/// 每段的上界都算在該段內：`Low ≤ min+range/3 < Moderate ≤ min+2·range/3 < High`。
/// `range == 0` 時所有值都落在最低的一段。
pub fn bucketize<'a>(value: f64, min: f64, range: f64, labels: &'a [&'a str; 3]) -> &'a str {
    let third = range / 3.0;
    if value <= min + third {
        labels[0]
    } else if value <= min + 2.0 * third {
        labels[1]
    } else {
        labels[2]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trend {
    Increase,
    Decrease,
    NoChange,
    /// 第一期，沒有可比較的前值
    NoPriorPeriod,
}

impl Trend {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Trend::Increase => Some("Increase"),
            Trend::Decrease => Some("Decrease"),
            Trend::NoChange => Some("No Change"),
            Trend::NoPriorPeriod => None,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().unwrap_or("No Prior Period"))
    }
}

pub fn trend_label(delta: Option<i64>) -> Trend {
    match delta {
        None => Trend::NoPriorPeriod,
        Some(d) if d > 0 => Trend::Increase,
        Some(d) if d < 0 => Trend::Decrease,
        Some(_) => Trend::NoChange,
    }
}

/// 第一期（沒有前值）在結果中如何呈現
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirstPeriodPolicy {
    /// 輸出缺值，與「沒有變化」區分
    #[default]
    Absent,
    /// 與「沒有變化」合併，輸出 `No Change`
    NoChange,
}

impl FirstPeriodPolicy {
    pub fn render(&self, trend: Trend) -> Option<&'static str> {
        match (self, trend) {
            (FirstPeriodPolicy::NoChange, Trend::NoPriorPeriod) => Trend::NoChange.label(),
            (_, trend) => trend.label(),
        }
    }
}

impl std::str::FromStr for FirstPeriodPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "absent" => Ok(FirstPeriodPolicy::Absent),
            "no-change" | "no_change" => Ok(FirstPeriodPolicy::NoChange),
            other => Err(format!("unknown first period policy: {}", other)),
        }
    }
}
