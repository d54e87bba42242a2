use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Chart window ending today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartPeriod {
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "YTD")]
    YearToDate,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "5Y")]
    FiveYears,
    #[serde(rename = "MAX")]
    Max,
}

impl ChartPeriod {
    /// The 1D chart is synthesized intraday, not read from daily snapshots.
    pub fn is_intraday(self) -> bool {
        matches!(self, ChartPeriod::OneDay)
    }

    /// First date of the window; `None` for all history.
    pub fn start_date(self, today: NaiveDate) -> Option<NaiveDate> {
        let days = match self {
            ChartPeriod::OneDay => 1,
            ChartPeriod::OneWeek => 7,
            ChartPeriod::OneMonth => 30,
            ChartPeriod::ThreeMonths => 90,
            ChartPeriod::SixMonths => 180,
            ChartPeriod::OneYear => 365,
            ChartPeriod::FiveYears => 1825,
            ChartPeriod::YearToDate => return NaiveDate::from_ymd_opt(today.year(), 1, 1),
            ChartPeriod::Max => return None,
        };
        Some(today - Duration::days(days))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChartPeriod::OneDay => "1D",
            ChartPeriod::OneWeek => "1W",
            ChartPeriod::OneMonth => "1M",
            ChartPeriod::ThreeMonths => "3M",
            ChartPeriod::SixMonths => "6M",
            ChartPeriod::YearToDate => "YTD",
            ChartPeriod::OneYear => "1Y",
            ChartPeriod::FiveYears => "5Y",
            ChartPeriod::Max => "MAX",
        }
    }
}

impl fmt::Display for ChartPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let period = match s.trim().to_ascii_uppercase().as_str() {
            "1D" => ChartPeriod::OneDay,
            "1W" => ChartPeriod::OneWeek,
            "1M" => ChartPeriod::OneMonth,
            "3M" => ChartPeriod::ThreeMonths,
            "6M" => ChartPeriod::SixMonths,
            "YTD" => ChartPeriod::YearToDate,
            "1Y" => ChartPeriod::OneYear,
            "5Y" => ChartPeriod::FiveYears,
            "MAX" | "ALL" => ChartPeriod::Max,
            other => bail!("Unknown chart period '{other}' (expected 1D, 1W, 1M, 3M, 6M, YTD, 1Y, 5Y or MAX)"),
        };
        Ok(period)
    }
}
