//! Reporting windows for the test-score series.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// How far back test attempts are considered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
}

impl TimeRange {
    /// Convert to the label used by dashboards.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreeMonths => "3m",
            Self::SixMonths => "6m",
            Self::OneYear => "1y",
        }
    }

    /// Parse a dashboard label.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "3m" => Some(Self::ThreeMonths),
            "6m" => Some(Self::SixMonths),
            "1y" => Some(Self::OneYear),
            _ => None,
        }
    }

    /// Parse a dashboard label, falling back to three months.
    #[must_use]
    pub fn from_label(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    #[must_use]
    pub fn months(&self) -> u32 {
        match self {
            Self::ThreeMonths => 3,
            Self::SixMonths => 6,
            Self::OneYear => 12,
        }
    }

    /// First instant inside the window ending at `now`.
    ///
    /// Calendar-month subtraction clamps to the end of shorter months
    /// (May 31 minus three months is February 28/29).
    #[must_use]
    pub fn start_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_months(Months::new(self.months()))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
