//! Score accumulation and time bucketing.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use super::report::ScoreBucket;

/// Running count and sum of percentage scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreAccumulator {
    count: u32,
    sum: u64,
}

impl ScoreAccumulator {
    pub fn add(&mut self, percentage: u32) {
        self.count += 1;
        self.sum += u64::from(percentage);
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / f64::from(self.count)
        }
    }

    /// Mean rounded half up; 0 when empty.
    #[must_use]
    pub fn rounded_mean(&self) -> u32 {
        rounded_mean(self.sum, self.count)
    }
}

/// `round(sum / count)` in integers, 0 for an empty set.
#[must_use]
pub fn rounded_mean(sum: u64, count: u32) -> u32 {
    if count == 0 {
        return 0;
    }
    let count = u64::from(count);
    ((2 * sum + count) / (2 * count)) as u32
}

/// Scores bucketed by UTC calendar date, reported oldest first.
#[derive(Debug, Default)]
pub struct DailySeries {
    buckets: BTreeMap<NaiveDate, ScoreAccumulator>,
}

impl DailySeries {
    pub fn add(&mut self, at: DateTime<Utc>, percentage: u32) {
        self.buckets.entry(at.date_naive()).or_default().add(percentage);
    }

    #[must_use]
    pub fn into_buckets(self) -> Vec<ScoreBucket> {
        self.buckets
            .into_iter()
            .map(|(date, acc)| ScoreBucket {
                label: date.format("%Y-%m-%d").to_string(),
                attempts: acc.count(),
                average_score: acc.mean(),
            })
            .collect()
    }
}

/// Scores bucketed by `Mon YYYY`, reported in order of first appearance.
#[derive(Debug, Default)]
pub struct MonthlySeries {
    buckets: Vec<(String, ScoreAccumulator)>,
}

impl MonthlySeries {
    pub fn add(&mut self, at: DateTime<Utc>, percentage: u32) {
        let label = at.format("%b %Y").to_string();
        match self.buckets.iter_mut().find(|(l, _)| *l == label) {
            Some((_, acc)) => acc.add(percentage),
            None => {
                let mut acc = ScoreAccumulator::default();
                acc.add(percentage);
                self.buckets.push((label, acc));
            }
        }
    }

    #[must_use]
    pub fn into_buckets(self) -> Vec<ScoreBucket> {
        self.buckets
            .into_iter()
            .map(|(label, acc)| ScoreBucket {
                label,
                attempts: acc.count(),
                average_score: acc.mean(),
            })
            .collect()
    }
}
