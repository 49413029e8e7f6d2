//! Progress aggregation.
//!
//! [`aggregate`] folds a learner's activity snapshot into a
//! [`ProgressReport`]. It is a pure function: the same snapshot, instant
//! and policy always give the same report, and nothing is written.
//!
//! Canonical progress formula: a chapter's progress is
//! `round(100 * completed_videos / total_videos)` (100 when the chapter has
//! no videos), and a subject's progress is the rounded mean of its chapter
//! percentages (100 for a subject without chapters).

mod buckets;
mod matcher;
mod range;
mod report;

pub use buckets::{DailySeries, MonthlySeries, ScoreAccumulator, rounded_mean};
pub use matcher::{
    ChapterMatch, ChapterMatcher, DerivedKeyMatcher, EmbeddedNameMatcher, ExactLabelMatcher,
    MatcherChain,
};
pub use range::TimeRange;
pub use report::{
    ChapterProgress, ChapterScore, ProgressReport, ProgressSummary, ScoreBucket, SubjectProgress,
};

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::{ProgressPolicy, ZeroAttemptPolicy};
use crate::records::{SubjectCatalog, TestAttempt, VideoWatchEvent};
use crate::scoring::percentage;
use crate::types::LearnerId;

/// Everything the aggregator reads, fetched up front.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    pub learner_id: LearnerId,
    /// Enrolled subjects in enrollment order, with their catalog if one exists.
    pub subjects: Vec<(String, Option<SubjectCatalog>)>,
    pub attempts: Vec<TestAttempt>,
    pub videos: Vec<VideoWatchEvent>,
}

/// Per-subject accumulation state.
struct SubjectFold<'a> {
    catalog: &'a SubjectCatalog,
    chapters: Vec<ChapterProgress>,
    chapter_tests: Vec<ScoreAccumulator>,
    by_label: BTreeMap<String, ScoreAccumulator>,
    tests: ScoreAccumulator,
}

impl<'a> SubjectFold<'a> {
    fn new(
        catalog: &'a SubjectCatalog,
        videos: &HashMap<&str, &VideoWatchEvent>,
        policy: &ProgressPolicy,
    ) -> Self {
        let chapters: Vec<ChapterProgress> = catalog
            .chapters
            .iter()
            .map(|chapter| {
                let total = chapter.videos.len() as u32;
                let watched: Vec<&VideoWatchEvent> = chapter
                    .videos
                    .iter()
                    .filter_map(|v| videos.get(v.id.as_str()).copied())
                    .collect();
                let completed = watched.iter().filter(|e| e.completed).count() as u32;
                let (progress, average_fraction) = if total == 0 {
                    (100, 1.0)
                } else {
                    let fraction_sum: f64 = watched.iter().map(|e| e.fraction_watched).sum();
                    (percentage(completed, total), fraction_sum / f64::from(total))
                };

                ChapterProgress {
                    name: chapter.name.clone(),
                    key: chapter.chapter_key(),
                    total_videos: total,
                    completed_videos: completed,
                    average_fraction,
                    progress_percentage: progress,
                    completed: progress >= policy.chapter_done_threshold,
                    tests_taken: 0,
                    average_score: 0,
                }
            })
            .collect();

        Self {
            catalog,
            chapter_tests: vec![ScoreAccumulator::default(); chapters.len()],
            chapters,
            by_label: BTreeMap::new(),
            tests: ScoreAccumulator::default(),
        }
    }

    fn add_attempt(&mut self, attempt: &TestAttempt, matchers: &MatcherChain) {
        self.tests.add(attempt.percentage_score);
        self.by_label
            .entry(attempt.chapter_label.clone())
            .or_default()
            .add(attempt.percentage_score);
        if let Some(hit) = matchers.resolve(&attempt.chapter_label, &self.catalog.chapters) {
            self.chapter_tests[hit.index].add(attempt.percentage_score);
        }
    }

    fn finish(self) -> SubjectProgress {
        let mut chapters = self.chapters;
        for (chapter, tests) in chapters.iter_mut().zip(&self.chapter_tests) {
            chapter.tests_taken = tests.count();
            chapter.average_score = tests.rounded_mean();
        }

        let progress_percentage = if chapters.is_empty() {
            100
        } else {
            let sum: u64 = chapters
                .iter()
                .map(|c| u64::from(c.progress_percentage))
                .sum();
            rounded_mean(sum, chapters.len() as u32)
        };

        SubjectProgress {
            subject_id: self.catalog.subject_id.clone(),
            name: self.catalog.name.clone(),
            chapter_count: chapters.len() as u32,
            chapters_completed: chapters.iter().filter(|c| c.completed).count() as u32,
            total_videos: chapters.iter().map(|c| c.total_videos).sum(),
            completed_videos: chapters.iter().map(|c| c.completed_videos).sum(),
            progress_percentage,
            tests_taken: self.tests.count(),
            average_score: self.tests.rounded_mean(),
            no_tests_taken: self.tests.count() == 0,
            chapters,
            chapter_scores: self
                .by_label
                .into_iter()
                .map(|(label, acc)| ChapterScore {
                    label,
                    tests_taken: acc.count(),
                    average_score: acc.rounded_mean(),
                })
                .collect(),
        }
    }
}

/// Fold a snapshot into a progress report.
///
/// Subjects without a catalog are skipped entirely, including their
/// attempts in the time series. Only attempts completed at or after the
/// range start are counted; video data is never date filtered.
pub fn aggregate(
    snapshot: &ProgressSnapshot,
    range: TimeRange,
    now: DateTime<Utc>,
    policy: &ProgressPolicy,
    matchers: &MatcherChain,
) -> ProgressReport {
    let range_start = range.start_from(now);
    let mut report = ProgressReport::empty(snapshot.learner_id.clone(), range, range_start);

    let videos: HashMap<&str, &VideoWatchEvent> = snapshot
        .videos
        .iter()
        .map(|e| (e.video_id.as_str(), e))
        .collect();

    let mut seen = HashSet::new();
    let mut folds: Vec<SubjectFold<'_>> = Vec::new();
    for (subject_id, catalog) in &snapshot.subjects {
        if !seen.insert(subject_id.as_str()) {
            continue;
        }
        match catalog {
            Some(catalog) => folds.push(SubjectFold::new(catalog, &videos, policy)),
            None => warn!(%subject_id, "subject catalog missing, skipping subject"),
        }
    }
    if folds.is_empty() {
        return report;
    }

    let index: HashMap<String, usize> = folds
        .iter()
        .enumerate()
        .map(|(i, f)| (f.catalog.subject_id.clone(), i))
        .collect();

    let mut daily = DailySeries::default();
    let mut monthly = MonthlySeries::default();
    for attempt in snapshot
        .attempts
        .iter()
        .filter(|a| a.completed_at >= range_start)
    {
        let Some(&i) = index.get(attempt.subject_id.as_str()) else {
            debug!(subject_id = %attempt.subject_id, "attempt outside reported subjects");
            continue;
        };
        folds[i].add_attempt(attempt, matchers);
        daily.add(attempt.completed_at, attempt.percentage_score);
        monthly.add(attempt.completed_at, attempt.percentage_score);
    }

    report.subjects = folds.into_iter().map(SubjectFold::finish).collect();
    report.daily = daily.into_buckets();
    report.monthly = monthly.into_buckets();
    report.summary = summarize(&report.subjects, policy);
    report
}

fn summarize(subjects: &[SubjectProgress], policy: &ProgressPolicy) -> ProgressSummary {
    let averaged: Vec<&SubjectProgress> = subjects
        .iter()
        .filter(|s| match policy.zero_attempt_subjects {
            ZeroAttemptPolicy::IncludeAsZero => true,
            ZeroAttemptPolicy::Exclude => !s.no_tests_taken,
        })
        .collect();
    let average_sum: u64 = averaged.iter().map(|s| u64::from(s.average_score)).sum();

    ProgressSummary {
        average_score: rounded_mean(average_sum, averaged.len() as u32),
        subjects_in_average: averaged.len() as u32,
        tests_taken: subjects.iter().map(|s| s.tests_taken).sum(),
        videos_completed: subjects.iter().map(|s| s.completed_videos).sum(),
        videos_available: subjects.iter().map(|s| s.total_videos).sum(),
        chapters_completed: subjects.iter().map(|s| s.chapters_completed).sum(),
        chapters_available: subjects.iter().map(|s| s.chapter_count).sum(),
        weak_areas: subjects
            .iter()
            .filter(|s| s.average_score < policy.weak_threshold)
            .map(|s| s.name.clone())
            .collect(),
    }
}
