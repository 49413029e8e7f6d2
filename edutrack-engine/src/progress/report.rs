//! Progress report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TimeRange;
use crate::types::LearnerId;

/// Video and test progress of one catalog chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterProgress {
    pub name: String,
    pub key: String,
    pub total_videos: u32,
    pub completed_videos: u32,
    /// Mean latest watch fraction over the chapter's videos, unwatched as 0.
    pub average_fraction: f64,
    /// `round(100 * completed / total)`, 100 for a chapter without videos.
    pub progress_percentage: u32,
    pub completed: bool,
    pub tests_taken: u32,
    pub average_score: u32,
}

/// Test statistics keyed by the chapter label recorded on the attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterScore {
    pub label: String,
    pub tests_taken: u32,
    pub average_score: u32,
}

/// Progress of one enrolled subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectProgress {
    pub subject_id: String,
    pub name: String,
    pub chapter_count: u32,
    pub chapters_completed: u32,
    pub total_videos: u32,
    pub completed_videos: u32,
    /// Rounded mean of the chapter progress percentages.
    pub progress_percentage: u32,
    pub tests_taken: u32,
    pub average_score: u32,
    pub no_tests_taken: bool,
    pub chapters: Vec<ChapterProgress>,
    pub chapter_scores: Vec<ChapterScore>,
}

/// Mean score of the attempts falling into one time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBucket {
    /// `YYYY-MM-DD` for daily buckets, `Mon YYYY` for monthly ones.
    pub label: String,
    pub attempts: u32,
    pub average_score: f64,
}

/// Totals across every reported subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub average_score: u32,
    /// Subjects that entered `average_score`.
    pub subjects_in_average: u32,
    pub tests_taken: u32,
    pub videos_completed: u32,
    pub videos_available: u32,
    pub chapters_completed: u32,
    pub chapters_available: u32,
    /// Names of subjects averaging below the weak threshold.
    pub weak_areas: Vec<String>,
}

/// Dashboard data for one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub learner_id: LearnerId,
    pub range: TimeRange,
    /// Attempts completed before this instant are left out.
    pub range_start: DateTime<Utc>,
    pub subjects: Vec<SubjectProgress>,
    pub daily: Vec<ScoreBucket>,
    pub monthly: Vec<ScoreBucket>,
    pub summary: ProgressSummary,
}

impl ProgressReport {
    /// The canonical report for a learner with nothing to report.
    #[must_use]
    pub fn empty(learner_id: LearnerId, range: TimeRange, range_start: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            range,
            range_start,
            subjects: Vec::new(),
            daily: Vec::new(),
            monthly: Vec::new(),
            summary: ProgressSummary::default(),
        }
    }

    #[must_use]
    pub fn subject(&self, subject_id: &str) -> Option<&SubjectProgress> {
        self.subjects.iter().find(|s| s.subject_id == subject_id)
    }
}
