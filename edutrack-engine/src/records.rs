//! Persisted record types.
//!
//! These are the plain-data shapes exchanged with the activity store:
//! test attempts, video watch events, subject catalogs and the reward
//! ledger. Nothing here talks to storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commands::RecordVideoWatch;
use crate::types::{AttemptId, LearnerId};

/// Watch fraction at which a video counts as completed.
pub const VIDEO_COMPLETION_THRESHOLD: f64 = 0.90;

/// One answered question within an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_index: u32,
    pub submitted_value: String,
    pub correct: bool,
}

/// Reward granted for a single completed assessment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub xp_earned: u32,
    /// Tiered currency grant, always within `0..=10`.
    pub currency_earned: u32,
    pub points_earned: u32,
    /// Seconds left on the clock at submission.
    pub time_bonus: u32,
    /// XP contributed by the longest correct streak.
    pub streak_bonus: u32,
}

/// A scored quiz submission.
///
/// Keyed by (learner, assessment); a re-attempt overwrites the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestAttempt {
    pub attempt_id: AttemptId,
    pub learner_id: LearnerId,
    pub assessment_id: String,
    pub subject_id: String,
    pub chapter_label: String,
    pub answers: Vec<AnswerRecord>,
    pub correct_count: u32,
    pub total_questions: u32,
    pub percentage_score: u32,
    pub elapsed_seconds: u32,
    pub allowed_duration_seconds: u32,
    pub max_streak: u32,
    pub reward: RewardBreakdown,
    pub completed_at: DateTime<Utc>,
}

/// Merged watch state for one (learner, video) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoWatchEvent {
    pub learner_id: LearnerId,
    pub video_id: String,
    pub subject_id: String,
    pub chapter_key: String,
    /// Latest reported fraction, `0.0..=1.0`.
    pub fraction_watched: f64,
    /// Latches to true once the fraction reaches the completion threshold.
    pub completed: bool,
    pub watch_count: u32,
    pub last_watched_at: DateTime<Utc>,
}

impl VideoWatchEvent {
    /// Merge a watch report into the existing record, if any.
    ///
    /// The fraction is replaced, the completed flag never reverts and the
    /// watch count grows by one per report.
    #[must_use]
    pub fn merge(existing: Option<&VideoWatchEvent>, update: &RecordVideoWatch) -> Self {
        let reached = update.fraction_watched >= VIDEO_COMPLETION_THRESHOLD;
        match existing {
            Some(prev) => Self {
                learner_id: prev.learner_id.clone(),
                video_id: prev.video_id.clone(),
                subject_id: update.subject_id.clone(),
                chapter_key: update.chapter_key.clone(),
                fraction_watched: update.fraction_watched,
                completed: prev.completed || reached,
                watch_count: prev.watch_count.saturating_add(1),
                last_watched_at: update.watched_at,
            },
            None => Self {
                learner_id: update.learner_id.clone(),
                video_id: update.video_id.clone(),
                subject_id: update.subject_id.clone(),
                chapter_key: update.chapter_key.clone(),
                fraction_watched: update.fraction_watched,
                completed: reached,
                watch_count: 1,
                last_watched_at: update.watched_at,
            },
        }
    }
}

/// A video listed in a subject catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub id: String,
    pub title: String,
    /// Chapter name embedded in the video metadata by the content team.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_name: Option<String>,
}

/// A chapter in a subject catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogChapter {
    pub name: String,
    /// Catalog-native key. Derived from the name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub videos: Vec<VideoDescriptor>,
}

impl CatalogChapter {
    /// The chapter key, falling back to one derived from the name.
    #[must_use]
    pub fn chapter_key(&self) -> String {
        match &self.key {
            Some(key) if !key.trim().is_empty() => key.trim().to_string(),
            _ => derive_chapter_key(&self.name),
        }
    }
}

/// Read-only reference data for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectCatalog {
    pub subject_id: String,
    pub name: String,
    #[serde(default)]
    pub chapters: Vec<CatalogChapter>,
}

impl SubjectCatalog {
    #[must_use]
    pub fn total_videos(&self) -> usize {
        self.chapters.iter().map(|c| c.videos.len()).sum()
    }
}

/// Cumulative reward totals for one learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerRewardLedger {
    pub learner_id: LearnerId,
    pub total_xp: u64,
    pub currency_balance: u64,
    pub tests_completed: u64,
    pub last_test_at: Option<DateTime<Utc>>,
}

impl LearnerRewardLedger {
    #[must_use]
    pub fn empty(learner_id: LearnerId) -> Self {
        Self {
            learner_id,
            total_xp: 0,
            currency_balance: 0,
            tests_completed: 0,
            last_test_at: None,
        }
    }

    /// Apply an additive delta in place.
    ///
    /// `last_test_at` only moves forward.
    pub fn apply(&mut self, delta: &LedgerDelta) {
        self.total_xp = self.total_xp.saturating_add(u64::from(delta.xp));
        self.currency_balance = self
            .currency_balance
            .saturating_add(u64::from(delta.currency));
        self.tests_completed = self
            .tests_completed
            .saturating_add(u64::from(delta.tests_completed));
        self.last_test_at = Some(match self.last_test_at {
            Some(last) => last.max(delta.recorded_at),
            None => delta.recorded_at,
        });
    }
}

/// Additive change to a learner's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDelta {
    pub xp: u32,
    pub currency: u32,
    pub tests_completed: u32,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerDelta {
    /// Delta for one completed test.
    #[must_use]
    pub fn for_reward(reward: &RewardBreakdown, recorded_at: DateTime<Utc>) -> Self {
        Self {
            xp: reward.xp_earned,
            currency: reward.currency_earned,
            tests_completed: 1,
            recorded_at,
        }
    }
}

/// Derive a chapter key from a human-readable chapter name.
///
/// Lowercases alphanumerics and collapses every other run of
/// characters into a single `-`, e.g. `"Chapter 3: Motion"` becomes
/// `"chapter-3-motion"`.
#[must_use]
pub fn derive_chapter_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !key.is_empty() {
                key.push('-');
            }
            pending_dash = false;
            key.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    key
}
