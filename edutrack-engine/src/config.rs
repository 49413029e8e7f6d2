//! Engine configuration.
//!
//! Every field has a default, so an empty TOML table is a valid
//! configuration. Front ends read these sections from their own config
//! files:
//!
//! ```toml
//! [scoring]
//! base_points_per_question = 10
//! base_xp_reward = 40
//! streak_bonus_per_level = 5
//!
//! [progress]
//! zero_attempt_subjects = "include_as_zero"
//! weak_threshold = 70
//! chapter_done_threshold = 90
//!
//! [ledger]
//! max_attempts = 3
//! retry_backoff_ms = 50
//! ```

use serde::{Deserialize, Serialize};

/// Assessment-level scoring tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub base_points_per_question: u32,
    pub base_xp_reward: u32,
    pub streak_bonus_per_level: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_points_per_question: 10,
            base_xp_reward: 40,
            streak_bonus_per_level: 5,
        }
    }
}

/// How subjects without any test attempts enter the overall average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroAttemptPolicy {
    /// Count the subject with an average of 0.
    #[default]
    IncludeAsZero,
    /// Leave the subject out of the denominator.
    Exclude,
}

/// Progress aggregation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressPolicy {
    pub zero_attempt_subjects: ZeroAttemptPolicy,
    /// Subjects averaging below this are reported as weak areas.
    pub weak_threshold: u32,
    /// Chapter progress at or above this counts as a completed chapter.
    pub chapter_done_threshold: u32,
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        Self {
            zero_attempt_subjects: ZeroAttemptPolicy::IncludeAsZero,
            weak_threshold: 70,
            chapter_done_threshold: 90,
        }
    }
}

/// Retry settings for ledger deltas and attempt writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerRetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Backoff before attempt `n` is `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
}

impl Default for LedgerRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 50,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub progress: ProgressPolicy,
    #[serde(default)]
    pub ledger: LedgerRetryConfig,
}
