//! Reward scoring for a completed assessment.
//!
//! Scoring is a pure function of the attempt's counts, timing and longest
//! streak. Currency is the sum of three capped bands:
//!
//! | band        | tiers                                         | max |
//! |-------------|-----------------------------------------------|-----|
//! | performance | ≥90% 5, ≥80% 4, ≥70% 3, ≥60% 2, ≥50% 1        | 5   |
//! | streak      | ≥8 3, ≥5 2, ≥3 1                              | 3   |
//! | speed       | ≥half the time left 2, any time left 1        | 2   |

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::records::RewardBreakdown;

/// Upper bound of the time multiplier uplift.
pub const MAX_TIME_UPLIFT: f64 = 0.5;

/// Upper bound of the per-attempt currency grant.
pub const MAX_CURRENCY_PER_ATTEMPT: u32 = 10;

const PERFORMANCE_TIERS: [(u32, u32); 5] = [(90, 5), (80, 4), (70, 3), (60, 2), (50, 1)];
const STREAK_TIERS: [(u32, u32); 3] = [(8, 3), (5, 2), (3, 1)];

/// Inputs to [`score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreInput {
    pub correct_count: u32,
    /// Must be positive.
    pub total_questions: u32,
    pub elapsed_seconds: u32,
    /// Must be positive.
    pub allowed_duration_seconds: u32,
    pub max_streak: u32,
}

/// Result of scoring one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub percentage: u32,
    pub time_multiplier: f64,
    pub reward: RewardBreakdown,
}

/// `round(100 * correct / total)`, clamped to `0..=100`.
///
/// Returns 0 for a zero total; callers reject such assessments earlier.
#[must_use]
pub fn percentage(correct_count: u32, total_questions: u32) -> u32 {
    if total_questions == 0 {
        return 0;
    }
    let correct = u64::from(correct_count.min(total_questions));
    let total = u64::from(total_questions);
    ((200 * correct + total) / (2 * total)) as u32
}

/// Seconds left on the clock, never negative.
#[must_use]
pub fn time_bonus_seconds(elapsed_seconds: u32, allowed_duration_seconds: u32) -> u32 {
    allowed_duration_seconds.saturating_sub(elapsed_seconds)
}

#[must_use]
pub fn time_multiplier(time_bonus_seconds: u32, allowed_duration_seconds: u32) -> f64 {
    if allowed_duration_seconds == 0 {
        return 1.0;
    }
    let share = f64::from(time_bonus_seconds) / f64::from(allowed_duration_seconds);
    1.0 + (share * MAX_TIME_UPLIFT).min(MAX_TIME_UPLIFT)
}

#[must_use]
pub fn performance_band(percentage: u32) -> u32 {
    first_tier(&PERFORMANCE_TIERS, percentage)
}

#[must_use]
pub fn streak_band(max_streak: u32) -> u32 {
    first_tier(&STREAK_TIERS, max_streak)
}

#[must_use]
pub fn speed_band(time_bonus_seconds: u32, allowed_duration_seconds: u32) -> u32 {
    if allowed_duration_seconds == 0 || time_bonus_seconds == 0 {
        0
    } else if u64::from(time_bonus_seconds) * 2 >= u64::from(allowed_duration_seconds) {
        2
    } else {
        1
    }
}

/// Highest-first, inclusive: the first threshold the value reaches wins.
fn first_tier(tiers: &[(u32, u32)], value: u32) -> u32 {
    tiers
        .iter()
        .find(|(threshold, _)| value >= *threshold)
        .map(|(_, award)| *award)
        .unwrap_or(0)
}

/// Compute the reward for a completed assessment.
#[must_use]
pub fn score(input: &ScoreInput, config: &ScoringConfig) -> Score {
    let percentage = percentage(input.correct_count, input.total_questions);
    let bonus_seconds = time_bonus_seconds(input.elapsed_seconds, input.allowed_duration_seconds);
    let multiplier = time_multiplier(bonus_seconds, input.allowed_duration_seconds);

    let streak_bonus = input.max_streak.saturating_mul(config.streak_bonus_per_level);
    let base_xp = (f64::from(config.base_xp_reward) * multiplier).round() as u32;
    let xp_earned = base_xp.saturating_add(streak_bonus);
    let points_earned = input
        .correct_count
        .saturating_mul(config.base_points_per_question);

    let currency_earned = performance_band(percentage)
        + streak_band(input.max_streak)
        + speed_band(bonus_seconds, input.allowed_duration_seconds);

    Score {
        percentage,
        time_multiplier: multiplier,
        reward: RewardBreakdown {
            xp_earned,
            currency_earned,
            points_earned,
            time_bonus: bonus_seconds,
            streak_bonus,
        },
    }
}
