use std::path::PathBuf;

use edutrack_engine::{
    EngineConfig, LedgerRetryConfig, ProgressPolicy, ScoringConfig, ZeroAttemptPolicy,
};
use serde::{Deserialize, Serialize};

use crate::paths;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawEdutrackConfig {
    #[serde(default)]
    pub database: RawDatabaseConfig,

    #[serde(default)]
    pub scoring: RawScoringConfig,

    #[serde(default)]
    pub progress: RawProgressConfig,

    #[serde(default)]
    pub ledger: RawLedgerConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDatabaseConfig {
    /// libSQL database file
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawScoringConfig {
    pub base_points_per_question: Option<u32>,
    pub base_xp_reward: Option<u32>,
    pub streak_bonus_per_level: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawProgressConfig {
    pub zero_attempt_subjects: Option<ZeroAttemptPolicy>,
    pub weak_threshold: Option<u32>,
    pub chapter_done_threshold: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLedgerConfig {
    pub max_attempts: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EdutrackConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub progress: ProgressPolicy,

    #[serde(default)]
    pub ledger: LedgerRetryConfig,
}

impl EdutrackConfig {
    /// The engine sections of this configuration.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            scoring: self.scoring,
            progress: self.progress,
            ledger: self.ledger,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// libSQL database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: paths::default_database_path(),
        }
    }
}
