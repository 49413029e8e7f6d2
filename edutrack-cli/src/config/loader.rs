use super::types::{
    DatabaseConfig, EdutrackConfig, RawDatabaseConfig, RawEdutrackConfig, RawLedgerConfig,
    RawProgressConfig, RawScoringConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use edutrack_engine::{LedgerRetryConfig, ProgressPolicy, ScoringConfig};
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<EdutrackConfig> {
        let mut raw = RawEdutrackConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "edutrack").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with EDUTRACK_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("EDUTRACK_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".edutrack/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawEdutrackConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawEdutrackConfig, overlay: RawEdutrackConfig) -> RawEdutrackConfig {
        RawEdutrackConfig {
            database: RawDatabaseConfig {
                path: overlay.database.path.or(base.database.path),
            },
            scoring: RawScoringConfig {
                base_points_per_question: overlay
                    .scoring
                    .base_points_per_question
                    .or(base.scoring.base_points_per_question),
                base_xp_reward: overlay.scoring.base_xp_reward.or(base.scoring.base_xp_reward),
                streak_bonus_per_level: overlay
                    .scoring
                    .streak_bonus_per_level
                    .or(base.scoring.streak_bonus_per_level),
            },
            progress: RawProgressConfig {
                zero_attempt_subjects: overlay
                    .progress
                    .zero_attempt_subjects
                    .or(base.progress.zero_attempt_subjects),
                weak_threshold: overlay.progress.weak_threshold.or(base.progress.weak_threshold),
                chapter_done_threshold: overlay
                    .progress
                    .chapter_done_threshold
                    .or(base.progress.chapter_done_threshold),
            },
            ledger: RawLedgerConfig {
                max_attempts: overlay.ledger.max_attempts.or(base.ledger.max_attempts),
                retry_backoff_ms: overlay
                    .ledger
                    .retry_backoff_ms
                    .or(base.ledger.retry_backoff_ms),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawEdutrackConfig) -> EdutrackConfig {
        let scoring = ScoringConfig::default();
        let progress = ProgressPolicy::default();
        let ledger = LedgerRetryConfig::default();

        EdutrackConfig {
            database: raw
                .database
                .path
                .map(|path| DatabaseConfig { path })
                .unwrap_or_default(),
            scoring: ScoringConfig {
                base_points_per_question: raw
                    .scoring
                    .base_points_per_question
                    .unwrap_or(scoring.base_points_per_question),
                base_xp_reward: raw.scoring.base_xp_reward.unwrap_or(scoring.base_xp_reward),
                streak_bonus_per_level: raw
                    .scoring
                    .streak_bonus_per_level
                    .unwrap_or(scoring.streak_bonus_per_level),
            },
            progress: ProgressPolicy {
                zero_attempt_subjects: raw
                    .progress
                    .zero_attempt_subjects
                    .unwrap_or(progress.zero_attempt_subjects),
                weak_threshold: raw.progress.weak_threshold.unwrap_or(progress.weak_threshold),
                chapter_done_threshold: raw
                    .progress
                    .chapter_done_threshold
                    .unwrap_or(progress.chapter_done_threshold),
            },
            ledger: LedgerRetryConfig {
                max_attempts: raw.ledger.max_attempts.unwrap_or(ledger.max_attempts),
                retry_backoff_ms: raw
                    .ledger
                    .retry_backoff_ms
                    .unwrap_or(ledger.retry_backoff_ms),
            },
        }
    }

    /// Load a single config file with defaults applied (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<EdutrackConfig> {
        if path.exists() {
            Ok(Self::finalize(Self::read_raw(path)?))
        } else {
            Ok(EdutrackConfig::default())
        }
    }
}
