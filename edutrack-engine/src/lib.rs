//! Progress analytics and reward scoring for edutrack.
//!
//! The engine turns raw learning activity into scores, rewards and
//! progress reports.
//!
//! # Architecture
//!
//! - **Commands** ([`SubmitAssessment`], [`RecordVideoWatch`]) are validated
//!   and applied through [`ProgressEngine`]
//! - **Scoring** ([`scoring::score`]) is a pure function of one attempt
//! - **Storage** ([`ActivityReader`], [`ActivityWriter`], [`LedgerStore`])
//!   is owned by the host; the engine only reads snapshots and writes
//!   attempts, watch merges and additive ledger deltas
//! - **Progress** ([`progress::aggregate`]) folds a snapshot into a
//!   [`ProgressReport`] without side effects

mod commands;
mod config;
mod engine;
mod error;
mod ledger;
pub mod progress;
mod records;
pub mod scoring;
pub mod storage;
mod streak;
mod types;

// Command types
pub use commands::{RecordVideoWatch, SubmitAssessment, SubmittedAnswer};

// Configuration
pub use config::{
    EngineConfig, LedgerRetryConfig, ProgressPolicy, ScoringConfig, ZeroAttemptPolicy,
};

// Engine
pub use engine::ProgressEngine;
pub use ledger::RewardLedgerUpdater;

// Errors
pub use error::{EngineError, Result, ValidationError};

// Progress report types
pub use progress::{
    ChapterProgress, ChapterScore, ProgressReport, ProgressSummary, ScoreBucket, SubjectProgress,
    TimeRange,
};

// Record types
pub use records::{
    AnswerRecord, CatalogChapter, LearnerRewardLedger, LedgerDelta, RewardBreakdown,
    SubjectCatalog, TestAttempt, VIDEO_COMPLETION_THRESHOLD, VideoDescriptor, VideoWatchEvent,
    derive_chapter_key,
};

// Streaks
pub use streak::StreakTracker;

// ID types
pub use types::{AttemptId, LearnerId};

// Storage traits (re-export from storage module)
pub use storage::{ActivityReader, ActivityWriter, LedgerStore};
