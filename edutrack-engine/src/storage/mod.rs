//! Storage traits and implementations for learner activity.
//!
//! The engine never owns its data. It reads and writes through three
//! narrow traits:
//! - [`ActivityReader`] - snapshot reads of attempts, watch events,
//!   catalogs and enrollments
//! - [`ActivityWriter`] - attempt writes and merge-updates of watch events
//! - [`LedgerStore`] - additive ledger deltas
//!
//! [`MemoryActivityStore`] keeps everything in process;
//! [`TursoActivityStore`] stores it in libSQL.

mod error;
mod memory;
mod turso;

pub use error::{Error, Result};
pub use memory::MemoryActivityStore;
pub use turso::TursoActivityStore;

use async_trait::async_trait;

use crate::commands::RecordVideoWatch;
use crate::records::{
    LearnerRewardLedger, LedgerDelta, SubjectCatalog, TestAttempt, VideoWatchEvent,
};
use crate::types::LearnerId;

/// Read-only queries against learner activity.
///
/// "Not found" is never an error: a missing catalog is `Ok(None)`, a
/// learner without records gets empty lists. An `Err` always means the
/// store itself failed.
#[async_trait]
pub trait ActivityReader: Send + Sync {
    /// All test attempts of a learner, oldest completion first.
    async fn fetch_test_attempts(&self, learner_id: &LearnerId) -> Result<Vec<TestAttempt>>;

    /// Watch events of a learner, optionally restricted to one subject.
    async fn fetch_video_watch_events(
        &self,
        learner_id: &LearnerId,
        subject_id: Option<&str>,
    ) -> Result<Vec<VideoWatchEvent>>;

    /// Catalog of a subject, if one exists.
    async fn fetch_subject_catalog(&self, subject_id: &str) -> Result<Option<SubjectCatalog>>;

    /// Subjects the learner is enrolled in, in enrollment order.
    async fn fetch_enrolled_subject_ids(&self, learner_id: &LearnerId) -> Result<Vec<String>>;
}

/// Writes of learner activity.
#[async_trait]
pub trait ActivityWriter: Send + Sync {
    /// Store an attempt, replacing any attempt with the same
    /// (learner, assessment) key.
    async fn write_test_attempt(&self, attempt: &TestAttempt) -> Result<()>;

    /// Merge a watch report into the stored event and return the result.
    ///
    /// The fraction is replaced, the watch count incremented and the
    /// completed flag only ever latches to true.
    async fn upsert_video_watch_event(&self, update: &RecordVideoWatch)
    -> Result<VideoWatchEvent>;
}

/// Cumulative reward ledgers.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Apply a delta atomically and return the updated ledger.
    ///
    /// Creates the ledger on first use. Either every field changes or
    /// none does; an error flagged retryable guarantees nothing applied.
    async fn upsert_ledger(
        &self,
        learner_id: &LearnerId,
        delta: &LedgerDelta,
    ) -> Result<LearnerRewardLedger>;

    async fn fetch_ledger(&self, learner_id: &LearnerId) -> Result<Option<LearnerRewardLedger>>;
}
