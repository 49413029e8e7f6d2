//! In-process activity store.
//!
//! Backed by mutex-guarded maps. Every operation holds the lock for its
//! whole read-modify-write, so ledger deltas and watch merges are atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{ActivityReader, ActivityWriter, Error, LedgerStore, Result};
use crate::commands::RecordVideoWatch;
use crate::records::{
    LearnerRewardLedger, LedgerDelta, SubjectCatalog, TestAttempt, VideoWatchEvent,
};
use crate::types::LearnerId;

#[derive(Default)]
struct State {
    attempts: Vec<TestAttempt>,
    videos: BTreeMap<(LearnerId, String), VideoWatchEvent>,
    catalogs: HashMap<String, SubjectCatalog>,
    enrollments: HashMap<LearnerId, Vec<String>>,
    ledgers: HashMap<LearnerId, LearnerRewardLedger>,
}

/// Activity store kept entirely in memory.
#[derive(Default)]
pub struct MemoryActivityStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryActivityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a subject catalog.
    pub fn put_subject_catalog(&self, catalog: SubjectCatalog) -> Result<()> {
        let mut state = self.lock()?;
        state.catalogs.insert(catalog.subject_id.clone(), catalog);
        Ok(())
    }

    /// Enroll a learner in a subject. Enrolling twice is a no-op.
    pub fn enroll(&self, learner_id: &LearnerId, subject_id: &str) -> Result<()> {
        let mut state = self.lock()?;
        let subjects = state.enrollments.entry(learner_id.clone()).or_default();
        if !subjects.iter().any(|s| s == subject_id) {
            subjects.push(subject_id.to_string());
        }
        Ok(())
    }

    /// Simulate an unreachable store: every operation fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory store marked unavailable".to_string()));
        }
        self.state
            .lock()
            .map_err(|_| Error::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ActivityReader for MemoryActivityStore {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_test_attempts(&self, learner_id: &LearnerId) -> Result<Vec<TestAttempt>> {
        let state = self.lock()?;
        let mut attempts: Vec<TestAttempt> = state
            .attempts
            .iter()
            .filter(|a| &a.learner_id == learner_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.completed_at);
        Ok(attempts)
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_video_watch_events(
        &self,
        learner_id: &LearnerId,
        subject_id: Option<&str>,
    ) -> Result<Vec<VideoWatchEvent>> {
        let state = self.lock()?;
        Ok(state
            .videos
            .values()
            .filter(|e| &e.learner_id == learner_id)
            .filter(|e| subject_id.is_none_or(|s| e.subject_id == s))
            .cloned()
            .collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_subject_catalog(&self, subject_id: &str) -> Result<Option<SubjectCatalog>> {
        let state = self.lock()?;
        Ok(state.catalogs.get(subject_id).cloned())
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_enrolled_subject_ids(&self, learner_id: &LearnerId) -> Result<Vec<String>> {
        let state = self.lock()?;
        Ok(state
            .enrollments
            .get(learner_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ActivityWriter for MemoryActivityStore {
    #[instrument(skip(self, attempt), fields(learner_id = %attempt.learner_id, assessment_id = %attempt.assessment_id), level = "debug")]
    async fn write_test_attempt(&self, attempt: &TestAttempt) -> Result<()> {
        let mut state = self.lock()?;
        let before = state.attempts.len();
        state.attempts.retain(|a| {
            !(a.learner_id == attempt.learner_id && a.assessment_id == attempt.assessment_id)
        });
        if state.attempts.len() < before {
            debug!("replacing previous attempt");
        }
        state.attempts.push(attempt.clone());
        Ok(())
    }

    #[instrument(skip(self, update), fields(learner_id = %update.learner_id, video_id = %update.video_id), level = "debug")]
    async fn upsert_video_watch_event(
        &self,
        update: &RecordVideoWatch,
    ) -> Result<VideoWatchEvent> {
        let mut state = self.lock()?;
        let key = (update.learner_id.clone(), update.video_id.clone());
        let merged = VideoWatchEvent::merge(state.videos.get(&key), update);
        state.videos.insert(key, merged.clone());
        Ok(merged)
    }
}

#[async_trait]
impl LedgerStore for MemoryActivityStore {
    #[instrument(skip(self, delta), level = "debug")]
    async fn upsert_ledger(
        &self,
        learner_id: &LearnerId,
        delta: &LedgerDelta,
    ) -> Result<LearnerRewardLedger> {
        let mut state = self.lock()?;
        let ledger = state
            .ledgers
            .entry(learner_id.clone())
            .or_insert_with(|| LearnerRewardLedger::empty(learner_id.clone()));
        ledger.apply(delta);
        Ok(ledger.clone())
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_ledger(&self, learner_id: &LearnerId) -> Result<Option<LearnerRewardLedger>> {
        let state = self.lock()?;
        Ok(state.ledgers.get(learner_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CatalogChapter, RewardBreakdown};
    use crate::types::AttemptId;
    use chrono::{TimeZone, Utc};

    fn attempt(assessment_id: &str, percentage: u32, day: u32) -> TestAttempt {
        TestAttempt {
            attempt_id: AttemptId::new(),
            learner_id: LearnerId::from("stu-1"),
            assessment_id: assessment_id.to_string(),
            subject_id: "physics".to_string(),
            chapter_label: "Motion".to_string(),
            answers: vec![],
            correct_count: 0,
            total_questions: 10,
            percentage_score: percentage,
            elapsed_seconds: 60,
            allowed_duration_seconds: 600,
            max_streak: 0,
            reward: RewardBreakdown::default(),
            completed_at: Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap(),
        }
    }

    fn watch(video_id: &str, subject_id: &str, fraction: f64) -> RecordVideoWatch {
        RecordVideoWatch {
            learner_id: LearnerId::from("stu-1"),
            video_id: video_id.to_string(),
            subject_id: subject_id.to_string(),
            chapter_key: "motion".to_string(),
            fraction_watched: fraction,
            watched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn reattempt_replaces_previous_attempt() {
        let store = MemoryActivityStore::new();
        store.write_test_attempt(&attempt("quiz-1", 40, 1)).await.unwrap();
        store.write_test_attempt(&attempt("quiz-2", 70, 2)).await.unwrap();
        store.write_test_attempt(&attempt("quiz-1", 90, 3)).await.unwrap();

        let attempts = store
            .fetch_test_attempts(&LearnerId::from("stu-1"))
            .await
            .unwrap();

        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].assessment_id, "quiz-2");
        assert_eq!(attempts[1].percentage_score, 90);
    }

    #[tokio::test]
    async fn watch_events_filter_by_subject() {
        let store = MemoryActivityStore::new();
        store.upsert_video_watch_event(&watch("v1", "physics", 0.5)).await.unwrap();
        store.upsert_video_watch_event(&watch("v2", "maths", 0.5)).await.unwrap();
        let learner = LearnerId::from("stu-1");

        let all = store.fetch_video_watch_events(&learner, None).await.unwrap();
        let physics = store
            .fetch_video_watch_events(&learner, Some("physics"))
            .await
            .unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(physics.len(), 1);
        assert_eq!(physics[0].video_id, "v1");
    }

    #[tokio::test]
    async fn completed_never_reverts() {
        let store = MemoryActivityStore::new();
        store.upsert_video_watch_event(&watch("v1", "physics", 0.92)).await.unwrap();
        for fraction in [0.1, 0.0, 0.89, 0.5] {
            let event = store
                .upsert_video_watch_event(&watch("v1", "physics", fraction))
                .await
                .unwrap();
            assert!(event.completed);
            assert_eq!(event.fraction_watched, fraction);
        }

        let events = store
            .fetch_video_watch_events(&LearnerId::from("stu-1"), None)
            .await
            .unwrap();
        assert_eq!(events[0].watch_count, 5);
    }

    #[tokio::test]
    async fn missing_catalog_is_none_not_error() {
        let store = MemoryActivityStore::new();
        store
            .put_subject_catalog(SubjectCatalog {
                subject_id: "physics".to_string(),
                name: "Physics".to_string(),
                chapters: vec![CatalogChapter {
                    name: "Motion".to_string(),
                    key: None,
                    videos: vec![],
                }],
            })
            .unwrap();

        assert!(store.fetch_subject_catalog("physics").await.unwrap().is_some());
        assert!(store.fetch_subject_catalog("chemistry").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enrollment_keeps_order_and_ignores_duplicates() {
        let store = MemoryActivityStore::new();
        let learner = LearnerId::from("stu-1");
        store.enroll(&learner, "physics").unwrap();
        store.enroll(&learner, "maths").unwrap();
        store.enroll(&learner, "physics").unwrap();

        let subjects = store.fetch_enrolled_subject_ids(&learner).await.unwrap();
        assert_eq!(subjects, vec!["physics".to_string(), "maths".to_string()]);
    }

    #[tokio::test]
    async fn unavailable_store_fails_reads() {
        let store = MemoryActivityStore::new();
        store.set_unavailable(true);

        let err = store
            .fetch_test_attempts(&LearnerId::from("stu-1"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        store.set_unavailable(false);
        assert!(store
            .fetch_test_attempts(&LearnerId::from("stu-1"))
            .await
            .unwrap()
            .is_empty());
    }
}
