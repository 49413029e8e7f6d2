//! Engine facade over the activity stores.
//!
//! [`ProgressEngine`] validates and scores submissions on the write side
//! and assembles progress reports from store snapshots on the read side.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use tracing::{debug, info, instrument, warn};

use crate::commands::{RecordVideoWatch, SubmitAssessment};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::ledger::RewardLedgerUpdater;
use crate::progress::{self, MatcherChain, ProgressReport, ProgressSnapshot, TimeRange};
use crate::records::{AnswerRecord, LearnerRewardLedger, TestAttempt, VideoWatchEvent};
use crate::scoring::{self, ScoreInput};
use crate::storage::{ActivityReader, ActivityWriter, LedgerStore};
use crate::streak::StreakTracker;
use crate::types::{AttemptId, LearnerId};

/// Scores submissions and reports learner progress.
pub struct ProgressEngine {
    reader: Arc<dyn ActivityReader>,
    writer: Arc<dyn ActivityWriter>,
    ledger: RewardLedgerUpdater,
    config: EngineConfig,
    matchers: MatcherChain,
}

impl ProgressEngine {
    /// Create an engine over the given stores.
    pub fn new(
        reader: Arc<dyn ActivityReader>,
        writer: Arc<dyn ActivityWriter>,
        ledger: Arc<dyn LedgerStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            reader,
            writer,
            ledger: RewardLedgerUpdater::new(ledger, config.ledger),
            config,
            matchers: MatcherChain::default(),
        }
    }

    /// Create an engine over a single store implementing every trait.
    pub fn with_store<S>(store: Arc<S>, config: EngineConfig) -> Self
    where
        S: ActivityReader + ActivityWriter + LedgerStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, config)
    }

    /// Replace the chapter matching strategies.
    #[must_use]
    pub fn with_matchers(mut self, matchers: MatcherChain) -> Self {
        self.matchers = matchers;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // === Commands ===

    /// Score a completed assessment, persist it and credit the ledger.
    ///
    /// Validation failures persist nothing. If the attempt write succeeds
    /// but the ledger update does not, the attempt stays written and
    /// [`EngineError::PartialLedgerUpdate`] is returned. The ledger's last
    /// test time is the time of processing, not the caller's `completed_at`.
    #[instrument(skip(self, cmd), fields(learner_id = %cmd.learner_id, assessment_id = %cmd.assessment_id))]
    pub async fn submit_assessment(&self, cmd: SubmitAssessment) -> Result<TestAttempt> {
        cmd.validate()?;

        let tracker = StreakTracker::from_outcomes(cmd.outcomes());
        let tunables = cmd.scoring.unwrap_or(self.config.scoring);
        let correct_count = cmd.correct_count();
        let score = scoring::score(
            &ScoreInput {
                correct_count,
                total_questions: cmd.total_questions,
                elapsed_seconds: cmd.elapsed_seconds,
                allowed_duration_seconds: cmd.allowed_duration_seconds,
                max_streak: tracker.max(),
            },
            &tunables,
        );

        let mut answers: Vec<AnswerRecord> = cmd
            .answers
            .into_iter()
            .map(|a| AnswerRecord {
                question_index: a.question_index,
                submitted_value: a.submitted_value,
                correct: a.correct,
            })
            .collect();
        answers.sort_by_key(|a| a.question_index);

        let attempt = TestAttempt {
            attempt_id: AttemptId::new(),
            learner_id: cmd.learner_id,
            assessment_id: cmd.assessment_id,
            subject_id: cmd.subject_id,
            chapter_label: cmd.chapter_label,
            answers,
            correct_count,
            total_questions: cmd.total_questions,
            percentage_score: score.percentage,
            elapsed_seconds: cmd.elapsed_seconds,
            allowed_duration_seconds: cmd.allowed_duration_seconds,
            max_streak: tracker.max(),
            reward: score.reward,
            completed_at: cmd.completed_at.unwrap_or_else(Utc::now),
        };

        self.write_attempt(&attempt).await?;
        info!(
            attempt_id = %attempt.attempt_id,
            percentage = attempt.percentage_score,
            max_streak = attempt.max_streak,
            xp = attempt.reward.xp_earned,
            currency = attempt.reward.currency_earned,
            "assessment scored"
        );

        self.ledger
            .apply(&attempt.learner_id, &attempt.reward, Utc::now())
            .await?;
        Ok(attempt)
    }

    /// Write an attempt, retrying transient store failures.
    ///
    /// Attempt writes replace by key, so repeating one is harmless.
    async fn write_attempt(&self, attempt: &TestAttempt) -> Result<()> {
        let retry = self.config.ledger;
        let max_attempts = retry.max_attempts.max(1);
        let mut tries = 1;

        loop {
            match self.writer.write_test_attempt(attempt).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && tries < max_attempts => {
                    warn!(tries, error = %err, "attempt write failed, retrying");
                    let backoff = retry.retry_backoff_ms.saturating_mul(u64::from(tries));
                    if backoff > 0 {
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                    tries += 1;
                }
                Err(err) => return Err(EngineError::dependency("write_test_attempt")(err)),
            }
        }
    }

    /// Merge one watch session into the learner's watch state.
    #[instrument(skip(self, cmd), fields(learner_id = %cmd.learner_id, video_id = %cmd.video_id))]
    pub async fn record_video_watch(&self, cmd: RecordVideoWatch) -> Result<VideoWatchEvent> {
        cmd.validate()?;
        let event = self
            .writer
            .upsert_video_watch_event(&cmd)
            .await
            .map_err(EngineError::dependency("upsert_video_watch_event"))?;
        debug!(
            fraction = event.fraction_watched,
            completed = event.completed,
            watch_count = event.watch_count,
            "video watch recorded"
        );
        Ok(event)
    }

    // === Queries ===

    /// Progress report for a dashboard range label (`3m`, `6m`, `1y`).
    ///
    /// Unknown labels fall back to three months.
    pub async fn compute_progress(
        &self,
        learner_id: &LearnerId,
        range_label: &str,
    ) -> Result<ProgressReport> {
        self.compute_progress_at(learner_id, TimeRange::from_label(range_label), Utc::now())
            .await
    }

    /// Progress report as of `now`.
    #[instrument(skip(self), fields(range = range.as_str()))]
    pub async fn compute_progress_at(
        &self,
        learner_id: &LearnerId,
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> Result<ProgressReport> {
        let snapshot = self.snapshot(learner_id).await?;
        let report = progress::aggregate(
            &snapshot,
            range,
            now,
            &self.config.progress,
            &self.matchers,
        );
        info!(
            subjects = report.subjects.len(),
            tests_taken = report.summary.tests_taken,
            average_score = report.summary.average_score,
            "progress computed"
        );
        Ok(report)
    }

    /// Cumulative rewards of a learner, if any test was ever credited.
    pub async fn ledger(&self, learner_id: &LearnerId) -> Result<Option<LearnerRewardLedger>> {
        self.ledger.fetch(learner_id).await
    }

    async fn snapshot(&self, learner_id: &LearnerId) -> Result<ProgressSnapshot> {
        let (subject_ids, attempts, videos) = tokio::try_join!(
            async {
                self.reader
                    .fetch_enrolled_subject_ids(learner_id)
                    .await
                    .map_err(EngineError::dependency("fetch_enrolled_subject_ids"))
            },
            async {
                self.reader
                    .fetch_test_attempts(learner_id)
                    .await
                    .map_err(EngineError::dependency("fetch_test_attempts"))
            },
            async {
                self.reader
                    .fetch_video_watch_events(learner_id, None)
                    .await
                    .map_err(EngineError::dependency("fetch_video_watch_events"))
            },
        )?;

        let catalogs = try_join_all(subject_ids.iter().map(|id| async move {
            self.reader
                .fetch_subject_catalog(id)
                .await
                .map_err(EngineError::dependency("fetch_subject_catalog"))
        }))
        .await?;

        Ok(ProgressSnapshot {
            learner_id: learner_id.clone(),
            subjects: subject_ids.into_iter().zip(catalogs).collect(),
            attempts,
            videos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::SubmittedAnswer;
    use crate::error::ValidationError;
    use crate::records::{CatalogChapter, SubjectCatalog, VideoDescriptor};
    use crate::progress::ChapterMatcher;
    use crate::storage::{self, MemoryActivityStore};
    use async_trait::async_trait;
    use chrono::{Datelike, TimeZone};
    use std::sync::Mutex;

    /// Fails the first `failures` attempt writes with a lock conflict.
    struct ContendedWriter {
        inner: Arc<MemoryActivityStore>,
        failures: Mutex<u32>,
    }

    #[async_trait]
    impl ActivityWriter for ContendedWriter {
        async fn write_test_attempt(&self, attempt: &TestAttempt) -> storage::Result<()> {
            {
                let mut failures = self.failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(storage::Error::Conflict("database is locked".to_string()));
                }
            }
            self.inner.write_test_attempt(attempt).await
        }

        async fn upsert_video_watch_event(
            &self,
            update: &RecordVideoWatch,
        ) -> storage::Result<VideoWatchEvent> {
            self.inner.upsert_video_watch_event(update).await
        }
    }

    /// Matches a label that is a prefix of the chapter name.
    struct PrefixMatcher;

    impl ChapterMatcher for PrefixMatcher {
        fn name(&self) -> &'static str {
            "prefix"
        }

        fn matches(&self, label: &str, chapter: &CatalogChapter) -> bool {
            chapter.name.starts_with(label)
        }
    }

    fn physics_catalog() -> SubjectCatalog {
        SubjectCatalog {
            subject_id: "physics".to_string(),
            name: "Physics".to_string(),
            chapters: vec![CatalogChapter {
                name: "Motion".to_string(),
                key: None,
                videos: vec![VideoDescriptor {
                    id: "v1".to_string(),
                    title: "Speed".to_string(),
                    chapter_name: None,
                }],
            }],
        }
    }

    fn learner() -> LearnerId {
        LearnerId::from("stu-1")
    }

    fn engine() -> (ProgressEngine, Arc<MemoryActivityStore>) {
        let store = Arc::new(MemoryActivityStore::new());
        let engine = ProgressEngine::with_store(store.clone(), EngineConfig::default());
        (engine, store)
    }

    fn submission(outcomes: &[bool], elapsed: u32, allowed: u32) -> SubmitAssessment {
        SubmitAssessment {
            learner_id: learner(),
            assessment_id: "quiz-1".to_string(),
            subject_id: "physics".to_string(),
            chapter_label: "Motion".to_string(),
            total_questions: outcomes.len() as u32,
            answers: outcomes
                .iter()
                .enumerate()
                .map(|(i, correct)| SubmittedAnswer {
                    question_index: i as u32,
                    submitted_value: "b".to_string(),
                    correct: *correct,
                })
                .collect(),
            elapsed_seconds: elapsed,
            allowed_duration_seconds: allowed,
            scoring: None,
            completed_at: Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn submission_is_scored_persisted_and_credited() {
        let (engine, store) = engine();
        let before = Utc::now();
        // 9 correct out of 10, longest streak 7, 120s left of 600s.
        let mut outcomes = [true; 10];
        outcomes[7] = false;

        let attempt = engine
            .submit_assessment(submission(&outcomes, 480, 600))
            .await
            .unwrap();

        assert_eq!(attempt.percentage_score, 90);
        assert_eq!(attempt.max_streak, 7);
        assert_eq!(attempt.reward.xp_earned, 79);
        assert_eq!(attempt.reward.currency_earned, 8);
        assert_eq!(attempt.reward.points_earned, 90);

        let stored = store.fetch_test_attempts(&learner()).await.unwrap();
        assert_eq!(stored, vec![attempt.clone()]);

        let ledger = engine.ledger(&learner()).await.unwrap().unwrap();
        assert_eq!(ledger.total_xp, 79);
        assert_eq!(ledger.currency_balance, 8);
        assert_eq!(ledger.tests_completed, 1);
        assert!(ledger.last_test_at.is_some_and(|at| at >= before));
    }

    #[tokio::test]
    async fn invalid_submission_persists_nothing() {
        let (engine, store) = engine();

        let err = engine
            .submit_assessment(submission(&[true, false], 10, 0))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::NonPositiveDuration)
        ));
        assert!(store.fetch_test_attempts(&learner()).await.unwrap().is_empty());
        assert!(engine.ledger(&learner()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn per_assessment_tunables_override_config() {
        let (engine, _store) = engine();
        let mut cmd = submission(&[true, true, true, true], 600, 600);
        cmd.scoring = Some(crate::config::ScoringConfig {
            base_points_per_question: 25,
            base_xp_reward: 100,
            streak_bonus_per_level: 0,
        });

        let attempt = engine.submit_assessment(cmd).await.unwrap();
        assert_eq!(attempt.reward.points_earned, 100);
        assert_eq!(attempt.reward.xp_earned, 100);
        assert_eq!(attempt.reward.streak_bonus, 0);
    }

    #[tokio::test]
    async fn unavailable_store_is_reported_as_dependency_error() {
        let (engine, store) = engine();
        store.set_unavailable(true);

        let err = engine
            .submit_assessment(submission(&[true], 10, 60))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::DependencyUnavailable {
                operation: "write_test_attempt",
                ..
            }
        ));

        let err = engine.compute_progress(&learner(), "3m").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn video_watch_merges_into_progress() {
        let (engine, store) = engine();
        store.put_subject_catalog(physics_catalog()).unwrap();
        store.enroll(&learner(), "physics").unwrap();

        let watch = |fraction| RecordVideoWatch {
            learner_id: learner(),
            video_id: "v1".to_string(),
            subject_id: "physics".to_string(),
            chapter_key: "motion".to_string(),
            fraction_watched: fraction,
            watched_at: Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap(),
        };
        engine.record_video_watch(watch(0.95)).await.unwrap();
        let event = engine.record_video_watch(watch(0.2)).await.unwrap();
        assert!(event.completed);
        assert_eq!(event.watch_count, 2);

        let report = engine.compute_progress(&learner(), "6m").await.unwrap();
        assert_eq!(report.range, TimeRange::SixMonths);
        let physics = report.subject("physics").unwrap();
        assert_eq!(physics.completed_videos, 1);
        assert_eq!(physics.progress_percentage, 100);
    }

    #[tokio::test]
    async fn backdated_submission_keeps_ledger_time_current() {
        let (engine, _store) = engine();
        let before = Utc::now();
        let mut cmd = submission(&[true, true], 30, 60);
        cmd.completed_at = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());

        let attempt = engine.submit_assessment(cmd).await.unwrap();

        assert_eq!(attempt.completed_at.year(), 2020);
        let ledger = engine.ledger(&learner()).await.unwrap().unwrap();
        assert!(ledger.last_test_at.is_some_and(|at| at >= before));
    }

    #[tokio::test]
    async fn conflicting_attempt_write_is_retried() {
        let store = Arc::new(MemoryActivityStore::new());
        let writer = Arc::new(ContendedWriter {
            inner: store.clone(),
            failures: Mutex::new(2),
        });
        let mut config = EngineConfig::default();
        config.ledger.retry_backoff_ms = 0;
        let engine = ProgressEngine::new(store.clone(), writer, store.clone(), config);

        let attempt = engine
            .submit_assessment(submission(&[true, false], 30, 60))
            .await
            .unwrap();

        assert_eq!(
            store.fetch_test_attempts(&learner()).await.unwrap(),
            vec![attempt]
        );
        let ledger = engine.ledger(&learner()).await.unwrap().unwrap();
        assert_eq!(ledger.tests_completed, 1);
    }

    #[tokio::test]
    async fn persistent_write_conflict_is_a_dependency_error() {
        let store = Arc::new(MemoryActivityStore::new());
        let writer = Arc::new(ContendedWriter {
            inner: store.clone(),
            failures: Mutex::new(10),
        });
        let mut config = EngineConfig::default();
        config.ledger.retry_backoff_ms = 0;
        let engine = ProgressEngine::new(store.clone(), writer, store.clone(), config);

        let err = engine
            .submit_assessment(submission(&[true], 30, 60))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::DependencyUnavailable {
                operation: "write_test_attempt",
                ..
            }
        ));
        assert!(engine.ledger(&learner()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn custom_matchers_resolve_chapter_labels() {
        let store = Arc::new(MemoryActivityStore::new());
        store.put_subject_catalog(physics_catalog()).unwrap();
        store.enroll(&learner(), "physics").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap();

        let default_engine = ProgressEngine::with_store(store.clone(), EngineConfig::default());
        let mut cmd = submission(&[true, true], 30, 60);
        cmd.chapter_label = "Mot".to_string();
        default_engine.submit_assessment(cmd).await.unwrap();

        let report = default_engine
            .compute_progress_at(&learner(), TimeRange::ThreeMonths, now)
            .await
            .unwrap();
        let physics = report.subject("physics").unwrap();
        assert_eq!(physics.tests_taken, 1);
        assert_eq!(physics.chapters[0].tests_taken, 0);

        let prefix_engine = ProgressEngine::with_store(store, EngineConfig::default())
            .with_matchers(MatcherChain::new(vec![Box::new(PrefixMatcher)]));
        let report = prefix_engine
            .compute_progress_at(&learner(), TimeRange::ThreeMonths, now)
            .await
            .unwrap();
        let physics = report.subject("physics").unwrap();
        assert_eq!(physics.chapters[0].tests_taken, 1);
        assert_eq!(physics.chapters[0].average_score, 100);
    }

    #[tokio::test]
    async fn invalid_watch_fraction_is_rejected() {
        let (engine, _store) = engine();
        let err = engine
            .record_video_watch(RecordVideoWatch {
                learner_id: learner(),
                video_id: "v1".to_string(),
                subject_id: "physics".to_string(),
                chapter_key: "motion".to_string(),
                fraction_watched: 1.5,
                watched_at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::FractionOutOfRange(_))
        ));
    }
}
