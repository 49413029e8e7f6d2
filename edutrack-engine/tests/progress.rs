//! End-to-end progress reporting over the libSQL store.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use edutrack_engine::storage::TursoActivityStore;
use edutrack_engine::{
    CatalogChapter, EngineConfig, LearnerId, ProgressEngine, ProgressPolicy, RecordVideoWatch,
    SubjectCatalog, SubmitAssessment, SubmittedAnswer, TimeRange, VideoDescriptor,
    ZeroAttemptPolicy,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap()
}

fn learner() -> LearnerId {
    LearnerId::from("stu-42")
}

fn physics() -> SubjectCatalog {
    let videos = |ids: &[&str]| {
        ids.iter()
            .map(|id| VideoDescriptor {
                id: id.to_string(),
                title: format!("Lesson {id}"),
                chapter_name: None,
            })
            .collect()
    };
    SubjectCatalog {
        subject_id: "physics".to_string(),
        name: "Physics".to_string(),
        chapters: vec![
            CatalogChapter {
                name: "Introduction".to_string(),
                key: None,
                videos: vec![],
            },
            CatalogChapter {
                name: "Motion".to_string(),
                key: Some("ch2".to_string()),
                videos: videos(&["p1", "p2", "p3", "p4"]),
            },
        ],
    }
}

fn maths() -> SubjectCatalog {
    SubjectCatalog {
        subject_id: "maths".to_string(),
        name: "Maths".to_string(),
        chapters: vec![CatalogChapter {
            name: "Algebra".to_string(),
            key: None,
            videos: vec![VideoDescriptor {
                id: "m1".to_string(),
                title: "Linear equations".to_string(),
                chapter_name: None,
            }],
        }],
    }
}

async fn setup(config: EngineConfig) -> (ProgressEngine, Arc<TursoActivityStore>) {
    let store = Arc::new(TursoActivityStore::new_memory().await.unwrap());
    store.put_subject_catalog(&physics()).await.unwrap();
    store.put_subject_catalog(&maths()).await.unwrap();
    store.enroll(&learner(), "physics").await.unwrap();
    store.enroll(&learner(), "maths").await.unwrap();
    let engine = ProgressEngine::with_store(store.clone(), config);
    (engine, store)
}

async fn watch(engine: &ProgressEngine, video_id: &str, fraction: f64) {
    engine
        .record_video_watch(RecordVideoWatch {
            learner_id: learner(),
            video_id: video_id.to_string(),
            subject_id: "physics".to_string(),
            chapter_key: "ch2".to_string(),
            fraction_watched: fraction,
            watched_at: now(),
        })
        .await
        .unwrap();
}

fn quiz(assessment_id: &str, subject_id: &str, label: &str, correct: u32, total: u32) -> SubmitAssessment {
    SubmitAssessment {
        learner_id: learner(),
        assessment_id: assessment_id.to_string(),
        subject_id: subject_id.to_string(),
        chapter_label: label.to_string(),
        total_questions: total,
        answers: (0..total)
            .map(|i| SubmittedAnswer {
                question_index: i,
                submitted_value: "x".to_string(),
                correct: i < correct,
            })
            .collect(),
        elapsed_seconds: 300,
        allowed_duration_seconds: 600,
        scoring: None,
        completed_at: Some(Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()),
    }
}

#[tokio::test]
async fn chapter_percentages_are_averaged_per_subject() {
    let (engine, _store) = setup(EngineConfig::default()).await;
    watch(&engine, "p1", 1.0).await;
    watch(&engine, "p2", 0.92).await;
    watch(&engine, "p3", 0.4).await;

    let report = engine
        .compute_progress_at(&learner(), TimeRange::ThreeMonths, now())
        .await
        .unwrap();

    let physics = report.subject("physics").unwrap();
    assert_eq!(physics.chapters[0].progress_percentage, 100);
    assert_eq!(physics.chapters[1].progress_percentage, 50);
    assert_eq!(physics.progress_percentage, 75);
    assert_eq!(physics.completed_videos, 2);
}

#[tokio::test]
async fn learner_without_attempts_is_weak_everywhere() {
    let (engine, _store) = setup(EngineConfig::default()).await;

    let report = engine
        .compute_progress_at(&learner(), TimeRange::ThreeMonths, now())
        .await
        .unwrap();

    assert_eq!(report.subjects.len(), 2);
    assert!(report.subjects.iter().all(|s| s.average_score == 0));
    assert_eq!(report.summary.average_score, 0);
    assert_eq!(report.summary.weak_areas, vec!["Physics", "Maths"]);
    assert!(report.daily.is_empty());
    assert!(report.monthly.is_empty());
}

#[tokio::test]
async fn excluding_untested_subjects_from_the_average() {
    let config = EngineConfig {
        progress: ProgressPolicy {
            zero_attempt_subjects: ZeroAttemptPolicy::Exclude,
            ..Default::default()
        },
        ..Default::default()
    };
    let (engine, _store) = setup(config).await;
    engine
        .submit_assessment(quiz("phy-1", "physics", "ch2", 8, 10))
        .await
        .unwrap();

    let report = engine
        .compute_progress_at(&learner(), TimeRange::ThreeMonths, now())
        .await
        .unwrap();

    assert_eq!(report.summary.average_score, 80);
    assert_eq!(report.summary.subjects_in_average, 1);
    assert_eq!(report.summary.weak_areas, vec!["Maths"]);
    let motion = &report.subject("physics").unwrap().chapters[1];
    assert_eq!(motion.tests_taken, 1);
    assert_eq!(motion.average_score, 80);
}

#[tokio::test]
async fn reattempt_replaces_the_earlier_score() {
    let (engine, _store) = setup(EngineConfig::default()).await;
    engine
        .submit_assessment(quiz("alg-1", "maths", "Algebra", 4, 10))
        .await
        .unwrap();
    engine
        .submit_assessment(quiz("alg-1", "maths", "Algebra", 9, 10))
        .await
        .unwrap();

    let report = engine
        .compute_progress_at(&learner(), TimeRange::ThreeMonths, now())
        .await
        .unwrap();
    let maths = report.subject("maths").unwrap();
    assert_eq!(maths.tests_taken, 1);
    assert_eq!(maths.average_score, 90);

    // Both submissions were credited.
    let ledger = engine.ledger(&learner()).await.unwrap().unwrap();
    assert_eq!(ledger.tests_completed, 2);
}

#[tokio::test]
async fn unenrolled_learner_gets_empty_report() {
    let (engine, _store) = setup(EngineConfig::default()).await;
    let stranger = LearnerId::from("stu-unknown");

    let report = engine.compute_progress(&stranger, "1y").await.unwrap();

    assert_eq!(report.range, TimeRange::OneYear);
    assert!(report.subjects.is_empty());
    assert_eq!(report.summary.average_score, 0);
    assert!(report.summary.weak_areas.is_empty());
}

#[tokio::test]
async fn repeated_reports_are_identical() {
    let (engine, _store) = setup(EngineConfig::default()).await;
    watch(&engine, "m1", 0.5).await;
    engine
        .submit_assessment(quiz("phy-1", "physics", "Motion", 7, 10))
        .await
        .unwrap();

    let first = engine
        .compute_progress_at(&learner(), TimeRange::SixMonths, now())
        .await
        .unwrap();
    let second = engine
        .compute_progress_at(&learner(), TimeRange::SixMonths, now())
        .await
        .unwrap();
    assert_eq!(first, second);
}
