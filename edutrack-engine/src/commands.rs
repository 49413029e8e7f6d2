//! Command types accepted by the engine.
//!
//! Commands are validated by [`ProgressEngine`](crate::ProgressEngine)
//! before any score is computed or any record is written.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::error::ValidationError;
use crate::types::LearnerId;

/// One submitted answer, already marked by the assessment runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_index: u32,
    #[serde(default)]
    pub submitted_value: String,
    pub correct: bool,
}

/// Command to score and persist a completed assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAssessment {
    pub learner_id: LearnerId,
    pub assessment_id: String,
    pub subject_id: String,
    pub chapter_label: String,
    pub total_questions: u32,
    /// Answers in any order; unanswered questions count as incorrect.
    pub answers: Vec<SubmittedAnswer>,
    pub elapsed_seconds: u32,
    pub allowed_duration_seconds: u32,
    /// Per-assessment tunables. Falls back to the engine configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring: Option<ScoringConfig>,
    /// Completion instant. Defaults to the submission instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SubmitAssessment {
    /// Check every input constraint, reporting the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.learner_id.is_blank() {
            return Err(ValidationError::MissingLearnerId);
        }
        if self.total_questions == 0 {
            return Err(ValidationError::ZeroQuestions);
        }
        if self.allowed_duration_seconds == 0 {
            return Err(ValidationError::NonPositiveDuration);
        }
        if self.answers.len() > self.total_questions as usize {
            return Err(ValidationError::TooManyAnswers {
                answered: self.answers.len(),
                total: self.total_questions,
            });
        }

        let mut seen = HashSet::with_capacity(self.answers.len());
        for answer in &self.answers {
            if answer.question_index >= self.total_questions {
                return Err(ValidationError::QuestionIndexOutOfRange {
                    index: answer.question_index,
                    total: self.total_questions,
                });
            }
            if !seen.insert(answer.question_index) {
                return Err(ValidationError::DuplicateQuestionIndex(answer.question_index));
            }
        }
        Ok(())
    }

    /// Number of correctly answered questions.
    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.answers.iter().filter(|a| a.correct).count() as u32
    }

    /// Correctness of every question in index order, unanswered as `false`.
    ///
    /// Only meaningful after [`validate`](Self::validate) succeeded.
    #[must_use]
    pub fn outcomes(&self) -> Vec<bool> {
        let mut outcomes = vec![false; self.total_questions as usize];
        for answer in &self.answers {
            if let Some(slot) = outcomes.get_mut(answer.question_index as usize) {
                *slot = answer.correct;
            }
        }
        outcomes
    }
}

/// Command to record one video watch session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordVideoWatch {
    pub learner_id: LearnerId,
    pub video_id: String,
    pub subject_id: String,
    pub chapter_key: String,
    pub fraction_watched: f64,
    pub watched_at: DateTime<Utc>,
}

impl RecordVideoWatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.learner_id.is_blank() {
            return Err(ValidationError::MissingLearnerId);
        }
        if self.video_id.trim().is_empty() {
            return Err(ValidationError::MissingVideoId);
        }
        if !(0.0..=1.0).contains(&self.fraction_watched) {
            return Err(ValidationError::FractionOutOfRange(self.fraction_watched));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(question_index: u32, correct: bool) -> SubmittedAnswer {
        SubmittedAnswer {
            question_index,
            submitted_value: "a".to_string(),
            correct,
        }
    }

    fn submission(total_questions: u32, answers: Vec<SubmittedAnswer>) -> SubmitAssessment {
        SubmitAssessment {
            learner_id: LearnerId::from("stu-1"),
            assessment_id: "quiz-1".to_string(),
            subject_id: "physics".to_string(),
            chapter_label: "Motion".to_string(),
            total_questions,
            answers,
            elapsed_seconds: 120,
            allowed_duration_seconds: 600,
            scoring: None,
            completed_at: None,
        }
    }

    #[test]
    fn valid_submission_passes() {
        let cmd = submission(3, vec![answer(0, true), answer(2, false)]);
        assert_eq!(cmd.validate(), Ok(()));
    }

    #[test]
    fn zero_questions_rejected() {
        let cmd = submission(0, vec![]);
        assert_eq!(cmd.validate(), Err(ValidationError::ZeroQuestions));
    }

    #[test]
    fn zero_duration_rejected() {
        let mut cmd = submission(2, vec![]);
        cmd.allowed_duration_seconds = 0;
        assert_eq!(cmd.validate(), Err(ValidationError::NonPositiveDuration));
    }

    #[test]
    fn blank_learner_rejected() {
        let mut cmd = submission(2, vec![]);
        cmd.learner_id = LearnerId::from(" ");
        assert_eq!(cmd.validate(), Err(ValidationError::MissingLearnerId));
    }

    #[test]
    fn out_of_range_and_duplicate_indexes_rejected() {
        let cmd = submission(2, vec![answer(2, true)]);
        assert_eq!(
            cmd.validate(),
            Err(ValidationError::QuestionIndexOutOfRange { index: 2, total: 2 })
        );

        let cmd = submission(2, vec![answer(1, true), answer(1, false)]);
        assert_eq!(cmd.validate(), Err(ValidationError::DuplicateQuestionIndex(1)));
    }

    #[test]
    fn outcomes_fill_gaps_with_incorrect() {
        let cmd = submission(4, vec![answer(3, true), answer(0, true)]);
        assert_eq!(cmd.outcomes(), vec![true, false, false, true]);
        assert_eq!(cmd.correct_count(), 2);
    }

    #[test]
    fn watch_fraction_must_be_a_fraction() {
        let cmd = RecordVideoWatch {
            learner_id: LearnerId::from("stu-1"),
            video_id: "vid-1".to_string(),
            subject_id: "physics".to_string(),
            chapter_key: "motion".to_string(),
            fraction_watched: 1.5,
            watched_at: Utc::now(),
        };
        assert_eq!(cmd.validate(), Err(ValidationError::FractionOutOfRange(1.5)));
    }

    #[test]
    fn submission_deserializes_with_optional_fields_absent() {
        let json = r#"{
            "learner_id": "stu-1",
            "assessment_id": "quiz-1",
            "subject_id": "physics",
            "chapter_label": "Motion",
            "total_questions": 2,
            "answers": [{"question_index": 0, "correct": true}],
            "elapsed_seconds": 30,
            "allowed_duration_seconds": 60
        }"#;
        let cmd: SubmitAssessment = serde_json::from_str(json).unwrap();
        assert!(cmd.scoring.is_none());
        assert!(cmd.completed_at.is_none());
        assert_eq!(cmd.answers[0].submitted_value, "");
    }
}
