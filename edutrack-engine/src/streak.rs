//! Correct-answer streak tracking within a single attempt.

/// Tracks the current and longest run of correct answers.
///
/// A fresh tracker is created per attempt; nothing carries over between
/// attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakTracker {
    current: u32,
    max: u32,
}

impl StreakTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the outcome of the next question.
    pub fn on_answer(&mut self, correct: bool) {
        if correct {
            self.current += 1;
            self.max = self.max.max(self.current);
        } else {
            self.current = 0;
        }
    }

    #[must_use]
    pub fn current(&self) -> u32 {
        self.current
    }

    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Run a whole answer sequence through a fresh tracker.
    #[must_use]
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut tracker = Self::new();
        for correct in outcomes {
            tracker.on_answer(correct);
        }
        tracker
    }
}
