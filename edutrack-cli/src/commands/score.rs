//! Reward preview for a hypothetical attempt.

use anyhow::{Result, bail};
use clap::Args;
use comfy_table::Cell;
use edutrack_engine::StreakTracker;
use edutrack_engine::scoring::{self, Score, ScoreInput};

use super::{print_json, table};
use crate::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Number of questions in the assessment
    #[arg(long)]
    pub total: u32,

    /// Answer outcomes in question order, `1`/`y` for correct (e.g. 1101)
    #[arg(long, conflicts_with_all = ["correct", "max_streak"])]
    pub answers: Option<String>,

    /// Number of correct answers
    #[arg(long)]
    pub correct: Option<u32>,

    /// Longest run of consecutive correct answers
    #[arg(long)]
    pub max_streak: Option<u32>,

    /// Seconds taken
    #[arg(long)]
    pub elapsed: u32,

    /// Seconds allowed
    #[arg(long)]
    pub allowed: u32,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ScoreArgs) -> Result<()> {
    let input = score_input(&args)?;
    let config = ConfigLoader::load()?;
    let score = scoring::score(&input, &config.scoring);

    if args.json {
        return print_json(&score);
    }
    print_score(&score);
    Ok(())
}

fn score_input(args: &ScoreArgs) -> Result<ScoreInput> {
    if args.total == 0 {
        bail!("--total must be positive");
    }
    if args.allowed == 0 {
        bail!("--allowed must be positive");
    }

    let (correct_count, max_streak) = match &args.answers {
        Some(pattern) => {
            let outcomes = parse_outcomes(pattern)?;
            if outcomes.len() > args.total as usize {
                bail!("{} answers given for {} questions", outcomes.len(), args.total);
            }
            let correct = outcomes.iter().filter(|c| **c).count() as u32;
            (correct, StreakTracker::from_outcomes(outcomes).max())
        }
        None => {
            let Some(correct) = args.correct else {
                bail!("either --answers or --correct is required");
            };
            if correct > args.total {
                bail!("--correct cannot exceed --total");
            }
            let max_streak = args.max_streak.unwrap_or(0);
            if max_streak > correct {
                bail!("--max-streak cannot exceed --correct");
            }
            (correct, max_streak)
        }
    };

    Ok(ScoreInput {
        correct_count,
        total_questions: args.total,
        elapsed_seconds: args.elapsed,
        allowed_duration_seconds: args.allowed,
        max_streak,
    })
}

fn parse_outcomes(pattern: &str) -> Result<Vec<bool>> {
    pattern
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .map(|c| match c.to_ascii_lowercase() {
            '1' | 'y' | 't' => Ok(true),
            '0' | 'n' | 'f' => Ok(false),
            other => bail!("invalid answer outcome '{}'", other),
        })
        .collect()
}

fn print_score(score: &Score) {
    let mut table = table(&["Field", "Value"]);
    let rows = [
        ("Percentage", format!("{}%", score.percentage)),
        ("Time multiplier", format!("{:.2}", score.time_multiplier)),
        ("Time bonus", format!("{}s", score.reward.time_bonus)),
        ("Streak bonus", score.reward.streak_bonus.to_string()),
        ("XP earned", score.reward.xp_earned.to_string()),
        ("Points earned", score.reward.points_earned.to_string()),
        ("Currency earned", score.reward.currency_earned.to_string()),
    ];
    for (field, value) in rows {
        table.add_row(vec![Cell::new(field), Cell::new(value)]);
    }
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ScoreArgs {
        ScoreArgs {
            total: 10,
            answers: None,
            correct: None,
            max_streak: None,
            elapsed: 300,
            allowed: 600,
            json: false,
        }
    }

    #[test]
    fn answers_pattern_yields_correct_count_and_streak() {
        let input = score_input(&ScoreArgs {
            answers: Some("1110111111".to_string()),
            ..args()
        })
        .unwrap();

        assert_eq!(input.correct_count, 9);
        assert_eq!(input.max_streak, 6);
    }

    #[test]
    fn short_pattern_leaves_remaining_questions_unanswered() {
        let input = score_input(&ScoreArgs {
            answers: Some("y, y, n".to_string()),
            ..args()
        })
        .unwrap();

        assert_eq!(input.correct_count, 2);
        assert_eq!(input.total_questions, 10);
    }

    #[test]
    fn explicit_counts_are_checked() {
        let err = score_input(&ScoreArgs {
            correct: Some(4),
            max_streak: Some(5),
            ..args()
        })
        .unwrap_err();
        assert!(err.to_string().contains("--max-streak"));

        assert!(score_input(&args()).is_err());
    }

    #[test]
    fn zero_allowed_duration_is_rejected() {
        let err = score_input(&ScoreArgs {
            correct: Some(1),
            allowed: 0,
            ..args()
        })
        .unwrap_err();
        assert!(err.to_string().contains("--allowed"));
    }

    #[test]
    fn invalid_outcome_character_is_rejected() {
        assert!(parse_outcomes("11x").is_err());
        assert_eq!(parse_outcomes("TfN").unwrap(), vec![true, false, false]);
    }
}
