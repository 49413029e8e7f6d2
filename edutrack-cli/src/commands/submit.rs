//! Submission of a completed assessment.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use edutrack_engine::{SubmitAssessment, TestAttempt};

use super::{print_json, read_json, table};
use crate::store;

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// JSON file with the submission, or `-` for stdin
    pub file: PathBuf,

    /// Print the stored attempt as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: SubmitArgs) -> Result<()> {
    let cmd: SubmitAssessment = read_json(&args.file)?;
    let (engine, _store) = store::open_engine().await?;
    let attempt = engine.submit_assessment(cmd).await?;

    if args.json {
        return print_json(&attempt);
    }
    print_attempt(&attempt);
    Ok(())
}

fn print_attempt(attempt: &TestAttempt) {
    println!(
        "Saved attempt {} for {} ({})",
        attempt.attempt_id, attempt.learner_id, attempt.assessment_id
    );
    let mut table = table(&["Score", "Streak", "XP", "Points", "Currency"]);
    table.add_row(vec![
        Cell::new(format!(
            "{}/{} ({}%)",
            attempt.correct_count, attempt.total_questions, attempt.percentage_score
        )),
        Cell::new(attempt.max_streak),
        Cell::new(attempt.reward.xp_earned),
        Cell::new(attempt.reward.points_earned),
        Cell::new(attempt.reward.currency_earned),
    ]);
    println!("{table}");
}
