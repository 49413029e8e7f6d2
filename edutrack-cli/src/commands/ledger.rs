use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use edutrack_engine::{LearnerId, LearnerRewardLedger};

use super::{print_json, table};
use crate::store;

#[derive(Args, Debug)]
pub struct LedgerArgs {
    /// Learner ID
    pub learner: String,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: LedgerArgs) -> Result<()> {
    let (engine, _store) = store::open_engine().await?;
    let learner = LearnerId::new(args.learner);
    let ledger = engine
        .ledger(&learner)
        .await?
        .unwrap_or_else(|| LearnerRewardLedger::empty(learner));

    if args.json {
        return print_json(&ledger);
    }

    let mut table = table(&["XP", "Currency", "Tests", "Last test"]);
    table.add_row(vec![
        Cell::new(ledger.total_xp),
        Cell::new(ledger.currency_balance),
        Cell::new(ledger.tests_completed),
        Cell::new(
            ledger
                .last_test_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
    ]);
    println!("{}", ledger.learner_id);
    println!("{table}");
    Ok(())
}
