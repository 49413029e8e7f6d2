use anyhow::Result;
use clap::Args;
use edutrack_engine::{ActivityReader, LearnerId};
use tracing::warn;

use crate::config::ConfigLoader;
use crate::store;

#[derive(Args, Debug)]
pub struct EnrollArgs {
    /// Learner ID
    pub learner: String,

    /// Subject IDs to enroll in
    #[arg(required = true)]
    pub subjects: Vec<String>,
}

pub async fn run(args: EnrollArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let store = store::open_store(&config).await?;
    let learner = LearnerId::new(args.learner);

    for subject in &args.subjects {
        if store.fetch_subject_catalog(subject).await?.is_none() {
            warn!(%subject, "no catalog imported yet; subject is skipped in reports until one is");
        }
        store.enroll(&learner, subject).await?;
    }

    let enrolled = store.fetch_enrolled_subject_ids(&learner).await?;
    println!("{} is enrolled in: {}", learner, enrolled.join(", "));
    Ok(())
}
