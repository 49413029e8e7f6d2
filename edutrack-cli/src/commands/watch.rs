//! Recording of video watch sessions.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use edutrack_engine::{LearnerId, RecordVideoWatch};

use super::print_json;
use crate::store;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Learner ID
    pub learner: String,

    /// Video ID from the subject catalog
    pub video: String,

    /// Subject the video belongs to
    #[arg(long)]
    pub subject: String,

    /// Chapter key of the video
    #[arg(long, default_value = "")]
    pub chapter: String,

    /// Fraction of the video watched in this session (0.0 to 1.0)
    #[arg(long)]
    pub fraction: f64,

    /// Print the merged watch state as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: WatchArgs) -> Result<()> {
    let (engine, _store) = store::open_engine().await?;
    let event = engine
        .record_video_watch(RecordVideoWatch {
            learner_id: LearnerId::new(args.learner),
            video_id: args.video,
            subject_id: args.subject,
            chapter_key: args.chapter,
            fraction_watched: args.fraction,
            watched_at: Utc::now(),
        })
        .await?;

    if args.json {
        return print_json(&event);
    }
    println!(
        "{}: {:.0}% watched, {} ({} sessions)",
        event.video_id,
        event.fraction_watched * 100.0,
        if event.completed { "completed" } else { "in progress" },
        event.watch_count
    );
    Ok(())
}
