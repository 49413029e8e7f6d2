//! Progress dashboard.

use anyhow::{Result, bail};
use clap::Args;
use comfy_table::{Cell, Color};
use edutrack_engine::{LearnerId, ProgressReport, ScoreBucket, TimeRange};

use super::{print_json, table};
use crate::store;

#[derive(Args, Debug)]
pub struct ProgressArgs {
    /// Learner ID
    pub learner: String,

    /// Reporting window for test scores (3m, 6m, 1y)
    #[arg(short, long, default_value = "3m")]
    pub range: String,

    /// Show per-chapter detail for every subject
    #[arg(long)]
    pub chapters: bool,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: ProgressArgs) -> Result<()> {
    // The engine falls back to 3m for unknown labels; the CLI is stricter.
    if TimeRange::parse(&args.range).is_none() {
        bail!("Unknown range '{}'. Use 3m, 6m or 1y", args.range);
    }

    let (engine, _store) = store::open_engine().await?;
    let report = engine
        .compute_progress(&LearnerId::new(args.learner), &args.range)
        .await?;

    if args.json {
        return print_json(&report);
    }
    print_report(&report, args.chapters);
    Ok(())
}

fn print_report(report: &ProgressReport, chapters: bool) {
    if report.subjects.is_empty() {
        println!("{} has no enrolled subjects with a catalog.", report.learner_id);
        return;
    }

    let summary = &report.summary;
    println!(
        "{}: average {}% over {} tests since {}",
        report.learner_id,
        summary.average_score,
        summary.tests_taken,
        report.range_start.format("%Y-%m-%d")
    );
    println!(
        "Videos {}/{}, chapters {}/{}",
        summary.videos_completed,
        summary.videos_available,
        summary.chapters_completed,
        summary.chapters_available
    );
    if !summary.weak_areas.is_empty() {
        println!("Weak areas: {}", summary.weak_areas.join(", "));
    }

    let mut subjects = table(&["Subject", "Progress", "Chapters", "Videos", "Tests", "Average"]);
    for subject in &report.subjects {
        let weak = summary.weak_areas.contains(&subject.name);
        let average = match (subject.no_tests_taken, weak) {
            (true, _) => Cell::new("-").fg(Color::Red),
            (false, true) => Cell::new(format!("{}%", subject.average_score)).fg(Color::Red),
            (false, false) => Cell::new(format!("{}%", subject.average_score)),
        };
        subjects.add_row(vec![
            Cell::new(&subject.name),
            Cell::new(format!("{}%", subject.progress_percentage)),
            Cell::new(format!(
                "{}/{}",
                subject.chapters_completed, subject.chapter_count
            )),
            Cell::new(format!(
                "{}/{}",
                subject.completed_videos, subject.total_videos
            )),
            Cell::new(subject.tests_taken),
            average,
        ]);
    }
    println!("{subjects}");

    if chapters {
        for subject in &report.subjects {
            let mut table = table(&["Chapter", "Progress", "Videos", "Tests", "Average"]);
            for chapter in &subject.chapters {
                table.add_row(vec![
                    Cell::new(&chapter.name),
                    Cell::new(format!("{}%", chapter.progress_percentage)),
                    Cell::new(format!(
                        "{}/{}",
                        chapter.completed_videos, chapter.total_videos
                    )),
                    Cell::new(chapter.tests_taken),
                    Cell::new(if chapter.tests_taken == 0 {
                        "-".to_string()
                    } else {
                        format!("{}%", chapter.average_score)
                    }),
                ]);
            }
            println!("{}", subject.name);
            println!("{table}");
        }
    }

    if !report.monthly.is_empty() {
        println!("Monthly scores");
        println!("{}", series_table(&report.monthly));
    }
    if !report.daily.is_empty() {
        println!("Daily scores");
        println!("{}", series_table(&report.daily));
    }
}

fn series_table(buckets: &[ScoreBucket]) -> comfy_table::Table {
    let mut table = table(&["Period", "Tests", "Average"]);
    for bucket in buckets {
        table.add_row(vec![
            Cell::new(&bucket.label),
            Cell::new(bucket.attempts),
            Cell::new(format!("{:.1}%", bucket.average_score)),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_range_is_rejected_before_opening_the_database() {
        let err = run(ProgressArgs {
            learner: "stu-1".to_string(),
            range: "2w".to_string(),
            chapters: false,
            json: false,
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("2w"));
    }
}
