//! Subject catalog management.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use edutrack_engine::{ActivityReader, SubjectCatalog};

use super::{print_json, read_json, table};
use crate::config::ConfigLoader;
use crate::store;

#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommands,
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommands {
    /// Import (or replace) a subject catalog from JSON
    Import {
        /// JSON file with the catalog, or `-` for stdin
        file: PathBuf,
    },
    /// Show a subject catalog
    Show {
        /// Subject ID
        subject: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(args: CatalogArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let store = store::open_store(&config).await?;

    match args.command {
        CatalogCommands::Import { file } => {
            let catalog: SubjectCatalog = read_json(&file)?;
            check_catalog(&catalog)?;
            store.put_subject_catalog(&catalog).await?;
            println!(
                "Imported {} ({}): {} chapters, {} videos",
                catalog.name,
                catalog.subject_id,
                catalog.chapters.len(),
                catalog.total_videos()
            );
            Ok(())
        }
        CatalogCommands::Show { subject, json } => {
            let Some(catalog) = store.fetch_subject_catalog(&subject).await? else {
                bail!("No catalog for subject '{}'", subject);
            };
            if json {
                return print_json(&catalog);
            }
            print_catalog(&catalog);
            Ok(())
        }
    }
}

fn check_catalog(catalog: &SubjectCatalog) -> Result<()> {
    if catalog.subject_id.trim().is_empty() {
        bail!("catalog is missing subject_id");
    }
    let mut seen = std::collections::HashSet::new();
    for video in catalog.chapters.iter().flat_map(|c| &c.videos) {
        if !seen.insert(video.id.as_str()) {
            bail!("video '{}' is listed more than once", video.id);
        }
    }
    Ok(())
}

fn print_catalog(catalog: &SubjectCatalog) {
    println!("{} ({})", catalog.name, catalog.subject_id);
    let mut table = table(&["Chapter", "Key", "Videos"]);
    for chapter in &catalog.chapters {
        table.add_row(vec![
            Cell::new(&chapter.name),
            Cell::new(chapter.chapter_key()),
            Cell::new(chapter.videos.len()),
        ]);
    }
    println!("{table}");
}
