mod classify;
mod config;
mod db;
mod deepgram;
mod error;
mod extract;
mod gemini;
mod pipeline;

use std::time::Instant;

use clap::{Parser, Subcommand};

use config::Settings;
use pipeline::PipelineContext;

#[derive(Parser)]
#[command(name = "resource_tagger", about = "Extract content from online resources and tag them with an AI classifier")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Add resource URLs to the queue
    Add {
        /// One or more resource URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Extract, transcribe and tag queued resources
    Run {
        /// Max resources to process
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
    },
    /// Tag vocabulary with usage counts
    Tags,
    /// Show pipeline statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => {
            let settings = Settings::offline();
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            println!("Database ready: {}", settings.db_path.display());
            Ok(())
        }
        Commands::Add { urls } => {
            let settings = Settings::offline();
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let mut inserted = 0;
            for url in &urls {
                inserted += db::insert_resource(&conn, url)?;
            }
            println!("Inserted {} new resources ({} given)", inserted, urls.len());
            Ok(())
        }
        Commands::Run { limit } => {
            let settings = Settings::from_env()?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let ctx = PipelineContext::new(settings)?;
            let resources = db::fetch_resources(&conn, limit)?;
            if resources.is_empty() {
                println!("No resources queued. Run 'add' first.");
                return Ok(());
            }
            println!("Processing {} resources...", resources.len());
            let stats = pipeline::run_batch(&ctx, &conn, resources).await?;
            stats.print();
            Ok(())
        }
        Commands::Tags => {
            let settings = Settings::offline();
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_tag_overview(&conn)?;
            if rows.is_empty() {
                println!("No tags yet.");
                return Ok(());
            }
            println!("{:<24} | {:>9}", "Tag", "Resources");
            println!("{}", "-".repeat(36));
            for r in &rows {
                println!("{:<24} | {:>9}", truncate(&r.name, 24), r.resources);
            }
            Ok(())
        }
        Commands::Stats => {
            let settings = Settings::offline();
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Resources:   {}", s.resources);
            println!("Transcripts: {}", s.transcripts);
            println!("Tags:        {}", s.tags);
            println!("Tag links:   {}", s.links);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
