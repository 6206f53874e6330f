//! Word Study - Vocabulary planner with spaced review and study analytics.

mod app;
mod commands;
mod config;
mod render;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use app::App;
use config::Config;
use render::OutputFormat;

#[derive(Parser)]
#[command(name = "word-study", about = "Vocabulary study planner", version)]
struct Cli {
    /// Learner the command acts for (default: $USER)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "plain")]
    format: OutputFormat,

    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (default: platform data dir)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add a word
    Add {
        term: String,
        definition: String,
        #[command(flatten)]
        extra: WordFields,
    },

    /// Import words from a JSON array of drafts ("-" reads stdin)
    Import { file: PathBuf },

    /// Replace a word's content
    Edit {
        id: Uuid,
        term: String,
        definition: String,
        #[command(flatten)]
        extra: WordFields,
    },

    /// Delete a word and its review history
    Delete { id: Uuid },

    /// List words, most recently changed first
    List {
        /// Case-insensitive term filter
        #[arg(long)]
        query: Option<String>,
    },

    /// Show a single word
    Show { id: Uuid },

    /// Words due for review now
    Due,

    /// Words answered wrong at least once
    Incorrect,

    /// Record an answer for a word
    Review {
        id: Uuid,
        #[arg(long, conflicts_with = "wrong", required_unless_present = "wrong")]
        correct: bool,
        #[arg(long)]
        wrong: bool,
    },

    /// Today's study list
    Plan {
        /// Daily target (5-200)
        #[arg(long)]
        target: Option<u32>,
        /// Percentage of new words (0-100)
        #[arg(long)]
        ratio: Option<u32>,
        /// Only count words created at or after this time as new (RFC 3339)
        #[arg(long)]
        imported_after: Option<String>,
    },

    /// Word counts and study stats
    Overview,

    /// Study days and streak
    Stats,

    /// Mark today as a study day
    RecordStudy,

    /// Study habits over the last 7 days
    Behavior,

    /// Record a finished study session
    Session {
        /// Session start (RFC 3339)
        #[arg(long)]
        started_at: String,
        /// Duration in seconds
        #[arg(long)]
        seconds: u32,
    },
}

/// Optional word content shared by `add` and `edit`.
#[derive(clap::Args, Default)]
pub struct WordFields {
    /// Additional meaning (repeatable)
    #[arg(long = "meaning")]
    pub meanings: Vec<String>,
    /// Example sentence (repeatable)
    #[arg(long = "example")]
    pub examples: Vec<String>,
    #[arg(long)]
    pub root: Option<String>,
    /// Similar word (repeatable)
    #[arg(long = "similar")]
    pub similar: Vec<String>,
    /// Exam tag such as CET4 or IELTS
    #[arg(long)]
    pub exam: Option<String>,
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_env("WORD_STUDY_LOG")
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = Config::try_load(cli.config.as_deref());
    let config = loaded.as_ref().cloned().unwrap_or_default();
    init_logging(&config);
    if let Err(err) = &loaded {
        warn!(error = %format!("{err:#}"), "using default config");
    }

    let user = cli.user.unwrap_or_else(app::default_user);
    let app = App::new(config, cli.database.as_deref(), user)?;

    let output = commands::run(&app, cli.format, cli.command, chrono::Utc::now())?;
    println!("{output}");
    Ok(())
}
