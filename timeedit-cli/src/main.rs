mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use timeedit_core::{Granularity, prelude::*};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "timeedit")]
#[command(about = "Lesson lookups against a TimeEdit schedule feed")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Schedule feed URL or .ics path (defaults to $TIMEEDIT_URL)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// How the next lesson is matched against the current time (hour, minute)
    #[arg(short, long, global = true)]
    granularity: Option<Granularity>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Today's events
    Today {
        /// Print events as JSON
        #[arg(long)]
        json: bool,
    },

    /// Today's lessons, one line each
    Lessons,

    /// The next lesson
    Next,

    /// Tomorrow's lessons
    Tomorrow,

    /// Every cached event
    Events {
        /// Print events as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reminders for today's lessons
    Reminders {
        /// Minutes before each lesson
        #[arg(long, default_value = "60")]
        lead_minutes: i64,
    },

    /// Keep running: purge daily, announce lessons and fire reminders
    Watch {
        /// Seconds between checks
        #[arg(long, default_value = "30")]
        tick_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log level
    let log_level = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("timeedit_cli={0},timeedit_core={0}", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = ScheduleConfig::from_env_with(cli.url)?;
    if let Some(granularity) = cli.granularity {
        config.granularity = granularity;
    }

    let cache = ScheduleCache::from_config(config).await?;

    match cli.command {
        Commands::Today { json } => commands::today_command(&cache, json).await,
        Commands::Lessons => commands::lessons_command(&cache).await,
        Commands::Next => commands::next_command(&cache).await,
        Commands::Tomorrow => commands::tomorrow_command(&cache).await,
        Commands::Events { json } => commands::events_command(&cache, json).await,
        Commands::Reminders { lead_minutes } => {
            commands::reminders_command(&cache, lead_minutes).await
        }
        Commands::Watch { tick_secs } => {
            let jobs = JobsConfig::from_env()?;
            commands::watch_command(cache, jobs, tick_secs).await
        }
    }
}
