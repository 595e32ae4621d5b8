mod handlers;
mod server;

use std::sync::Arc;

use anyhow::Result;
use timeedit_core::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "timeedit_server=info,timeedit_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ScheduleConfig::from_env()?;
    let jobs = JobsConfig::from_env()?;

    let schedule = match ScheduleCache::from_config(config).await {
        Ok(schedule) => Arc::new(schedule),
        Err(e) => {
            tracing::error!("Failed to load the schedule: {}", e);
            return Err(e.into());
        }
    };

    server::start_server(schedule, jobs).await
}
