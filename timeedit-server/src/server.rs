use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Result;
use timeedit_core::prelude::*;
use tokio::net::TcpListener;

use crate::handlers::create_app;

pub async fn start_server(schedule: Arc<ScheduleCache>, jobs: JobsConfig) -> Result<()> {
    tokio::spawn(purge_daily(schedule.clone(), jobs));

    let app = create_app(schedule);

    // PORT, default 3000
    let port = env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("TimeEdit schedule server starting on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

/// Reload the feed once a day; a failed reload keeps the old snapshot.
async fn purge_daily(schedule: Arc<ScheduleCache>, jobs: JobsConfig) {
    let mut job = DailyJob::new("purge", jobs.purge_at);
    tracing::info!("Scheduled {}", job);

    loop {
        let wait = until_next(schedule.clock().now(), job.at);
        tokio::time::sleep(wait).await;

        let now = schedule.clock().now();
        if !job.is_due(now) {
            continue;
        }
        match schedule.purge().await {
            Ok(count) => tracing::info!("Daily purge loaded {} events", count),
            Err(e) => tracing::warn!("Daily purge failed, keeping previous schedule: {}", e),
        }
        job.mark_run(now);
    }
}
