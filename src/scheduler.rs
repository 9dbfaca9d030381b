// scheduler.rs
// Periodic background jobs.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::time::sleep;

use crate::state::{AppState, actualizar_vencidas};

/// Background loop that marks overdue cuotas. Runs once at startup and then
/// every `vencidas_interval_minutes`.
pub async fn run_background_scheduler(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.vencidas_interval_minutes.max(1) * 60);
    tracing::info!(interval_minutes = interval.as_secs() / 60, "Background scheduler started");

    loop {
        let job_state = state.clone();
        let result = tokio::task::spawn_blocking(move || {
            actualizar_vencidas(&job_state, Utc::now().date_naive())
        })
        .await;

        match result {
            Ok(Ok(0)) => {}
            Ok(Ok(cambiadas)) => tracing::info!(cambiadas, "Scheduler: cuotas marked overdue"),
            Ok(Err(err)) => tracing::error!(error = %err, "Scheduler: overdue update failed"),
            Err(err) => tracing::error!(error = %err, "Scheduler: overdue job panicked"),
        }

        sleep(interval).await;
    }
}
