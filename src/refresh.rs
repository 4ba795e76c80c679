// Scheduled inventory refresh
// Re-fetches hotel data once a day at a fixed local time and swaps the in-memory snapshot

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::hotel_data::Provenance;
use crate::inventory::InventoryEngine;

// Local wall-clock time of the daily refresh, HH:MM
pub const DEFAULT_REFRESH_TIME: &str = "02:00";

// Time left until the next occurrence of `at`; an exact hit schedules the following day
pub fn delay_until(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let today = now.date().and_time(at);
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

// One refresh attempt; failures are logged and never stop the schedule
pub async fn refresh_once(inventory: &InventoryEngine) -> Option<Provenance> {
    info!("Running scheduled hotel data refresh");
    match inventory.refresh().await {
        Ok(provenance) => {
            info!(provenance = %provenance, "Scheduled refresh completed");
            Some(provenance)
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Scheduled refresh failed");
            None
        }
    }
}

pub fn spawn_daily_refresh(inventory: Arc<InventoryEngine>, at: NaiveTime) -> JoinHandle<()> {
    info!(at = %at, "Daily hotel data refresh scheduled");
    tokio::spawn(async move {
        loop {
            let delay = delay_until(Local::now().naive_local(), at);
            tokio::time::sleep(delay).await;
            refresh_once(&inventory).await;
        }
    })
}
