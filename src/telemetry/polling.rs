/// HTTP polling feed for the telemetry buffer
///
/// Fetches the server's cached debug events for the current workflow
/// filter on a fixed interval and merges the new ones into the telemetry
/// buffer. Failures are logged and retried on the next tick.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::TelemetryChannel;
use crate::api::ApiClient;
use crate::config::TelemetryConfig;
use crate::errors::ApiError;
use crate::logger::{self, LogTag};

#[derive(Debug, Default)]
struct PollStats {
    healthy: AtomicBool,
    polls: AtomicU64,
    failures: AtomicU64,
    added: AtomicU64,
}

/// Running poll loop; stops when dropped
pub struct PollingFeed {
    stats: Arc<PollStats>,
    task: JoinHandle<()>,
}

impl PollingFeed {
    pub fn start(
        telemetry: TelemetryChannel,
        api: ApiClient,
        interval: Duration,
        window: Duration,
    ) -> Self {
        let stats = Arc::new(PollStats::default());
        let task = tokio::spawn(run(telemetry, api, interval, window, stats.clone()));

        logger::info(
            LogTag::Telemetry,
            &format!("Polling debug events every {}ms", interval.as_millis()),
        );
        Self { stats, task }
    }

    pub fn from_config(telemetry: TelemetryChannel, api: ApiClient, config: &TelemetryConfig) -> Self {
        Self::start(
            telemetry,
            api,
            Duration::from_millis(config.poll_interval_ms),
            Duration::from_millis(config.poll_window_ms),
        )
    }

    /// Last poll succeeded
    pub fn is_healthy(&self) -> bool {
        self.stats.healthy.load(Ordering::Relaxed)
    }

    pub fn polls(&self) -> u64 {
        self.stats.polls.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.stats.failures.load(Ordering::Relaxed)
    }

    /// Events merged into the buffer so far
    pub fn added(&self) -> u64 {
        self.stats.added.load(Ordering::Relaxed)
    }

    /// Cancel the poll loop
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for PollingFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    telemetry: TelemetryChannel,
    api: ApiClient,
    interval: Duration,
    window: Duration,
    stats: Arc<PollStats>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // First tick completes immediately
        ticker.tick().await;

        match poll_once(&telemetry, &api, window).await {
            Ok(added) => {
                stats.healthy.store(true, Ordering::Relaxed);
                stats.added.fetch_add(added as u64, Ordering::Relaxed);
                if added > 0 {
                    logger::debug(
                        LogTag::Telemetry,
                        &format!("Poll merged {} new debug events", added),
                    );
                }
            }
            Err(e) => {
                stats.healthy.store(false, Ordering::Relaxed);
                stats.failures.fetch_add(1, Ordering::Relaxed);
                logger::warning(
                    LogTag::Telemetry,
                    &format!("Debug event poll failed (will retry): {}", e),
                );
            }
        }
        stats.polls.fetch_add(1, Ordering::Relaxed);
    }
}

/// One fetch-and-merge round; returns how many events were new
pub async fn poll_once(
    telemetry: &TelemetryChannel,
    api: &ApiClient,
    window: Duration,
) -> Result<usize, ApiError> {
    let since = chrono::Utc::now().timestamp_millis() - window.as_millis() as i64;
    let workflow = telemetry.workflow();
    let events = api.devices().debug_events(workflow.as_deref(), since).await?;
    Ok(telemetry.ingest(events))
}
