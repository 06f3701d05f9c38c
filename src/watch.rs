// src/watch.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

use crate::attendance_status::StatusVerdict;
use crate::recap::{local_now, RecapService};

pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 60;

/// Re-evaluates today's records on a fixed cadence so a `Pending` verdict
/// flips to `Valid`/`Invalid` as soon as the relevant cutoff passes.
///
/// The clock is read once per tick and passed into the evaluator; each
/// verdict change between ticks is logged.
pub async fn run_status_watch(service: Arc<RecapService>, interval_secs: u64) {
    info!(
        "Starting attendance status watch (every {} seconds)",
        interval_secs
    );
    let mut ticker = interval(Duration::from_secs(interval_secs));
    let mut last_verdicts: HashMap<String, StatusVerdict> = HashMap::new();
    let mut last_date = None;

    loop {
        ticker.tick().await;

        let now = local_now();
        let today = now.date();

        // Day rollover: yesterday's verdicts are no comparison baseline.
        if last_date != Some(today) {
            last_verdicts.clear();
            last_date = Some(today);
        }

        match service.daily_recap(today, now).await {
            Ok(recap) => {
                for row in &recap.rows {
                    let Some(verdict) = row.verdict else { continue };
                    match last_verdicts.get(&row.subject_id) {
                        Some(previous) if *previous != verdict => {
                            info!(
                                "Verdict changed for subject '{}': {} -> {}",
                                row.subject_id, previous, verdict
                            );
                        }
                        None => {
                            info!(
                                "Verdict for subject '{}': {}",
                                row.subject_id, verdict
                            );
                        }
                        _ => {}
                    }
                    last_verdicts.insert(row.subject_id.clone(), verdict);
                }
                info!(
                    "Recap at {}: {} valid, {} invalid, {} pending, {} leave, {} unevaluated",
                    now.format("%H:%M:%S"),
                    recap.summary.valid,
                    recap.summary.invalid,
                    recap.summary.pending,
                    recap.summary.leave,
                    recap.summary.unevaluated
                );
            }
            Err(e) => {
                // Keep the loop alive; the next tick retries.
                error!("Recap fetch failed during watch: {}", e);
            }
        }
    }
}
