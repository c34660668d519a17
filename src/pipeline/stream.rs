//! Periodic polling loop.
//!
//! Each cycle starts one task per symbol and does not wait for them; the next
//! cycle begins a full interval after the previous one started its tasks.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::pipeline::Pipeline;

/// Poll `symbols` every `every`. With `cycles` set, stop after that many
/// cycles and wait for the tasks still in flight; otherwise run until the
/// caller drops the future. Returns the number of cycles started.
pub async fn run_stream(
    pipeline: Pipeline,
    symbols: Vec<String>,
    every: Duration,
    cycles: Option<usize>,
) -> usize {
    info!(
        symbols = %symbols.join(","),
        interval_secs = every.as_secs(),
        "Starting stream"
    );

    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
    let mut started = 0usize;

    loop {
        if cycles.map_or(false, |limit| started >= limit) {
            break;
        }
        started += 1;
        debug!(cycle = started, "stream cycle");

        in_flight.retain(|h| !h.is_finished());
        for symbol in &symbols {
            let pipeline = pipeline.clone();
            let symbol = symbol.clone();
            in_flight.push(tokio::spawn(async move {
                pipeline.process_and_deliver(&symbol).await;
            }));
        }

        if cycles.map_or(false, |limit| started >= limit) {
            break;
        }
        tokio::time::sleep(every).await;
    }

    for handle in in_flight {
        let _ = handle.await;
    }
    info!(cycles = started, "Stream finished");
    started
}
