//! panel worker thread
//! - first tick runs at once, then one tick per interval
//! - shutdown is sampled at the top of every tick
//! - at shutdown an outstanding request or unwritten actuator state gets a few
//!   more ticks to settle
//! - the transport is released when the loop ends

use std::thread;
use std::time::Duration;

use super::collector::{ResponseCollector, TickOutcome};
use crate::common::error::{ErrorCode, PanelError};
use crate::{debug, info, warn};

const LOG_TAG: &str = "panel_thread";

pub fn run_loop(mut collector: ResponseCollector, tick_interval: Duration, shutdown_grace_ticks: u32) {
    info!(LOG_TAG, "panel worker started, tick interval {:?}", tick_interval);

    let mut first = true;
    let mut grace_left = shutdown_grace_ticks;

    loop {
        if !first {
            thread::sleep(tick_interval);
        }
        first = false;

        if collector.shutdown_requested() {
            if collector.is_drained() {
                break;
            }
            if grace_left == 0 {
                warn!(LOG_TAG, "link not settled after {} ticks, abandoning it", shutdown_grace_ticks);
                break;
            }
            grace_left -= 1;
        }

        let outcome = collector.tick();
        if outcome != TickOutcome::Idle {
            debug!(LOG_TAG, "tick {:?}", outcome);
        }
    }

    collector.close();
    info!(LOG_TAG, "panel worker stopped");
}

/// start the worker on its own thread
pub fn spawn(
    collector: ResponseCollector,
    tick_interval: Duration,
    shutdown_grace_ticks: u32,
) -> Result<thread::JoinHandle<()>, PanelError> {
    thread::Builder::new()
        .name("panel-worker".to_string())
        .spawn(move || run_loop(collector, tick_interval, shutdown_grace_ticks))
        .map_err(|e| PanelError::new(ErrorCode::WorkerFailure, &format!("cannot start panel worker, exception: {}", e)))
}
