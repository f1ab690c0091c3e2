//! Fixed-rate tick loop

use anyhow::Result;
use posebridge_core::{Bridge, Feeder, Runtime, TickOutcome, TickScheduler, TickWait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Signal,
    RuntimeQuit,
}

/// Spawn a task that raises `stop` on ctrl-c
pub fn install_stop_handler(stop: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            stop.store(true, Ordering::SeqCst);
        }
    });
}

/// Drive the feeder until the stop flag is raised or the runtime quits
pub async fn run<R: Runtime, B: Bridge>(
    mut feeder: Feeder<R, B>,
    tps: u32,
    stop: Arc<AtomicBool>,
) -> Result<StopReason> {
    let mut scheduler = TickScheduler::new(tps, Instant::now())?;
    info!(tps, period = ?scheduler.period(), "Tick loop started");

    let mut ticks: u64 = 0;
    let reason = loop {
        if stop.load(Ordering::SeqCst) {
            break StopReason::Signal;
        }

        if feeder.tick() == TickOutcome::Quit {
            break StopReason::RuntimeQuit;
        }
        ticks += 1;

        match scheduler.advance(Instant::now()) {
            TickWait::Sleep(duration) => tokio::time::sleep(duration).await,
            TickWait::Yield => tokio::task::yield_now().await,
        }
    };

    debug!(ticks, "Tick loop finished");
    Ok(reason)
}
