use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::source::SessionSource;
use crate::sync::{CycleReport, SessionSync};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Running,
}

/// Admits at most one sync cycle at a time.
///
/// `try_begin` moves `Idle -> Running` and hands out a guard; dropping the
/// guard moves back to `Idle`. A tick that arrives while `Running` is
/// skipped, not queued.
#[derive(Debug, Clone, Default)]
pub struct TickGate {
    running: Arc<AtomicBool>,
}

impl TickGate {
    pub fn state(&self) -> SyncState {
        if self.running.load(Ordering::Acquire) {
            SyncState::Running
        } else {
            SyncState::Idle
        }
    }

    pub fn try_begin(&self) -> Option<TickGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickGuard {
                running: Arc::clone(&self.running),
            })
    }
}

/// Held for the duration of one cycle.
#[derive(Debug)]
pub struct TickGuard {
    running: Arc<AtomicBool>,
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Run the sync loop: one cycle immediately, then one per `interval`.
///
/// Each admitted tick runs on its own task so the timer keeps firing; ticks
/// that find the previous cycle still running are skipped. On shutdown the
/// in-flight cycle is awaited.
pub async fn run_scheduler<S: SessionSource>(
    sync: Arc<SessionSync<S>>,
    interval: Duration,
    gate: TickGate,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut in_flight: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match gate.try_begin() {
                    Some(guard) => {
                        let sync = Arc::clone(&sync);
                        in_flight = Some(tokio::spawn(async move {
                            let _guard = guard;
                            let _ = run_logged(&sync).await;
                        }));
                    }
                    None => warn!("Previous sync cycle still running, skipping tick"),
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Scheduler shutting down");
                    break;
                }
            }
        }
    }

    if let Some(handle) = in_flight {
        if let Err(e) = handle.await {
            error!("Sync cycle task failed: {e}");
        }
    }
}

/// Run a single cycle outside the timer.
pub async fn run_once<S: SessionSource>(sync: &SessionSync<S>) -> Result<CycleReport> {
    run_logged(sync).await
}

async fn run_logged<S: SessionSource>(sync: &SessionSync<S>) -> Result<CycleReport> {
    match sync.run_cycle().await {
        Ok(report) => {
            if report.changed_cache() {
                info!(
                    "Session sync: {} sessions, {} thumbnails ({} downloaded, {} failed, {} evicted)",
                    report.sessions,
                    report.thumbnails,
                    report.downloaded,
                    report.failed,
                    report.evicted
                );
            } else {
                debug!(
                    "Session sync: up to date ({} sessions, {} thumbnails)",
                    report.sessions, report.thumbnails
                );
            }
            Ok(report)
        }
        Err(e) => {
            warn!("Session sync cycle failed: {e:#}");
            Err(e)
        }
    }
}
