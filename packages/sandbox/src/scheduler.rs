// ABOUTME: Daily cleanup trigger for sandbox containers and images
// ABOUTME: Background task sleeping until a fixed local wall-clock time, then running the sweep

use crate::manager::SandboxManager;
use chrono::{Local, NaiveDateTime, NaiveTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

/// Next occurrence of `at` strictly after `now`
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        return today;
    }
    now.date()
        .succ_opt()
        .map(|tomorrow| tomorrow.and_time(at))
        .unwrap_or(today)
}

pub struct CleanupScheduler {
    manager: Arc<SandboxManager>,
    sweep_at: NaiveTime,
    running: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupScheduler {
    pub fn new(manager: Arc<SandboxManager>, sweep_at: NaiveTime) -> Self {
        Self {
            manager,
            sweep_at,
            running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        }
    }

    /// Start the sweep task; a second call while running is a no-op
    pub async fn start(&self) {
        let mut running = self.running.write().await;
        if *running {
            return;
        }
        *running = true;
        drop(running);

        let manager = self.manager.clone();
        let shutdown = self.shutdown.clone();
        let running_flag = self.running.clone();
        let sweep_at = self.sweep_at;

        let handle = tokio::spawn(async move {
            info!("Cleanup scheduler started, sweeping daily at {}", sweep_at);

            loop {
                let now = Local::now().naive_local();
                let next = next_run_after(now, sweep_at);
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        let report = manager.sweep().await;
                        info!("Scheduled sweep done: {:?}", report);
                    }
                    _ = shutdown.notified() => break,
                }
            }

            *running_flag.write().await = false;
            info!("Cleanup scheduler stopped");
        });

        *self.handle.lock().await = Some(handle);
    }

    /// Signal the task and wait for it to exit
    pub async fn stop(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            self.shutdown.notify_one();
            let _ = handle.await;
        }
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
