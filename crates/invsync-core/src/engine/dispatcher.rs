//! Fire-and-forget execution of sync runs
//!
//! [`SyncDispatcher::run_sync`] hands a request to the runtime and returns
//! immediately. A semaphore bounds how many runs execute at once; queued runs
//! wait for a permit. Runs are independent and carry no ordering guarantee
//! relative to each other.

use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use super::{SyncReport, SyncRequest, SyncWorker};
use crate::error::{Error, Result};
use crate::traits::CredentialBundle;

pub struct SyncDispatcher {
    worker: Arc<SyncWorker>,
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<SyncReport>>,
    handle: Handle,
}

impl SyncDispatcher {
    /// Create a dispatcher bound to the current Tokio runtime
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: Called outside a runtime, or `max_concurrent_runs` is 0
    pub fn new(worker: Arc<SyncWorker>, max_concurrent_runs: usize) -> Result<Self> {
        if max_concurrent_runs == 0 {
            return Err(Error::config("max_concurrent_runs must be > 0"));
        }

        let handle = Handle::try_current()
            .map_err(|e| Error::config(format!("SyncDispatcher needs a Tokio runtime: {}", e)))?;

        Ok(Self {
            worker,
            permits: Arc::new(Semaphore::new(max_concurrent_runs)),
            tasks: Mutex::new(JoinSet::new()),
            handle,
        })
    }

    /// Schedule one run and return without waiting for it
    pub fn run_sync(&self, tenant_id: &str, account_id: &str, bundle: CredentialBundle) {
        let request = SyncRequest {
            tenant_id: tenant_id.to_string(),
            account_id: account_id.to_string(),
            bundle,
        };
        let worker = Arc::clone(&self.worker);
        let permits = Arc::clone(&self.permits);

        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        Self::reap_finished(&mut tasks);

        tasks.spawn_on(
            async move {
                let _permit = permits.acquire_owned().await.ok();
                worker.run(request).await
            },
            &self.handle,
        );
        debug!(tenant_id, account_id, "Sync run scheduled");
    }

    /// Runs scheduled and not yet collected
    pub fn in_flight(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Wait for every scheduled run and return their reports
    ///
    /// Runs scheduled while draining are picked up by the next call.
    pub async fn drain(&self) -> Vec<SyncReport> {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *guard)
        };

        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!("Sync run task failed: {}", e),
            }
        }
        reports
    }

    fn reap_finished(tasks: &mut JoinSet<SyncReport>) {
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                error!("Sync run task failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for SyncDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDispatcher")
            .field("worker", &self.worker)
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}
