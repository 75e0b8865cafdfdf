//! Serialized update worker.
//!
//! Every index-mutating job funnels through one background thread reading a
//! FIFO channel, so two writers never touch a database at the same time. A
//! failing job is logged and the worker moves on to the next one.

use super::executor::{JobExecutor, JobOutcome};
use super::job::UpdateJob;
use crate::error::{StoreError, StoreResult};
use crate::utils::format_millis;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, error, info};

enum Message {
    Job(UpdateJob),
    Shutdown,
}

/// Handle on the update worker. Dropping it drains queued jobs and joins
/// the worker.
pub struct UpdateScheduler {
    tx: Option<Sender<Message>>,
    worker: Option<JoinHandle<()>>,
}

impl UpdateScheduler {
    /// Spawn the worker thread.
    pub fn start(executor: Arc<dyn JobExecutor>) -> StoreResult<Self> {
        let (tx, rx) = mpsc::channel::<Message>();
        let worker = std::thread::Builder::new()
            .name("tagdb-update-worker".to_string())
            .spawn(move || worker_loop(rx, executor))
            .map_err(StoreError::WorkerSpawn)?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Queue a job behind everything already submitted.
    ///
    /// Returns as soon as the job is queued; its own failure is only logged.
    pub fn submit(&self, job: UpdateJob) -> StoreResult<()> {
        let tx = self.tx.as_ref().ok_or(StoreError::SchedulerStopped)?;
        debug!(job = %job, "Queueing update job");
        tx.send(Message::Job(job))
            .map_err(|_| StoreError::SchedulerStopped)
    }

    pub fn is_running(&self) -> bool {
        self.tx.is_some()
    }

    /// Stop accepting jobs, let queued ones finish and join the worker.
    ///
    /// A job that is already running is waited for, never interrupted.
    /// Calling this more than once is harmless.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.tx.take() {
            // The worker may already be gone if its channel broke
            let _ = tx.send(Message::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.join() {
                error!("Update worker panicked: {:?}", e);
            }
        }
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rx: Receiver<Message>, executor: Arc<dyn JobExecutor>) {
    debug!("Update worker started");
    for message in rx {
        match message {
            Message::Job(job) => run_job(executor.as_ref(), &job),
            Message::Shutdown => break,
        }
    }
    debug!("Update worker stopped");
}

/// Run one job, containing both errors and panics at the job boundary.
fn run_job(executor: &dyn JobExecutor, job: &UpdateJob) {
    let start = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| executor.execute(job)));
    let elapsed = format_millis(start.elapsed().as_millis());

    match result {
        Ok(Ok(JobOutcome::Skipped(reason))) => {
            info!(job = %job, reason = %reason, "Update job skipped");
        }
        Ok(Ok(outcome)) => {
            info!(job = %job, ?outcome, elapsed = %elapsed, "Update job finished");
        }
        Ok(Err(StoreError::UserDeclinedConfirmation { path })) => {
            info!(path = %path.display(), "Removal cancelled");
        }
        Ok(Err(e)) => {
            error!(job = %job, error = %e, elapsed = %elapsed, "Update job failed");
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(job = %job, panic = %message, "Update job panicked");
        }
    }
}
