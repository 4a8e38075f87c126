use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error};

use crate::document::SourceDocument;
use crate::error::WorkerError;
use crate::matching::plan::{DocumentTransform, TransformPlan};

/// A document queued for transformation. `index` is its position in the run.
#[derive(Clone)]
pub struct TransformJob {
    pub index: usize,
    pub document: SourceDocument,
}

pub struct TransformResult {
    pub index: usize,
    pub document_id: String,
    pub output: DocumentTransform,
}

/// Transforms documents on a fixed set of threads.
///
/// Workers only compute contributions; merging rows stays with the caller.
pub struct TransformPool {
    job_sender: Sender<TransformJob>,
    result_receiver: Receiver<TransformResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    capacity: usize,
}

impl TransformPool {
    /// Starts `worker_count` workers (at least one).
    pub fn new(plan: Arc<TransformPlan>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let capacity = worker_count * 2;
        let (job_sender, job_receiver) = bounded::<TransformJob>(capacity);
        let (result_sender, result_receiver) = bounded::<TransformResult>(capacity);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_plan = Arc::clone(&plan);

            let handle = thread::spawn(move || {
                run_worker(worker_id, job_rx, result_tx, shutdown_flag, worker_plan);
            });

            workers.push(handle);
        }

        debug!(worker_count, "Started transform workers");

        Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
            capacity,
        }
    }

    pub fn submit(&self, job: TransformJob) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn recv_result(&self) -> Option<TransformResult> {
        self.result_receiver.recv().ok()
    }

    /// Transforms a batch, returning results in input order.
    ///
    /// At most `capacity` jobs are in flight, so neither channel can fill up
    /// while the caller is blocked on the other.
    pub fn run_batch(
        &self,
        jobs: Vec<TransformJob>,
    ) -> Result<Vec<TransformResult>, WorkerError> {
        let mut results = Vec::with_capacity(jobs.len());
        let mut in_flight = 0;

        for job in jobs {
            while in_flight >= self.capacity {
                results.push(self.recv_result().ok_or(WorkerError::ChannelClosed)?);
                in_flight -= 1;
            }
            self.submit(job)?;
            in_flight += 1;
        }
        while in_flight > 0 {
            results.push(self.recv_result().ok_or(WorkerError::ChannelClosed)?);
            in_flight -= 1;
        }

        results.sort_by_key(|r| r.index);
        Ok(results)
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            }
        }

        debug!("Transform workers stopped");
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<TransformJob>,
    result_sender: Sender<TransformResult>,
    shutdown: Arc<AtomicBool>,
    plan: Arc<TransformPlan>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                let document_id = job.document.id.clone();
                let output = panic::catch_unwind(AssertUnwindSafe(|| plan.transform(&job.document)))
                    .unwrap_or_else(|_| {
                        error!(worker_id, document_id = %document_id, "Transform panicked");
                        DocumentTransform::Failed {
                            reason: "transform panicked".to_string(),
                        }
                    });

                let result = TransformResult {
                    index: job.index,
                    document_id,
                    output,
                };
                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}
