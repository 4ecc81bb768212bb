//! A pool of worker threads for solving independent models in parallel.
//!
//! Each worker takes built models from a shared queue, solves them and passes the optimal ones
//! on. Models which could not be solved to optimality are logged and dropped. Sending `None`
//! tells a worker to stop.
use crate::model::{SolverModel, TerminationStatus};
use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

/// A unit of work for the pool. `None` shuts down the worker which receives it.
pub type WorkItem = Option<Box<dyn SolverModel + Send>>;

/// A model which was solved to optimality
pub struct SolvedModel {
    /// The worker which solved the model
    pub worker_id: usize,
    /// The model, from which the solution can be read
    pub model: Box<dyn SolverModel + Send>,
}

/// A fixed-size pool of solver threads
pub struct WorkerPool {
    work_tx: Sender<WorkItem>,
    workers: Vec<JoinHandle<()>>,
}

fn lock_queue(queue: &Mutex<Receiver<WorkItem>>) -> MutexGuard<'_, Receiver<WorkItem>> {
    queue
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Solve models from `queue` until told to stop or the queue is closed
fn run_worker(
    worker_id: usize,
    queue: &Mutex<Receiver<WorkItem>>,
    results_tx: &Sender<SolvedModel>,
) {
    loop {
        // Only hold the lock while waiting for the next item
        let item = lock_queue(queue).recv();
        let Ok(Some(mut model)) = item else {
            debug!("Worker {worker_id} shutting down");
            break;
        };

        match model.solve() {
            Ok(TerminationStatus::Optimal) => {
                info!("Worker {worker_id} solved {}", model.name());
                if results_tx.send(SolvedModel { worker_id, model }).is_err() {
                    warn!("Worker {worker_id} has nowhere to send results, shutting down");
                    break;
                }
            }
            Ok(status) => warn!(
                "Worker {worker_id} could not solve {} to optimality ({status}); dropping it",
                model.name()
            ),
            Err(err) => warn!(
                "Worker {worker_id} failed to solve {}: {err}; dropping it",
                model.name()
            ),
        }
    }
}

impl WorkerPool {
    /// Start `num_workers` workers, which send optimal results to `results_tx`.
    ///
    /// Workers are numbered from 1 in the order they are started.
    pub fn new(num_workers: usize, results_tx: &Sender<SolvedModel>) -> Result<Self> {
        anyhow::ensure!(num_workers > 0, "A worker pool needs at least one worker");

        let (work_tx, work_rx) = mpsc::channel::<WorkItem>();
        let queue = Arc::new(Mutex::new(work_rx));
        let workers = (1..=num_workers)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let results_tx = results_tx.clone();
                thread::Builder::new()
                    .name(format!("esom-worker-{worker_id}"))
                    .spawn(move || run_worker(worker_id, &queue, &results_tx))
                    .with_context(|| format!("Failed to start worker {worker_id}"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { work_tx, workers })
    }

    /// The number of workers in the pool
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Queue a model to be solved
    pub fn submit(&self, model: Box<dyn SolverModel + Send>) -> Result<()> {
        self.work_tx
            .send(Some(model))
            .map_err(|_| anyhow!("All workers have shut down"))
    }

    /// Stop every worker once the queue is empty, waiting for them to finish
    pub fn shutdown(self) -> Result<()> {
        for _ in &self.workers {
            // Workers which have already stopped don't need telling
            let _ = self.work_tx.send(None);
        }
        for worker in self.workers {
            worker
                .join()
                .map_err(|_| anyhow!("A worker thread panicked"))?;
        }
        Ok(())
    }
}
