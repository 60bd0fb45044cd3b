//! Fixed-size worker pool draining the request queue.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::dispatch::pipeline::Dispatcher;
use crate::dispatch::queue::RequestQueue;
use crate::observability::metrics;

/// Default number of workers: two per CPU core.
pub fn default_pool_size() -> usize {
    (num_cpus::get() * 2).max(1)
}

/// Workers each loop `dequeue → dispatch` until the queue is closed and empty.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one) on the current runtime.
    pub fn start(size: usize, queue: Arc<RequestQueue>, dispatcher: Arc<Dispatcher>) -> Self {
        let size = size.max(1);
        let workers = (0..size)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(worker_loop(id, queue, dispatcher))
            })
            .collect();

        tracing::info!(workers = size, "Worker pool started");
        Self { workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Wait for every worker to exit.
    pub async fn join(self) {
        for (id, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                tracing::error!(worker = id, error = %e, "Worker task terminated abnormally");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

async fn worker_loop(id: usize, queue: Arc<RequestQueue>, dispatcher: Arc<Dispatcher>) {
    tracing::debug!(worker = id, "Worker started");
    while let Some(ctx) = queue.dequeue().await {
        metrics::record_queue_depth(queue.len());
        dispatcher.dispatch(ctx).await;
    }
    tracing::debug!(worker = id, "Worker exiting");
}
