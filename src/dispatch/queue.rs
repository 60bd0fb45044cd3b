//! Request queue between the accept loop and the worker pool.
//!
//! # Design Decisions
//! - Built on tokio `mpsc`; the single receiver is shared behind an async mutex,
//!   which turns it into a multi-consumer queue
//! - `close` drops the sending side, so buffered requests still drain and
//!   `dequeue` returns `None` only once the queue is empty

use std::sync::atomic::{AtomicUsize, Ordering};

use arc_swap::ArcSwapOption;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::http::RequestContext;

/// A request the queue refused, handed back to the caller.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("request queue is full")]
    Full(RequestContext),

    #[error("request queue is closed")]
    Closed(RequestContext),
}

impl QueueError {
    pub fn into_inner(self) -> RequestContext {
        match self {
            QueueError::Full(ctx) | QueueError::Closed(ctx) => ctx,
        }
    }
}

enum Tx {
    Bounded(mpsc::Sender<RequestContext>),
    Unbounded(mpsc::UnboundedSender<RequestContext>),
}

enum Rx {
    Bounded(mpsc::Receiver<RequestContext>),
    Unbounded(mpsc::UnboundedReceiver<RequestContext>),
}

/// Multi-producer, multi-consumer FIFO of pending requests.
pub struct RequestQueue {
    tx: ArcSwapOption<Tx>,
    rx: Mutex<Rx>,
    capacity: Option<usize>,
    depth: AtomicUsize,
}

impl RequestQueue {
    /// A queue holding at most `capacity` requests (minimum 1).
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self::from_parts(Tx::Bounded(tx), Rx::Bounded(rx), Some(capacity))
    }

    pub fn unbounded() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self::from_parts(Tx::Unbounded(tx), Rx::Unbounded(rx), None)
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) => Self::bounded(capacity),
            None => Self::unbounded(),
        }
    }

    fn from_parts(tx: Tx, rx: Rx, capacity: Option<usize>) -> Self {
        Self {
            tx: ArcSwapOption::from_pointee(tx),
            rx: Mutex::new(rx),
            capacity,
            depth: AtomicUsize::new(0),
        }
    }

    /// Add a request, waiting for space when the queue is full.
    pub async fn enqueue(&self, ctx: RequestContext) -> Result<(), QueueError> {
        let Some(tx) = self.tx.load_full() else {
            return Err(QueueError::Closed(ctx));
        };

        match tx.as_ref() {
            Tx::Bounded(tx) => {
                // A waiting producer holds no slot and is not counted.
                let Ok(permit) = tx.reserve().await else {
                    return Err(QueueError::Closed(ctx));
                };
                // Count before sending so a fast consumer never decrements below zero.
                self.depth.fetch_add(1, Ordering::AcqRel);
                permit.send(ctx);
                Ok(())
            }
            Tx::Unbounded(tx) => {
                self.depth.fetch_add(1, Ordering::AcqRel);
                tx.send(ctx).map_err(|e| {
                    self.depth.fetch_sub(1, Ordering::AcqRel);
                    QueueError::Closed(e.0)
                })
            }
        }
    }

    /// Add a request without waiting; a full queue hands it back.
    pub fn try_enqueue(&self, ctx: RequestContext) -> Result<(), QueueError> {
        let Some(tx) = self.tx.load_full() else {
            return Err(QueueError::Closed(ctx));
        };

        match tx.as_ref() {
            Tx::Bounded(tx) => {
                let permit = match tx.try_reserve() {
                    Ok(permit) => permit,
                    Err(mpsc::error::TrySendError::Full(())) => return Err(QueueError::Full(ctx)),
                    Err(mpsc::error::TrySendError::Closed(())) => {
                        return Err(QueueError::Closed(ctx))
                    }
                };
                self.depth.fetch_add(1, Ordering::AcqRel);
                permit.send(ctx);
                Ok(())
            }
            Tx::Unbounded(tx) => {
                self.depth.fetch_add(1, Ordering::AcqRel);
                tx.send(ctx).map_err(|e| {
                    self.depth.fetch_sub(1, Ordering::AcqRel);
                    QueueError::Closed(e.0)
                })
            }
        }
    }

    /// Next request, or `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<RequestContext> {
        let mut rx = self.rx.lock().await;
        let next = match &mut *rx {
            Rx::Bounded(rx) => rx.recv().await,
            Rx::Unbounded(rx) => rx.recv().await,
        };
        if next.is_some() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
        }
        next
    }

    /// Refuse further requests. Already queued requests remain available.
    pub fn close(&self) {
        if self.tx.swap(None).is_some() {
            tracing::debug!(pending = self.len(), "Request queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.load().is_none()
    }

    /// Number of buffered requests.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured bound, `None` for an unbounded queue.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use std::sync::Arc;
    use axum::http::Method;

    fn ctx(path: &str) -> RequestContext {
        let (ctx, _rx) = RequestContext::new(Request::new("127.0.0.1:1".parse().unwrap(), Method::GET, path));
        ctx
    }

    #[tokio::test]
    async fn fifo_order() {
        let queue = RequestQueue::unbounded();
        queue.enqueue(ctx("/1")).await.unwrap();
        queue.enqueue(ctx("/2")).await.unwrap();
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.dequeue().await.unwrap().request().path(), "/1");
        assert_eq!(queue.dequeue().await.unwrap().request().path(), "/2");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn try_enqueue_reports_full() {
        let queue = RequestQueue::bounded(1);
        queue.try_enqueue(ctx("/a")).unwrap();
        let err = queue.try_enqueue(ctx("/b")).unwrap_err();
        assert!(matches!(err, QueueError::Full(_)));
        assert_eq!(err.into_inner().request().path(), "/b");
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn close_drains_then_ends() {
        let queue = RequestQueue::bounded(4);
        queue.enqueue(ctx("/a")).await.unwrap();
        queue.enqueue(ctx("/b")).await.unwrap();
        queue.close();

        assert!(matches!(queue.enqueue(ctx("/c")).await, Err(QueueError::Closed(_))));
        assert!(matches!(queue.try_enqueue(ctx("/d")), Err(QueueError::Closed(_))));

        assert!(queue.dequeue().await.is_some());
        assert!(queue.dequeue().await.is_some());
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn enqueue_waits_for_space() {
        let queue = Arc::new(RequestQueue::bounded(1));
        queue.enqueue(ctx("/first")).await.unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.enqueue(ctx("/second")).await.is_ok() })
        };

        tokio::task::yield_now().await;
        assert!(!producer.is_finished());

        assert_eq!(queue.dequeue().await.unwrap().request().path(), "/first");
        assert!(producer.await.unwrap());
        assert_eq!(queue.dequeue().await.unwrap().request().path(), "/second");
    }

    #[tokio::test]
    async fn waiting_producer_is_not_counted() {
        let queue = Arc::new(RequestQueue::bounded(2));
        queue.enqueue(ctx("/a")).await.unwrap();
        queue.enqueue(ctx("/b")).await.unwrap();

        let producers: Vec<_> = (0..3)
            .map(|i| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.enqueue(ctx(&format!("/wait{i}"))).await.is_ok() })
            })
            .collect();
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(queue.len(), 2);

        let mut seen = 0;
        while seen < 5 {
            queue.dequeue().await.unwrap();
            seen += 1;
            assert!(queue.len() <= 2);
        }
        for producer in producers {
            assert!(producer.await.unwrap());
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        assert_eq!(RequestQueue::bounded(0).capacity(), Some(1));
        assert_eq!(RequestQueue::with_capacity(None).capacity(), None);
    }
}
