use crossbeam_queue::ArrayQueue;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// Result of attempting to enqueue.
///
/// # Example
/// ```rust
/// use argus_core::prelude::{SendOutcome, bounded};
///
/// let (tx, _rx) = bounded::<u8>(1);
/// assert_eq!(tx.send(1), SendOutcome::Ok);
/// assert_eq!(tx.send(2), SendOutcome::Full);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Value was accepted.
    Ok,
    /// Queue is full.
    Full,
    /// Queue is closed.
    Closed,
}

/// Result of attempting to dequeue.
#[derive(Debug)]
pub enum RecvOutcome<T> {
    /// Received value.
    Data(T),
    /// Queue has been closed and drained.
    Closed,
    /// Queue currently empty.
    Empty,
}

struct QueueInner<T> {
    queue: ArrayQueue<T>,
    closed: AtomicBool,
}

/// Bounded sender handle.
#[derive(Clone)]
pub struct BoundedTx<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> BoundedTx<T> {
    /// Attempt to send without blocking.
    pub fn send(&self, value: T) -> SendOutcome {
        if self.inner.closed.load(Ordering::Acquire) {
            return SendOutcome::Closed;
        }
        self.inner
            .queue
            .push(value)
            .map(|_| SendOutcome::Ok)
            .unwrap_or(SendOutcome::Full)
    }

    /// Close the queue to further sends.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }
}

/// Bounded receiver handle.
///
/// # Example
/// ```rust
/// use argus_core::prelude::{RecvOutcome, bounded};
///
/// let (tx, rx) = bounded::<u8>(2);
/// let _ = tx.send(5);
/// assert!(matches!(rx.recv(), RecvOutcome::Data(5)));
/// assert!(matches!(rx.recv(), RecvOutcome::Empty));
/// ```
#[derive(Clone)]
pub struct BoundedRx<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> BoundedRx<T> {
    /// Attempt to receive without blocking.
    pub fn recv(&self) -> RecvOutcome<T> {
        match self.inner.queue.pop() {
            Some(value) => RecvOutcome::Data(value),
            None => {
                if self.inner.closed.load(Ordering::Acquire) {
                    RecvOutcome::Closed
                } else {
                    RecvOutcome::Empty
                }
            }
        }
    }

    /// Poll until data arrives, the queue closes, or `timeout` elapses.
    ///
    /// Intended for result consumers and tests; the producing side never
    /// blocks.
    pub fn recv_timeout(&self, timeout: Duration) -> RecvOutcome<T> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.recv() {
                RecvOutcome::Empty => {
                    if Instant::now() >= deadline {
                        return RecvOutcome::Empty;
                    }
                    std::thread::sleep(Duration::from_micros(200));
                }
                other => return other,
            }
        }
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.inner.queue.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.inner.queue.is_empty()
    }

    /// Mark the queue as closed; senders will see `Closed` and stop.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }
}

/// Create a bounded queue with the given capacity.
pub fn bounded<T>(capacity: usize) -> (BoundedTx<T>, BoundedRx<T>) {
    let inner = Arc::new(QueueInner {
        queue: ArrayQueue::new(capacity.max(1)),
        closed: AtomicBool::new(false),
    });
    (
        BoundedTx {
            inner: inner.clone(),
        },
        BoundedRx { inner },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_recv_round_trip() {
        let (tx, rx) = bounded::<u32>(2);
        assert_eq!(tx.send(1), SendOutcome::Ok);
        assert_eq!(tx.send(2), SendOutcome::Ok);
        assert_eq!(tx.send(3), SendOutcome::Full);
        assert!(matches!(rx.recv(), RecvOutcome::Data(1)));
        assert!(matches!(rx.recv(), RecvOutcome::Data(2)));
        assert!(matches!(rx.recv(), RecvOutcome::Empty));
    }

    #[test]
    fn close_drains_then_reports_closed() {
        let (tx, rx) = bounded::<u32>(2);
        let _ = tx.send(1);
        tx.close();
        assert_eq!(tx.send(2), SendOutcome::Closed);
        assert!(matches!(rx.recv(), RecvOutcome::Data(1)));
        assert!(matches!(rx.recv(), RecvOutcome::Closed));
    }

    #[test]
    fn recv_timeout_gives_up() {
        let (_tx, rx) = bounded::<u32>(1);
        let start = Instant::now();
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(5)),
            RecvOutcome::Empty
        ));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
