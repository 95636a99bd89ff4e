//! The neuron's bounded input mailbox.
//!
//! A bounded multiple-producer / single-consumer queue with a drop-oldest
//! overflow policy: when full, the oldest pending signal is evicted to make
//! room for the new one, and a counter is incremented — never an error
//! surfaced to the caller. `tokio::sync::mpsc` has no
//! drop-oldest mode, so this is a small ring buffer guarded by
//! `parking_lot::Mutex` with a `tokio::sync::Notify` to wake the single
//! consumer, following the same "short critical section, no blocking
//! producers" shape as the STDP schedule's atomic cell.

use crate::diagnostics::Diagnostics;
use crate::signal::NeuralSignal;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

/// A bounded, multi-producer single-consumer mailbox with drop-oldest
/// overflow.
pub struct Mailbox {
    queue: Mutex<VecDeque<NeuralSignal>>,
    capacity: usize,
    notify: Notify,
    diagnostics: Arc<Diagnostics>,
}

impl Mailbox {
    /// Construct a mailbox with the given bounded capacity.
    pub fn new(capacity: usize, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            diagnostics,
        }
    }

    /// Enqueue a signal. Non-blocking; safe to call from any task. If the
    /// mailbox is full, the oldest pending signal is dropped and the
    /// backpressure counter is incremented.
    pub fn send(&self, signal: NeuralSignal) {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
            self.diagnostics.record_mailbox_overflow();
        }
        queue.push_back(signal);
        drop(queue);
        self.notify.notify_one();
    }

    /// Await the next signal in arrival order.
    pub async fn recv(&self) -> NeuralSignal {
        loop {
            if let Some(signal) = self.queue.lock().pop_front() {
                return signal;
            }
            self.notify.notified().await;
        }
    }

    /// Drain all currently-queued signals without waiting, for the bounded
    /// grace period on `stop()`.
    pub fn drain(&self) -> Vec<NeuralSignal> {
        self.queue.lock().drain(..).collect()
    }

    /// Current number of queued signals.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the mailbox currently holds no signals.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NeuronId;
    use crate::time::Instant;

    fn sig(v: f64) -> NeuralSignal {
        NeuralSignal::new(v, Instant::ZERO, NeuronId::new(1), NeuronId::new(2))
    }

    #[tokio::test]
    async fn drop_oldest_on_overflow() {
        let diag = Arc::new(Diagnostics::new());
        let mb = Mailbox::new(2, diag.clone());
        mb.send(sig(1.0));
        mb.send(sig(2.0));
        mb.send(sig(3.0)); // drops 1.0
        assert_eq!(diag.snapshot().mailbox_overflows, 1);
        assert_eq!(mb.recv().await.value, 2.0);
        assert_eq!(mb.recv().await.value, 3.0);
    }

    #[tokio::test]
    async fn recv_preserves_arrival_order() {
        let diag = Arc::new(Diagnostics::new());
        let mb = Mailbox::new(8, diag);
        mb.send(sig(1.0));
        mb.send(sig(2.0));
        assert_eq!(mb.recv().await.value, 1.0);
        assert_eq!(mb.recv().await.value, 2.0);
    }
}
