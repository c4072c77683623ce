//! Inter-place messaging and global quiescence tracking.
//!
//! Places never share memory; every cross-place interaction is a one-way
//! message delivered to the target's mailbox. This module is the in-process
//! rendition of the distributed transport: a [`Cluster`] of unbounded senders,
//! one per place.

use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::{mpsc, oneshot, Notify};

use crate::bag::Bag;
use crate::logger::PlaceLog;

/// One-way messages between places (plus the driver's gather request).
pub(crate) enum Message<B: Bag> {
    /// A starving place asks a uniformly-chosen victim for work. Always
    /// answered with a [`Message::Deliver`], work-carrying or not.
    RandomSteal { thief: usize, epoch: u64 },
    /// A starving place establishes a standing request; answered only when the
    /// victim later has exportable work.
    Lifeline { thief: usize },
    /// Work (or a "no work" refusal) arriving from another place. `epoch`
    /// echoes the thief's steal-phase epoch for random-steal replies so stale
    /// refusals can be told apart from the one currently awaited.
    Deliver {
        from: usize,
        work: Option<B>,
        lifeline: bool,
        epoch: u64,
    },
    /// A worker claimed an idle slot for a split fragment; the place task
    /// starts the worker. The slot is already accounted for.
    NewWorker { slot: usize, bag: B },
    /// The last active worker retired with both queues empty.
    WorkersDrained,
    /// Gossiped auxiliary bound from another place.
    Whisper { hint: Vec<u8> },
    /// Driver request: submit resident bags and ship the partial result and
    /// counter snapshot back.
    Gather {
        reply: oneshot::Sender<(<B as Bag>::Result, PlaceLog)>,
    },
}

/// Mailbox handles for every place in the computation.
pub(crate) struct Cluster<B: Bag> {
    senders: Vec<mpsc::UnboundedSender<Message<B>>>,
}

impl<B: Bag> Clone for Cluster<B> {
    fn clone(&self) -> Self {
        Self {
            senders: self.senders.clone(),
        }
    }
}

impl<B: Bag> Cluster<B> {
    pub fn new(senders: Vec<mpsc::UnboundedSender<Message<B>>>) -> Self {
        Self { senders }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn sender(&self, place: usize) -> mpsc::UnboundedSender<Message<B>> {
        self.senders[place].clone()
    }

    /// Deliver a message; returns false if the target mailbox is closed.
    /// Mailboxes only close during shutdown, after the computation quiesced.
    pub fn send(&self, to: usize, msg: Message<B>) -> bool {
        if self.senders[to].send(msg).is_err() {
            tracing::warn!(place = to, "mailbox closed, message dropped");
            return false;
        }
        true
    }
}

/// Credit-counting quiescence detector, standing in for the structured
/// async-barrier of the original transport.
///
/// The counter holds `#active places + #work-carrying deliveries in flight`.
/// A place counts as active from startup until it enters IDLE and between any
/// reactivation and the next IDLE. Senders increment while the outgoing bag
/// still sits under the place lock and the receiver decrements after
/// installing it (incrementing its own activity first), so the counter never
/// transiently reads zero while work exists anywhere. Zero therefore means global quiescence: every place idle,
/// every lifeline established and unanswered, nothing in flight.
pub(crate) struct ActivityTracker {
    active: AtomicI64,
    done: Notify,
}

impl ActivityTracker {
    pub fn new(initial: i64) -> Self {
        Self {
            active: AtomicI64::new(initial),
            done: Notify::new(),
        }
    }

    pub fn inc(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    pub fn dec(&self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.done.notify_waiters();
        }
    }

    /// Resolves once the counter reaches zero.
    pub async fn quiesced(&self) {
        loop {
            let notified = self.done.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn tracker_resolves_at_zero() {
        let tracker = Arc::new(ActivityTracker::new(2));
        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.quiesced().await })
        };
        tracker.dec();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        tracker.dec();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("tracker did not quiesce")
            .expect("waiter panicked");
    }

    #[tokio::test]
    async fn tracker_survives_inc_after_dec() {
        let tracker = Arc::new(ActivityTracker::new(1));
        tracker.inc();
        tracker.dec();
        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.quiesced().await })
        };
        tracker.dec();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("tracker did not quiesce")
            .expect("waiter panicked");
    }

    #[tokio::test]
    async fn quiesced_returns_immediately_at_zero() {
        let tracker = ActivityTracker::new(0);
        tokio::time::timeout(Duration::from_millis(100), tracker.quiesced())
            .await
            .expect("should resolve without any notification");
    }
}
