//! The per-slot worker loop.
//!
//! A worker owns exactly one bag. Between bounded processing chunks it honors
//! its scheduling obligations in a fixed order: fan work out to idle slots,
//! keep the intra queue fed, refeed the inter queue when flagged, wake the
//! lifeline answerer, and yield so message handlers get the thread. When its
//! bag drains it refills from the intra queue, then the inter queue, and
//! retires its slot only when the whole place is dry.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::bag::Bag;
use crate::runtime::message::Message;
use crate::runtime::place::Place;

pub(crate) async fn run<B: Bag>(place: Arc<Place<B>>, slot: usize, mut bag: B) {
    tracing::trace!(place = place.id, slot, "worker started");
    loop {
        // Fan out: claim an idle slot for half of a splittable bag. The slot
        // and the active count are reserved here; the place task starts the
        // worker so this loop stays non-recursive.
        if bag.is_splittable() {
            let claimed = {
                let mut core = place.core.lock().await;
                let slot = core.idle_slots.pop();
                if slot.is_some() {
                    core.active_workers += 1;
                }
                slot
            };
            if let Some(new_slot) = claimed {
                let fragment = bag.split(false);
                place.logger.workers_spawned.fetch_add(1, Ordering::Relaxed);
                if place
                    .self_tx
                    .send(Message::NewWorker {
                        slot: new_slot,
                        bag: fragment,
                    })
                    .is_err()
                {
                    tracing::warn!(place = place.id, "fan-out dropped, mailbox closed");
                }
            }
        }

        // Keep the intra queue stocked for siblings that drain.
        if place.intra_empty.load(Ordering::Acquire) && bag.is_splittable() {
            let mut core = place.core.lock().await;
            core.intra.merge(bag.split(false));
            place.intra_empty.store(false, Ordering::Release);
            place
                .logger
                .intra_queue_feeds
                .fetch_add(1, Ordering::Relaxed);
        }

        // Refeed the inter queue when flagged (the flag is raised whenever the
        // queue was observed empty).
        if place.feed_inter[slot].load(Ordering::Acquire) && bag.is_splittable() {
            let mut core = place.core.lock().await;
            core.inter.merge(bag.split(false));
            place.feed_inter[slot].store(false, Ordering::Release);
            place.inter_empty.store(false, Ordering::Release);
            place
                .logger
                .inter_queue_feeds
                .fetch_add(1, Ordering::Relaxed);
        }

        // Waiting thieves plus exportable work: wake the answerer.
        if place.thieves_waiting.load(Ordering::Acquire) > 0
            && !place.inter_empty.load(Ordering::Acquire)
        {
            place.lifeline_wake.notify_one();
        }

        // Give message handlers and the answerer a turn.
        tokio::task::yield_now().await;

        // Process one bounded chunk against the place-wide accumulator.
        let amount = place.chunk_size.load(Ordering::Relaxed);
        let started = Instant::now();
        {
            let shared = place.shared_result.read().await;
            bag.process(amount, &shared);
        }
        place.logger.add_busy(started.elapsed());
        place.logger.chunks_processed.fetch_add(1, Ordering::Relaxed);

        if !bag.is_empty() {
            continue;
        }

        // Drained: refill from the queues or retire the slot.
        let mut core = place.core.lock().await;
        if !core.intra.is_empty() {
            bag.merge(core.intra.split(true));
            place
                .logger
                .intra_queue_splits
                .fetch_add(1, Ordering::Relaxed);
            if core.intra.is_empty() {
                place.intra_empty.store(true, Ordering::Release);
            }
            continue;
        }
        place.intra_empty.store(true, Ordering::Release);
        if !core.inter.is_empty() {
            bag.merge(core.inter.split(true));
            place
                .logger
                .inter_queue_splits
                .fetch_add(1, Ordering::Relaxed);
            if core.inter.is_empty() {
                place.inter_empty.store(true, Ordering::Release);
                place.raise_feed_flags();
            }
            // Re-seed local balancing with half of what was taken.
            if bag.is_splittable() {
                core.intra.merge(bag.split(false));
                place.intra_empty.store(false, Ordering::Release);
                place
                    .logger
                    .intra_queue_feeds
                    .fetch_add(1, Ordering::Relaxed);
            }
            continue;
        }
        place.inter_empty.store(true, Ordering::Release);

        // Drained bags still carry their locally accumulated contribution;
        // keep it resident on the intra queue until the gather pass.
        core.intra.merge(bag);
        core.idle_slots.push(slot);
        core.active_workers -= 1;
        let last = core.active_workers == 0;
        drop(core);
        if last && place.self_tx.send(Message::WorkersDrained).is_err() {
            tracing::warn!(place = place.id, "drain notice dropped, mailbox closed");
        }
        tracing::trace!(place = place.id, slot, last, "worker retired");
        return;
    }
}
