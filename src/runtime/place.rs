//! Per-place scheduler: worker pool, load-balancing queues, and the
//! random-then-lifeline steal state machine.
//!
//! One [`Place`] exists per simulated host. All mutable scheduling state lives
//! in [`PlaceCore`] behind a single host-local lock; other places interact
//! with it exclusively through messages handled by [`run`]. The cached
//! emptiness flags on the two queues are conservative: they are stored `true`
//! only while holding the lock after observing true emptiness, so a lock-free
//! `false` read can be stale but a `true` read never hides work.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use tokio::sync::{mpsc, oneshot, Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;

use crate::bag::{Bag, ResultAccumulator};
use crate::config::Configuration;
use crate::logger::{PlaceLog, PlaceLogger};
use crate::runtime::message::{ActivityTracker, Cluster, Message};
use crate::runtime::worker;

/// Host steal state. Driven solely by local queue emptiness and incoming
/// messages; no place ever reads another place's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostState {
    Running,
    StealingRandom,
    StealingLifeline,
    Idle,
}

/// Everything guarded by the single host-local lock.
pub(crate) struct PlaceCore<B: Bag> {
    pub state: HostState,
    /// Redistributes work between workers on this place.
    pub intra: B,
    /// Holds work destined for remote thieves.
    pub inter: B,
    /// Idle worker slots. `active_workers + idle_slots.len() == workers`
    /// at every locked section boundary.
    pub idle_slots: Vec<usize>,
    pub active_workers: usize,
    /// Remote places with a standing lifeline on us, in arrival order.
    pub lifeline_thieves: VecDeque<usize>,
    /// Established flags, indexed like `Place::lifeline_targets`.
    pub lifelines: Vec<bool>,
    /// Bumped at the start of every steal phase; stale "no work" replies
    /// carry an older epoch and are dropped.
    pub steal_epoch: u64,
    pub random_attempts: usize,
    /// Victims already tried this phase (attempts must be distinct).
    pub attempted_victims: Vec<usize>,
    pub idle_since: Option<Instant>,
}

pub(crate) struct Place<B: Bag> {
    pub id: usize,
    pub config: Arc<Configuration>,
    pub cluster: Cluster<B>,
    pub core: Mutex<PlaceCore<B>>,
    /// Place-wide accumulator all workers may read during `process`.
    pub shared_result: RwLock<B::Result>,
    pub intra_empty: AtomicBool,
    pub inter_empty: AtomicBool,
    /// Per-slot "refeed the inter queue" flags.
    pub feed_inter: Vec<AtomicBool>,
    /// Lock-free mirror of `lifeline_thieves.len()` for the worker loop.
    pub thieves_waiting: AtomicUsize,
    /// Effective chunk size; the tuner adjusts it at runtime.
    pub chunk_size: AtomicUsize,
    pub lifeline_targets: Vec<usize>,
    pub lifeline_wake: Notify,
    pub tracker: Arc<ActivityTracker>,
    pub logger: PlaceLogger,
    pub self_tx: mpsc::UnboundedSender<Message<B>>,
}

impl<B: Bag> Place<B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        config: Arc<Configuration>,
        cluster: Cluster<B>,
        lifeline_targets: Vec<usize>,
        tracker: Arc<ActivityTracker>,
        empty_intra: B,
        empty_inter: B,
    ) -> Self {
        let workers = config.workers;
        let self_tx = cluster.sender(id);
        Self {
            id,
            cluster,
            core: Mutex::new(PlaceCore {
                state: HostState::Running,
                intra: empty_intra,
                inter: empty_inter,
                idle_slots: (0..workers).collect(),
                active_workers: 0,
                lifeline_thieves: VecDeque::new(),
                lifelines: vec![false; lifeline_targets.len()],
                steal_epoch: 0,
                random_attempts: 0,
                attempted_victims: Vec::new(),
                idle_since: None,
            }),
            shared_result: RwLock::new(B::Result::default()),
            intra_empty: AtomicBool::new(true),
            inter_empty: AtomicBool::new(true),
            // Start raised so the first workers seed the inter queue early.
            feed_inter: (0..workers).map(|_| AtomicBool::new(true)).collect(),
            thieves_waiting: AtomicUsize::new(0),
            chunk_size: AtomicUsize::new(config.work_unit_size),
            lifeline_targets,
            lifeline_wake: Notify::new(),
            tracker,
            logger: PlaceLogger::default(),
            self_tx,
            config,
        }
    }

    fn lifeline_pos(&self, target: usize) -> Option<usize> {
        self.lifeline_targets.iter().position(|&t| t == target)
    }

    /// Raise the refeed flags on every worker slot. Called with the core lock
    /// held, right after the inter queue was observed (or made) empty.
    pub(crate) fn raise_feed_flags(&self) {
        for flag in &self.feed_inter {
            flag.store(true, Ordering::Release);
        }
    }

    #[cfg(debug_assertions)]
    fn check_flags(&self, core: &PlaceCore<B>) {
        debug_assert!(!self.intra_empty.load(Ordering::Acquire) || core.intra.is_empty());
        debug_assert!(!self.inter_empty.load(Ordering::Acquire) || core.inter.is_empty());
    }

    #[cfg(not(debug_assertions))]
    fn check_flags(&self, _core: &PlaceCore<B>) {}
}

/// Main event loop of one place. Starts in the steal phase (a fresh place has
/// no work) and then reacts to messages until shutdown.
pub(crate) async fn run<B: Bag>(
    place: Arc<Place<B>>,
    mut rx: mpsc::UnboundedReceiver<Message<B>>,
    cancel: CancellationToken,
) {
    begin_steal_phase(&place).await;
    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(msg) => handle(&place, msg).await,
                None => break,
            },
            _ = cancel.cancelled() => break,
        }
    }
    tracing::debug!(place = place.id, "place task stopped");
}

async fn handle<B: Bag>(place: &Arc<Place<B>>, msg: Message<B>) {
    match msg {
        Message::RandomSteal { thief, epoch } => on_random_steal(place, thief, epoch).await,
        Message::Lifeline { thief } => on_lifeline_request(place, thief).await,
        Message::Deliver {
            from,
            work,
            lifeline,
            epoch,
        } => on_deliver(place, from, work, lifeline, epoch).await,
        Message::NewWorker { slot, bag } => {
            tokio::spawn(worker::run(Arc::clone(place), slot, bag));
        }
        Message::WorkersDrained => on_workers_drained(place).await,
        Message::Whisper { hint } => {
            place
                .logger
                .whispers_received
                .fetch_add(1, Ordering::Relaxed);
            place.shared_result.read().await.absorb_hint(&hint);
        }
        Message::Gather { reply } => on_gather(place, reply).await,
    }
}

/// Answer a random-steal request immediately: surplus from the inter queue if
/// there is any, an empty-handed refusal otherwise.
async fn on_random_steal<B: Bag>(place: &Arc<Place<B>>, thief: usize, epoch: u64) {
    place
        .logger
        .random_steals_received
        .fetch_add(1, Ordering::Relaxed);
    let work = {
        let mut core = place.core.lock().await;
        if core.inter.is_empty() {
            place.inter_empty.store(true, Ordering::Release);
            place.raise_feed_flags();
            place.check_flags(&core);
            None
        } else {
            let taken = core.inter.split(true);
            // Credit the in-flight work while it leaves the queue, before
            // anything can observe this place as drained.
            place.tracker.inc();
            place
                .logger
                .inter_queue_splits
                .fetch_add(1, Ordering::Relaxed);
            if core.inter.is_empty() {
                place.inter_empty.store(true, Ordering::Release);
                place.raise_feed_flags();
            }
            place.check_flags(&core);
            Some(taken)
        }
    };
    if work.is_some() {
        place
            .logger
            .random_steals_answered
            .fetch_add(1, Ordering::Relaxed);
        deliver(place, thief, work, false, epoch, true);
    } else {
        deliver(place, thief, None, false, epoch, false);
    }
}

/// Record a standing lifeline request. Answered later by the lifeline-answer
/// loop, as soon as exportable work exists.
async fn on_lifeline_request<B: Bag>(place: &Arc<Place<B>>, thief: usize) {
    place
        .logger
        .lifeline_requests_received
        .fetch_add(1, Ordering::Relaxed);
    let has_work = {
        let mut core = place.core.lock().await;
        if !core.lifeline_thieves.contains(&thief) {
            core.lifeline_thieves.push_back(thief);
            place
                .thieves_waiting
                .store(core.lifeline_thieves.len(), Ordering::Release);
        }
        let has_work = !core.inter.is_empty();
        if !has_work {
            place.inter_empty.store(true, Ordering::Release);
            place.raise_feed_flags();
        }
        place.check_flags(&core);
        has_work
    };
    if has_work {
        place.lifeline_wake.notify_one();
    }
}

/// Install arriving work, or advance the steal state machine on a refusal.
async fn on_deliver<B: Bag>(
    place: &Arc<Place<B>>,
    from: usize,
    work: Option<B>,
    lifeline: bool,
    epoch: u64,
) {
    match work {
        Some(bag) => {
            {
                let mut core = place.core.lock().await;
                if lifeline {
                    if let Some(pos) = place.lifeline_pos(from) {
                        // Re-establish before the next starvation.
                        core.lifelines[pos] = false;
                    }
                    place
                        .logger
                        .lifeline_steal_successes
                        .fetch_add(1, Ordering::Relaxed);
                } else if core.state == HostState::StealingRandom && epoch == core.steal_epoch {
                    place
                        .logger
                        .random_steal_successes
                        .fetch_add(1, Ordering::Relaxed);
                }
                if core.state == HostState::Idle {
                    place.tracker.inc();
                    if let Some(since) = core.idle_since.take() {
                        place.logger.add_idle(since.elapsed());
                    }
                }
                if core.state != HostState::Running {
                    tracing::trace!(place = place.id, from, lifeline, "reactivated by delivery");
                }
                core.state = HostState::Running;
                install_work(place, &mut core, bag);
                place.check_flags(&core);
            }
            // The in-flight credit, after our own activity was counted.
            place.tracker.dec();
        }
        None => {
            let mut core = place.core.lock().await;
            if core.state == HostState::StealingRandom && epoch == core.steal_epoch {
                advance_steal_phase(place, &mut core);
            }
            // Stale refusals can only arrive after this place already moved
            // on; dropping them is harmless.
        }
    }
}

/// Hand a bag to a fresh worker, or park it on the intra queue when the pool
/// is saturated.
fn install_work<B: Bag>(place: &Arc<Place<B>>, core: &mut PlaceCore<B>, bag: B) {
    if let Some(slot) = core.idle_slots.pop() {
        core.active_workers += 1;
        place.logger.workers_spawned.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(worker::run(Arc::clone(place), slot, bag));
    } else {
        core.intra.merge(bag);
        place.intra_empty.store(false, Ordering::Release);
        place
            .logger
            .intra_queue_feeds
            .fetch_add(1, Ordering::Relaxed);
    }
}

/// The last worker retired. Re-check under the lock (a delivery may have
/// raced the notice) and start stealing if the place is truly dry.
async fn on_workers_drained<B: Bag>(place: &Arc<Place<B>>) {
    let mut core = place.core.lock().await;
    if core.state != HostState::Running || core.active_workers > 0 {
        return;
    }
    if !core.intra.is_empty() || !core.inter.is_empty() {
        // A delivery was parked on a queue between the drain and this notice;
        // restart a worker on it instead of stealing.
        let take_all = true;
        let bag = if core.intra.is_empty() {
            core.inter.split(take_all)
        } else {
            core.intra.split(take_all)
        };
        if core.intra.is_empty() {
            place.intra_empty.store(true, Ordering::Release);
        }
        if core.inter.is_empty() {
            place.inter_empty.store(true, Ordering::Release);
        }
        install_work(place, &mut core, bag);
        place.check_flags(&core);
        return;
    }
    place.intra_empty.store(true, Ordering::Release);
    place.inter_empty.store(true, Ordering::Release);
    place.check_flags(&core);
    start_steal_phase(place, &mut core);
}

async fn begin_steal_phase<B: Bag>(place: &Arc<Place<B>>) {
    let mut core = place.core.lock().await;
    start_steal_phase(place, &mut core);
}

fn start_steal_phase<B: Bag>(place: &Arc<Place<B>>, core: &mut PlaceCore<B>) {
    core.steal_epoch += 1;
    core.random_attempts = 0;
    core.attempted_victims.clear();
    core.state = HostState::StealingRandom;
    advance_steal_phase(place, core);
}

/// Send the next random-steal request, or fall through to the lifeline phase
/// once the attempt budget (or the pool of distinct victims) is exhausted.
fn advance_steal_phase<B: Bag>(place: &Arc<Place<B>>, core: &mut PlaceCore<B>) {
    let places = place.cluster.len();
    if core.random_attempts < place.config.max_random_steals && places > 1 {
        let candidates: Vec<usize> = (0..places)
            .filter(|&p| p != place.id && !core.attempted_victims.contains(&p))
            .collect();
        let victim = {
            let mut rng = rand::thread_rng();
            candidates.choose(&mut rng).copied()
        };
        if let Some(victim) = victim {
            core.attempted_victims.push(victim);
            core.random_attempts += 1;
            place
                .logger
                .random_steal_attempts
                .fetch_add(1, Ordering::Relaxed);
            place.cluster.send(
                victim,
                Message::RandomSteal {
                    thief: place.id,
                    epoch: core.steal_epoch,
                },
            );
            return;
        }
    }
    enter_lifeline_phase(place, core);
}

/// Establish every lifeline not already standing, then go idle. Delivery of
/// lifeline work reactivates the place asynchronously.
fn enter_lifeline_phase<B: Bag>(place: &Arc<Place<B>>, core: &mut PlaceCore<B>) {
    core.state = HostState::StealingLifeline;
    for (pos, &target) in place.lifeline_targets.iter().enumerate() {
        if !core.lifelines[pos] {
            core.lifelines[pos] = true;
            place
                .logger
                .lifelines_established
                .fetch_add(1, Ordering::Relaxed);
            place
                .cluster
                .send(target, Message::Lifeline { thief: place.id });
        }
    }
    core.state = HostState::Idle;
    core.idle_since = Some(Instant::now());
    tracing::debug!(place = place.id, "lifelines established, going idle");
    place.tracker.dec();
}

/// Submit every resident bag into the place accumulator and ship it, with the
/// counter snapshot, back to the driver.
async fn on_gather<B: Bag>(
    place: &Arc<Place<B>>,
    reply: oneshot::Sender<(<B as Bag>::Result, PlaceLog)>,
) {
    let mut core = place.core.lock().await;
    let mut result = std::mem::take(&mut *place.shared_result.write().await);
    core.intra.submit(&mut result);
    core.inter.submit(&mut result);
    let log = place.logger.snapshot(place.id);
    if reply.send((result, log)).is_err() {
        tracing::warn!(place = place.id, "gather reply dropped");
    }
}

/// Background task: sleeps until woken, then ships inter-queue fragments to
/// queued lifeline thieves until either runs out.
pub(crate) async fn lifeline_answer_loop<B: Bag>(place: Arc<Place<B>>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = place.lifeline_wake.notified() => {}
            _ = cancel.cancelled() => {
                tracing::debug!(place = place.id, "lifeline answerer stopped");
                return;
            }
        }
        loop {
            let shipped = {
                let mut core = place.core.lock().await;
                if core.inter.is_empty() {
                    place.inter_empty.store(true, Ordering::Release);
                    if !core.lifeline_thieves.is_empty() {
                        // Thieves still wait: have the workers replenish.
                        place.raise_feed_flags();
                    }
                    place.check_flags(&core);
                    None
                } else if let Some(thief) = core.lifeline_thieves.pop_front() {
                    place
                        .thieves_waiting
                        .store(core.lifeline_thieves.len(), Ordering::Release);
                    let work = core.inter.split(true);
                    // This loop runs off the place task, so the credit must be
                    // taken while the lock still pins the place as non-dry;
                    // deferring it to the send would open a window where the
                    // counter reads zero with this bag in hand.
                    place.tracker.inc();
                    place
                        .logger
                        .inter_queue_splits
                        .fetch_add(1, Ordering::Relaxed);
                    if core.inter.is_empty() {
                        place.inter_empty.store(true, Ordering::Release);
                        place.raise_feed_flags();
                    }
                    place.check_flags(&core);
                    Some((thief, work))
                } else {
                    None
                }
            };
            match shipped {
                Some((thief, work)) => {
                    place.logger.lifeline_answers.fetch_add(1, Ordering::Relaxed);
                    deliver(&place, thief, Some(work), true, 0, true);
                }
                None => break,
            }
        }
    }
}

/// Send work (or a refusal) to another place. Work-carrying deliveries hold a
/// quiescence credit from the moment the bag left its queue (`credited`) until
/// the receiver installs it; a failed send returns the credit immediately.
fn deliver<B: Bag>(
    place: &Arc<Place<B>>,
    to: usize,
    work: Option<B>,
    lifeline: bool,
    epoch: u64,
    credited: bool,
) {
    let carries_work = work.is_some();
    if carries_work && !credited {
        place.tracker.inc();
    }
    let sent = place.cluster.send(
        to,
        Message::Deliver {
            from: place.id,
            work,
            lifeline,
            epoch,
        },
    );
    if !sent && carries_work {
        place.tracker.dec();
    }
}

/// Optional adaptive chunk-size tuner: shrink the chunk while thieves are
/// knocking so workers re-check their obligations sooner, grow it back toward
/// the configured size in quiet intervals.
pub(crate) async fn tuner_loop<B: Bag>(place: Arc<Place<B>>, cancel: CancellationToken) {
    let interval = Duration::from_millis(place.config.tuning_interval_ms);
    let base = place.config.work_unit_size;
    let floor = (base / 16).max(1);
    let mut seen_requests = 0u64;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => return,
        }
        let requests = place
            .logger
            .random_steals_received
            .load(Ordering::Relaxed)
            + place
                .logger
                .lifeline_requests_received
                .load(Ordering::Relaxed);
        let current = place.chunk_size.load(Ordering::Relaxed);
        let next = if requests > seen_requests {
            (current / 2).max(floor)
        } else {
            (current * 2).min(base)
        };
        seen_requests = requests;
        if next != current {
            place.chunk_size.store(next, Ordering::Relaxed);
            place
                .logger
                .tuning_adjustments
                .fetch_add(1, Ordering::Relaxed);
            tracing::trace!(place = place.id, chunk = next, "tuned chunk size");
        }
    }
}

/// Optional gossip task: periodically whispers the shared accumulator's
/// auxiliary hint to one uniformly-chosen other place.
pub(crate) async fn whisper_loop<B: Bag>(place: Arc<Place<B>>, cancel: CancellationToken) {
    let interval = Duration::from_millis(place.config.whisper_interval_ms);
    let places = place.cluster.len();
    if places < 2 {
        return;
    }
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => return,
        }
        let hint = place.shared_result.read().await.hint();
        if let Some(hint) = hint {
            let target = {
                let mut rng = rand::thread_rng();
                let candidates: Vec<usize> = (0..places).filter(|&p| p != place.id).collect();
                candidates.choose(&mut rng).copied()
            };
            if let Some(target) = target {
                place.logger.whispers_sent.fetch_add(1, Ordering::Relaxed);
                place.cluster.send(target, Message::Whisper { hint });
            }
        }
    }
}
