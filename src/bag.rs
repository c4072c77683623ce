//! The work-unit contract every distributable computation implements.
//!
//! A [`Bag`] is a self-contained, splittable bundle of unexplored search-tree
//! state. The scheduler is written entirely against this trait: it never
//! inspects a bag's contents, it only tests emptiness and splittability,
//! processes bounded chunks, and moves fragments between workers, queues and
//! places via `split`/`merge`.
//!
//! # Contract
//!
//! Implementations must uphold:
//! - emptiness is monotonic under `process`: a drained bag stays empty until
//!   something is merged into it, and `is_splittable()` is `false` whenever
//!   `is_empty()` is `true`;
//! - `split` on a splittable bag yields two non-empty bags whose union of
//!   unexplored tree nodes equals the original;
//! - `merge` is commutative and associative with respect to the set of tree
//!   nodes still to visit.
//!
//! Violations are not defensively checked; they manifest as livelock or wrong
//! results and are client defects.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A splittable, mergeable fragment of pending exploration state.
///
/// Bags travel between places, so they must serialize. Within a place exactly
/// one worker or queue owns a bag at any time.
pub trait Bag: Sized + Send + Serialize + DeserializeOwned + 'static {
    /// The result accumulator paired with this bag type.
    type Result: ResultAccumulator;

    /// True when no reachable unexplored tree node remains.
    fn is_empty(&self) -> bool;

    /// True when a non-trivial fragment can be removed without fully draining
    /// the bag. Must be `false` whenever `is_empty()` is `true`.
    fn is_splittable(&self) -> bool;

    /// Perform up to `amount` elementary exploration steps, or fewer if the
    /// bag drains first. `shared` is the place-wide accumulator all workers on
    /// the place may read concurrently; any synchronization it needs belongs
    /// to the implementation, not the scheduler.
    fn process(&mut self, amount: usize, shared: &Self::Result);

    /// Remove and return roughly half of the remaining work, halving the
    /// unexplored sibling branches at every level of the exploration stack
    /// (alternating between floor and ceiling halves to avoid systemic bias).
    ///
    /// If the bag is not splittable: with `take_all` the *entire* remaining
    /// content is returned, leaving `self` empty; without it an empty bag is
    /// returned.
    fn split(&mut self, take_all: bool) -> Self;

    /// Absorb another bag's remaining work as a todo-reserve. The two
    /// fragments are tree-disjoint in the typical case; no attempt is made to
    /// interleave their exploration order.
    fn merge(&mut self, other: Self);

    /// Add this bag's locally accumulated contribution to `result`. Called
    /// once per bag, during the gather phase, after `is_empty()` is true.
    fn submit(&mut self, result: &mut Self::Result);
}

/// A foldable partial result, one instance per place during a computation.
///
/// `fold` must be commutative and associative so the final value is
/// independent of how work was split, migrated, and gathered.
pub trait ResultAccumulator:
    Send + Sync + Default + Serialize + DeserializeOwned + 'static
{
    /// Fold another partial result into this one.
    fn fold(&mut self, other: Self);

    /// Optional whisper payload: an opaque auxiliary bound to gossip to other
    /// places (e.g. a branch-and-bound incumbent). `None` disables gossip for
    /// this accumulator.
    fn hint(&self) -> Option<Vec<u8>> {
        None
    }

    /// Absorb a whispered hint from another place. Takes `&self` because
    /// workers hold shared references during `process`; implementations use
    /// interior synchronization (typically atomics).
    fn absorb_hint(&self, _hint: &[u8]) {}
}
