//! Demo collaborators exercising the scheduler.
//!
//! These implement the [`crate::bag::Bag`] contract but are not part of the
//! core: the scheduler never depends on them outside the binary and the test
//! suite.

pub mod queens;
pub mod tree;

pub use queens::{QueensBag, QueensResult};
pub use tree::{TreeBag, TreeResult};
