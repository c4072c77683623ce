//! A lifeline-based global load balancer for irregular divide-and-conquer
//! computations.
//!
//! Work lives in splittable, mergeable [`Bag`]s. Each simulated host
//! ("place") runs a pool of workers that race to drain its bags, feeding two
//! load-balancing queues as they go: an intra-place queue for sibling workers
//! and an inter-place queue for remote thieves. A starving place first tries
//! a bounded number of random steals, then establishes standing lifelines on
//! a fixed topology neighborhood and goes idle; any arriving work reactivates
//! it. The computation ends exactly at global quiescence, after which a
//! gather pass folds every place's partial result into one.
//!
//! ```no_run
//! use glb_lite::problems::QueensBag;
//! use glb_lite::{Configuration, GlbRuntime};
//!
//! # async fn demo() -> glb_lite::Result<()> {
//! let config = Configuration::default().with_places(4).with_workers(2);
//! let mut runtime = GlbRuntime::with_config(config)?;
//! let result = runtime
//!     .compute(QueensBag::new(10), || QueensBag::empty(10))
//!     .await?;
//! assert_eq!(result.solutions, 724);
//! # Ok(())
//! # }
//! ```

pub mod bag;
pub mod config;
pub mod error;
pub mod logger;
pub mod problems;
pub mod runtime;
pub mod topology;

pub use bag::{Bag, ResultAccumulator};
pub use config::Configuration;
pub use error::{GlbError, Result};
pub use logger::{Logger, PlaceLog};
pub use runtime::{setup, GlbRuntime};
pub use topology::{LifelineStrategy, LifelineStrategyKind};
