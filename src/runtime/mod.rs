//! The driver-facing scheduler runtime.
//!
//! [`setup`] provisions a [`GlbRuntime`] from the environment;
//! [`GlbRuntime::compute`] runs one computation to global quiescence and
//! returns the folded result. Places are tokio tasks wired together by
//! unbounded mailboxes; the driver injects the initial bag at place 0, waits
//! on the quiescence tracker, then runs the synchronous gather pass.

mod message;
mod place;
mod worker;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::bag::{Bag, ResultAccumulator};
use crate::config::Configuration;
use crate::error::{GlbError, Result};
use crate::logger::Logger;
use message::{ActivityTracker, Cluster, Message};
use place::Place;

/// Build a runtime from `GLB_*` environment variables. Fails fast on any
/// unparseable tunable; no scheduler state is left behind.
pub fn setup() -> Result<GlbRuntime> {
    GlbRuntime::with_config(Configuration::from_env()?)
}

/// Handle to a provisioned scheduler.
pub struct GlbRuntime {
    config: Arc<Configuration>,
    last_log: Option<Logger>,
}

impl GlbRuntime {
    /// Build a runtime from an explicit configuration.
    pub fn with_config(config: Configuration) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            last_log: None,
        })
    }

    /// Read-only snapshot of the tunables in effect.
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Report of the most recent computation, if any.
    pub fn log(&self) -> Option<&Logger> {
        self.last_log.as_ref()
    }

    /// Run one computation to completion and return the folded result.
    ///
    /// `make_empty` builds the empty bags backing each place's two
    /// load-balancing queues.
    pub async fn compute<B, F>(&mut self, initial: B, make_empty: F) -> Result<B::Result>
    where
        B: Bag,
        F: Fn() -> B + Send + Sync + 'static,
    {
        let (result, log) = self.run_computation(initial, Arc::new(make_empty)).await?;
        self.last_log = Some(log);
        Ok(result)
    }

    /// Run a throwaway computation to pre-spawn the worker machinery, discard
    /// its result and return its log.
    pub async fn warmup<B, F>(&mut self, initial: B, make_empty: F) -> Result<Logger>
    where
        B: Bag,
        F: Fn() -> B + Send + Sync + 'static,
    {
        let (_, log) = self.run_computation(initial, Arc::new(make_empty)).await?;
        Ok(log)
    }

    async fn run_computation<B>(
        &self,
        initial: B,
        make_empty: Arc<dyn Fn() -> B + Send + Sync>,
    ) -> Result<(B::Result, Logger)>
    where
        B: Bag,
    {
        let config = Arc::clone(&self.config);
        let places = config.places;
        let strategy = config.lifeline_strategy.build();
        let started = Instant::now();

        // Every place starts active, plus one credit for the initial bag in
        // flight to place 0.
        let tracker = Arc::new(ActivityTracker::new(places as i64 + 1));
        let cancel = CancellationToken::new();

        let mut senders = Vec::with_capacity(places);
        let mut receivers = Vec::with_capacity(places);
        for _ in 0..places {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            receivers.push(rx);
        }
        let cluster = Cluster::new(senders);

        let mut handles = Vec::new();
        let mut place_refs = Vec::with_capacity(places);
        for (id, rx) in receivers.into_iter().enumerate() {
            let targets = strategy.lifelines(id, places);
            let place = Arc::new(Place::new(
                id,
                Arc::clone(&config),
                cluster.clone(),
                targets,
                Arc::clone(&tracker),
                make_empty(),
                make_empty(),
            ));
            handles.push(tokio::spawn(place::run(
                Arc::clone(&place),
                rx,
                cancel.clone(),
            )));
            handles.push(tokio::spawn(place::lifeline_answer_loop(
                Arc::clone(&place),
                cancel.clone(),
            )));
            if config.tuning_interval_ms > 0 {
                handles.push(tokio::spawn(place::tuner_loop(
                    Arc::clone(&place),
                    cancel.clone(),
                )));
            }
            if config.whisper_interval_ms > 0 {
                handles.push(tokio::spawn(place::whisper_loop(
                    Arc::clone(&place),
                    cancel.clone(),
                )));
            }
            place_refs.push(place);
        }
        let init = started.elapsed();
        tracing::info!(
            places,
            workers = config.workers,
            strategy = %config.lifeline_strategy,
            "scheduler provisioned"
        );

        // Inject the initial bag at place 0 and wait for global quiescence.
        let compute_started = Instant::now();
        if !cluster.send(
            0,
            Message::Deliver {
                from: 0,
                work: Some(initial),
                lifeline: false,
                epoch: 0,
            },
        ) {
            return Err(GlbError::PlaceUnreachable(0));
        }
        tracker.quiesced().await;
        let compute = compute_started.elapsed();
        tracing::info!(elapsed_ms = compute.as_millis() as u64, "quiescence reached");

        // Gather pass: every place submits its resident bags and ships its
        // partial result; fold is commutative-associative, so folding in
        // place order is as good as any.
        let gather_started = Instant::now();
        let mut root: Option<B::Result> = None;
        let mut place_logs = Vec::with_capacity(places);
        for id in 0..places {
            let (tx, rx) = oneshot::channel();
            if !cluster.send(id, Message::Gather { reply: tx }) {
                return Err(GlbError::PlaceUnreachable(id));
            }
            let (partial, log) = rx.await.map_err(|_| GlbError::PlaceUnreachable(id))?;
            match root.as_mut() {
                Some(root) => root.fold(partial),
                None => root = Some(partial),
            }
            place_logs.push(log);
        }
        let gather = gather_started.elapsed();

        cancel.cancel();
        drop(place_refs);
        drop(cluster);
        for handle in handles {
            let _ = handle.await;
        }

        let log = Logger {
            init,
            compute,
            gather,
            places: place_logs,
        };
        let result = root.ok_or_else(|| GlbError::Internal("no places in computation".into()))?;
        Ok((result, log))
    }
}
