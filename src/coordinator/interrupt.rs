//! Coordinator lifecycle and cancellation
//!
//! ```text
//! Idle --interrupt(true)--> Interrupted
//! Idle --publish--> Publishing --done--> Idle
//! ```
//!
//! The lifecycle lives behind a shared handle so another task can interrupt
//! while `process_pending_txs` holds the coordinator mutably. Builder and
//! aggregator calls are raced against a cancellation token; the publisher
//! call is never cancelled.

use crate::{Aggregator, BatchBuilder, error::CoordinatorError};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Lifecycle {
    Idle,
    Interrupted,
    Publishing,
}

/// Cloneable handle for interrupting a coordinator from anywhere
#[derive(Clone)]
pub struct InterruptHandle {
    lifecycle: Arc<Mutex<Lifecycle>>,
    token: CancellationToken,
    builder: Arc<dyn BatchBuilder>,
    aggregator: Arc<dyn Aggregator>,
}

impl InterruptHandle {
    pub(crate) fn new(builder: Arc<dyn BatchBuilder>, aggregator: Arc<dyn Aggregator>) -> Self {
        Self {
            lifecycle: Arc::new(Mutex::new(Lifecycle::Idle)),
            token: CancellationToken::new(),
            builder,
            aggregator,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lock()
    }

    /// Interrupt the coordinator.
    ///
    /// With `should_throw = false` this never fails and changes nothing.
    /// Otherwise it fails while publishing or when already interrupted, and
    /// from `Idle` cancels the builder and aggregator.
    pub fn interrupt(&self, should_throw: bool) -> Result<(), CoordinatorError> {
        if !should_throw {
            return Ok(());
        }
        {
            let mut lifecycle = self.lock();
            match *lifecycle {
                Lifecycle::Publishing => return Err(CoordinatorError::AlreadyPublishing),
                Lifecycle::Interrupted => return Err(CoordinatorError::AlreadyInterrupted),
                Lifecycle::Idle => *lifecycle = Lifecycle::Interrupted,
            }
        }
        info!("Coordinator interrupted");
        self.token.cancel();
        self.builder.interrupt();
        self.aggregator.interrupt();
        Ok(())
    }

    pub(crate) fn ensure_running(&self) -> Result<(), CoordinatorError> {
        match self.lifecycle() {
            Lifecycle::Interrupted => Err(CoordinatorError::Interrupted),
            Lifecycle::Idle | Lifecycle::Publishing => Ok(()),
        }
    }

    /// Await a collaborator call unless the coordinator is interrupted first
    pub(crate) async fn run<T, F>(&self, call: F) -> Result<T, CoordinatorError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CoordinatorError::Interrupted),
            result = call => result.map_err(CoordinatorError::Collaborator),
        }
    }

    pub(crate) fn begin_publishing(&self) -> Result<(), CoordinatorError> {
        let mut lifecycle = self.lock();
        match *lifecycle {
            Lifecycle::Idle => {
                *lifecycle = Lifecycle::Publishing;
                Ok(())
            }
            Lifecycle::Interrupted => Err(CoordinatorError::Interrupted),
            Lifecycle::Publishing => Err(CoordinatorError::AlreadyPublishing),
        }
    }

    pub(crate) fn finish_publishing(&self) {
        let mut lifecycle = self.lock();
        if *lifecycle == Lifecycle::Publishing {
            *lifecycle = Lifecycle::Idle;
        }
    }
}
