//! Shutdown coordination.
//!
//! [`ShutdownCoordinator`] owns the `Running → Draining → Closed` state
//! machine. The first termination signal starts draining: the server stops
//! accepting, in-flight requests finish, then the data store closes. All of
//! that must complete within the deadline measured from the signal, or the
//! outcome is [`ShutdownOutcome::DeadlineExceeded`].
//!
//! [`Shutdown`] is the broadcast handle background tasks subscribe to.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use crate::store::{DataStore, StoreError};

/// Broadcast stop signal for background tasks.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Process lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Closed,
}

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Drained and closed cleanly.
    Graceful,
    /// Drained, but closing the store failed.
    CloseFailed,
    /// The HTTP server stopped with an error; the store was still closed.
    ServerFailed,
    /// The deadline elapsed first.
    DeadlineExceeded,
}

impl ShutdownOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Graceful => 0,
            Self::CloseFailed | Self::ServerFailed => 1,
            Self::DeadlineExceeded => 2,
        }
    }
}

pub struct ShutdownCoordinator {
    state: watch::Sender<ShutdownState>,
    store: Arc<dyn DataStore>,
    store_closed: AtomicBool,
    deadline: Duration,
    background: Shutdown,
}

impl ShutdownCoordinator {
    pub fn new(store: Arc<dyn DataStore>, deadline: Duration) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            state,
            store,
            store_closed: AtomicBool::new(false),
            deadline,
            background: Shutdown::new(),
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Begin draining. Returns `false` if shutdown was already underway.
    pub fn initiate(&self, signal: &str) -> bool {
        let started = self.state.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = ShutdownState::Draining;
                true
            } else {
                false
            }
        });

        if started {
            tracing::info!(signal = %signal, "Signal received: closing HTTP server");
            self.background.trigger();
        } else {
            tracing::warn!(signal = %signal, "Shutdown already in progress, ignoring signal");
        }
        started
    }

    /// Resolves once draining has begun.
    pub fn draining(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.state.subscribe();
        async move {
            let _ = rx.wait_for(|state| *state != ShutdownState::Running).await;
        }
    }

    /// Stop signal for sweepers and other background loops.
    pub fn background(&self) -> broadcast::Receiver<()> {
        self.background.subscribe()
    }

    /// Close the data store, at most once.
    pub async fn close_store(&self) -> Result<(), StoreError> {
        if self.store_closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Data store already closed");
            return Ok(());
        }
        self.store.close().await
    }

    /// Run `server` until a signal, then drain and close within the deadline.
    ///
    /// `server` must stop accepting once [`Self::draining`] resolves and
    /// return when in-flight requests are done.
    pub async fn drive<F>(&self, server: F) -> ShutdownOutcome
    where
        F: Future<Output = std::io::Result<()>>,
    {
        tokio::pin!(server);

        let early_exit = tokio::select! {
            result = &mut server => Some(result),
            _ = self.draining() => None,
        };

        let drain = async {
            let result = match early_exit {
                Some(result) => {
                    self.initiate("server exit");
                    result
                }
                None => (&mut server).await,
            };
            let server_failed = match result {
                Ok(()) => false,
                Err(e) => {
                    tracing::error!(error = %e, "HTTP server stopped with an error");
                    true
                }
            };
            tracing::info!("HTTP server closed");
            (server_failed, self.close_store().await)
        };

        let outcome = match tokio::time::timeout(self.deadline, drain).await {
            Ok((server_failed, Ok(()))) => {
                tracing::info!("Data store connection closed");
                if server_failed {
                    ShutdownOutcome::ServerFailed
                } else {
                    ShutdownOutcome::Graceful
                }
            }
            Ok((_, Err(e))) => {
                tracing::error!(error = %e, "Error closing data store connection");
                ShutdownOutcome::CloseFailed
            }
            Err(_) => {
                tracing::error!(
                    deadline_secs = self.deadline.as_secs_f64(),
                    "Could not close connections in time, forcefully shutting down"
                );
                ShutdownOutcome::DeadlineExceeded
            }
        };

        self.state.send_replace(ShutdownState::Closed);
        outcome
    }
}
