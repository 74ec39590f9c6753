//! Beacon listener: accepts links and spawns one task per link.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{RwLock, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use super::connection::{run_connection, shutdown_requested};
use super::handler::{AggregatorHandler, ConnectionInfo};
use crate::config::ListenerMode;
use crate::domain::ConnectionId;
use crate::error::RelayError;

/// Pause after a failed `accept` so a persistent fault (e.g. descriptor
/// exhaustion) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Live beacon links, shared with the status endpoint.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    links: Arc<RwLock<HashMap<ConnectionId, ConnectionInfo>>>,
}

impl LinkTable {
    async fn insert(&self, info: ConnectionInfo) {
        self.links.write().await.insert(info.id, info);
    }

    async fn remove(&self, id: ConnectionId) {
        self.links.write().await.remove(&id);
    }

    async fn clear(&self) {
        self.links.write().await.clear();
    }

    /// Returns the currently open links, oldest first.
    pub async fn snapshot(&self) -> Vec<ConnectionInfo> {
        let mut links: Vec<_> = self.links.read().await.values().cloned().collect();
        links.sort_by_key(|l| l.connected_at);
        links
    }

    /// Number of currently open links.
    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }

    /// Returns `true` if no link is open.
    pub async fn is_empty(&self) -> bool {
        self.links.read().await.is_empty()
    }
}

/// Connection aggregator for beacon hardware.
///
/// Built with its handler, then [`started`](BeaconAggregator::start) once.
/// Runs until [`AggregatorHandle::shutdown`] independently of the HTTP
/// server.
#[derive(Debug)]
pub struct BeaconAggregator {
    mode: ListenerMode,
    bind_host: IpAddr,
    handler: Arc<dyn AggregatorHandler>,
}

impl BeaconAggregator {
    /// Creates an aggregator that will report to `handler`.
    #[must_use]
    pub fn new(mode: ListenerMode, bind_host: IpAddr, handler: Arc<dyn AggregatorHandler>) -> Self {
        Self {
            mode,
            bind_host,
            handler,
        }
    }

    /// Binds the listener (unless offline) and starts accepting links in a
    /// background task.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] if the listener cannot be bound.
    pub async fn start(self) -> Result<AggregatorHandle, RelayError> {
        let (shutdown_tx, shutdown_rx) = watch::channel(None);
        let links = LinkTable::default();

        let (local_addr, task) = match self.mode {
            ListenerMode::Offline => {
                tracing::warn!("beacon listener offline: no hardware detections will be received");
                let task = tokio::spawn(idle_until_shutdown(shutdown_rx));
                (None, task)
            }
            ListenerMode::Tcp(port) => {
                let listener = TcpListener::bind((self.bind_host, port)).await?;
                let local_addr = listener.local_addr()?;
                tracing::info!(addr = %local_addr, "beacon listener bound");
                let task = tokio::spawn(accept_loop(
                    listener,
                    self.handler,
                    links.clone(),
                    shutdown_rx,
                ));
                (Some(local_addr), task)
            }
        };

        Ok(AggregatorHandle {
            status: AggregatorStatus {
                mode: self.mode,
                local_addr,
                links,
            },
            shutdown_tx,
            task,
        })
    }
}

/// Read-only view of a running aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorStatus {
    /// Configured listener mode.
    pub mode: ListenerMode,
    /// Bound address, `None` when offline.
    pub local_addr: Option<SocketAddr>,
    /// Open links.
    pub links: LinkTable,
}

/// Control handle of a started aggregator.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) closes
/// every link immediately.
#[derive(Debug)]
pub struct AggregatorHandle {
    status: AggregatorStatus,
    shutdown_tx: watch::Sender<Option<Duration>>,
    task: JoinHandle<()>,
}

impl AggregatorHandle {
    /// Address the listener is bound to, `None` when offline.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.status.local_addr
    }

    /// Currently open links, oldest first.
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        self.status.links.snapshot().await
    }

    /// Returns a cloneable status view for the HTTP layer.
    #[must_use]
    pub fn status(&self) -> AggregatorStatus {
        self.status.clone()
    }

    /// Stops accepting links, releases the listening socket, asks every link
    /// to close and waits up to `grace` for them before aborting the rest.
    pub async fn shutdown(self, grace: Duration) {
        self.shutdown_tx.send_replace(Some(grace));
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "beacon aggregator task failed");
        }
        tracing::info!("beacon aggregator stopped");
    }
}

async fn idle_until_shutdown(mut shutdown: watch::Receiver<Option<Duration>>) {
    shutdown_requested(&mut shutdown).await;
}

async fn accept_loop(
    listener: TcpListener,
    handler: Arc<dyn AggregatorHandler>,
    links: LinkTable,
    mut shutdown: watch::Receiver<Option<Duration>>,
) {
    let link_shutdown = shutdown.clone();
    let mut tasks = JoinSet::new();

    let grace = loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let info = ConnectionInfo::new(peer);
                    tracing::info!(connection_id = %info.id, %peer, "beacon link accepted");
                    links.insert(info.clone()).await;

                    let handler = Arc::clone(&handler);
                    let links = links.clone();
                    let rx = link_shutdown.clone();
                    tasks.spawn(async move {
                        let id = info.id;
                        run_connection(stream, info, handler, rx).await;
                        links.remove(id).await;
                    });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to accept beacon link");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
            grace = shutdown_requested(&mut shutdown) => break grace,
        }
    };

    drop(listener);
    tracing::info!(open_links = tasks.len(), "beacon listener closed, draining links");

    let drain = async {
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
    };
    if tokio::time::timeout(grace, drain).await.is_err() {
        tracing::warn!(
            remaining = tasks.len(),
            "shutdown grace elapsed, aborting beacon links"
        );
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        // Aborted link tasks never reach their own removal.
        links.clear().await;
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(err) = joined
        && err.is_panic()
    {
        tracing::error!(error = %err, "beacon link task panicked");
    }
}
