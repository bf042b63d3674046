//! Hub handle and its serialized event loop.

use std::collections::BTreeMap;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::wire::{self, Frame};

/// Capacity of the hub's command mailbox.
const MAILBOX_CAPACITY: usize = 1024;

/// Errors returned by hub handles.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("Hub event loop is not running")]
    Closed,
}

/// Point-in-time view of the hub, answered from inside the event loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Current members.
    pub subscribers: usize,
    /// Whether a frame has been published yet.
    pub has_snapshot: bool,
    /// Frames published since start.
    pub published: u64,
    /// Members disconnected because their queue was full.
    pub evicted: u64,
}

enum HubCommand {
    Join {
        id: ConnectionId,
        queue: mpsc::Sender<Frame>,
    },
    Leave {
        id: ConnectionId,
    },
    Publish {
        frame: Frame,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
}

/// Cloneable handle to the hub event loop.
#[derive(Debug, Clone)]
pub struct Hub {
    mailbox: mpsc::Sender<HubCommand>,
    queue_capacity: usize,
}

/// Receiving side of a member's outbound queue.
///
/// Yields frames in publish order and `None` once the hub has dropped the
/// member (leave, eviction or hub shutdown) and the buffer is drained.
#[derive(Debug)]
pub struct Subscription {
    id: ConnectionId,
    queue: mpsc::Receiver<Frame>,
}

impl Subscription {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Frame> {
        self.queue.recv().await
    }

    pub fn into_queue(self) -> mpsc::Receiver<Frame> {
        self.queue
    }
}

impl Hub {
    /// Create a handle and the event loop it talks to.
    ///
    /// `queue_capacity` bounds each member's outbound queue and must be
    /// at least 1.
    pub fn new(queue_capacity: usize) -> (Self, HubLoop) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let hub = Self {
            mailbox: tx,
            queue_capacity: queue_capacity.max(1),
        };
        let event_loop = HubLoop {
            mailbox: rx,
            members: BTreeMap::new(),
            last_known: None,
            published: 0,
            evicted: 0,
        };
        (hub, event_loop)
    }

    /// Create a hub and run its event loop on the current runtime.
    pub fn spawn(queue_capacity: usize, shutdown: broadcast::Receiver<()>) -> (Self, JoinHandle<()>) {
        let (hub, event_loop) = Self::new(queue_capacity);
        let handle = tokio::spawn(event_loop.run(shutdown));
        (hub, handle)
    }

    /// Add a connection to the membership.
    ///
    /// The returned subscription already holds the last-known frame (or
    /// the "no data yet" sentinel) once the join is processed.
    pub async fn join(&self, id: ConnectionId) -> Result<Subscription, HubError> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.send(HubCommand::Join { id, queue: tx }).await?;
        Ok(Subscription { id, queue: rx })
    }

    /// Remove a connection. Unknown or already removed ids are ignored.
    pub async fn leave(&self, id: ConnectionId) -> Result<(), HubError> {
        self.send(HubCommand::Leave { id }).await
    }

    /// Replace the last-known frame and fan it out to every member.
    pub async fn publish(&self, frame: Frame) -> Result<(), HubError> {
        self.send(HubCommand::Publish { frame }).await
    }

    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Stats { reply }).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.mailbox.send(command).await.map_err(|_| HubError::Closed)
    }
}

/// The hub's serialized event loop. Owns membership and the last-known frame.
pub struct HubLoop {
    mailbox: mpsc::Receiver<HubCommand>,
    members: BTreeMap<ConnectionId, mpsc::Sender<Frame>>,
    last_known: Option<Frame>,
    published: u64,
    evicted: u64,
}

impl HubLoop {
    /// Process commands until shutdown or until every handle is dropped.
    ///
    /// On exit all member queues are closed, which lets each outbound pump
    /// flush and send its close frame.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Hub event loop starting");

        loop {
            tokio::select! {
                command = self.mailbox.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = shutdown.recv() => {
                    tracing::info!("Hub received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        let remaining = self.members.len();
        self.members.clear();
        metrics::record_subscribers(0);
        tracing::info!(closed_subscribers = remaining, "Hub event loop stopped");
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Join { id, queue } => self.join(id, queue),
            HubCommand::Leave { id } => self.leave(id),
            HubCommand::Publish { frame } => self.publish(frame),
            HubCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    fn join(&mut self, id: ConnectionId, queue: mpsc::Sender<Frame>) {
        let initial = self.last_known.clone().unwrap_or_else(wire::no_data_yet);

        // A fresh queue always has room; failure means the subscriber is already gone.
        if queue.try_send(initial).is_err() {
            tracing::debug!(connection_id = %id, "Subscriber went away before joining");
            return;
        }

        self.members.insert(id, queue);
        tracing::info!(
            connection_id = %id,
            subscribers = self.members.len(),
            primed_with_snapshot = self.last_known.is_some(),
            "Subscriber joined"
        );
        metrics::record_subscribers(self.members.len());
    }

    fn leave(&mut self, id: ConnectionId) {
        if self.members.remove(&id).is_some() {
            tracing::info!(
                connection_id = %id,
                subscribers = self.members.len(),
                "Subscriber left"
            );
            metrics::record_subscribers(self.members.len());
        } else {
            tracing::trace!(connection_id = %id, "Leave for non-member ignored");
        }
    }

    fn publish(&mut self, frame: Frame) {
        self.last_known = Some(frame.clone());
        self.published += 1;

        let mut dropped = Vec::new();
        let mut evicted = 0;
        for (id, queue) in &self.members {
            match queue.try_send(frame.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        connection_id = %id,
                        "Subscriber queue full, disconnecting slow consumer"
                    );
                    metrics::record_slow_consumer();
                    dropped.push(*id);
                    evicted += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(connection_id = %id, "Subscriber queue closed, removing member");
                    dropped.push(*id);
                }
            }
        }

        for id in &dropped {
            self.members.remove(id);
        }
        self.evicted += evicted;

        metrics::record_publish(self.members.len());
        if !dropped.is_empty() {
            metrics::record_subscribers(self.members.len());
        }
        tracing::debug!(
            subscribers = self.members.len(),
            bytes = frame.as_str().len(),
            "Status published"
        );
    }

    fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.members.len(),
            has_snapshot: self.last_known.is_some(),
            published: self.published,
            evicted: self.evicted,
        }
    }
}
