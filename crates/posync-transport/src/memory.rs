//! In-process transport.
//!
//! A [`MemoryNetwork`] is a tiny switchboard: one [`MemoryHost`] end and
//! any number of [`MemoryPeer`] ends. Every send lands in the receiving
//! end's inbox immediately, which makes whole-protocol tests
//! deterministic: connect, pump, assert.
//!
//! Unreliable sends can be configured to vanish
//! ([`MemoryNetwork::set_drop_unreliable`]) to exercise the loss tolerance
//! of the position traffic.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::{Channel, ConnectionId, Transport, TransportError, TransportEvent};

/// Locks a mutex, recovering the data if another holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Event queue of one end of the network.
#[derive(Default)]
struct Inbox {
    queue: Mutex<VecDeque<TransportEvent>>,
    notify: Notify,
    closed: AtomicBool,
}

impl Inbox {
    fn push(&self, event: TransportEvent) {
        lock(&self.queue).push_back(event);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<TransportEvent> {
        lock(&self.queue).pop_front()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn next(&self) -> Option<TransportEvent> {
        loop {
            if let Some(event) = self.pop() {
                return Some(event);
            }
            if self.is_closed() {
                return None;
            }
            self.notify.notified().await;
        }
    }
}

struct Hub {
    host: Arc<Inbox>,
    peers: HashMap<ConnectionId, Arc<Inbox>>,
    next_id: u64,
    max_connections: usize,
    drop_unreliable: bool,
}

impl Hub {
    /// Tears down a link and tells both ends about it.
    fn unlink(&mut self, conn: ConnectionId) -> Result<(), TransportError> {
        let peer = self
            .peers
            .remove(&conn)
            .ok_or(TransportError::UnknownConnection(conn))?;
        self.host.push(TransportEvent::Disconnect(conn));
        peer.push(TransportEvent::Disconnect(conn));
        peer.close();
        tracing::debug!(%conn, "memory link closed");
        Ok(())
    }
}

/// Shared handle to an in-process network. Cheap to clone.
#[derive(Clone)]
pub struct MemoryNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl MemoryNetwork {
    /// Creates a network that accepts at most `max_connections` live peers.
    pub fn new(max_connections: usize) -> Self {
        Self {
            hub: Arc::new(Mutex::new(Hub {
                host: Arc::new(Inbox::default()),
                peers: HashMap::new(),
                next_id: 1,
                max_connections,
                drop_unreliable: false,
            })),
        }
    }

    /// Returns the host end. Every call returns a handle to the same inbox.
    pub fn host(&self) -> MemoryHost {
        let inbox = Arc::clone(&lock(&self.hub).host);
        MemoryHost {
            hub: Arc::clone(&self.hub),
            inbox,
        }
    }

    /// Opens a new link to the host.
    ///
    /// Both ends see a [`TransportEvent::Connect`] carrying the new id.
    ///
    /// # Errors
    /// [`TransportError::ConnectFailed`] when the host is at capacity.
    pub fn connect(&self) -> Result<MemoryPeer, TransportError> {
        let mut hub = lock(&self.hub);
        if hub.peers.len() >= hub.max_connections {
            tracing::warn!(
                max = hub.max_connections,
                "memory host full, refusing connection"
            );
            return Err(TransportError::ConnectFailed(format!(
                "host full ({} connections)",
                hub.max_connections
            )));
        }

        let id = ConnectionId::new(hub.next_id);
        hub.next_id += 1;

        let inbox = Arc::new(Inbox::default());
        hub.peers.insert(id, Arc::clone(&inbox));
        hub.host.push(TransportEvent::Connect(id));
        inbox.push(TransportEvent::Connect(id));
        tracing::debug!(%id, "memory link opened");

        Ok(MemoryPeer {
            id,
            hub: Arc::clone(&self.hub),
            inbox,
        })
    }

    /// When `true`, every send on [`Channel::Unreliable`] is silently lost.
    pub fn set_drop_unreliable(&self, drop: bool) {
        lock(&self.hub).drop_unreliable = drop;
    }

    /// Number of live links.
    pub fn connection_count(&self) -> usize {
        lock(&self.hub).peers.len()
    }
}

/// The host end of a [`MemoryNetwork`].
pub struct MemoryHost {
    hub: Arc<Mutex<Hub>>,
    inbox: Arc<Inbox>,
}

impl Transport for MemoryHost {
    fn send(
        &self,
        conn: ConnectionId,
        channel: Channel,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let hub = lock(&self.hub);
        let peer = hub
            .peers
            .get(&conn)
            .ok_or(TransportError::UnknownConnection(conn))?;
        if channel == Channel::Unreliable && hub.drop_unreliable {
            tracing::trace!(%conn, "unreliable send lost");
            return Ok(());
        }
        peer.push(TransportEvent::Data {
            conn,
            channel,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn disconnect(&self, conn: ConnectionId) -> Result<(), TransportError> {
        lock(&self.hub).unlink(conn)
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.inbox.pop()
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.inbox.next().await
    }
}

/// A client end of a [`MemoryNetwork`]. Dropping it closes the link.
pub struct MemoryPeer {
    id: ConnectionId,
    hub: Arc<Mutex<Hub>>,
    inbox: Arc<Inbox>,
}

impl MemoryPeer {
    /// The id the host knows this link by.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the link is still up.
    pub fn is_connected(&self) -> bool {
        lock(&self.hub).peers.contains_key(&self.id)
    }
}

impl Transport for MemoryPeer {
    fn send(
        &self,
        conn: ConnectionId,
        channel: Channel,
        data: &[u8],
    ) -> Result<(), TransportError> {
        if conn != self.id {
            return Err(TransportError::UnknownConnection(conn));
        }
        let hub = lock(&self.hub);
        if !hub.peers.contains_key(&conn) {
            return Err(TransportError::ConnectionClosed(conn));
        }
        if channel == Channel::Unreliable && hub.drop_unreliable {
            tracing::trace!(%conn, "unreliable send lost");
            return Ok(());
        }
        hub.host.push(TransportEvent::Data {
            conn,
            channel,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn disconnect(&self, conn: ConnectionId) -> Result<(), TransportError> {
        if conn != self.id {
            return Err(TransportError::UnknownConnection(conn));
        }
        lock(&self.hub).unlink(conn)
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.inbox.pop()
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.inbox.next().await
    }
}

impl Drop for MemoryPeer {
    fn drop(&mut self) {
        let mut hub = lock(&self.hub);
        if hub.peers.contains_key(&self.id) {
            let _ = hub.unlink(self.id);
        }
    }
}
