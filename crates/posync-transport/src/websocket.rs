//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Socket I/O lives in background tasks: one accept loop per host, and a
//! reader plus a writer task per connection. Readers push
//! [`TransportEvent`]s into a single unbounded queue which the owner
//! drains through [`Transport::poll`] / [`Transport::next_event`].
//! Sends go through a per-connection queue drained by the writer task, so
//! [`Transport::send`] never waits on the network.
//!
//! WebSocket runs over TCP, so both [`Channel`] qualities get reliable,
//! ordered delivery here. Unreliable traffic simply receives stronger
//! guarantees than it asked for.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{Channel, ConnectionId, Transport, TransportError, TransportEvent};

/// Work items for a connection's writer task.
enum Outgoing {
    Frame(Vec<u8>),
    Close,
}

type OutgoingSender = mpsc::UnboundedSender<Outgoing>;
type PeerTable = Arc<Mutex<HashMap<ConnectionId, OutgoingSender>>>;

fn lock(peers: &PeerTable) -> MutexGuard<'_, HashMap<ConnectionId, OutgoingSender>> {
    peers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Pumps one WebSocket until either side closes it.
///
/// Inbound frames become [`TransportEvent::Data`]; the returned future
/// completes when the read side ends. The writer half runs in its own
/// task and is aborted on return.
async fn run_link<S>(
    id: ConnectionId,
    ws: WebSocketStream<S>,
    outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<TransportEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = ws.split();

    let writer = tokio::spawn(async move {
        let mut outgoing = outgoing;
        while let Some(item) = outgoing.recv().await {
            let result = match item {
                Outgoing::Frame(data) => {
                    sink.send(Message::Binary(data.into())).await
                }
                Outgoing::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            };
            if let Err(e) = result {
                tracing::debug!(%id, error = %e, "websocket write failed");
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let data = match frame {
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Text(text)) => text.as_bytes().to_vec(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue, // ping/pong/raw frame
            Err(e) => {
                tracing::debug!(%id, error = %e, "websocket read failed");
                break;
            }
        };
        let event = TransportEvent::Data {
            conn: id,
            channel: Channel::ReliableOrdered,
            data,
        };
        if events.send(event).is_err() {
            // Owner dropped the transport.
            break;
        }
    }

    writer.abort();
}

/// Queues a frame on a connection's writer.
fn queue_frame(
    sender: &OutgoingSender,
    conn: ConnectionId,
    data: &[u8],
) -> Result<(), TransportError> {
    sender
        .send(Outgoing::Frame(data.to_vec()))
        .map_err(|_| TransportError::ConnectionClosed(conn))
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// A listening WebSocket [`Transport`]: the server side.
pub struct WebSocketHost {
    local_addr: SocketAddr,
    peers: PeerTable,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    accept_task: JoinHandle<()>,
}

impl WebSocketHost {
    /// Binds a new WebSocket host to `addr`, accepting at most
    /// `max_connections` simultaneous peers.
    ///
    /// Connections beyond the limit are closed right after the
    /// handshake, before any [`TransportEvent::Connect`] is emitted.
    ///
    /// # Errors
    /// [`TransportError::BindFailed`] if the socket cannot be bound.
    pub async fn bind(
        addr: &str,
        max_connections: usize,
    ) -> Result<Self, TransportError> {
        let listener =
            TcpListener::bind(addr).await.map_err(TransportError::BindFailed)?;
        let local_addr =
            listener.local_addr().map_err(TransportError::BindFailed)?;
        tracing::info!(%local_addr, max_connections, "WebSocket host listening");

        let peers: PeerTable = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&peers),
            event_tx,
            max_connections,
        ));

        Ok(Self {
            local_addr,
            peers,
            events: event_rx,
            accept_task,
        })
    }

    /// The address the host is actually bound to (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        lock(&self.peers).len()
    }
}

async fn accept_loop(
    listener: TcpListener,
    peers: PeerTable,
    events: mpsc::UnboundedSender<TransportEvent>,
    max_connections: usize,
) {
    let next_id = Arc::new(AtomicU64::new(1));

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };

        let peers = Arc::clone(&peers);
        let events = events.clone();
        let next_id = Arc::clone(&next_id);

        // Handshake off the accept loop so a slow client can't stall it.
        tokio::spawn(async move {
            let mut ws = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "websocket handshake failed");
                    return;
                }
            };

            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let id = {
                let mut table = lock(&peers);
                if table.len() >= max_connections {
                    None
                } else {
                    let id = ConnectionId::new(next_id.fetch_add(1, Ordering::Relaxed));
                    table.insert(id, out_tx);
                    Some(id)
                }
            };
            let Some(id) = id else {
                tracing::warn!(%addr, max_connections, "host full, refusing connection");
                let _ = ws.close(None).await;
                return;
            };

            tracing::debug!(%id, %addr, "accepted websocket connection");
            if events.send(TransportEvent::Connect(id)).is_err() {
                lock(&peers).remove(&id);
                return;
            }

            run_link(id, ws, out_rx, events.clone()).await;

            lock(&peers).remove(&id);
            let _ = events.send(TransportEvent::Disconnect(id));
            tracing::debug!(%id, "websocket connection closed");
        });
    }
}

impl Transport for WebSocketHost {
    fn send(
        &self,
        conn: ConnectionId,
        _channel: Channel,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let peers = lock(&self.peers);
        let sender = peers
            .get(&conn)
            .ok_or(TransportError::UnknownConnection(conn))?;
        queue_frame(sender, conn, data)
    }

    fn disconnect(&self, conn: ConnectionId) -> Result<(), TransportError> {
        let peers = lock(&self.peers);
        let sender = peers
            .get(&conn)
            .ok_or(TransportError::UnknownConnection(conn))?;
        sender
            .send(Outgoing::Close)
            .map_err(|_| TransportError::ConnectionClosed(conn))
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

impl Drop for WebSocketHost {
    fn drop(&mut self) {
        self.accept_task.abort();
        for sender in lock(&self.peers).values() {
            let _ = sender.send(Outgoing::Close);
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A single outbound WebSocket connection: the client side.
pub struct WebSocketClient {
    id: ConnectionId,
    outgoing: OutgoingSender,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    link_task: JoinHandle<()>,
}

impl WebSocketClient {
    /// Connects to a WebSocket host at `url` (e.g. `ws://127.0.0.1:5701`).
    ///
    /// The first event polled is always [`TransportEvent::Connect`].
    ///
    /// # Errors
    /// [`TransportError::ConnectFailed`] if the TCP connect or WebSocket
    /// handshake fails.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        // A client holds exactly one link; its id is local.
        let id = ConnectionId::new(1);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        // Unbounded send only fails when the receiver is gone, which it isn't yet.
        let _ = event_tx.send(TransportEvent::Connect(id));
        tracing::info!(url, "connected to websocket host");

        let link_task = tokio::spawn(async move {
            run_link(id, ws, out_rx, event_tx.clone()).await;
            let _ = event_tx.send(TransportEvent::Disconnect(id));
        });

        Ok(Self {
            id,
            outgoing: out_tx,
            events: event_rx,
            link_task,
        })
    }

    /// The local id of this link.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Transport for WebSocketClient {
    fn send(
        &self,
        conn: ConnectionId,
        _channel: Channel,
        data: &[u8],
    ) -> Result<(), TransportError> {
        if conn != self.id {
            return Err(TransportError::UnknownConnection(conn));
        }
        queue_frame(&self.outgoing, conn, data)
    }

    fn disconnect(&self, conn: ConnectionId) -> Result<(), TransportError> {
        if conn != self.id {
            return Err(TransportError::UnknownConnection(conn));
        }
        self.outgoing
            .send(Outgoing::Close)
            .map_err(|_| TransportError::ConnectionClosed(conn))
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

impl Drop for WebSocketClient {
    fn drop(&mut self) {
        self.link_task.abort();
    }
}
