// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport node: one TCP listener plus a table of peer connections.
//!
//! Each runtime owns a single [`Node`]. Named services stand in for the
//! named processes a distribution layer would offer: requests and casts
//! are routed to the service named in the frame, and a bounded request
//! gets its reply correlated by id. A monitor registered against a peer
//! fires exactly once when that peer's connection goes away.

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use skitter_core::{Mode, NodeName, Tag, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::frame::{Frame, RpcError};
use crate::wire::{self, ProtocolError};

/// Bound on handshake and request/reply exchanges.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot reach {node}: {reason}")]
    Unreachable { node: NodeName, reason: String },

    #[error("handshake rejected: {0}")]
    Rejected(String),

    #[error("not connected to {0}")]
    NotConnected(NodeName),

    #[error("connection to {0} closed")]
    Closed(NodeName),

    #[error("invalid bind address: {0}")]
    Bind(std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Errors from a bounded remote call.
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("request timed out")]
    Timeout,
}

/// A named request handler, the transport-level equivalent of a named
/// process. Requests expect a reply; casts are fire-and-forget and are
/// delivered in per-peer arrival order.
#[async_trait::async_trait]
pub trait Service: Send + Sync {
    async fn handle(&self, from: NodeName, body: Value) -> Result<Value, RpcError>;

    /// Handle a cast. Defaults to `handle` with the reply discarded.
    /// Implementations must not block the connection for long.
    async fn notify(&self, from: NodeName, body: Value) {
        let _ = self.handle(from, body).await;
    }
}

/// Identity and transport settings for a [`Node`].
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// The `name` part of the node's `name@host` identity.
    pub name: String,
    pub mode: Mode,
    pub version: String,
    /// Shared secret; peers presenting a different cookie are rejected
    /// before any frame is routed.
    pub cookie: String,
    pub tags: Vec<Tag>,
    /// Listen address; port 0 picks a free port.
    pub bind: SocketAddr,
}

struct Peer {
    conn_id: u64,
    mode: Mode,
    version: String,
    tags: Vec<Tag>,
    tx: mpsc::UnboundedSender<Frame>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, RpcError>>>>>,
    cancel: CancellationToken,
}

type Monitor = Box<dyn FnOnce(NodeName) + Send>;

struct Shared {
    name: NodeName,
    mode: Mode,
    version: String,
    cookie: String,
    tags: Vec<Tag>,
    services: RwLock<HashMap<String, Arc<dyn Service>>>,
    conns: Mutex<HashMap<NodeName, Arc<Peer>>>,
    monitors: Mutex<HashMap<NodeName, Vec<Monitor>>>,
    next_id: AtomicU64,
    cancel: CancellationToken,
}

/// The local endpoint of the cluster transport.
#[derive(Clone)]
pub struct Node {
    shared: Arc<Shared>,
}

impl Node {
    /// Bind the listener and start accepting peers.
    pub async fn spawn(config: NodeConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(config.bind).await.map_err(TransportError::Bind)?;
        let local = listener.local_addr().map_err(TransportError::Bind)?;
        let shared = Arc::new(Shared {
            name: NodeName::new(&config.name, local.to_string()),
            mode: config.mode,
            version: config.version,
            cookie: config.cookie,
            tags: config.tags,
            services: RwLock::new(HashMap::new()),
            conns: Mutex::new(HashMap::new()),
            monitors: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            cancel: CancellationToken::new(),
        });
        let node = Node { shared: Arc::clone(&shared) };
        tokio::spawn(accept_loop(listener, Arc::clone(&shared)));
        Ok(node)
    }

    /// This node's `name@host` identity, host filled from the bound
    /// listener address.
    pub fn name(&self) -> &NodeName {
        &self.shared.name
    }

    pub fn mode(&self) -> Mode {
        self.shared.mode
    }

    pub fn version(&self) -> &str {
        &self.shared.version
    }

    pub fn tags(&self) -> &[Tag] {
        &self.shared.tags
    }

    /// Register a service under a name. Re-registering replaces.
    pub fn register_service(&self, name: impl Into<String>, service: Arc<dyn Service>) {
        self.shared.services.write().insert(name.into(), service);
    }

    pub fn connected(&self, remote: &NodeName) -> bool {
        self.shared.conns.lock().contains_key(remote)
    }

    /// Mode, version and tags the peer announced in its handshake.
    pub fn peer_info(&self, remote: &NodeName) -> Option<(Mode, String, Vec<Tag>)> {
        self.shared
            .conns
            .lock()
            .get(remote)
            .map(|p| (p.mode, p.version.clone(), p.tags.clone()))
    }

    /// Ensure a transport connection to `remote` exists, dialing its host
    /// if necessary. Returns the peer's announced mode.
    pub async fn ensure_connected(&self, remote: &NodeName) -> Result<Mode, TransportError> {
        if let Some(peer) = self.shared.conns.lock().get(remote) {
            return Ok(peer.mode);
        }
        self.dial(remote).await
    }

    async fn dial(&self, remote: &NodeName) -> Result<Mode, TransportError> {
        let stream = TcpStream::connect(remote.host()).await.map_err(|e| {
            TransportError::Unreachable { node: remote.clone(), reason: e.to_string() }
        })?;
        let (mut reader, mut writer) = stream.into_split();

        let hello = Frame::Hello {
            name: self.shared.name.clone(),
            mode: self.shared.mode,
            version: self.shared.version.clone(),
            tags: self.shared.tags.clone(),
            cookie: self.shared.cookie.clone(),
        };
        write_with_timeout(&mut writer, &hello).await?;
        let answer = read_with_timeout(&mut reader).await?;
        match answer {
            Frame::Welcome { name, mode, version, tags } => {
                if &name != remote {
                    // The listener at this address identifies as someone
                    // else; treat it as unreachable rather than adopt it.
                    return Err(TransportError::Unreachable {
                        node: remote.clone(),
                        reason: format!("answered as {name}"),
                    });
                }
                self.shared.register_peer(name, mode, version, tags, reader, writer);
                Ok(mode)
            }
            Frame::Reject { reason } => Err(TransportError::Rejected(reason)),
            other => Err(TransportError::Unreachable {
                node: remote.clone(),
                reason: format!("unexpected handshake frame: {other:?}"),
            }),
        }
    }

    /// Send a request and await its reply, bounded by [`RPC_TIMEOUT`].
    pub async fn call(
        &self,
        remote: &NodeName,
        service: &str,
        body: Value,
    ) -> Result<Value, CallError> {
        self.call_with(remote, service, body, Some(RPC_TIMEOUT)).await
    }

    /// Send a request with an explicit bound; `None` waits as long as the
    /// connection lives.
    pub async fn call_with(
        &self,
        remote: &NodeName,
        service: &str,
        body: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, CallError> {
        let peer = self
            .shared
            .conns
            .lock()
            .get(remote)
            .cloned()
            .ok_or_else(|| TransportError::NotConnected(remote.clone()))?;
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        peer.pending.lock().insert(id, reply_tx);
        let frame = Frame::Request { id, service: service.to_string(), body };
        if peer.tx.send(frame).is_err() {
            peer.pending.lock().remove(&id);
            return Err(TransportError::Closed(remote.clone()).into());
        }
        let reply = match timeout {
            Some(bound) => match tokio::time::timeout(bound, reply_rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    peer.pending.lock().remove(&id);
                    return Err(CallError::Timeout);
                }
            },
            None => reply_rx.await,
        };
        match reply {
            Ok(result) => result.map_err(CallError::Rpc),
            // Sender dropped: the connection went away under us.
            Err(_) => Err(TransportError::Closed(remote.clone()).into()),
        }
    }

    /// Typed request/reply, bounded by [`RPC_TIMEOUT`].
    pub async fn request<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        remote: &NodeName,
        service: &str,
        request: &Req,
    ) -> Result<Resp, CallError> {
        self.request_with(remote, service, request, Some(RPC_TIMEOUT)).await
    }

    /// Typed request/reply with an explicit bound.
    pub async fn request_with<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        remote: &NodeName,
        service: &str,
        request: &Req,
        timeout: Option<Duration>,
    ) -> Result<Resp, CallError> {
        let body = serde_json::to_value(request).map_err(|e| CallError::Codec(e.to_string()))?;
        let reply = self.call_with(remote, service, body, timeout).await?;
        serde_json::from_value(reply).map_err(|e| CallError::Codec(e.to_string()))
    }

    /// Fire-and-forget send. Casts to one peer preserve their order.
    pub fn cast<Req: Serialize>(
        &self,
        remote: &NodeName,
        service: &str,
        request: &Req,
    ) -> Result<(), CallError> {
        let body = serde_json::to_value(request).map_err(|e| CallError::Codec(e.to_string()))?;
        let peer = self
            .shared
            .conns
            .lock()
            .get(remote)
            .cloned()
            .ok_or_else(|| TransportError::NotConnected(remote.clone()))?;
        peer.tx
            .send(Frame::Cast { service: service.to_string(), body })
            .map_err(|_| TransportError::Closed(remote.clone()).into())
    }

    /// Register a callback fired exactly once when the connection to
    /// `remote` drops. Fires immediately when there is no connection.
    pub fn monitor(&self, remote: &NodeName, on_down: impl FnOnce(NodeName) + Send + 'static) {
        {
            let conns = self.shared.conns.lock();
            if conns.contains_key(remote) {
                self.shared
                    .monitors
                    .lock()
                    .entry(remote.clone())
                    .or_default()
                    .push(Box::new(on_down));
                return;
            }
        }
        on_down(remote.clone());
    }

    /// Drop the connection to `remote`, firing its monitors.
    pub fn disconnect(&self, remote: &NodeName) {
        let peer = self.shared.conns.lock().get(remote).cloned();
        if let Some(peer) = peer {
            peer.cancel.cancel();
            self.shared.drop_peer(remote, peer.conn_id);
        }
    }

    /// Stop the listener and drop every connection.
    pub fn shutdown(&self) {
        self.shared.cancel.cancel();
        let remotes: Vec<_> = self.shared.conns.lock().keys().cloned().collect();
        for remote in remotes {
            self.disconnect(&remote);
        }
    }
}

impl Shared {
    fn register_peer(
        self: &Arc<Self>,
        remote: NodeName,
        mode: Mode,
        version: String,
        tags: Vec<Tag>,
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
    ) {
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = self.cancel.child_token();
        let peer = Arc::new(Peer {
            conn_id,
            mode,
            version,
            tags,
            tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            cancel: cancel.clone(),
        });
        let replaced = self.conns.lock().insert(remote.clone(), Arc::clone(&peer));
        if let Some(old) = replaced {
            debug!(remote = %remote, "replacing existing connection");
            old.cancel.cancel();
        }
        tokio::spawn(writer_loop(writer, rx, cancel.clone()));
        tokio::spawn(reader_loop(Arc::clone(self), remote, peer, reader));
    }

    /// Remove the peer if it still owns the entry, resolving its pending
    /// calls and firing its monitors.
    fn drop_peer(self: &Arc<Self>, remote: &NodeName, conn_id: u64) {
        let removed = {
            let mut conns = self.conns.lock();
            match conns.get(remote) {
                Some(peer) if peer.conn_id == conn_id => conns.remove(remote),
                _ => None,
            }
        };
        let Some(peer) = removed else { return };
        peer.cancel.cancel();
        peer.pending.lock().clear();
        let monitors = self.monitors.lock().remove(remote).unwrap_or_default();
        debug!(remote = %remote, monitors = monitors.len(), "connection down");
        for monitor in monitors {
            monitor(remote.clone());
        }
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            result = listener.accept() => match result {
                Ok((stream, addr)) => {
                    debug!("connection from {addr}");
                    let shared = Arc::clone(&shared);
                    tokio::spawn(async move {
                        if let Err(e) = accept_handshake(shared, stream).await {
                            warn!("handshake failed: {e}");
                        }
                    });
                }
                Err(e) => error!("accept error: {e}"),
            },
        }
    }
}

async fn accept_handshake(shared: Arc<Shared>, stream: TcpStream) -> Result<(), TransportError> {
    let (mut reader, mut writer) = stream.into_split();
    let hello = read_with_timeout(&mut reader).await?;
    let Frame::Hello { name, mode, version, tags, cookie } = hello else {
        return Err(TransportError::Rejected("expected hello".into()));
    };
    if cookie != shared.cookie {
        write_with_timeout(&mut writer, &Frame::Reject { reason: "bad cookie".into() }).await?;
        return Err(TransportError::Rejected(format!("bad cookie from {name}")));
    }
    let welcome = Frame::Welcome {
        name: shared.name.clone(),
        mode: shared.mode,
        version: shared.version.clone(),
        tags: shared.tags.clone(),
    };
    write_with_timeout(&mut writer, &welcome).await?;
    shared.register_peer(name, mode, version, tags, reader, writer);
    Ok(())
}

async fn writer_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Frame>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = wire::write_frame(&mut writer, &frame).await {
                        debug!("write failed: {e}");
                        break;
                    }
                }
                None => break,
            },
        }
    }
}

async fn reader_loop(
    shared: Arc<Shared>,
    remote: NodeName,
    peer: Arc<Peer>,
    mut reader: OwnedReadHalf,
) {
    loop {
        let frame: Result<Frame, _> = tokio::select! {
            _ = peer.cancel.cancelled() => break,
            frame = wire::read_frame(&mut reader) => frame,
        };
        match frame {
            Ok(Frame::Request { id, service, body }) => {
                let svc = shared.services.read().get(&service).cloned();
                let reply_tx = peer.tx.clone();
                let from = remote.clone();
                tokio::spawn(async move {
                    let result = match svc {
                        Some(svc) => svc.handle(from, body).await,
                        None => Err(RpcError::NoService { service }),
                    };
                    let _ = reply_tx.send(Frame::Reply { id, result });
                });
            }
            Ok(Frame::Reply { id, result }) => {
                if let Some(tx) = peer.pending.lock().remove(&id) {
                    let _ = tx.send(result);
                }
            }
            Ok(Frame::Cast { service, body }) => {
                // Handled inline so casts from one peer keep their order.
                let svc = shared.services.read().get(&service).cloned();
                match svc {
                    Some(svc) => svc.notify(remote.clone(), body).await,
                    None => debug!(service, "cast for unknown service"),
                }
            }
            Ok(other) => {
                warn!(remote = %remote, "unexpected frame after handshake: {other:?}");
            }
            Err(e) => {
                debug!(remote = %remote, "connection lost: {e}");
                break;
            }
        }
    }
    shared.drop_peer(&remote, peer.conn_id);
}

async fn write_with_timeout<W, T>(writer: &mut W, value: &T) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    match tokio::time::timeout(RPC_TIMEOUT, wire::write_frame(writer, value)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(TransportError::Rejected("handshake timed out".into())),
    }
}

async fn read_with_timeout<R>(reader: &mut R) -> Result<Frame, TransportError>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(RPC_TIMEOUT, wire::read_frame(reader)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(TransportError::Rejected("handshake timed out".into())),
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
