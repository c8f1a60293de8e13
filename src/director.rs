// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection director: owns TCP sockets, delivers inbound frames and actor
//! lifecycle events to a subscriber.
//!
//! One task per peer connection, driven by a `tokio::select!` over inbound
//! frames, outbound bytes queued on an `mpsc` channel, and an idle timer.
//! Lifecycle transitions (`ActorAdded`/`ActorRemoved`/`ActorError`) are
//! reported back to the subscriber so the request controller can match
//! responses and abort on connection loss without touching sockets itself.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::codec::reassembler::FrameCodec;
use crate::error::TransportError;

/// Events a director reports to its subscriber.
#[derive(Debug)]
pub enum ActorEvent {
    /// A connection to/from `peer` is now usable.
    ActorAdded { peer: SocketAddr },
    /// `peer`'s connection closed cleanly.
    ActorRemoved { peer: SocketAddr },
    /// `peer`'s connection failed.
    ActorError {
        peer: SocketAddr,
        error: TransportError,
    },
    /// A whole frame arrived from `peer`.
    Inbound { peer: SocketAddr, frame: Vec<u8> },
}

/// Contract a [`crate::controller::RequestController`] (client side) or a
/// [`crate::server::ModbusServer`] (server side) needs from whatever owns
/// the sockets.
pub trait ConnectionDirector: Send + Sync {
    /// Queue `bytes` for transmission to `destination`, opening a connection
    /// on demand.
    fn send(&self, destination: SocketAddr, bytes: Vec<u8>);

    /// Force-close the connection to `peer`, if any.
    fn disconnect(&self, peer: SocketAddr);
}

struct PeerHandle {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

/// A director built on `tokio::net::TcpStream`, one task per peer.
pub struct TcpDirector {
    peers: std::sync::Mutex<HashMap<SocketAddr, PeerHandle>>,
    events: mpsc::UnboundedSender<ActorEvent>,
    connect_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
}

impl TcpDirector {
    /// Create a director that reports actor/inbound events on `events`.
    #[must_use]
    pub fn new(
        events: mpsc::UnboundedSender<ActorEvent>,
        connect_timeout: Option<Duration>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        TcpDirector {
            peers: std::sync::Mutex::new(HashMap::new()),
            events,
            connect_timeout,
            idle_timeout,
        }
    }

    /// Accept inbound connections on `listener` forever, spawning one task
    /// per accepted peer. Used by the server side.
    pub async fn serve(self: std::sync::Arc<Self>, listener: TcpListener) {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    warn!("accept failed: {err}");
                    continue;
                }
            };
            self.clone().spawn_peer(peer, stream);
        }
    }

    fn spawn_peer(self: std::sync::Arc<Self>, peer: SocketAddr, stream: TcpStream) {
        let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.peers
            .lock()
            .unwrap()
            .insert(peer, PeerHandle { outbound: tx });
        let idle_timeout = self.idle_timeout;
        let events = self.events.clone();
        let _ = events.send(ActorEvent::ActorAdded { peer });
        tokio::spawn(async move {
            run_peer(peer, stream, rx, idle_timeout, events.clone()).await;
        });
    }

    async fn connect_peer(self: &std::sync::Arc<Self>, peer: SocketAddr) {
        let connect = TcpStream::connect(peer);
        let stream = match self.connect_timeout {
            Some(d) => match timeout(d, connect).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(err)) => {
                    let _ = self.events.send(ActorEvent::ActorError {
                        peer,
                        error: TransportError::Io(err.to_string()),
                    });
                    return;
                }
                Err(_) => {
                    let _ = self.events.send(ActorEvent::ActorError {
                        peer,
                        error: TransportError::ConnectTimeout(d),
                    });
                    return;
                }
            },
            None => match connect.await {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = self.events.send(ActorEvent::ActorError {
                        peer,
                        error: TransportError::Io(err.to_string()),
                    });
                    return;
                }
            },
        };
        self.clone_arc().spawn_peer(peer, stream);
    }

    fn clone_arc(self: &std::sync::Arc<Self>) -> std::sync::Arc<Self> {
        std::sync::Arc::clone(self)
    }
}

async fn run_peer(
    peer: SocketAddr,
    stream: TcpStream,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    idle_timeout: Option<Duration>,
    events: mpsc::UnboundedSender<ActorEvent>,
) {
    let mut framed = Framed::new(stream, FrameCodec);
    loop {
        let idle = async {
            match idle_timeout {
                Some(d) => {
                    tokio::time::sleep(d).await;
                    true
                }
                None => futures::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            frame = framed.next() => {
                match frame {
                    Some(Ok(bytes)) => {
                        let _ = events.send(ActorEvent::Inbound { peer, frame: bytes });
                    }
                    Some(Err(err)) => {
                        let _ = events.send(ActorEvent::ActorError {
                            peer,
                            error: TransportError::Io(err.to_string()),
                        });
                        return;
                    }
                    None => {
                        let _ = events.send(ActorEvent::ActorRemoved { peer });
                        return;
                    }
                }
            }
            outgoing = outbound.recv() => {
                match outgoing {
                    Some(bytes) => {
                        if let Err(err) = framed.send(bytes).await {
                            let _ = events.send(ActorEvent::ActorError {
                                peer,
                                error: TransportError::Io(err.to_string()),
                            });
                            return;
                        }
                    }
                    None => return,
                }
            }
            _timed_out = idle => {
                if let Some(d) = idle_timeout {
                    let _ = events.send(ActorEvent::ActorError {
                        peer,
                        error: TransportError::IdleTimeout(d),
                    });
                }
                return;
            }
        }
    }
}

impl ConnectionDirector for std::sync::Arc<TcpDirector> {
    fn send(&self, destination: SocketAddr, bytes: Vec<u8>) {
        let existing = self
            .peers
            .lock()
            .unwrap()
            .get(&destination)
            .map(|h| h.outbound.clone());
        // `run_peer` having already exited (connection lost) leaves a stale
        // sender behind until `ActorError`/`ActorRemoved` is drained by the
        // controller; detect that here by the send failing, rather than
        // dropping `bytes` on the floor forever.
        let bytes = match existing {
            Some(tx) => match tx.send(bytes) {
                Ok(()) => return,
                Err(err) => err.0,
            },
            None => bytes,
        };
        self.peers.lock().unwrap().remove(&destination);
        let this = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            this.connect_peer(destination).await;
            if let Some(tx) = this
                .peers
                .lock()
                .unwrap()
                .get(&destination)
                .map(|h| h.outbound.clone())
            {
                let _ = tx.send(bytes);
            }
        });
    }

    fn disconnect(&self, peer: SocketAddr) {
        self.peers.lock().unwrap().remove(&peer);
    }
}
