//! Remote bridge node
//!
//! A [`BridgeNode`] adapts one accepted stream connection into a transient
//! node on the bus. It runs in the condition-bound loop mode until
//! cancelled or the peer goes away: each pass performs one bounded-timeout
//! receive (a timeout is the cancellation-observability tick, not an
//! error), feeds the frame decoder, and reacts to decoded frames --
//! subscription requests register a callback that mirrors matching topic
//! traffic back onto the connection, inbound data frames are republished
//! on the local bus, and a CLOSE frame or peer reset ends the loop as a
//! normal termination.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::Result;
use crate::node::{LoopFlow, LoopPlan, Node, NodeContext};
use crate::protocol::constants::RECV_BUFFER_SIZE;
use crate::protocol::{Frame, FrameDecoder, Message};
use crate::registry::CallbackError;
use crate::server::ServerConfig;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// One accepted connection, adapted into a node
pub struct BridgeNode {
    peer: SocketAddr,
    reader: Mutex<TcpStream>,
    writer: Arc<Mutex<TcpStream>>,
    /// Cleared on EOF, reset, or write failure; the run loop's condition
    alive: Arc<AtomicBool>,
    decoder: Mutex<FrameDecoder>,
    /// Topics subscribed on the peer's behalf, released when `run` ends
    subscribed: Mutex<Vec<String>>,
    drain_pause: Duration,
}

impl BridgeNode {
    /// Wrap an accepted connection
    ///
    /// Applies the server's socket options: TCP_NODELAY and the bounded
    /// read timeout that keeps cancellation observable.
    pub fn new(stream: TcpStream, config: &ServerConfig) -> std::io::Result<Self> {
        if config.tcp_nodelay {
            stream.set_nodelay(true)?;
        }
        stream.set_read_timeout(Some(config.recv_timeout))?;

        let peer = stream.peer_addr()?;
        let writer = stream.try_clone()?;

        Ok(Self {
            peer,
            reader: Mutex::new(stream),
            writer: Arc::new(Mutex::new(writer)),
            alive: Arc::new(AtomicBool::new(true)),
            decoder: Mutex::new(FrameDecoder::new()),
            subscribed: Mutex::new(Vec::new()),
            drain_pause: config.drain_pause,
        })
    }

    /// Remote peer address
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether the connection is still usable
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Encode `message` and write it to the peer as a data frame
    ///
    /// A message with no wire representation is reported locally and
    /// dropped; the `Ok` return keeps the failure out of the registry's
    /// publish fan-out. A write failure marks the connection dead and is
    /// returned so the registry can report it.
    pub fn send_message(&self, topic: &str, message: Message) -> std::result::Result<(), CallbackError> {
        send_frame(&self.writer, &self.alive, self.peer, topic, message)
    }

    fn pump(&self, ctx: &NodeContext, buf: &mut [u8]) -> Result<LoopFlow> {
        let n = {
            let mut reader = lock(&self.reader);
            match reader.read(buf) {
                Ok(0) => {
                    tracing::debug!(peer = %self.peer, "Peer closed connection");
                    return Ok(LoopFlow::Break);
                }
                Ok(n) => n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    // Cancellation tick.
                    return Ok(LoopFlow::Continue);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset
                            | ErrorKind::ConnectionAborted
                            | ErrorKind::BrokenPipe
                    ) =>
                {
                    tracing::debug!(peer = %self.peer, error = %e, "Peer reset");
                    return Ok(LoopFlow::Break);
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer, error = %e, "Receive failed");
                    return Ok(LoopFlow::Break);
                }
            }
        };

        for frame in lock(&self.decoder).feed(&buf[..n]) {
            match frame {
                Ok(Frame::Close) => {
                    tracing::debug!(peer = %self.peer, "Close frame received");
                    return Ok(LoopFlow::Break);
                }
                Ok(Frame::Subscribe { topic }) => self.handle_subscribe(ctx, &topic),
                Ok(Frame::Data { topic, message }) => ctx.publish(&topic, message),
                Err(e) => {
                    tracing::warn!(peer = %self.peer, error = %e, "Dropped malformed segment");
                }
            }
        }

        Ok(LoopFlow::Continue)
    }

    fn handle_subscribe(&self, ctx: &NodeContext, topic: &str) {
        tracing::info!(peer = %self.peer, topic = %topic, "Remote subscription");
        lock(&self.subscribed).push(topic.to_owned());

        let writer = Arc::clone(&self.writer);
        let alive = Arc::clone(&self.alive);
        let peer = self.peer;
        ctx.subscribe(topic, move |topic, message| {
            send_frame(&writer, &alive, peer, topic, message)
        });
    }
}

impl Node for BridgeNode {
    fn run(&self, ctx: &NodeContext) -> Result<()> {
        tracing::debug!(peer = %self.peer, node = %ctx.name(), "Bridge running");

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let alive = Arc::clone(&self.alive);
        let result = LoopPlan::<()>::new()
            .while_true(move || alive.load(Ordering::Acquire))
            .run(ctx.cancel_flag(), |_| self.pump(ctx, &mut buf));

        // The peer's subscriptions die with the connection.
        for topic in lock(&self.subscribed).drain(..) {
            ctx.unsubscribe(&topic);
        }

        result
    }

    fn before_close(&self, ctx: &NodeContext) {
        if self.is_alive() {
            if let Ok(bytes) = Frame::Close.encode() {
                if let Err(e) = lock(&self.writer).write_all(&bytes) {
                    tracing::debug!(peer = %self.peer, error = %e, "Close notice not sent");
                }
            }
            // Let the peer drain before the socket goes away.
            std::thread::sleep(self.drain_pause);
        }

        let _ = lock(&self.writer).shutdown(Shutdown::Both);
        self.alive.store(false, Ordering::Release);

        tracing::debug!(peer = %self.peer, node = %ctx.name(), "Bridge closed");
    }
}

fn send_frame(
    writer: &Mutex<TcpStream>,
    alive: &AtomicBool,
    peer: SocketAddr,
    topic: &str,
    message: Message,
) -> std::result::Result<(), CallbackError> {
    if !message.is_wire_representable() {
        tracing::warn!(
            peer = %peer,
            topic = %topic,
            "Dropped message with no wire representation"
        );
        return Ok(());
    }

    let frame = Frame::Data {
        topic: topic.to_owned(),
        message,
    };
    // Only local-only payloads fail to encode, and those were filtered
    // above.
    let bytes = frame.encode()?;

    let mut stream = lock(writer);
    if let Err(e) = stream.write_all(&bytes) {
        alive.store(false, Ordering::Release);
        return Err(e.into());
    }

    Ok(())
}
