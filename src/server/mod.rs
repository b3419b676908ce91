//! Listening server
//!
//! Binds once, then accepts connections with a bounded poll so the
//! process-wide close flag is observed promptly instead of blocking in
//! `accept` forever. Every accepted connection becomes a
//! [`BridgeNode`](crate::bridge::BridgeNode) on its own thread, recorded
//! for cleanup: once the close flag is observed the server stops
//! accepting, closes every still-live bridge (each sends its peer a CLOSE
//! frame), and joins their threads before returning.

pub mod config;

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::bridge::BridgeNode;
use crate::error::Result;
use crate::node::{Bus, CancelFlag, Node, NodeArgs, NodeContext};

pub use config::ServerConfig;

/// One accepted connection's (node, thread) pair
struct BridgeHandle {
    name: String,
    node: Arc<BridgeNode>,
    ctx: NodeContext,
    thread: Option<JoinHandle<()>>,
}

impl BridgeHandle {
    fn close(&self) {
        self.node.before_close(&self.ctx);
        self.ctx.cancel_flag().set();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(node = %self.name, "Bridge thread panicked");
            } else {
                tracing::debug!(node = %self.name, "Bridge joined");
            }
        }
    }
}

/// Accept loop turning connections into bridge nodes
pub struct BridgeServer {
    config: ServerConfig,
}

impl BridgeServer {
    /// Server for the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bind, accept until the close flag is raised, then drain
    ///
    /// Failure to bind aborts server-mode startup only; it is returned to
    /// the caller and touches nothing else. Blocks until shutdown
    /// completes, so it normally runs on a dedicated thread.
    pub fn run(&self, bus: Arc<dyn Bus>, close: CancelFlag) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr)?;
        listener.set_nonblocking(true)?;
        tracing::info!(addr = %self.config.bind_addr, "Listening for bridge connections");

        let mut bridges: Vec<BridgeHandle> = Vec::new();
        let mut next_session: u64 = 1;

        while !close.is_set() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    match self.spawn_bridge(stream, peer, &bus, next_session) {
                        Ok(handle) => {
                            bridges.push(handle);
                            next_session += 1;
                        }
                        Err(e) => {
                            tracing::error!(peer = %peer, error = %e, "Failed to start bridge");
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(self.config.accept_poll);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Accept failed");
                    std::thread::sleep(self.config.accept_poll);
                }
            }

            // Reap bridges whose run already ended (peer went away).
            bridges.retain_mut(|bridge| {
                let finished = bridge
                    .thread
                    .as_ref()
                    .map_or(true, JoinHandle::is_finished);
                if finished {
                    bridge.join();
                }
                !finished
            });
        }

        tracing::info!(live = bridges.len(), "Close flag observed, draining bridges");
        for bridge in &bridges {
            bridge.close();
        }
        for bridge in &mut bridges {
            bridge.join();
        }

        Ok(())
    }

    fn spawn_bridge(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        bus: &Arc<dyn Bus>,
        session: u64,
    ) -> Result<BridgeHandle> {
        let node = Arc::new(BridgeNode::new(stream, &self.config)?);
        let name = format!("bridge-{}", session);
        let ctx = NodeContext::new(&name, NodeArgs::new(), Arc::clone(bus));

        let thread = {
            let name = name.clone();
            let node = Arc::clone(&node);
            let ctx = ctx.clone();
            std::thread::Builder::new().name(name.clone()).spawn(move || {
                if let Err(e) = node.run(&ctx) {
                    tracing::error!(node = %name, error = %e, "Bridge run failed");
                }
            })?
        };

        tracing::info!(peer = %peer, node = %name, "Bridge connected");
        Ok(BridgeHandle {
            name,
            node,
            ctx,
            thread: Some(thread),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::time::Duration;

    use super::*;
    use crate::manager::{Manager, NodeFactory, NodeSpec};
    use crate::node::{FnNode, LoopFlow, LoopPlan};
    use crate::protocol::{Frame, Message};

    fn free_port() -> SocketAddr {
        // Grab an ephemeral port, then release it for the server to bind.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    fn fast_config(addr: SocketAddr) -> ServerConfig {
        ServerConfig::with_addr(addr)
            .accept_poll(Duration::from_millis(10))
            .recv_timeout(Duration::from_millis(10))
            .drain_pause(Duration::from_millis(10))
    }

    fn connect_with_retry(addr: SocketAddr) -> TcpStream {
        for _ in 0..200 {
            if let Ok(stream) = TcpStream::connect(addr) {
                return stream;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("server never came up on {}", addr);
    }

    fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
        let mut collected = Vec::new();
        let mut buf = [0u8; 256];
        while !collected.ends_with(b"$END$") {
            let n = stream.read(&mut buf).unwrap();
            assert!(n > 0, "connection closed before a full frame arrived");
            collected.extend_from_slice(&buf[..n]);
        }
        collected
    }

    /// Factory with one node that runs until the whole system is closed.
    fn idle_factory() -> NodeFactory {
        NodeFactory::new().with("idle", |_ctx| {
            Arc::new(FnNode::new(|ctx| {
                LoopPlan::<()>::new()
                    .while_true(|| true)
                    .run(ctx.cancel_flag(), |_| {
                        std::thread::sleep(Duration::from_millis(5));
                        Ok(LoopFlow::Continue)
                    })
            }))
        })
    }

    #[test]
    fn test_remote_subscription_end_to_end() {
        let addr = free_port();
        let manager = Manager::new().serve(fast_config(addr));

        let starter = {
            let manager = manager.clone();
            let factory = idle_factory();
            std::thread::spawn(move || {
                manager.start(&factory, vec![NodeSpec::new("idle", "idle")])
            })
        };

        let mut client = connect_with_retry(addr);
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client
            .write_all(
                &Frame::Subscribe {
                    topic: "ping".to_owned(),
                }
                .encode()
                .unwrap(),
            )
            .unwrap();

        // Wait until the bridge's subscription is visible, then publish.
        for attempt in 0.. {
            if !manager.list_topics().is_empty() {
                break;
            }
            assert!(attempt < 500, "remote subscription never registered");
            std::thread::sleep(Duration::from_millis(10));
        }
        manager.bus().publish("ping", Message::Int(42));

        let bytes = read_frame(&mut client);
        assert_eq!(bytes, b"$START$INT$SPLIT$ping$SPLIT$\x00\x00\x00\x2A$END$");

        manager.close_all_nodes();
        starter.join().unwrap().unwrap();
    }

    #[test]
    fn test_shutdown_drains_two_open_bridges() {
        let addr = free_port();
        let manager = Manager::new().serve(fast_config(addr));

        let starter = {
            let manager = manager.clone();
            let factory = idle_factory();
            std::thread::spawn(move || {
                manager.start(&factory, vec![NodeSpec::new("idle", "idle")])
            })
        };

        let mut first = connect_with_retry(addr);
        let mut second = connect_with_retry(addr);
        first.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        second.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        // Both connections are idle; tell the system to stop. Once the
        // node threads return, the manager raises the close flag and the
        // server drains its bridges.
        std::thread::sleep(Duration::from_millis(50));
        manager.close_all_nodes();
        starter.join().unwrap().unwrap();

        for client in [&mut first, &mut second] {
            let bytes = read_frame(client);
            assert_eq!(bytes, b"$START$$CLOSE$$END$");

            // And the connection is closed behind the notice.
            let mut rest = [0u8; 8];
            assert_eq!(client.read(&mut rest).unwrap(), 0);
        }
    }

    #[test]
    fn test_peer_disconnect_leaves_server_accepting() {
        let addr = free_port();
        let manager = Manager::new().serve(fast_config(addr));

        let starter = {
            let manager = manager.clone();
            let factory = idle_factory();
            std::thread::spawn(move || {
                manager.start(&factory, vec![NodeSpec::new("idle", "idle")])
            })
        };

        // First peer connects and immediately goes away.
        let first = connect_with_retry(addr);
        drop(first);

        // The server keeps serving new peers.
        let mut second = connect_with_retry(addr);
        second.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        second
            .write_all(
                &Frame::Subscribe {
                    topic: "still-up".to_owned(),
                }
                .encode()
                .unwrap(),
            )
            .unwrap();

        for attempt in 0.. {
            if !manager.list_topics().is_empty() {
                break;
            }
            assert!(attempt < 500, "subscription after disconnect never registered");
            std::thread::sleep(Duration::from_millis(10));
        }
        manager.bus().publish("still-up", Message::Str("yes".to_owned()));
        let bytes = read_frame(&mut second);
        assert_eq!(bytes, b"$START$STR$SPLIT$still-up$SPLIT$yes$END$");

        manager.close_all_nodes();
        starter.join().unwrap().unwrap();
    }

    #[test]
    fn test_bind_failure_is_reported() {
        let holder = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = holder.local_addr().unwrap();

        // The port is held, so the server cannot bind it.
        let server = BridgeServer::new(fast_config(addr));
        let manager = Manager::new();
        let result = server.run(manager.bus(), CancelFlag::new());
        assert!(result.is_err());
    }
}
