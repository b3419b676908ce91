//! Manager / supervisor
//!
//! The [`Manager`] owns the topic registry, the set of managed (node,
//! thread) pairs, and at most one listening server. `start` constructs
//! every node through the factory, runs each on a dedicated thread,
//! optionally starts the server thread, and blocks joining node threads;
//! once they have all returned it raises the process-wide close flag and
//! joins the server (which in turn closes and joins its live bridges).
//!
//! Shutdown is cooperative throughout: `close_all_nodes` clears the
//! registry and invokes each node's `close()` (its `before_close` hook,
//! then its cancellation flag) but never joins -- joining stays in
//! `start`'s own join loop, which completes once each `run` observes
//! cancellation and returns.

pub mod factory;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::error::{BusError, Result};
use crate::node::{Bus, CancelFlag, Node, NodeArgs, NodeContext, NodeState, StateCell};
use crate::protocol::Message;
use crate::registry::{SubscriberCallback, SubscriberId, TopicRegistry};
use crate::server::{BridgeServer, ServerConfig};

pub use factory::{NodeConstructor, NodeFactory};

/// Blueprint for one managed node
#[derive(Debug, Clone)]
pub struct NodeSpec {
    /// Unique node name
    pub name: String,
    /// Factory kind key
    pub kind: String,
    /// Constructor arguments
    pub args: NodeArgs,
}

impl NodeSpec {
    /// Spec with an empty argument bag
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: kind.to_owned(),
            args: NodeArgs::new(),
        }
    }

    /// Attach arguments
    pub fn args(mut self, args: NodeArgs) -> Self {
        self.args = args;
        self
    }
}

/// One managed (node, thread) pair
struct ManagedNode {
    name: String,
    node: Arc<dyn Node>,
    ctx: NodeContext,
    state: Arc<StateCell>,
    thread: Option<JoinHandle<()>>,
}

/// Shared supervisor state; the [`Bus`] implementation nodes talk to
pub struct ManagerCore {
    registry: TopicRegistry,
    nodes: Mutex<Vec<ManagedNode>>,
    next_id: AtomicU64,
    process_close: CancelFlag,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl ManagerCore {
    fn new() -> Self {
        Self {
            registry: TopicRegistry::new(),
            nodes: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            process_close: CancelFlag::new(),
        }
    }

    /// Clear the registry and request close of every managed node
    ///
    /// Joining is not done here; `start`'s join loop collects the threads
    /// once their loops observe cancellation.
    fn close_all_nodes(&self) {
        tracing::info!("Closing all nodes");
        self.registry.clear();

        let snapshot: Vec<(String, Arc<dyn Node>, NodeContext, Arc<StateCell>)> = {
            let nodes = lock(&self.nodes);
            nodes
                .iter()
                .map(|n| {
                    (
                        n.name.clone(),
                        Arc::clone(&n.node),
                        n.ctx.clone(),
                        Arc::clone(&n.state),
                    )
                })
                .collect()
        };

        for (name, node, ctx, state) in snapshot {
            tracing::debug!(node = %name, "Requesting close");
            // before_close runs synchronously, before the flag is raised.
            node.before_close(&ctx);
            ctx.cancel_flag().set();
            state.request_close();
        }
    }
}

impl Bus for ManagerCore {
    fn publish(&self, topic: &str, message: Message) {
        self.registry.publish(topic, message);
    }

    fn subscribe(&self, topic: &str, id: SubscriberId, name: &str, callback: SubscriberCallback) {
        self.registry.subscribe(topic, id, name, callback);
    }

    fn unsubscribe(&self, topic: &str, id: SubscriberId) {
        self.registry.unsubscribe(topic, id);
    }

    fn allocate_id(&self) -> SubscriberId {
        SubscriberId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn shutdown_all(&self) {
        self.close_all_nodes();
    }
}

/// Supervisor for a set of nodes and an optional listening server
#[derive(Clone)]
pub struct Manager {
    core: Arc<ManagerCore>,
    server: Option<ServerConfig>,
}

impl Manager {
    /// Manager with no listening server
    pub fn new() -> Self {
        Self {
            core: Arc::new(ManagerCore::new()),
            server: None,
        }
    }

    /// Enable server mode with the given configuration
    pub fn serve(mut self, config: ServerConfig) -> Self {
        self.server = Some(config);
        self
    }

    /// The bus handle nodes run against, for embedding scenarios
    pub fn bus(&self) -> Arc<dyn Bus> {
        Arc::clone(&self.core) as Arc<dyn Bus>
    }

    /// Construct, run, and join every node in `specs`
    ///
    /// Blocks until all node threads have returned, then raises the
    /// process-wide close flag and joins the server thread (when server
    /// mode is enabled). An unknown node kind aborts before any thread
    /// starts.
    pub fn start(&self, factory: &NodeFactory, specs: Vec<NodeSpec>) -> Result<()> {
        // Construct every node first so a bad spec fails the whole start.
        let mut created = Vec::with_capacity(specs.len());
        for spec in specs {
            let constructor = factory
                .resolve(&spec.kind)
                .ok_or_else(|| BusError::UnknownNodeKind(spec.kind.clone()))?;
            let ctx = NodeContext::new(&spec.name, spec.args.clone(), self.bus());
            let node = constructor(&ctx);
            tracing::debug!(node = %spec.name, kind = %spec.kind, "Node created");
            created.push((spec.name, node, ctx));
        }

        // Record and start one thread per node.
        for (name, node, ctx) in created {
            let state = Arc::new(StateCell::new());
            let thread = {
                let name = name.clone();
                let node = Arc::clone(&node);
                let ctx = ctx.clone();
                let state = Arc::clone(&state);
                std::thread::Builder::new().name(name.clone()).spawn(move || {
                    state.mark_running();
                    tracing::info!(node = %name, "Node started");
                    if let Err(e) = node.run(&ctx) {
                        tracing::error!(node = %name, error = %e, "Node run failed");
                    }
                    state.mark_closed();
                    tracing::info!(node = %name, "Node stopped");
                })?
            };

            lock(&self.core.nodes).push(ManagedNode {
                name,
                node,
                ctx,
                state,
                thread: Some(thread),
            });
        }

        // Server mode: one dedicated accept-loop thread.
        let server_thread = match &self.server {
            Some(config) => {
                let server = BridgeServer::new(config.clone());
                let bus = self.bus();
                let close = self.core.process_close.clone();
                Some(
                    std::thread::Builder::new()
                        .name("bridge-server".to_owned())
                        .spawn(move || {
                            if let Err(e) = server.run(bus, close) {
                                tracing::error!(error = %e, "Listening server failed");
                            }
                        })?,
                )
            }
            None => None,
        };

        // Join every node thread. Handles are taken under the lock one at
        // a time so close_all_nodes stays callable mid-join.
        let mut index = 0;
        loop {
            let joinable = {
                let mut nodes = lock(&self.core.nodes);
                match nodes.get_mut(index) {
                    Some(node) => node
                        .thread
                        .take()
                        .map(|t| (node.name.clone(), Arc::clone(&node.state), t)),
                    None => break,
                }
            };

            if let Some((name, state, thread)) = joinable {
                if thread.join().is_err() {
                    tracing::error!(node = %name, "Node thread panicked");
                    state.mark_closed();
                } else {
                    tracing::info!(node = %name, "Node joined");
                }
            }
            index += 1;
        }

        // All nodes are done: stop accepting and drain the server.
        self.core.process_close.set();
        if let Some(thread) = server_thread {
            if thread.join().is_err() {
                tracing::error!("Server thread panicked");
            }
        }

        tracing::info!("All nodes stopped");
        Ok(())
    }

    /// Administrative command: clear the registry and request close of
    /// every managed node
    pub fn close_all_nodes(&self) {
        self.core.close_all_nodes();
    }

    /// Administrative query: every managed node with its current state
    pub fn list_nodes(&self) -> Vec<(String, NodeState)> {
        lock(&self.core.nodes)
            .iter()
            .map(|n| (n.name.clone(), n.state.get()))
            .collect()
    }

    /// Administrative query: every known topic with its subscriber names
    pub fn list_topics(&self) -> Vec<(String, Vec<String>)> {
        self.core.registry.topics()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::node::{FnNode, LoopFlow, LoopPlan};

    #[test]
    fn test_local_ping_publish_subscribe() {
        // Scenario: one publisher, one subscriber, ten pings; every
        // publish is observed exactly once within the same call.
        let received: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        let factory = NodeFactory::new()
            .with("publisher", |_ctx| {
                Arc::new(FnNode::new(|ctx| {
                    // Give the subscriber node time to register.
                    std::thread::sleep(Duration::from_millis(100));
                    let pings = ctx.args().get_int("pings").unwrap_or(0) as usize;
                    LoopPlan::<()>::new().count(pings).run(ctx.cancel_flag(), |step| {
                        ctx.publish("ping", Message::Int(step.index as i32));
                        Ok(LoopFlow::Continue)
                    })
                }))
            })
            .with("subscriber", move |_ctx| {
                let sink = Arc::clone(&sink);
                Arc::new(FnNode::new(move |ctx| {
                    let sink = Arc::clone(&sink);
                    ctx.subscribe("ping", move |_, message| {
                        sink.lock().unwrap().push(message);
                        Ok(())
                    });
                    Ok(())
                }))
            });

        let manager = Manager::new();
        manager
            .start(
                &factory,
                vec![
                    // Subscriber first so its registration precedes the
                    // publisher's first message.
                    NodeSpec::new("sub", "subscriber"),
                    NodeSpec::new("pub", "publisher")
                        .args(NodeArgs::new().with("pings", 10i64)),
                ],
            )
            .unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 10);
        assert_eq!(received[0], Message::Int(0));
        assert_eq!(received[9], Message::Int(9));

        for (_, state) in manager.list_nodes() {
            assert_eq!(state, NodeState::Closed);
        }
    }

    #[test]
    fn test_unknown_node_kind_aborts_start() {
        let manager = Manager::new();
        let result = manager.start(&NodeFactory::new(), vec![NodeSpec::new("x", "ghost")]);

        assert!(matches!(result, Err(BusError::UnknownNodeKind(kind)) if kind == "ghost"));
        assert!(manager.list_nodes().is_empty());
    }

    #[test]
    fn test_node_requests_shutdown_of_all_nodes() {
        // A publisher that closes the whole system once its work is done,
        // alongside a node that would otherwise run forever.
        let hook_runs = Arc::new(AtomicUsize::new(0));
        let hooks = Arc::clone(&hook_runs);

        let factory = NodeFactory::new()
            .with("finisher", |_ctx| {
                Arc::new(FnNode::new(|ctx| {
                    ctx.publish("work", Message::Str("done".to_owned()));
                    ctx.shutdown_all();
                    Ok(())
                }))
            })
            .with("forever", move |_ctx| {
                let hooks = Arc::clone(&hooks);
                Arc::new(
                    FnNode::new(|ctx| {
                        LoopPlan::<()>::new()
                            .while_true(|| true)
                            .run(ctx.cancel_flag(), |_| {
                                std::thread::sleep(Duration::from_millis(5));
                                Ok(LoopFlow::Continue)
                            })
                    })
                    .with_before_close(move |_| {
                        hooks.fetch_add(1, Ordering::SeqCst);
                    }),
                )
            });

        let manager = Manager::new();
        manager
            .start(
                &factory,
                vec![
                    NodeSpec::new("loop", "forever"),
                    NodeSpec::new("pub", "finisher"),
                ],
            )
            .unwrap();

        assert_eq!(hook_runs.load(Ordering::SeqCst), 1);
        assert!(manager.list_topics().is_empty());
        for (_, state) in manager.list_nodes() {
            assert_eq!(state, NodeState::Closed);
        }
    }

    #[test]
    fn test_repeated_close_reruns_unguarded_hook() {
        // close() does not guard before_close against repetition; that is
        // the node author's obligation.
        let unguarded_runs = Arc::new(AtomicUsize::new(0));
        let guarded_runs = Arc::new(AtomicUsize::new(0));

        let unguarded = Arc::clone(&unguarded_runs);
        let guarded = Arc::clone(&guarded_runs);
        let guard = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let factory = NodeFactory::new()
            .with("unguarded", move |_ctx| {
                let runs = Arc::clone(&unguarded);
                Arc::new(
                    FnNode::new(|ctx| {
                        LoopPlan::<()>::new()
                            .while_true(|| true)
                            .run(ctx.cancel_flag(), |_| {
                                std::thread::sleep(Duration::from_millis(5));
                                Ok(LoopFlow::Continue)
                            })
                    })
                    .with_before_close(move |_| {
                        runs.fetch_add(1, Ordering::SeqCst);
                    }),
                )
            })
            .with("guarded", move |_ctx| {
                let runs = Arc::clone(&guarded);
                let guard = Arc::clone(&guard);
                Arc::new(
                    FnNode::new(|ctx| {
                        LoopPlan::<()>::new()
                            .while_true(|| true)
                            .run(ctx.cancel_flag(), |_| {
                                std::thread::sleep(Duration::from_millis(5));
                                Ok(LoopFlow::Continue)
                            })
                    })
                    .with_before_close(move |_| {
                        if !guard.swap(true, Ordering::SeqCst) {
                            runs.fetch_add(1, Ordering::SeqCst);
                        }
                    }),
                )
            });

        let manager = Manager::new();
        let starter = {
            let manager = manager.clone();
            let factory_specs = vec![
                NodeSpec::new("a", "unguarded"),
                NodeSpec::new("b", "guarded"),
            ];
            std::thread::spawn(move || manager.start(&factory, factory_specs))
        };

        // Wait for both nodes to be running.
        for attempt in 0.. {
            let nodes = manager.list_nodes();
            if nodes.len() == 2 && nodes.iter().all(|(_, s)| *s != NodeState::Created) {
                break;
            }
            assert!(attempt < 1000, "nodes never started");
            std::thread::sleep(Duration::from_millis(5));
        }

        manager.close_all_nodes();
        manager.close_all_nodes();
        starter.join().unwrap().unwrap();

        assert_eq!(unguarded_runs.load(Ordering::SeqCst), 2);
        assert_eq!(guarded_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_admin_views() {
        let factory = NodeFactory::new().with("listener", |_ctx| {
            Arc::new(FnNode::new(|ctx| {
                ctx.subscribe("alpha", |_, _| Ok(()));
                ctx.subscribe("beta", |_, _| Ok(()));
                LoopPlan::<()>::new()
                    .while_true(|| true)
                    .run(ctx.cancel_flag(), |_| {
                        std::thread::sleep(Duration::from_millis(5));
                        Ok(LoopFlow::Continue)
                    })
            }))
        });

        let manager = Manager::new();
        let starter = {
            let manager = manager.clone();
            std::thread::spawn(move || {
                manager.start(&factory, vec![NodeSpec::new("ears", "listener")])
            })
        };

        for attempt in 0.. {
            let topics = manager.list_topics();
            if topics.len() == 2 {
                assert_eq!(
                    topics,
                    vec![
                        ("alpha".to_owned(), vec!["ears".to_owned()]),
                        ("beta".to_owned(), vec!["ears".to_owned()]),
                    ]
                );
                break;
            }
            assert!(attempt < 1000, "subscriptions never appeared");
            std::thread::sleep(Duration::from_millis(5));
        }

        let nodes = manager.list_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].0, "ears");

        manager.close_all_nodes();
        starter.join().unwrap().unwrap();
        assert_eq!(manager.list_nodes()[0].1, NodeState::Closed);
    }
}
