//! Bridge server demo
//!
//! Publishes a counter onto the `ping` topic once a second and mirrors it
//! to remote peers over TCP. Attach from another process by sending a
//! subscription frame to 127.0.0.1:65432:
//!
//! ```text
//! $START$$SUB$$SPLIT$ping$END$
//! ```
//!
//! Each matching publish then arrives framed as
//! `$START$INT$SPLIT$ping$SPLIT$<4-byte BE value>$END$`, and a
//! `$START$$CLOSE$$END$` frame is sent when the server shuts down.
//!
//! ```sh
//! RUST_LOG=info cargo run --example bridge_server
//! ```

use std::sync::Arc;
use std::time::Duration;

use wirebus::manager::{Manager, NodeFactory, NodeSpec};
use wirebus::node::{FnNode, LoopFlow, LoopPlan};
use wirebus::protocol::Message;
use wirebus::server::ServerConfig;

fn main() -> wirebus::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let factory = NodeFactory::new().with("ping_pub", |_ctx| {
        Arc::new(FnNode::new(|ctx| {
            LoopPlan::<()>::new()
                .while_true(|| true)
                .run(ctx.cancel_flag(), |step| {
                    ctx.publish("ping", Message::Int(step.index as i32));
                    std::thread::sleep(Duration::from_secs(1));
                    Ok(LoopFlow::Continue)
                })
        }))
    });

    let manager = Manager::new().serve(ServerConfig::default());
    manager.start(&factory, vec![NodeSpec::new("pub", "ping_pub")])
}
