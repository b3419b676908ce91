//! Local ping demo
//!
//! A counted publisher stamps the current time onto the `ping` topic; a
//! subscriber measures delivery latency and reports a summary from its
//! `before_close` hook. The publisher closes the whole system once its
//! pings are spent.
//!
//! ```sh
//! RUST_LOG=info cargo run --example ping
//! ```

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use wirebus::manager::{Manager, NodeFactory, NodeSpec};
use wirebus::node::{FnNode, LoopFlow, LoopPlan, NodeArgs};
use wirebus::protocol::Message;

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn main() -> wirebus::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let latencies: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    let sub_latencies = Arc::clone(&latencies);

    let factory = NodeFactory::new()
        .with("ping_pub", |_ctx| {
            Arc::new(FnNode::new(|ctx| {
                // Let the subscriber register first.
                std::thread::sleep(Duration::from_millis(200));

                let pings = ctx.args().get_int("pings").unwrap_or(5) as usize;
                LoopPlan::<()>::new().count(pings).run(ctx.cancel_flag(), |_| {
                    ctx.publish("ping", Message::Float(now_seconds()));
                    std::thread::sleep(Duration::from_millis(100));
                    Ok(LoopFlow::Continue)
                })?;

                ctx.shutdown_all();
                Ok(())
            }))
        })
        .with("ping_sub", move |_ctx| {
            let run_latencies = Arc::clone(&sub_latencies);
            let close_latencies = Arc::clone(&sub_latencies);

            Arc::new(
                FnNode::new(move |ctx| {
                    let latencies = Arc::clone(&run_latencies);
                    ctx.subscribe("ping", move |_, message| {
                        if let Message::Float(sent) = message {
                            let micros = (now_seconds() - sent) * 1_000_000.0;
                            tracing::info!(micros = micros as i64, "Ping received");
                            latencies.lock().unwrap().push(micros);
                        }
                        Ok(())
                    });
                    Ok(())
                })
                .with_before_close(move |_| {
                    let latencies = close_latencies.lock().unwrap();
                    if latencies.is_empty() {
                        return;
                    }
                    let avg = latencies.iter().sum::<f64>() / latencies.len() as f64;
                    let max = latencies.iter().cloned().fold(f64::MIN, f64::max);
                    let min = latencies.iter().cloned().fold(f64::MAX, f64::min);
                    tracing::info!(
                        pings = latencies.len(),
                        avg_micros = avg as i64,
                        max_micros = max as i64,
                        min_micros = min as i64,
                        "Ping summary"
                    );
                }),
            )
        });

    let manager = Manager::new();
    manager.start(
        &factory,
        vec![
            NodeSpec::new("sub", "ping_sub"),
            NodeSpec::new("pub", "ping_pub").args(NodeArgs::new().with("pings", 5i64)),
        ],
    )
}
