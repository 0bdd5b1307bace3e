//! Network ping tool definition.
//!
//! ICMP echo needs raw sockets, so reachability is measured with TCP
//! connects instead. A refused connection still proves the host answered.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use super::{port_number, resolve};
use crate::core::config::Config;
use crate::domains::tools::{
    ArgumentSet, HandlerResult, ParameterSpec, ToolContext, ToolDefinition, ToolHandler,
};

const MAX_COUNT: u64 = 20;
const INTERVAL: Duration = Duration::from_millis(200);

/// Network ping tool - probes a host with repeated TCP connects.
pub struct NetworkPingTool {
    timeout: Duration,
}

impl NetworkPingTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "network_ping";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Check whether a host is reachable by timing TCP connections to one of its ports, and report latency statistics.";

    pub fn new(config: &Config) -> Self {
        Self {
            timeout: Duration::from_millis(config.network.probe_timeout_ms),
        }
    }

    /// Build the registry entry for this tool.
    pub fn definition(config: Arc<Config>) -> ToolDefinition {
        ToolDefinition::new(Self::NAME, Self::DESCRIPTION, Self::new(&config)).params([
            ParameterSpec::string("host")
                .required()
                .describe("Host name or IP address"),
            ParameterSpec::number("port")
                .describe("TCP port to connect to")
                .with_default(80.0),
            ParameterSpec::number("count")
                .describe("Number of probes (1-20)")
                .with_default(4.0),
        ])
    }

    /// One probe. `Some(latency)` when the host answered at all.
    async fn probe(&self, addr: SocketAddr) -> Option<Duration> {
        let start = Instant::now();
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => Some(start.elapsed()),
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => Some(start.elapsed()),
            Ok(Err(e)) => {
                debug!("Probe to {} failed: {}", addr, e);
                None
            }
            Err(_) => None,
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Render per-probe lines followed by the summary block.
fn render_report(host: &str, addr: SocketAddr, samples: &[Option<Duration>]) -> String {
    let mut output = format!("PING {} ({}) via TCP port {}\n", host, addr.ip(), addr.port());

    for (seq, sample) in samples.iter().enumerate() {
        match sample {
            Some(rtt) => output.push_str(&format!(
                "seq={} reply from {}: time={:.2} ms\n",
                seq + 1,
                addr,
                millis(*rtt)
            )),
            None => output.push_str(&format!("seq={} timeout\n", seq + 1)),
        }
    }

    let sent = samples.len();
    let latencies: Vec<f64> = samples.iter().flatten().map(|d| millis(*d)).collect();
    let received = latencies.len();
    let loss = if sent == 0 {
        0.0
    } else {
        (sent - received) as f64 * 100.0 / sent as f64
    };

    output.push_str(&format!(
        "\n--- {} ping statistics ---\n{} probes sent, {} received, {:.0}% loss\n",
        host, sent, received, loss
    ));

    if received > 0 {
        let min = latencies.iter().copied().fold(f64::INFINITY, f64::min);
        let max = latencies.iter().copied().fold(0.0, f64::max);
        let avg = latencies.iter().sum::<f64>() / received as f64;
        output.push_str(&format!(
            "rtt min/avg/max = {:.2}/{:.2}/{:.2} ms\n",
            min, avg, max
        ));
    } else {
        output.push_str("Host unreachable\n");
    }

    output
}

#[async_trait]
impl ToolHandler for NetworkPingTool {
    #[instrument(name = "network_ping", skip_all)]
    async fn call(&self, args: ArgumentSet, ctx: ToolContext) -> HandlerResult {
        let host = args.require_str("host")?;
        let port = port_number(args.unsigned("port")?.unwrap_or(80))?;
        let count = args.unsigned("count")?.unwrap_or(4).clamp(1, MAX_COUNT);

        let addr = ctx.run(resolve(host, port)).await??;

        let mut samples = Vec::with_capacity(count as usize);
        for i in 0..count {
            if i > 0 {
                ctx.run(tokio::time::sleep(INTERVAL)).await?;
            }
            samples.push(ctx.run(self.probe(addr)).await?);
        }

        info!(
            "Pinged {} ({}): {}/{} replies",
            host,
            addr,
            samples.iter().flatten().count(),
            count
        );
        Ok(render_report(host, addr, &samples))
    }
}
