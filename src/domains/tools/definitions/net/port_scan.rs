//! Port scan tool definition.

use async_trait::async_trait;
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{info, instrument};

use super::{port_number, resolve};
use crate::core::config::Config;
use crate::domains::tools::{
    ArgumentSet, HandlerResult, ParameterSpec, ToolContext, ToolDefinition, ToolError,
    ToolHandler,
};

const MAX_CONCURRENCY: u64 = 512;

/// Port scan tool - reports which TCP ports accept connections.
pub struct PortScanTool {
    timeout: Duration,
    max_ports: usize,
}

impl PortScanTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "port_scan";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Scan TCP ports on a host and list the open ones. Ports are given as a comma list with optional ranges, e.g. '22,80,8000-8010'.";

    pub fn new(config: &Config) -> Self {
        Self {
            timeout: Duration::from_millis(config.network.probe_timeout_ms),
            max_ports: config.network.max_scan_ports,
        }
    }

    /// Build the registry entry for this tool.
    pub fn definition(config: Arc<Config>) -> ToolDefinition {
        ToolDefinition::new(Self::NAME, Self::DESCRIPTION, Self::new(&config)).params([
            ParameterSpec::string("host")
                .required()
                .describe("Host name or IP address"),
            ParameterSpec::string("ports")
                .required()
                .describe("Ports and inclusive ranges, e.g. '22,80,8000-8010'"),
            ParameterSpec::number("concurrency")
                .describe("How many ports to probe at once")
                .with_default(64.0),
        ])
    }

    async fn scan(&self, addr: SocketAddr, ports: &[u16], concurrency: usize) -> Vec<u16> {
        let timeout = self.timeout;
        let mut open: Vec<u16> = futures::stream::iter(ports.iter().copied())
            .map(|port| async move {
                let target = SocketAddr::new(addr.ip(), port);
                match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
                    Ok(Ok(_)) => Some(port),
                    _ => None,
                }
            })
            .buffer_unordered(concurrency)
            .filter_map(|open| async move { open })
            .collect()
            .await;
        open.sort_unstable();
        open
    }
}

/// Parse `"22,80,8000-8010"` into a sorted, de-duplicated port list.
pub fn parse_ports(spec: &str, max_ports: usize) -> Result<Vec<u16>, ToolError> {
    let invalid = |part: &str| ToolError::invalid_arguments(format!("Invalid port spec '{}'", part));
    let parse_one = |raw: &str| -> Result<u16, ToolError> {
        let value: u64 = raw.trim().parse().map_err(|_| invalid(raw))?;
        port_number(value)
    };

    let mut ports = Vec::new();
    for part in spec.split(',').map(str::trim) {
        if part.is_empty() {
            continue;
        }
        match part.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse_one(start)?, parse_one(end)?);
                if start > end {
                    return Err(invalid(part));
                }
                if ports.len() + usize::from(end - start) + 1 > max_ports {
                    return Err(too_many(max_ports));
                }
                ports.extend(start..=end);
            }
            None => ports.push(parse_one(part)?),
        }
    }

    ports.sort_unstable();
    ports.dedup();
    if ports.is_empty() {
        return Err(ToolError::invalid_arguments("No ports given"));
    }
    if ports.len() > max_ports {
        return Err(too_many(max_ports));
    }
    Ok(ports)
}

fn too_many(max_ports: usize) -> ToolError {
    ToolError::invalid_arguments(format!("Too many ports: at most {} per scan", max_ports))
}

#[async_trait]
impl ToolHandler for PortScanTool {
    #[instrument(name = "port_scan", skip_all)]
    async fn call(&self, args: ArgumentSet, ctx: ToolContext) -> HandlerResult {
        let host = args.require_str("host")?;
        let ports = parse_ports(args.require_str("ports")?, self.max_ports)?;
        let concurrency = args
            .unsigned("concurrency")?
            .unwrap_or(64)
            .clamp(1, MAX_CONCURRENCY) as usize;

        let addr = ctx.run(resolve(host, ports[0])).await??;
        let open = ctx.run(self.scan(addr, &ports, concurrency)).await?;

        info!(
            "Scanned {} ports on {} ({}): {} open",
            ports.len(),
            host,
            addr.ip(),
            open.len()
        );

        let mut output = format!(
            "Scanned {} ports on {} ({})\n",
            ports.len(),
            host,
            addr.ip()
        );
        if open.is_empty() {
            output.push_str("No open ports found");
        } else {
            output.push_str(&format!("Open ports ({}):\n", open.len()));
            for port in open {
                output.push_str(&format!("  {}/tcp open\n", port));
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::ArgumentValue;
    use tokio::net::TcpListener;

    fn args(pairs: &[(&str, ArgumentValue)]) -> ArgumentSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parse_ports() {
        assert_eq!(parse_ports("22,80,8000-8003", 100).unwrap(), vec![22, 80, 8000, 8001, 8002, 8003]);
        assert_eq!(parse_ports(" 443 , 80,80 ", 100).unwrap(), vec![80, 443]);
        assert!(parse_ports("80-22", 100).is_err());
        assert!(parse_ports("http", 100).is_err());
        assert!(parse_ports("0", 100).is_err());
        assert!(parse_ports("70000", 100).is_err());
        assert!(parse_ports("", 100).is_err());
    }

    #[test]
    fn test_parse_ports_cap() {
        let err = parse_ports("1-65535", 1024).unwrap_err();
        assert!(err.to_string().contains("at most 1024"));
        assert_eq!(parse_ports("1-1024", 1024).unwrap().len(), 1024);
    }

    #[tokio::test]
    async fn test_scan_finds_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        // A port that was just freed is very unlikely to be open
        let closed_port = {
            let tmp = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            tmp.local_addr().unwrap().port()
        };

        let tool = PortScanTool::new(&Config::default());
        let text = tool
            .call(
                args(&[
                    ("host", "127.0.0.1".into()),
                    ("ports", format!("{},{}", closed_port, open_port).into()),
                ]),
                ToolContext::new(),
            )
            .await
            .unwrap();

        assert!(text.contains("Scanned 2 ports"));
        assert!(text.contains(&format!("{}/tcp open", open_port)));
        assert!(!text.contains(&format!("{}/tcp open", closed_port)));
    }

    #[tokio::test]
    async fn test_cancelled_scan() {
        let tool = PortScanTool::new(&Config::default());
        let ctx = ToolContext::new();
        ctx.cancel();
        let err = tool
            .call(
                args(&[("host", "127.0.0.1".into()), ("ports", "1-100".into())]),
                ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Cancelled));
    }
}
