//! Network tools: HTTP, web search and TCP probes.

pub mod http_fetch;
pub mod ping;
pub mod port_scan;
pub mod web_search;

pub use http_fetch::HttpFetchTool;
pub use ping::NetworkPingTool;
pub use port_scan::PortScanTool;
pub use web_search::WebSearchTool;

use std::net::SocketAddr;
use std::time::Duration;

use crate::core::config::NetworkConfig;
use crate::domains::tools::ToolError;

/// Build the shared HTTP client for outbound requests.
pub(crate) fn http_client(config: &NetworkConfig) -> Result<reqwest::Client, ToolError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| ToolError::internal(format!("Failed to build HTTP client: {}", e)))
}

/// Read a response body, keeping at most `max_bytes`.
///
/// Reads in chunks so an oversized body is never fully buffered. The flag
/// is true when the body was cut short.
pub(crate) async fn read_body(
    mut response: reqwest::Response,
    max_bytes: usize,
) -> Result<(Vec<u8>, bool), ToolError> {
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ToolError::execution_failed(format!("Failed to read body: {}", e)))?
    {
        let room = max_bytes.saturating_sub(body.len());
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body, false))
}

/// Resolve `host:port` to its first address.
pub(crate) async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ToolError> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ToolError::execution_failed(format!("Cannot resolve host '{}': {}", host, e)))?;
    addrs
        .next()
        .ok_or_else(|| ToolError::execution_failed(format!("Cannot resolve host '{}'", host)))
}

/// Convert a number argument to a port.
pub(crate) fn port_number(value: u64) -> Result<u16, ToolError> {
    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ToolError::invalid_arguments(format!(
            "port must be between 1 and 65535, got {}",
            value
        ))),
    }
}
