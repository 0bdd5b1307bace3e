//! HTTP fetch tool definition.
//!
//! Performs a single HTTP request and returns the status line, a few
//! response headers and the (possibly truncated) body.

use async_trait::async_trait;
use reqwest::{Method, Url};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{http_client, read_body};
use crate::core::config::Config;
use crate::domains::tools::{
    ArgumentSet, HandlerResult, ParameterSpec, ToolContext, ToolDefinition, ToolError,
    ToolHandler,
};

/// HTTP fetch tool - makes a request to a URL.
pub struct HttpFetchTool {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetchTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "http_fetch";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Make an HTTP request to a URL and return the status, content type and body. Non-2xx responses are reported, not treated as errors.";

    const METHODS: [&'static str; 5] = ["GET", "POST", "PUT", "DELETE", "HEAD"];

    pub fn new(config: &Config) -> Result<Self, ToolError> {
        Ok(Self {
            client: http_client(&config.network)?,
            max_bytes: config.network.http_max_bytes,
        })
    }

    /// Build the registry entry for this tool.
    pub fn definition(config: Arc<Config>) -> Result<ToolDefinition, ToolError> {
        Ok(
            ToolDefinition::new(Self::NAME, Self::DESCRIPTION, Self::new(&config)?).params([
                ParameterSpec::string("url")
                    .required()
                    .describe("The http:// or https:// URL to request"),
                ParameterSpec::string("method")
                    .describe("HTTP method")
                    .one_of(Self::METHODS)
                    .with_default("GET"),
                ParameterSpec::string("body").describe("Request body for POST or PUT"),
                ParameterSpec::string("content_type")
                    .describe("Content-Type header sent with the body")
                    .with_default("application/json"),
            ]),
        )
    }

    async fn fetch(
        &self,
        url: Url,
        method: Method,
        body: Option<&str>,
        content_type: &str,
    ) -> HandlerResult {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::execution_failed(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        let response_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        debug!("{} {} -> {}", method, url, status);

        let (body, truncated) = read_body(response, self.max_bytes).await?;

        let mut output = format!(
            "{} {}\nStatus: {}\nContent-Type: {}\n",
            method, url, status, response_type
        );
        if !status.is_success() {
            output.push_str("Note: server returned a non-success status\n");
        }
        if !body.is_empty() {
            output.push('\n');
            output.push_str(&String::from_utf8_lossy(&body));
        }
        if truncated {
            output.push_str(&format!("\n\n[truncated at {} bytes]", self.max_bytes));
        }

        info!("Fetched {} ({}, {} bytes)", url, status, body.len());
        Ok(output)
    }
}

/// Parse and check a URL argument.
fn parse_url(raw: &str) -> Result<Url, ToolError> {
    let url = Url::parse(raw)
        .map_err(|e| ToolError::invalid_arguments(format!("Invalid URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ToolError::invalid_arguments(format!(
            "Unsupported URL scheme '{}': only http and https are allowed",
            other
        ))),
    }
}

#[async_trait]
impl ToolHandler for HttpFetchTool {
    #[instrument(name = "http_fetch", skip_all)]
    async fn call(&self, args: ArgumentSet, ctx: ToolContext) -> HandlerResult {
        let url = parse_url(args.require_str("url")?)?;
        let method = Method::from_bytes(args.str("method").unwrap_or("GET").as_bytes())
            .map_err(|e| ToolError::invalid_arguments(e.to_string()))?;
        let content_type = args.str("content_type").unwrap_or("application/json");

        ctx.run(self.fetch(url, method, args.str("body"), content_type))
            .await?
    }
}
