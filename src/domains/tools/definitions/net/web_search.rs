//! Web search tool definition.
//!
//! Uses a DuckDuckGo-style instant answer endpoint, which returns JSON and
//! needs no scraping. Only the abstract and related topics are used.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};

use super::{http_client, read_body};
use crate::core::config::Config;
use crate::domains::tools::{
    ArgumentSet, HandlerResult, ParameterSpec, ToolContext, ToolDefinition, ToolError,
    ToolHandler,
};

const MAX_RESULTS: u64 = 50;

/// Web search tool - looks up a query and returns titled links.
pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_bytes: usize,
}

/// Instant answer payload. Field names follow the upstream API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InstantAnswer {
    heading: String,
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Entry {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

/// One formatted hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
}

impl WebSearchTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "web_search";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str =
        "Search the web for a query and return a numbered list of titles and URLs.";

    pub fn new(config: &Config) -> Result<Self, ToolError> {
        Ok(Self {
            client: http_client(&config.network)?,
            endpoint: config.network.search_endpoint.clone(),
            api_key: config.credentials.search_api_key.clone(),
            max_bytes: config.network.http_max_bytes,
        })
    }

    /// Build the registry entry for this tool.
    pub fn definition(config: Arc<Config>) -> Result<ToolDefinition, ToolError> {
        Ok(
            ToolDefinition::new(Self::NAME, Self::DESCRIPTION, Self::new(&config)?).params([
                ParameterSpec::string("query")
                    .required()
                    .describe("What to search for"),
                ParameterSpec::number("limit")
                    .describe("Maximum number of results (1-50)")
                    .with_default(10.0),
            ]),
        )
    }

    fn request_url(&self, query: &str) -> Result<String, ToolError> {
        let mut params = vec![
            ("q", query),
            ("format", "json"),
            ("no_html", "1"),
            ("skip_disambig", "1"),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }
        let encoded = serde_urlencoded::to_string(&params)
            .map_err(|e| ToolError::internal(format!("Failed to encode query: {}", e)))?;
        Ok(format!("{}?{}", self.endpoint, encoded))
    }

    async fn search(&self, query: &str) -> Result<InstantAnswer, ToolError> {
        let response = self
            .client
            .get(self.request_url(query)?)
            .send()
            .await
            .map_err(|e| ToolError::execution_failed(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::execution_failed(format!(
                "Search endpoint returned {}",
                status
            )));
        }

        // The endpoint often answers with a javascript content type, so parse the text
        let (body, truncated) = read_body(response, self.max_bytes).await?;
        if truncated {
            return Err(ToolError::execution_failed(format!(
                "Search response exceeds {} bytes",
                self.max_bytes
            )));
        }
        serde_json::from_slice(&body)
            .map_err(|e| ToolError::execution_failed(format!("Malformed search response: {}", e)))
    }
}

/// Flatten an instant answer into at most `limit` hits.
fn collect_hits(answer: InstantAnswer, limit: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    if !answer.abstract_url.is_empty() {
        let title = if answer.heading.is_empty() {
            answer.abstract_url.clone()
        } else {
            answer.heading
        };
        hits.push(SearchHit {
            title,
            url: answer.abstract_url,
            snippet: (!answer.abstract_text.is_empty()).then_some(answer.abstract_text),
        });
    }

    let mut stack: Vec<RelatedTopic> = answer.related_topics.into_iter().rev().collect();
    while let Some(topic) = stack.pop() {
        if hits.len() >= limit {
            break;
        }
        match topic {
            RelatedTopic::Entry { text, first_url } if !first_url.is_empty() => {
                // Text reads "Title - description"
                let (title, snippet) = match text.split_once(" - ") {
                    Some((t, s)) => (t.to_string(), Some(s.to_string())),
                    None => (text, None),
                };
                hits.push(SearchHit {
                    title,
                    url: first_url,
                    snippet,
                });
            }
            RelatedTopic::Entry { .. } => {}
            RelatedTopic::Group { topics } => stack.extend(topics.into_iter().rev()),
        }
    }

    hits.truncate(limit);
    hits
}

fn render_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for '{}'", query);
    }

    let mut output = format!("Search results for '{}':\n", query);
    for (i, hit) in hits.iter().enumerate() {
        output.push_str(&format!("\n{}. {}\n   {}\n", i + 1, hit.title, hit.url));
        if let Some(snippet) = &hit.snippet {
            output.push_str(&format!("   {}\n", snippet));
        }
    }
    output
}

#[async_trait]
impl ToolHandler for WebSearchTool {
    #[instrument(name = "web_search", skip_all)]
    async fn call(&self, args: ArgumentSet, ctx: ToolContext) -> HandlerResult {
        let query = args.require_str("query")?.trim();
        if query.is_empty() {
            return Err(ToolError::invalid_arguments("query must not be empty"));
        }
        let limit = args.unsigned("limit")?.unwrap_or(10).clamp(1, MAX_RESULTS) as usize;

        let answer = ctx.run(self.search(query)).await??;
        let hits = collect_hits(answer, limit);

        info!("Search '{}' returned {} results", query, hits.len());
        Ok(render_hits(query, &hits))
    }
}
