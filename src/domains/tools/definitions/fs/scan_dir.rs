//! Directory scan tool definition.
//!
//! A tool that lists files and directories under a given path, optionally
//! descending into subdirectories.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::core::config::Config;
use crate::core::security::validate_path;
use crate::domains::tools::{
    ArgumentSet, HandlerResult, ParameterSpec, ToolContext, ToolDefinition, ToolError,
    ToolHandler,
};

/// Hard ceiling on recursion regardless of what the caller asks for.
const MAX_DEPTH: u64 = 8;

/// Directory scan tool - lists files and directories in a given path.
pub struct DirScanTool {
    config: Arc<Config>,
}

#[derive(Default)]
struct ScanTotals {
    dirs: usize,
    files: usize,
}

struct ScanOptions {
    include_hidden: bool,
    detailed: bool,
    max_depth: u64,
}

impl DirScanTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "dir_scan";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "List files and directories in a given path. Returns names and types, optionally sizes and modification times, and can descend into subdirectories.";

    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Build the registry entry for this tool.
    pub fn definition(config: Arc<Config>) -> ToolDefinition {
        ToolDefinition::new(Self::NAME, Self::DESCRIPTION, Self::new(config)).params([
            ParameterSpec::string("path")
                .required()
                .describe("Path to the directory to scan"),
            ParameterSpec::boolean("include_hidden")
                .describe("Include hidden files (starting with '.')")
                .with_default(false),
            ParameterSpec::boolean("detailed")
                .describe("Show additional details (type, size, modification time)")
                .with_default(false),
            ParameterSpec::number("max_depth")
                .describe("How many directory levels to list (1 = only the given directory)")
                .with_default(1.0),
        ])
    }
}

/// Scan `path` and render the listing.
///
/// Runs on the blocking pool; `ctx` is checked before each directory so a
/// cancelled call stops walking the tree.
#[instrument(skip_all, fields(path = %path_arg))]
fn scan(
    config: &Config,
    path_arg: &str,
    options: &ScanOptions,
    ctx: &ToolContext,
) -> HandlerResult {
    info!("Directory scan called for path: {}", path_arg);

    // Validate path security first
    let path = validate_path(path_arg, config).map_err(|e| {
        warn!("Path security validation failed: {}", e);
        ToolError::execution_failed(format!("Path security validation failed: {}", e))
    })?;

    if !path.is_dir() {
        warn!("Path is not a directory: {}", path_arg);
        return Err(ToolError::execution_failed(format!(
            "Path is not a directory: {}",
            path_arg
        )));
    }

    let mut lines = Vec::new();
    let mut totals = ScanTotals::default();
    scan_level(&path, 0, options, ctx, &mut lines, &mut totals).map_err(|e| {
        warn!("Failed to read directory: {}", e);
        ToolError::execution_failed(format!("Failed to read directory: {}", e))
    })?;

    if ctx.is_cancelled() {
        info!("Directory scan of {} cancelled", path_arg);
        return Err(ToolError::Cancelled);
    }

    // Build response
    let mut response = format!("Directory: {}\n", path_arg);
    if options.detailed {
        response.push_str("\nType  Size        Modified          Name\n");
        response.push_str("----  ----------  ----------------  ----\n");
    }
    response.push_str(&lines.join("\n"));
    response.push_str(&format!(
        "\n\nTotal: {} directories, {} files",
        totals.dirs, totals.files
    ));

    info!("Listed {} entries in {}", lines.len(), path_arg);
    Ok(response)
}

#[async_trait]
impl ToolHandler for DirScanTool {
    #[instrument(name = "dir_scan", skip_all)]
    async fn call(&self, args: ArgumentSet, ctx: ToolContext) -> HandlerResult {
        let max_depth = args.unsigned("max_depth")?.unwrap_or(1).clamp(1, MAX_DEPTH);
        let options = ScanOptions {
            include_hidden: args.flag("include_hidden"),
            detailed: args.flag("detailed"),
            max_depth,
        };
        let path_arg = args.require_str("path")?.to_string();

        let config = Arc::clone(&self.config);
        let scan_ctx = ctx.clone();
        let task =
            tokio::task::spawn_blocking(move || scan(&config, &path_arg, &options, &scan_ctx));

        ctx.run(task)
            .await?
            .map_err(|e| ToolError::internal(format!("Directory scan task failed: {}", e)))?
    }
}

/// List one directory level, recursing while `depth + 1 < max_depth`.
///
/// Entries are sorted by name; a directory's children follow it, indented.
fn scan_level(
    dir: &Path,
    depth: u64,
    options: &ScanOptions,
    ctx: &ToolContext,
    lines: &mut Vec<String>,
    totals: &mut ScanTotals,
) -> std::io::Result<()> {
    if ctx.is_cancelled() {
        return Ok(());
    }

    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!("Error reading entry: {}", e);
                None
            }
        })
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let indent = "  ".repeat(depth as usize);

    for entry in entries {
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        // Skip hidden files if not requested
        if !options.include_hidden && name.starts_with('.') {
            continue;
        }

        // symlink_metadata so links are reported as links and never followed
        let metadata = match entry.path().symlink_metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to get metadata for {}: {}", name, e);
                continue;
            }
        };

        let is_dir = metadata.is_dir();
        if is_dir {
            totals.dirs += 1;
        } else if metadata.is_file() {
            totals.files += 1;
        }

        if options.detailed {
            let entry_type = if is_dir {
                "DIR "
            } else if metadata.is_symlink() {
                "LINK"
            } else {
                "FILE"
            };

            let size = if metadata.is_file() {
                format_size(metadata.len())
            } else {
                "-".to_string()
            };

            let modified = metadata
                .modified()
                .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|_| "-".to_string());

            lines.push(format!(
                "{:4}  {:>10}  {:16}  {}{}",
                entry_type, size, modified, indent, name
            ));
        } else if is_dir {
            lines.push(format!("{}{}/", indent, name));
        } else {
            lines.push(format!("{}{}", indent, name));
        }

        if is_dir && depth + 1 < options.max_depth {
            if let Err(e) = scan_level(&entry.path(), depth + 1, options, ctx, lines, totals) {
                warn!("Failed to read subdirectory {}: {}", name, e);
            }
        }
    }

    Ok(())
}

/// Format file size in human-readable format.
pub(crate) fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
