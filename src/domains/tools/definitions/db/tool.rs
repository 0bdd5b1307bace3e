//! Database query tool definition.
//!
//! Runs raw SQL or structured operations against a single SQLite database.
//! The connection is shared behind a mutex and all SQLite work happens on the
//! blocking thread pool.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::Connection;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::query::{self, Operation, SqlStatement, StructuredQuery};
use crate::domains::tools::{
    ArgumentSet, HandlerResult, ParameterSpec, ToolContext, ToolDefinition, ToolError,
    ToolHandler,
};

/// Outcome of running one statement.
#[derive(Debug, Clone, PartialEq)]
enum Execution {
    Rows(Vec<Map<String, Value>>),
    Affected { rows: usize, last_insert_id: i64 },
}

/// Database query tool - raw or structured SQL over SQLite.
pub struct DatabaseQueryTool {
    conn: Arc<Mutex<Connection>>,
    allow_raw: bool,
}

impl DatabaseQueryTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "database_query";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Query the configured SQLite database. Use query_type 'raw' to run SQL directly, or 'structured' with query set to select, count, insert, update or delete and the table and clause parameters filled in.";

    /// Open (or create) the database file.
    pub fn open(path: &Path, allow_raw: bool) -> Result<Self, ToolError> {
        let conn = Connection::open(path).map_err(|e| {
            ToolError::internal(format!("Failed to open database {}: {}", path.display(), e))
        })?;
        info!("Database opened at {}", path.display());
        Ok(Self::with_connection(conn, allow_raw))
    }

    pub fn with_connection(conn: Connection, allow_raw: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            allow_raw,
        }
    }

    /// Build the registry entry for this tool.
    pub fn definition(self) -> ToolDefinition {
        ToolDefinition::new(Self::NAME, Self::DESCRIPTION, self).params([
            ParameterSpec::string("query_type")
                .describe("'raw' for SQL text, 'structured' for a named operation")
                .one_of(["raw", "structured"])
                .with_default("structured"),
            ParameterSpec::string("query")
                .required()
                .describe("Raw SQL, or one of select, count, insert, update, delete"),
            ParameterSpec::string("table_name").describe("Table for structured queries"),
            ParameterSpec::string("fields").describe(
                "Columns for select/count (e.g. 'id, name'), or a JSON object of values for insert/update",
            ),
            ParameterSpec::string("where_conditions").describe(
                "JSON object of equalities, or a comma list like 'id>1,status=active'; quote values containing commas",
            ),
            ParameterSpec::string("order_by").describe("e.g. 'created_at DESC'"),
            ParameterSpec::string("group_by").describe("Columns to group by"),
            ParameterSpec::number("limit").describe("Maximum number of rows"),
        ])
    }

    /// Run a statement on the blocking pool.
    async fn execute(&self, statement: SqlStatement) -> Result<Execution, ToolError> {
        debug!("SQL: {} ({} params)", statement.sql, statement.params.len());
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            run_statement(&conn, &statement)
        })
        .await
        .map_err(|e| ToolError::internal(format!("Database task failed: {}", e)))?
    }
}

fn run_statement(conn: &Connection, statement: &SqlStatement) -> Result<Execution, ToolError> {
    let sql_error = |e: rusqlite::Error| ToolError::execution_failed(format!("SQL error: {}", e));

    let mut stmt = conn.prepare(&statement.sql).map_err(sql_error)?;
    let params = rusqlite::params_from_iter(statement.params.iter());

    if stmt.column_count() == 0 {
        let rows = stmt.execute(params).map_err(sql_error)?;
        return Ok(Execution::Affected {
            rows,
            last_insert_id: conn.last_insert_rowid(),
        });
    }

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let mut rows = stmt.query(params).map_err(sql_error)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(sql_error)? {
        let mut record = Map::new();
        for (i, name) in columns.iter().enumerate() {
            let value = row.get_ref(i).map_err(sql_error)?;
            record.insert(name.clone(), sql_to_json(value));
        }
        out.push(record);
    }
    Ok(Execution::Rows(out))
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(BASE64.encode(b)),
    }
}

fn render_rows(rows: &[Map<String, Value>]) -> Result<String, ToolError> {
    let json = serde_json::to_string_pretty(rows)
        .map_err(|e| ToolError::internal(format!("Failed to render rows: {}", e)))?;
    Ok(format!("{} row(s)\n{}", rows.len(), json))
}

fn render(operation: Option<Operation>, grouped: bool, execution: Execution) -> HandlerResult {
    match (operation, execution) {
        (Some(Operation::Count), Execution::Rows(rows)) if !grouped => {
            let count = rows
                .first()
                .and_then(|r| r.get("count"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            Ok(format!("count: {}", count))
        }
        (_, Execution::Rows(rows)) => render_rows(&rows),
        (Some(Operation::Insert), Execution::Affected { rows, last_insert_id }) => Ok(format!(
            "Inserted {} row(s), last insert id: {}",
            rows, last_insert_id
        )),
        (Some(Operation::Update), Execution::Affected { rows, .. }) => {
            Ok(format!("Updated {} row(s)", rows))
        }
        (Some(Operation::Delete), Execution::Affected { rows, .. }) => {
            Ok(format!("Deleted {} row(s)", rows))
        }
        (_, Execution::Affected { rows, .. }) => {
            Ok(format!("Statement executed, {} row(s) affected", rows))
        }
    }
}

#[async_trait]
impl ToolHandler for DatabaseQueryTool {
    #[instrument(name = "database_query", skip_all)]
    async fn call(&self, args: ArgumentSet, ctx: ToolContext) -> HandlerResult {
        let query_text = args.require_str("query")?;

        let (operation, statement) = match args.str("query_type").unwrap_or("structured") {
            "raw" => {
                if !self.allow_raw {
                    return Err(ToolError::invalid_arguments(
                        "Raw SQL is disabled on this server; use query_type 'structured'",
                    ));
                }
                let statement = SqlStatement {
                    sql: query_text.to_string(),
                    params: Vec::<SqlValue>::new(),
                };
                (None, statement)
            }
            _ => {
                let operation = Operation::parse(query_text)?;
                let table = args.str("table_name").ok_or_else(|| {
                    ToolError::invalid_arguments("table_name is required for structured queries")
                })?;
                let structured = StructuredQuery {
                    table,
                    fields: args.str("fields"),
                    where_conditions: args.str("where_conditions"),
                    order_by: args.str("order_by"),
                    group_by: args.str("group_by"),
                    limit: args.unsigned("limit")?,
                };
                (Some(operation), query::build(operation, &structured)?)
            }
        };

        let grouped = args.str("group_by").is_some_and(|g| !g.trim().is_empty());
        let execution = ctx.run(self.execute(statement)).await??;

        if let Execution::Rows(rows) = &execution {
            info!("Query returned {} row(s)", rows.len());
        }
        render(operation, grouped, execution)
    }
}
