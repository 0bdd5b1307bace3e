//! Structured query building for the database tool.
//!
//! Everything here is pure: it turns tool arguments into SQL text plus bound
//! values. Identifiers are validated and inlined; values are always bound.

use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};

use crate::domains::tools::ToolError;

/// Comparison operators, longest first so `>=` wins over `>`.
const OPERATORS: [&str; 7] = [">=", "<=", "!=", "<>", "=", ">", "<"];

/// A structured operation named by the `query` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Count,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn parse(raw: &str) -> Result<Self, ToolError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "select" => Ok(Self::Select),
            "count" => Ok(Self::Count),
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(ToolError::invalid_arguments(format!(
                "Unknown structured operation '{}': expected select, count, insert, update or delete",
                other
            ))),
        }
    }
}

/// One `column <op> value` term of a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: &'static str,
    pub value: SqlValue,
}

/// SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Arguments of a structured query, borrowed from the call.
#[derive(Debug, Default, Clone)]
pub struct StructuredQuery<'a> {
    pub table: &'a str,
    pub fields: Option<&'a str>,
    pub where_conditions: Option<&'a str>,
    pub order_by: Option<&'a str>,
    pub group_by: Option<&'a str>,
    pub limit: Option<u64>,
}

/// Check a table or column name: letters, digits and `_`, optionally
/// qualified as `table.column`.
pub fn validate_identifier(name: &str) -> Result<&str, ToolError> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let ok = match name.split_once('.') {
        Some((table, column)) => valid_part(table) && valid_part(column),
        None => valid_part(name),
    };
    if ok {
        Ok(name)
    } else {
        Err(ToolError::invalid_arguments(format!(
            "Invalid identifier '{}'",
            name
        )))
    }
}

/// Comma-separated identifiers, e.g. `"id, name"`.
fn identifier_list(raw: &str) -> Result<Vec<&str>, ToolError> {
    let names: Vec<&str> = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if names.is_empty() {
        return Err(ToolError::invalid_arguments("Empty column list"));
    }
    names.into_iter().map(validate_identifier).collect()
}

/// `"created_at DESC, id"` into a validated ORDER BY body.
fn order_by_clause(raw: &str) -> Result<String, ToolError> {
    let mut terms = Vec::new();
    for term in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mut words = term.split_whitespace();
        let column = validate_identifier(words.next().unwrap_or_default())?;
        let direction = match words.next().map(str::to_ascii_uppercase).as_deref() {
            None => "",
            Some("ASC") => " ASC",
            Some("DESC") => " DESC",
            Some(other) => {
                return Err(ToolError::invalid_arguments(format!(
                    "Invalid sort direction '{}'",
                    other
                )));
            }
        };
        if words.next().is_some() {
            return Err(ToolError::invalid_arguments(format!(
                "Invalid ORDER BY term '{}'",
                term
            )));
        }
        terms.push(format!("{}{}", column, direction));
    }
    if terms.is_empty() {
        return Err(ToolError::invalid_arguments("Empty ORDER BY"));
    }
    Ok(terms.join(", "))
}

/// Convert a JSON scalar into a bindable value.
pub fn json_to_sql(value: &Value) -> Result<SqlValue, ToolError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(SqlValue::Integer(i)),
            None => n
                .as_f64()
                .map(SqlValue::Real)
                .ok_or_else(|| ToolError::invalid_arguments(format!("Unsupported number {}", n))),
        },
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(ToolError::invalid_arguments(
            "Only scalar values can be stored or compared",
        )),
    }
}

/// Parse WHERE conditions.
///
/// Accepts either a JSON object (`{"status":"active"}`, all equality) or a
/// comma list such as `id>1,status=active`. Values may be wrapped in single
/// or double quotes; inside quotes commas and operators are literal.
/// Unquoted values that parse as numbers are bound as numbers.
pub fn parse_where(raw: &str) -> Result<Vec<Condition>, ToolError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        let object: Map<String, Value> = serde_json::from_str(trimmed).map_err(|e| {
            ToolError::invalid_arguments(format!("Invalid JSON where_conditions: {}", e))
        })?;
        return object
            .iter()
            .map(|(column, value)| {
                Ok(Condition {
                    column: validate_identifier(column)?.to_string(),
                    operator: "=",
                    value: json_to_sql(value)?,
                })
            })
            .collect();
    }

    split_top_level(trimmed)?
        .into_iter()
        .filter(|term| !term.trim().is_empty())
        .map(parse_term)
        .collect()
}

/// Split on commas that are not inside quotes.
fn split_top_level(raw: &str) -> Result<Vec<&str>, ToolError> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in raw.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ',') => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            (None, _) => {}
        }
    }

    if quote.is_some() {
        return Err(ToolError::invalid_arguments(format!(
            "Unterminated quote in where_conditions: {}",
            raw
        )));
    }
    parts.push(&raw[start..]);
    Ok(parts)
}

fn parse_term(term: &str) -> Result<Condition, ToolError> {
    let (index, operator) = term
        .char_indices()
        .find_map(|(i, _)| {
            OPERATORS
                .iter()
                .find(|op| term[i..].starts_with(*op))
                .map(|op| (i, *op))
        })
        .ok_or_else(|| {
            ToolError::invalid_arguments(format!("Condition '{}' has no operator", term.trim()))
        })?;

    let column = validate_identifier(term[..index].trim())?;
    let value = term[index + operator.len()..].trim();

    Ok(Condition {
        column: column.to_string(),
        operator,
        value: literal_value(value),
    })
}

fn literal_value(raw: &str) -> SqlValue {
    for q in ['\'', '"'] {
        if raw.len() >= 2 && raw.starts_with(q) && raw.ends_with(q) {
            return SqlValue::Text(raw[1..raw.len() - 1].to_string());
        }
    }
    if let Ok(i) = raw.parse::<i64>() {
        return SqlValue::Integer(i);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => SqlValue::Real(f),
        _ => SqlValue::Text(raw.to_string()),
    }
}

/// Render conditions as ` WHERE a = ? AND b > ?`, appending bound values.
fn where_clause(conditions: Vec<Condition>, params: &mut Vec<SqlValue>) -> String {
    if conditions.is_empty() {
        return String::new();
    }
    let terms: Vec<String> = conditions
        .into_iter()
        .map(|c| match (c.operator, c.value) {
            ("=", SqlValue::Null) => format!("{} IS NULL", c.column),
            ("!=" | "<>", SqlValue::Null) => format!("{} IS NOT NULL", c.column),
            (op, value) => {
                params.push(value);
                format!("{} {} ?", c.column, op)
            }
        })
        .collect();
    format!(" WHERE {}", terms.join(" AND "))
}

fn optional_where(
    raw: Option<&str>,
    params: &mut Vec<SqlValue>,
) -> Result<String, ToolError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Ok(where_clause(parse_where(raw)?, params)),
        None => Ok(String::new()),
    }
}

fn required_where(
    op: &str,
    raw: Option<&str>,
    params: &mut Vec<SqlValue>,
) -> Result<String, ToolError> {
    let clause = optional_where(raw, params)?;
    if clause.is_empty() {
        return Err(ToolError::invalid_arguments(format!(
            "{} requires where_conditions",
            op
        )));
    }
    Ok(clause)
}

/// `fields` for insert/update: a JSON object of column to value.
fn assignments(fields: Option<&str>) -> Result<Vec<(String, SqlValue)>, ToolError> {
    let raw = fields
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::invalid_arguments("fields must be a JSON object of column values"))?;
    let object: Map<String, Value> = serde_json::from_str(raw)
        .map_err(|e| ToolError::invalid_arguments(format!("Invalid JSON in fields: {}", e)))?;
    if object.is_empty() {
        return Err(ToolError::invalid_arguments("fields must not be empty"));
    }
    let mut pairs = object
        .iter()
        .map(|(column, value)| Ok((validate_identifier(column)?.to_string(), json_to_sql(value)?)))
        .collect::<Result<Vec<_>, ToolError>>()?;
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(pairs)
}

fn select_list(fields: Option<&str>) -> Result<String, ToolError> {
    match fields.map(str::trim).filter(|s| !s.is_empty() && *s != "*") {
        Some(raw) => Ok(identifier_list(raw)?.join(", ")),
        None => Ok("*".to_string()),
    }
}

fn tail_clauses(query: &StructuredQuery<'_>, sql: &mut String) -> Result<(), ToolError> {
    if let Some(group_by) = query.group_by.filter(|s| !s.trim().is_empty()) {
        sql.push_str(&format!(" GROUP BY {}", identifier_list(group_by)?.join(", ")));
    }
    if let Some(order_by) = query.order_by.filter(|s| !s.trim().is_empty()) {
        sql.push_str(&format!(" ORDER BY {}", order_by_clause(order_by)?));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    Ok(())
}

/// Build the statement for a structured operation.
pub fn build(operation: Operation, query: &StructuredQuery<'_>) -> Result<SqlStatement, ToolError> {
    let table = validate_identifier(query.table)?;
    let mut params = Vec::new();

    let sql = match operation {
        Operation::Select => {
            let mut sql = format!("SELECT {} FROM {}", select_list(query.fields)?, table);
            sql.push_str(&optional_where(query.where_conditions, &mut params)?);
            tail_clauses(query, &mut sql)?;
            sql
        }
        Operation::Count => {
            let target = match query.fields.map(str::trim).filter(|s| !s.is_empty() && *s != "*") {
                Some(raw) => match identifier_list(raw)?.as_slice() {
                    [column] => column.to_string(),
                    _ => {
                        return Err(ToolError::invalid_arguments(
                            "count accepts at most one column in fields",
                        ));
                    }
                },
                None => "*".to_string(),
            };
            let groups = match query.group_by.filter(|s| !s.trim().is_empty()) {
                Some(raw) => format!("{}, ", identifier_list(raw)?.join(", ")),
                None => String::new(),
            };
            let mut sql = format!("SELECT {}COUNT({}) AS count FROM {}", groups, target, table);
            sql.push_str(&optional_where(query.where_conditions, &mut params)?);
            tail_clauses(query, &mut sql)?;
            sql
        }
        Operation::Insert => {
            let values = assignments(query.fields)?;
            let columns: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
            let placeholders = vec!["?"; values.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders
            );
            params.extend(values.into_iter().map(|(_, v)| v));
            sql
        }
        Operation::Update => {
            let values = assignments(query.fields)?;
            let sets: Vec<String> = values.iter().map(|(c, _)| format!("{} = ?", c)).collect();
            let mut sql = format!("UPDATE {} SET {}", table, sets.join(", "));
            params.extend(values.into_iter().map(|(_, v)| v));
            sql.push_str(&required_where("update", query.where_conditions, &mut params)?);
            sql
        }
        Operation::Delete => {
            let mut sql = format!("DELETE FROM {}", table);
            sql.push_str(&required_where("delete", query.where_conditions, &mut params)?);
            sql
        }
    };

    Ok(SqlStatement { sql, params })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(table: &str) -> StructuredQuery<'_> {
        StructuredQuery {
            table,
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("_tmp1").is_ok());
        assert!(validate_identifier("users.email").is_ok());
        assert!(validate_identifier("1users").is_err());
        assert!(validate_identifier("users; DROP TABLE x").is_err());
        assert!(validate_identifier("a.b.c").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_parse_where_comma_list() {
        let conditions = parse_where("id>1,status=active").unwrap();
        assert_eq!(
            conditions,
            vec![
                Condition {
                    column: "id".into(),
                    operator: ">",
                    value: SqlValue::Integer(1)
                },
                Condition {
                    column: "status".into(),
                    operator: "=",
                    value: SqlValue::Text("active".into())
                },
            ]
        );
    }

    #[test]
    fn test_parse_where_longest_operator() {
        let ops: Vec<_> = parse_where("a>=1, b<=2, c!=3, d<>4")
            .unwrap()
            .into_iter()
            .map(|c| c.operator)
            .collect();
        assert_eq!(ops, vec![">=", "<=", "!=", "<>"]);
    }

    #[test]
    fn test_parse_where_quoted_values() {
        let conditions = parse_where("name='Smith, John',note=\"a=b\"").unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].value, SqlValue::Text("Smith, John".into()));
        assert_eq!(conditions[1].value, SqlValue::Text("a=b".into()));

        // Quoted digits stay text
        let conditions = parse_where("zip='01234'").unwrap();
        assert_eq!(conditions[0].value, SqlValue::Text("01234".into()));
    }

    #[test]
    fn test_parse_where_json() {
        let conditions = parse_where(r#"{"status":"active","age":30}"#).unwrap();
        assert_eq!(conditions.len(), 2);
        assert!(conditions.iter().all(|c| c.operator == "="));
        assert!(conditions.contains(&Condition {
            column: "age".into(),
            operator: "=",
            value: SqlValue::Integer(30)
        }));
    }

    #[test]
    fn test_parse_where_errors() {
        assert!(parse_where("status").is_err());
        assert!(parse_where("name='open").is_err());
        assert!(parse_where("bad col=1").is_err());
        assert!(parse_where("{not json").is_err());
    }

    #[test]
    fn test_build_select() {
        let stmt = build(
            Operation::Select,
            &StructuredQuery {
                fields: Some("name, email"),
                where_conditions: Some("status=active"),
                order_by: Some("created_at DESC"),
                limit: Some(3),
                ..query("users")
            },
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT name, email FROM users WHERE status = ? ORDER BY created_at DESC LIMIT 3"
        );
        assert_eq!(stmt.params, vec![SqlValue::Text("active".into())]);
    }

    #[test]
    fn test_build_count_grouped() {
        let stmt = build(
            Operation::Count,
            &StructuredQuery {
                group_by: Some("status"),
                ..query("users")
            },
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT status, COUNT(*) AS count FROM users GROUP BY status"
        );
    }

    #[test]
    fn test_build_insert_and_update() {
        let stmt = build(
            Operation::Insert,
            &StructuredQuery {
                fields: Some(r#"{"name":"Ann","age":41}"#),
                ..query("users")
            },
        )
        .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO users (age, name) VALUES (?, ?)");
        assert_eq!(
            stmt.params,
            vec![SqlValue::Integer(41), SqlValue::Text("Ann".into())]
        );

        let stmt = build(
            Operation::Update,
            &StructuredQuery {
                fields: Some(r#"{"status":"updated"}"#),
                where_conditions: Some("email=test@example.com"),
                ..query("users")
            },
        )
        .unwrap();
        assert_eq!(stmt.sql, "UPDATE users SET status = ? WHERE email = ?");
        assert_eq!(
            stmt.params,
            vec![
                SqlValue::Text("updated".into()),
                SqlValue::Text("test@example.com".into())
            ]
        );
    }

    #[test]
    fn test_update_and_delete_require_where() {
        let err = build(Operation::Delete, &query("users")).unwrap_err();
        assert!(err.to_string().contains("requires where_conditions"));

        let err = build(
            Operation::Update,
            &StructuredQuery {
                fields: Some(r#"{"status":"x"}"#),
                where_conditions: Some("  "),
                ..query("users")
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires where_conditions"));
    }

    #[test]
    fn test_null_comparisons() {
        let stmt = build(
            Operation::Select,
            &StructuredQuery {
                where_conditions: Some(r#"{"deleted_at":null}"#),
                ..query("users")
            },
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM users WHERE deleted_at IS NULL");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_injection_rejected() {
        assert!(build(Operation::Select, &query("users; DROP TABLE users")).is_err());
        assert!(
            build(
                Operation::Select,
                &StructuredQuery {
                    order_by: Some("id; DROP TABLE users"),
                    ..query("users")
                }
            )
            .is_err()
        );
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!(Operation::parse("SELECT").unwrap(), Operation::Select);
        assert!(Operation::parse("drop").is_err());
    }
}
