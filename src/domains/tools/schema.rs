//! Parameter schemas and argument validation.
//!
//! A tool declares an ordered list of [`ParameterSpec`]s. Incoming calls carry
//! an untyped JSON object; [`validate_arguments`] turns it into a typed
//! [`ArgumentSet`] at the registry boundary so handlers never see raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;

use super::error::{RegistrationError, ToolError, ValidationError};

/// The value shapes a parameter can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Number,
    Boolean,
}

impl ParameterKind {
    /// JSON Schema type name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, validated argument value.
///
/// Numbers are canonicalised to `f64` whatever their JSON representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl ArgumentValue {
    /// The kind this value belongs to.
    pub fn kind(&self) -> ParameterKind {
        match self {
            Self::String(_) => ParameterKind::String,
            Self::Number(_) => ParameterKind::Number,
            Self::Boolean(_) => ParameterKind::Boolean,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => json!(n),
            Self::Boolean(b) => Value::Bool(*b),
        }
    }
}

impl From<&str> for ArgumentValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ArgumentValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for ArgumentValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for ArgumentValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for ArgumentValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// Declaration of a single tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    /// Parameter name, unique within the tool.
    pub name: String,

    /// Expected value shape.
    pub kind: ParameterKind,

    /// Whether the caller must supply the parameter.
    pub required: bool,

    /// Human-readable description, advertised in the input schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Value substituted when an optional parameter is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ArgumentValue>,

    /// Allowed values (string parameters only).
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

impl ParameterSpec {
    /// Create an optional parameter of the given kind.
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: None,
            default: None,
            allowed_values: None,
        }
    }

    /// Shorthand for a string parameter.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::String)
    }

    /// Shorthand for a number parameter.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Number)
    }

    /// Shorthand for a boolean parameter.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Boolean)
    }

    /// Mark the parameter as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the default used when the parameter is absent.
    pub fn with_default(mut self, value: impl Into<ArgumentValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Restrict a string parameter to a fixed set of values.
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Check that the declaration is internally consistent.
    pub(crate) fn check(&self, tool: &str) -> Result<(), RegistrationError> {
        if self.name.trim().is_empty() {
            return Err(RegistrationError::invalid(tool, "parameter with empty name"));
        }

        if let Some(allowed) = &self.allowed_values {
            if self.kind != ParameterKind::String {
                return Err(RegistrationError::invalid(
                    tool,
                    format!("enum constraint on non-string parameter '{}'", self.name),
                ));
            }
            if allowed.is_empty() {
                return Err(RegistrationError::invalid(
                    tool,
                    format!("empty enum for parameter '{}'", self.name),
                ));
            }
        }

        if let Some(default) = &self.default {
            if default.kind() != self.kind {
                return Err(RegistrationError::invalid(
                    tool,
                    format!(
                        "default for '{}' is a {}, expected {}",
                        self.name,
                        default.kind(),
                        self.kind
                    ),
                ));
            }
            if let (ArgumentValue::String(value), Some(allowed)) = (default, &self.allowed_values)
            {
                if !allowed.contains(value) {
                    return Err(RegistrationError::invalid(
                        tool,
                        format!("default '{}' for '{}' is not an allowed value", value, self.name),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Validate one present JSON value against this declaration.
    fn validate_value(&self, raw: &Value) -> Result<ArgumentValue, ValidationError> {
        let value = match (self.kind, raw) {
            (ParameterKind::String, Value::String(s)) => ArgumentValue::String(s.clone()),
            (ParameterKind::Number, Value::Number(n)) => match n.as_f64() {
                Some(f) => ArgumentValue::Number(f),
                None => return Err(self.mismatch(raw)),
            },
            (ParameterKind::Boolean, Value::Bool(b)) => ArgumentValue::Boolean(*b),
            _ => return Err(self.mismatch(raw)),
        };

        if let (ArgumentValue::String(s), Some(allowed)) = (&value, &self.allowed_values) {
            if !allowed.iter().any(|a| a == s) {
                return Err(ValidationError::InvalidEnumValue {
                    name: self.name.clone(),
                    value: s.clone(),
                    allowed: allowed.clone(),
                });
            }
        }

        Ok(value)
    }

    fn mismatch(&self, raw: &Value) -> ValidationError {
        ValidationError::TypeMismatch {
            name: self.name.clone(),
            expected: self.kind.as_str(),
            found: json_type_name(raw),
        }
    }

    fn to_schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), Value::String(self.kind.as_str().into()));
        if let Some(description) = &self.description {
            prop.insert("description".into(), Value::String(description.clone()));
        }
        if let Some(allowed) = &self.allowed_values {
            prop.insert("enum".into(), json!(allowed));
        }
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.to_json());
        }
        Value::Object(prop)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Build a JSON Schema object describing the given parameters.
pub fn input_schema(parameters: &[ParameterSpec]) -> Map<String, Value> {
    let properties: Map<String, Value> = parameters
        .iter()
        .map(|p| (p.name.clone(), p.to_schema()))
        .collect();
    let required: Vec<&str> = parameters
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();

    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    schema
}

// ============================================================================
// Argument Set
// ============================================================================

/// Typed arguments for one call, produced by [`validate_arguments`].
///
/// Only declared parameters are present; every required parameter is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentSet {
    values: BTreeMap<String, ArgumentValue>,
}

impl ArgumentSet {
    /// Raw access to a value.
    pub fn get(&self, name: &str) -> Option<&ArgumentValue> {
        self.values.get(name)
    }

    /// Whether a value is set (supplied or defaulted).
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of values set.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no values are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgumentValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgumentValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ArgumentValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgumentValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// A number that must be a non-negative whole value.
    pub fn unsigned(&self, name: &str) -> Result<Option<u64>, ToolError> {
        match self.number(name) {
            None => Ok(None),
            Some(n) if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64 => {
                Ok(Some(n as u64))
            }
            Some(n) => Err(ToolError::invalid_arguments(format!(
                "'{}' must be a non-negative integer, got {}",
                name, n
            ))),
        }
    }

    /// A string the handler cannot run without.
    pub fn require_str(&self, name: &str) -> Result<&str, ToolError> {
        self.str(name)
            .ok_or_else(|| ValidationError::MissingParameter(name.to_string()).into())
    }

    /// A number the handler cannot run without.
    pub fn require_number(&self, name: &str) -> Result<f64, ToolError> {
        self.number(name)
            .ok_or_else(|| ValidationError::MissingParameter(name.to_string()).into())
    }

    /// A boolean, falling back when unset.
    pub fn flag(&self, name: &str) -> bool {
        self.boolean(name).unwrap_or(false)
    }
}

impl FromIterator<(String, ArgumentValue)> for ArgumentSet {
    fn from_iter<T: IntoIterator<Item = (String, ArgumentValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Validate raw call arguments against a parameter list.
///
/// Parameters are checked in declaration order, so the first failing
/// parameter determines the error. Keys that are not declared are dropped.
/// An explicit JSON `null` is treated as absent.
pub fn validate_arguments(
    parameters: &[ParameterSpec],
    raw: Option<&Map<String, Value>>,
) -> Result<ArgumentSet, ValidationError> {
    let empty = Map::new();
    let raw = raw.unwrap_or(&empty);
    let mut values = BTreeMap::new();

    for spec in parameters {
        match raw.get(&spec.name).filter(|v| !v.is_null()) {
            Some(value) => {
                values.insert(spec.name.clone(), spec.validate_value(value)?);
            }
            None if spec.required => {
                return Err(ValidationError::MissingParameter(spec.name.clone()));
            }
            None => {
                if let Some(default) = &spec.default {
                    values.insert(spec.name.clone(), default.clone());
                }
            }
        }
    }

    Ok(ArgumentSet { values })
}

/// Like [`validate_arguments`] but for an arbitrary JSON value.
pub fn validate_value(
    parameters: &[ParameterSpec],
    raw: &Value,
) -> Result<ArgumentSet, ValidationError> {
    match raw {
        Value::Object(map) => validate_arguments(parameters, Some(map)),
        Value::Null => validate_arguments(parameters, None),
        _ => Err(ValidationError::NotAnObject),
    }
}
