//! Tool registry: named tools with input schemas and typed handlers.
//!
//! Arguments are validated against the tool's [`InputSchema`] once, at the
//! server boundary. Handlers built with [`ToolDefinition::typed`] then
//! receive their own argument struct rather than raw JSON.

use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::error::{Result, RpcError};
use crate::protocol::{CallToolResult, ToolContent, ToolInfo};

// ─────────────────────────────────────────────────────────────────────────────
// Input Schema
// ─────────────────────────────────────────────────────────────────────────────

/// Primitive type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// JSON string.
    String,
    /// Any JSON number.
    Number,
    /// JSON number with no fractional part.
    Integer,
    /// JSON boolean.
    Boolean,
    /// JSON object.
    Object,
    /// JSON array.
    Array,
}

impl FieldType {
    /// JSON Schema type name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One field of a tool's input object.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    /// Field name.
    pub name: String,
    /// Expected type.
    pub field_type: FieldType,
    /// Whether the field must be present.
    pub required: bool,
    /// Description surfaced in `tools/list`.
    pub description: String,
    /// Allowed values, for string enums.
    pub allowed: Option<Vec<String>>,
}

/// A typed object schema with required and optional fields.
///
/// Unknown fields are accepted and passed through to the handler.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    fields: Vec<FieldSchema>,
}

impl InputSchema {
    /// Schema with no fields (accepts any object, or no arguments).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required field.
    pub fn required(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldSchema {
            name: name.into(),
            field_type,
            required: true,
            description: description.into(),
            allowed: None,
        });
        self
    }

    /// Add an optional field.
    pub fn optional(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldSchema {
            name: name.into(),
            field_type,
            required: false,
            description: description.into(),
            allowed: None,
        });
        self
    }

    /// Restrict the most recently added string field to a set of values.
    pub fn one_of(mut self, values: &[&str]) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.allowed = Some(values.iter().map(|v| v.to_string()).collect());
        }
        self
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Render as JSON Schema for `tools/list`.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = json!({
                "type": field.field_type.as_str(),
                "description": field.description,
            });
            if let Some(allowed) = &field.allowed {
                property["enum"] = json!(allowed);
            }
            properties.insert(field.name.clone(), property);
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate arguments, collecting every violation.
    ///
    /// Missing arguments are treated as an empty object.
    pub fn validate(&self, arguments: Option<&Value>) -> std::result::Result<(), ValidationError> {
        let empty = Map::new();
        let object = match arguments {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(ValidationError {
                    violations: vec![FieldViolation::NotAnObject {
                        actual: json_type_name(other),
                    }],
                });
            }
        };

        let mut violations = Vec::new();
        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    violations.push(FieldViolation::Missing {
                        field: field.name.clone(),
                    });
                }
                None | Some(Value::Null) => {}
                Some(value) if !field.field_type.matches(value) => {
                    violations.push(FieldViolation::WrongType {
                        field: field.name.clone(),
                        expected: field.field_type,
                        actual: json_type_name(value),
                    });
                }
                Some(value) => {
                    if let (Some(allowed), Some(text)) = (&field.allowed, value.as_str())
                        && !allowed.iter().any(|a| a == text)
                    {
                        violations.push(FieldViolation::NotAllowed {
                            field: field.name.clone(),
                            value: text.to_string(),
                        });
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldViolation {
    /// Arguments were not a JSON object.
    NotAnObject {
        /// Type that was sent instead.
        actual: &'static str,
    },
    /// A required field is absent.
    Missing {
        /// Field name.
        field: String,
    },
    /// A field has the wrong primitive type.
    WrongType {
        /// Field name.
        field: String,
        /// Declared type.
        expected: FieldType,
        /// Type that was sent.
        actual: &'static str,
    },
    /// A string field is outside its allowed set.
    NotAllowed {
        /// Field name.
        field: String,
        /// Offending value.
        value: String,
    },
}

impl FieldViolation {
    /// Name of the offending field, if the violation concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::NotAnObject { .. } => None,
            Self::Missing { field }
            | Self::WrongType { field, .. }
            | Self::NotAllowed { field, .. } => Some(field),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject { actual } => write!(f, "arguments must be an object, got {actual}"),
            Self::Missing { field } => write!(f, "missing required field '{field}'"),
            Self::WrongType {
                field,
                expected,
                actual,
            } => write!(f, "field '{field}' must be {expected}, got {actual}"),
            Self::NotAllowed { field, value } => {
                write!(f, "field '{field}' has unsupported value '{value}'")
            }
        }
    }
}

/// Arguments failed schema validation.
#[derive(Debug, Clone, Error)]
#[error("invalid arguments: {}", summarize(.violations))]
pub struct ValidationError {
    /// Every violation found.
    pub violations: Vec<FieldViolation>,
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Names of the offending fields.
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().filter_map(|v| v.field()).collect()
    }

    /// Structured payload for the JSON-RPC error `data` member.
    pub fn to_data(&self) -> Value {
        json!({
            "fields": self.fields(),
            "violations": self.violations.iter().map(ToString::to_string).collect::<Vec<_>>(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Failure reported by a tool handler.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// Arguments passed the schema but could not be decoded.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The tool ran and the underlying operation failed.
    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    /// Create a failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// What a handler returns on success.
#[derive(Debug, Clone)]
pub enum ToolOutput {
    /// Plain text.
    Text(String),
    /// Structured payload, sent as JSON text.
    Json(Value),
    /// Raw content items.
    Content(Vec<ToolContent>),
}

impl ToolOutput {
    /// Serialize any value as a JSON payload.
    pub fn json<T: serde::Serialize>(value: &T) -> std::result::Result<Self, ToolError> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| ToolError::failed(format!("failed to encode result: {e}")))
    }
}

impl From<ToolOutput> for CallToolResult {
    fn from(output: ToolOutput) -> Self {
        match output {
            ToolOutput::Text(text) => CallToolResult::from_text(text),
            ToolOutput::Json(value) => CallToolResult::from_json(&value),
            ToolOutput::Content(content) => CallToolResult {
                content,
                is_error: Some(false),
            },
        }
    }
}

/// A tool implementation.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with already-validated arguments.
    async fn call(&self, arguments: Value) -> std::result::Result<ToolOutput, ToolError>;
}

/// Adapts a closure over a typed argument struct into a [`ToolHandler`].
struct TypedHandler<A, F> {
    f: F,
    _args: PhantomData<fn() -> A>,
}

#[async_trait]
impl<A, F, Fut> ToolHandler for TypedHandler<A, F>
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<ToolOutput, ToolError>> + Send + 'static,
{
    async fn call(&self, arguments: Value) -> std::result::Result<ToolOutput, ToolError> {
        let arguments = if arguments.is_null() {
            Value::Object(Map::new())
        } else {
            arguments
        };
        let args: A = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        (self.f)(args).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Definitions & Registry
// ─────────────────────────────────────────────────────────────────────────────

/// A registered tool: name, description, schema, and handler.
#[derive(Clone)]
pub struct ToolDefinition {
    name: String,
    description: String,
    schema: InputSchema,
    handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    /// Define a tool over a raw-JSON handler.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: InputSchema,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Arc::new(handler),
        }
    }

    /// Define a tool whose handler takes a deserialized argument struct.
    pub fn typed<A, F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: InputSchema,
        f: F,
    ) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<ToolOutput, ToolError>> + Send + 'static,
    {
        Self::new(
            name,
            description,
            schema,
            TypedHandler {
                f,
                _args: PhantomData,
            },
        )
    }

    /// Tool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Input schema.
    pub fn schema(&self) -> &InputSchema {
        &self.schema
    }

    /// Catalog entry for `tools/list`.
    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: Some(self.schema.to_json_schema()),
        }
    }

    /// Handler for dispatch.
    pub fn handler(&self) -> Arc<dyn ToolHandler> {
        Arc::clone(&self.handler)
    }
}

/// Catalog of tools offered by one server.
///
/// Populated at startup through `&mut self`; dispatch only reads it.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names are unique.
    pub fn register(&mut self, tool: ToolDefinition) -> Result<()> {
        if self.tools.contains_key(tool.name()) {
            return Err(RpcError::AlreadyRegistered(tool.name().to_string()));
        }
        tracing::debug!(tool = %tool.name(), "registered tool");
        self.tools.insert(tool.name().to_string(), tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Catalog entries, sorted by name.
    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools.values().map(ToolDefinition::info).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
