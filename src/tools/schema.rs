//! Parameter Schemas
//!
//! Declarative description of the arguments a tool accepts: field type,
//! required/optional, default, enumerated values and integer bounds.
//! Schemas render to JSON Schema for callers and are used by the gateway to
//! check arguments before any command is built.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Type of a parameter field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Boolean,
    Integer,
}

impl ParameterKind {
    fn json_type(&self) -> &'static str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Integer => "integer",
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterField {
    pub name: String,
    pub kind: ParameterKind,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
    /// Allowed string values (empty means unrestricted)
    pub allowed_values: Vec<String>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
}

impl ParameterField {
    fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            required: false,
            default: None,
            allowed_values: Vec::new(),
            minimum: None,
            maximum: None,
        }
    }

    /// Free-form string field
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::String).describe(description)
    }

    /// Boolean field with a default
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, ParameterKind::Boolean).default_value(Value::Bool(default))
    }

    /// Integer field bounded to `min..=max` with a default
    pub fn integer(name: impl Into<String>, min: i64, max: i64, default: i64) -> Self {
        let mut field = Self::new(name, ParameterKind::Integer).default_value(json!(default));
        field.minimum = Some(min);
        field.maximum = Some(max);
        field
    }

    /// String field restricted to `values`
    pub fn string_enum(name: impl Into<String>, values: &[&str], default: Option<&str>) -> Self {
        let mut field = Self::new(name, ParameterKind::String);
        field.allowed_values = values.iter().map(|v| v.to_string()).collect();
        if let Some(default) = default {
            field.default = Some(Value::String(default.to_string()));
        }
        field
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!(self.kind.json_type()));
        if let Some(ref description) = self.description {
            schema.insert("description".to_string(), json!(description));
        }
        if !self.allowed_values.is_empty() {
            schema.insert("enum".to_string(), json!(self.allowed_values));
        }
        if let Some(min) = self.minimum {
            schema.insert("minimum".to_string(), json!(min));
        }
        if let Some(max) = self.maximum {
            schema.insert("maximum".to_string(), json!(max));
        }
        if let Some(ref default) = self.default {
            schema.insert("default".to_string(), default.clone());
        }
        Value::Object(schema)
    }

    /// Check a present, non-null value against this field's constraints
    fn check(&self, value: &Value) -> Result<(), String> {
        match self.kind {
            ParameterKind::String => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("expected string, got {}", type_name(value)))?;
                if !self.allowed_values.is_empty()
                    && !self.allowed_values.iter().any(|v| v == text)
                {
                    return Err(format!(
                        "'{}' is not one of: {}",
                        text,
                        self.allowed_values.join(", ")
                    ));
                }
            }
            ParameterKind::Boolean => {
                if !value.is_boolean() {
                    return Err(format!("expected boolean, got {}", type_name(value)));
                }
            }
            ParameterKind::Integer => {
                let number = value
                    .as_i64()
                    .ok_or_else(|| format!("expected integer, got {}", type_name(value)))?;
                if let Some(min) = self.minimum {
                    if number < min {
                        return Err(format!("{} is below the minimum of {}", number, min));
                    }
                }
                if let Some(max) = self.maximum {
                    if number > max {
                        return Err(format!("{} is above the maximum of {}", number, max));
                    }
                }
            }
        }
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A constraint violation found by [`ParameterSchema::check`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

/// Ordered list of declared parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub fields: Vec<ParameterField>,
}

impl ParameterSchema {
    /// Schema with no parameters
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(fields: Vec<ParameterField>) -> Self {
        Self { fields }
    }

    /// Names of the required fields, in declaration order
    pub fn required_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Look up a declared field
    pub fn field(&self, name: &str) -> Option<&ParameterField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Render as a JSON Schema object
    ///
    /// # Example
    ///
    /// ```
    /// use opsgate::tools::{ParameterField, ParameterSchema};
    ///
    /// let schema = ParameterSchema::new(vec![
    ///     ParameterField::string("name", "Service name").required(),
    /// ]);
    /// let json = schema.to_json_schema();
    /// assert_eq!(json["type"], "object");
    /// assert_eq!(json["required"][0], "name");
    /// ```
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.to_json_schema()))
            .collect();

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));

        let required = self.required_fields();
        if !required.is_empty() {
            schema.insert("required".to_string(), json!(required));
        }
        Value::Object(schema)
    }

    /// Check present, non-null arguments against their declared constraints
    ///
    /// Missing fields are not reported here; undeclared fields are ignored.
    pub fn check(&self, args: &Value) -> Result<(), FieldViolation> {
        for field in &self.fields {
            let value = match args.get(&field.name) {
                Some(Value::Null) | None => continue,
                Some(value) => value,
            };
            field.check(value).map_err(|reason| FieldViolation {
                field: field.name.clone(),
                reason,
            })?;
        }
        Ok(())
    }
}

/// Read a string argument, if present and non-null
pub fn arg_str<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

/// Read a boolean argument, falling back to `default`
pub fn arg_bool(args: &Value, name: &str, default: bool) -> bool {
    args.get(name).and_then(Value::as_bool).unwrap_or(default)
}

/// Read an integer argument, falling back to `default`
pub fn arg_i64(args: &Value, name: &str, default: i64) -> i64 {
    args.get(name).and_then(Value::as_i64).unwrap_or(default)
}
