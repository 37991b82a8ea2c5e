//! Declarative payload matching for bus replies and requests.
//!
//! Bus payloads are loosely shaped JSON. A [`PayloadSchema`] states the shape
//! a consumer expects: replies failing it are logged and dropped, requests
//! failing it are answered with a typed error response.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Expected JSON type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Number,
    String,
    Array,
    Object,
    /// Any JSON value, including null.
    Any,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Number => value.is_number(),
            FieldKind::String => value.is_string(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
            FieldKind::Any => true,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Bool => "boolean",
            FieldKind::Number => "number",
            FieldKind::String => "string",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
            FieldKind::Any => "any",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    kind: FieldKind,
    required: bool,
}

#[derive(Debug, Clone)]
enum Shape {
    /// Accepts every payload.
    Any,
    /// Requires a JSON object with the listed fields.
    Object(Vec<Field>),
}

/// A payload schema.
///
/// ```rust
/// use beacon_api::{FieldKind, PayloadSchema};
///
/// let schema = PayloadSchema::object()
///     .required("serviceName", FieldKind::String)
///     .required("connected", FieldKind::Bool)
///     .optional("pid", FieldKind::Number);
///
/// assert!(
///     schema
///         .validate(&serde_json::json!({"serviceName": "com.webos.notification", "connected": true}))
///         .is_ok()
/// );
/// ```
#[derive(Debug, Clone)]
pub struct PayloadSchema {
    shape: Shape,
}

impl PayloadSchema {
    /// A schema accepting every payload.
    pub fn any() -> Self {
        Self { shape: Shape::Any }
    }

    /// A schema requiring a JSON object. Add field constraints with
    /// [`required`](Self::required) and [`optional`](Self::optional).
    pub fn object() -> Self {
        Self {
            shape: Shape::Object(Vec::new()),
        }
    }

    /// Requires `name` to be present with the given type.
    pub fn required(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.field(name.into(), kind, true)
    }

    /// When `name` is present, requires it to have the given type.
    pub fn optional(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.field(name.into(), kind, false)
    }

    fn field(mut self, name: String, kind: FieldKind, required: bool) -> Self {
        if let Shape::Object(fields) = &mut self.shape {
            fields.push(Field {
                name,
                kind,
                required,
            });
        }
        self
    }

    /// Checks `value` against this schema.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        let fields = match &self.shape {
            Shape::Any => return Ok(()),
            Shape::Object(fields) => fields,
        };

        let Some(object) = value.as_object() else {
            return Err(SchemaViolation::NotAnObject);
        };

        for field in fields {
            match object.get(&field.name) {
                Some(v) if field.kind.matches(v) => {}
                Some(_) => {
                    return Err(SchemaViolation::WrongType {
                        field: field.name.clone(),
                        expected: field.kind,
                    });
                }
                None if field.required => {
                    return Err(SchemaViolation::MissingField {
                        field: field.name.clone(),
                    });
                }
                None => {}
            }
        }

        Ok(())
    }
}

/// Why a payload failed its schema.
#[derive(Debug, Clone, Error)]
pub enum SchemaViolation {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing required field '{field}'")]
    MissingField { field: String },
    #[error("field '{field}' is not of type {expected}")]
    WrongType { field: String, expected: FieldKind },
}
