//! Schema registry and permissive payload validation.
//!
//! Each service registers its action shapes at startup; afterwards the
//! registry is read-only. Validation exists to catch regressions, not to
//! enforce a schema: an action with no registered descriptor is not checked
//! at all, absent fields never fail, and type compatibility is loose enough
//! to accept what the form decoders legitimately produce (numeric strings
//! for declared integers, the `true`/`false` literals for booleans).

use std::collections::HashMap;

use serde_json::Value;

use crate::encode::known_protocol_for_service;
use crate::shape::{FieldKind, Shape};
use crate::types::ProtocolType;

/// Errors raised when a payload contradicts a registered descriptor.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// A present field's value is incompatible with its declared kind.
    #[error("{shape}.{field}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The shape being checked.
        shape: &'static str,
        /// Wire name of the offending field.
        field: String,
        /// The declared kind.
        expected: &'static str,
        /// A short description of what was found.
        found: &'static str,
    },

    /// A response body that should be XML is not well-formed.
    #[error("malformed XML response: {0}")]
    MalformedXml(#[from] quick_xml::Error),

    /// A response body that should be JSON is not parseable.
    #[error("malformed JSON response: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

/// Mapping from `"service:action"` to a structural descriptor. Built once
/// at startup by each service's registration call, read-only afterward.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    shapes: HashMap<String, &'static Shape>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor for one action. A later registration for the
    /// same key replaces the earlier one.
    pub fn register(&mut self, service: &str, action: &str, shape: &'static Shape) {
        let key = format!("{service}:{action}");
        if self.shapes.insert(key, shape).is_some() {
            tracing::debug!(service, action, "replaced schema descriptor");
        }
    }

    /// Look up the descriptor for one action.
    #[must_use]
    pub fn shape(&self, service: &str, action: &str) -> Option<&'static Shape> {
        self.shapes.get(&format!("{service}:{action}")).copied()
    }

    /// Check a decoded payload against the registered descriptor for this
    /// action. Unregistered actions skip validation entirely.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TypeMismatch`] when a present field's
    /// value contradicts its declared kind.
    pub fn validate(
        &self,
        service: &str,
        action: &str,
        payload: &Value,
    ) -> Result<(), ValidationError> {
        match self.shape(service, action) {
            Some(shape) => validate_shape(shape, payload),
            None => Ok(()),
        }
    }
}

/// Recursively check a payload object against a shape. Absent fields are
/// always valid; only present-but-mistyped values fail.
fn validate_shape(shape: &'static Shape, payload: &Value) -> Result<(), ValidationError> {
    let Value::Object(object) = payload else {
        // A non-object at a structure position is tolerated at the top
        // level (an empty body decodes to null in some callers).
        if payload.is_null() {
            return Ok(());
        }
        return Err(mismatch(shape, "", "structure", payload));
    };

    for field in shape.fields {
        // Wire name preference: JSON tag, then form/XML tag, then the
        // declared field name.
        let value = object
            .get(field.json_wire_name())
            .or_else(|| object.get(field.wire_name))
            .or_else(|| object.get(field.name));
        let Some(value) = value else { continue };
        validate_kind(shape, field.wire_name, &field.kind, value)?;
    }
    Ok(())
}

fn validate_kind(
    shape: &'static Shape,
    field: &str,
    kind: &FieldKind,
    value: &Value,
) -> Result<(), ValidationError> {
    if value.is_null() {
        return Ok(());
    }
    match kind {
        FieldKind::String => {
            if value.is_string() {
                Ok(())
            } else {
                Err(mismatch(shape, field, "string", value))
            }
        }
        // Numbers may arrive as typed numbers or, from form decoding, as
        // numeric strings; the wire form never distinguishes the two.
        FieldKind::Integer | FieldKind::Float => {
            let numeric = value.is_number()
                || value
                    .as_str()
                    .is_some_and(|s| s.parse::<f64>().is_ok());
            if numeric {
                Ok(())
            } else {
                Err(mismatch(shape, field, kind.describe(), value))
            }
        }
        FieldKind::Boolean => {
            let boolean = value.is_boolean()
                || value.as_str().is_some_and(|s| s == "true" || s == "false");
            if boolean {
                Ok(())
            } else {
                Err(mismatch(shape, field, "boolean", value))
            }
        }
        FieldKind::Structure(nested) => {
            if value.is_object() {
                validate_shape(nested, value)
            } else {
                Err(mismatch(shape, field, "structure", value))
            }
        }
        FieldKind::List(element) => match value {
            Value::Array(items) => {
                for item in items {
                    validate_kind(shape, field, element, item)?;
                }
                Ok(())
            }
            _ => Err(mismatch(shape, field, "list", value)),
        },
    }
}

fn mismatch(
    shape: &'static Shape,
    field: &str,
    expected: &'static str,
    value: &Value,
) -> ValidationError {
    ValidationError::TypeMismatch {
        shape: shape.name,
        field: field.to_owned(),
        expected,
        found: describe_value(value),
    }
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Infer the protocol for response validation: a known service name wins,
/// otherwise the `Content-Type` is sniffed, otherwise Query.
#[must_use]
pub fn infer_protocol(service: Option<&str>, content_type: Option<&str>) -> ProtocolType {
    if let Some(protocol) = service.and_then(known_protocol_for_service) {
        return protocol;
    }
    match content_type {
        Some(ct) if ct.contains("x-amz-json") => ProtocolType::Json,
        Some(ct) if ct.contains("json") => ProtocolType::RestJson,
        Some(ct) if ct.contains("text/xml") => ProtocolType::Query,
        Some(ct) if ct.contains("xml") => ProtocolType::RestXml,
        _ => ProtocolType::Query,
    }
}

/// Check an encoded response body against its protocol's base format.
/// XML bodies are checked for well-formedness only; JSON bodies for
/// parseability. Empty bodies are always valid.
///
/// # Errors
///
/// Returns [`ValidationError`] when the body is not parseable as the
/// protocol's base format.
pub fn validate_response_body(protocol: ProtocolType, body: &[u8]) -> Result<(), ValidationError> {
    if body.is_empty() {
        return Ok(());
    }
    match protocol {
        ProtocolType::Query | ProtocolType::RestXml => {
            let mut reader = quick_xml::Reader::from_reader(body);
            loop {
                match reader.read_event()? {
                    quick_xml::events::Event::Eof => return Ok(()),
                    _ => {}
                }
            }
        }
        ProtocolType::Json | ProtocolType::RestJson => {
            serde_json::from_slice::<Value>(body)?;
            Ok(())
        }
    }
}
