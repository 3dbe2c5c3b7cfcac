//! Descriptor-driven request body decoding.
//!
//! Two request encodings exist: URL-encoded forms (the Query protocol) and
//! JSON (the JSON and RestJSON protocols). Both produce a
//! `serde_json::Value` intermediate keyed by declared field names, which
//! [`from_query`]/[`from_json`] then turn into a typed structure. Absent
//! fields stay absent in the intermediate, so `Option` fields on the target
//! type distinguish "not sent" from a default — malformed presence is an
//! error, absence never is.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::shape::{FieldKind, Shape};

/// Errors raised while decoding a request body.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The body was present but not parseable as the declared encoding.
    #[error("malformed body: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A form value was present but incompatible with the declared scalar
    /// kind (absence would have been valid; malformed presence is not).
    #[error("field {field}: cannot parse {value:?} as {expected}")]
    InvalidScalar {
        /// Dotted wire path of the offending key.
        field: String,
        /// The declared scalar kind.
        expected: &'static str,
        /// The literal text received.
        value: String,
    },
}

/// Decode a URL-encoded form body into a JSON object shaped by `shape`.
///
/// For each declared field, a matching wire key places the value; absent
/// keys leave the field out entirely. Lists use the 1-based contiguous
/// `<Name>.member.<i>` convention: indices are scanned from 1 and the first
/// gap ends the list. An empty body yields an empty object, never an error.
pub fn decode_query(shape: &Shape, body: &[u8]) -> Result<Value, DecodeError> {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(body).into_owned().collect();
    decode_struct(shape, "", &pairs)
}

/// Decode a form body straight into a typed structure.
pub fn from_query<T: DeserializeOwned>(shape: &Shape, body: &[u8]) -> Result<T, DecodeError> {
    let value = decode_query(shape, body)?;
    Ok(serde_json::from_value(value)?)
}

/// Decode a JSON body into a generic value. An empty body yields an empty
/// object, matching the form decoder's zero-value behavior.
pub fn decode_json(body: &[u8]) -> Result<Value, DecodeError> {
    if body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    Ok(serde_json::from_slice(body)?)
}

/// Decode a JSON body into a typed structure; an empty body yields the
/// zero value.
pub fn from_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, DecodeError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}

/// Decode one structure level. `prefix` is the dotted wire path of the
/// enclosing context (empty at the top level).
fn decode_struct(
    shape: &Shape,
    prefix: &str,
    pairs: &[(String, String)],
) -> Result<Value, DecodeError> {
    let mut object = Map::new();

    for field in shape.fields {
        let wire_key = join_key(prefix, field.wire_name);
        match &field.kind {
            FieldKind::String | FieldKind::Integer | FieldKind::Float | FieldKind::Boolean => {
                if let Some(raw) = lookup(pairs, &wire_key) {
                    object.insert(
                        field.name.to_owned(),
                        coerce_scalar(&field.kind, &wire_key, raw)?,
                    );
                }
            }
            FieldKind::Structure(nested) => {
                let nested_prefix = format!("{wire_key}.");
                if pairs.iter().any(|(k, _)| k.starts_with(&nested_prefix)) {
                    let value = decode_struct(nested, &nested_prefix, pairs)?;
                    object.insert(field.name.to_owned(), value);
                }
            }
            FieldKind::List(element) => {
                if let Some(items) = decode_list(element, &wire_key, pairs)? {
                    object.insert(field.name.to_owned(), Value::Array(items));
                }
            }
        }
    }

    Ok(Value::Object(object))
}

/// Decode an indexed-member list. Returns `None` when no member keys exist
/// at all (absent list), `Some(items)` otherwise.
fn decode_list(
    element: &FieldKind,
    wire_key: &str,
    pairs: &[(String, String)],
) -> Result<Option<Vec<Value>>, DecodeError> {
    let mut items = Vec::new();

    // Indices must be contiguous from 1; a gap is the end of the list.
    for index in 1.. {
        let member_key = format!("{wire_key}.member.{index}");
        match element {
            FieldKind::Structure(nested) => {
                let member_prefix = format!("{member_key}.");
                if !pairs.iter().any(|(k, _)| k.starts_with(&member_prefix)) {
                    break;
                }
                items.push(decode_struct(nested, &member_prefix, pairs)?);
            }
            FieldKind::List(_) => {
                // Nested lists do not occur in any declared shape today.
                break;
            }
            scalar => {
                let Some(raw) = lookup(pairs, &member_key) else {
                    break;
                };
                items.push(coerce_scalar(scalar, &member_key, raw)?);
            }
        }
    }

    if items.is_empty() && !has_any_member_key(wire_key, pairs) {
        return Ok(None);
    }
    Ok(Some(items))
}

/// Whether any key under `<wire_key>.member.` exists, regardless of index.
fn has_any_member_key(wire_key: &str, pairs: &[(String, String)]) -> bool {
    let member_prefix = format!("{wire_key}.member.");
    pairs.iter().any(|(k, _)| k.starts_with(&member_prefix))
}

fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}{name}")
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Coerce a form literal into the declared scalar kind.
fn coerce_scalar(kind: &FieldKind, field: &str, raw: &str) -> Result<Value, DecodeError> {
    match kind {
        FieldKind::String => Ok(Value::String(raw.to_owned())),
        FieldKind::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid(field, "integer", raw)),
        FieldKind::Float => raw
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| invalid(field, "float", raw)),
        FieldKind::Boolean => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid(field, "boolean", raw)),
        },
        FieldKind::Structure(_) | FieldKind::List(_) => {
            // Aggregate kinds never reach scalar coercion.
            Err(invalid(field, kind.describe(), raw))
        }
    }
}

fn invalid(field: &str, expected: &'static str, value: &str) -> DecodeError {
    DecodeError::InvalidScalar {
        field: field.to_owned(),
        expected,
        value: value.to_owned(),
    }
}
