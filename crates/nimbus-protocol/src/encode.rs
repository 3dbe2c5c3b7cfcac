//! Wire-correct success and error envelopes for the four protocols.
//!
//! Every envelope here is fixed and non-negotiable: services supply only the
//! payload (a result fragment, a JSON value, or an [`XmlRoot`] structure)
//! and this module supplies the wrapper, the `Content-Type`, and a freshly
//! generated request id. RestXML success responses can only be produced
//! through the [`XmlRoot`] trait, so a payload without a declared root
//! element does not compile.

use std::io::{self, Write};

use http::StatusCode;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};
use uuid::Uuid;

use crate::types::{ProtocolType, Response};

/// Errors raised while encoding a response body.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// An I/O error during XML writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An error from the underlying quick-xml library.
    #[error("XML processing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// JSON serialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A structure that owns its XML root-element identity.
///
/// The root name and namespace are trait constants, so the only way to emit
/// a RestXML success body is through a type that declares them; hand-built
/// root elements have no entry point.
pub trait XmlRoot {
    /// The document's root element name.
    const ROOT_ELEMENT: &'static str;
    /// The `xmlns` attribute placed on the root element.
    const XMLNS: &'static str;

    /// Write this value's child elements inside the root.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn write_children<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Generate a fresh request identifier. Never reused, never predictable.
#[must_use]
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// The protocol a named service is known to speak, if the name is in the
/// table at all.
#[must_use]
pub fn known_protocol_for_service(service: &str) -> Option<ProtocolType> {
    match service {
        "iam" | "sts" | "sqs" | "sns" | "ec2" | "rds" | "ses" | "autoscaling"
        | "cloudformation" | "elasticloadbalancing" | "monitoring" => Some(ProtocolType::Query),
        "dynamodb" | "kinesis" | "firehose" | "events" | "logs" | "secretsmanager" | "kms"
        | "stepfunctions" => Some(ProtocolType::Json),
        "s3" => Some(ProtocolType::RestXml),
        "lambda" | "apigateway" | "execute-api" => Some(ProtocolType::RestJson),
        _ => None,
    }
}

/// Which envelope a named service's responses use. Unknown names fall back
/// to the Query protocol so a service registered before its protocol entry
/// still gets a well-formed (if possibly mismatched) error body.
#[must_use]
pub fn protocol_for_service(service: &str) -> ProtocolType {
    known_protocol_for_service(service).unwrap_or(ProtocolType::Query)
}

/// Encode a Query-protocol success: the caller's result fragment wrapped in
/// `<{Action}Response>` / `<{Action}Result>` with a `ResponseMetadata`
/// block carrying the request id.
///
/// # Errors
///
/// Returns [`EncodeError`] if XML writing fails.
pub fn query_success<F>(action: &str, xmlns: &str, write_result: F) -> Result<Response, EncodeError>
where
    F: FnOnce(&mut Writer<&mut Vec<u8>>) -> io::Result<()>,
{
    let request_id = new_request_id();
    let envelope = format!("{action}Response");
    let result_element = format!("{action}Result");
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer
        .create_element(envelope.as_str())
        .with_attribute(("xmlns", xmlns))
        .write_inner_content(|w| {
            w.create_element(result_element.as_str())
                .write_inner_content(write_result)?;
            w.create_element("ResponseMetadata").write_inner_content(|w| {
                write_text(w, "RequestId", &request_id)
            })?;
            Ok::<_, io::Error>(())
        })?;

    Ok(Response::new(StatusCode::OK)
        .header("content-type", ProtocolType::Query.content_type())
        .body(buf))
}

/// Encode a compute-style Query success from a caller-built XML document:
/// the caller's root element is kept as-is, an `xmlns` attribute is injected
/// into the opening tag when absent, and a lowercase `<requestId>` element
/// is injected before the final closing tag.
#[must_use]
pub fn ec2_success(body: &str, xmlns: &str) -> Response {
    let request_id = new_request_id();
    let body = inject_ec2_envelope(body, xmlns, &request_id);
    Response::new(StatusCode::OK)
        .header("content-type", ProtocolType::Query.content_type())
        .body(body)
}

/// Encode a JSON-protocol success: the payload is the body, verbatim.
///
/// # Errors
///
/// Returns [`EncodeError`] if the payload cannot be serialized.
pub fn json_success(payload: &serde_json::Value) -> Result<Response, EncodeError> {
    let body = serde_json::to_vec(payload)?;
    Ok(Response::new(StatusCode::OK)
        .header("content-type", ProtocolType::Json.content_type())
        .header("x-amzn-requestid", &new_request_id())
        .body(body))
}

/// Encode a RestJSON success: raw JSON body with the given status.
///
/// # Errors
///
/// Returns [`EncodeError`] if the payload cannot be serialized.
pub fn rest_json_success(
    status: StatusCode,
    payload: &serde_json::Value,
) -> Result<Response, EncodeError> {
    let body = serde_json::to_vec(payload)?;
    Ok(Response::new(status)
        .header("content-type", ProtocolType::RestJson.content_type())
        .header("x-amzn-requestid", &new_request_id())
        .body(body))
}

/// Encode a RestXML success: XML declaration, then the value's declared
/// root element with its namespace, then its children. No wrapper is
/// generated and none can be bypassed.
///
/// # Errors
///
/// Returns [`EncodeError`] if XML writing fails.
pub fn rest_xml_success<T: XmlRoot>(status: StatusCode, value: &T) -> Result<Response, EncodeError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer
        .create_element(T::ROOT_ELEMENT)
        .with_attribute(("xmlns", T::XMLNS))
        .write_inner_content(|w| value.write_children(w))?;

    Ok(rest_xml_empty(status)
        .header("content-type", ProtocolType::RestXml.content_type())
        .body(buf))
}

/// A bodiless RestXML success. Storage-style operations answer many calls
/// with bare status codes and headers; those responses still carry the
/// same fresh request-id headers as bodied ones.
#[must_use]
pub fn rest_xml_empty(status: StatusCode) -> Response {
    Response::new(status)
        .header("x-amz-request-id", &new_request_id())
        .header("x-amz-id-2", &new_request_id())
}

/// Encode an error in the target protocol's envelope.
///
/// This path is infallible: it is the last resort for every request-time
/// failure, so body-writing problems degrade to an empty body with the
/// correct status and headers rather than erroring again.
#[must_use]
pub fn encode_error(
    protocol: ProtocolType,
    status: StatusCode,
    code: &str,
    message: &str,
) -> Response {
    let request_id = new_request_id();
    match protocol {
        ProtocolType::Query => Response::new(status)
            .header("content-type", protocol.content_type())
            .body(query_error_body(code, message, &request_id)),
        ProtocolType::Json => Response::new(status)
            .header("content-type", protocol.content_type())
            .header("x-amzn-requestid", &request_id)
            .header("x-amzn-errortype", code)
            .body(
                serde_json::json!({ "__type": code, "message": message }).to_string(),
            ),
        ProtocolType::RestXml => Response::new(status)
            .header("content-type", protocol.content_type())
            .header("x-amz-request-id", &request_id)
            .header("x-amz-id-2", &new_request_id())
            .body(rest_xml_error_body(code, message, &request_id)),
        ProtocolType::RestJson => Response::new(status)
            .header("content-type", protocol.content_type())
            .header("x-amzn-requestid", &request_id)
            .body(
                serde_json::json!({ "Type": "User", "message": message }).to_string(),
            ),
    }
}

/// Encode a compute-style Query error:
/// `<Response><Errors><Error>…</Error></Errors><RequestId>`.
#[must_use]
pub fn ec2_error(status: StatusCode, code: &str, message: &str) -> Response {
    let request_id = new_request_id();
    let mut buf = Vec::with_capacity(256);
    if let Err(e) = write_ec2_error(&mut buf, code, message, &request_id) {
        tracing::error!(error = %e, "failed to serialize error XML");
        buf.clear();
    }
    Response::new(status)
        .header("content-type", ProtocolType::Query.content_type())
        .body(buf)
}

fn query_error_body(code: &str, message: &str, request_id: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    if let Err(e) = write_query_error(&mut buf, code, message, request_id) {
        tracing::error!(error = %e, "failed to serialize error XML");
        buf.clear();
    }
    buf
}

fn write_query_error(
    buf: &mut Vec<u8>,
    code: &str,
    message: &str,
    request_id: &str,
) -> io::Result<()> {
    let mut writer = Writer::new(buf);
    writer.create_element("ErrorResponse").write_inner_content(|w| {
        w.create_element("Error").write_inner_content(|w| {
            write_text(w, "Code", code)?;
            write_text(w, "Message", message)
        })?;
        write_text(w, "RequestId", request_id)
    })?;
    Ok(())
}

fn write_ec2_error(
    buf: &mut Vec<u8>,
    code: &str,
    message: &str,
    request_id: &str,
) -> io::Result<()> {
    let mut writer = Writer::new(buf);
    writer.create_element("Response").write_inner_content(|w| {
        w.create_element("Errors").write_inner_content(|w| {
            w.create_element("Error").write_inner_content(|w| {
                write_text(w, "Code", code)?;
                write_text(w, "Message", message)
            })?;
            Ok::<_, io::Error>(())
        })?;
        write_text(w, "RequestId", request_id)
    })?;
    Ok(())
}

fn rest_xml_error_body(code: &str, message: &str, request_id: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    if let Err(e) = write_rest_xml_error(&mut buf, code, message, request_id) {
        tracing::error!(error = %e, "failed to serialize error XML");
        buf.clear();
    }
    buf
}

fn write_rest_xml_error(
    buf: &mut Vec<u8>,
    code: &str,
    message: &str,
    request_id: &str,
) -> io::Result<()> {
    let mut writer = Writer::new(buf);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.create_element("Error").write_inner_content(|w| {
        write_text(w, "Code", code)?;
        write_text(w, "Message", message)?;
        write_text(w, "RequestId", request_id)?;
        write_text(w, "HostId", &new_request_id())
    })?;
    Ok(())
}

/// Write a simple `<tag>text</tag>` element.
///
/// # Errors
///
/// Returns `io::Error` if writing to the underlying writer fails.
pub fn write_text<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

/// Write `<tag>text</tag>` only when the value is present.
///
/// # Errors
///
/// Returns `io::Error` if writing to the underlying writer fails.
pub fn write_optional_text<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&str>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text(writer, tag, v)?;
    }
    Ok(())
}

/// Inject the namespace attribute and the lowercase `requestId` element a
/// compute-style caller-built document is expected to carry.
fn inject_ec2_envelope(body: &str, xmlns: &str, request_id: &str) -> String {
    let mut out = body.to_owned();

    // Find the opening tag of the root element, skipping any declaration.
    if let Some(start) = find_root_start(&out) {
        if let Some(rel_end) = out[start..].find('>') {
            let mut end = start + rel_end;
            let opening = &out[start..end];
            if !opening.contains("xmlns") {
                let attr = format!(" xmlns=\"{xmlns}\"");
                let insert_at = if opening.ends_with('/') { end - 1 } else { end };
                out.insert_str(insert_at, &attr);
                end += attr.len();
            }
            // A self-closing root has no closing tag for the requestId to
            // land inside; expand it first.
            if out[start..end].ends_with('/') {
                let name: String = out[start + 1..]
                    .chars()
                    .take_while(|c| !c.is_whitespace() && *c != '/' && *c != '>')
                    .collect();
                out.replace_range(end - 1..=end, ">");
                out.push_str(&format!("</{name}>"));
            }
        }
    }

    // Inject <requestId> before the final closing tag.
    let request_element = format!("<requestId>{request_id}</requestId>");
    if let Some(close) = out.rfind("</") {
        out.insert_str(close, &request_element);
    } else {
        out.push_str(&request_element);
    }
    out
}

fn find_root_start(body: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(rel) = body[offset..].find('<') {
        let pos = offset + rel;
        let rest = &body[pos..];
        if rest.starts_with("<?") || rest.starts_with("<!--") {
            offset = pos + body[pos..].find('>').map_or(1, |e| e + 1);
            continue;
        }
        return Some(pos);
    }
    None
}
