//! The capability contract every emulated service implements.

use async_trait::async_trait;
use http::StatusCode;

use nimbus_protocol::encode::new_request_id;
use nimbus_protocol::validate::SchemaRegistry;
use nimbus_protocol::{Request, Response};

/// Per-request metadata threaded through `handle` calls.
///
/// The context is currently informational (request id and region for
/// logging and response bodies); no cancellation or deadline is consulted
/// through it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The unique id assigned to this request at dispatch time.
    pub request_id: String,
    /// The region this request is handled under.
    pub region: String,
}

impl RequestContext {
    /// Create a context with a fresh request id.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            request_id: new_request_id(),
            region: region.into(),
        }
    }
}

/// A domain failure a service returns from `handle`.
///
/// The gateway converts these into the service's protocol-native error
/// envelope; services never build error bodies themselves.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// HTTP status of the error response.
    pub status: StatusCode,
}

impl ServiceError {
    /// Create an error with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    /// A 400 validation failure.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "ValidationException", message)
    }

    /// A 400 unknown-action failure.
    #[must_use]
    pub fn invalid_action(action: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "InvalidAction",
            format!("unknown action: {action}"),
        )
    }

    /// A 404 resource failure with a service-specific code.
    #[must_use]
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    /// A 500 internal failure. The message is logged, not echoed, by
    /// callers that treat internals as sensitive.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", message)
    }
}

/// An emulated cloud API.
///
/// `name` and `handle` are the core contract. The remaining methods are
/// optional capabilities with inert defaults: a service that publishes
/// `supported_actions` participates in form-body action sniffing, one that
/// implements `extract_action` names its own operations for logging and
/// validation, and `register_shapes` feeds the schema registry at startup.
#[async_trait]
pub trait CloudService: std::fmt::Debug + Send + Sync + 'static {
    /// The service's canonical internal identifier (e.g. `"iam"`).
    fn name(&self) -> &'static str;

    /// Handle a routed request, producing a protocol-correct success
    /// response or a domain error for the gateway to encode.
    async fn handle(&self, ctx: &RequestContext, request: &Request)
    -> Result<Response, ServiceError>;

    /// The actions this service answers to, for form-body routing.
    fn supported_actions(&self) -> &'static [&'static str] {
        &[]
    }

    /// Name the operation a request targets, when the service can tell.
    fn extract_action(&self, request: &Request) -> Option<String> {
        let _ = request;
        None
    }

    /// Register request-shape descriptors for validation.
    fn register_shapes(&self, registry: &mut SchemaRegistry) {
        let _ = registry;
    }
}
