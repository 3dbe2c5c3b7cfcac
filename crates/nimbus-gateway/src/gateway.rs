//! The owned emulator handle: registries plus state store plus dispatch.

use std::sync::Arc;

use http::StatusCode;

use nimbus_core::KvStore;
use nimbus_protocol::decode::{self, DecodeError};
use nimbus_protocol::encode::{encode_error, protocol_for_service};
use nimbus_protocol::validate::{SchemaRegistry, infer_protocol, validate_response_body};
use nimbus_protocol::{ProtocolType, Request, Response};

use crate::router::{RoutingError, ServiceRouter};
use crate::service::{CloudService, RequestContext};

/// Assembles a [`Gateway`] from registered services and configuration.
#[derive(Debug)]
pub struct GatewayBuilder {
    router: ServiceRouter,
    registry: SchemaRegistry,
    store: Arc<KvStore>,
    default_region: String,
    validate_responses: bool,
}

impl GatewayBuilder {
    /// The state store the built gateway will own; services constructed
    /// before `build` share it through this handle.
    #[must_use]
    pub fn store(&self) -> Arc<KvStore> {
        Arc::clone(&self.store)
    }

    /// Register a service: routing tables and schema descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] on a name or action collision; prior
    /// registrations stay intact.
    pub fn service(mut self, service: Arc<dyn CloudService>) -> Result<Self, RoutingError> {
        service.register_shapes(&mut self.registry);
        self.router.register(service)?;
        Ok(self)
    }

    /// Set the region stamped into request contexts.
    #[must_use]
    pub fn default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = region.into();
        self
    }

    /// Run the permissive format check over every encoded response body.
    #[must_use]
    pub fn validate_responses(mut self, enabled: bool) -> Self {
        self.validate_responses = enabled;
        self
    }

    /// Finish assembly.
    #[must_use]
    pub fn build(self) -> Gateway {
        Gateway {
            router: self.router,
            registry: self.registry,
            store: self.store,
            default_region: self.default_region,
            validate_responses: self.validate_responses,
        }
    }
}

/// The emulator: startup-built registries, the shared state store, and the
/// request dispatch path. An explicit constructed value with no ambient
/// global; embedders hold it directly and may [`reset`](Gateway::reset) it
/// between test cases.
#[derive(Debug)]
pub struct Gateway {
    router: ServiceRouter,
    registry: SchemaRegistry,
    store: Arc<KvStore>,
    default_region: String,
    validate_responses: bool,
}

impl Gateway {
    /// Start assembling a gateway around a fresh state store.
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder {
            router: ServiceRouter::new(),
            registry: SchemaRegistry::new(),
            store: Arc::new(KvStore::new()),
            default_region: "us-east-1".to_owned(),
            validate_responses: false,
        }
    }

    /// The shared state store services persist into.
    #[must_use]
    pub fn store(&self) -> Arc<KvStore> {
        Arc::clone(&self.store)
    }

    /// Clear all service state. Embedded-mode lifecycle hook.
    pub fn reset(&self) {
        self.store.reset();
    }

    /// The registered service names, sorted.
    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        self.router.service_names()
    }

    /// Route, validate, and handle one request. Every failure on this path
    /// comes back as the target protocol's error envelope; this function
    /// never fails outward.
    pub async fn dispatch(&self, mut request: Request) -> Response {
        let service = match self.router.resolve(&request) {
            Ok(service) => Arc::clone(service),
            Err(err) => return routing_error_response(&err),
        };
        let service_name = service.name();
        let protocol = protocol_for_service(service_name);

        let action = service
            .extract_action(&request)
            .or_else(|| generic_action(&request));
        request.action.clone_from(&action);

        if let Some(action) = &action {
            if let Err(resp) = self.validate_request(service_name, action, protocol, &request) {
                return *resp;
            }
        }

        let ctx = RequestContext::new(&self.default_region);
        tracing::info!(
            request_id = %ctx.request_id,
            service = service_name,
            action = action.as_deref().unwrap_or("-"),
            method = %request.method,
            path = %request.path,
            "dispatching request"
        );

        let response = match service.handle(&ctx, &request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    service = service_name,
                    code = %err.code,
                    "service returned error"
                );
                encode_error(protocol, err.status, &err.code, &err.message)
            }
        };

        if self.validate_responses {
            let inferred =
                infer_protocol(Some(service_name), response.header_str("content-type"));
            if let Err(err) = validate_response_body(inferred, &response.body) {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    service = service_name,
                    error = %err,
                    "response failed format validation"
                );
            }
        }
        response
    }

    /// Check the request payload against a registered descriptor, encoding
    /// any failure into the target protocol. Unregistered actions and
    /// RestXML request bodies are not checked.
    fn validate_request(
        &self,
        service: &str,
        action: &str,
        protocol: ProtocolType,
        request: &Request,
    ) -> Result<(), Box<Response>> {
        let Some(shape) = self.registry.shape(service, action) else {
            return Ok(());
        };
        let payload = match protocol {
            ProtocolType::Query => decode::decode_query(shape, &request.body),
            ProtocolType::Json | ProtocolType::RestJson => decode::decode_json(&request.body),
            ProtocolType::RestXml => return Ok(()),
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(DecodeError::Malformed(err)) => {
                return Err(Box::new(encode_error(
                    protocol,
                    StatusCode::BAD_REQUEST,
                    "SerializationException",
                    &err.to_string(),
                )));
            }
            Err(err @ DecodeError::InvalidScalar { .. }) => {
                return Err(Box::new(encode_error(
                    protocol,
                    StatusCode::BAD_REQUEST,
                    "ValidationException",
                    &err.to_string(),
                )));
            }
        };
        if let Err(err) = self.registry.validate(service, action, &payload) {
            return Err(Box::new(encode_error(
                protocol,
                StatusCode::BAD_REQUEST,
                "ValidationException",
                &err.to_string(),
            )));
        }
        Ok(())
    }
}

/// Name the operation from protocol-generic signals: the target header's
/// suffix, then a form body's `Action` field.
fn generic_action(request: &Request) -> Option<String> {
    if let Some(target) = request.header("x-amz-target") {
        if let Some((_, action)) = target.split_once('.') {
            return Some(action.to_owned());
        }
    }
    if request.method == http::Method::POST {
        return form_urlencoded::parse(&request.body)
            .find(|(key, _)| key == "Action")
            .map(|(_, action)| action.into_owned());
    }
    None
}

fn routing_error_response(err: &RoutingError) -> Response {
    match err {
        RoutingError::UnknownService(name) => encode_error(
            protocol_for_service(name),
            StatusCode::BAD_REQUEST,
            "InvalidAction",
            &err.to_string(),
        ),
        _ => encode_error(
            ProtocolType::Query,
            StatusCode::BAD_REQUEST,
            "InvalidAction",
            &err.to_string(),
        ),
    }
}
