//! Service registration and the ordered resolution cascade.
//!
//! Both router maps (service name and action name) are built during startup
//! registration and never mutated afterwards. Resolution walks a strict,
//! ordered list of signals; the first layer that yields a candidate wins,
//! and a candidate that names no registered service is a request-time
//! failure, never a guess.

use std::collections::HashMap;
use std::sync::Arc;

use nimbus_protocol::Request;

use crate::s3_host::parse_s3_host;
use crate::service::CloudService;

/// Errors from registration and resolution.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// A second service tried to register an already-taken name. Startup
    /// configuration error; the first registration stays intact.
    #[error("service already registered: {0}")]
    DuplicateService(String),

    /// A second service tried to register an already-taken action name.
    #[error("action {action} already registered by service {service}")]
    DuplicateAction {
        /// The colliding action.
        action: String,
        /// The service that registered it first.
        service: String,
    },

    /// No cascade layer produced a candidate.
    #[error("unable to determine service for request")]
    Undetermined,

    /// A cascade layer produced a candidate no registered service carries.
    #[error("no registered service named {0}")]
    UnknownService(String),
}

/// The startup-built routing tables and the resolution cascade over them.
#[derive(Default)]
pub struct ServiceRouter {
    services: HashMap<String, Arc<dyn CloudService>>,
    actions: HashMap<String, String>,
}

impl std::fmt::Debug for ServiceRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRouter")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl ServiceRouter {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service and all of its published actions.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::DuplicateService`] or
    /// [`RoutingError::DuplicateAction`] on collision; in both cases no
    /// part of the new registration is applied.
    pub fn register(&mut self, service: Arc<dyn CloudService>) -> Result<(), RoutingError> {
        let name = service.name();
        if self.services.contains_key(name) {
            return Err(RoutingError::DuplicateService(name.to_owned()));
        }
        // Check every action before inserting any, so a collision leaves
        // prior registrations untouched.
        for action in service.supported_actions() {
            if let Some(owner) = self.actions.get(*action) {
                return Err(RoutingError::DuplicateAction {
                    action: (*action).to_owned(),
                    service: owner.clone(),
                });
            }
        }
        for action in service.supported_actions() {
            self.actions.insert((*action).to_owned(), name.to_owned());
        }
        self.services.insert(name.to_owned(), service);
        Ok(())
    }

    /// Look up a registered service by name.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&Arc<dyn CloudService>> {
        self.services.get(name)
    }

    /// The registered service names, sorted.
    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a request to its target service through the cascade.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Undetermined`] when no layer yields a
    /// candidate, [`RoutingError::UnknownService`] when the winning
    /// candidate names no registered service.
    pub fn resolve(&self, request: &Request) -> Result<&Arc<dyn CloudService>, RoutingError> {
        let candidate = self
            .candidate(request)
            .ok_or(RoutingError::Undetermined)?;
        self.services
            .get(&candidate)
            .ok_or(RoutingError::UnknownService(candidate))
    }

    /// The first cascade layer that yields a candidate identifier wins.
    fn candidate(&self, request: &Request) -> Option<String> {
        // 1. Authenticated-service hint from a validated signature.
        if let Some(hint) = &request.service_hint {
            return Some(signing_name_to_service(hint).to_owned());
        }

        // 2. Recognized first-label subdomain.
        if let Some(host) = request.host() {
            if let Some(label) = host.split('.').next() {
                let mapped = signing_name_to_service(label);
                if self.services.contains_key(mapped) {
                    return Some(mapped.to_owned());
                }
            }
        }

        // 3. Target-operation header "<Prefix>.<Action>"; an unrecognized
        //    prefix is still a best-effort lowercased identifier.
        if let Some(target) = request.header("x-amz-target") {
            let prefix = target.split('.').next().unwrap_or(target);
            return Some(match target_prefix_to_service(prefix) {
                Some(service) => service.to_owned(),
                None => prefix.to_ascii_lowercase(),
            });
        }

        // 4. Credential scope in the authorization header, for signed
        //    requests that skipped the authentication layer.
        if let Some(service) = request
            .header("authorization")
            .and_then(credential_scope_service)
        {
            return Some(signing_name_to_service(&service).to_owned());
        }

        // 5. Storage addressing-scheme detection on the host.
        if let Some(host) = request.host() {
            if parse_s3_host(host).is_some() {
                return Some("s3".to_owned());
            }
        }

        // 6. Form-body action sniffing, unsigned form POSTs only.
        if let Some(service) = self.sniff_form_action(request) {
            return Some(service);
        }

        // 7. Fallback: first non-generic host label, then first path
        //    segment, verbatim.
        if let Some(host) = request.host() {
            if let Some(label) = host.split('.').find(|l| !is_generic_label(l)) {
                return Some(label.to_owned());
            }
        }
        request.first_path_segment().map(str::to_owned)
    }

    /// Look up the form body's `Action` field in the action map. Applies
    /// only to unsigned form-encoded POSTs; the body is owned bytes, so
    /// reading it here leaves it intact for the handler.
    fn sniff_form_action(&self, request: &Request) -> Option<String> {
        if request.method != http::Method::POST
            || request.header("authorization").is_some()
            || request.body.is_empty()
        {
            return None;
        }
        let form_encoded = request
            .header("content-type")
            .is_none_or(|ct| ct.contains("x-www-form-urlencoded"));
        if !form_encoded {
            return None;
        }
        form_urlencoded::parse(&request.body)
            .find(|(key, _)| key == "Action")
            .and_then(|(_, action)| self.actions.get(action.as_ref()).cloned())
    }
}

/// Map external signing names and subdomain labels to internal service ids.
fn signing_name_to_service(name: &str) -> &str {
    match name {
        "monitoring" => "cloudwatch",
        "states" => "stepfunctions",
        "email" => "ses",
        "execute-api" => "apigateway",
        other => other,
    }
}

/// Known SDK-generated target-header prefixes.
fn target_prefix_to_service(prefix: &str) -> Option<&'static str> {
    match prefix {
        "DynamoDB_20120810" => Some("dynamodb"),
        "Kinesis_20131202" => Some("kinesis"),
        "Firehose_20150804" => Some("firehose"),
        "Logs_20140328" => Some("logs"),
        "AWSEvents" => Some("events"),
        "AWSStepFunctions" => Some("stepfunctions"),
        "TrentService" => Some("kms"),
        "secretsmanager" => Some("secretsmanager"),
        "AmazonSQS" => Some("sqs"),
        _ => None,
    }
}

/// Extract the service component of a SigV4 credential scope:
/// `... Credential=<key>/<date>/<region>/<service>/aws4_request, ...`.
fn credential_scope_service(authorization: &str) -> Option<String> {
    let credential = authorization
        .split(|c: char| c == ',' || c.is_whitespace())
        .find_map(|part| part.strip_prefix("Credential="))?;
    let mut components = credential.split('/');
    let _access_key = components.next()?;
    let _date = components.next()?;
    let _region = components.next()?;
    let service = components.next()?;
    let terminator = components.next()?;
    if terminator != "aws4_request" || service.is_empty() {
        return None;
    }
    Some(service.to_owned())
}

/// Host labels that can never identify a service.
fn is_generic_label(label: &str) -> bool {
    matches!(
        label,
        "www" | "api" | "localhost" | "amazonaws" | "aws" | "example" | "com" | "internal"
    ) || label.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::StatusCode;

    use nimbus_protocol::Response;

    use crate::service::{RequestContext, ServiceError};

    use super::*;

    #[derive(Debug)]
    struct StubService {
        name: &'static str,
        actions: &'static [&'static str],
    }

    #[async_trait]
    impl CloudService for StubService {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn handle(
            &self,
            _ctx: &RequestContext,
            _request: &Request,
        ) -> Result<Response, ServiceError> {
            Ok(Response::new(StatusCode::OK))
        }

        fn supported_actions(&self) -> &'static [&'static str] {
            self.actions
        }
    }

    fn router() -> ServiceRouter {
        let mut router = ServiceRouter::new();
        router
            .register(Arc::new(StubService {
                name: "iam",
                actions: &["CreateRole", "GetRole", "ListRoles", "DeleteRole"],
            }))
            .unwrap();
        router
            .register(Arc::new(StubService {
                name: "s3",
                actions: &[],
            }))
            .unwrap();
        router
            .register(Arc::new(StubService {
                name: "dynamodb",
                actions: &[],
            }))
            .unwrap();
        router
    }

    fn request(method: http::Method, path: &str, headers: &[(&str, &str)], body: &[u8]) -> Request {
        let mut map = http::HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                http::header::HeaderName::try_from(*name).unwrap(),
                http::header::HeaderValue::from_str(value).unwrap(),
            );
        }
        Request::new(method, path, map, Bytes::copy_from_slice(body))
    }

    #[test]
    fn test_should_reject_duplicate_service_name() {
        let mut router = router();
        let err = router
            .register(Arc::new(StubService {
                name: "iam",
                actions: &[],
            }))
            .unwrap_err();
        assert!(matches!(err, RoutingError::DuplicateService(name) if name == "iam"));
        // Prior registration intact.
        assert!(router.service("iam").is_some());
    }

    #[test]
    fn test_should_reject_duplicate_action_and_keep_prior_map() {
        let mut router = router();
        let err = router
            .register(Arc::new(StubService {
                name: "fakeiam",
                actions: &["Whatever", "CreateRole"],
            }))
            .unwrap_err();
        assert!(matches!(err, RoutingError::DuplicateAction { .. }));
        // Nothing from the failed registration leaked in.
        assert!(router.service("fakeiam").is_none());
        assert_eq!(router.actions.get("Whatever"), None);
    }

    #[test]
    fn test_should_prefer_service_hint_over_everything() {
        let router = router();
        let req = request(
            http::Method::POST,
            "/",
            &[("host", "s3.example.com")],
            b"Action=CreateRole",
        )
        .with_service_hint("iam");
        assert_eq!(router.resolve(&req).unwrap().name(), "iam");
    }

    #[test]
    fn test_should_resolve_subdomain_before_form_sniffing() {
        let router = router();
        // No Authorization header; subdomain still outranks the form body.
        let req = request(
            http::Method::POST,
            "/",
            &[("host", "iam.example.com")],
            b"Action=CreateRole&RoleName=TestRole",
        );
        assert_eq!(router.resolve(&req).unwrap().name(), "iam");
    }

    #[test]
    fn test_should_resolve_known_target_prefix() {
        let router = router();
        let req = request(
            http::Method::POST,
            "/",
            &[
                ("host", "localhost"),
                ("x-amz-target", "DynamoDB_20120810.PutItem"),
            ],
            b"{}",
        );
        assert_eq!(router.resolve(&req).unwrap().name(), "dynamodb");
    }

    #[test]
    fn test_should_fail_on_unrecognized_target_prefix() {
        let router = router();
        let req = request(
            http::Method::POST,
            "/",
            &[("host", "localhost"), ("x-amz-target", "NotAService.Op")],
            b"{}",
        );
        let err = router.resolve(&req).unwrap_err();
        assert!(matches!(err, RoutingError::UnknownService(name) if name == "notaservice"));
    }

    #[test]
    fn test_should_resolve_credential_scope() {
        let router = router();
        let req = request(
            http::Method::POST,
            "/",
            &[
                ("host", "localhost"),
                (
                    "authorization",
                    "AWS4-HMAC-SHA256 Credential=AKIAEXAMPLE/20260827/us-east-1/iam/aws4_request, \
                     SignedHeaders=host, Signature=deadbeef",
                ),
            ],
            b"Action=CreateRole",
        );
        assert_eq!(router.resolve(&req).unwrap().name(), "iam");
    }

    #[test]
    fn test_should_resolve_virtual_hosted_storage_host() {
        let router = router();
        let req = request(
            http::Method::GET,
            "/",
            &[("host", "my-bucket.s3.127.0.0.1.nip.io:8080")],
            b"",
        );
        assert_eq!(router.resolve(&req).unwrap().name(), "s3");
    }

    #[test]
    fn test_should_sniff_form_action_for_unsigned_posts_only() {
        let router = router();
        let req = request(
            http::Method::POST,
            "/",
            &[("host", "localhost")],
            b"Action=ListRoles",
        );
        assert_eq!(router.resolve(&req).unwrap().name(), "iam");

        // A signed request must not be sniffed; the credential scope layer
        // already answered for it.
        let signed = request(
            http::Method::POST,
            "/",
            &[
                ("host", "localhost"),
                (
                    "authorization",
                    "AWS4-HMAC-SHA256 Credential=AKIA/20260827/us-east-1/dynamodb/aws4_request",
                ),
            ],
            b"Action=ListRoles",
        );
        assert_eq!(router.resolve(&signed).unwrap().name(), "dynamodb");
    }

    #[test]
    fn test_should_fall_back_to_first_path_segment() {
        let router = router();
        let req = request(http::Method::GET, "/iam/roles", &[("host", "localhost")], b"");
        assert_eq!(router.resolve(&req).unwrap().name(), "iam");
    }

    #[test]
    fn test_should_fail_when_no_layer_matches() {
        let router = router();
        let req = request(http::Method::GET, "/", &[("host", "localhost")], b"");
        assert!(matches!(
            router.resolve(&req).unwrap_err(),
            RoutingError::Undetermined
        ));
    }

    #[test]
    fn test_should_fail_for_unregistered_fallback_candidate() {
        let router = router();
        let req = request(http::Method::GET, "/nosuch/thing", &[("host", "localhost")], b"");
        assert!(matches!(
            router.resolve(&req).unwrap_err(),
            RoutingError::UnknownService(name) if name == "nosuch"
        ));
    }
}
