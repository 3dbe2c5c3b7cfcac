//! The hyper-facing adapter over the gateway.
//!
//! Health-check endpoints (`/_nimbus/health`, `/_health`, `/health`) are
//! intercepted here and answered from the registered-service list; every
//! other request is collected into a neutral [`Request`] and dispatched.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::Service;

use nimbus_gateway::Gateway;
use nimbus_protocol::{Request, Response};

/// Server version reported in health check responses.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hyper service wrapping a shared [`Gateway`].
#[derive(Debug, Clone)]
pub struct GatewayHttpService {
    gateway: Arc<Gateway>,
}

impl GatewayHttpService {
    /// Wrap a gateway for serving.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// The registered service names, for startup logging.
    pub fn service_names(&self) -> Vec<String> {
        self.gateway
            .service_names()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }
}

impl Service<http::Request<Incoming>> for GatewayHttpService {
    type Response = http::Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        if is_health_check(req.method(), req.uri().path()) {
            let body = health_body(&self.gateway);
            return Box::pin(async move { Ok(health_response(&body)) });
        }

        let gateway = Arc::clone(&self.gateway);
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read request body");
                    return Ok(plain_response(
                        http::StatusCode::BAD_REQUEST,
                        "failed to read request body",
                    ));
                }
            };

            let path = parts
                .uri
                .path_and_query()
                .map_or_else(|| parts.uri.path().to_owned(), |pq| pq.as_str().to_owned());
            let request = Request::new(parts.method, path, parts.headers, bytes);
            let response = gateway.dispatch(request).await;
            Ok(to_http(response))
        })
    }
}

/// Convert a neutral response into a hyper response.
fn to_http(response: Response) -> http::Response<Full<Bytes>> {
    let mut builder = http::Response::builder().status(response.status);
    if let Some(headers) = builder.headers_mut() {
        *headers = response.headers;
    }
    builder
        .body(Full::new(response.body))
        .unwrap_or_else(|_| plain_response(http::StatusCode::INTERNAL_SERVER_ERROR, ""))
}

fn plain_response(status: http::StatusCode, body: &'static str) -> http::Response<Full<Bytes>> {
    let mut response = http::Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

/// Check if the request is a health check probe.
fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET
        && (path == "/_nimbus/health" || path == "/_health" || path == "/health")
}

fn health_body(gateway: &Gateway) -> String {
    let services: serde_json::Map<String, serde_json::Value> = gateway
        .service_names()
        .into_iter()
        .map(|name| (name.to_owned(), serde_json::Value::from("running")))
        .collect();
    serde_json::json!({ "services": services, "version": VERSION }).to_string()
}

fn health_response(body: &str) -> http::Response<Full<Bytes>> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body.to_owned())))
        .unwrap_or_else(|_| plain_response(http::StatusCode::OK, "{}"))
}
