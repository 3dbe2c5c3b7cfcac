//! Integration tests for the Nimbus server.
//!
//! Each test spins up a full gateway (IAM + S3) behind a real listener on
//! an ephemeral port and drives it over HTTP with `reqwest`. Service
//! selection in these tests rides on the `X-Forwarded-Host` header, which
//! the router prefers over `Host`, so one loopback listener can play every
//! subdomain.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;

use nimbus_gateway::Gateway;
use nimbus_iam::IamService;
use nimbus_protocol::Request;
use nimbus_s3::S3Service;

mod test_iam;
mod test_routing;
mod test_s3;

/// A gateway serving on an ephemeral loopback port.
pub struct TestServer {
    /// Base URL of the listener, e.g. `http://127.0.0.1:49512`.
    pub base_url: String,
    gateway: Arc<Gateway>,
}

impl TestServer {
    /// Clear all service state.
    pub fn reset(&self) {
        self.gateway.reset();
    }
}

impl std::fmt::Debug for TestServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestServer")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Start a full gateway (IAM + S3) on an ephemeral port.
///
/// The accept loop runs on a background task for the lifetime of the test
/// runtime; dropping the server does not tear it down early, which is fine
/// for per-test runtimes.
pub async fn start_server() -> TestServer {
    let builder = Gateway::builder();
    let store = builder.store();
    let gateway = Arc::new(
        builder
            .service(Arc::new(IamService::new(Arc::clone(&store))))
            .expect("register iam")
            .service(Arc::new(S3Service::new(store)))
            .expect("register s3")
            .build(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");

    let accept_gateway = Arc::clone(&gateway);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let gateway = Arc::clone(&accept_gateway);
            tokio::spawn(async move {
                let service =
                    service_fn(move |req| handle_connection(Arc::clone(&gateway), req));
                let _ = HttpConnBuilder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    TestServer {
        base_url: format!("http://{addr}"),
        gateway,
    }
}

async fn handle_connection(
    gateway: Arc<Gateway>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let bytes = body
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .unwrap_or_default();
    let path = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_owned(), |pq| pq.as_str().to_owned());

    let response = gateway
        .dispatch(Request::new(parts.method, path, parts.headers, bytes))
        .await;

    let mut builder = hyper::Response::builder().status(response.status);
    if let Some(headers) = builder.headers_mut() {
        *headers = response.headers;
    }
    Ok(builder
        .body(Full::new(response.body))
        .expect("response build cannot fail with valid parts"))
}

/// Generate a unique resource name for a test.
#[must_use]
pub fn test_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}
