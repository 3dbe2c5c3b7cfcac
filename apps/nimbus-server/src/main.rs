//! Nimbus Server - a multi-service cloud API emulator.
//!
//! One listener hosts every registered service; a routing cascade picks the
//! target service per request from host, headers, credential scope, and
//! body signals.
//!
//! # Usage
//!
//! ```text
//! GATEWAY_LISTEN=0.0.0.0:4566 nimbus-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:4566` | Bind address |
//! | `DEFAULT_REGION` | `us-east-1` | Region stamped into request contexts |
//! | `VALIDATE_RESPONSES` | `false` | Format-check encoded response bodies |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod http;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use nimbus_core::NimbusConfig;
use nimbus_gateway::Gateway;
use nimbus_iam::IamService;
use nimbus_s3::S3Service;

use crate::http::GatewayHttpService;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Assemble the gateway with every service this binary hosts.
fn build_gateway(config: &NimbusConfig) -> Result<Gateway> {
    let builder = Gateway::builder()
        .default_region(&config.default_region)
        .validate_responses(config.validate_responses);
    let store = builder.store();

    let gateway = builder
        .service(Arc::new(IamService::new(Arc::clone(&store))))
        .context("failed to register iam")?
        .service(Arc::new(S3Service::new(store)))
        .context("failed to register s3")?
        .build();
    Ok(gateway)
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve(listener: TcpListener, service: GatewayHttpService) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = NimbusConfig::from_env();
    init_tracing(&config.log_level)?;

    let gateway = build_gateway(&config)?;
    let service = GatewayHttpService::new(Arc::new(gateway));
    let service_names = service.service_names();

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        services = ?service_names,
        region = %config.default_region,
        "starting Nimbus Server",
    );

    serve(listener, service).await
}
