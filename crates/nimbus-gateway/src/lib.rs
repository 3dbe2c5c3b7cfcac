//! Service registration, request routing, and dispatch for Nimbus.
//!
//! The gateway owns the startup-built registries (service names, action
//! names, schema descriptors) and the request-time dispatch path: resolve
//! the target service through the routing cascade, validate the payload
//! against any registered descriptor, invoke the service, and convert every
//! failure into the target protocol's error envelope. All registries are
//! read-only once startup registration completes, which is what makes
//! concurrent dispatch safe without locking in this layer.

mod gateway;
mod router;
mod s3_host;
mod service;

pub use gateway::{Gateway, GatewayBuilder};
pub use router::{RoutingError, ServiceRouter};
pub use s3_host::{S3AddressingStyle, S3HostInfo, parse_s3_host};
pub use service::{CloudService, RequestContext, ServiceError};
