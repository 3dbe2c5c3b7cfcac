//! S3 bucket emulation over the RestXML protocol.
//!
//! The one service addressed by host shape rather than an action name:
//! operations are derived from the HTTP method and the bucket extracted
//! from a virtual-hosted host or the first path segment. Success bodies go
//! through the typed root-element path only.

mod model;
mod service;

pub use model::Bucket;
pub use service::S3Service;
