//! IAM role emulation over the Query protocol.
//!
//! Exercises the form-decoding path end to end: indexed-member tag lists on
//! CreateRole, `<Action>Response` envelopes on every success, and role
//! state persisted through the shared [`nimbus_core::KvStore`].

mod model;
mod service;

pub use model::{Role, Tag};
pub use service::IamService;
