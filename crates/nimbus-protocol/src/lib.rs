//! Wire protocol model, request decoding, response encoding, and schema
//! validation for Nimbus.
//!
//! Every emulated service speaks exactly one of four wire protocols
//! ([`ProtocolType`]). This crate owns everything those protocols have in
//! common: the neutral [`Request`]/[`Response`] value objects passed between
//! gateway and services, the descriptor-driven request [`decode`] routines,
//! the byte-exact success/error envelopes in [`encode`], and the permissive
//! shape conformance checks in [`validate`].

pub mod decode;
pub mod encode;
pub mod shape;
pub mod validate;

mod types;

pub use types::{ProtocolType, Request, Response};
