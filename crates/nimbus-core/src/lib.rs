//! Core configuration and state management for Nimbus.
//!
//! This crate provides the foundational building blocks shared across all
//! Nimbus service implementations: the environment-driven configuration and
//! the [`KvStore`] state manager that every emulated service keeps its
//! resources in.

mod config;
mod state;

pub use config::NimbusConfig;
pub use state::{KvStore, StateError};
