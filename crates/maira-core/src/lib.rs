//! # maira-core
//!
//! Foundation types, wire vocabulary, errors and utilities for the MAIRA
//! realtime session link.
//!
//! This crate provides the shared vocabulary that the other link crates depend on:
//!
//! - **Branded IDs**: `ParticipantId`, `OperationId`, `ElementId` as newtypes for type safety
//! - **Protocol**: outbound/inbound event names, message categories and payload shapes
//! - **Errors**: `LinkError` hierarchy via `thiserror`, with category/severity classification
//! - **Retry**: reconnect policy and capped exponential backoff math
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;
pub mod retry;

pub use errors::{ErrorCategory, ErrorSeverity, LinkError, Result};
pub use ids::{ElementId, OperationId, ParticipantId};
pub use protocol::{MessageCategory, ParticipantIdentity};
pub use retry::ReconnectPolicy;
