//! Cache-racing HTTP request pipeline with pluggable response
//! classification.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable request descriptions, payload shapes, configuration
//! - [`core`] - Pure canonicalization and response classification
//! - [`effects`] - I/O operations with trait abstraction
//!
//! # Key behavior
//!
//! - **Cache-then-live**: a run with caching enabled offers the last stored
//!   payload before the network result, with consecutive duplicates
//!   suppressed
//! - **Authoritative live branch**: transport and classification errors
//!   terminate the run; cache failures degrade silently
//! - **Mechanism-only**: no retry policy, no UI concepts; callers attach
//!   hooks and an error mapper

mod core;
mod data;
mod effects;
mod error;

pub use crate::core::{ErrorMapper, cache_key, classify};
pub use data::{
    AfterResponse, BasicAuth, BeforeSend, Encoding, Hooks, LogFlags, Method, Outcome, Payload,
    RawResponse, Request, Shape, UploadPart,
};
pub use effects::{Emissions, Pipeline, ReqwestTransport, Transport, TransportError};
pub use error::ClientError;
