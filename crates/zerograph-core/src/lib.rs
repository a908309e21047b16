//! zerograph-core: Wire codec, configuration, and error handling for the Zerograph client.
//!
//! This crate provides the transport-independent pieces shared by every
//! Zerograph component:
//! - Request encoding, including pointer (forward reference) arguments
//! - Reply stream decoding into per-request documents
//! - Property maps with null-as-absence semantics
//! - Client configuration
//! - Common error types

pub mod config;
pub mod error;
pub mod pointer;
pub mod properties;
pub mod reply;
pub mod request;

pub use config::ClientConfig;
pub use error::{GraphError, RemoteError, Result, Status};
pub use pointer::{PipelineId, Pointer};
pub use properties::PropertySet;
pub use reply::Document;
pub use request::{Argument, Method, Request, Resource};
