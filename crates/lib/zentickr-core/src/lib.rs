//! Core types and services for zentickr.
//!
//! This crate owns the tool catalog, the request handler that validates tool
//! arguments and fans calls out to a [`DataProvider`], and the normalization
//! that turns provider output into plain JSON.

pub mod catalog;
pub mod error;
pub mod handler;
pub mod normalize;
pub mod params;
pub mod provider;

pub use catalog::{Operation, ParamKind, ParameterSpec, ResultShape, ToolCatalog, ToolDescriptor};
pub use error::{CatalogError, ErrorPayload, ProviderError, ProviderResult, ToolError};
pub use handler::{NormalizedResult, RequestHandler, ToolInvocation};
pub use provider::DataProvider;
