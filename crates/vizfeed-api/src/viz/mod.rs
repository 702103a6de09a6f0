//! Visualization loading: library manifests, the embed document, and the
//! registry that tracks each mounted visualization's lifecycle.

pub mod cleanup;
pub mod document;
pub mod library;
pub mod lifecycle;
pub mod registry;
pub mod routes;

pub use registry::VizRegistry;
