//! Dependency graph resolution engine: version selection, exclusion
//! filters, conflict resolution, graph traversal, and the streamed binary
//! form of resolved graphs.

pub mod builder;
pub mod cache;
pub mod conflict;
pub mod failure;
pub mod filter;
pub mod provider;
pub mod render;
pub mod resolver;
pub mod result;
pub mod serial;
pub mod version;
