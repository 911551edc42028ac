//! Core data types for modgraph.
//!
//! Identities, attributes, selection reasons, component metadata, the
//! TOML component catalog, resolution configuration and lock state.
//! Nothing in here resolves anything.

pub mod attributes;
pub mod catalog;
pub mod config;
pub mod identity;
pub mod lockfile;
pub mod metadata;
pub mod reason;
