//! Shared utilities for modgraph.
//!
//! This crate provides the cross-cutting error type used by all other
//! modgraph crates and the status lines printed by the command-line tool.

pub mod errors;
pub mod status;
