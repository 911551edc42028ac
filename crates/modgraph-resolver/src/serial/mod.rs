//! Binary serialization of resolution results.

pub mod codec;
mod component;
pub mod dedup;
pub mod ids;
mod registry;
mod store;
mod stream;

pub use component::{ComponentResultReader, ComponentResultWriter};
pub use registry::{BuildTreeRegistry, ComponentGraphState, VariantGraphState};
pub use store::{BinaryData, BinaryStore, DataReader};
pub use stream::{read_graph, StreamingResolutionResult, StreamingResolutionResultBuilder};
