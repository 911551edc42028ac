//! Operation: decode a serialized result stream and print its tree.

use std::path::Path;

use modgraph_resolver::render::DependencyTree;
use modgraph_resolver::serial::{read_graph, BinaryData};
use modgraph_util::errors::ModgraphError;

/// Decode the stream at `path`, written by `modgraph resolve --output`.
pub fn replay(path: &Path, depth: Option<usize>) -> miette::Result<()> {
    let bytes = std::fs::read(path).map_err(ModgraphError::Io)?;
    tracing::debug!("Replaying {} bytes from {}", bytes.len(), path.display());
    let graph = read_graph(&BinaryData::from_bytes(bytes), None)?;

    print!("{}", DependencyTree::new(&graph).print_tree(depth));
    let unresolved = graph.unresolved();
    if !unresolved.is_empty() {
        println!();
        println!("Unresolved dependencies ({}):", unresolved.len());
        for (from, failure) in unresolved {
            println!("  {} (from {})", failure, from.module_version);
        }
    }
    Ok(())
}
