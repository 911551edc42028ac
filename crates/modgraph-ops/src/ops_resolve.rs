//! Operation: resolve a catalog's root component and print the result.

use std::path::{Path, PathBuf};

use serde::Serialize;

use modgraph_core::catalog::ModuleCatalog;
use modgraph_core::config::SerializationMode;
use modgraph_core::lockfile::LockState;
use modgraph_resolver::conflict::ConflictReport;
use modgraph_resolver::render::DependencyTree;
use modgraph_resolver::resolver::{DependencyResolver, ResolverResults};
use modgraph_resolver::result::ResolvedGraph;
use modgraph_util::errors::ModgraphError;
use modgraph_util::status;

/// Options for `modgraph resolve`.
#[derive(Debug, Default)]
pub struct ResolveOptions {
    /// Resolution config file.
    pub config: Option<PathBuf>,
    /// Lock file the result is checked against.
    pub lock: Option<PathBuf>,
    /// Write a lock file for the resolved versions.
    pub write_lock: Option<PathBuf>,
    /// Maximum tree depth to display.
    pub depth: Option<usize>,
    /// Write the serialized result stream here.
    pub output: Option<PathBuf>,
    /// Print a JSON summary instead of the tree.
    pub json: bool,
}

#[derive(Serialize)]
struct ResolveSummary<'a> {
    root: String,
    metadata_fetches: usize,
    conflicts: &'a ConflictReport,
    failures: Vec<FailureSummary>,
    graph: &'a ResolvedGraph,
}

#[derive(Serialize)]
struct FailureSummary {
    from: String,
    requested: String,
    message: String,
}

/// Resolve the root of the catalog at `catalog_path`.
///
/// Fails after printing when any edge stayed unresolved.
pub fn resolve(catalog_path: &Path, opts: &ResolveOptions) -> miette::Result<()> {
    let results = run(catalog_path, opts)?;
    let graph = &results.graph;

    if let Some(output) = &opts.output {
        let mut file = std::fs::File::create(output).map_err(ModgraphError::Io)?;
        let written = results.stream.data().write_to(&mut file)?;
        status::status_info("Wrote", &format!("{} ({written} bytes)", output.display()));
    }

    if let Some(path) = &opts.write_lock {
        let lock = LockState::from_versions(
            graph
                .components()
                .filter(|c| !c.component_id.is_project())
                .map(|c| &c.module_version),
        );
        let content = lock.to_string_pretty().map_err(|e| ModgraphError::Generic {
            message: format!("Failed to serialize lock state: {e}"),
        })?;
        std::fs::write(path, content).map_err(ModgraphError::Io)?;
        status::status_info("Locked", &format!("{} modules in {}", lock.module.len(), path.display()));
    }

    if opts.json {
        print_json(&results)?;
    } else {
        print_text(&results, opts.depth);
    }

    let failures = results.failures();
    if failures.is_empty() {
        status::status(
            "Resolved",
            &format!("{} components ({} conflicts)", graph.len(), results.conflicts.len()),
        );
        Ok(())
    } else {
        Err(ModgraphError::Resolution {
            message: format!(
                "Could not resolve all dependencies of {}: {} failed",
                graph.root().module_version,
                failures.len()
            ),
        }
        .into())
    }
}

fn run(catalog_path: &Path, opts: &ResolveOptions) -> miette::Result<ResolverResults> {
    let catalog = ModuleCatalog::from_path(catalog_path)?;
    let mut config = crate::load_config(opts.config.as_deref())?;
    if opts.output.is_some() {
        // Streams written to disk never reference the build-tree registry.
        config.serialization = SerializationMode::Complete;
    }

    status::status("Resolving", &catalog.root().module_version.to_string());
    let mut resolver = DependencyResolver::new(&catalog, config);
    if let Some(path) = &opts.lock {
        resolver = resolver.with_lock(LockState::from_path(path)?);
    }
    resolver.resolve(catalog.root())
}

fn print_text(results: &ResolverResults, depth: Option<usize>) {
    let tree = DependencyTree::new(&results.graph);
    print!("{}", tree.print_tree(depth));

    if !results.conflicts.is_empty() {
        println!();
        print!("{}", results.conflicts);
    }

    let failures = results.failures();
    if !failures.is_empty() {
        println!();
        println!("Unresolved dependencies ({}):", failures.len());
        for (from, failure) in failures {
            println!("  {} (from {})", failure, from.module_version);
        }
    }
}

fn print_json(results: &ResolverResults) -> miette::Result<()> {
    let summary = ResolveSummary {
        root: results.graph.root().module_version.to_string(),
        metadata_fetches: results.metadata_fetches,
        conflicts: &results.conflicts,
        failures: results
            .failures()
            .into_iter()
            .map(|(from, failure)| FailureSummary {
                from: from.module_version.to_string(),
                requested: failure.selector.to_string(),
                message: failure.message.clone(),
            })
            .collect(),
        graph: &results.graph,
    };
    let json = serde_json::to_string_pretty(&summary).map_err(|e| ModgraphError::Generic {
        message: format!("Failed to serialize summary: {e}"),
    })?;
    println!("{json}");
    Ok(())
}
