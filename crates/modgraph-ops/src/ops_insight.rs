//! Operation: explain why a module was selected and how it is reached.

use std::path::{Path, PathBuf};

use modgraph_core::catalog::ModuleCatalog;
use modgraph_resolver::render::DependencyTree;
use modgraph_resolver::resolver::DependencyResolver;
use modgraph_util::errors::ModgraphError;

const MAX_PATHS: usize = 32;

/// Options for `modgraph insight`.
#[derive(Debug, Default)]
pub struct InsightOptions {
    pub config: Option<PathBuf>,
}

/// Print the selected version of `module`, its selection reason, every
/// path from the root, and the components requesting it.
pub fn insight(catalog_path: &Path, module: &str, opts: &InsightOptions) -> miette::Result<()> {
    let catalog = ModuleCatalog::from_path(catalog_path)?;
    let config = crate::load_config(opts.config.as_deref())?;
    let results = DependencyResolver::new(&catalog, config).resolve(catalog.root())?;
    let tree = DependencyTree::new(&results.graph);

    let Some(component) = tree.find(module) else {
        return Err(ModgraphError::Generic {
            message: format!("Module '{module}' is not part of the resolved graph"),
        }
        .into());
    };

    println!("{}", component.module_version);
    println!("  selected by: {}", component.reason);
    if let Some(repository) = &component.repository {
        println!("  from repository: {repository}");
    }
    for variant in &component.selected_variants {
        println!("  variant: {}", variant.name);
    }

    let paths = tree.find_all_paths(module, MAX_PATHS);
    println!();
    println!("Paths ({}):", paths.len());
    for path in &paths {
        let rendered: Vec<String> = path.iter().map(|c| c.module_version.to_string()).collect();
        println!("  {}", rendered.join(" --> "));
    }
    if paths.len() == MAX_PATHS {
        tracing::debug!("Stopped after {MAX_PATHS} paths to {module}");
    }

    println!();
    print!("{}", tree.print_inverted_tree(module));
    Ok(())
}
