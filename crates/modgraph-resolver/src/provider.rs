//! Where component metadata comes from.

use modgraph_core::catalog::ModuleCatalog;
use modgraph_core::identity::{ModuleIdentity, ModuleVersionId};
use modgraph_core::metadata::ComponentMetadata;

/// Supplies component metadata to the graph builder.
///
/// `Ok(None)` and `Err` both turn into an unresolved edge.
pub trait MetadataProvider {
    fn component_metadata(&self, id: &ModuleVersionId) -> miette::Result<Option<ComponentMetadata>>;

    fn project_metadata(&self, path: &str) -> miette::Result<Option<ComponentMetadata>>;

    /// Known versions of a module, for dynamic selectors.
    fn list_versions(&self, module: &ModuleIdentity) -> miette::Result<Vec<String>>;
}

impl MetadataProvider for ModuleCatalog {
    fn component_metadata(&self, id: &ModuleVersionId) -> miette::Result<Option<ComponentMetadata>> {
        Ok(self.module(id).cloned())
    }

    fn project_metadata(&self, path: &str) -> miette::Result<Option<ComponentMetadata>> {
        Ok(self.project(path).cloned())
    }

    fn list_versions(&self, module: &ModuleIdentity) -> miette::Result<Vec<String>> {
        Ok(self.versions_of(module))
    }
}
