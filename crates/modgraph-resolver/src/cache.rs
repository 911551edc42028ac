//! Per-resolution memoization of provider lookups.
//!
//! Each component's metadata is fetched at most once per resolution, even
//! when an evicted candidate is selected again and its subtree replayed.

use modgraph_core::identity::{ComponentId, ModuleIdentity, ModuleVersionId};
use modgraph_core::metadata::ComponentMetadata;
use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::MetadataProvider;

/// Outcome of one metadata lookup.
#[derive(Debug, Clone)]
pub enum MetadataLookup {
    Found(Arc<ComponentMetadata>),
    Missing,
    /// Messages of the provider's error chain, outermost first.
    Failed(Vec<String>),
}

pub struct MetadataCache<'p> {
    provider: &'p dyn MetadataProvider,
    components: HashMap<ComponentId, MetadataLookup>,
    versions: HashMap<ModuleIdentity, Result<Arc<Vec<String>>, Vec<String>>>,
    fetches: usize,
}

impl<'p> MetadataCache<'p> {
    pub fn new(provider: &'p dyn MetadataProvider) -> Self {
        Self {
            provider,
            components: HashMap::new(),
            versions: HashMap::new(),
            fetches: 0,
        }
    }

    pub fn module(&mut self, id: &ModuleVersionId) -> MetadataLookup {
        let key = ComponentId::Module(id.clone());
        if let Some(hit) = self.components.get(&key) {
            return hit.clone();
        }
        self.fetches += 1;
        let lookup = to_lookup(self.provider.component_metadata(id));
        self.components.insert(key, lookup.clone());
        lookup
    }

    pub fn project(&mut self, path: &str) -> MetadataLookup {
        let key = ComponentId::project(path);
        if let Some(hit) = self.components.get(&key) {
            return hit.clone();
        }
        self.fetches += 1;
        let lookup = to_lookup(self.provider.project_metadata(path));
        self.components.insert(key, lookup.clone());
        lookup
    }

    pub fn versions(&mut self, module: &ModuleIdentity) -> Result<Arc<Vec<String>>, Vec<String>> {
        if let Some(hit) = self.versions.get(module) {
            return hit.clone();
        }
        let listed = self
            .provider
            .list_versions(module)
            .map(Arc::new)
            .map_err(|e| e.chain().map(|c| c.to_string()).collect());
        self.versions.insert(module.clone(), listed.clone());
        listed
    }

    /// Provider calls made for component metadata so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }
}

fn to_lookup(result: miette::Result<Option<ComponentMetadata>>) -> MetadataLookup {
    match result {
        Ok(Some(metadata)) => MetadataLookup::Found(Arc::new(metadata)),
        Ok(None) => MetadataLookup::Missing,
        Err(e) => MetadataLookup::Failed(e.chain().map(|c| c.to_string()).collect()),
    }
}
