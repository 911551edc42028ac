//! A TOML-described universe of components that resolution runs against.
//!
//! ```toml
//! [root]
//! id = "com.example:app:1.0"
//! dependencies = ["org.a:a:1.0", { module = "org.b:b", version = "2.0", force = true }]
//!
//! [[component]]
//! id = "org.a:a:1.0"
//! status = "release"
//!
//! [[component.variant]]
//! name = "runtime"
//! attributes = { usage = "runtime" }
//! dependencies = ["org.c:c:1.+"]
//! ```

use modgraph_util::errors::ModgraphError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::attributes::AttributeContainer;
use crate::identity::{Capability, ComponentId, ComponentSelector, ModuleIdentity, ModuleVersionId};
use crate::metadata::{
    ComponentMetadata, DependencyMetadata, ExcludeRule, VariantMetadata, STATUS_RELEASE,
};

const DEFAULT_VARIANT: &str = "default";

#[derive(Debug, Deserialize)]
struct RawCatalog {
    root: RawComponent,
    #[serde(default)]
    component: Vec<RawComponent>,
}

#[derive(Debug, Deserialize)]
struct RawComponent {
    id: String,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    repository: Option<String>,
    #[serde(default)]
    adhoc: bool,
    #[serde(default)]
    attributes: AttributeContainer,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    excludes: Vec<ExcludeRule>,
    #[serde(default)]
    variant: Vec<RawVariant>,
}

#[derive(Debug, Deserialize)]
struct RawVariant {
    name: String,
    #[serde(default)]
    attributes: AttributeContainer,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    excludes: Vec<ExcludeRule>,
    #[serde(default = "default_true")]
    transitive: bool,
}

/// A dependency entry: either `"group:name:version"` / `":path"` or a table.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Short(String),
    Detailed(DetailedDependency),
}

#[derive(Debug, Deserialize)]
struct DetailedDependency {
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    force: bool,
    #[serde(default)]
    constraint: bool,
    #[serde(default)]
    strict: bool,
    #[serde(default = "default_true")]
    transitive: bool,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    attributes: AttributeContainer,
    #[serde(default)]
    excludes: Vec<ExcludeRule>,
    #[serde(default)]
    reason: Option<String>,
}

fn default_true() -> bool {
    true
}

/// The parsed catalog with lookup indexes.
#[derive(Debug, Clone)]
pub struct ModuleCatalog {
    root: ComponentMetadata,
    components: Vec<ComponentMetadata>,
    by_id: HashMap<ModuleVersionId, usize>,
    by_project: HashMap<String, usize>,
}

impl ModuleCatalog {
    /// Load and parse a catalog file.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ModgraphError::Catalog {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Ok(Self::parse_toml(&content)?)
    }

    pub fn parse_toml(content: &str) -> Result<Self, ModgraphError> {
        let raw: RawCatalog = toml::from_str(content).map_err(|e| ModgraphError::Catalog {
            message: format!("Failed to parse catalog: {e}"),
        })?;
        let root = convert_component(raw.root, true)?;
        let mut catalog = Self {
            root,
            components: Vec::with_capacity(raw.component.len()),
            by_id: HashMap::new(),
            by_project: HashMap::new(),
        };
        for raw_component in raw.component {
            let component = convert_component(raw_component, false)?;
            catalog.insert(component)?;
        }
        tracing::debug!("Loaded catalog with {} components", catalog.components.len());
        Ok(catalog)
    }

    fn insert(&mut self, component: ComponentMetadata) -> Result<(), ModgraphError> {
        let index = self.components.len();
        match &component.id {
            ComponentId::Project { path, .. } => {
                if path == self.root_path() || self.by_project.contains_key(path) {
                    return Err(ModgraphError::Catalog {
                        message: format!("Duplicate project '{path}'"),
                    });
                }
                self.by_project.insert(path.clone(), index);
            }
            ComponentId::Module(id) => {
                if self.by_id.contains_key(id) {
                    return Err(ModgraphError::Catalog {
                        message: format!("Duplicate component '{id}'"),
                    });
                }
                self.by_id.insert(id.clone(), index);
            }
        }
        self.components.push(component);
        Ok(())
    }

    fn root_path(&self) -> &str {
        match &self.root.id {
            ComponentId::Project { path, .. } => path,
            ComponentId::Module(_) => "",
        }
    }

    pub fn root(&self) -> &ComponentMetadata {
        &self.root
    }

    pub fn components(&self) -> &[ComponentMetadata] {
        &self.components
    }

    pub fn module(&self, id: &ModuleVersionId) -> Option<&ComponentMetadata> {
        self.by_id.get(id).map(|&i| &self.components[i])
    }

    pub fn project(&self, path: &str) -> Option<&ComponentMetadata> {
        if path == self.root_path() {
            return Some(&self.root);
        }
        self.by_project.get(path).map(|&i| &self.components[i])
    }

    /// All known versions of a module, in declaration order.
    pub fn versions_of(&self, module: &ModuleIdentity) -> Vec<String> {
        self.components
            .iter()
            .filter_map(|c| match &c.id {
                ComponentId::Module(id) if &id.module == module => Some(id.version.clone()),
                _ => None,
            })
            .collect()
    }
}

fn convert_component(raw: RawComponent, is_root: bool) -> Result<ComponentMetadata, ModgraphError> {
    let module_version = ModuleVersionId::parse(&raw.id).ok_or_else(|| ModgraphError::Catalog {
        message: format!("Invalid component id '{}': expected group:name:version", raw.id),
    })?;
    let project = match raw.project {
        Some(path) => Some(path),
        None if is_root => Some(":".to_string()),
        None => None,
    };
    let id = match project {
        Some(path) => ComponentId::project(path),
        None => ComponentId::Module(module_version.clone()),
    };

    let variants = if raw.variant.is_empty() {
        vec![VariantMetadata {
            name: DEFAULT_VARIANT.to_string(),
            attributes: raw.attributes,
            capabilities: convert_capabilities(&raw.capabilities)?,
            dependencies: convert_dependencies(raw.dependencies)?,
            excludes: raw.excludes,
            transitive: true,
        }]
    } else {
        if !raw.dependencies.is_empty() {
            return Err(ModgraphError::Catalog {
                message: format!(
                    "Component '{}' declares both top-level dependencies and variants",
                    raw.id
                ),
            });
        }
        raw.variant
            .into_iter()
            .map(|v| {
                Ok(VariantMetadata {
                    name: v.name,
                    attributes: v.attributes,
                    capabilities: convert_capabilities(&v.capabilities)?,
                    dependencies: convert_dependencies(v.dependencies)?,
                    excludes: v.excludes,
                    transitive: v.transitive,
                })
            })
            .collect::<Result<Vec<_>, ModgraphError>>()?
    };

    Ok(ComponentMetadata {
        id,
        module_version,
        status: raw.status.unwrap_or_else(|| STATUS_RELEASE.to_string()),
        repository: raw.repository,
        adhoc: raw.adhoc,
        variants,
    })
}

fn convert_capabilities(raw: &[String]) -> Result<Vec<Capability>, ModgraphError> {
    raw.iter()
        .map(|c| {
            Capability::parse(c).ok_or_else(|| ModgraphError::Catalog {
                message: format!("Invalid capability '{c}'"),
            })
        })
        .collect()
}

fn convert_dependencies(raw: Vec<RawDependency>) -> Result<Vec<DependencyMetadata>, ModgraphError> {
    raw.into_iter().map(convert_dependency).collect()
}

fn convert_dependency(raw: RawDependency) -> Result<DependencyMetadata, ModgraphError> {
    match raw {
        RawDependency::Short(s) => ComponentSelector::parse(&s)
            .map(DependencyMetadata::new)
            .ok_or_else(|| ModgraphError::Catalog {
                message: format!("Invalid dependency '{s}': expected group:name:version or :path"),
            }),
        RawDependency::Detailed(d) => {
            let selector = match (&d.project, &d.module) {
                (Some(path), None) => ComponentSelector::project(path.clone()),
                (None, Some(module)) => selector_from_module(module, d.version.as_deref())?,
                _ => {
                    return Err(ModgraphError::Catalog {
                        message: "A dependency needs exactly one of 'module' or 'project'".into(),
                    })
                }
            };
            Ok(DependencyMetadata {
                selector,
                force: d.force,
                constraint: d.constraint,
                strict: d.strict,
                transitive: d.transitive,
                excludes: d.excludes,
                requested_variant: d.variant,
                requested_attributes: d.attributes,
                reason: d.reason,
            })
        }
    }
}

fn selector_from_module(module: &str, version: Option<&str>) -> Result<ComponentSelector, ModgraphError> {
    if let Some(id) = ModuleVersionId::parse(module) {
        if version.is_some() {
            return Err(ModgraphError::Catalog {
                message: format!("Dependency '{module}' already carries a version"),
            });
        }
        return Ok(ComponentSelector::Module {
            module: id.module,
            version: id.version,
        });
    }
    let identity = ModuleIdentity::parse(module).ok_or_else(|| ModgraphError::Catalog {
        message: format!("Invalid module '{module}': expected group:name"),
    })?;
    Ok(ComponentSelector::Module {
        module: identity,
        version: version.unwrap_or("+").to_string(),
    })
}
