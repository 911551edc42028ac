use modgraph_core::identity::{ComponentId, ModuleVersionId};
use modgraph_core::reason::ComponentSelectionReason;
use modgraph_util::errors::ModgraphError;
use std::collections::BTreeMap;

use super::{
    DependencyResult, ResolvedComponentResult, ResolvedGraph, ResolvedGraphVisitor, ResolvedVariantResult,
    ResultId,
};

/// Assembles a [`ResolvedGraph`] from visitor callbacks.
///
/// A component is materialized on its first visit. Later visits of the same
/// id only contribute selected variants it does not have yet.
#[derive(Debug, Default)]
pub struct ResolutionResultGraphBuilder {
    components: BTreeMap<ResultId, ResolvedComponentResult>,
    current: Option<Visit>,
}

#[derive(Debug)]
enum Visit {
    New(PartialComponent),
    Existing(ResultId),
}

#[derive(Debug)]
struct PartialComponent {
    id: ResultId,
    reason: ComponentSelectionReason,
    repository: Option<String>,
    details: Option<(ComponentId, ModuleVersionId)>,
    selected_variants: Vec<ResolvedVariantResult>,
    available_variants: Option<Vec<ResolvedVariantResult>>,
}

impl ResolutionResultGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&mut self) -> Result<&mut Visit, ModgraphError> {
        self.current
            .as_mut()
            .ok_or_else(|| ModgraphError::corrupt("component data outside of a component visit"))
    }

    /// Freeze the graph. Every edge must point at a known component and
    /// variant. `extra_failures` are attached to the root, after its own edges.
    pub fn complete(
        mut self,
        root: ResultId,
        extra_failures: Vec<DependencyResult>,
    ) -> Result<ResolvedGraph, ModgraphError> {
        if self.current.is_some() {
            return Err(ModgraphError::corrupt("graph completed inside a component visit"));
        }
        for component in self.components.values() {
            for dependency in &component.dependencies {
                if let Some(from) = dependency.from_variant() {
                    if component.variant(from).is_none() {
                        return Err(ModgraphError::corrupt(format!(
                            "edge from unknown variant {from} of component {}",
                            component.id
                        )));
                    }
                }
                if let DependencyResult::Resolved {
                    selected,
                    selected_variant,
                    ..
                } = dependency
                {
                    let target = self.components.get(selected).ok_or_else(|| {
                        ModgraphError::corrupt(format!(
                            "edge from component {} to unknown component {selected}",
                            component.id
                        ))
                    })?;
                    if let Some(variant) = selected_variant {
                        if target.variant(*variant).is_none() {
                            return Err(ModgraphError::corrupt(format!(
                                "edge to unknown variant {variant} of component {selected}"
                            )));
                        }
                    }
                }
            }
        }
        let root_component = self
            .components
            .get_mut(&root)
            .ok_or_else(|| ModgraphError::corrupt(format!("unknown root component {root}")))?;
        root_component.dependencies.extend(extra_failures);
        Ok(ResolvedGraph::new(root, self.components))
    }
}

impl ResolvedGraphVisitor for ResolutionResultGraphBuilder {
    fn start_visit_component(
        &mut self,
        id: ResultId,
        reason: &ComponentSelectionReason,
        repository: Option<&str>,
    ) -> Result<(), ModgraphError> {
        if self.current.is_some() {
            return Err(ModgraphError::corrupt("nested component visit"));
        }
        self.current = Some(if self.components.contains_key(&id) {
            Visit::Existing(id)
        } else {
            Visit::New(PartialComponent {
                id,
                reason: reason.clone(),
                repository: repository.map(str::to_string),
                details: None,
                selected_variants: Vec::new(),
                available_variants: None,
            })
        });
        Ok(())
    }

    fn visit_component_details(
        &mut self,
        component_id: &ComponentId,
        module_version: &ModuleVersionId,
    ) -> Result<(), ModgraphError> {
        if let Visit::New(partial) = self.current()? {
            partial.details = Some((component_id.clone(), module_version.clone()));
        }
        Ok(())
    }

    fn visit_selected_variant(&mut self, variant: &ResolvedVariantResult) -> Result<(), ModgraphError> {
        let variants = match self.current()? {
            Visit::New(partial) => &mut partial.selected_variants,
            Visit::Existing(id) => {
                let id = *id;
                match self.components.get_mut(&id) {
                    Some(existing) => &mut existing.selected_variants,
                    None => return Err(ModgraphError::corrupt(format!("lost component {id}"))),
                }
            }
        };
        if !variants.iter().any(|v| v.id == variant.id) {
            variants.push(variant.clone());
        }
        Ok(())
    }

    fn visit_component_variants(&mut self, variants: &[ResolvedVariantResult]) -> Result<(), ModgraphError> {
        if let Visit::New(partial) = self.current()? {
            partial.available_variants = Some(variants.to_vec());
        }
        Ok(())
    }

    fn end_visit_component(&mut self) -> Result<(), ModgraphError> {
        let visit = self
            .current
            .take()
            .ok_or_else(|| ModgraphError::corrupt("end of a component visit that never started"))?;
        if let Visit::New(partial) = visit {
            let (component_id, module_version) = partial.details.ok_or_else(|| {
                ModgraphError::corrupt(format!("component {} has no details", partial.id))
            })?;
            self.components.insert(
                partial.id,
                ResolvedComponentResult {
                    id: partial.id,
                    component_id,
                    module_version,
                    reason: partial.reason,
                    repository: partial.repository,
                    selected_variants: partial.selected_variants,
                    available_variants: partial.available_variants,
                    dependencies: Vec::new(),
                },
            );
        }
        Ok(())
    }

    fn visit_dependencies(&mut self, from: ResultId, dependencies: &[DependencyResult]) -> Result<(), ModgraphError> {
        let component = self
            .components
            .get_mut(&from)
            .ok_or_else(|| ModgraphError::corrupt(format!("edges from unknown component {from}")))?;
        component.dependencies.extend(dependencies.iter().cloned());
        Ok(())
    }
}
