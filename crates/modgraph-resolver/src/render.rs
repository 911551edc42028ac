//! Text rendering of a resolved graph: dependency trees, paths and
//! inverted ("who pulls this in") trees.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use modgraph_core::identity::ComponentSelector;

use crate::result::{DependencyResult, ResolvedComponentResult, ResolvedGraph, ResultId};

/// Label of one drawn edge.
#[derive(Debug, Clone)]
struct TreeEdge {
    label: String,
    constraint: bool,
}

/// A petgraph view over a [`ResolvedGraph`], built for printing.
pub struct DependencyTree<'g> {
    graph: DiGraph<&'g ResolvedComponentResult, TreeEdge>,
    failed: HashMap<NodeIndex, Vec<String>>,
    root: NodeIndex,
}

impl<'g> DependencyTree<'g> {
    pub fn new(resolved: &'g ResolvedGraph) -> Self {
        let mut graph = DiGraph::new();
        let mut index: HashMap<ResultId, NodeIndex> = HashMap::new();
        for component in resolved.components() {
            index.insert(component.id, graph.add_node(component));
        }

        let mut failed: HashMap<NodeIndex, Vec<String>> = HashMap::new();
        for component in resolved.components() {
            let from = index[&component.id];
            let mut drawn: HashSet<(NodeIndex, String)> = HashSet::new();
            for dependency in &component.dependencies {
                match dependency {
                    DependencyResult::Resolved {
                        requested,
                        selected,
                        constraint,
                        ..
                    } => {
                        let Some(&to) = index.get(selected) else {
                            continue;
                        };
                        let label = edge_label(requested, graph[to]);
                        if drawn.insert((to, label.clone())) {
                            graph.add_edge(
                                from,
                                to,
                                TreeEdge {
                                    label,
                                    constraint: *constraint,
                                },
                            );
                        }
                    }
                    DependencyResult::Unresolved { requested, from_variant, .. } => {
                        // Locking failures hang off the root with no source variant.
                        if from_variant.is_some() {
                            failed.entry(from).or_default().push(format!("{requested} FAILED"));
                        }
                    }
                }
            }
        }

        let root = index[&resolved.root_id()];
        Self {
            graph,
            failed,
            root,
        }
    }

    /// Print the tree below the root. Components already expanded higher up
    /// are marked `(*)` and not expanded again.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = format!("{}\n", self.title(self.root));
        let mut expanded = HashSet::from([self.root]);
        let children = self.children(self.root);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.print_subtree(&mut output, child, "", i == count - 1, 1, max_depth, &mut expanded);
        }
        output
    }

    fn children(&self, idx: NodeIndex) -> Vec<Child<'_>> {
        let mut edges: Vec<_> = self.graph.edges_directed(idx, Direction::Outgoing).collect();
        edges.sort_by_key(|e| e.id());
        let mut children: Vec<Child<'_>> = edges
            .into_iter()
            .map(|e| Child::Edge(e.target(), e.weight()))
            .collect();
        if let Some(failures) = self.failed.get(&idx) {
            children.extend(failures.iter().map(|f| Child::Failed(f)));
        }
        children
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        child: Child<'_>,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        expanded: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let (idx, edge) = match child {
            Child::Failed(label) => {
                output.push_str(&format!("{prefix}{connector}{label}\n"));
                return;
            }
            Child::Edge(idx, edge) => (idx, edge),
        };

        if edge.constraint {
            output.push_str(&format!("{prefix}{connector}{} (c)\n", edge.label));
            return;
        }
        let children = self.children(idx);
        let repeated = !children.is_empty() && expanded.contains(&idx);
        let marker = if repeated { " (*)" } else { "" };
        output.push_str(&format!("{prefix}{connector}{}{marker}\n", edge.label));
        if repeated || max_depth.is_some_and(|max| depth >= max) {
            return;
        }
        expanded.insert(idx);

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let count = children.len();
        for (i, grandchild) in children.into_iter().enumerate() {
            self.print_subtree(
                output,
                grandchild,
                &child_prefix,
                i == count - 1,
                depth + 1,
                max_depth,
                expanded,
            );
        }
    }

    fn title(&self, idx: NodeIndex) -> String {
        let component = self.graph[idx];
        if component.component_id.is_project() {
            format!("{} ({})", component.component_id, component.module_version)
        } else {
            component.module_version.to_string()
        }
    }

    /// Resolve a user-provided key to a component.
    ///
    /// Tries `group:name` first, then falls back to matching the name alone.
    pub fn find(&self, key: &str) -> Option<&'g ResolvedComponentResult> {
        self.resolve_key(key).map(|idx| self.graph[idx])
    }

    fn resolve_key(&self, key: &str) -> Option<NodeIndex> {
        let mut by_name = None;
        for idx in self.graph.node_indices() {
            let module = self.graph[idx].module();
            if module.to_string() == key {
                return Some(idx);
            }
            if by_name.is_none() && module.name == key {
                by_name = Some(idx);
            }
        }
        by_name
    }

    /// Shortest path from the root to `key`, root first.
    pub fn find_path(&self, key: &str) -> Option<Vec<&'g ResolvedComponentResult>> {
        let target = self.resolve_key(key)?;
        let mut previous: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = std::collections::VecDeque::from([self.root]);
        let mut seen = HashSet::from([self.root]);
        while let Some(current) = queue.pop_front() {
            if current == target {
                let mut path = vec![self.graph[current]];
                let mut cursor = current;
                while let Some(&p) = previous.get(&cursor) {
                    path.push(self.graph[p]);
                    cursor = p;
                }
                path.reverse();
                return Some(path);
            }
            let mut edges: Vec<_> = self.graph.edges(current).collect();
            edges.sort_by_key(|e| e.id());
            for edge in edges {
                if !edge.weight().constraint && seen.insert(edge.target()) {
                    previous.insert(edge.target(), current);
                    queue.push_back(edge.target());
                }
            }
        }
        None
    }

    /// Every cycle-free path from the root to `key`, at most `limit` of them.
    pub fn find_all_paths(&self, key: &str, limit: usize) -> Vec<Vec<&'g ResolvedComponentResult>> {
        let mut paths = Vec::new();
        let Some(target) = self.resolve_key(key) else {
            return paths;
        };
        let mut current = vec![self.root];
        self.collect_paths(target, limit, &mut current, &mut paths);
        paths
    }

    fn collect_paths(
        &self,
        target: NodeIndex,
        limit: usize,
        current: &mut Vec<NodeIndex>,
        paths: &mut Vec<Vec<&'g ResolvedComponentResult>>,
    ) {
        if paths.len() >= limit {
            return;
        }
        let Some(&last) = current.last() else {
            return;
        };
        if last == target {
            paths.push(current.iter().map(|idx| self.graph[*idx]).collect());
            return;
        }
        let mut next: Vec<NodeIndex> = self
            .graph
            .edges(last)
            .filter(|e| !e.weight().constraint)
            .map(|e| e.target())
            .filter(|t| !current.contains(t))
            .collect();
        next.sort_by_key(|idx| self.graph[*idx].id);
        next.dedup();
        for idx in next {
            current.push(idx);
            self.collect_paths(target, limit, current, paths);
            current.pop();
        }
    }

    /// Components depending on `key`, recursively, up to the root.
    pub fn print_inverted_tree(&self, key: &str) -> String {
        let mut output = String::new();
        let Some(idx) = self.resolve_key(key) else {
            return output;
        };
        output.push_str(&format!("{}\n", self.title(idx)));

        let mut visited = HashSet::from([idx]);
        let dependents = self.dependents(idx);
        let count = dependents.len();
        for (i, (dependent, edge)) in dependents.into_iter().enumerate() {
            self.print_inverted_subtree(&mut output, dependent, edge, "", i == count - 1, &mut visited);
        }
        output
    }

    fn dependents(&self, idx: NodeIndex) -> Vec<(NodeIndex, &TreeEdge)> {
        let mut dependents: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
            .collect();
        dependents.sort_by_key(|(source, _)| self.graph[*source].id);
        dependents
    }

    fn print_inverted_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        via: &TreeEdge,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let constraint = if via.constraint { " (c)" } else { "" };
        output.push_str(&format!(
            "{prefix}{connector}{}{constraint} (requested {})\n",
            self.title(idx),
            via.label.split(" -> ").next().unwrap_or_default()
        ));

        if !visited.insert(idx) {
            return;
        }
        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let dependents = self.dependents(idx);
        let count = dependents.len();
        for (i, (dependent, edge)) in dependents.into_iter().enumerate() {
            self.print_inverted_subtree(output, dependent, edge, &child_prefix, i == count - 1, visited);
        }
        visited.remove(&idx);
    }

    /// Number of components, excluding the root.
    pub fn len(&self) -> usize {
        self.graph.node_count().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum Child<'a> {
    Edge(NodeIndex, &'a TreeEdge),
    Failed(&'a str),
}

/// `requested -> selected`, shortened when only the version moved.
fn edge_label(requested: &ComponentSelector, selected: &ResolvedComponentResult) -> String {
    match requested {
        ComponentSelector::Module { module, version } => {
            if *module != selected.module_version.module {
                format!("{requested} -> {}", selected.module_version)
            } else if *version != selected.module_version.version {
                format!("{requested} -> {}", selected.module_version.version)
            } else {
                requested.to_string()
            }
        }
        ComponentSelector::Project { .. } => requested.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{FailureKind, ModuleResolveFailure};
    use crate::result::ResolvedVariantResult;
    use modgraph_core::attributes::AttributeContainer;
    use modgraph_core::identity::{ComponentId, ModuleVersionId};
    use modgraph_core::reason::ComponentSelectionReason;
    use std::collections::BTreeMap;

    fn component(id: ResultId, mv: &str, dependencies: Vec<DependencyResult>) -> ResolvedComponentResult {
        let module_version = ModuleVersionId::parse(mv).unwrap();
        let component_id = ComponentId::Module(module_version.clone());
        ResolvedComponentResult {
            id,
            component_id: component_id.clone(),
            module_version,
            reason: ComponentSelectionReason::requested(),
            repository: None,
            selected_variants: vec![ResolvedVariantResult {
                id,
                owner: component_id,
                name: "runtime".into(),
                attributes: AttributeContainer::empty(),
                capabilities: Vec::new(),
            }],
            available_variants: None,
            dependencies,
        }
    }

    fn edge(from: ResultId, requested: &str, selected: ResultId) -> DependencyResult {
        DependencyResult::Resolved {
            requested: ComponentSelector::parse(requested).unwrap(),
            from_variant: Some(from),
            selected,
            selected_variant: Some(selected),
            constraint: false,
        }
    }

    fn sample() -> ResolvedGraph {
        let failure = ModuleResolveFailure::new(
            ComponentSelector::parse("org:gone:1.0").unwrap(),
            FailureKind::NotFound,
            "Could not find org:gone:1.0.",
        );
        let components: BTreeMap<ResultId, ResolvedComponentResult> = [
            component(
                1,
                "com.example:app:1.0",
                vec![edge(1, "org:a:1.0", 2), edge(1, "org:b:1.0", 3)],
            ),
            component(2, "org:a:1.0", vec![edge(2, "org:c:1.0", 4)]),
            component(
                3,
                "org:b:1.0",
                vec![
                    edge(3, "org:c:0.9", 4),
                    DependencyResult::Unresolved {
                        requested: ComponentSelector::parse("org:gone:1.0").unwrap(),
                        from_variant: Some(3),
                        failure,
                        constraint: false,
                    },
                ],
            ),
            component(4, "org:c:1.0", vec![edge(4, "org:d:1.0", 5)]),
            component(5, "org:d:1.0", Vec::new()),
        ]
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
        ResolvedGraph::new(1, components)
    }

    #[test]
    fn tree_marks_upgrades_repeats_and_failures() {
        let graph = sample();
        let tree = DependencyTree::new(&graph).print_tree(None);
        assert!(tree.starts_with("com.example:app:1.0\n"));
        assert!(tree.contains("├── org:a:1.0\n"));
        assert!(tree.contains("org:c:0.9 -> 1.0 (*)"));
        assert!(tree.contains("org:gone:1.0 FAILED"));
        assert_eq!(tree.matches("org:d:1.0").count(), 1);
    }

    #[test]
    fn depth_limits_expansion() {
        let graph = sample();
        let tree = DependencyTree::new(&graph).print_tree(Some(1));
        assert!(tree.contains("org:a:1.0"));
        assert!(!tree.contains("org:c"));
    }

    #[test]
    fn shortest_path_from_root() {
        let graph = sample();
        let tree = DependencyTree::new(&graph);
        let path = tree.find_path("org:d").unwrap();
        let names: Vec<String> = path.iter().map(|c| c.module_version.to_string()).collect();
        assert_eq!(names, ["com.example:app:1.0", "org:a:1.0", "org:c:1.0", "org:d:1.0"]);
        assert!(tree.find_path("org:missing").is_none());
    }

    #[test]
    fn every_path_from_root() {
        let graph = sample();
        let tree = DependencyTree::new(&graph);
        let paths = tree.find_all_paths("org:d", 10);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0][1].id, 2);
        assert_eq!(paths[1][1].id, 3);
        assert_eq!(tree.find_all_paths("org:d", 1).len(), 1);
        assert!(tree.find_all_paths("org:missing", 10).is_empty());
    }

    #[test]
    fn key_matches_name_alone() {
        let graph = sample();
        let tree = DependencyTree::new(&graph);
        assert_eq!(tree.find("c").map(|c| c.id), Some(4));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn inverted_tree_lists_every_dependent() {
        let graph = sample();
        let inverted = DependencyTree::new(&graph).print_inverted_tree("org:c");
        assert!(inverted.starts_with("org:c:1.0\n"));
        assert!(inverted.contains("org:a:1.0 (requested org:c:1.0)"));
        assert!(inverted.contains("org:b:1.0 (requested org:c:0.9)"));
        assert!(inverted.contains("com.example:app:1.0"));
    }
}
