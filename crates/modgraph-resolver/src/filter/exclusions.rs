use modgraph_core::metadata::ExcludeRule;
use modgraph_util::errors::ModgraphError;
use std::collections::HashMap;

use super::ModuleResolutionFilter;

/// Builds and combines filters for one resolution, memoizing each result.
///
/// The same exclude lists and the same filter pairs recur on every path
/// through a graph, so each is computed once.
#[derive(Default)]
pub struct ModuleExclusions {
    by_rules: HashMap<Vec<ExcludeRule>, ModuleResolutionFilter>,
    unions: HashMap<(usize, usize), Memo>,
    intersections: HashMap<(usize, usize), Memo>,
}

/// Keeps the operands alive so their addresses stay unique while cached.
struct Memo {
    _operands: (ModuleResolutionFilter, ModuleResolutionFilter),
    result: ModuleResolutionFilter,
}

impl ModuleExclusions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter rejecting any module matched by any of `rules`.
    pub fn exclude_any(&mut self, rules: &[ExcludeRule]) -> Result<ModuleResolutionFilter, ModgraphError> {
        if rules.is_empty() {
            return Ok(ModuleResolutionFilter::accept_all());
        }
        if let Some(f) = self.by_rules.get(rules) {
            return Ok(f.clone());
        }
        let filter = ModuleResolutionFilter::from_rules(rules)?;
        self.by_rules.insert(rules.to_vec(), filter.clone());
        Ok(filter)
    }

    pub fn union(&mut self, a: &ModuleResolutionFilter, b: &ModuleResolutionFilter) -> ModuleResolutionFilter {
        let key = ordered_key(a, b);
        if let Some(memo) = self.unions.get(&key) {
            return memo.result.clone();
        }
        let result = a.union(b);
        self.unions.insert(
            key,
            Memo {
                _operands: (a.clone(), b.clone()),
                result: result.clone(),
            },
        );
        result
    }

    pub fn intersect(&mut self, a: &ModuleResolutionFilter, b: &ModuleResolutionFilter) -> ModuleResolutionFilter {
        let key = ordered_key(a, b);
        if let Some(memo) = self.intersections.get(&key) {
            return memo.result.clone();
        }
        let result = a.intersect(b);
        self.intersections.insert(
            key,
            Memo {
                _operands: (a.clone(), b.clone()),
                result: result.clone(),
            },
        );
        result
    }
}

/// Both operations are commutative, so operand order does not matter.
fn ordered_key(a: &ModuleResolutionFilter, b: &ModuleResolutionFilter) -> (usize, usize) {
    let (x, y) = (a.identity(), b.identity());
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}
