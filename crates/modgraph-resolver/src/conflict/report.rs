//! Conflict reporting.

use modgraph_core::identity::ModuleIdentity;
use serde::Serialize;
use std::fmt;

/// A report of all conflicts settled during resolution.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConflictReport {
    pub conflicts: Vec<VersionConflict>,
}

/// A single settled conflict: several candidates, one winner.
#[derive(Debug, Clone, Serialize)]
pub struct VersionConflict {
    /// The module, or for capability conflicts the capability.
    pub module: ModuleIdentity,
    pub candidates: Vec<String>,
    pub selected: String,
    pub reason: String,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conflict: VersionConflict) {
        self.conflicts.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(f, "No version conflicts.");
        }
        writeln!(f, "Version conflicts ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            writeln!(f, "  {c}")?;
        }
        Ok(())
    }
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: [{}] -> {} ({})",
            self.module,
            self.candidates.join(", "),
            self.selected,
            self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report() {
        let report = ConflictReport::new();
        assert!(report.is_empty());
        assert_eq!(report.len(), 0);
        assert_eq!(report.to_string(), "No version conflicts.");
    }

    #[test]
    fn report_with_conflicts() {
        let mut report = ConflictReport::new();
        report.add(VersionConflict {
            module: ModuleIdentity::new("org.example", "lib"),
            candidates: vec!["1.0".to_string(), "2.0".to_string()],
            selected: "2.0".to_string(),
            reason: "conflict resolution".to_string(),
        });
        assert_eq!(report.len(), 1);
        let s = report.to_string();
        assert!(s.contains("org.example:lib: [1.0, 2.0] -> 2.0"));
    }
}
