//! Why a component was selected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The cause behind a component selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionCause {
    Requested,
    Root,
    Forced,
    ConflictResolution,
    Constraint,
    SelectedByRule,
    CompositeBuild,
    Rejection,
    ByAncestor,
}

impl SelectionCause {
    pub const ALL: [SelectionCause; 9] = [
        Self::Requested,
        Self::Root,
        Self::Forced,
        Self::ConflictResolution,
        Self::Constraint,
        Self::SelectedByRule,
        Self::CompositeBuild,
        Self::Rejection,
        Self::ByAncestor,
    ];

    /// Stable wire tag.
    pub fn tag(self) -> u8 {
        match self {
            Self::Requested => 0,
            Self::Root => 1,
            Self::Forced => 2,
            Self::ConflictResolution => 3,
            Self::Constraint => 4,
            Self::SelectedByRule => 5,
            Self::CompositeBuild => 6,
            Self::Rejection => 7,
            Self::ByAncestor => 8,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    pub fn default_description(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Root => "root",
            Self::Forced => "forced",
            Self::ConflictResolution => "conflict resolution",
            Self::Constraint => "constraint",
            Self::SelectedByRule => "selected by rule",
            Self::CompositeBuild => "composite build substitution",
            Self::Rejection => "rejection",
            Self::ByAncestor => "by ancestor",
        }
    }
}

/// One selection cause with an optional custom description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionDescriptor {
    pub cause: SelectionCause,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SelectionDescriptor {
    pub fn new(cause: SelectionCause) -> Self {
        Self {
            cause,
            description: None,
        }
    }

    pub fn with_description(cause: SelectionCause, description: impl Into<String>) -> Self {
        Self {
            cause,
            description: Some(description.into()),
        }
    }

    pub fn has_custom_description(&self) -> bool {
        self.description.is_some()
    }

    pub fn description(&self) -> &str {
        self.description
            .as_deref()
            .unwrap_or_else(|| self.cause.default_description())
    }
}

impl fmt::Display for SelectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Ordered, duplicate-free list of selection descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentSelectionReason {
    descriptors: Vec<SelectionDescriptor>,
}

impl ComponentSelectionReason {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(cause: SelectionCause) -> Self {
        let mut reason = Self::new();
        reason.add_cause(cause);
        reason
    }

    pub fn root() -> Self {
        Self::of(SelectionCause::Root)
    }

    pub fn requested() -> Self {
        Self::of(SelectionCause::Requested)
    }

    /// Append a descriptor unless an equal one is already present.
    pub fn add(&mut self, descriptor: SelectionDescriptor) {
        if !self.descriptors.contains(&descriptor) {
            self.descriptors.push(descriptor);
        }
    }

    pub fn add_cause(&mut self, cause: SelectionCause) {
        self.add(SelectionDescriptor::new(cause));
    }

    pub fn descriptors(&self) -> &[SelectionDescriptor] {
        &self.descriptors
    }

    pub fn contains(&self, cause: SelectionCause) -> bool {
        self.descriptors.iter().any(|d| d.cause == cause)
    }

    pub fn is_forced(&self) -> bool {
        self.contains(SelectionCause::Forced)
    }

    pub fn is_conflict_resolution(&self) -> bool {
        self.contains(SelectionCause::ConflictResolution)
    }

    pub fn is_selected_by_rule(&self) -> bool {
        self.contains(SelectionCause::SelectedByRule)
    }

    /// Only plain requests or the root: nothing overrode the declared version.
    pub fn is_expected(&self) -> bool {
        self.descriptors
            .iter()
            .all(|d| matches!(d.cause, SelectionCause::Requested | SelectionCause::Root))
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl fmt::Display for ComponentSelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.descriptors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_stable() {
        for cause in SelectionCause::ALL {
            assert_eq!(SelectionCause::from_tag(cause.tag()), Some(cause));
        }
        assert_eq!(SelectionCause::from_tag(42), None);
    }

    #[test]
    fn reason_deduplicates_in_order() {
        let mut reason = ComponentSelectionReason::requested();
        reason.add_cause(SelectionCause::ConflictResolution);
        reason.add_cause(SelectionCause::Requested);
        reason.add(SelectionDescriptor::with_description(
            SelectionCause::SelectedByRule,
            "use fork",
        ));
        assert_eq!(reason.descriptors().len(), 3);
        assert_eq!(reason.to_string(), "requested, conflict resolution, use fork");
        assert!(reason.is_conflict_resolution());
        assert!(!reason.is_expected());
    }
}
