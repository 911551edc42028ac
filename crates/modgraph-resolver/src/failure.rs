//! Edge-local resolution failures.
//!
//! A failure here is a value stored on one edge. It never aborts the rest
//! of the graph.

use modgraph_core::identity::ComponentSelector;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The provider had no metadata for the requested component.
    NotFound,
    /// The provider failed while looking the component up.
    MetadataError,
    /// No available version satisfied a dynamic selector.
    NoMatchingVersion,
    NoMatchingVariant,
    AmbiguousVariant,
    /// The selected version is rejected by configuration.
    Rejected,
    /// The lock state disagrees with the resolved graph.
    LockOutOfDate,
}

impl FailureKind {
    const ALL: [FailureKind; 7] = [
        Self::NotFound,
        Self::MetadataError,
        Self::NoMatchingVersion,
        Self::NoMatchingVariant,
        Self::AmbiguousVariant,
        Self::Rejected,
        Self::LockOutOfDate,
    ];

    pub fn tag(self) -> u8 {
        match self {
            Self::NotFound => 0,
            Self::MetadataError => 1,
            Self::NoMatchingVersion => 2,
            Self::NoMatchingVariant => 3,
            Self::AmbiguousVariant => 4,
            Self::Rejected => 5,
            Self::LockOutOfDate => 6,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }
}

/// Why one requested selector could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleResolveFailure {
    pub selector: ComponentSelector,
    pub kind: FailureKind,
    pub message: String,
    /// Messages of the underlying error chain, outermost first.
    pub causes: Vec<String>,
}

impl ModuleResolveFailure {
    pub fn new(selector: ComponentSelector, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            selector,
            kind,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// A lookup error from the metadata provider, keeping its whole chain.
    pub fn from_report(selector: ComponentSelector, report: &miette::Report) -> Self {
        let message = format!("Could not resolve {selector}.");
        let causes = report.chain().map(|e| e.to_string()).collect();
        Self {
            selector,
            kind: FailureKind::MetadataError,
            message,
            causes,
        }
    }
}

impl fmt::Display for ModuleResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for cause in &self.causes {
            write!(f, "\n  Caused by: {cause}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_stable() {
        for kind in FailureKind::ALL {
            assert_eq!(FailureKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(FailureKind::from_tag(99), None);
    }

    #[test]
    fn report_chain_is_kept() {
        let report = miette::miette!("connection refused");
        let f = ModuleResolveFailure::from_report(ComponentSelector::module("org", "a", "1.0"), &report);
        assert_eq!(f.kind, FailureKind::MetadataError);
        assert_eq!(f.causes, vec!["connection refused".to_string()]);
        assert!(f.to_string().starts_with("Could not resolve org:a:1.0."));
    }
}
