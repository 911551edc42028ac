//! Version parsing, comparison, range matching and dynamic selectors.
//!
//! Versions are split into segments on `.`, `-`, `_` and `+`, and at every
//! transition between digits and letters:
//! - Numeric segments compare as numbers
//! - String qualifiers have a special ordering:
//!   `dev` < `alpha` < `beta` < `milestone` < `rc` < `snapshot` < `""` (release) < `sp`
//! - Unknown text sorts below numbers and between the pre-release and
//!   release qualifiers

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A parsed version with comparable segments.
#[derive(Debug, Clone)]
pub struct Version {
    pub original: String,
    segments: Vec<Segment>,
    /// Byte length of the leading numeric part of `original`.
    base_len: usize,
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Segment {
    Numeric(u64),
    Qualifier(QualifierKind),
    Text(String),
}

/// Well-known qualifiers with defined ordering.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
enum QualifierKind {
    Dev,
    Alpha,
    Beta,
    Milestone,
    Rc,
    Snapshot,
    Release,
    Sp,
}

impl Version {
    pub fn parse(version: &str) -> Self {
        let (segments, base_len) = parse_segments(version);
        Self {
            original: version.to_string(),
            segments,
            base_len,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.original.ends_with("-SNAPSHOT")
    }

    /// The version with any qualifier stripped: `2.0-beta` ⇒ `2.0`.
    ///
    /// A version without a leading numeric part is its own base version.
    pub fn base_version(&self) -> Version {
        if !self.is_qualified() || self.base_len == 0 {
            return self.clone();
        }
        Version::parse(&self.original[..self.base_len])
    }

    /// True when the version carries anything besides numeric segments.
    pub fn is_qualified(&self) -> bool {
        self.segments.iter().any(|s| !matches!(s, Segment::Numeric(_)))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let max_len = self.segments.len().max(other.segments.len());
        for i in 0..max_len {
            let a = self.segments.get(i);
            let b = other.segments.get(i);
            let ord = compare_segments(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_segments(a: Option<&Segment>, b: Option<&Segment>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(s), None) => compare_segment_to_empty(s),
        (None, Some(s)) => compare_segment_to_empty(s).reverse(),
        (Some(a), Some(b)) => compare_two_segments(a, b),
    }
}

fn compare_segment_to_empty(seg: &Segment) -> Ordering {
    match seg {
        Segment::Numeric(0) => Ordering::Equal,
        Segment::Numeric(_) => Ordering::Greater,
        Segment::Qualifier(q) => q.cmp(&QualifierKind::Release),
        Segment::Text(s) if s.is_empty() => Ordering::Equal,
        Segment::Text(_) => Ordering::Less,
    }
}

fn compare_two_segments(a: &Segment, b: &Segment) -> Ordering {
    match (a, b) {
        (Segment::Numeric(a), Segment::Numeric(b)) => a.cmp(b),
        (Segment::Qualifier(a), Segment::Qualifier(b)) => a.cmp(b),
        (Segment::Numeric(_), Segment::Qualifier(_)) => Ordering::Greater,
        (Segment::Qualifier(_), Segment::Numeric(_)) => Ordering::Less,
        (Segment::Numeric(_), Segment::Text(_)) => Ordering::Greater,
        (Segment::Text(_), Segment::Numeric(_)) => Ordering::Less,
        (Segment::Text(a), Segment::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Segment::Qualifier(q), Segment::Text(_)) => {
            if *q >= QualifierKind::Release {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (Segment::Text(_), Segment::Qualifier(q)) => {
            if *q >= QualifierKind::Release {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
    }
}

fn is_separator(ch: char) -> bool {
    matches!(ch, '.' | '-' | '_' | '+')
}

/// Split into segments and measure the leading all-numeric prefix.
fn parse_segments(version: &str) -> (Vec<Segment>, usize) {
    let mut tokens = Tokens::default();
    let mut prev: Option<char> = None;
    for (pos, ch) in version.char_indices() {
        if is_separator(ch) {
            tokens.flush(pos);
        } else {
            if let Some(p) = prev {
                if !is_separator(p) && p.is_ascii_digit() != ch.is_ascii_digit() {
                    tokens.flush(pos);
                }
            }
            tokens.current.push(ch);
        }
        prev = Some(ch);
    }
    tokens.flush(version.len());
    (tokens.segments, tokens.base_len)
}

#[derive(Default)]
struct Tokens {
    segments: Vec<Segment>,
    current: String,
    base_len: usize,
    past_base: bool,
}

impl Tokens {
    fn flush(&mut self, end: usize) {
        if self.current.is_empty() {
            return;
        }
        let seg = classify(&self.current);
        if !self.past_base {
            if matches!(seg, Segment::Numeric(_)) {
                self.base_len = end;
            } else {
                self.past_base = true;
            }
        }
        self.segments.push(seg);
        self.current.clear();
    }
}

fn classify(token: &str) -> Segment {
    if let Ok(n) = token.parse::<u64>() {
        return Segment::Numeric(n);
    }
    match token.to_lowercase().as_str() {
        "dev" => Segment::Qualifier(QualifierKind::Dev),
        "alpha" | "a" => Segment::Qualifier(QualifierKind::Alpha),
        "beta" | "b" => Segment::Qualifier(QualifierKind::Beta),
        "milestone" | "m" => Segment::Qualifier(QualifierKind::Milestone),
        "rc" | "cr" => Segment::Qualifier(QualifierKind::Rc),
        "snapshot" => Segment::Qualifier(QualifierKind::Snapshot),
        "" | "ga" | "final" | "release" => Segment::Qualifier(QualifierKind::Release),
        "sp" => Segment::Qualifier(QualifierKind::Sp),
        _ => Segment::Text(token.to_string()),
    }
}

/// Orders version strings. Conflict resolution takes one of these so the
/// ordering can be swapped out.
pub trait VersionComparator: Send + Sync {
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// The ordering implemented by [`Version`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultVersionComparator;

impl VersionComparator for DefaultVersionComparator {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        Version::parse(a).cmp(&Version::parse(b))
    }
}

pub fn default_comparator() -> Arc<dyn VersionComparator> {
    Arc::new(DefaultVersionComparator)
}

/// A version range expression.
///
/// Supports: `[1.0,2.0)`, `[1.0,]`, `(,2.0)`, `[1.5]` (exact).
#[derive(Debug, Clone)]
pub struct VersionRange {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

#[derive(Debug, Clone)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

impl VersionRange {
    /// Parse a version range string.
    ///
    /// Returns `None` for bare versions (not a range).
    pub fn parse(spec: &str) -> Option<Self> {
        let s = spec.trim();
        if !(s.starts_with('[') || s.starts_with('(')) || !(s.ends_with(']') || s.ends_with(')')) {
            return None;
        }
        if s.len() < 2 {
            return None;
        }

        let open_inclusive = s.starts_with('[');
        let close_inclusive = s.ends_with(']');
        let inner = &s[1..s.len() - 1];

        if let Some((lower, upper)) = inner.split_once(',') {
            let lower = lower.trim();
            let upper = upper.trim();
            Some(VersionRange {
                lower: (!lower.is_empty()).then(|| Bound {
                    version: Version::parse(lower),
                    inclusive: open_inclusive,
                }),
                upper: (!upper.is_empty()).then(|| Bound {
                    version: Version::parse(upper),
                    inclusive: close_inclusive,
                }),
            })
        } else {
            // [1.0] means exactly 1.0
            let v = Version::parse(inner.trim());
            Some(VersionRange {
                lower: Some(Bound {
                    version: v.clone(),
                    inclusive: true,
                }),
                upper: Some(Bound {
                    version: v,
                    inclusive: true,
                }),
            })
        }
    }

    /// Check if a version satisfies this range.
    pub fn contains(&self, version: &Version) -> bool {
        if let Some(ref lower) = self.lower {
            let cmp = version.cmp(&lower.version);
            if lower.inclusive {
                if cmp == Ordering::Less {
                    return false;
                }
            } else if cmp != Ordering::Greater {
                return false;
            }
        }
        if let Some(ref upper) = self.upper {
            let cmp = version.cmp(&upper.version);
            if upper.inclusive {
                if cmp == Ordering::Greater {
                    return false;
                }
            } else if cmp != Ordering::Less {
                return false;
            }
        }
        true
    }
}

/// How a requested version string selects among available versions.
#[derive(Debug, Clone)]
pub enum VersionSelector {
    Exact(String),
    /// `1.+` (prefix `1.`) or `+` (empty prefix).
    Prefix(String),
    Range(VersionRange),
    LatestRelease,
    LatestIntegration,
}

impl VersionSelector {
    pub fn parse(requested: &str) -> Self {
        let s = requested.trim();
        match s {
            "latest.release" => return Self::LatestRelease,
            "latest.integration" => return Self::LatestIntegration,
            _ => {}
        }
        if let Some(prefix) = s.strip_suffix('+') {
            if prefix.is_empty() || prefix.ends_with('.') {
                return Self::Prefix(prefix.to_string());
            }
        }
        if let Some(range) = VersionRange::parse(s) {
            return Self::Range(range);
        }
        Self::Exact(s.to_string())
    }

    /// Whether selection needs the list of available versions.
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Self::Exact(_))
    }

    /// Whether the candidate's metadata status must be consulted.
    pub fn requires_status(&self) -> bool {
        matches!(self, Self::LatestRelease)
    }

    /// Check a candidate version. `status` is only consulted for
    /// `latest.release`, where `None` means unknown and does not match.
    pub fn accepts(&self, candidate: &str, status: Option<&str>) -> bool {
        match self {
            Self::Exact(v) => v == candidate,
            Self::Prefix(p) => candidate.starts_with(p.as_str()),
            Self::Range(r) => r.contains(&Version::parse(candidate)),
            Self::LatestRelease => status == Some(modgraph_core::metadata::STATUS_RELEASE),
            Self::LatestIntegration => true,
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => f.write_str(v),
            Self::Prefix(p) => write!(f, "{p}+"),
            Self::Range(r) => {
                let open = match &r.lower {
                    Some(b) if b.inclusive => "[",
                    _ => "(",
                };
                let close = match &r.upper {
                    Some(b) if b.inclusive => "]",
                    _ => ")",
                };
                let lower = r.lower.as_ref().map(|b| b.version.to_string()).unwrap_or_default();
                let upper = r.upper.as_ref().map(|b| b.version.to_string()).unwrap_or_default();
                write!(f, "{open}{lower},{upper}{close}")
            }
            Self::LatestRelease => f.write_str("latest.release"),
            Self::LatestIntegration => f.write_str("latest.integration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_ordering() {
        let v1 = Version::parse("1.0");
        let v2 = Version::parse("2.0");
        assert!(v1 < v2);
    }

    #[test]
    fn three_part_ordering() {
        let v1 = Version::parse("1.0.0");
        let v2 = Version::parse("1.0.1");
        let v3 = Version::parse("1.1.0");
        assert!(v1 < v2);
        assert!(v2 < v3);
    }

    #[test]
    fn qualifier_ordering() {
        let dev = Version::parse("1.0-dev");
        let alpha = Version::parse("1.0-alpha");
        let beta = Version::parse("1.0-beta");
        let rc = Version::parse("1.0-rc");
        let release = Version::parse("1.0");
        let sp = Version::parse("1.0-sp");

        assert!(dev < alpha);
        assert!(alpha < beta);
        assert!(beta < rc);
        assert!(rc < release);
        assert!(release < sp);
    }

    #[test]
    fn snapshot_before_release() {
        let snap = Version::parse("1.0-SNAPSHOT");
        let rel = Version::parse("1.0");
        assert!(snap < rel);
    }

    #[test]
    fn trailing_zeros_equal() {
        assert_eq!(Version::parse("1.0"), Version::parse("1.0.0"));
    }

    #[test]
    fn digit_letter_transitions_split() {
        assert_eq!(Version::parse("1.0beta2"), Version::parse("1.0-beta-2"));
        assert!(Version::parse("1.0rc1") < Version::parse("1.0"));
        assert_eq!(Version::parse("1_2+3"), Version::parse("1.2.3"));
    }

    #[test]
    fn numeric_vs_string() {
        let v1 = Version::parse("1.0.0");
        let v2 = Version::parse("1.0.0-jre");
        assert!(v1 > v2);
    }

    #[test]
    fn base_version_and_qualified() {
        let v = Version::parse("2.0-beta");
        assert!(v.is_qualified());
        assert_eq!(v.base_version().original, "2.0");

        let plain = Version::parse("2.0");
        assert!(!plain.is_qualified());
        assert_eq!(plain.base_version().original, "2.0");

        let compact = Version::parse("3.1rc2");
        assert_eq!(compact.base_version().original, "3.1");

        let text = Version::parse("beta");
        assert_eq!(text.base_version().original, "beta");
    }

    #[test]
    fn is_snapshot() {
        let v = Version::parse("1.0-SNAPSHOT");
        assert!(v.is_snapshot());
        assert!(!Version::parse("1.0.0").is_snapshot());
    }

    #[test]
    fn version_range_inclusive() {
        let range = VersionRange::parse("[1.0,2.0]").unwrap();
        assert!(range.contains(&Version::parse("1.0")));
        assert!(range.contains(&Version::parse("1.5")));
        assert!(range.contains(&Version::parse("2.0")));
        assert!(!range.contains(&Version::parse("0.9")));
        assert!(!range.contains(&Version::parse("2.1")));
    }

    #[test]
    fn version_range_exclusive_upper() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.contains(&Version::parse("1.9.9")));
        assert!(!range.contains(&Version::parse("2.0")));
    }

    #[test]
    fn version_range_open_lower() {
        let range = VersionRange::parse("(,2.0)").unwrap();
        assert!(range.contains(&Version::parse("1.0")));
        assert!(!range.contains(&Version::parse("2.0")));
    }

    #[test]
    fn version_range_exact() {
        let range = VersionRange::parse("[1.5]").unwrap();
        assert!(range.contains(&Version::parse("1.5")));
        assert!(!range.contains(&Version::parse("1.4")));
    }

    #[test]
    fn bare_version_not_a_range() {
        assert!(VersionRange::parse("1.0").is_none());
    }

    #[test]
    fn selector_parsing() {
        assert!(matches!(VersionSelector::parse("1.+"), VersionSelector::Prefix(p) if p == "1."));
        assert!(matches!(VersionSelector::parse("+"), VersionSelector::Prefix(p) if p.is_empty()));
        assert!(matches!(VersionSelector::parse("[1,2)"), VersionSelector::Range(_)));
        assert!(matches!(VersionSelector::parse("latest.release"), VersionSelector::LatestRelease));
        assert!(!VersionSelector::parse("1.0").is_dynamic());
        assert!(VersionSelector::parse("1.+").accepts("1.4", None));
        assert!(!VersionSelector::parse("1.+").accepts("10.0", None));
        assert!(VersionSelector::parse("latest.release").accepts("2.0", Some("release")));
        assert!(!VersionSelector::parse("latest.release").accepts("2.0", Some("integration")));
    }

    #[test]
    fn comparator_trait() {
        let cmp = DefaultVersionComparator;
        assert_eq!(cmp.compare("1.10", "1.9"), Ordering::Greater);
        assert_eq!(cmp.compare("1.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn display() {
        assert_eq!(Version::parse("1.8.0").to_string(), "1.8.0");
        assert_eq!(VersionSelector::parse("[1.0,2.0)").to_string(), "[1.0,2.0)");
    }
}
