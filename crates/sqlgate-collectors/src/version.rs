//! Numeric version extraction and comparison.
//!
//! Server version strings are messy ("Oracle Database 19c Enterprise
//! Edition Release 19.7.0.0.0 - Production"); pack ranges are plain dotted
//! tuples. Both reduce to component vectors compared numerically, with
//! missing components treated as zero.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static FIVE_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)\.(\d+)\.(\d+)").expect("valid regex"));
static THREE_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("valid regex"));

/// A dotted numeric version. An empty component list compares as all zeros,
/// so `19.0` equals `19.0.0.0.0`.
#[derive(Debug, Clone, Default)]
pub struct VersionNumber(pub Vec<u64>);

impl PartialEq for VersionNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionNumber {}

impl VersionNumber {
    /// Extract the version out of a server product string: the first run of
    /// five dotted integers (Oracle style), else three, else nothing.
    pub fn parse_server(version_string: &str) -> VersionNumber {
        let captures = FIVE_PART
            .captures(version_string)
            .or_else(|| THREE_PART.captures(version_string));
        let Some(captures) = captures else {
            return VersionNumber(Vec::new());
        };
        let components = captures
            .iter()
            .skip(1)
            .flatten()
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        VersionNumber(components)
    }

    /// Parse a pack range bound such as `"19.0"` or `"19.12.0.0.0"`. Each
    /// dot-separated component must be an integer.
    pub fn parse_dotted(bound: &str) -> Option<VersionNumber> {
        let components = bound
            .trim()
            .split('.')
            .map(|part| part.trim().parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        if components.is_empty() {
            None
        } else {
            Some(VersionNumber(components))
        }
    }

    pub fn component(&self, index: usize) -> u64 {
        self.0.get(index).copied().unwrap_or(0)
    }
}

impl PartialOrd for VersionNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            match self.component(i).cmp(&other.component(i)) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "0");
        }
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}
