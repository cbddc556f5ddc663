//! Operator policy and scope classification for client identifiers

use std::collections::{BTreeMap, HashSet};

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// How a client identifier relates to the configured policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Eligible for mutation.
    InScope,
    /// Matches none of the configured filter patterns.
    OutOfScopeFiltered,
    /// On the ignore list; never touched by any branch of the sync.
    Ignored,
}

/// Operator policy for a reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPolicy {
    /// Client identifiers the sync must never touch, in any direction.
    #[serde(default)]
    pub ignore_list: Vec<String>,
    /// Client identifiers kept disabled in the target system even while
    /// the directory lists them as active.
    #[serde(default)]
    pub disabled_list: Vec<String>,
    /// Regular expressions narrowing the sync to matching identifiers.
    /// Empty means every identifier is in scope.
    #[serde(default)]
    pub filter_patterns: Vec<String>,
    /// Remove clients outright where the sync would otherwise disable them.
    #[serde(default)]
    pub delete_instead_of_disable: bool,
    /// Rewrite every in-scope client even when its watermark is current.
    #[serde(default)]
    pub force_resync: bool,
    /// Directory field name to extended parameter name, written on every
    /// create and update.
    #[serde(default = "default_claims_mapping")]
    pub claims_mapping: BTreeMap<String, String>,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            ignore_list: Vec::new(),
            disabled_list: Vec::new(),
            filter_patterns: Vec::new(),
            delete_instead_of_disable: false,
            force_resync: false,
            claims_mapping: default_claims_mapping(),
        }
    }
}

pub fn default_claims_mapping() -> BTreeMap<String, String> {
    [
        ("last_updated", "register_last_updated"),
        ("organisation_id", "organisation_id"),
        ("software_id", "software_id"),
        ("software_version", "software_version"),
        ("claims", "claims"),
    ]
    .into_iter()
    .map(|(field, parameter)| (field.to_string(), parameter.to_string()))
    .collect()
}

/// Policy compiled for per-identifier checks.
pub struct ScopeFilter {
    ignore: HashSet<String>,
    disabled: HashSet<String>,
    patterns: Option<RegexSet>,
}

impl ScopeFilter {
    /// Compile the policy's lists and patterns.
    pub fn new(policy: &SyncPolicy) -> Result<Self> {
        let patterns = if policy.filter_patterns.is_empty() {
            None
        } else {
            Some(
                RegexSet::new(&policy.filter_patterns)
                    .map_err(|e| EngineError::FilterPattern(e.to_string()))?,
            )
        };

        Ok(Self {
            ignore: policy.ignore_list.iter().cloned().collect(),
            disabled: policy.disabled_list.iter().cloned().collect(),
            patterns,
        })
    }

    /// Classify one identifier. Filter scoping is checked before the
    /// ignore list, so an ignored identifier outside the filter reports
    /// as out of scope.
    pub fn classify(&self, client_id: &str) -> Scope {
        if let Some(patterns) = &self.patterns {
            if !patterns.is_match(client_id) {
                return Scope::OutOfScopeFiltered;
            }
        }
        if self.ignore.contains(client_id) {
            return Scope::Ignored;
        }
        Scope::InScope
    }

    /// Whether the identifier must be held disabled regardless of its
    /// directory status.
    pub fn is_force_disabled(&self, client_id: &str) -> bool {
        self.disabled.contains(client_id)
    }

    /// Identifiers listed as both ignored and disabled; the ignore list
    /// wins for these.
    pub fn conflicting_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .disabled
            .iter()
            .filter(|id| self.ignore.contains(*id))
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn policy_with(filter: &[&str], ignore: &[&str], disabled: &[&str]) -> SyncPolicy {
        SyncPolicy {
            filter_patterns: filter.iter().map(|s| s.to_string()).collect(),
            ignore_list: ignore.iter().map(|s| s.to_string()).collect(),
            disabled_list: disabled.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn everything_is_in_scope_without_patterns() {
        let filter = ScopeFilter::new(&SyncPolicy::default()).unwrap();
        assert_eq!(filter.classify("https://rp.example.com/rp/1"), Scope::InScope);
    }

    #[test_case("https://rp.example.com/rp/1", Scope::InScope; "matching id")]
    #[test_case("https://other.example.org/rp/2", Scope::OutOfScopeFiltered; "non matching id")]
    #[test_case("urn:banks:rp-17", Scope::InScope; "second pattern")]
    fn patterns_narrow_the_scope(id: &str, expected: Scope) {
        let policy = policy_with(&["^https://rp\\.example\\.com/", "^urn:banks:"], &[], &[]);
        let filter = ScopeFilter::new(&policy).unwrap();
        assert_eq!(filter.classify(id), expected);
    }

    #[test]
    fn filter_check_runs_before_the_ignore_list() {
        let policy = policy_with(&["^urn:banks:"], &["https://elsewhere.example.com/rp/9"], &[]);
        let filter = ScopeFilter::new(&policy).unwrap();
        // Ignored id that also fails the filter reports as filtered.
        assert_eq!(
            filter.classify("https://elsewhere.example.com/rp/9"),
            Scope::OutOfScopeFiltered
        );

        let policy = policy_with(&["^urn:banks:"], &["urn:banks:rp-1"], &[]);
        let filter = ScopeFilter::new(&policy).unwrap();
        assert_eq!(filter.classify("urn:banks:rp-1"), Scope::Ignored);
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        let policy = policy_with(&["^urn:(unclosed"], &[], &[]);
        let result = ScopeFilter::new(&policy);
        assert!(matches!(result, Err(EngineError::FilterPattern(_))));
    }

    #[test]
    fn disabled_list_membership_is_exact() {
        let policy = policy_with(&[], &[], &["urn:banks:rp-1"]);
        let filter = ScopeFilter::new(&policy).unwrap();
        assert!(filter.is_force_disabled("urn:banks:rp-1"));
        assert!(!filter.is_force_disabled("urn:banks:rp-10"));
        // The disabled list does not remove an id from scope.
        assert_eq!(filter.classify("urn:banks:rp-1"), Scope::InScope);
    }

    #[test]
    fn overlapping_lists_are_reported_sorted() {
        let policy = policy_with(&[], &["b", "a", "c"], &["c", "a"]);
        let filter = ScopeFilter::new(&policy).unwrap();
        assert_eq!(filter.conflicting_ids(), vec!["a", "c"]);
    }

    #[test]
    fn default_mapping_covers_the_watermark() {
        let mapping = default_claims_mapping();
        assert_eq!(
            mapping.get("last_updated").map(String::as_str),
            Some("register_last_updated")
        );
        assert_eq!(mapping.len(), 5);
    }
}
