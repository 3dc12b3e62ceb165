//! Dependency Graph Module
//!
//! Static mapping from a changed source table to the cache-key prefixes
//! that must be invalidated when that table changes. Authored once,
//! validated at construction, never mutated at runtime.

use std::collections::HashMap;

use crate::error::{CacheError, Result};

// == Table Names ==
/// Membership table: changes fan out to every team-scoped view.
pub const MEMBERSHIP_TABLE: &str = "team_members";

/// Schedule-entry table: changes fan out to every team-scoped view.
pub const SCHEDULE_TABLE: &str = "schedule_entries";

/// Global sprint configuration table.
pub const SPRINT_CONFIG_TABLE: &str = "sprint_config";

/// Tables whose changes trigger best-effort pre-warming of high-traffic
/// fetches.
pub const CRITICAL_TABLES: &[&str] = &[SPRINT_CONFIG_TABLE, SCHEDULE_TABLE];

/// Generic prefix shared by all team-scoped cache keys, swept coarsely
/// when a fan-out table changes.
pub const TEAM_SCOPED_PREFIX: &str = "team_";

/// Aggregate-rollup prefixes, treated as dirty on any underlying change:
/// computing a precise dependency chain for aggregates is not worth the
/// bookkeeping.
pub const AGGREGATE_PREFIXES: &[&str] = &["company_capacity", "executive_dashboard"];

// == Dependency Graph ==
/// Immutable `source table -> dependent key prefixes` mapping.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    // == Constructor ==
    /// Builds a graph from `(source, dependent prefixes)` pairs.
    ///
    /// Validation happens here, once: an empty prefix would substring-match
    /// every live key, and a duplicate source would silently shadow its
    /// earlier entry, so both are rejected.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: Into<String>,
    {
        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for (source, prefixes) in entries {
            let source = source.into();
            if source.is_empty() {
                return Err(CacheError::InvalidGraph(
                    "empty source table name".to_string(),
                ));
            }
            let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
            if let Some(empty) = prefixes.iter().position(|p| p.is_empty()) {
                return Err(CacheError::InvalidGraph(format!(
                    "source '{}' has an empty prefix at position {}",
                    source, empty
                )));
            }
            if edges.contains_key(&source) {
                return Err(CacheError::InvalidGraph(format!(
                    "duplicate source '{}'",
                    source
                )));
            }
            edges.insert(source, prefixes);
        }
        Ok(Self { edges })
    }

    // == Default Graph ==
    /// The scheduling domain's dependency table.
    pub fn default_graph() -> Self {
        Self::new([
            ("teams", vec![TEAM_SCOPED_PREFIX, SCHEDULE_TABLE]),
            ("team_members", vec!["teams", "availability"]),
            ("schedule_entries", vec!["availability", "capacity"]),
            ("sprints", vec!["sprint_config", SCHEDULE_TABLE]),
            ("sprint_config", vec!["sprints", "capacity"]),
            ("users", vec!["team_members", "availability", "presence"]),
            ("availability", vec!["capacity"]),
        ])
        .expect("built-in dependency graph is valid")
    }

    // == Dependents ==
    /// Returns the dependent prefixes declared for a source table; empty
    /// for untracked tables.
    pub fn dependents(&self, table: &str) -> &[String] {
        self.edges.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    // == Sources ==
    /// Iterates over the tracked source tables.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    /// Number of tracked source tables.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if no sources are tracked.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_lookup() {
        let graph = DependencyGraph::new([("teams", vec!["team_members", "schedule_entries"])])
            .unwrap();

        assert_eq!(
            graph.dependents("teams"),
            &["team_members".to_string(), "schedule_entries".to_string()]
        );
    }

    #[test]
    fn test_untracked_table_has_no_dependents() {
        let graph = DependencyGraph::new([("teams", vec!["team_members"])]).unwrap();
        assert!(graph.dependents("unknown_table").is_empty());
    }

    #[test]
    fn test_rejects_empty_prefix() {
        let result = DependencyGraph::new([("teams", vec!["team_members", ""])]);
        assert!(matches!(result, Err(CacheError::InvalidGraph(_))));
    }

    #[test]
    fn test_rejects_empty_source() {
        let result = DependencyGraph::new([("", vec!["team_members"])]);
        assert!(matches!(result, Err(CacheError::InvalidGraph(_))));
    }

    #[test]
    fn test_rejects_duplicate_source() {
        let result = DependencyGraph::new([
            ("teams", vec!["team_members"]),
            ("teams", vec!["schedule_entries"]),
        ]);
        assert!(matches!(result, Err(CacheError::InvalidGraph(_))));
    }

    #[test]
    fn test_default_graph_builds() {
        let graph = DependencyGraph::default_graph();
        assert!(!graph.is_empty());
        assert!(!graph.dependents("teams").is_empty());
        assert!(graph.sources().any(|s| s == "schedule_entries"));
    }

    #[test]
    fn test_empty_graph_is_valid() {
        let graph = DependencyGraph::new(Vec::<(String, Vec<String>)>::new()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.dependents("teams").is_empty());
    }
}
