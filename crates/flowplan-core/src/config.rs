//! Planner configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Reject a stage whose interior operators already belong to another stage.
    pub enforce_disjoint_bodies: bool,

    /// Fail `build()` when the stage graph contains a cycle.
    pub verify_acyclic: bool,

    /// Wire stage ports across chains of markers that belong to no stage.
    pub connect_through_markers: bool,

    /// Optional upper bound on the number of stages in one plan.
    pub max_stages: Option<usize>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            enforce_disjoint_bodies: true,
            verify_acyclic: true,
            connect_through_markers: true,
            max_stages: None,
        }
    }
}

impl PlannerConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `FLOWPLAN_ENFORCE_DISJOINT`: `true`/`false`
    /// - `FLOWPLAN_VERIFY_ACYCLIC`: `true`/`false`
    /// - `FLOWPLAN_CONNECT_THROUGH_MARKERS`: `true`/`false`
    /// - `FLOWPLAN_MAX_STAGES`: maximum number of stages
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PlannerConfig::from_env`] but reads from an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup("FLOWPLAN_ENFORCE_DISJOINT").and_then(|s| parse_bool(&s)) {
            cfg.enforce_disjoint_bodies = v;
        }

        if let Some(v) = lookup("FLOWPLAN_VERIFY_ACYCLIC").and_then(|s| parse_bool(&s)) {
            cfg.verify_acyclic = v;
        }

        if let Some(v) = lookup("FLOWPLAN_CONNECT_THROUGH_MARKERS").and_then(|s| parse_bool(&s)) {
            cfg.connect_through_markers = v;
        }

        if let Some(s) = lookup("FLOWPLAN_MAX_STAGES") {
            if let Ok(v) = s.trim().parse::<usize>() {
                cfg.max_stages = Some(v);
            }
        }

        cfg
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_enforce_everything() {
        let cfg = PlannerConfig::default();
        assert!(cfg.enforce_disjoint_bodies);
        assert!(cfg.verify_acyclic);
        assert!(cfg.connect_through_markers);
        assert_eq!(cfg.max_stages, None);
    }

    #[test]
    fn env_overrides_are_applied() {
        let cfg = PlannerConfig::from_lookup(lookup(&[
            ("FLOWPLAN_ENFORCE_DISJOINT", "false"),
            ("FLOWPLAN_VERIFY_ACYCLIC", "0"),
            ("FLOWPLAN_MAX_STAGES", "12"),
        ]));
        assert!(!cfg.enforce_disjoint_bodies);
        assert!(!cfg.verify_acyclic);
        assert!(cfg.connect_through_markers);
        assert_eq!(cfg.max_stages, Some(12));
    }

    #[test]
    fn malformed_values_are_ignored() {
        let cfg = PlannerConfig::from_lookup(lookup(&[
            ("FLOWPLAN_VERIFY_ACYCLIC", "maybe"),
            ("FLOWPLAN_MAX_STAGES", "-3"),
        ]));
        assert_eq!(cfg, PlannerConfig::default());
    }

    #[test]
    fn partial_yaml_style_documents_keep_defaults() {
        let cfg: PlannerConfig = serde_json::from_str(r#"{"verify_acyclic": false}"#).unwrap();
        assert!(!cfg.verify_acyclic);
        assert!(cfg.enforce_disjoint_bodies);
    }
}
