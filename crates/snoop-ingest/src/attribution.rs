//! Job attribution from a process environment
//!
//! Batch schedulers each export their own job variables. Attribution tries an ordered list of
//! strategies; the first one that recognizes the environment supplies the job fields. When none
//! does, only the generic MPI variables are available.

use serde_json::{Map, Value};

/// Read-only view over the `env` object of a log file.
#[derive(Debug, Clone, Copy)]
pub struct EnvView<'a> {
    vars: &'a Map<String, Value>,
}

impl<'a> EnvView<'a> {
    pub fn new(vars: &'a Map<String, Value>) -> Self {
        Self { vars }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Variable value as text; non-string JSON values are rendered as JSON, null counts as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_null()).map(value_text)
    }

    /// First of `keys` that is set.
    pub fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Job fields supplied by one scheduler's environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribution {
    pub job_id: Option<String>,
    pub queue: Option<String>,
    pub account: Option<String>,
    pub node_number: Option<String>,
    pub job_name: Option<String>,
    pub job_directory: Option<String>,
}

/// One way of recognizing a scheduler from a process environment.
pub trait AttributionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when this scheduler's marker variable is absent.
    fn attribute(&self, env: &EnvView<'_>) -> Option<Attribution>;
}

/// PBS Pro, recognized by `PBS_JOBID`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PbsAttribution;

impl AttributionStrategy for PbsAttribution {
    fn name(&self) -> &'static str {
        "pbs"
    }

    fn attribute(&self, env: &EnvView<'_>) -> Option<Attribution> {
        if !env.contains("PBS_JOBID") {
            return None;
        }

        Some(Attribution {
            job_id: env.get("PBS_JOBID"),
            queue: env.get("PBS_QUEUE"),
            account: env.get("PBS_ACCOUNT"),
            node_number: env.get("PBS_NODENUM"),
            job_name: env.get("PBS_JOBNAME"),
            job_directory: env.get("PBS_JOBDIR"),
        })
    }
}

/// Cobalt, recognized by `COBALT_JOBID`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CobaltAttribution;

impl AttributionStrategy for CobaltAttribution {
    fn name(&self) -> &'static str {
        "cobalt"
    }

    fn attribute(&self, env: &EnvView<'_>) -> Option<Attribution> {
        if !env.contains("COBALT_JOBID") {
            return None;
        }

        Some(Attribution {
            job_id: env.get("COBALT_JOBID"),
            queue: env.get("COBALT_QUEUE"),
            account: env.get("COBALT_ACCOUNT"),
            node_number: None,
            job_name: env.get("COBALT_JOBNAME"),
            job_directory: None,
        })
    }
}

/// PBS first, then Cobalt.
pub fn default_strategies() -> Vec<Box<dyn AttributionStrategy>> {
    vec![Box::new(PbsAttribution), Box::new(CobaltAttribution)]
}

/// Apply `strategies` in order; the first match wins.
pub fn attribute<'s>(
    strategies: &'s [Box<dyn AttributionStrategy>],
    env: &EnvView<'_>,
) -> Option<(&'s str, Attribution)> {
    strategies
        .iter()
        .find_map(|strategy| strategy.attribute(env).map(|a| (strategy.name(), a)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test env must be an object"),
        }
    }

    #[test]
    fn test_pbs_takes_priority_over_cobalt() {
        let vars = env(json!({
            "PBS_JOBID": "123.pbs",
            "PBS_QUEUE": "prod",
            "COBALT_JOBID": "999",
            "COBALT_QUEUE": "default"
        }));
        let strategies = default_strategies();
        let (name, attribution) = attribute(&strategies, &EnvView::new(&vars)).unwrap();

        assert_eq!(name, "pbs");
        assert_eq!(attribution.job_id.as_deref(), Some("123.pbs"));
        assert_eq!(attribution.queue.as_deref(), Some("prod"));
    }

    #[test]
    fn test_cobalt_fields() {
        let vars = env(json!({
            "COBALT_JOBID": "4242",
            "COBALT_PARTSIZE": "128",
            "COBALT_ACCOUNT": "climate"
        }));
        let strategies = default_strategies();
        let (name, attribution) = attribute(&strategies, &EnvView::new(&vars)).unwrap();

        assert_eq!(name, "cobalt");
        assert_eq!(attribution.job_id.as_deref(), Some("4242"));
        assert_eq!(attribution.account.as_deref(), Some("climate"));
        assert_eq!(attribution.job_directory, None);
    }

    #[test]
    fn test_no_marker_means_no_attribution() {
        let vars = env(json!({"PMI_JOBID": "77", "PMI_SIZE": "8"}));
        assert!(attribute(&default_strategies(), &EnvView::new(&vars)).is_none());
    }

    #[test]
    fn test_non_string_values_are_rendered() {
        let vars = env(json!({"NRANKS": 16, "WORLD_SIZE": null}));
        let view = EnvView::new(&vars);
        assert_eq!(view.get("NRANKS").as_deref(), Some("16"));
        assert_eq!(view.get("WORLD_SIZE"), None);
        assert_eq!(view.first_of(&["PMI_SIZE", "WORLD_SIZE", "NRANKS"]).as_deref(), Some("16"));
    }
}
