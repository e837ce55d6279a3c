//! Engine configuration

use std::time::Duration;

/// Runtime limits for the dialogue engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Budget for one step. Overrunning it is reported, not cancelled.
    pub step_timeout: Duration,
    /// Sessions idle this long are closed. `None` keeps them forever.
    pub session_idle_timeout: Option<Duration>,
    pub max_auto_transitions: usize,
    /// Capacity of each session's stimulus inbox
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_millis(30_000),
            session_idle_timeout: Some(Duration::from_secs(1800)),
            max_auto_transitions: 32,
            channel_capacity: 32,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Missing or unparsable values keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let step_timeout = parse("AGENTFLOW_STEP_TIMEOUT_MS")
            .filter(|ms| *ms > 0)
            .map_or(defaults.step_timeout, Duration::from_millis);
        let session_idle_timeout = match parse("AGENTFLOW_SESSION_IDLE_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.session_idle_timeout,
        };
        let max_auto_transitions = parse("AGENTFLOW_MAX_AUTO_TRANSITIONS")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(defaults.max_auto_transitions);
        // tokio channels panic on a zero capacity
        let channel_capacity = parse("AGENTFLOW_CHANNEL_CAPACITY")
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.channel_capacity);

        Self {
            step_timeout,
            session_idle_timeout,
            max_auto_transitions,
            channel_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(from_pairs(&[]), EngineConfig::default());
    }

    #[test]
    fn test_reads_values() {
        let config = from_pairs(&[
            ("AGENTFLOW_STEP_TIMEOUT_MS", "250"),
            ("AGENTFLOW_SESSION_IDLE_SECS", "60"),
            ("AGENTFLOW_MAX_AUTO_TRANSITIONS", "4"),
            ("AGENTFLOW_CHANNEL_CAPACITY", " 8 "),
        ]);
        assert_eq!(config.step_timeout, Duration::from_millis(250));
        assert_eq!(config.session_idle_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.max_auto_transitions, 4);
        assert_eq!(config.channel_capacity, 8);
    }

    #[test]
    fn test_zero_idle_disables_expiry() {
        let config = from_pairs(&[("AGENTFLOW_SESSION_IDLE_SECS", "0")]);
        assert_eq!(config.session_idle_timeout, None);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("AGENTFLOW_STEP_TIMEOUT_MS", "soon"),
            ("AGENTFLOW_CHANNEL_CAPACITY", "0"),
            ("AGENTFLOW_MAX_AUTO_TRANSITIONS", "-1"),
        ]);
        assert_eq!(config, EngineConfig::default());
    }
}
