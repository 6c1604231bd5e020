use std::env;
use std::path::PathBuf;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SCENARIO_ENV_VAR: &str = "GROUNDWORK_SCENARIO";
const TICKS_ENV_VAR: &str = "GROUNDWORK_TICKS";
const TICK_MS_ENV_VAR: &str = "GROUNDWORK_TICK_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SandboxConfig {
    /// Scenario file; the bundled scenario runs when unset.
    pub(crate) scenario_path: Option<PathBuf>,
    pub(crate) ticks: u32,
    pub(crate) tick_ms: u64,
    /// Log every entity position each `position_log_interval` ticks; 0 disables.
    pub(crate) position_log_interval: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            scenario_path: None,
            ticks: 300,
            tick_ms: 10,
            position_log_interval: 50,
        }
    }
}

impl SandboxConfig {
    pub(crate) fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let scenario_path = lookup(SCENARIO_ENV_VAR)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);
        let ticks = parse_or_default(TICKS_ENV_VAR, lookup(TICKS_ENV_VAR), defaults.ticks);
        let tick_ms = match parse_or_default(
            TICK_MS_ENV_VAR,
            lookup(TICK_MS_ENV_VAR),
            defaults.tick_ms,
        ) {
            0 => {
                warn!(env_var = TICK_MS_ENV_VAR, "zero tick length; falling back to default");
                defaults.tick_ms
            }
            tick_ms => tick_ms,
        };
        Self {
            scenario_path,
            ticks,
            tick_ms,
            ..defaults
        }
    }
}

fn parse_or_default<T>(env_var: &'static str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    let Some(value) = raw else {
        return default;
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(
                env_var,
                value = value.as_str(),
                "invalid env var value; falling back to default"
            );
            default
        }
    }
}

pub(crate) fn build_app() -> SandboxConfig {
    init_tracing();
    info!("=== Groundwork Sandbox ===");
    let config = SandboxConfig::from_env();
    info!(
        scenario = %config
            .scenario_path
            .as_ref()
            .map_or_else(|| "bundled".to_string(), |path| path.display().to_string()),
        ticks = config.ticks,
        tick_ms = config.tick_ms,
        "sandbox_config"
    );
    config
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> SandboxConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        SandboxConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_without_env_vars() {
        assert_eq!(config_from(&[]), SandboxConfig::default());
    }

    #[test]
    fn env_vars_override_defaults() {
        let config = config_from(&[
            (SCENARIO_ENV_VAR, " scenarios/notch.json "),
            (TICKS_ENV_VAR, "42"),
            (TICK_MS_ENV_VAR, "16"),
        ]);
        assert_eq!(
            config.scenario_path,
            Some(PathBuf::from("scenarios/notch.json"))
        );
        assert_eq!(config.ticks, 42);
        assert_eq!(config.tick_ms, 16);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            (SCENARIO_ENV_VAR, "  "),
            (TICKS_ENV_VAR, "many"),
            (TICK_MS_ENV_VAR, "0"),
        ]);
        assert_eq!(config, SandboxConfig::default());
    }
}
