//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level voxmeter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimator: Option<EstimatorConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationConfig>,
}

/// Per-call estimator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Sample rate assumed for synthesized audio (default: 8000, telephony).
    #[serde(default = "default_sample_rate_hz")]
    pub default_sample_rate_hz: u32,

    /// Channel count assumed for synthesized audio (default: 1).
    #[serde(default = "default_channel_count")]
    pub default_channel_count: u16,

    /// Seconds between periodic snapshot reports (0 = disabled).
    #[serde(default)]
    pub report_interval_secs: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            default_sample_rate_hz: default_sample_rate_hz(),
            default_channel_count: default_channel_count(),
            report_interval_secs: 0,
        }
    }
}

fn default_sample_rate_hz() -> u32 {
    8000
}

fn default_channel_count() -> u16 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-target log level overrides (e.g. "voxmeter_quality=trace").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Metrics export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Record snapshots into the Prometheus recorder.
    #[serde(default)]
    pub enabled: bool,
}

/// Synthetic load settings for `voxmeter simulate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Concurrent calls to place (default: 100).
    #[serde(default = "default_sim_calls")]
    pub calls: u32,

    /// Conversation turns per established call (default: 1).
    ///
    /// The silence between one response and the next counts as inferred
    /// loss, so multi-turn calls score far below single-turn ones.
    #[serde(default = "default_sim_turns")]
    pub turns: u32,

    /// RNG seed so runs are reproducible (default: 42).
    #[serde(default = "default_sim_seed")]
    pub seed: u64,

    /// Fraction of calls that never reach the established state.
    #[serde(default)]
    pub setup_failure_ratio: f64,

    /// Maximum random delivery delay added to each audio chunk, in ms.
    /// At most [`MAX_SIM_CHUNK_JITTER_MS`].
    #[serde(default = "default_sim_chunk_jitter_ms")]
    pub chunk_jitter_ms: f64,

    /// Fraction of audio chunks silently dropped before delivery.
    #[serde(default)]
    pub drop_ratio: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            calls: default_sim_calls(),
            turns: default_sim_turns(),
            seed: default_sim_seed(),
            setup_failure_ratio: 0.0,
            chunk_jitter_ms: default_sim_chunk_jitter_ms(),
            drop_ratio: 0.0,
        }
    }
}

fn default_sim_calls() -> u32 {
    100
}

fn default_sim_turns() -> u32 {
    1
}

fn default_sim_seed() -> u64 {
    42
}

fn default_sim_chunk_jitter_ms() -> f64 {
    5.0
}

/// Upper bound for `simulation.chunk_jitter_ms`.
pub const MAX_SIM_CHUNK_JITTER_MS: f64 = 60_000.0;

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::VoxmeterError::Io)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::VoxmeterError::Config(e.to_string()))?;

        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Resolve the default config file path.
    pub fn config_dir() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Estimator settings, falling back to defaults.
    pub fn estimator(&self) -> EstimatorConfig {
        self.estimator.clone().unwrap_or_default()
    }

    /// Logging settings, falling back to defaults.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Simulation settings, falling back to defaults.
    pub fn simulation(&self) -> SimulationConfig {
        self.simulation.clone().unwrap_or_default()
    }

    /// Whether snapshots should be exported to the metrics recorder.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.as_ref().is_some_and(|m| m.enabled)
    }

    /// Get a config value by dotted path (e.g. "estimator.default_sample_rate_hz").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(est) = &self.estimator {
            if est.default_sample_rate_hz == 0 {
                errors.push("estimator.default_sample_rate_hz cannot be 0".to_string());
            }
            if est.default_channel_count == 0 {
                errors.push("estimator.default_channel_count cannot be 0".to_string());
            }
        }

        if let Some(log) = &self.logging {
            if !matches!(log.format.as_str(), "plain" | "json") {
                errors.push(format!("Unknown logging.format '{}'", log.format));
            }
            if !matches!(log.output.as_str(), "stderr" | "stdout") {
                errors.push(format!("Unknown logging.output '{}'", log.output));
            }
        }

        if let Some(sim) = &self.simulation {
            if !(0.0..=1.0).contains(&sim.setup_failure_ratio) {
                errors.push(format!(
                    "simulation.setup_failure_ratio must be within [0, 1], got {}",
                    sim.setup_failure_ratio
                ));
            }
            if !(0.0..=1.0).contains(&sim.drop_ratio) {
                errors.push(format!(
                    "simulation.drop_ratio must be within [0, 1], got {}",
                    sim.drop_ratio
                ));
            }
            if !(0.0..=MAX_SIM_CHUNK_JITTER_MS).contains(&sim.chunk_jitter_ms) {
                errors.push(format!(
                    "simulation.chunk_jitter_ms must be within [0, {MAX_SIM_CHUNK_JITTER_MS}], got {}",
                    sim.chunk_jitter_ms
                ));
            }
            if sim.calls == 0 {
                warnings.push("simulation.calls is 0, nothing will be simulated".to_string());
            }
            if sim.turns == 0 {
                warnings.push("simulation.turns is 0, no latency samples will be produced".to_string());
            }
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for voxmeter data: `~/.voxmeter/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".voxmeter")
}
