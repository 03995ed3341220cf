//! Configuration management for Pathweave.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on egress paths a single router will manage.
pub const MAX_PATHS: usize = 1024;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Router configuration.
    #[serde(default)]
    pub router: RouterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.router.validate()
    }

    /// Get default config path.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "pathweave", "pathweave").map_or_else(
            || PathBuf::from("pathweave.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }

    /// Create example configuration.
    pub fn example() -> Self {
        Self {
            router: RouterConfig {
                paths: 8,
                flow_idle_timeout: Some(Duration::from_secs(30)),
                seed: Some(42),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Router configuration.
///
/// Feature flags mirror the switches a line card exposes; everything else
/// tunes the telemetry model and the periodic sweeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Number of egress paths.
    #[serde(default = "default_paths")]
    pub paths: usize,

    /// Score-based path selection (round-robin when disabled).
    #[serde(default = "default_true")]
    pub adaptive_routing: bool,

    /// Apply mitigation on congested paths.
    #[serde(default = "default_true")]
    pub congestion_control: bool,

    /// Weighted tie-break among near-equal paths.
    #[serde(default = "default_true")]
    pub load_balancing: bool,

    /// Fixed latency added to every dispatch.
    #[serde(default = "default_routing_latency", with = "humantime_serde")]
    pub routing_latency: Duration,

    /// Emit periodic telemetry snapshots.
    #[serde(default = "default_true")]
    pub advanced_telemetry: bool,

    /// Periodically refresh congestion levels and weights.
    #[serde(default = "default_true")]
    pub dynamic_congestion_control: bool,

    /// Run the inactivity-based failure detector.
    #[serde(default = "default_true")]
    pub rapid_failure_detection: bool,

    /// Trim oversized packets on congested paths.
    #[serde(default = "default_true")]
    pub packet_trimming: bool,

    /// Congestion level above which a path counts as congested (0-1).
    #[serde(default = "default_congestion_threshold")]
    pub congestion_threshold: f64,

    /// Link capacity used for instantaneous utilization (bits/s).
    #[serde(default = "default_link_capacity")]
    pub link_capacity_bps: f64,

    /// Window over which one packet's bits count as load.
    #[serde(default = "default_utilization_window", with = "humantime_serde")]
    pub utilization_window: Duration,

    /// How long a failure mark keeps a path out of selection.
    #[serde(default = "default_failure_recovery", with = "humantime_serde")]
    pub failure_recovery: Duration,

    /// Idle time after which the detector marks a path failed.
    #[serde(default = "default_inactivity_threshold", with = "humantime_serde")]
    pub inactivity_threshold: Duration,

    /// Failure detector cadence.
    #[serde(default = "default_fast_interval", with = "humantime_serde")]
    pub failure_detection_interval: Duration,

    /// Congestion refresh cadence.
    #[serde(default = "default_fast_interval", with = "humantime_serde")]
    pub congestion_refresh_interval: Duration,

    /// Telemetry snapshot cadence.
    #[serde(default = "default_telemetry_interval", with = "humantime_serde")]
    pub telemetry_interval: Duration,

    /// Evict flows idle for longer than this (unbounded table when unset).
    #[serde(default, with = "humantime_serde")]
    pub flow_idle_timeout: Option<Duration>,

    /// RNG seed for load-balanced selection (entropy when unset).
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_paths() -> usize {
    4
}
fn default_true() -> bool {
    true
}
fn default_routing_latency() -> Duration {
    Duration::from_nanos(500)
}
fn default_congestion_threshold() -> f64 {
    0.8
}
fn default_link_capacity() -> f64 {
    100e9
}
fn default_utilization_window() -> Duration {
    Duration::from_millis(1)
}
fn default_failure_recovery() -> Duration {
    Duration::from_secs(1)
}
fn default_inactivity_threshold() -> Duration {
    Duration::from_millis(100)
}
fn default_fast_interval() -> Duration {
    Duration::from_millis(1)
}
fn default_telemetry_interval() -> Duration {
    Duration::from_millis(10)
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            paths: default_paths(),
            adaptive_routing: true,
            congestion_control: true,
            load_balancing: true,
            routing_latency: default_routing_latency(),
            advanced_telemetry: true,
            dynamic_congestion_control: true,
            rapid_failure_detection: true,
            packet_trimming: true,
            congestion_threshold: default_congestion_threshold(),
            link_capacity_bps: default_link_capacity(),
            utilization_window: default_utilization_window(),
            failure_recovery: default_failure_recovery(),
            inactivity_threshold: default_inactivity_threshold(),
            failure_detection_interval: default_fast_interval(),
            congestion_refresh_interval: default_fast_interval(),
            telemetry_interval: default_telemetry_interval(),
            flow_idle_timeout: None,
            seed: None,
        }
    }
}

impl RouterConfig {
    /// Create a config with `paths` egress paths and defaults elsewhere.
    pub fn with_paths(paths: usize) -> Self {
        Self {
            paths,
            ..Default::default()
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.paths == 0 {
            return Err(Error::InvalidConfig("router needs at least one path".into()));
        }
        if self.paths > MAX_PATHS {
            return Err(Error::InvalidConfig(format!(
                "{} paths exceeds the maximum of {MAX_PATHS}",
                self.paths
            )));
        }
        if !(0.0..=1.0).contains(&self.congestion_threshold) {
            return Err(Error::InvalidConfig(format!(
                "congestion_threshold must be within [0, 1], got {}",
                self.congestion_threshold
            )));
        }
        if !self.link_capacity_bps.is_finite() || self.link_capacity_bps <= 0.0 {
            return Err(Error::InvalidConfig(
                "link_capacity_bps must be a positive number".into(),
            ));
        }
        if self.utilization_window.is_zero() {
            return Err(Error::InvalidConfig("utilization_window must be non-zero".into()));
        }

        let timers = [
            (self.rapid_failure_detection, self.failure_detection_interval, "failure_detection_interval"),
            (self.dynamic_congestion_control, self.congestion_refresh_interval, "congestion_refresh_interval"),
            (self.advanced_telemetry, self.telemetry_interval, "telemetry_interval"),
        ];
        for (enabled, interval, name) in timers {
            if enabled && interval.is_zero() {
                return Err(Error::InvalidConfig(format!("{name} must be non-zero")));
            }
        }

        if self.flow_idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::InvalidConfig("flow_idle_timeout must be non-zero".into()));
        }

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_true")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: true,
        }
    }
}

/// Initialize logging.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(config.color).with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}
