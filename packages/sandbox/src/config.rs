// ABOUTME: Engine configuration passed into the sandbox manager at construction
// ABOUTME: Loads paths, naming, images, deadlines and sweep time from CROWBOX_* variables

use chrono::NaiveTime;
use crowbox_config::constants::*;
use crowbox_config::{parse_env_or_default_with_validation, parse_env_string};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_ROOT: &str = "/home/ubuntu/crow_data";
pub const DEFAULT_NAMESPACE: &str = "crowstudio_";
pub const DEFAULT_BASE_IMAGE: &str = "python:3.10";
pub const DEFAULT_BASELINE_IMAGE: &str = "initialpython";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding one `{team_id}` subdirectory per team
    pub base_root: PathBuf,
    /// Prefix of every sandbox container and image name
    pub namespace: String,
    /// Host part of the address handed back for service sandboxes
    pub public_host: String,
    pub base_image: String,
    /// Image run once per team to let Docker pick a host port
    pub baseline_image: String,
    pub command_timeout: Duration,
    pub build_timeout: Duration,
    /// Upper bound on following the logs of a script sandbox
    pub script_timeout: Duration,
    /// Local wall-clock time of the daily sweep
    pub sweep_at: NaiveTime,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_root: PathBuf::from(DEFAULT_BASE_ROOT),
            namespace: DEFAULT_NAMESPACE.to_string(),
            public_host: "localhost".to_string(),
            base_image: DEFAULT_BASE_IMAGE.to_string(),
            baseline_image: DEFAULT_BASELINE_IMAGE.to_string(),
            command_timeout: Duration::from_secs(60),
            build_timeout: Duration::from_secs(600),
            script_timeout: Duration::from_secs(30),
            sweep_at: NaiveTime::MIN,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let sweep_at = match std::env::var(CROWBOX_SWEEP_AT) {
            Ok(raw) => parse_wall_clock(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    "Environment variable {} has invalid value '{}', using default: {}",
                    CROWBOX_SWEEP_AT,
                    raw,
                    defaults.sweep_at
                );
                defaults.sweep_at
            }),
            Err(_) => defaults.sweep_at,
        };

        Self {
            base_root: PathBuf::from(parse_env_string(CROWBOX_BASE_ROOT, DEFAULT_BASE_ROOT)),
            namespace: parse_env_string(CROWBOX_NAMESPACE, DEFAULT_NAMESPACE),
            public_host: parse_env_string(CROWBOX_PUBLIC_HOST, &defaults.public_host),
            base_image: parse_env_string(CROWBOX_BASE_IMAGE, DEFAULT_BASE_IMAGE),
            baseline_image: parse_env_string(CROWBOX_BASELINE_IMAGE, DEFAULT_BASELINE_IMAGE),
            command_timeout: secs_from_env(CROWBOX_COMMAND_TIMEOUT_SECS, defaults.command_timeout),
            build_timeout: secs_from_env(CROWBOX_BUILD_TIMEOUT_SECS, defaults.build_timeout),
            script_timeout: secs_from_env(CROWBOX_SCRIPT_TIMEOUT_SECS, defaults.script_timeout),
            sweep_at,
        }
    }

    pub fn with_base_root(mut self, base_root: impl Into<PathBuf>) -> Self {
        self.base_root = base_root.into();
        self
    }
}

fn secs_from_env(var_name: &str, default: Duration) -> Duration {
    let secs = parse_env_or_default_with_validation(var_name, default.as_secs(), |v| v > 0);
    Duration::from_secs(secs)
}

/// Accepts `HH:MM` or `HH:MM:SS`
pub fn parse_wall_clock(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}
