//! Configuration file – `~/.ardhal/config.toml`.
//!
//! ```toml
//! [worker]
//! settle_delay_ms = 500
//! reply_timeout_ms = 1000
//!
//! [wiring]
//! ir_pins = [0, 1]
//! bump_pins = [2, 3, 4]
//!
//! [input]
//! poll_interval_ms = 100
//! steps = 50
//! ```
//!
//! Every table and field is optional.  A missing file means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use ardhal_hal::Wiring;
use ardhal_runtime::InputLayout;
use ardhal_types::HalError;
use ardhal_worker::WorkerConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Sampling loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Pause between two snapshots.
    pub poll_interval_ms: u64,
    /// Stop after this many snapshots; unset runs until Ctrl-C.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u64>,
    pub layout: InputLayout,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            steps: None,
            layout: InputLayout::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub worker: WorkerConfig,
    pub wiring: Wiring,
    pub input: InputConfig,
}

/// `~/.ardhal/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".ardhal").join("config.toml")
}

/// Load the default config file, then apply `ARDHAL_*` overrides.
pub fn load() -> Result<Config, HalError> {
    load_from(&config_path())
}

/// Load `path` (defaults when it does not exist), then apply `ARDHAL_*`
/// overrides.
pub fn load_from(path: &Path) -> Result<Config, HalError> {
    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(path).map_err(|e| {
            HalError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|e| {
            HalError::Config(format!("failed to parse {}: {e}", path.display()))
        })?
    } else {
        Config::default()
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply overrides from the process environment.
///
/// | Variable | Field |
/// |---|---|
/// | `ARDHAL_SETTLE_DELAY_MS` | `worker.settle_delay_ms` |
/// | `ARDHAL_REPLY_TIMEOUT_MS` | `worker.reply_timeout_ms` |
/// | `ARDHAL_IDLE_WAIT_MS` | `worker.idle_wait_ms` |
/// | `ARDHAL_POLL_INTERVAL_MS` | `input.poll_interval_ms` |
/// | `ARDHAL_STEPS` | `input.steps` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let number = |key: &str| -> Option<u64> {
        let raw = lookup(key)?;
        match raw.trim().parse() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!(key, value = %raw, "ignoring non-numeric override");
                None
            }
        }
    };

    if let Some(n) = number("ARDHAL_SETTLE_DELAY_MS") {
        cfg.worker.settle_delay_ms = n;
    }
    if let Some(n) = number("ARDHAL_REPLY_TIMEOUT_MS") {
        cfg.worker.reply_timeout_ms = n;
    }
    if let Some(n) = number("ARDHAL_IDLE_WAIT_MS") {
        cfg.worker.idle_wait_ms = n;
    }
    if let Some(n) = number("ARDHAL_POLL_INTERVAL_MS") {
        cfg.input.poll_interval_ms = n;
    }
    if let Some(n) = number("ARDHAL_STEPS") {
        cfg.input.steps = Some(n);
    }
}

/// Write `cfg` to `path`, creating the parent directory.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), HalError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            HalError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| HalError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| HalError::Config(format!("failed to write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn path_points_to_ardhal_dir() {
        let p = config_path_for_home("/home/robot");
        assert_eq!(p, PathBuf::from("/home/robot/.ardhal/config.toml"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let mut cfg = load_from(&path).expect("defaults");
        // Neutralise whatever ARDHAL_* the test environment carries.
        cfg.input = InputConfig::default();
        cfg.worker = WorkerConfig::default();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.wiring, Wiring::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[worker]\nsettle_delay_ms = 250\n\n[wiring]\nservo_pins = [9]\n\n[input]\nsteps = 3\n",
        )
        .expect("write");

        let cfg: Config = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(cfg.worker.settle_delay_ms, 250);
        assert_eq!(cfg.worker.channel_capacity, WorkerConfig::default().channel_capacity);
        assert_eq!(cfg.wiring.servo_pins, vec![9]);
        assert_eq!(cfg.wiring.bump_pins, vec![2, 3, 4]);
        assert_eq!(cfg.input.steps, Some(3));
        assert_eq!(cfg.input.poll_interval_ms, 100);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[worker\nsettle_delay_ms = ").expect("write");
        assert!(matches!(load_from(&path), Err(HalError::Config(_))));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let mut cfg = Config::default();
        cfg.wiring.servo_pins = vec![5, 6];
        cfg.input.poll_interval_ms = 20;

        save_to(&cfg, &path).expect("save");
        let raw = fs::read_to_string(&path).expect("read");
        let loaded: Config = toml::from_str(&raw).expect("parse");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn overrides_replace_fields() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            lookup_from(&[
                ("ARDHAL_SETTLE_DELAY_MS", "0"),
                ("ARDHAL_REPLY_TIMEOUT_MS", "250"),
                ("ARDHAL_POLL_INTERVAL_MS", " 40 "),
                ("ARDHAL_STEPS", "10"),
            ]),
        );
        assert_eq!(cfg.worker.settle_delay_ms, 0);
        assert_eq!(cfg.worker.reply_timeout_ms, 250);
        assert_eq!(cfg.input.poll_interval_ms, 40);
        assert_eq!(cfg.input.steps, Some(10));
        assert_eq!(cfg.worker.idle_wait_ms, WorkerConfig::default().idle_wait_ms);
    }

    #[test]
    fn invalid_override_is_ignored() {
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, lookup_from(&[("ARDHAL_STEPS", "forever")]));
        assert_eq!(cfg.input.steps, None);
    }
}
