//! Application-level configuration loading: default room settings and runtime limits.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::room::{RoomSettings, SettingsPatch};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DOODLE_PARTY_CONFIG_PATH";

const DEFAULT_ROOM_MAX_AGE: Duration = Duration::from_secs(6 * 60 * 60);
const DEFAULT_PRESENCE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_TRANSACTION_ATTEMPTS: u32 = 8;
const DEFAULT_BROADCAST_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Settings applied to every new room.
    pub default_settings: RoomSettings,
    /// Rooms older than this are deleted on access or by the creation sweep.
    pub room_max_age: Duration,
    /// Players without a heartbeat for this long are reported offline.
    pub presence_timeout: Duration,
    /// Upper bound on read-modify-CAS attempts for one mutation.
    pub max_transaction_attempts: u32,
    /// Buffered events per room channel before slow subscribers lag.
    pub broadcast_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        total_rounds = app_config.default_settings.total_rounds,
                        max_attempts = app_config.max_transaction_attempts,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_settings: RoomSettings::default(),
            room_max_age: DEFAULT_ROOM_MAX_AGE,
            presence_timeout: DEFAULT_PRESENCE_TIMEOUT,
            max_transaction_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    default_settings: Option<RawSettings>,
    room_max_age_secs: Option<u64>,
    presence_timeout_secs: Option<u64>,
    max_transaction_attempts: Option<u32>,
    broadcast_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSettings {
    timer_seconds: Option<u32>,
    total_rounds: Option<u32>,
    sabotage_enabled: Option<bool>,
    double_points_final_round: Option<bool>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let default_settings = match value.default_settings {
            Some(raw) => defaults.default_settings.merged(&SettingsPatch {
                timer_seconds: raw.timer_seconds,
                total_rounds: raw.total_rounds.filter(|rounds| *rounds > 0),
                sabotage_enabled: raw.sabotage_enabled,
                double_points_final_round: raw.double_points_final_round,
            }),
            None => defaults.default_settings,
        };

        Self {
            default_settings,
            room_max_age: value
                .room_max_age_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.room_max_age),
            presence_timeout: value
                .presence_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.presence_timeout),
            max_transaction_attempts: value
                .max_transaction_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.max_transaction_attempts),
            broadcast_capacity: value
                .broadcast_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.broadcast_capacity),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "defaultSettings": { "totalRounds": 5 }, "maxTransactionAttempts": 0 }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.default_settings.total_rounds, 5);
        assert_eq!(config.default_settings.timer_seconds, 90);
        assert_eq!(config.max_transaction_attempts, DEFAULT_MAX_TRANSACTION_ATTEMPTS);
        assert_eq!(config.room_max_age, DEFAULT_ROOM_MAX_AGE);
    }
}
