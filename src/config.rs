//! Application-level configuration loading: round timings, enabled modes and abuse limits.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    dao::models::GameMode,
    rate_limit::CategoryLimits,
    state::{phase::DEFAULT_PREPARATION_WINDOW, presence::DEFAULT_PRESENCE_THROTTLE},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "VOTE_ROUNDS_CONFIG_PATH";
/// Environment variable overriding the admin token from the file.
const ADMIN_TOKEN_ENV: &str = "ADMIN_TOKEN";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Window after a round's end during which the winner is displayed.
    pub preparation_window: Duration,
    /// Period of the background lifecycle scheduler.
    pub tick_interval: Duration,
    /// Modes the scheduler keeps alive.
    pub game_modes: Vec<GameMode>,
    /// Posts one IP may submit in a round.
    pub posts_per_round: u32,
    /// Votes one IP may cast in a round.
    pub votes_per_round: u32,
    /// Fixed window used by the per-category request limits.
    pub rate_window: Duration,
    /// Requests allowed per window for each category.
    pub limits: CategoryLimits,
    /// Period of the idle quota sweep.
    pub quota_sweep_interval: Duration,
    /// Idle time after which an IP's quota entry is evicted.
    pub quota_max_age: Duration,
    /// Minimum delay between two presence broadcasts.
    pub presence_throttle: Duration,
    /// Shared secret for the administrative endpoints. `None` leaves them open.
    pub admin_token: Option<String>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        modes = app_config.game_modes.len(),
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
        };

        config.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(token) = env::var(ADMIN_TOKEN_ENV).ok().filter(|t| !t.is_empty()) {
            self.admin_token = Some(token);
        }
        if self.admin_token.is_none() {
            warn!("no admin token configured; administrative routes are unprotected");
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    preparation_window_secs: u64,
    tick_interval_ms: u64,
    game_modes: Vec<GameMode>,
    posts_per_round: u32,
    votes_per_round: u32,
    rate_window_secs: u64,
    limits: RawLimits,
    quota_sweep_interval_secs: u64,
    quota_max_age_secs: u64,
    presence_throttle_ms: u64,
    admin_token: Option<String>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            preparation_window_secs: DEFAULT_PREPARATION_WINDOW.as_secs(),
            tick_interval_ms: 1_000,
            game_modes: GameMode::ALL.to_vec(),
            posts_per_round: 1,
            votes_per_round: 10,
            rate_window_secs: 60,
            limits: RawLimits::default(),
            quota_sweep_interval_secs: 5 * 60,
            quota_max_age_secs: 60 * 60,
            presence_throttle_ms: DEFAULT_PRESENCE_THROTTLE.as_millis() as u64,
            admin_token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// Requests allowed per window for each category.
struct RawLimits {
    post: u32,
    vote: u32,
    auth: u32,
    general: u32,
}

impl Default for RawLimits {
    fn default() -> Self {
        let limits = CategoryLimits::default();
        Self {
            post: limits.post,
            vote: limits.vote,
            auth: limits.auth,
            general: limits.general,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let mut game_modes = value.game_modes;
        game_modes.sort();
        game_modes.dedup();

        Self {
            preparation_window: Duration::from_secs(value.preparation_window_secs),
            tick_interval: Duration::from_millis(value.tick_interval_ms.max(100)),
            game_modes,
            posts_per_round: value.posts_per_round.max(1),
            votes_per_round: value.votes_per_round,
            rate_window: Duration::from_secs(value.rate_window_secs.max(1)),
            limits: CategoryLimits {
                post: value.limits.post,
                vote: value.limits.vote,
                auth: value.limits.auth,
                general: value.limits.general,
            },
            quota_sweep_interval: Duration::from_secs(value.quota_sweep_interval_secs.max(1)),
            quota_max_age: Duration::from_secs(value.quota_max_age_secs),
            presence_throttle: Duration::from_millis(value.presence_throttle_ms),
            admin_token: value.admin_token.filter(|token| !token.is_empty()),
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
