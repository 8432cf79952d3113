use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    cache::DEFAULT_TTL,
    debounce::{DEFAULT_QUIET_PERIOD, QUIET_PERIOD_RANGE_MS},
    provider::Route,
};

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "WEATHER_API_KEY";

/// City queried when nothing else was asked for.
pub const FALLBACK_CITY: &str = "London";

/// Display theme for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// route = "direct"
/// api_key = "..."
/// default_city = "London"
/// debounce_ms = 750
/// theme = "dark"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// "direct" or "proxy"; direct when absent.
    pub route: Option<String>,

    /// OpenWeather key for the direct route. `WEATHER_API_KEY` wins over it.
    pub api_key: Option<String>,

    /// Override for the OpenWeather host, mostly for testing.
    pub api_base_url: Option<String>,

    /// Full proxy endpoint, e.g. `http://localhost:8888/weather`.
    pub proxy_url: Option<String>,

    pub default_city: Option<String>,

    /// Quiet period before a typed city is queried, held to 700..=800 ms.
    pub debounce_ms: Option<u64>,

    pub cache_ttl_ms: Option<u64>,

    #[serde(default)]
    pub theme: Theme,
}

impl Config {
    /// Return the route as a strongly-typed [`Route`].
    pub fn route(&self) -> Result<Route> {
        match self.route.as_deref() {
            Some(s) => s.parse(),
            None => Ok(Route::default()),
        }
    }

    pub fn set_route(&mut self, route: Route) {
        self.route = Some(route.as_str().to_string());
    }

    /// API key from the environment, falling back to the config file.
    pub fn api_key(&self) -> Option<String> {
        self.resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }

    fn resolve_api_key(&self, from_env: Option<String>) -> Option<String> {
        from_env
            .or_else(|| self.api_key.clone())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    pub fn default_city(&self) -> &str {
        self.default_city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(FALLBACK_CITY)
    }

    /// Configured quiet period, clamped into [`QUIET_PERIOD_RANGE_MS`].
    pub fn debounce(&self) -> Duration {
        match self.debounce_ms {
            Some(ms) => Duration::from_millis(ms.clamp(*QUIET_PERIOD_RANGE_MS.start(), *QUIET_PERIOD_RANGE_MS.end())),
            None => DEFAULT_QUIET_PERIOD,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl_ms.map(Duration::from_millis).unwrap_or(DEFAULT_TTL)
    }

    /// Settings from the platform config directory; defaults before the first save.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("Could not read weather settings at {}", path.display()));
            }
        };

        toml::from_str(&contents)
            .with_context(|| format!("Weather settings at {} are not valid TOML", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Could not create settings directory {}", dir.display()))?;
        }

        let toml = toml::to_string_pretty(self).context("Could not encode weather settings")?;
        fs::write(path, toml).with_context(|| format!("Could not write weather settings to {}", path.display()))
    }

    /// `config.toml` under the platform config directory for `weather-cli`.
    pub fn config_file_path() -> Result<PathBuf> {
        ProjectDirs::from("dev", "weather-lookup", "weather-cli")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or_else(|| anyhow!("No home directory to keep weather settings in"))
    }
}
