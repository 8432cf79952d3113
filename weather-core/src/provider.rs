use crate::{
    Config, FetchError,
    provider::{
        openweather::{OpenWeatherProvider, OwPayload},
        proxy::ProxyProvider,
    },
};
use async_trait::async_trait;
use std::{fmt, str::FromStr};
use tracing::warn;

pub mod openweather;
pub mod proxy;

/// How a request reaches OpenWeather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Route {
    /// Straight to the provider, with the API key held client-side.
    #[default]
    Direct,
    /// Through the pass-through proxy, which holds the key.
    Proxy,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Direct => "direct",
            Route::Proxy => "proxy",
        }
    }

    pub const fn all() -> &'static [Route] {
        &[Route::Direct, Route::Proxy]
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive; surrounding whitespace is ignored.
impl FromStr for Route {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        let wanted = value.trim();
        Route::all()
            .iter()
            .copied()
            .find(|route| route.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = Route::all().iter().map(Route::as_str).collect();
                anyhow::anyhow!("Unknown route '{wanted}'; expected one of: {}", known.join(", "))
            })
    }
}

/// Raw provider answer: HTTP status plus the decoded OpenWeather body.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub http_status: u16,
    pub payload: OwPayload,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + fmt::Debug {
    fn route(&self) -> Route;

    async fn fetch_current(&self, city: &str) -> Result<ProviderReply, FetchError>;
}

/// Read a response body and decode it as an OpenWeather payload.
pub(crate) async fn read_reply(res: reqwest::Response) -> Result<ProviderReply, FetchError> {
    let http_status = res.status().as_u16();
    let body = res.text().await?;

    let payload = serde_json::from_str(&body).inspect_err(|err| {
        warn!(http_status, error = %err, body = %truncate_body(&body), "undecodable provider body");
    })?;

    Ok(ProviderReply { http_status, payload })
}

/// Construct a provider from config and an explicit route.
pub fn provider_from_config(
    route: Route,
    config: &Config,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let boxed: Box<dyn WeatherProvider> = match route {
        // A missing key is reported per query, not here.
        Route::Direct => {
            let mut provider = OpenWeatherProvider::new(config.api_key());
            if let Some(base) = config.api_base_url.as_deref() {
                provider = provider.with_base_url(base);
            }
            Box::new(provider)
        }
        Route::Proxy => {
            let url = config.proxy_url.as_deref().ok_or_else(|| {
                anyhow::anyhow!(
                    "No proxy URL configured.\n\
                     Hint: run `weather configure` and choose the proxy route."
                )
            })?;
            Box::new(ProxyProvider::new(url))
        }
    };

    Ok(boxed)
}

/// Construct the provider for the configured route (direct when unset).
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let route = config.route()?;
    provider_from_config(route, config)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn route_as_str_roundtrip() {
        for route in Route::all() {
            let parsed = route.as_str().parse::<Route>().expect("every route name parses");
            assert_eq!(*route, parsed);
        }
        assert_eq!(" PROXY ".parse::<Route>().unwrap(), Route::Proxy);
    }

    #[test]
    fn unknown_route_error() {
        let err = "carrier-pigeon".parse::<Route>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown route 'carrier-pigeon'; expected one of: direct, proxy");
    }

    #[test]
    fn direct_provider_builds_without_key() {
        let cfg = Config::default();
        let provider = provider_from_config(Route::Direct, &cfg).expect("direct always builds");
        assert_eq!(provider.route(), Route::Direct);
    }

    #[test]
    fn proxy_provider_requires_url() {
        let cfg = Config::default();
        let err = provider_from_config(Route::Proxy, &cfg).unwrap_err();
        assert!(err.to_string().contains("No proxy URL configured"));
    }

    #[test]
    fn default_provider_follows_configured_route() {
        let cfg = Config {
            route: Some("proxy".into()),
            proxy_url: Some("http://localhost:8888/weather".into()),
            ..Config::default()
        };

        let provider = default_provider_from_config(&cfg).expect("proxy configured");
        assert_eq!(provider.route(), Route::Proxy);
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let short = truncate_body(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
