//! Same-origin pass-through proxy for OpenWeather current conditions.
//!
//! `GET /weather?city=<name>` forwards to the provider with the server-side
//! key and relays the provider body untouched, always with HTTP 200. Clients
//! must therefore read the embedded `cod` to tell success from failure.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use warp::{
    Filter, Rejection, Reply,
    http::{
        StatusCode,
        header::{CONTENT_TYPE, HeaderValue},
    },
    reply::Response,
};

pub const DEFAULT_CITY: &str = "London";
pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";

/// Where and how to reach OpenWeather.
#[derive(Debug, Clone)]
pub struct Upstream {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl Upstream {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: OPENWEATHER_BASE_URL.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct CityQuery {
    city: Option<String>,
}

pub fn routes(upstream: Upstream) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let upstream = Arc::new(upstream);

    let health = warp::path("health").and(warp::path::end()).and(warp::get()).map(|| "OK");

    let weather = warp::path("weather")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<CityQuery>())
        .and(warp::any().map(move || upstream.clone()))
        .and_then(relay);

    health.or(weather).with(warp::trace::request())
}

async fn relay(query: CityQuery, upstream: Arc<Upstream>) -> Result<Response, Rejection> {
    let city = query
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CITY)
        .to_string();

    let Some(api_key) = upstream.api_key.as_deref() else {
        warn!("WEATHER_API_KEY is not set");
        let body = json!({ "cod": "500", "message": "Weather API key is not configured" });
        return Ok(json_response(body.to_string(), StatusCode::OK));
    };

    let url = format!("{}/data/2.5/weather", upstream.base_url.trim_end_matches('/'));
    let sent = upstream
        .http
        .get(url)
        .query(&[("q", city.as_str()), ("appid", api_key), ("units", "metric")])
        .send()
        .await;

    let body = match sent {
        Ok(res) => {
            info!(%city, upstream_status = %res.status(), "relaying provider response");
            res.text().await
        }
        Err(err) => Err(err),
    };

    match body {
        Ok(body) => Ok(json_response(body, StatusCode::OK)),
        Err(err) => {
            warn!(%city, error = %err, "upstream request failed");
            let body = json!({ "cod": "502", "message": "Error fetching weather" });
            Ok(json_response(body.to_string(), StatusCode::BAD_GATEWAY))
        }
    }
}

fn json_response(body: String, status: StatusCode) -> Response {
    let mut res = Response::new(body.into());
    *res.status_mut() = status;
    res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    res
}
