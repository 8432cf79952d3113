use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::{
    error::{CITY_NOT_FOUND, FetchError, QueryError},
    model::WeatherSnapshot,
    provider::{ProviderReply, Route, read_reply},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
pub const ICON_BASE_URL: &str = "https://openweathermap.org";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: Option<String>,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn route(&self) -> Route {
        Route::Direct
    }

    async fn fetch_current(&self, city: &str) -> Result<ProviderReply, FetchError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(FetchError::MissingApiKey)?;

        let url = format!("{}/data/2.5/weather", self.base_url.trim_end_matches('/'));
        info!(%city, "requesting current weather from OpenWeather");

        let res = self
            .http
            .get(url)
            .query(&[("q", city), ("units", "metric"), ("appid", api_key)])
            .send()
            .await?;

        read_reply(res).await
    }
}

/// `cod` arrives as a number on success and as a string on most errors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OwCode {
    Number(i64),
    Text(String),
}

impl OwCode {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OwCode::Number(n) => Some(*n),
            OwCode::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwMain {
    pub temp: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwWind {
    pub speed: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwWeather {
    pub description: String,
    pub icon: String,
}

/// Current-weather body. Every field is optional because error bodies only
/// carry `cod` and `message`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwPayload {
    #[serde(default)]
    pub cod: Option<OwCode>,
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub main: Option<OwMain>,
    #[serde(default)]
    pub wind: Option<OwWind>,
    #[serde(default)]
    pub weather: Vec<OwWeather>,
}

impl OwPayload {
    pub fn code(&self) -> Option<i64> {
        self.cod.as_ref().and_then(OwCode::as_i64)
    }

    /// Provider-supplied error text, when it is a non-empty string.
    pub fn message(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .filter(|m| !m.trim().is_empty())
    }
}

pub fn icon_url(icon_base: &str, icon_code: &str) -> String {
    format!("{}/img/wn/{icon_code}@2x.png", icon_base.trim_end_matches('/'))
}

/// Validate a reply and map it to the display model.
///
/// Success needs both HTTP 200 and an embedded `cod` of 200.
pub fn into_snapshot(reply: ProviderReply, icon_base: &str) -> Result<WeatherSnapshot, QueryError> {
    let ProviderReply { http_status, payload } = reply;
    let code = payload.code();

    if http_status != 200 || code != Some(200) {
        let message = payload.message().unwrap_or(CITY_NOT_FOUND).to_string();
        return Err(if code == Some(404) || http_status == 404 {
            QueryError::NotFound(message)
        } else {
            QueryError::Provider(message)
        });
    }

    let missing = |field: &str| QueryError::Transport {
        detail: format!("success payload is missing `{field}`"),
    };

    let city = payload.name.ok_or_else(|| missing("name"))?;
    let main = payload.main.ok_or_else(|| missing("main"))?;
    let wind = payload.wind.ok_or_else(|| missing("wind"))?;
    let condition = payload.weather.into_iter().next().ok_or_else(|| missing("weather[0]"))?;

    Ok(WeatherSnapshot {
        city,
        temp_celsius: round_half_up(main.temp),
        humidity_percent: round_half_up(main.humidity),
        wind_speed: wind.speed,
        description: condition.description,
        icon_ref: icon_url(icon_base, &condition.icon),
    })
}

/// Nearest integer, halves towards positive infinity (`-2.5` becomes `-2`).
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(http_status: u16, body: serde_json::Value) -> ProviderReply {
        ProviderReply { http_status, payload: serde_json::from_value(body).unwrap() }
    }

    fn london_body() -> serde_json::Value {
        json!({
            "cod": 200,
            "name": "London",
            "main": { "temp": 15.6, "humidity": 70 },
            "wind": { "speed": 3.2 },
            "weather": [{ "description": "clear sky", "icon": "01d" }]
        })
    }

    #[test]
    fn maps_success_payload() {
        let snapshot = into_snapshot(reply(200, london_body()), ICON_BASE_URL).unwrap();

        assert_eq!(
            snapshot,
            WeatherSnapshot {
                city: "London".into(),
                temp_celsius: 16,
                humidity_percent: 70,
                wind_speed: 3.2,
                description: "clear sky".into(),
                icon_ref: "https://openweathermap.org/img/wn/01d@2x.png".into(),
            }
        );
    }

    #[test]
    fn rounds_half_degrees_up() {
        for (temp, expected) in [(-2.5, -2), (-2.6, -3), (-0.4, 0), (15.5, 16), (15.4, 15)] {
            let mut body = london_body();
            body["main"]["temp"] = json!(temp);
            let snapshot = into_snapshot(reply(200, body), ICON_BASE_URL).unwrap();
            assert_eq!(snapshot.temp_celsius, expected, "temp {temp}");
        }
    }

    #[test]
    fn rounds_half_percent_humidity_up() {
        let mut body = london_body();
        body["main"]["humidity"] = json!(64.5);
        let snapshot = into_snapshot(reply(200, body), ICON_BASE_URL).unwrap();
        assert_eq!(snapshot.humidity_percent, 65);
    }

    #[test]
    fn string_cod_404_is_not_found_even_with_http_200() {
        let err = into_snapshot(
            reply(200, json!({ "cod": "404", "message": "city not found" })),
            ICON_BASE_URL,
        )
        .unwrap_err();
        assert_eq!(err, QueryError::NotFound("city not found".into()));
    }

    #[test]
    fn http_failure_without_message_falls_back() {
        let err = into_snapshot(reply(401, json!({ "cod": 401 })), ICON_BASE_URL).unwrap_err();
        assert_eq!(err, QueryError::Provider(CITY_NOT_FOUND.into()));
    }

    #[test]
    fn non_200_http_with_ok_cod_is_rejected() {
        let err = into_snapshot(reply(500, london_body()), ICON_BASE_URL).unwrap_err();
        assert!(matches!(err, QueryError::Provider(_)));
    }

    #[test]
    fn missing_fields_on_success_are_transport_errors() {
        let err = into_snapshot(reply(200, json!({ "cod": 200, "name": "X" })), ICON_BASE_URL)
            .unwrap_err();
        assert!(matches!(err, QueryError::Transport { .. }));
    }

    #[test]
    fn cod_accepts_numeric_strings() {
        assert_eq!(OwCode::Text(" 200 ".into()).as_i64(), Some(200));
        assert_eq!(OwCode::Text("nope".into()).as_i64(), None);
    }

    #[tokio::test]
    async fn missing_api_key_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::new(None).with_base_url(server.uri());
        let err = provider.fetch_current("London").await.unwrap_err();
        assert!(matches!(err, FetchError::MissingApiKey));
    }

    #[tokio::test]
    async fn sends_metric_query_with_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "London"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_body()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::new(Some("KEY".into())).with_base_url(server.uri());
        let reply = provider.fetch_current("London").await.unwrap();

        assert_eq!(reply.http_status, 200);
        assert_eq!(reply.payload.code(), Some(200));
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::new(Some("KEY".into())).with_base_url(server.uri());
        let err = provider.fetch_current("London").await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
