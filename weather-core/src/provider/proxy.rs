use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use crate::{
    error::FetchError,
    provider::{ProviderReply, Route, read_reply},
};

use super::WeatherProvider;

/// Calls the same-origin proxy, which holds the API key and relays the
/// provider body unchanged.
#[derive(Debug, Clone)]
pub struct ProxyProvider {
    url: String,
    http: Client,
}

impl ProxyProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), http: Client::new() }
    }
}

#[async_trait]
impl WeatherProvider for ProxyProvider {
    fn route(&self) -> Route {
        Route::Proxy
    }

    async fn fetch_current(&self, city: &str) -> Result<ProviderReply, FetchError> {
        info!(%city, url = %self.url, "requesting current weather through proxy");

        let res = self.http.get(&self.url).query(&[("city", city)]).send().await?;

        read_reply(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::openweather::{ICON_BASE_URL, into_snapshot};
    use crate::error::QueryError;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn passes_city_parameter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("city", "São Paulo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cod": 200 })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = ProxyProvider::new(format!("{}/weather", server.uri()));
        let reply = provider.fetch_current("São Paulo").await.unwrap();
        assert_eq!(reply.payload.code(), Some(200));
    }

    #[tokio::test]
    async fn upstream_failure_behind_http_200_is_detected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "cod": "404", "message": "city not found" })),
            )
            .mount(&server)
            .await;

        let provider = ProxyProvider::new(format!("{}/weather", server.uri()));
        let reply = provider.fetch_current("Atlantis").await.unwrap();
        assert_eq!(reply.http_status, 200);

        let err = into_snapshot(reply, ICON_BASE_URL).unwrap_err();
        assert_eq!(err, QueryError::NotFound("city not found".into()));
    }
}
