use thiserror::Error;

/// Fallback shown when the provider rejects a city without a message.
pub const CITY_NOT_FOUND: &str = "City not found!";
/// Message shown for any network or decoding failure.
pub const FETCH_FAILED: &str = "Error fetching weather";

/// Why a single query attempt did not produce weather.
///
/// Every variant is terminal for the attempt that raised it. `Display` is the
/// text put into [`crate::QueryState::error`]. Blank input and superseded
/// queries are not errors; see [`crate::QueryOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Provider(String),

    /// `detail` is for logs only; users see the generic message.
    #[error("Error fetching weather")]
    Transport { detail: String },
}

/// Failures raised by a [`crate::WeatherProvider`] before a payload is available.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(
        "No OpenWeather API key configured.\n\
         Hint: set WEATHER_API_KEY or run `weather configure`."
    )]
    MissingApiKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<FetchError> for QueryError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::MissingApiKey => QueryError::Config(err.to_string()),
            other => QueryError::Transport { detail: other.to_string() },
        }
    }
}
