//! The query state machine.
//!
//! [`WeatherQueryController`] is the only writer of [`QueryState`]. Each call
//! to [`WeatherQueryController::query`] mints a new [`RequestToken`], cancels
//! whatever request the previous token started, and applies its own result
//! only while its token is still the active one. The last query issued always
//! decides the final state, whatever order the network answers in.
//!
//! A query is issued when [`WeatherQueryController::start`] returns, not when
//! its network half is awaited. `query` is `start` followed by `finish`.

use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheStore, normalize},
    error::QueryError,
    model::WeatherSnapshot,
    provider::{
        WeatherProvider,
        openweather::{ICON_BASE_URL, into_snapshot},
    },
};

/// Identity of one query attempt. Later queries get larger tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which of loader / error banner / card a renderer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    Idle,
    Loading,
    Success,
    Error,
}

/// Everything a renderer needs, published after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    pub current_city: String,
    pub loading: bool,
    pub error: Option<String>,
    pub weather: Option<WeatherSnapshot>,
    pub active_token: Option<RequestToken>,
}

impl QueryState {
    pub fn phase(&self) -> QueryPhase {
        if self.loading {
            QueryPhase::Loading
        } else if self.error.is_some() {
            QueryPhase::Error
        } else if self.weather.is_some() {
            QueryPhase::Success
        } else {
            QueryPhase::Idle
        }
    }
}

/// How a single `query` call ended, from the caller's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Blank input; nothing happened.
    Ignored,
    Cached(WeatherSnapshot),
    Fetched(WeatherSnapshot),
    Failed(QueryError),
    /// A newer query (or teardown) took over; this result was dropped.
    Superseded,
}

/// A query that has taken the active token and still needs its network call.
#[derive(Debug)]
pub struct InFlight {
    token: RequestToken,
    city: String,
    city_key: String,
    cancel: CancellationToken,
}

impl InFlight {
    pub fn token(&self) -> RequestToken {
        self.token
    }
}

/// Result of [`WeatherQueryController::start`].
#[derive(Debug)]
pub enum Started {
    /// Finished without a request: blank input or a cache hit.
    Settled(QueryOutcome),
    InFlight(InFlight),
}

#[derive(Debug)]
struct Inner {
    state: QueryState,
    last_token: u64,
    in_flight: Option<CancellationToken>,
    cache: CacheStore,
}

impl Inner {
    fn begin(&mut self, city: &str) -> RequestToken {
        if let Some(previous) = self.in_flight.take() {
            debug!(previous = ?self.state.active_token, "cancelling in-flight request");
            previous.cancel();
        }

        self.last_token += 1;
        let token = RequestToken(self.last_token);

        self.state.current_city = city.to_string();
        self.state.error = None;
        self.state.loading = true;
        self.state.active_token = Some(token);
        token
    }

    fn is_active(&self, token: RequestToken) -> bool {
        self.state.active_token == Some(token)
    }

    /// Apply a terminal result for the active token.
    fn settle(&mut self, result: Result<WeatherSnapshot, QueryError>) {
        self.in_flight = None;
        self.state.active_token = None;
        self.state.loading = false;

        match result {
            Ok(snapshot) => {
                self.state.weather = Some(snapshot);
                self.state.error = None;
            }
            Err(err) => {
                self.state.weather = None;
                self.state.error = Some(err.to_string());
            }
        }
    }
}

#[derive(Debug)]
pub struct WeatherQueryController {
    provider: Arc<dyn WeatherProvider>,
    inner: Mutex<Inner>,
    tx: watch::Sender<QueryState>,
}

impl WeatherQueryController {
    pub fn new(provider: Arc<dyn WeatherProvider>, cache: CacheStore, default_city: &str) -> Self {
        let state = QueryState { current_city: default_city.trim().to_string(), ..QueryState::default() };
        let (tx, _rx) = watch::channel(state.clone());

        Self {
            provider,
            inner: Mutex::new(Inner { state, last_token: 0, in_flight: None, cache }),
            tx,
        }
    }

    /// Receiver that sees every published [`QueryState`].
    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> QueryState {
        self.inner.lock().state.clone()
    }

    pub fn current_city(&self) -> String {
        self.inner.lock().state.current_city.clone()
    }

    /// Look up weather for `city_input`, superseding any earlier query.
    pub async fn query(&self, city_input: &str) -> QueryOutcome {
        match self.start(city_input) {
            Started::Settled(outcome) => outcome,
            Started::InFlight(flight) => self.finish(flight).await,
        }
    }

    /// Begin a query without waiting on the network.
    ///
    /// Mints the token, cancels the previous request and consults the cache,
    /// all before returning. Callers that dispatch several cities call this in
    /// order, so the last city started is the one that wins.
    pub fn start(&self, city_input: &str) -> Started {
        let city = city_input.trim();
        if city.is_empty() {
            debug!("ignoring blank city input");
            return Started::Settled(QueryOutcome::Ignored);
        }
        let city_key = normalize(city);

        let mut inner = self.inner.lock();
        let token = inner.begin(city);
        self.publish(&inner);

        if let Some(snapshot) = inner.cache.get(&city_key) {
            debug!(%token, %city_key, "serving from cache");
            inner.settle(Ok(snapshot.clone()));
            self.publish(&inner);
            return Started::Settled(QueryOutcome::Cached(snapshot));
        }

        let cancel = CancellationToken::new();
        inner.in_flight = Some(cancel.clone());

        Started::InFlight(InFlight { token, city: city.to_string(), city_key, cancel })
    }

    /// Run the network half of a started query and apply its result.
    pub async fn finish(&self, flight: InFlight) -> QueryOutcome {
        let InFlight { token, city, city_key, cancel } = flight;
        info!(%token, %city, route = %self.provider.route(), "fetching current weather");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(%token, "request aborted");
                return QueryOutcome::Superseded;
            }
            reply = self.provider.fetch_current(&city) => reply
                .map_err(QueryError::from)
                .and_then(|reply| into_snapshot(reply, ICON_BASE_URL)),
        };

        self.complete(token, &city_key, result)
    }

    fn complete(
        &self,
        token: RequestToken,
        city_key: &str,
        result: Result<WeatherSnapshot, QueryError>,
    ) -> QueryOutcome {
        let mut inner = self.inner.lock();
        if !inner.is_active(token) {
            debug!(%token, "discarding superseded result");
            return QueryOutcome::Superseded;
        }

        let outcome = match &result {
            Ok(snapshot) => {
                inner.cache.put(city_key, snapshot.clone());
                QueryOutcome::Fetched(snapshot.clone())
            }
            Err(err) => {
                match err {
                    QueryError::Transport { detail } => {
                        warn!(%token, %city_key, %detail, "weather request failed")
                    }
                    other => warn!(%token, %city_key, error = %other, "weather lookup rejected"),
                }
                QueryOutcome::Failed(err.clone())
            }
        };

        inner.settle(result);
        self.publish(&inner);
        outcome
    }

    /// Cancel the in-flight request and invalidate its token. Results that
    /// arrive afterwards are dropped.
    pub fn teardown(&self) {
        let mut inner = self.inner.lock();
        if let Some(cancel) = inner.in_flight.take() {
            cancel.cancel();
        }
        if inner.state.active_token.take().is_some() {
            inner.state.loading = false;
            self.publish(&inner);
        }
    }

    fn publish(&self, inner: &Inner) {
        self.tx.send_replace(inner.state.clone());
    }
}

impl Drop for WeatherQueryController {
    fn drop(&mut self) {
        if let Some(cancel) = self.inner.get_mut().in_flight.take() {
            cancel.cancel();
        }
    }
}
