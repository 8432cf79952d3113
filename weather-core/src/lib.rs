//! Core library for the weather lookup app.
//!
//! This crate defines:
//! - The session-scoped snapshot cache with its TTL policy
//! - Provider adapters for OpenWeather, direct or through the proxy
//! - The query controller: the request/cache/error state machine
//! - Keystroke debouncing in front of the controller
//! - Configuration & credentials handling
//!
//! It is used by `weather-cli`, but any renderer can subscribe to a
//! [`WeatherQueryController`] and draw its [`QueryState`].

pub mod cache;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod model;
pub mod provider;

pub use cache::{CacheStore, Clock, ManualClock, SystemClock, normalize};
pub use config::{Config, Theme};
pub use controller::{InFlight, QueryOutcome, QueryPhase, QueryState, RequestToken, Started, WeatherQueryController};
pub use debounce::{Debouncer, InputEvent};
pub use error::{FetchError, QueryError};
pub use model::{CacheEntry, WeatherSnapshot};
pub use provider::{ProviderReply, Route, WeatherProvider};
