//! Keystroke debouncing in front of the query controller.
//!
//! Typed text is held until the input has been quiet for the configured
//! period; only then is it emitted as a city to query. A submit fires right
//! away and drops any pending text.

use std::{ops::RangeInclusive, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
    time::{Instant, sleep_until},
};
use tracing::debug;

use crate::controller::{Started, WeatherQueryController};

/// Quiet period used when none is configured.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(750);

/// Quiet periods a user may configure, in milliseconds.
pub const QUIET_PERIOD_RANGE_MS: RangeInclusive<u64> = 700..=800;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// The text box now contains this text.
    Changed(String),
    /// Explicit search with this text.
    Submitted(String),
}

/// Handle for feeding input into a running debounce task.
///
/// Dropping every handle ends the task. Text still waiting for its quiet
/// period is emitted first, since no more typing can follow.
#[derive(Debug, Clone)]
pub struct Debouncer {
    tx: mpsc::UnboundedSender<InputEvent>,
}

impl Debouncer {
    /// Start the debounce task. Cities to query arrive on the returned receiver.
    pub fn spawn(quiet: Duration) -> (Self, mpsc::UnboundedReceiver<String>, JoinHandle<()>) {
        let (tx, events) = mpsc::unbounded_channel();
        let (out, cities) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(quiet, events, out));

        (Self { tx }, cities, task)
    }

    pub fn changed(&self, text: impl Into<String>) {
        let _ = self.tx.send(InputEvent::Changed(text.into()));
    }

    pub fn submit(&self, text: impl Into<String>) {
        let _ = self.tx.send(InputEvent::Submitted(text.into()));
    }
}

async fn run(
    quiet: Duration,
    mut events: mpsc::UnboundedReceiver<InputEvent>,
    out: mpsc::UnboundedSender<String>,
) {
    let mut pending: Option<(String, Instant)> = None;

    loop {
        let deadline = pending.as_ref().map(|(_, deadline)| *deadline);
        let event = match deadline {
            Some(deadline) => {
                tokio::select! {
                    event = events.recv() => event,
                    _ = sleep_until(deadline) => {
                        if let Some((text, _)) = pending.take() {
                            emit(&out, text);
                        }
                        continue;
                    }
                }
            }
            None => events.recv().await,
        };

        match event {
            Some(InputEvent::Changed(text)) => {
                pending = Some((text, Instant::now() + quiet));
            }
            Some(InputEvent::Submitted(text)) => {
                if pending.take().is_some() {
                    debug!("submit cancelled pending debounce");
                }
                emit(&out, text);
            }
            None => {
                if let Some((text, _)) = pending.take() {
                    emit(&out, text);
                }
                break;
            }
        }
    }
}

fn emit(out: &mpsc::UnboundedSender<String>, text: String) {
    let city = text.trim();
    if city.is_empty() {
        return;
    }
    debug!(%city, "debounced input ready");
    let _ = out.send(city.to_string());
}

/// Run one controller query per emitted city.
///
/// Each query is started in the order its city arrives; only the network
/// half is spawned, so a newer city can supersede one still in flight. The
/// returned task finishes once `cities` closes and every spawned query has
/// settled. Aborting it aborts those queries too.
pub fn drive(
    controller: Arc<WeatherQueryController>,
    mut cities: mpsc::UnboundedReceiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut queries = JoinSet::new();

        loop {
            tokio::select! {
                city = cities.recv() => match city {
                    Some(city) => match controller.start(&city) {
                        Started::Settled(outcome) => debug!(%city, ?outcome, "query settled without a request"),
                        Started::InFlight(flight) => {
                            let controller = controller.clone();
                            queries.spawn(async move { controller.finish(flight).await });
                        }
                    },
                    None => break,
                },
                Some(_) = queries.join_next(), if !queries.is_empty() => {}
            }
        }

        while queries.join_next().await.is_some() {}
    })
}
