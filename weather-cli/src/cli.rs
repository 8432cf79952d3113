use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
};
use tracing::{debug, info};
use weather_core::{
    CacheStore, Config, Debouncer, QueryOutcome, SystemClock, Theme,
    WeatherQueryController,
    debounce::drive,
    provider::{default_provider_from_config, provider_from_config},
};

use crate::{configure, render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Current weather by city")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure route, credentials, default city and theme.
    Configure,

    /// Show current weather for a city.
    Show {
        /// City name; the configured default city when absent.
        city: Option<String>,

        /// Override the configured route: "direct" or "proxy".
        #[arg(long)]
        route: Option<String>,
    },

    /// Interactive search. Each line is a search; `:dark`, `:light`,
    /// `:theme` switch themes and `:quit` exits.
    Repl {
        /// Treat each line as the live text of the search box and search
        /// once typing pauses.
        #[arg(long)]
        live: bool,

        #[arg(long)]
        route: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure => {
                let config = configure::interactive(config)?;
                println!(
                    "Saved {} route configuration to {}",
                    config.route()?,
                    Config::config_file_path()?.display()
                );
            }
            Command::Show { city, route } => {
                let controller = build_controller(&config, route.as_deref())?;
                let city = city.unwrap_or_else(|| config.default_city().to_string());

                match controller.query(&city).await {
                    QueryOutcome::Cached(snapshot) | QueryOutcome::Fetched(snapshot) => {
                        println!("{}", render::card(&snapshot, config.theme));
                    }
                    QueryOutcome::Failed(err) => bail!("{err}"),
                    QueryOutcome::Ignored => bail!("City name is empty"),
                    QueryOutcome::Superseded => {}
                }
            }
            Command::Repl { live, route } => {
                let controller = build_controller(&config, route.as_deref())?;
                repl(controller, &config, live).await?;
            }
        }

        Ok(())
    }
}

fn build_controller(
    config: &Config,
    route_override: Option<&str>,
) -> anyhow::Result<Arc<WeatherQueryController>> {
    let provider = match route_override {
        Some(route) => provider_from_config(route.parse()?, config)?,
        None => default_provider_from_config(config)?,
    };
    debug!(route = %provider.route(), ttl = ?config.cache_ttl(), "controller ready");
    let cache = CacheStore::new(config.cache_ttl(), Arc::new(SystemClock));

    Ok(Arc::new(WeatherQueryController::new(
        Arc::from(provider),
        cache,
        config.default_city(),
    )))
}

enum Line<'a> {
    Quit,
    SetTheme(Theme),
    ToggleTheme,
    Search(&'a str),
}

fn parse_line(line: &str) -> Line<'_> {
    match line.trim() {
        ":quit" | ":q" => Line::Quit,
        ":dark" => Line::SetTheme(Theme::Dark),
        ":light" => Line::SetTheme(Theme::Light),
        ":theme" => Line::ToggleTheme,
        _ => Line::Search(line),
    }
}

async fn repl(
    controller: Arc<WeatherQueryController>,
    config: &Config,
    live: bool,
) -> anyhow::Result<()> {
    let (theme_tx, theme_rx) = watch::channel(config.theme);
    let painter = tokio::spawn(paint(controller.subscribe(), theme_rx));

    let (input, cities, debounce_task) = Debouncer::spawn(config.debounce());
    let driver = drive(controller.clone(), cities);
    info!(live, quiet = ?config.debounce(), "interactive search started");

    input.submit(controller.current_city());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut quit = false;
    while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
        match parse_line(&line) {
            Line::Quit => {
                quit = true;
                break;
            }
            Line::SetTheme(theme) => {
                debug!(?theme, "theme set");
                theme_tx.send_replace(theme);
            }
            Line::ToggleTheme => {
                theme_tx.send_modify(|theme| *theme = theme.toggled());
                let theme = *theme_tx.borrow();
                debug!(?theme, "theme toggled");
            }
            Line::Search(text) if live => input.changed(text),
            Line::Search(text) => input.submit(text),
        }
    }

    if quit {
        info!("quit requested; abandoning pending search");
        debounce_task.abort();
        driver.abort();
        controller.teardown();
    } else {
        // End of input counts as the typing pause; let the last search land.
        debug!("stdin closed; waiting for the last search");
        drop(input);
        let _ = debounce_task.await;
        let _ = driver.await;
    }

    drop(theme_tx);
    let _ = painter.await;

    Ok(())
}

/// Redraw whenever the query state or the theme changes.
async fn paint(
    mut states: watch::Receiver<weather_core::QueryState>,
    mut theme: watch::Receiver<Theme>,
) {
    loop {
        let frame = render::render(&states.borrow_and_update(), *theme.borrow_and_update());
        println!("{frame}");

        tokio::select! {
            biased;
            changed = states.changed() => if changed.is_err() { break },
            changed = theme.changed() => if changed.is_err() { break },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse() {
        Cli::try_parse_from(["weather", "show", "Cairo", "--route", "proxy"]).unwrap();
        Cli::try_parse_from(["weather", "repl", "--live"]).unwrap();
        Cli::try_parse_from(["weather", "configure"]).unwrap();
    }

    #[test]
    fn repl_lines_map_to_actions() {
        assert!(matches!(parse_line(":quit"), Line::Quit));
        assert!(matches!(parse_line(" :dark "), Line::SetTheme(Theme::Dark)));
        assert!(matches!(parse_line(":theme"), Line::ToggleTheme));
        assert!(matches!(parse_line("Buenos Aires"), Line::Search("Buenos Aires")));
    }

    #[test]
    fn unknown_route_override_is_rejected() {
        let err = build_controller(&Config::default(), Some("pigeon")).unwrap_err();
        assert!(err.to_string().contains("Unknown route"));
    }

    #[tokio::test]
    async fn configured_route_is_used_without_override() {
        let config = Config {
            route: Some("proxy".into()),
            proxy_url: Some("http://localhost:8888/weather".into()),
            ..Config::default()
        };
        assert!(build_controller(&config, None).is_ok());

        let config = Config { route: Some("proxy".into()), ..Config::default() };
        let err = build_controller(&config, None).unwrap_err();
        assert!(err.to_string().contains("No proxy URL configured"));
        assert!(build_controller(&config, Some("direct")).is_ok());
    }

    #[tokio::test]
    async fn controller_starts_on_default_city() {
        let config = Config { default_city: Some("Lima".into()), ..Config::default() };
        let controller = build_controller(&config, None).unwrap();
        assert_eq!(controller.current_city(), "Lima");
    }
}
