use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use weather_proxy::{Upstream, routes};

const DEFAULT_ADDR: &str = "127.0.0.1:8888";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr: SocketAddr = std::env::var("WEATHER_PROXY_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
        .context("WEATHER_PROXY_ADDR must be a socket address like 127.0.0.1:8888")?;

    let mut upstream = Upstream::new(std::env::var("WEATHER_API_KEY").ok());
    if let Ok(base) = std::env::var("OPENWEATHER_BASE_URL") {
        upstream = upstream.with_base_url(base);
    }

    info!(%addr, "weather proxy listening");
    warp::serve(routes(upstream)).run(addr).await;

    Ok(())
}
