use anyhow::{Context, Result};
use inquire::{
    Confirm, CustomType, Password, PasswordDisplayMode, Select, Text, validator::Validation,
};
use weather_core::{Config, Route, Theme, config::FALLBACK_CITY, debounce::QUIET_PERIOD_RANGE_MS};

/// Walk the user through every setting and save the result.
pub fn interactive(mut config: Config) -> Result<Config> {
    let routes: Vec<&str> = Route::all().iter().map(Route::as_str).collect();
    let current = config.route().unwrap_or_default();
    let start = Route::all().iter().position(|r| *r == current).unwrap_or(0);

    let route = Select::new("How should requests reach OpenWeather?", routes)
        .with_starting_cursor(start)
        .prompt()
        .context("Route selection aborted")?;
    let route = route.parse::<Route>()?;
    config.set_route(route);

    match route {
        Route::Direct => {
            let key = Password::new("OpenWeather API key (empty keeps the current one):")
                .without_confirmation()
                .with_display_mode(PasswordDisplayMode::Masked)
                .prompt()
                .context("API key prompt aborted")?;
            if !key.trim().is_empty() {
                config.api_key = Some(key.trim().to_string());
            }
        }
        Route::Proxy => {
            let default_url = config
                .proxy_url
                .clone()
                .unwrap_or_else(|| "http://localhost:8888/weather".to_string());
            let url = Text::new("Proxy URL:")
                .with_default(&default_url)
                .prompt()
                .context("Proxy URL prompt aborted")?;
            config.proxy_url = Some(url.trim().to_string());
        }
    }

    let city = Text::new("Default city:")
        .with_default(config.default_city.as_deref().unwrap_or(FALLBACK_CITY))
        .prompt()
        .context("Default city prompt aborted")?;
    config.default_city = Some(city.trim().to_string());

    let debounce = CustomType::<u64>::new("Typing pause before searching (ms):")
        .with_default(config.debounce().as_millis() as u64)
        .with_validator(|ms: &u64| {
            if QUIET_PERIOD_RANGE_MS.contains(ms) {
                Ok(Validation::Valid)
            } else {
                let (low, high) = (QUIET_PERIOD_RANGE_MS.start(), QUIET_PERIOD_RANGE_MS.end());
                Ok(Validation::Invalid(format!("Choose a value between {low} and {high}").into()))
            }
        })
        .prompt()
        .context("Debounce prompt aborted")?;
    config.debounce_ms = Some(debounce);

    let dark = Confirm::new("Use the dark theme?")
        .with_default(config.theme == Theme::Dark)
        .prompt()
        .context("Theme prompt aborted")?;
    config.theme = if dark { Theme::Dark } else { Theme::Light };

    config.save()?;
    Ok(config)
}
