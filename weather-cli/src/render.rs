//! Terminal rendering of [`QueryState`].
//!
//! Exactly one of loader, error banner or weather card is drawn per state.

use weather_core::{QueryPhase, QueryState, Theme, WeatherSnapshot};

struct Palette {
    accent: &'static str,
    muted: &'static str,
    warn: &'static str,
    reset: &'static str,
}

const LIGHT: Palette = Palette {
    accent: "\x1b[1;34m",
    muted: "\x1b[90m",
    warn: "\x1b[33m",
    reset: "\x1b[0m",
};

const DARK: Palette = Palette {
    accent: "\x1b[1;97m",
    muted: "\x1b[37m",
    warn: "\x1b[93m",
    reset: "\x1b[0m",
};

fn palette(theme: Theme) -> &'static Palette {
    match theme {
        Theme::Light => &LIGHT,
        Theme::Dark => &DARK,
    }
}

pub fn render(state: &QueryState, theme: Theme) -> String {
    let p = palette(theme);

    match state.phase() {
        QueryPhase::Idle => format!("{}Enter city name...{}", p.muted, p.reset),
        QueryPhase::Loading => {
            format!("{}Loading weather for {}...{}", p.muted, state.current_city, p.reset)
        }
        QueryPhase::Error => {
            let message = state.error.as_deref().unwrap_or_default();
            format!("{}⚠️ {message}{}", p.warn, p.reset)
        }
        QueryPhase::Success => match &state.weather {
            Some(snapshot) => card(snapshot, theme),
            None => String::new(),
        },
    }
}

pub fn card(snapshot: &WeatherSnapshot, theme: Theme) -> String {
    let p = palette(theme);

    let lines = [
        format!("{}{}{}", p.accent, snapshot.city, p.reset),
        format!("{}°C  {}", snapshot.temp_celsius, capitalize(&snapshot.description)),
        format!(
            "{}Humidity {}%   Wind {} m/s   Now{}",
            p.muted, snapshot.humidity_percent, snapshot.wind_speed, p.reset
        ),
        format!("{}{}{}", p.muted, snapshot.icon_ref, p.reset),
    ];

    lines.join("\n")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            city: "London".into(),
            temp_celsius: 16,
            humidity_percent: 70,
            wind_speed: 3.2,
            description: "clear sky".into(),
            icon_ref: "https://openweathermap.org/img/wn/01d@2x.png".into(),
        }
    }

    #[test]
    fn card_shows_all_fields() {
        let out = card(&snapshot(), Theme::Light);

        assert!(out.contains("London"));
        assert!(out.contains("16°C"));
        assert!(out.contains("Clear sky"));
        assert!(out.contains("Humidity 70%"));
        assert!(out.contains("Wind 3.2 m/s"));
        assert!(out.contains("01d@2x.png"));
    }

    #[test]
    fn loading_hides_previous_weather() {
        let state = QueryState {
            current_city: "Paris".into(),
            loading: true,
            weather: Some(snapshot()),
            ..QueryState::default()
        };

        let out = render(&state, Theme::Dark);
        assert!(out.contains("Loading weather for Paris"));
        assert!(!out.contains("London"));
    }

    #[test]
    fn error_banner_only() {
        let state = QueryState { error: Some("city not found".into()), ..QueryState::default() };

        let out = render(&state, Theme::Light);
        assert!(out.contains("city not found"));
        assert!(!out.contains("°C"));
    }

    #[test]
    fn themes_use_different_accents() {
        assert_ne!(card(&snapshot(), Theme::Light), card(&snapshot(), Theme::Dark));
    }
}
