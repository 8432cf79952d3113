use serde::{Deserialize, Serialize};

/// Display model for one city at one fetch time.
///
/// Built only by [`crate::provider::openweather::into_snapshot`]; cached and
/// published as-is afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub city: String,
    pub temp_celsius: i64,
    pub humidity_percent: i64,
    pub wind_speed: f64,
    pub description: String,
    pub icon_ref: String,
}

/// Stored form of a cached snapshot: `{"_ts": <epoch ms>, "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "data")]
    pub snapshot: WeatherSnapshot,
    #[serde(rename = "_ts")]
    pub fetched_at_epoch_ms: i64,
}

impl CacheEntry {
    pub fn age_ms(&self, now_epoch_ms: i64) -> i64 {
        now_epoch_ms - self.fetched_at_epoch_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_entry_uses_session_storage_field_names() {
        let entry = CacheEntry {
            snapshot: WeatherSnapshot {
                city: "London".into(),
                temp_celsius: 16,
                humidity_percent: 70,
                wind_speed: 3.2,
                description: "clear sky".into(),
                icon_ref: "https://openweathermap.org/img/wn/01d@2x.png".into(),
            },
            fetched_at_epoch_ms: 1_700_000_000_000,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["_ts"], 1_700_000_000_000_i64);
        assert_eq!(json["data"]["city"], "London");
        assert_eq!(json["data"]["tempCelsius"], 16);
    }
}
