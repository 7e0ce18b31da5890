//! Fetch pipeline: cache lookup, geocoding, weather lookup, normalization.

use anyhow::Context;
use serde::Deserialize;

use crate::{
    Config,
    cache::FileCache,
    client::{HttpFetch, RemoteClient},
    error::FetchError,
    model::{Coordinate, GeocodeOutcome, LookupRequest, NormalizedWeather},
    normalize::normalize,
};

/// One entry of the geocoding response list.
#[derive(Debug, Deserialize)]
struct GeoCandidate {
    lat: f64,
    lon: f64,
}

#[derive(Debug)]
pub struct WeatherService<F: HttpFetch = RemoteClient> {
    fetch: F,
    api_key: String,
    geolocation_url: String,
    fetch_weather_url: String,
    cache: FileCache,
}

impl WeatherService<RemoteClient> {
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let client = RemoteClient::with_connect_timeout(config.connect_timeout())?;
        Self::with_fetcher(config, client)
    }
}

impl<F: HttpFetch> WeatherService<F> {
    pub fn with_fetcher(config: &Config, fetch: F) -> Result<Self, FetchError> {
        let api_key = config.api_key().map_err(|e| FetchError::Config(e.to_string()))?;
        let cache_path = config.cache_path().map_err(|e| FetchError::Config(e.to_string()))?;

        Ok(Self {
            fetch,
            api_key: api_key.to_string(),
            geolocation_url: config.geolocation_url.clone(),
            fetch_weather_url: config.fetch_weather_url.clone(),
            cache: FileCache::new(cache_path).with_ttl(config.cache_ttl()),
        })
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Current conditions for a place, or `None` when geocoding finds no match.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn fetch_weather_data(
        &self,
        city: &str,
        state: &str,
        country_code: &str,
    ) -> Result<Option<NormalizedWeather>, FetchError> {
        let request = LookupRequest::new(city, state, country_code);

        let query = request.query_string();
        if query.is_empty() {
            return Err(FetchError::InvalidRequest(
                "at least one of city, state or country code is required".into(),
            ));
        }

        if let Some(cached) = self.cached(&request.city, &request.state).await {
            tracing::info!("Serving cached weather for '{}'", query);
            return Ok(Some(cached));
        }

        let coordinate = match self.geocode(&query).await? {
            GeocodeOutcome::Found(coordinate) => coordinate,
            GeocodeOutcome::NotFound => {
                tracing::info!("No location matches '{}'", query);
                return Ok(None);
            }
        };
        let request = request.with_coordinate(coordinate);

        let weather = self.current_weather(coordinate).await?;

        if let Err(e) = self.store(&request.city, &request.state, &weather).await {
            tracing::warn!("Could not update weather cache: {:#}", e);
        }

        Ok(Some(weather))
    }

    /// Resolves a query such as `"Austin,TX,US"` to the first candidate's coordinates.
    pub async fn geocode(&self, query: &str) -> Result<GeocodeOutcome, FetchError> {
        let body = self
            .fetch
            .get(&self.geolocation_url, &[("q", query), ("appid", self.api_key.as_str())])
            .await?;

        let candidates: Vec<GeoCandidate> =
            serde_json::from_str(&body).map_err(|e| FetchError::contract("geocoding response", e))?;

        let Some(first) = candidates.into_iter().next() else {
            return Ok(GeocodeOutcome::NotFound);
        };

        tracing::debug!("Geocoded '{}' to ({}, {})", query, first.lat, first.lon);

        Ok(GeocodeOutcome::Found(Coordinate { latitude: first.lat, longitude: first.lon }))
    }

    /// Imperial units: °F and mph.
    pub async fn current_weather(
        &self,
        coordinate: Coordinate,
    ) -> Result<NormalizedWeather, FetchError> {
        let lat = coordinate.latitude.to_string();
        let lon = coordinate.longitude.to_string();

        let body = self
            .fetch
            .get(
                &self.fetch_weather_url,
                &[
                    ("lat", lat.as_str()),
                    ("lon", lon.as_str()),
                    ("appid", self.api_key.as_str()),
                    ("units", "imperial"),
                ],
            )
            .await?;

        normalize(&body)
    }

    /// Cache file IO runs on the blocking pool.
    async fn cached(&self, city: &str, state: &str) -> Option<NormalizedWeather> {
        let cache = self.cache.clone();
        let (city, state) = (city.to_string(), state.to_string());

        match tokio::task::spawn_blocking(move || cache.get(&city, &state)).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::debug!("Weather cache read did not complete: {}", e);
                None
            }
        }
    }

    async fn store(
        &self,
        city: &str,
        state: &str,
        weather: &NormalizedWeather,
    ) -> anyhow::Result<()> {
        let cache = self.cache.clone();
        let (city, state) = (city.to_string(), state.to_string());
        let weather = weather.clone();

        tokio::task::spawn_blocking(move || cache.put(&city, &state, &weather))
            .await
            .context("Weather cache write did not complete")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use serde_json::json;
    use std::{collections::HashMap, sync::Mutex};

    const GEO_URL: &str = "https://geo.test/direct";
    const WEATHER_URL: &str = "https://weather.test/weather";

    type Call = (String, HashMap<String, String>);

    #[derive(Debug, Default)]
    struct ScriptedFetch {
        responses: HashMap<String, String>,
        unreachable: Option<String>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedFetch {
        fn new(geocode: serde_json::Value, weather: serde_json::Value) -> Self {
            Self {
                responses: HashMap::from([
                    (GEO_URL.to_string(), geocode.to_string()),
                    (WEATHER_URL.to_string(), weather.to_string()),
                ]),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn calls_to(&self, url: &str) -> usize {
            self.calls().iter().filter(|(u, _)| u == url).count()
        }
    }

    #[async_trait]
    impl HttpFetch for ScriptedFetch {
        async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FetchError> {
            let params: HashMap<String, String> =
                query.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
            self.calls.lock().unwrap().push((url.to_string(), params));

            if self.unreachable.as_deref() == Some(url) {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    message: "dns error: failed to lookup address".into(),
                });
            }

            self.responses.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
                body: String::new(),
            })
        }
    }

    fn weather_json(name: &str) -> serde_json::Value {
        json!({
            "coord": {"lon": -74.0, "lat": 40.7},
            "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
            "main": {
                "temp": 58.1, "feels_like": 57.0, "temp_min": 55.9, "temp_max": 60.3,
                "pressure": 1009, "humidity": 82, "sea_level": 1009, "grnd_level": 1007
            },
            "visibility": 9000,
            "wind": {"speed": 12.66, "deg": 60},
            "rain": {"1h": 0.51},
            "clouds": {"all": 100},
            "dt": 1726000000,
            "sys": {
                "type": 2, "id": 2008101, "country": "US",
                "sunrise": 1725963000, "sunset": 1726008000
            },
            "timezone": -14400,
            "id": 5128581,
            "name": name,
            "cod": 200
        })
    }

    fn new_york() -> ScriptedFetch {
        ScriptedFetch::new(json!([{"lat": 40.7, "lon": -74.0}]), weather_json("New York"))
    }

    fn service(dir: &tempfile::TempDir, fetch: ScriptedFetch) -> WeatherService<ScriptedFetch> {
        let config = Config {
            api_key: Some("TEST_KEY".into()),
            geolocation_url: GEO_URL.into(),
            fetch_weather_url: WEATHER_URL.into(),
            cache_file: Some(dir.path().join("weather_cache.json")),
            ..Config::default()
        };
        WeatherService::with_fetcher(&config, fetch).unwrap()
    }

    #[tokio::test]
    async fn fetches_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir, new_york());

        let weather = svc.fetch_weather_data("New York", "NY", "US").await.unwrap().unwrap();

        assert_eq!(weather.name, "New York");
        assert_eq!(weather.weather[0].description, "Light Rain");
        assert_eq!(weather.main.humidity_display(), "82%");
        assert_eq!(svc.fetch.calls_to(GEO_URL), 1);
        assert_eq!(svc.fetch.calls_to(WEATHER_URL), 1);
    }

    #[tokio::test]
    async fn geocode_query_is_filtered_and_keyed() {
        let dir = tempfile::tempdir().unwrap();
        let fetch =
            ScriptedFetch::new(json!([{"lat": 30.27, "lon": -97.74}]), weather_json("Austin"));
        let svc = service(&dir, fetch);

        svc.fetch_weather_data("Austin", "", "US").await.unwrap();

        let calls = svc.fetch.calls();
        let (url, params) = &calls[0];
        assert_eq!(url, GEO_URL);
        assert_eq!(params["q"], "Austin,US");
        assert_eq!(params["appid"], "TEST_KEY");
    }

    #[tokio::test]
    async fn weather_call_uses_first_candidate_in_imperial_units() {
        let dir = tempfile::tempdir().unwrap();
        let geocode = json!([
            {"lat": 40.7, "lon": -74.0, "name": "New York"},
            {"lat": 0, "lon": 0}
        ]);
        let svc = service(&dir, ScriptedFetch::new(geocode, weather_json("New York")));

        svc.fetch_weather_data("New York", "NY", "").await.unwrap();

        let calls = svc.fetch.calls();
        let (url, params) = &calls[1];
        assert_eq!(url, WEATHER_URL);
        assert_eq!(params["lat"], "40.7");
        assert_eq!(params["lon"], "-74");
        assert_eq!(params["appid"], "TEST_KEY");
        assert_eq!(params["units"], "imperial");
    }

    #[tokio::test]
    async fn empty_geocode_result_is_none_without_weather_call() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir, ScriptedFetch::new(json!([]), weather_json("Nowhere")));

        let result = svc.fetch_weather_data("Atlantis", "ZZ", "").await.unwrap();

        assert!(result.is_none());
        assert_eq!(svc.fetch.calls_to(WEATHER_URL), 0);
        assert!(!svc.cache().path().exists());
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache_for_any_country() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir, new_york());

        let first = svc.fetch_weather_data("New York", "NY", "US").await.unwrap();
        let second = svc.fetch_weather_data("New York", "NY", "CA").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(svc.fetch.calls().len(), 2);
    }

    #[tokio::test]
    async fn expired_cache_entry_triggers_remote_calls() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir, new_york());

        let stale = normalize(&weather_json("Stale").to_string()).unwrap();
        svc.cache()
            .put_at("New York", "NY", &stale, Utc::now() - TimeDelta::seconds(601))
            .unwrap();

        let weather = svc.fetch_weather_data("New York", "NY", "").await.unwrap().unwrap();

        assert_eq!(weather.name, "New York");
        assert_eq!(svc.fetch.calls().len(), 2);
    }

    #[tokio::test]
    async fn geocode_transport_failure_is_error_without_cache_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetch = ScriptedFetch::new(json!([]), weather_json("New York"));
        fetch.unreachable = Some(GEO_URL.to_string());
        let svc = service(&dir, fetch);

        let err = svc.fetch_weather_data("New York", "NY", "US").await.unwrap_err();

        assert!(err.is_transport());
        assert_eq!(svc.fetch.calls_to(WEATHER_URL), 0);
        assert!(!svc.cache().path().exists());
    }

    #[tokio::test]
    async fn weather_transport_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetch = new_york();
        fetch.unreachable = Some(WEATHER_URL.to_string());
        let svc = service(&dir, fetch);

        let err = svc.fetch_weather_data("New York", "NY", "US").await.unwrap_err();

        assert!(err.is_transport());
        assert!(!svc.cache().path().exists());
    }

    #[tokio::test]
    async fn contract_violation_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(
            &dir,
            ScriptedFetch::new(
                json!([{"lat": 40.7, "lon": -74.0}]),
                json!({"cod": 200, "name": "Broken"}),
            ),
        );

        let err = svc.fetch_weather_data("New York", "NY", "US").await.unwrap_err();

        assert!(matches!(err, FetchError::Contract(_)));
        assert!(!svc.cache().path().exists());
    }

    #[tokio::test]
    async fn malformed_geocode_body_is_contract_violation() {
        let dir = tempfile::tempdir().unwrap();
        let fetch = ScriptedFetch::new(json!({"cod": "400"}), weather_json("New York"));
        let svc = service(&dir, fetch);

        let err = svc.fetch_weather_data("New York", "NY", "US").await.unwrap_err();
        assert!(matches!(err, FetchError::Contract(_)));
    }

    #[tokio::test]
    async fn blank_request_is_rejected_without_remote_calls() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir, ScriptedFetch::new(json!([]), weather_json("New York")));

        let err = svc.fetch_weather_data("  ", "", " ").await.unwrap_err();

        assert!(matches!(err, FetchError::InvalidRequest(_)));
        assert!(svc.fetch.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn lookup_runs_on_a_spawned_task() {
        let dir = tempfile::tempdir().unwrap();
        let svc = std::sync::Arc::new(service(&dir, new_york()));

        let first = tokio::spawn({
            let svc = svc.clone();
            async move { svc.fetch_weather_data("New York", "NY", "US").await }
        });
        let weather = first.await.unwrap().unwrap().unwrap();
        assert_eq!(weather.name, "New York");
        assert!(svc.cache().path().exists());

        let second = tokio::spawn({
            let svc = svc.clone();
            async move { svc.fetch_weather_data("New York", "NY", "US").await }
        });
        assert_eq!(second.await.unwrap().unwrap(), Some(weather));
        assert_eq!(svc.fetch.calls().len(), 2);
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let err =
            WeatherService::with_fetcher(&Config::default(), ScriptedFetch::default()).unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));
    }
}
