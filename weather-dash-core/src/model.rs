use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// One lookup, as typed by the user. Coordinates are attached once geocoding
/// has resolved the place.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    pub city: String,
    pub state: String,
    pub country_code: String,
    pub coordinate: Option<Coordinate>,
}

impl LookupRequest {
    pub fn new(
        city: impl Into<String>,
        state: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            state: state.into(),
            country_code: country_code.into(),
            coordinate: None,
        }
    }

    pub fn with_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    /// City and state are required; the country code is optional.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.city.trim().is_empty() {
            return Err(FetchError::InvalidRequest("city must not be empty".into()));
        }
        if self.state.trim().is_empty() {
            return Err(FetchError::InvalidRequest("state must not be empty".into()));
        }
        Ok(())
    }

    /// Geocoding `q` parameter: trimmed non-empty parts joined with ",".
    pub fn query_string(&self) -> String {
        [&self.city, &self.state, &self.country_code]
            .into_iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Result of the geocoding step. Transport failures travel on the `Err` side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeocodeOutcome {
    Found(Coordinate),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWeather {
    pub coordinates: Coordinate,
    pub weather: Vec<ConditionEntry>,
    pub name: String,
    pub main: Temperatures,
    pub wind: Option<Wind>,
    pub visibility: i64,
    pub clouds: Option<Clouds>,
    pub rain: Option<Precipitation>,
    pub snow: Option<Precipitation>,
    pub dt: i64,
    pub sys: Option<SysInfo>,
    pub timezone: i64,
    pub id: i64,
    pub cod: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionEntry {
    pub id: i64,
    pub main: String,
    /// Title-cased, e.g. "Broken Clouds".
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperatures {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    #[serde(default, with = "blank")]
    pub pressure: Option<f64>,
    /// Kept numeric; serialized as `"<value>%"`.
    #[serde(with = "percent")]
    pub humidity: u8,
    /// Not reported by every station.
    #[serde(default, with = "blank")]
    pub sea_level: Option<f64>,
    #[serde(default, with = "blank")]
    pub ground_level: Option<f64>,
}

impl Temperatures {
    pub fn humidity_display(&self) -> String {
        format!("{}%", self.humidity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    #[serde(default, with = "blank")]
    pub speed: Option<f64>,
    #[serde(default, with = "blank")]
    pub deg: Option<f64>,
    #[serde(default, with = "blank")]
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clouds {
    #[serde(default, with = "blank")]
    pub all: Option<i64>,
}

/// Rain or snow volume in the last one / three hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precipitation {
    #[serde(rename = "1h", default, with = "blank")]
    pub one_hour: Option<f64>,
    #[serde(rename = "3h", default, with = "blank")]
    pub three_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysInfo {
    #[serde(rename = "type", default, with = "blank")]
    pub kind: Option<i64>,
    #[serde(default, with = "blank")]
    pub id: Option<i64>,
    #[serde(default, with = "blank")]
    pub country: Option<String>,
    #[serde(default, with = "blank")]
    pub sunrise: Option<i64>,
    #[serde(default, with = "blank")]
    pub sunset: Option<i64>,
}

/// Missing sub-fields are written as `""` and read back as `None`.
mod blank {
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
    use serde_json::Value;

    pub fn serialize<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(v) => v.serialize(serializer),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::String(s) if s.is_empty() => Ok(None),
            other => serde_json::from_value(other).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

mod percent {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value}%"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => s
                .trim_end_matches('%')
                .trim()
                .parse()
                .map_err(serde::de::Error::custom),
            other => serde_json::from_value(other).map_err(serde::de::Error::custom),
        }
    }
}
