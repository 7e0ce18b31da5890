//! Reshapes a raw current-weather payload into [`NormalizedWeather`].
//!
//! Top-level fields are required and a missing one is reported as
//! [`FetchError::Contract`]. Nested sections (`wind`, `clouds`, `sys`,
//! `rain`, `snow`) collapse to `None` when absent or empty, and their
//! individual sub-fields default to `None`.

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    error::FetchError,
    model::{
        Clouds, ConditionEntry, Coordinate, NormalizedWeather, Precipitation, SysInfo,
        Temperatures, Wind,
    },
};

#[derive(Debug, Deserialize)]
struct RawCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    id: i64,
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct RawMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    #[serde(default)]
    pressure: Option<f64>,
    humidity: u8,
    #[serde(default)]
    sea_level: Option<f64>,
    #[serde(default)]
    grnd_level: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawWeather {
    coord: RawCoord,
    weather: Vec<RawCondition>,
    name: String,
    main: RawMain,
    wind: Value,
    visibility: i64,
    clouds: Value,
    #[serde(default)]
    rain: Value,
    #[serde(default)]
    snow: Value,
    dt: i64,
    sys: Value,
    timezone: i64,
    id: i64,
    cod: i64,
}

pub fn normalize(raw: &str) -> Result<NormalizedWeather, FetchError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| FetchError::contract("weather response is not JSON", e))?;
    normalize_value(value)
}

pub fn normalize_value(value: Value) -> Result<NormalizedWeather, FetchError> {
    let raw: RawWeather =
        serde_json::from_value(value).map_err(|e| FetchError::contract("weather response", e))?;

    Ok(NormalizedWeather {
        coordinates: Coordinate { latitude: raw.coord.lat, longitude: raw.coord.lon },
        weather: raw.weather.into_iter().map(convert_condition).collect(),
        name: raw.name,
        main: convert_main(raw.main),
        wind: section::<Wind>("wind", raw.wind)?,
        visibility: raw.visibility,
        clouds: section::<Clouds>("clouds", raw.clouds)?,
        rain: section::<Precipitation>("rain", raw.rain)?,
        snow: section::<Precipitation>("snow", raw.snow)?,
        dt: raw.dt,
        sys: section::<SysInfo>("sys", raw.sys)?,
        timezone: raw.timezone,
        id: raw.id,
        cod: raw.cod,
    })
}

fn convert_condition(raw: RawCondition) -> ConditionEntry {
    ConditionEntry {
        id: raw.id,
        main: raw.main,
        description: title_case(&raw.description),
        icon: raw.icon,
    }
}

fn convert_main(raw: RawMain) -> Temperatures {
    Temperatures {
        temp: raw.temp,
        feels_like: raw.feels_like,
        temp_min: raw.temp_min,
        temp_max: raw.temp_max,
        pressure: raw.pressure,
        humidity: raw.humidity,
        sea_level: raw.sea_level,
        ground_level: raw.grnd_level,
    }
}

fn section<T: DeserializeOwned>(name: &str, value: Value) -> Result<Option<T>, FetchError> {
    let empty = match &value {
        Value::Null | Value::Bool(false) => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| FetchError::contract(&format!("weather response `{name}`"), e))
}

/// Upper-cases the first character of every whitespace-separated word.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;

    for ch in text.chars() {
        if at_word_start && !ch.is_whitespace() {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = ch.is_whitespace();
    }

    out
}
