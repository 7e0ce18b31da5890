use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode};
use weather_dash_core::{Config, LookupRequest, NormalizedWeather, WeatherService};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-dash", version, about = "Current weather for a city")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key in the config file.
    Configure,

    /// Show current weather for a city.
    Show {
        city: String,

        /// State or region, e.g. "TX".
        state: String,

        /// Optional ISO 3166 country code, e.g. "US".
        #[arg(long, default_value = "")]
        country: String,

        /// Print the normalized record as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, state, country, json } => show(city, state, country, json).await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load_file()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.set_api_key(api_key.trim().to_string());
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(city: String, state: String, country: String, json: bool) -> anyhow::Result<()> {
    let request = LookupRequest::new(city, state, country);
    if let Err(e) = request.validate() {
        println!("{}", e.user_message());
        return Ok(());
    }

    let config = Config::load()?;
    let service = WeatherService::from_config(&config)?;

    let result = service
        .fetch_weather_data(&request.city, &request.state, &request.country_code)
        .await;

    match result {
        Ok(Some(weather)) if json => println!("{}", serde_json::to_string_pretty(&weather)?),
        Ok(Some(weather)) => print!("{}", render(&weather)),
        Ok(None) => println!("No weather data found for that location."),
        Err(e) => {
            tracing::error!("Weather lookup failed: {e}");
            println!("{}", e.user_message());
        }
    }

    Ok(())
}

fn render(weather: &NormalizedWeather) -> String {
    let mut out = format!("Weather in {}\n", weather.name);
    out.push_str(&format!("Temperature: {}°F\n", weather.main.temp));
    out.push_str(&format!("Humidity: {}\n", weather.main.humidity_display()));

    if let Some(speed) = weather.wind.as_ref().and_then(|w| w.speed) {
        out.push_str(&format!("Wind Speed: {speed} mph\n"));
    }
    if let Some(condition) = weather.weather.first() {
        out.push_str(&format!("Description: {}\n", condition.description));
    }

    out
}
