//! Error taxonomy for a weather lookup.
//!
//! "Location not found" is deliberately absent: geocoding with zero
//! candidates is a normal outcome and surfaces as `Ok(None)`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid lookup request: {0}")]
    InvalidRequest(String),

    /// DNS, connect, TLS or timeout failure. Never retried.
    #[error("Transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Upstream {url} answered with status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// A successful upstream response that does not have the expected shape.
    #[error("Upstream contract violation: {0}")]
    Contract(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FetchError {
    /// The request URL is stripped from the message: its query carries the API key.
    pub fn transport(url: &str, err: reqwest::Error) -> Self {
        let err = err.without_url();
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(&format!(": {cause}"));
            source = cause.source();
        }
        Self::Transport { url: url.to_string(), message }
    }

    pub fn contract(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Contract(format!("{context}: {err}"))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Message safe to show to whoever asked for the weather.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidRequest(msg) => format!("Please check your input: {msg}"),
            Self::Config(msg) => format!("Weather lookup is not configured: {msg}"),
            Self::Transport { .. } | Self::Status { .. } | Self::Contract(_) => {
                "Could not fetch weather data. Please try again.".to_string()
            }
        }
    }
}
