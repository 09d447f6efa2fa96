//! Current weather from wttr.in

use std::time::Duration;

use async_trait::async_trait;

use super::ContextSource;
use crate::config::WeatherConfig;
use crate::{Error, Result};

/// Default weather service
pub const DEFAULT_WEATHER_URL: &str = "https://wttr.in";

/// One-line weather report for a location
#[derive(Debug, Clone)]
pub struct WeatherSource {
    client: reqwest::Client,
    base_url: String,
    location: Option<String>,
}

impl WeatherSource {
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        Self::with_base_url(DEFAULT_WEATHER_URL, config.location.clone(), config.timeout)
    }

    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn with_base_url(
        base_url: impl Into<String>,
        location: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            location: location.filter(|l| !l.trim().is_empty()),
        })
    }

    fn url(&self) -> String {
        let location = self
            .location
            .as_deref()
            .map(|l| urlencoding::encode(l.trim()).into_owned())
            .unwrap_or_default();
        format!("{}/{location}?format=3", self.base_url)
    }
}

#[async_trait]
impl ContextSource for WeatherSource {
    fn name(&self) -> &'static str {
        "weather"
    }

    async fn query(&self) -> Result<String> {
        let response = self.client.get(self.url()).send().await?;
        let response = response.error_for_status().map_err(Error::Http)?;
        let report = response.text().await?.trim().to_string();

        if report.is_empty() {
            return Err(Error::Context("empty weather report".to_string()));
        }
        Ok(report)
    }
}
