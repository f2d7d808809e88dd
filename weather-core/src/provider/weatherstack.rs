use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::Instant;

use crate::{
    model::Measurement,
    provider::{remaining, truncate_body},
};

use super::WeatherProvider;

const DEFAULT_BASE_URL: &str = "http://api.weatherstack.com";

#[derive(Debug, Clone)]
pub struct WeatherstackProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherstackProvider {
    pub fn new(http: Client, api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct WsError {
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct WsCurrent {
    temperature: f64,
    /// Already km/h.
    wind_speed: f64,
}

#[derive(Debug, Deserialize)]
struct WsResponse {
    #[serde(default)]
    error: Option<WsError>,
    #[serde(default)]
    current: Option<WsCurrent>,
}

#[async_trait]
impl WeatherProvider for WeatherstackProvider {
    fn name(&self) -> &str {
        "weatherstack"
    }

    async fn get_weather(&self, city: &str, deadline: Instant) -> Result<Measurement> {
        let url = format!("{}/current", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("access_key", self.api_key.as_str()), ("query", city)])
            .timeout(remaining(deadline))
            .send()
            .await
            .context("Failed to send request to Weatherstack")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read Weatherstack response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Weatherstack request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: WsResponse =
            serde_json::from_str(&body).context("Failed to parse Weatherstack JSON")?;

        // Weatherstack reports API errors with a 200 status.
        if let Some(error) = parsed.error {
            return Err(anyhow!("Weatherstack reported an error: {}", error.info));
        }

        let current = parsed
            .current
            .ok_or_else(|| anyhow!("Weatherstack response contained no current conditions"))?;

        Ok(Measurement {
            temperature_c: current.temperature,
            wind_speed_kph: current.wind_speed,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> WeatherstackProvider {
        WeatherstackProvider::new(Client::new(), "KEY".into())
            .with_base_url(server.uri())
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn parses_current_conditions_without_conversion() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/current"))
            .and(query_param("access_key", "KEY"))
            .and(query_param("query", "melbourne"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "location": { "name": "Melbourne" },
                "current": { "temperature": 18, "wind_speed": 22 }
            })))
            .mount(&server)
            .await;

        let m = provider(&server)
            .get_weather("melbourne", deadline())
            .await
            .unwrap();

        assert_eq!(
            m,
            Measurement {
                temperature_c: 18.0,
                wind_speed_kph: 22.0,
            }
        );
    }

    #[tokio::test]
    async fn application_error_with_ok_status_is_a_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": {
                    "code": 101,
                    "type": "invalid_access_key",
                    "info": "You have not supplied a valid API Access Key."
                }
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .get_weather("melbourne", deadline())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("valid API Access Key"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/current"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .get_weather("melbourne", deadline())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/current"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .get_weather("melbourne", deadline())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to parse Weatherstack JSON"));
    }

    #[tokio::test]
    async fn slow_response_fails_at_the_deadline() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/current"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "current": { "temperature": 18, "wind_speed": 22 }
                    }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let deadline = Instant::now() + Duration::from_millis(100);
        let result = provider(&server).get_weather("melbourne", deadline).await;

        assert!(result.is_err());
    }
}
