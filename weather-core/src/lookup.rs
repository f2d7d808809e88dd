//! Cache-first lookup with ordered provider failover and stale fallback.

use std::{sync::Arc, time::Duration};

use tokio::time::Instant;

use crate::{Config, cache::MeasurementCache, model::Weather, provider::WeatherProvider};

/// The only error a caller ever sees: no provider answered and nothing was cached.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("all providers unavailable")]
    AllProvidersUnavailable,
}

/// Where a served value came from. Callers receive the same shape either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Cache,
    Provider(String),
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub weather: Weather,
    pub source: Source,
}

#[derive(Debug, Clone)]
pub struct LookupSettings {
    /// Budget for each individual provider attempt.
    pub attempt_timeout: Duration,
    /// Substituted when the request names no city.
    pub default_city: String,
}

impl From<&Config> for LookupSettings {
    fn from(config: &Config) -> Self {
        Self {
            attempt_timeout: config.http_timeout(),
            default_city: config.default_city.clone(),
        }
    }
}

pub struct WeatherLookup {
    cache: Arc<dyn MeasurementCache>,
    providers: Vec<Arc<dyn WeatherProvider>>,
    settings: LookupSettings,
}

impl WeatherLookup {
    /// `providers` are tried strictly in the given order.
    pub fn new(
        cache: Arc<dyn MeasurementCache>,
        providers: Vec<Arc<dyn WeatherProvider>>,
        settings: LookupSettings,
    ) -> Self {
        Self {
            cache,
            providers,
            settings,
        }
    }

    pub fn providers(&self) -> &[Arc<dyn WeatherProvider>] {
        &self.providers
    }

    /// Cache key and provider argument for a requested city.
    pub fn normalize_city(&self, city: Option<&str>) -> String {
        match city {
            Some(city) if !city.is_empty() => city.to_lowercase(),
            _ => self.settings.default_city.to_lowercase(),
        }
    }

    pub async fn lookup(&self, city: Option<&str>) -> Result<Served, LookupError> {
        self.lookup_until(city, None).await
    }

    /// Resolve weather for `city`.
    ///
    /// `caller_deadline` only caps the first provider attempt. Every later
    /// attempt gets a full `attempt_timeout` of its own, so with N providers the
    /// call may take up to N × `attempt_timeout` regardless of the caller's budget.
    pub async fn lookup_until(
        &self,
        city: Option<&str>,
        caller_deadline: Option<Instant>,
    ) -> Result<Served, LookupError> {
        let key = self.normalize_city(city);

        if let Some(weather) = self.cache.get_fresh(&key) {
            tracing::debug!(city = %key, "serving fresh cache entry");
            return Ok(Served {
                weather,
                source: Source::Cache,
            });
        }

        for (attempt, provider) in self.providers.iter().enumerate() {
            let started = Instant::now();
            let deadline = self.attempt_deadline(attempt, started, caller_deadline);

            let outcome =
                tokio::time::timeout_at(deadline, provider.get_weather(&key, deadline)).await;

            match outcome {
                Ok(Ok(measurement)) => {
                    let weather = Weather::from_measurement(measurement);
                    self.cache.set(&key, weather);
                    tracing::debug!(city = %key, provider = provider.name(), "provider answered");
                    return Ok(Served {
                        weather,
                        source: Source::Provider(provider.name().to_string()),
                    });
                }
                Ok(Err(err)) => {
                    tracing::warn!(
                        city = %key,
                        provider = provider.name(),
                        error = format!("{err:#}"),
                        "provider failed"
                    );
                }
                Err(_) => {
                    let budget = deadline.saturating_duration_since(started);
                    tracing::warn!(
                        city = %key,
                        provider = provider.name(),
                        budget_ms = budget.as_millis() as u64,
                        "provider timed out"
                    );
                }
            }
        }

        if let Some(weather) = self.cache.get_stale(&key) {
            tracing::info!(city = %key, "all providers failed, serving stale cache entry");
            return Ok(Served {
                weather,
                source: Source::Stale,
            });
        }

        tracing::warn!(
            city = %key,
            providers = self.providers.len(),
            "no weather data available"
        );
        Err(LookupError::AllProvidersUnavailable)
    }

    /// Deadline for attempt number `attempt` starting at `started`.
    fn attempt_deadline(
        &self,
        attempt: usize,
        started: Instant,
        caller_deadline: Option<Instant>,
    ) -> Instant {
        let fresh = started + self.settings.attempt_timeout;
        match caller_deadline {
            Some(caller_deadline) if attempt == 0 => fresh.min(caller_deadline),
            _ => fresh,
        }
    }
}
