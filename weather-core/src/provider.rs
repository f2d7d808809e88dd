use async_trait::async_trait;
use crate::{
    Config, Measurement,
    provider::{openweather::OpenWeatherProvider, weatherstack::WeatherstackProvider},
};
use reqwest::Client;
use std::{convert::TryFrom, fmt::Debug, sync::Arc, time::Duration};
use tokio::time::Instant;

pub mod openweather;
pub mod weatherstack;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Weatherstack,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Weatherstack => "weatherstack",
            ProviderId::OpenWeather => "openweather",
        }
    }

    /// Environment variable that supplies the provider's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderId::Weatherstack => "WEATHERSTACK_KEY",
            ProviderId::OpenWeather => "OPENWEATHER_KEY",
        }
    }

    /// All providers, in default failover order.
    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Weatherstack, ProviderId::OpenWeather]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "weatherstack" => Ok(ProviderId::Weatherstack),
            "openweather" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: weatherstack, openweather."
            )),
        }
    }
}

/// An upstream weather source.
///
/// Every kind of failure (transport, non-2xx status, decode, upstream-reported
/// error) is returned as `Err`; callers only distinguish success from failure.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Stable identifier used in logs.
    fn name(&self) -> &str;

    /// Current conditions for `city`. The call must not outlive `deadline`.
    async fn get_weather(&self, city: &str, deadline: Instant) -> anyhow::Result<Measurement>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
    http: &Client,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.provider_api_key(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: set {} or run `weather-server configure {id}`.",
            id.env_var()
        )
    })?;

    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::Weatherstack => {
            Arc::new(WeatherstackProvider::new(http.clone(), api_key.to_owned()))
        }
        ProviderId::OpenWeather => {
            Arc::new(OpenWeatherProvider::new(http.clone(), api_key.to_owned()))
        }
    };

    Ok(provider)
}

/// Build the provider registry in failover order, skipping providers without
/// credentials. Having none left is an error.
pub fn providers_from_config(
    config: &Config,
    http: &Client,
) -> anyhow::Result<Vec<Arc<dyn WeatherProvider>>> {
    let mut providers = Vec::new();
    let mut skipped = Vec::new();

    for id in config.provider_priority()? {
        if config.is_provider_configured(id) {
            providers.push(provider_from_config(id, config, http)?);
        } else {
            tracing::info!(
                provider = %id,
                env = id.env_var(),
                "provider not configured, skipping"
            );
            skipped.push(format!("{id} ({})", id.env_var()));
        }
    }

    if providers.is_empty() {
        return Err(anyhow::anyhow!(
            "No providers configured; missing credentials for: {}",
            skipped.join(", ")
        ));
    }

    Ok(providers)
}

/// Time left until `deadline`, as a per-request HTTP timeout.
pub(crate) fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn provider_id_parse_is_case_insensitive() {
        assert_eq!(
            ProviderId::try_from("OpenWeather").unwrap(),
            ProviderId::OpenWeather
        );
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err =
            provider_from_config(ProviderId::OpenWeather, &cfg, &Client::new()).unwrap_err();
        assert!(err.to_string().contains("No API key configured for provider"));
        assert!(err.to_string().contains("OPENWEATHER_KEY"));
    }

    #[test]
    fn registry_errors_naming_every_missing_provider() {
        let cfg = Config::default();
        let err = providers_from_config(&cfg, &Client::new()).unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No providers configured"));
        assert!(msg.contains("weatherstack (WEATHERSTACK_KEY)"));
        assert!(msg.contains("openweather (OPENWEATHER_KEY)"));
    }

    #[test]
    fn registry_follows_configured_priority() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Weatherstack, "WS".into());
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OW".into());
        cfg.prefer_provider(ProviderId::OpenWeather);

        let providers = providers_from_config(&cfg, &Client::new()).unwrap();
        let names: Vec<_> = providers.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["openweather", "weatherstack"]);
    }

    #[test]
    fn registry_registers_each_provider_once() {
        let mut cfg = Config {
            provider_order: vec!["openweather".into(), "OpenWeather".into()],
            ..Config::default()
        };
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OW".into());

        let providers = providers_from_config(&cfg, &Client::new()).unwrap();
        let names: Vec<_> = providers.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["openweather"]);
    }

    #[test]
    fn registry_skips_unconfigured_providers() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OW".into());

        let providers = providers_from_config(&cfg, &Client::new()).unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name(), "openweather");
    }

    #[test]
    fn truncate_body_limits_long_bodies() {
        let long = "x".repeat(500);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.len(), 203);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }
}
