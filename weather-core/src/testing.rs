//! Scripted providers shared by the lookup and server tests.

use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{Measurement, WeatherProvider};

/// Names of providers in the order they were invoked.
pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug)]
pub struct ScriptedProvider {
    name: String,
    outcome: Result<Measurement, String>,
    delay: Option<Duration>,
    cities: Mutex<Vec<String>>,
    log: Option<CallLog>,
}

impl ScriptedProvider {
    pub fn ok(name: &str, temperature_c: f64, wind_speed_kph: f64) -> Self {
        Self::new(
            name,
            Ok(Measurement {
                temperature_c,
                wind_speed_kph,
            }),
        )
    }

    pub fn failing(name: &str, error: &str) -> Self {
        Self::new(name, Err(error.to_string()))
    }

    /// Never answers; only a deadline ends the call.
    pub fn hanging(name: &str) -> Self {
        Self::failing(name, "unreachable").with_delay(Duration::from_secs(24 * 3600))
    }

    fn new(name: &str, outcome: Result<Measurement, String>) -> Self {
        Self {
            name: name.to_string(),
            outcome,
            delay: None,
            cities: Mutex::new(Vec::new()),
            log: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    pub fn calls(&self) -> usize {
        self.cities.lock().len()
    }

    /// City argument of every call, in order.
    pub fn cities(&self) -> Vec<String> {
        self.cities.lock().clone()
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_weather(&self, city: &str, _deadline: Instant) -> anyhow::Result<Measurement> {
        self.cities.lock().push(city.to_string());
        if let Some(log) = &self.log {
            log.lock().push(self.name.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone().map_err(|e| anyhow!(e))
    }
}

/// Fails the test if it is ever invoked.
#[derive(Debug)]
pub struct ForbiddenProvider;

#[async_trait]
impl WeatherProvider for ForbiddenProvider {
    fn name(&self) -> &str {
        "forbidden"
    }

    async fn get_weather(&self, city: &str, _deadline: Instant) -> anyhow::Result<Measurement> {
        panic!("provider must not be contacted for {city}");
    }
}
