use serde::{Deserialize, Serialize, Serializer};

/// Reading reported by a provider, already converted to metric units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub temperature_c: f64,
    pub wind_speed_kph: f64,
}

/// Normalized weather value as cached and served to callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    #[serde(serialize_with = "serialize_number")]
    pub wind_speed: f64,
    #[serde(serialize_with = "serialize_number")]
    pub temperature_degrees: f64,
}

impl Weather {
    /// Round both fields of a provider reading to one decimal place.
    pub fn from_measurement(m: Measurement) -> Self {
        Self {
            wind_speed: round_tenth(m.wind_speed_kph),
            temperature_degrees: round_tenth(m.temperature_c),
        }
    }
}

/// Round half-up to one decimal: `floor(x * 10 + 0.5) / 10`.
pub fn round_tenth(x: f64) -> f64 {
    (x * 10.0 + 0.5).floor() / 10.0
}

// Whole numbers go out as `30`, not `30.0`.
fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

    if value.fract() == 0.0 && value.abs() < MAX_EXACT {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}
