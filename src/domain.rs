//! ==============================================================================
//! domain.rs - sensor snapshot and history types
//! ==============================================================================
//!
//! purpose:
//!     the data shapes that cross the http boundary and live in the history
//!     buffer. field names on the wire are PascalCase (`SoilTemp`, ...) because
//!     that is what the sensor nodes send.
//!
//! relationships:
//!     - used by: store.rs (holds one SensorSnapshot)
//!     - used by: history.rs (HistoryPoint sequences keyed by Metric)
//!     - used by: poller.rs, sensor.rs, server.rs (wire format)
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};

/// current sensor readings plus the fixed ideal targets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SensorSnapshot {
    /// soil temperature in celsius
    pub soil_temp: f64,
    /// air temperature in celsius
    pub air_temp: f64,
    /// relative humidity (0-100%)
    pub humidity: f64,
    /// soil moisture (0-100%)
    pub soil_moisture: f64,
    pub ideal_soil_temp: f64,
    pub ideal_air_temp: f64,
    pub ideal_humidity: f64,
    pub ideal_soil_moisture: f64,
}

impl SensorSnapshot {
    /// values shown before any real reading has arrived
    pub const PLACEHOLDER: SensorSnapshot = SensorSnapshot {
        soil_temp: 25.0,
        air_temp: 22.0,
        humidity: 60.0,
        soil_moisture: 40.0,
        ideal_soil_temp: 23.0,
        ideal_air_temp: 21.0,
        ideal_humidity: 65.0,
        ideal_soil_moisture: 41.0,
    };

    /// measured value for one metric
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::SoilTemp => self.soil_temp,
            Metric::AirTemp => self.air_temp,
            Metric::Humidity => self.humidity,
            Metric::SoilMoisture => self.soil_moisture,
        }
    }

    /// ideal target for one metric
    pub fn ideal(&self, metric: Metric) -> f64 {
        match metric {
            Metric::SoilTemp => self.ideal_soil_temp,
            Metric::AirTemp => self.ideal_air_temp,
            Metric::Humidity => self.ideal_humidity,
            Metric::SoilMoisture => self.ideal_soil_moisture,
        }
    }

    /// merge the measured fields present in `update`, leave everything else alone
    pub fn apply(&mut self, update: &SensorUpdate) {
        if let Some(v) = update.soil_temp {
            self.soil_temp = v;
        }
        if let Some(v) = update.air_temp {
            self.air_temp = v;
        }
        if let Some(v) = update.humidity {
            self.humidity = v;
        }
        if let Some(v) = update.soil_moisture {
            self.soil_moisture = v;
        }
    }
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self::PLACEHOLDER
    }
}

/// partial update pushed by a sensor node
///
/// missing or null fields are left untouched on the stored snapshot.
/// ideal fields are not part of the update and unknown keys are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SensorUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_moisture: Option<f64>,
}

impl SensorUpdate {
    /// parse a request body, accepting only a json object
    ///
    /// the derived deserializer would also take an array by position.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        match serde_json::from_slice::<serde_json::Value>(body)? {
            serde_json::Value::Object(map) => serde_json::from_value(serde_json::Value::Object(map)),
            _ => Err(serde::de::Error::custom("expected a JSON object")),
        }
    }
}

/// the four measured metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    SoilTemp,
    AirTemp,
    Humidity,
    SoilMoisture,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::SoilTemp,
        Metric::AirTemp,
        Metric::Humidity,
        Metric::SoilMoisture,
    ];

    /// card title on the dashboard
    pub fn display_name(self) -> &'static str {
        match self {
            Metric::SoilTemp => "Soil Temp",
            Metric::AirTemp => "Air Temp",
            Metric::Humidity => "Humidity",
            Metric::SoilMoisture => "Soil Moisture",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::SoilTemp | Metric::AirTemp => "°C",
            Metric::Humidity | Metric::SoilMoisture => "%",
        }
    }

    /// spread of the random jitter used when seeding placeholder history
    pub fn seed_jitter(self) -> f64 {
        match self {
            Metric::SoilTemp | Metric::AirTemp => 1.0,
            Metric::Humidity | Metric::SoilMoisture => 2.0,
        }
    }
}

/// one timestamped sample of a single metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// unix timestamp in milliseconds
    pub time: u64,
    pub value: f64,
}

/// current unix time in milliseconds
pub fn timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_wire_names() {
        let json = serde_json::to_value(SensorSnapshot::PLACEHOLDER).unwrap();
        assert_eq!(json["SoilTemp"], 25.0);
        assert_eq!(json["IdealSoilMoisture"], 41.0);
        assert_eq!(json.as_object().unwrap().len(), 8);
    }

    #[test]
    fn test_apply_partial_update() {
        let mut snapshot = SensorSnapshot::PLACEHOLDER;
        let update: SensorUpdate = serde_json::from_str(r#"{"SoilTemp": 30}"#).unwrap();
        snapshot.apply(&update);

        assert_eq!(snapshot.soil_temp, 30.0);
        assert_eq!(
            SensorSnapshot { soil_temp: 25.0, ..snapshot },
            SensorSnapshot::PLACEHOLDER
        );
    }

    #[test]
    fn test_update_ignores_unknown_and_null() {
        let update: SensorUpdate =
            serde_json::from_str(r#"{"Humidity": null, "IdealHumidity": 99, "Extra": "x"}"#).unwrap();
        assert_eq!(update, SensorUpdate::default());
    }

    #[test]
    fn test_update_rejects_non_numeric() {
        assert!(serde_json::from_str::<SensorUpdate>(r#"{"AirTemp": "hot"}"#).is_err());
    }

    #[test]
    fn test_update_accepts_only_objects() {
        let update = SensorUpdate::from_json(br#"{"AirTemp": 19.5}"#).unwrap();
        assert_eq!(update.air_temp, Some(19.5));

        for body in ["[30, 1, 2, 3]", "null", "42", "\"SoilTemp\""] {
            assert!(SensorUpdate::from_json(body.as_bytes()).is_err(), "{}", body);
        }
    }

    #[test]
    fn test_metric_map_key() {
        let key = serde_json::to_string(&Metric::SoilMoisture).unwrap();
        assert_eq!(key, "\"SoilMoisture\"");
    }

    #[test]
    fn test_timestamp() {
        // should be after 2024
        assert!(timestamp_ms() > 1_700_000_000_000);
    }
}
