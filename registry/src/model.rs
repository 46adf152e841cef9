use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered IoT endpoint (sensor, actuator, camera, ...).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub device_type: String,
    pub location: String,
    pub active: bool,
    pub last_seen: DateTime<Utc>,
    pub battery_level: Option<i32>,
    pub signal_strength: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Single timestamped measurement emitted by a device.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub id: i64,
    pub device_id: i64,
    pub sensor_type: String,
    pub value: f64,
    pub unit: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Device registration payload. Required fields are optional here so that a
/// missing field produces a field-specific error instead of a bare 400.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub location: Option<String>,
    /// Accepted but ignored: newly registered devices are always active.
    pub active: Option<bool>,
    pub battery_level: Option<i32>,
    pub signal_strength: Option<i32>,
}

/// Partial device update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub location: Option<String>,
    pub active: Option<bool>,
    pub battery_level: Option<i32>,
    pub signal_strength: Option<i32>,
}

/// Incoming sensor measurement. `timestamp` defaults to ingestion time.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReading {
    pub device_id: Option<i64>,
    pub sensor_type: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStats {
    pub total: i64,
    pub active: i64,
    pub offline: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineTimeoutConfig {
    pub timeout_minutes: i64,
}
