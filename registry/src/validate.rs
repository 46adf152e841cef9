use chrono::{DateTime, Utc};

use crate::errors::{codes, Error, Result};
use crate::model::{DeviceUpdate, NewDevice, NewReading};

pub const VALID_DEVICE_TYPES: &[&str] = &[
    "TRAFFIC_LIGHT",
    "AIR_QUALITY",
    "STREET_LIGHT",
    "WATER_LEVEL",
    "NOISE_SENSOR",
    "WEATHER_SENSOR",
    "SECURITY_CAMERA",
    "PARKING_SENSOR",
    "WASTE_SENSOR",
    "SOLAR_PANEL",
];

pub const VALID_SENSOR_TYPES: &[&str] = &[
    "TEMPERATURE",
    "HUMIDITY",
    "AIR_QUALITY",
    "NOISE",
    "LIGHT",
    "MOTION",
];

pub const VALID_UNITS: &[&str] = &[
    "CELSIUS",
    "FAHRENHEIT",
    "PERCENTAGE",
    "PPM",
    "DB",
    "LUX",
    "BOOLEAN",
];

const STATUS_MIN: i32 = 0;
const STATUS_MAX: i32 = 100;
const LATITUDE_MIN: f64 = -90.0;
const LATITUDE_MAX: f64 = 90.0;
const LONGITUDE_MIN: f64 = -180.0;
const LONGITUDE_MAX: f64 = 180.0;

/// Validated and normalized device registration fields.
#[derive(Debug)]
pub struct DeviceFields {
    pub name: String,
    pub device_type: String,
    pub location: String,
    pub battery_level: Option<i32>,
    pub signal_strength: Option<i32>,
}

/// Validated ingestion fields. `timestamp` stays optional; the ingestion
/// manager substitutes the ingestion time when it is absent.
#[derive(Debug)]
pub struct ReadingFields {
    pub device_id: i64,
    pub sensor_type: String,
    pub value: f64,
    pub unit: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

pub fn new_device(input: &NewDevice) -> Result<DeviceFields> {
    let name = required_text(&input.name, codes::DEVICE_NAME_REQUIRED, "device name is required")?;
    let device_type = required_text(
        &input.device_type,
        codes::DEVICE_TYPE_REQUIRED,
        "device type is required",
    )?;

    if !VALID_DEVICE_TYPES.contains(&device_type.as_str()) {
        return Err(Error::validation(
            codes::DEVICE_INVALID_TYPE,
            "invalid device type",
            format!(
                "type '{}' is not valid, valid types: {}",
                device_type,
                VALID_DEVICE_TYPES.join(", ")
            ),
        ));
    }

    let location = required_text(
        &input.location,
        codes::DEVICE_LOCATION_REQUIRED,
        "device location is required",
    )?;

    status_fields(input.battery_level, input.signal_strength)?;

    Ok(DeviceFields {
        name,
        device_type,
        location,
        battery_level: input.battery_level,
        signal_strength: input.signal_strength,
    })
}

/// Validates a partial update. Provided fields must be valid; absent fields
/// are passed through as no-ops. Text fields come back trimmed.
pub fn device_update(input: &DeviceUpdate) -> Result<DeviceUpdate> {
    let mut update = input.clone();

    if let Some(name) = &update.name {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::validation(
                codes::DEVICE_NAME_REQUIRED,
                "device name is required",
                "field 'name' must not be empty".to_string(),
            ));
        }
        update.name = Some(trimmed.to_string());
    }

    if let Some(device_type) = &update.device_type {
        let trimmed = device_type.trim();
        if !VALID_DEVICE_TYPES.contains(&trimmed) {
            return Err(Error::validation(
                codes::DEVICE_INVALID_TYPE,
                "invalid device type",
                format!(
                    "type '{}' is not valid, valid types: {}",
                    trimmed,
                    VALID_DEVICE_TYPES.join(", ")
                ),
            ));
        }
        update.device_type = Some(trimmed.to_string());
    }

    if let Some(location) = &update.location {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            return Err(Error::validation(
                codes::DEVICE_LOCATION_REQUIRED,
                "device location is required",
                "field 'location' must not be empty".to_string(),
            ));
        }
        update.location = Some(trimmed.to_string());
    }

    status_fields(update.battery_level, update.signal_strength)?;

    Ok(update)
}

pub fn status_fields(battery_level: Option<i32>, signal_strength: Option<i32>) -> Result<()> {
    if let Some(battery) = battery_level {
        if !(STATUS_MIN..=STATUS_MAX).contains(&battery) {
            return Err(Error::validation(
                codes::DEVICE_BATTERY_INVALID,
                "invalid battery level",
                format!("battery level {battery} out of range [{STATUS_MIN}, {STATUS_MAX}]"),
            ));
        }
    }

    if let Some(signal) = signal_strength {
        if !(STATUS_MIN..=STATUS_MAX).contains(&signal) {
            return Err(Error::validation(
                codes::DEVICE_SIGNAL_INVALID,
                "invalid signal strength",
                format!("signal strength {signal} out of range [{STATUS_MIN}, {STATUS_MAX}]"),
            ));
        }
    }

    Ok(())
}

pub fn new_reading(input: &NewReading) -> Result<ReadingFields> {
    let device_id = match input.device_id {
        Some(id) if id > 0 => id,
        _ => {
            return Err(Error::validation(
                codes::SENSOR_DEVICE_ID_REQUIRED,
                "device id is required",
                "field 'deviceId' must be a positive number".to_string(),
            ))
        }
    };

    let sensor_type = required_text(
        &input.sensor_type,
        codes::SENSOR_TYPE_REQUIRED,
        "sensor type is required",
    )?;

    if !VALID_SENSOR_TYPES.contains(&sensor_type.as_str()) {
        return Err(Error::validation(
            codes::SENSOR_INVALID_TYPE,
            "invalid sensor type",
            format!(
                "type '{}' is not valid, valid types: {}",
                sensor_type,
                VALID_SENSOR_TYPES.join(", ")
            ),
        ));
    }

    let value = input.value.ok_or_else(|| {
        Error::validation(
            codes::SENSOR_VALUE_REQUIRED,
            "sensor value is required",
            "field 'value' must not be empty".to_string(),
        )
    })?;

    if let Some(unit) = &input.unit {
        if !VALID_UNITS.contains(&unit.as_str()) {
            return Err(Error::validation(
                codes::SENSOR_INVALID_UNIT,
                "invalid unit",
                format!(
                    "unit '{}' is not valid, valid units: {}",
                    unit,
                    VALID_UNITS.join(", ")
                ),
            ));
        }
    }

    if let Some(latitude) = input.latitude {
        if !(LATITUDE_MIN..=LATITUDE_MAX).contains(&latitude) {
            return Err(Error::validation(
                codes::SENSOR_INVALID_COORDINATES,
                "invalid latitude",
                format!("latitude {latitude} out of range [{LATITUDE_MIN}, {LATITUDE_MAX}]"),
            ));
        }
    }

    if let Some(longitude) = input.longitude {
        if !(LONGITUDE_MIN..=LONGITUDE_MAX).contains(&longitude) {
            return Err(Error::validation(
                codes::SENSOR_INVALID_COORDINATES,
                "invalid longitude",
                format!("longitude {longitude} out of range [{LONGITUDE_MIN}, {LONGITUDE_MAX}]"),
            ));
        }
    }

    Ok(ReadingFields {
        device_id,
        sensor_type,
        value,
        unit: input.unit.clone(),
        latitude: input.latitude,
        longitude: input.longitude,
        timestamp: input.timestamp,
    })
}

fn required_text(
    field: &Option<String>,
    code: &'static str,
    message: &'static str,
) -> Result<String> {
    match field {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(Error::validation(
            code,
            message,
            format!("{message}, the field must not be empty"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_device() -> NewDevice {
        NewDevice {
            name: Some("Sensor-A".to_string()),
            device_type: Some("WEATHER_SENSOR".to_string()),
            location: Some("Park".to_string()),
            active: None,
            battery_level: Some(50),
            signal_strength: Some(80),
        }
    }

    fn valid_reading() -> NewReading {
        NewReading {
            device_id: Some(1),
            sensor_type: Some("TEMPERATURE".to_string()),
            value: Some(25.5),
            unit: Some("CELSIUS".to_string()),
            latitude: Some(-5.7793),
            longitude: Some(-35.2009),
            timestamp: None,
        }
    }

    #[test]
    fn test_valid_device() {
        let fields = new_device(&valid_device()).unwrap();
        assert_eq!(fields.name, "Sensor-A");
        assert_eq!(fields.device_type, "WEATHER_SENSOR");
    }

    #[test]
    fn test_device_name_trimmed() {
        let mut input = valid_device();
        input.name = Some("  Sensor-A  ".to_string());
        assert_eq!(new_device(&input).unwrap().name, "Sensor-A");
    }

    #[test]
    fn test_missing_device_name() {
        let mut input = valid_device();
        input.name = None;
        assert!(new_device(&input).is_err());

        input.name = Some("   ".to_string());
        match new_device(&input) {
            Err(Error::Validation { code, .. }) => assert_eq!(code, codes::DEVICE_NAME_REQUIRED),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_device_type() {
        let mut input = valid_device();
        input.device_type = Some("TOASTER".to_string());
        match new_device(&input) {
            Err(Error::Validation { code, .. }) => assert_eq!(code, codes::DEVICE_INVALID_TYPE),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_battery_out_of_range() {
        let mut input = valid_device();
        input.battery_level = Some(150);
        match new_device(&input) {
            Err(Error::Validation { code, .. }) => assert_eq!(code, codes::DEVICE_BATTERY_INVALID),
            other => panic!("expected validation error, got {other:?}"),
        }

        input.battery_level = Some(-1);
        assert!(new_device(&input).is_err());
    }

    #[test]
    fn test_update_with_no_fields_is_noop() {
        let update = device_update(&DeviceUpdate::default()).unwrap();
        assert!(update.name.is_none());
        assert!(update.active.is_none());
    }

    #[test]
    fn test_update_rejects_empty_name() {
        let input = DeviceUpdate {
            name: Some("  ".to_string()),
            ..DeviceUpdate::default()
        };
        assert!(device_update(&input).is_err());
    }

    #[test]
    fn test_update_rejects_invalid_signal() {
        let input = DeviceUpdate {
            signal_strength: Some(101),
            ..DeviceUpdate::default()
        };
        match device_update(&input) {
            Err(Error::Validation { code, .. }) => assert_eq!(code, codes::DEVICE_SIGNAL_INVALID),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_reading() {
        let fields = new_reading(&valid_reading()).unwrap();
        assert_eq!(fields.device_id, 1);
        assert_eq!(fields.sensor_type, "TEMPERATURE");
        assert_eq!(fields.value, 25.5);
    }

    #[test]
    fn test_reading_requires_positive_device_id() {
        let mut input = valid_reading();
        input.device_id = Some(0);
        match new_reading(&input) {
            Err(Error::Validation { code, .. }) => {
                assert_eq!(code, codes::SENSOR_DEVICE_ID_REQUIRED)
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        input.device_id = None;
        assert!(new_reading(&input).is_err());
    }

    #[test]
    fn test_reading_requires_value() {
        let mut input = valid_reading();
        input.value = None;
        match new_reading(&input) {
            Err(Error::Validation { code, .. }) => assert_eq!(code, codes::SENSOR_VALUE_REQUIRED),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_reading_rejects_unknown_unit() {
        let mut input = valid_reading();
        input.unit = Some("KELVIN".to_string());
        match new_reading(&input) {
            Err(Error::Validation { code, .. }) => assert_eq!(code, codes::SENSOR_INVALID_UNIT),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_reading_unit_is_optional() {
        let mut input = valid_reading();
        input.unit = None;
        assert!(new_reading(&input).is_ok());
    }

    #[test]
    fn test_reading_coordinate_bounds() {
        let mut input = valid_reading();
        input.latitude = Some(90.5);
        match new_reading(&input) {
            Err(Error::Validation { code, .. }) => {
                assert_eq!(code, codes::SENSOR_INVALID_COORDINATES)
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let mut input = valid_reading();
        input.longitude = Some(-180.5);
        assert!(new_reading(&input).is_err());

        let mut input = valid_reading();
        input.latitude = Some(90.0);
        input.longitude = Some(-180.0);
        assert!(new_reading(&input).is_ok());
    }
}
