use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Stable machine-readable error codes exposed at the API boundary.
pub mod codes {
    pub const DEVICE_NOT_FOUND: &str = "DEVICE_001";
    pub const DEVICE_NAME_REQUIRED: &str = "DEVICE_003";
    pub const DEVICE_TYPE_REQUIRED: &str = "DEVICE_004";
    pub const DEVICE_LOCATION_REQUIRED: &str = "DEVICE_005";
    pub const DEVICE_INVALID_TYPE: &str = "DEVICE_006";
    pub const DEVICE_BATTERY_INVALID: &str = "DEVICE_007";
    pub const DEVICE_SIGNAL_INVALID: &str = "DEVICE_008";
    pub const DEVICE_OFFLINE_TIMEOUT_INVALID: &str = "DEVICE_010";

    pub const SENSOR_DATA_NOT_FOUND: &str = "SENSOR_001";
    pub const SENSOR_DEVICE_ID_REQUIRED: &str = "SENSOR_003";
    pub const SENSOR_TYPE_REQUIRED: &str = "SENSOR_004";
    pub const SENSOR_VALUE_REQUIRED: &str = "SENSOR_005";
    pub const SENSOR_INVALID_TYPE: &str = "SENSOR_006";
    pub const SENSOR_INVALID_UNIT: &str = "SENSOR_008";
    pub const SENSOR_INVALID_COORDINATES: &str = "SENSOR_009";
    pub const SENSOR_DEVICE_NOT_FOUND: &str = "SENSOR_011";
    pub const SENSOR_NO_DATA_FOR_PERIOD: &str = "SENSOR_012";
    pub const SENSOR_INVALID_PERIOD: &str = "SENSOR_013";

    pub const BIGDATA_NO_DATA_AVAILABLE: &str = "BIGDATA_003";

    pub const GENERAL_VALIDATION_ERROR: &str = "GENERAL_001";
    pub const GENERAL_INTERNAL_ERROR: &str = "GENERAL_002";
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    Validation {
        code: &'static str,
        message: &'static str,
        details: String,
    },

    #[error("{message}")]
    NotFound {
        code: &'static str,
        message: &'static str,
        details: String,
    },

    /// A reading referenced a device that does not exist. Kept apart from
    /// `NotFound`: it blocks persistence of a dependent entity and maps to a
    /// rejected request rather than a missing resource.
    #[error("device {0} not found")]
    DeviceNotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl Error {
    pub fn validation(code: &'static str, message: &'static str, details: String) -> Self {
        Error::Validation {
            code,
            message,
            details,
        }
    }

    pub fn device_missing(id: i64) -> Self {
        Error::NotFound {
            code: codes::DEVICE_NOT_FOUND,
            message: "device not found",
            details: format!("no device with id {id}"),
        }
    }

    pub fn reading_missing(id: i64) -> Self {
        Error::NotFound {
            code: codes::SENSOR_DATA_NOT_FOUND,
            message: "sensor reading not found",
            details: format!("no sensor reading with id {id}"),
        }
    }

    pub fn no_data_for_period() -> Self {
        Error::NotFound {
            code: codes::SENSOR_NO_DATA_FOR_PERIOD,
            message: "no readings in period",
            details: "no readings matched the requested sensor type and period".to_string(),
        }
    }

    pub fn no_snapshot_data() -> Self {
        Error::NotFound {
            code: codes::BIGDATA_NO_DATA_AVAILABLE,
            message: "no data available",
            details: "the reading store holds no data to analyze".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error payload returned by every failing endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    pub path: String,
}

impl ErrorResponse {
    pub fn of(error_code: &str, message: &str, details: &str, path: &str) -> Self {
        ErrorResponse {
            error_code: error_code.to_string(),
            message: message.to_string(),
            details: details.to_string(),
            timestamp: Utc::now(),
            path: path.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let response = ErrorResponse::of(
            codes::DEVICE_NOT_FOUND,
            "device not found",
            "no device with id 999",
            "/api/devices/999",
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["errorCode"], "DEVICE_001");
        assert_eq!(json["path"], "/api/devices/999");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_device_missing_carries_stable_code() {
        match Error::device_missing(999) {
            Error::NotFound { code, .. } => assert_eq!(code, codes::DEVICE_NOT_FOUND),
            other => panic!("unexpected error kind: {other:?}"),
        }
    }
}
