use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::error;

use crate::analytics;
use crate::config::RuntimeConfig;
use crate::devices;
use crate::errors::{codes, Error, ErrorResponse};
use crate::ingest;
use crate::model::{
    Device, DeviceStats, DeviceUpdate, NewDevice, NewReading, OfflineTimeoutConfig, SensorReading,
};
use crate::query::{self, ReadingFilter};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<RuntimeConfig>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/devices", post(create_device).get(list_devices))
        .route("/api/devices/stats", get(device_stats))
        .route("/api/devices/active", get(active_devices))
        .route("/api/devices/offline", get(offline_devices))
        .route("/api/devices/low-battery", get(low_battery_devices))
        .route(
            "/api/devices/config/offline-timeout",
            get(get_offline_timeout).put(set_offline_timeout),
        )
        .route("/api/devices/type/:device_type", get(devices_by_type))
        .route("/api/devices/location/:location", get(devices_by_location))
        .route(
            "/api/devices/:id",
            get(get_device).put(update_device).delete(delete_device),
        )
        .route("/api/devices/:id/toggle", patch(toggle_device))
        .route("/api/devices/:id/heartbeat", post(device_heartbeat))
        .route("/api/sensor-data", post(ingest_reading).get(find_readings))
        .route("/api/sensor-data/types", get(sensor_types))
        .route("/api/sensor-data/average", get(average_value))
        .route("/api/sensor-data/location-range", get(readings_by_location))
        .route(
            "/api/sensor-data/latest/device/:device_id",
            get(latest_by_device),
        )
        .route(
            "/api/sensor-data/devices-by-type/:sensor_type",
            get(devices_by_sensor_type),
        )
        .route("/api/sensor-data/:id", get(reading_by_id))
        .route("/api/bigdata/analyze", get(bigdata_summary))
        .route("/api/bigdata/temporal-patterns", get(bigdata_temporal))
        .route("/api/bigdata/geographic", get(bigdata_geographic))
        .route("/api/bigdata/performance", get(bigdata_performance))
        .with_state(state)
}

/// Boundary error: the domain error plus the request path it surfaced on.
pub struct ApiError {
    error: Error,
    path: String,
}

impl ApiError {
    fn new(error: Error, uri: &Uri) -> Self {
        ApiError {
            error,
            path: uri.path().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.error {
            Error::Validation { code, message, .. } => {
                (StatusCode::BAD_REQUEST, *code, *message)
            }
            Error::NotFound { code, message, .. } => (StatusCode::NOT_FOUND, *code, *message),
            Error::DeviceNotFound(_) => (
                StatusCode::BAD_REQUEST,
                codes::SENSOR_DEVICE_NOT_FOUND,
                "device not found",
            ),
            Error::Database(e) => {
                error!("Database error on {}: {}", self.path, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    codes::GENERAL_INTERNAL_ERROR,
                    "internal error",
                )
            }
            Error::Migration(e) => {
                error!("Migration error on {}: {}", self.path, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    codes::GENERAL_INTERNAL_ERROR,
                    "internal error",
                )
            }
        };

        let details = match &self.error {
            Error::Validation { details, .. } | Error::NotFound { details, .. } => details.clone(),
            other => other.to_string(),
        };

        let body = ErrorResponse::of(code, message, &details, &self.path);
        (status, Json(body)).into_response()
    }
}

// ---- device endpoints ----

async fn create_device(
    State(app): State<AppState>,
    uri: Uri,
    Json(input): Json<NewDevice>,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    let device = devices::create_device(&app.pool, &input)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok((StatusCode::CREATED, Json(device)))
}

async fn list_devices(
    State(app): State<AppState>,
    uri: Uri,
) -> Result<Json<Vec<Device>>, ApiError> {
    let devices = devices::list_devices(&app.pool)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(devices))
}

async fn get_device(
    State(app): State<AppState>,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<Json<Device>, ApiError> {
    let device = devices::get_device(&app.pool, id)
        .await
        .map_err(|e| ApiError::new(e, &uri))?
        .ok_or_else(|| ApiError::new(Error::device_missing(id), &uri))?;
    Ok(Json(device))
}

async fn update_device(
    State(app): State<AppState>,
    uri: Uri,
    Path(id): Path<i64>,
    Json(input): Json<DeviceUpdate>,
) -> Result<Json<Device>, ApiError> {
    let device = devices::update_device(&app.pool, id, &input)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(device))
}

async fn delete_device(
    State(app): State<AppState>,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = devices::delete_device(&app.pool, id)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::new(Error::device_missing(id), &uri))
    }
}

async fn toggle_device(
    State(app): State<AppState>,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<Json<Device>, ApiError> {
    let device = devices::toggle_active(&app.pool, id)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(device))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatParams {
    battery_level: Option<i32>,
    signal_strength: Option<i32>,
}

async fn device_heartbeat(
    State(app): State<AppState>,
    uri: Uri,
    Path(id): Path<i64>,
    Query(params): Query<HeartbeatParams>,
) -> Result<Json<Device>, ApiError> {
    let device = devices::heartbeat(&app.pool, id, params.battery_level, params.signal_strength)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(device))
}

async fn devices_by_type(
    State(app): State<AppState>,
    uri: Uri,
    Path(device_type): Path<String>,
) -> Result<Json<Vec<Device>>, ApiError> {
    let devices = devices::devices_by_type(&app.pool, &device_type)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(devices))
}

async fn active_devices(
    State(app): State<AppState>,
    uri: Uri,
) -> Result<Json<Vec<Device>>, ApiError> {
    let devices = devices::active_devices(&app.pool)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(devices))
}

async fn devices_by_location(
    State(app): State<AppState>,
    uri: Uri,
    Path(location): Path<String>,
) -> Result<Json<Vec<Device>>, ApiError> {
    let devices = devices::devices_by_location(&app.pool, &location)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(devices))
}

async fn offline_devices(
    State(app): State<AppState>,
    uri: Uri,
) -> Result<Json<Vec<Device>>, ApiError> {
    let devices = devices::offline_devices(&app.pool, &app.config)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(devices))
}

async fn low_battery_devices(
    State(app): State<AppState>,
    uri: Uri,
) -> Result<Json<Vec<Device>>, ApiError> {
    let devices = devices::low_battery_devices(&app.pool)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(devices))
}

async fn device_stats(
    State(app): State<AppState>,
    uri: Uri,
) -> Result<Json<DeviceStats>, ApiError> {
    let stats = devices::stats(&app.pool, &app.config)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(stats))
}

async fn get_offline_timeout(State(app): State<AppState>) -> Json<OfflineTimeoutConfig> {
    Json(OfflineTimeoutConfig {
        timeout_minutes: app.config.offline_timeout_minutes(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeoutParams {
    timeout_minutes: Option<i64>,
}

async fn set_offline_timeout(
    State(app): State<AppState>,
    uri: Uri,
    Query(params): Query<TimeoutParams>,
) -> Result<Json<OfflineTimeoutConfig>, ApiError> {
    let minutes = params.timeout_minutes.ok_or_else(|| {
        ApiError::new(
            Error::validation(
                codes::GENERAL_VALIDATION_ERROR,
                "missing required parameter",
                "parameter 'timeoutMinutes' is required".to_string(),
            ),
            &uri,
        )
    })?;

    app.config
        .set_offline_timeout_minutes(minutes)
        .map_err(|e| ApiError::new(e, &uri))?;

    Ok(Json(OfflineTimeoutConfig {
        timeout_minutes: minutes,
    }))
}

// ---- sensor data endpoints ----

async fn ingest_reading(
    State(app): State<AppState>,
    uri: Uri,
    Json(input): Json<NewReading>,
) -> Result<(StatusCode, Json<SensorReading>), ApiError> {
    let reading = ingest::ingest(&app.pool, &input)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok((StatusCode::CREATED, Json(reading)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindParams {
    sensor_type: Option<String>,
    device_id: Option<i64>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

async fn find_readings(
    State(app): State<AppState>,
    uri: Uri,
    Query(params): Query<FindParams>,
) -> Result<Json<Vec<SensorReading>>, ApiError> {
    let filter = ReadingFilter {
        sensor_type: params.sensor_type,
        device_id: params.device_id,
        start: params.start,
        end: params.end,
    };
    let readings = query::find(&app.pool, &filter)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(readings))
}

async fn reading_by_id(
    State(app): State<AppState>,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<Json<SensorReading>, ApiError> {
    let reading = query::reading_by_id(&app.pool, id)
        .await
        .map_err(|e| ApiError::new(e, &uri))?
        .ok_or_else(|| ApiError::new(Error::reading_missing(id), &uri))?;
    Ok(Json(reading))
}

async fn latest_by_device(
    State(app): State<AppState>,
    uri: Uri,
    Path(device_id): Path<i64>,
) -> Result<Json<SensorReading>, ApiError> {
    let reading = query::latest_by_device(&app.pool, device_id)
        .await
        .map_err(|e| ApiError::new(e, &uri))?
        .ok_or_else(|| {
            ApiError::new(
                Error::NotFound {
                    code: codes::SENSOR_DATA_NOT_FOUND,
                    message: "no readings for device",
                    details: format!("device {device_id} has no stored readings"),
                },
                &uri,
            )
        })?;
    Ok(Json(reading))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AverageParams {
    sensor_type: Option<String>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

async fn average_value(
    State(app): State<AppState>,
    uri: Uri,
    Query(params): Query<AverageParams>,
) -> Result<Json<f64>, ApiError> {
    let sensor_type = params.sensor_type.ok_or_else(|| {
        ApiError::new(
            Error::validation(
                codes::SENSOR_TYPE_REQUIRED,
                "sensor type is required",
                "parameter 'sensorType' is required".to_string(),
            ),
            &uri,
        )
    })?;

    let (start, end) = match (params.start_date, params.end_date) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            return Err(ApiError::new(
                Error::validation(
                    codes::SENSOR_INVALID_PERIOD,
                    "invalid period",
                    "parameters 'startDate' and 'endDate' are both required".to_string(),
                ),
                &uri,
            ))
        }
    };

    let average = query::average_by_type_and_period(&app.pool, &sensor_type, start, end)
        .await
        .map_err(|e| ApiError::new(e, &uri))?
        .ok_or_else(|| ApiError::new(Error::no_data_for_period(), &uri))?;

    Ok(Json(average))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationRangeParams {
    min_lat: Option<f64>,
    max_lat: Option<f64>,
    min_lng: Option<f64>,
    max_lng: Option<f64>,
}

async fn readings_by_location(
    State(app): State<AppState>,
    uri: Uri,
    Query(params): Query<LocationRangeParams>,
) -> Result<Json<Vec<SensorReading>>, ApiError> {
    let (min_lat, max_lat, min_lng, max_lng) = match (
        params.min_lat,
        params.max_lat,
        params.min_lng,
        params.max_lng,
    ) {
        (Some(min_lat), Some(max_lat), Some(min_lng), Some(max_lng)) => {
            (min_lat, max_lat, min_lng, max_lng)
        }
        _ => {
            return Err(ApiError::new(
                Error::validation(
                    codes::GENERAL_VALIDATION_ERROR,
                    "missing required parameter",
                    "parameters 'minLat', 'maxLat', 'minLng' and 'maxLng' are required"
                        .to_string(),
                ),
                &uri,
            ))
        }
    };

    let readings = query::by_location_range(&app.pool, min_lat, max_lat, min_lng, max_lng)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(readings))
}

async fn devices_by_sensor_type(
    State(app): State<AppState>,
    uri: Uri,
    Path(sensor_type): Path<String>,
) -> Result<Json<Vec<Device>>, ApiError> {
    let devices = query::devices_by_sensor_type(&app.pool, &sensor_type)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(devices))
}

async fn sensor_types(
    State(app): State<AppState>,
    uri: Uri,
) -> Result<Json<Vec<String>>, ApiError> {
    let types = query::sensor_types(&app.pool)
        .await
        .map_err(|e| ApiError::new(e, &uri))?;
    Ok(Json(types))
}

// ---- analytics endpoints ----

async fn bigdata_summary(State(app): State<AppState>, uri: Uri) -> Result<Response, ApiError> {
    if !app.config.analytics_enabled() {
        return Ok(Json(analytics::unavailable()).into_response());
    }

    let snapshot = snapshot(&app, &uri).await?;
    match analytics::summary(&snapshot) {
        Some(stats) => Ok(Json(stats).into_response()),
        None => Err(ApiError::new(Error::no_snapshot_data(), &uri)),
    }
}

async fn bigdata_temporal(State(app): State<AppState>, uri: Uri) -> Result<Response, ApiError> {
    if !app.config.analytics_enabled() {
        return Ok(Json(analytics::unavailable()).into_response());
    }

    let snapshot = snapshot(&app, &uri).await?;
    Ok(Json(analytics::temporal_patterns(&snapshot)).into_response())
}

async fn bigdata_geographic(State(app): State<AppState>, uri: Uri) -> Result<Response, ApiError> {
    if !app.config.analytics_enabled() {
        return Ok(Json(analytics::unavailable()).into_response());
    }

    let snapshot = snapshot(&app, &uri).await?;
    Ok(Json(analytics::geographic_distribution(&snapshot)).into_response())
}

async fn bigdata_performance(State(app): State<AppState>, uri: Uri) -> Result<Response, ApiError> {
    if !app.config.analytics_enabled() {
        return Ok(Json(analytics::unavailable()).into_response());
    }

    let started = Instant::now();
    let snapshot = snapshot(&app, &uri).await?;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match analytics::performance_metrics(&snapshot, elapsed_ms) {
        Some(metrics) => Ok(Json(metrics).into_response()),
        None => Err(ApiError::new(Error::no_snapshot_data(), &uri)),
    }
}

async fn snapshot(app: &AppState, uri: &Uri) -> Result<Vec<SensorReading>, ApiError> {
    query::find(&app.pool, &ReadingFilter::default())
        .await
        .map_err(|e| ApiError::new(e, uri))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(path: &str) -> Uri {
        path.parse().unwrap()
    }

    #[test]
    fn test_validation_error_maps_to_400() {
        let error = Error::validation(
            codes::DEVICE_NAME_REQUIRED,
            "device name is required",
            "field 'name' must not be empty".to_string(),
        );
        let response = ApiError::new(error, &uri("/api/devices")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response =
            ApiError::new(Error::device_missing(999), &uri("/api/devices/999")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_referenced_device_missing_maps_to_400() {
        let response =
            ApiError::new(Error::DeviceNotFound(999999), &uri("/api/sensor-data")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_database_error_maps_to_500() {
        let response = ApiError::new(
            Error::Database(sqlx::Error::PoolClosed),
            &uri("/api/devices"),
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
