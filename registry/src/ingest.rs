use chrono::Utc;
use sqlx::PgPool;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{Error, Result};
use crate::metrics::{
    DB_FAILURES_TOTAL, INGEST_LATENCY_SECONDS, READINGS_INGESTED_TOTAL, READINGS_REJECTED_TOTAL,
};
use crate::model::{NewReading, SensorReading};
use crate::validate;

/// Validates and persists a sensor reading, then refreshes the owning
/// device's `last_seen` to the reading's timestamp. All validation happens
/// before the first write; the liveness refresh is a second statement and a
/// failure there leaves the stored reading in place.
pub async fn ingest(pool: &PgPool, input: &NewReading) -> Result<SensorReading> {
    let fields = match validate::new_reading(input) {
        Ok(fields) => fields,
        Err(e) => {
            READINGS_REJECTED_TOTAL.inc();
            return Err(e);
        }
    };

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM devices WHERE id = $1")
        .bind(fields.device_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        READINGS_REJECTED_TOTAL.inc();
        return Err(Error::DeviceNotFound(fields.device_id));
    }

    let now = Utc::now();
    let timestamp = fields.timestamp.unwrap_or(now);
    let start = Instant::now();

    let reading = sqlx::query_as::<_, SensorReading>(
        r#"
        INSERT INTO sensor_readings
            (device_id, sensor_type, value, unit, timestamp, latitude, longitude, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(fields.device_id)
    .bind(&fields.sensor_type)
    .bind(fields.value)
    .bind(&fields.unit)
    .bind(timestamp)
    .bind(fields.latitude)
    .bind(fields.longitude)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        DB_FAILURES_TOTAL.inc();
        e
    })?;

    // Liveness follows the measurement time, not the ingestion wall clock,
    // so back-dated batches land with the device's true last activity.
    let update = sqlx::query("UPDATE devices SET last_seen = $2 WHERE id = $1")
        .bind(reading.device_id)
        .bind(reading.timestamp)
        .execute(pool)
        .await;
    if let Err(e) = update {
        DB_FAILURES_TOTAL.inc();
        warn!(
            "reading {} stored but last_seen update for device {} failed: {}",
            reading.id, reading.device_id, e
        );
    }

    READINGS_INGESTED_TOTAL.inc();
    INGEST_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
    debug!(
        "ingested reading {} for device {} ({} = {})",
        reading.id, reading.device_id, reading.sensor_type, reading.value
    );

    Ok(reading)
}
