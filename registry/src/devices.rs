use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::debug;

use crate::config::RuntimeConfig;
use crate::errors::{Error, Result};
use crate::metrics::{DEVICES_CREATED_TOTAL, HEARTBEATS_TOTAL};
use crate::model::{Device, DeviceStats, DeviceUpdate, NewDevice};
use crate::validate;

/// Devices reporting less battery than this are flagged by the low-battery
/// listing. Unlike the offline timeout this is not configurable.
const LOW_BATTERY_THRESHOLD: i32 = 20;

/// Registers a device. A caller-supplied active flag is ignored: new devices
/// always come up active, with `last_seen` set to the registration time.
pub async fn create_device(pool: &PgPool, input: &NewDevice) -> Result<Device> {
    let fields = validate::new_device(input)?;
    if input.active == Some(false) {
        debug!("ignoring caller-supplied active=false, new devices start active");
    }
    let now = Utc::now();

    let device = sqlx::query_as::<_, Device>(
        r#"
        INSERT INTO devices
            (name, type, location, active, last_seen, battery_level, signal_strength, created_at, updated_at)
        VALUES ($1, $2, $3, TRUE, $4, $5, $6, $4, $4)
        RETURNING *
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.device_type)
    .bind(&fields.location)
    .bind(now)
    .bind(fields.battery_level)
    .bind(fields.signal_strength)
    .fetch_one(pool)
    .await?;

    DEVICES_CREATED_TOTAL.inc();
    Ok(device)
}

pub async fn get_device(pool: &PgPool, id: i64) -> Result<Option<Device>> {
    let device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(device)
}

pub async fn list_devices(pool: &PgPool) -> Result<Vec<Device>> {
    let devices = sqlx::query_as::<_, Device>("SELECT * FROM devices ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(devices)
}

/// Partial update: provided fields overwrite, absent fields are untouched.
pub async fn update_device(pool: &PgPool, id: i64, input: &DeviceUpdate) -> Result<Device> {
    let update = validate::device_update(input)?;

    sqlx::query_as::<_, Device>(
        r#"
        UPDATE devices
        SET name            = COALESCE($2, name),
            type            = COALESCE($3, type),
            location        = COALESCE($4, location),
            active          = COALESCE($5, active),
            battery_level   = COALESCE($6, battery_level),
            signal_strength = COALESCE($7, signal_strength),
            updated_at      = $8
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(update.name)
    .bind(update.device_type)
    .bind(update.location)
    .bind(update.active)
    .bind(update.battery_level)
    .bind(update.signal_strength)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::device_missing(id))
}

/// Liveness signal: refreshes `last_seen` unconditionally, battery and signal
/// only when reported.
pub async fn heartbeat(
    pool: &PgPool,
    id: i64,
    battery_level: Option<i32>,
    signal_strength: Option<i32>,
) -> Result<Device> {
    validate::status_fields(battery_level, signal_strength)?;

    let device = sqlx::query_as::<_, Device>(
        r#"
        UPDATE devices
        SET last_seen       = $2,
            battery_level   = COALESCE($3, battery_level),
            signal_strength = COALESCE($4, signal_strength),
            updated_at      = $2
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(Utc::now())
    .bind(battery_level)
    .bind(signal_strength)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::device_missing(id))?;

    HEARTBEATS_TOTAL.inc();
    Ok(device)
}

pub async fn toggle_active(pool: &PgPool, id: i64) -> Result<Device> {
    sqlx::query_as::<_, Device>(
        "UPDATE devices SET active = NOT active, updated_at = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::device_missing(id))
}

/// Idempotent delete: false when the id was already absent.
pub async fn delete_device(pool: &PgPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM devices WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn devices_by_type(pool: &PgPool, device_type: &str) -> Result<Vec<Device>> {
    let devices = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE type = $1 ORDER BY id")
        .bind(device_type)
        .fetch_all(pool)
        .await?;
    Ok(devices)
}

pub async fn active_devices(pool: &PgPool) -> Result<Vec<Device>> {
    let devices = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE active ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(devices)
}

/// Case-insensitive substring match on the location field.
pub async fn devices_by_location(pool: &PgPool, location: &str) -> Result<Vec<Device>> {
    let devices = sqlx::query_as::<_, Device>(
        "SELECT * FROM devices WHERE location ILIKE '%' || $1 || '%' ORDER BY id",
    )
    .bind(location)
    .fetch_all(pool)
    .await?;
    Ok(devices)
}

/// Devices not seen within the configured timeout. The timeout is read at
/// call time, so a config change applies to the next query immediately.
pub async fn offline_devices(pool: &PgPool, config: &RuntimeConfig) -> Result<Vec<Device>> {
    let threshold = offline_threshold(Utc::now(), config.offline_timeout_minutes());
    let devices =
        sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE last_seen < $1 ORDER BY id")
            .bind(threshold)
            .fetch_all(pool)
            .await?;
    Ok(devices)
}

pub async fn low_battery_devices(pool: &PgPool) -> Result<Vec<Device>> {
    let devices =
        sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE battery_level < $1 ORDER BY id")
            .bind(LOW_BATTERY_THRESHOLD)
            .fetch_all(pool)
            .await?;
    Ok(devices)
}

/// Computed on demand; the offline count re-runs the liveness scan.
pub async fn stats(pool: &PgPool, config: &RuntimeConfig) -> Result<DeviceStats> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices")
        .fetch_one(pool)
        .await?;
    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices WHERE active")
        .fetch_one(pool)
        .await?;
    let offline = offline_devices(pool, config).await?.len() as i64;

    Ok(DeviceStats {
        total,
        active,
        offline,
    })
}

fn offline_threshold(now: DateTime<Utc>, timeout_minutes: i64) -> DateTime<Utc> {
    now - Duration::minutes(timeout_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_threshold() {
        let now = Utc::now();
        assert_eq!(offline_threshold(now, 30), now - Duration::minutes(30));
    }

    #[test]
    fn test_offline_threshold_monotonic_in_timeout() {
        // At a fixed instant a larger timeout can only move the threshold
        // further into the past, shrinking the offline set.
        let now = Utc::now();
        assert!(offline_threshold(now, 60) < offline_threshold(now, 30));
        assert!(offline_threshold(now, 30) < offline_threshold(now, 1));
    }
}
