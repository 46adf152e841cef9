use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::errors::Result;
use crate::model::{Device, SensorReading};

/// Independently optional filters, AND-combined. An empty filter matches
/// everything.
#[derive(Debug, Default)]
pub struct ReadingFilter {
    pub sensor_type: Option<String>,
    pub device_id: Option<i64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

pub async fn find(pool: &PgPool, filter: &ReadingFilter) -> Result<Vec<SensorReading>> {
    let mut conditions: Vec<String> = Vec::new();

    if filter.sensor_type.is_some() {
        conditions.push(format!("sensor_type = ${}", conditions.len() + 1));
    }
    if filter.device_id.is_some() {
        conditions.push(format!("device_id = ${}", conditions.len() + 1));
    }
    if filter.start.is_some() {
        conditions.push(format!("timestamp >= ${}", conditions.len() + 1));
    }
    if filter.end.is_some() {
        conditions.push(format!("timestamp <= ${}", conditions.len() + 1));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let query = format!(
        "SELECT * FROM sensor_readings {} ORDER BY timestamp DESC",
        where_clause
    );

    let mut query_builder = sqlx::query_as::<_, SensorReading>(&query);
    if let Some(sensor_type) = &filter.sensor_type {
        query_builder = query_builder.bind(sensor_type);
    }
    if let Some(device_id) = filter.device_id {
        query_builder = query_builder.bind(device_id);
    }
    if let Some(start) = filter.start {
        query_builder = query_builder.bind(start);
    }
    if let Some(end) = filter.end {
        query_builder = query_builder.bind(end);
    }

    Ok(query_builder.fetch_all(pool).await?)
}

pub async fn reading_by_id(pool: &PgPool, id: i64) -> Result<Option<SensorReading>> {
    let reading = sqlx::query_as::<_, SensorReading>("SELECT * FROM sensor_readings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(reading)
}

pub async fn latest_by_device(pool: &PgPool, device_id: i64) -> Result<Option<SensorReading>> {
    let reading = sqlx::query_as::<_, SensorReading>(
        "SELECT * FROM sensor_readings WHERE device_id = $1 ORDER BY timestamp DESC LIMIT 1",
    )
    .bind(device_id)
    .fetch_optional(pool)
    .await?;
    Ok(reading)
}

/// Arithmetic mean over (sensor type, period); None when nothing matched.
pub async fn average_by_type_and_period(
    pool: &PgPool,
    sensor_type: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Option<f64>> {
    let average: Option<f64> = sqlx::query_scalar(
        "SELECT AVG(value) FROM sensor_readings WHERE sensor_type = $1 AND timestamp BETWEEN $2 AND $3",
    )
    .bind(sensor_type)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;
    Ok(average)
}

/// Inclusive bounding box. Bounds are taken as given: inverted bounds match
/// nothing. Readings without coordinates never match.
pub async fn by_location_range(
    pool: &PgPool,
    min_lat: f64,
    max_lat: f64,
    min_lng: f64,
    max_lng: f64,
) -> Result<Vec<SensorReading>> {
    let readings = sqlx::query_as::<_, SensorReading>(
        r#"
        SELECT * FROM sensor_readings
        WHERE latitude BETWEEN $1 AND $2 AND longitude BETWEEN $3 AND $4
        ORDER BY timestamp DESC
        "#,
    )
    .bind(min_lat)
    .bind(max_lat)
    .bind(min_lng)
    .bind(max_lng)
    .fetch_all(pool)
    .await?;
    Ok(readings)
}

/// Distinct devices that have ever produced a reading of the given type.
pub async fn devices_by_sensor_type(pool: &PgPool, sensor_type: &str) -> Result<Vec<Device>> {
    let devices = sqlx::query_as::<_, Device>(
        r#"
        SELECT DISTINCT d.*
        FROM devices d
        JOIN sensor_readings r ON r.device_id = d.id
        WHERE r.sensor_type = $1
        ORDER BY d.id
        "#,
    )
    .bind(sensor_type)
    .fetch_all(pool)
    .await?;
    Ok(devices)
}

pub async fn sensor_types(pool: &PgPool) -> Result<Vec<String>> {
    let types: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT sensor_type FROM sensor_readings ORDER BY sensor_type")
            .fetch_all(pool)
            .await?;
    Ok(types)
}
