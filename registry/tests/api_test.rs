//! End-to-end smoke test against a running instance. Requires the service
//! and its database:
//!
//!   DATABASE_URL=... cargo run -p registry
//!   cargo test -p registry -- --ignored
//!
//! Override the target with REGISTRY_URL (default http://localhost:8080).

use chrono::{Duration, Utc};
use serde_json::{json, Value};

fn base_url() -> String {
    std::env::var("REGISTRY_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[tokio::test]
#[ignore]
async fn test_device_lifecycle_and_ingestion() {
    let base = base_url();
    let client = reqwest::Client::new();
    let suffix: u32 = rand::random();

    // Register a device; a caller-supplied active=false must be overridden.
    let response = client
        .post(format!("{base}/api/devices"))
        .json(&json!({
            "name": format!("smoke-weather-{suffix}"),
            "type": "WEATHER_SENSOR",
            "location": "Park",
            "active": false,
            "batteryLevel": 50
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let device: Value = response.json().await.unwrap();
    let device_id = device["id"].as_i64().unwrap();
    assert_eq!(device["active"], true);
    assert_eq!(device["batteryLevel"], 50);
    assert!(device["lastSeen"].is_string());

    // Fetch it back by id.
    let fetched: Value = client
        .get(format!("{base}/api/devices/{device_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["name"], device["name"]);
    assert_eq!(fetched["type"], "WEATHER_SENSOR");

    // Heartbeat without status fields still refreshes last_seen.
    let response = client
        .post(format!("{base}/api/devices/{device_id}/heartbeat"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let after_heartbeat: Value = response.json().await.unwrap();
    assert_eq!(after_heartbeat["batteryLevel"], 50);
    assert!(after_heartbeat["lastSeen"].as_str() >= device["lastSeen"].as_str());

    // Ingest a reading and read it back as the device's latest.
    let response = client
        .post(format!("{base}/api/sensor-data"))
        .json(&json!({
            "deviceId": device_id,
            "sensorType": "TEMPERATURE",
            "value": 25.5,
            "unit": "CELSIUS"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let reading: Value = response.json().await.unwrap();

    let latest: Value = client
        .get(format!("{base}/api/sensor-data/latest/device/{device_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(latest["id"], reading["id"]);
    assert_eq!(latest["value"], 25.5);

    // A back-dated reading pulls last_seen to the measurement time.
    let past = (Utc::now() - Duration::hours(6))
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let response = client
        .post(format!("{base}/api/sensor-data"))
        .json(&json!({
            "deviceId": device_id,
            "sensorType": "HUMIDITY",
            "value": 60.0,
            "unit": "PERCENTAGE",
            "timestamp": past
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let after_backdate: Value = client
        .get(format!("{base}/api/devices/{device_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let last_seen = after_backdate["lastSeen"].as_str().unwrap();
    assert!(last_seen.starts_with(&past[..16]), "lastSeen = {last_seen}, expected ~{past}");

    // Cleanup: delete is idempotent.
    let response = client
        .delete(format!("{base}/api/devices/{device_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = client
        .delete(format!("{base}/api/devices/{device_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_rejections() {
    let base = base_url();
    let client = reqwest::Client::new();

    // Unknown device blocks ingestion with the dependent-entity code.
    let response = client
        .post(format!("{base}/api/sensor-data"))
        .json(&json!({
            "deviceId": 999_999_999,
            "sensorType": "TEMPERATURE",
            "value": 1.0
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["errorCode"], "SENSOR_011");
    assert_eq!(body["path"], "/api/sensor-data");

    // Non-positive offline timeout is rejected and leaves config unchanged.
    let before: Value = client
        .get(format!("{base}/api/devices/config/offline-timeout"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = client
        .put(format!(
            "{base}/api/devices/config/offline-timeout?timeoutMinutes=0"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["errorCode"], "DEVICE_010");

    let after: Value = client
        .get(format!("{base}/api/devices/config/offline-timeout"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after["timeoutMinutes"], before["timeoutMinutes"]);

    // Average requires the full (type, period) triple.
    let response = client
        .get(format!(
            "{base}/api/sensor-data/average?sensorType=TEMPERATURE"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["errorCode"], "SENSOR_013");

    // Inverted bounding box is taken literally and matches nothing.
    let response = client
        .get(format!(
            "{base}/api/sensor-data/location-range?minLat=10&maxLat=-10&minLng=0&maxLng=1"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 0);
}
