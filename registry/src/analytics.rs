use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::SensorReading;

/// Returned by every analytics endpoint while the capability is switched off.
#[derive(Debug, Serialize)]
pub struct Unavailable {
    pub error: &'static str,
    pub message: &'static str,
}

pub fn unavailable() -> Unavailable {
    Unavailable {
        error: "analytics engine is not available",
        message: "start the service with ANALYTICS_ENABLED=true to enable analytics endpoints",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub average_value: f64,
    pub max_value: f64,
    pub min_value: f64,
    pub total_records: u64,
    pub sensor_type_distribution: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalPattern {
    pub sensor_type: String,
    pub date: String,
    pub avg_value: f64,
    pub readings_count: u64,
    pub value_stddev: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalPatterns {
    pub temporal_patterns: Vec<TemporalPattern>,
    pub total_patterns: usize,
    pub analysis_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeographicDistribution {
    pub geographic_distribution: BTreeMap<String, f64>,
    pub total_locations: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_records: u64,
    pub average_value: f64,
    pub processing_time_ms: u64,
    pub throughput: f64,
}

/// Descriptive statistics over a full snapshot; None when it is empty.
pub fn summary(readings: &[SensorReading]) -> Option<SummaryStats> {
    let average_value = mean(readings)?;

    let mut max_value = f64::MIN;
    let mut min_value = f64::MAX;
    let mut sensor_type_distribution: BTreeMap<String, u64> = BTreeMap::new();
    for reading in readings {
        max_value = max_value.max(reading.value);
        min_value = min_value.min(reading.value);
        *sensor_type_distribution
            .entry(reading.sensor_type.clone())
            .or_insert(0) += 1;
    }

    Some(SummaryStats {
        average_value,
        max_value,
        min_value,
        total_records: readings.len() as u64,
        sensor_type_distribution,
    })
}

/// Per (sensor type, calendar day) average, count and sample stddev, ordered
/// by sensor type then date.
pub fn temporal_patterns(readings: &[SensorReading]) -> TemporalPatterns {
    let mut groups: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
    for reading in readings {
        let key = (
            reading.sensor_type.clone(),
            reading.timestamp.format("%Y-%m-%d").to_string(),
        );
        groups.entry(key).or_default().push(reading.value);
    }

    let temporal_patterns: Vec<TemporalPattern> = groups
        .into_iter()
        .map(|((sensor_type, date), values)| {
            let count = values.len() as u64;
            let avg = values.iter().sum::<f64>() / values.len() as f64;
            TemporalPattern {
                sensor_type,
                date,
                avg_value: avg,
                readings_count: count,
                value_stddev: sample_stddev(&values),
            }
        })
        .collect();

    TemporalPatterns {
        total_patterns: temporal_patterns.len(),
        temporal_patterns,
        analysis_type: "Temporal patterns by sensor type and date",
    }
}

/// Average value per coordinate-sign quadrant. Readings without both
/// coordinates land in the Unknown bucket.
pub fn geographic_distribution(readings: &[SensorReading]) -> GeographicDistribution {
    let mut sums: BTreeMap<&'static str, (f64, u64)> = BTreeMap::new();
    for reading in readings {
        let region = region_for(reading.latitude, reading.longitude);
        let entry = sums.entry(region).or_insert((0.0, 0));
        entry.0 += reading.value;
        entry.1 += 1;
    }

    let geographic_distribution: BTreeMap<String, f64> = sums
        .into_iter()
        .map(|(region, (sum, count))| (region.to_string(), sum / count as f64))
        .collect();

    GeographicDistribution {
        total_locations: geographic_distribution.len(),
        geographic_distribution,
    }
}

pub fn performance_metrics(
    readings: &[SensorReading],
    processing_time_ms: u64,
) -> Option<PerformanceMetrics> {
    let average_value = mean(readings)?;
    let seconds = (processing_time_ms as f64 / 1000.0).max(0.001);
    Some(PerformanceMetrics {
        total_records: readings.len() as u64,
        average_value,
        processing_time_ms,
        throughput: readings.len() as f64 / seconds,
    })
}

fn mean(readings: &[SensorReading]) -> Option<f64> {
    if readings.is_empty() {
        return None;
    }
    Some(readings.iter().map(|r| r.value).sum::<f64>() / readings.len() as f64)
}

fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn region_for(latitude: Option<f64>, longitude: Option<f64>) -> &'static str {
    match (latitude, longitude) {
        (Some(lat), Some(lng)) => {
            if lat > 0.0 {
                if lng > 0.0 {
                    "Northeast"
                } else {
                    "Northwest"
                }
            } else if lng > 0.0 {
                "Southeast"
            } else {
                "Southwest"
            }
        }
        _ => "Unknown",
    }
}
