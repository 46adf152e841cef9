use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref DEVICES_CREATED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "registry_devices_created_total",
        "Total devices registered"
    ))
    .unwrap();
    pub static ref HEARTBEATS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "registry_heartbeats_total",
        "Total device heartbeats received"
    ))
    .unwrap();
    pub static ref READINGS_INGESTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "registry_readings_ingested_total",
        "Total sensor readings persisted"
    ))
    .unwrap();
    pub static ref READINGS_REJECTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "registry_readings_rejected_total",
        "Total sensor readings rejected before persistence"
    ))
    .unwrap();
    pub static ref DB_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "registry_db_failures_total",
        "Total database write failures"
    ))
    .unwrap();
    pub static ref INGEST_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "registry_ingest_latency_seconds",
            "Time taken to persist a reading and update device liveness"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY
        .register(Box::new(DEVICES_CREATED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(HEARTBEATS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(READINGS_INGESTED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(READINGS_REJECTED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(DB_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(INGEST_LATENCY_SECONDS.clone()))
        .unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
