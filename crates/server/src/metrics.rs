use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref USERS_CREATED_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "admissions_users_created_total",
        "Total number of users registered."
    ))
    .unwrap();
    pub static ref USERS_ACCEPTED_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "admissions_users_accepted_total",
        "Total number of users that completed the full flow."
    ))
    .unwrap();
    pub static ref USERS_REJECTED_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "admissions_users_rejected_total",
        "Total number of users rejected by a failed condition."
    ))
    .unwrap();
    pub static ref TASKS_COMPLETED_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "admissions_tasks_completed_total",
        "Total number of tasks marked as completed."
    ))
    .unwrap();
}

pub fn register_metrics() {
    for counter in [
        &*USERS_CREATED_TOTAL,
        &*USERS_ACCEPTED_TOTAL,
        &*USERS_REJECTED_TOTAL,
        &*TASKS_COMPLETED_TOTAL,
    ] {
        // Registering twice is fine in tests; ignore the duplicate error.
        let _ = REGISTRY.register(Box::new(counter.clone()));
    }
}

pub fn gather_metrics() -> String {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}
