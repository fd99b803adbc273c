use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

lazy_static! {
    static ref CONNECTION_ATTEMPT_COUNT: IntCounterVec = IntCounterVec::new(
        Opts::new("connection_attempt_count", "Data Service Connection Attempt Count")
            .namespace("kura_dataservice"),
        &["host"]
    )
    .expect("failed to initialize metric: CONNECTION_ATTEMPT_COUNT");
    static ref CONNECTION_FAILURE_COUNT: IntCounterVec = IntCounterVec::new(
        Opts::new("connection_failure_count", "Data Service Connection Failure Count")
            .namespace("kura_dataservice"),
        &["host", "code"]
    )
    .expect("failed to initialize metric: CONNECTION_FAILURE_COUNT");
    static ref ROLE_MISMATCH_COUNT: IntCounter = IntCounter::with_opts(
        Opts::new("role_mismatch_count", "Failover Role Mismatch Count")
            .namespace("kura_dataservice")
    )
    .expect("failed to initialize metric: ROLE_MISMATCH_COUNT");
    static ref DATA_SERVICE_START_FAILURE_COUNT: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "data_service_start_failure_count",
            "Data Service Start Failure Count"
        )
        .namespace("kura_dataservice"),
        &["host", "code"]
    )
    .expect("failed to initialize metric: DATA_SERVICE_START_FAILURE_COUNT");
    static ref RETRY_BACKOFF_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("retry_backoff_duration", "Retry Loop Backoff Duration")
            .namespace("kura_dataservice")
    )
    .expect("failed to initialize metric: RETRY_BACKOFF_DURATION");
}

pub fn connection_attempt_metric() -> &'static IntCounterVec {
    &CONNECTION_ATTEMPT_COUNT
}

pub fn connection_failure_metric() -> &'static IntCounterVec {
    &CONNECTION_FAILURE_COUNT
}

pub fn role_mismatch_metric() -> &'static IntCounter {
    &ROLE_MISMATCH_COUNT
}

pub fn data_service_start_failure_metric() -> &'static IntCounterVec {
    &DATA_SERVICE_START_FAILURE_COUNT
}

pub fn retry_backoff_duration_metric() -> &'static Histogram {
    &RETRY_BACKOFF_DURATION
}
