use crate::telemetry::stdout::create_stdout_layer;
use kura_core::config::Config;
use kura_dataservice::hooks::{Flusher, LogFlusher};
use tracing_subscriber::{prelude::__tracing_subscriber_SubscriberExt, Registry};

use self::otel::create_otel_layer;

pub mod otel;
mod stdout;

/// Installs the tracing subscriber described by the telemetry config. Without any
/// tracing layer configured, logging is handed to log4rs instead.
pub fn setup(config: &Config) -> anyhow::Result<()> {
    if config.telemetry.stdout.is_none() && config.telemetry.opentelemetry.is_none() {
        return kura_core::logging::setup_logging();
    }

    tracing_log::LogTracer::init()?;

    let subscriber = Registry::default()
        .with(create_stdout_layer(config)?)
        .with(create_otel_layer(config)?);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Flushes the log backend, then drains the span exporter so nothing queued is lost on exit.
pub struct TelemetryFlusher;

impl Flusher for TelemetryFlusher {
    fn flush(&self) {
        LogFlusher.flush();
        opentelemetry::global::shutdown_tracer_provider();
    }
}
