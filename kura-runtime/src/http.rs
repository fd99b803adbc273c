use actix_web::{get, web, App, HttpServer};
use kura_core::config::telemetry::Prometheus;
use lazy_static::lazy_static;
use prometheus::Registry;
use std::sync::Once;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
    static ref REGISTER_ONCE: Once = Once::new();
}

fn encode(families: &[prometheus::proto::MetricFamily]) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(families, &mut buffer) {
        tracing::error!("could not encode metrics: {}", e);
    };

    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("metrics could not be parsed with utf8: {}", e);
            String::default()
        }
    }
}

#[get("/metrics")]
async fn get_metrics() -> String {
    let mut res = encode(&REGISTRY.gather());
    res.push_str(&encode(&prometheus::gather()));

    res
}

fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(kura_dataservice::metric::connection_attempt_metric().clone()),
        Box::new(kura_dataservice::metric::connection_failure_metric().clone()),
        Box::new(kura_dataservice::metric::role_mismatch_metric().clone()),
        Box::new(kura_dataservice::metric::data_service_start_failure_metric().clone()),
        Box::new(kura_dataservice::metric::retry_backoff_duration_metric().clone()),
    ];

    for collector in collectors {
        if let Err(e) = REGISTRY.register(collector) {
            tracing::error!("failed to register metric: {}", e);
        }
    }
}

/// Serves `/prometheus/metrics` until the process exits.
pub async fn start_server(config: Prometheus) -> anyhow::Result<()> {
    REGISTER_ONCE.call_once(register_metrics);

    let server = HttpServer::new(|| {
        App::new()
            .wrap(actix_web::middleware::NormalizePath::default())
            .wrap(actix_cors::Cors::permissive())
            .service(web::scope("/prometheus").service(get_metrics))
    })
    .workers(1)
    .bind((config.address.clone(), config.http_port))?;

    tracing::info!(
        "serving metrics on http://{}:{}/prometheus/metrics",
        config.address,
        config.http_port
    );

    server.run().await?;

    Ok(())
}
