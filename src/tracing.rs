//! Logging and optional OpenTelemetry export
//!
//! Console logging is always installed. When an OTLP endpoint is configured,
//! spans (one per prompt round, one per attempt, one per LLM call) are also
//! exported so a round can be followed by its `trace_id`:
//!
//! ```text
//! attck-pe → OTLP (gRPC) → OTel Collector → Tempo (traces)
//! ```

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,attck_pe=debug";

/// Initialize the tracing subsystem
///
/// This sets up:
/// - Console logging (level from `RUST_LOG`, default [`DEFAULT_LOG_FILTER`])
/// - OpenTelemetry trace export, only when `otlp_endpoint` is given
///
/// # Arguments
/// * `service_name` - Name for the service in traces
/// * `otlp_endpoint` - Optional OTLP endpoint URL (e.g. "http://localhost:4317")
pub fn init_tracing(
    service_name: &str,
    otlp_endpoint: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let otel_layer = match otlp_endpoint {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint);

            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(exporter)
                .with_trace_config(
                    sdktrace::Config::default().with_resource(Resource::new(vec![
                        KeyValue::new("service.name", service_name.to_string()),
                        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    ])),
                )
                .install_batch(runtime::Tokio)?;

            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::info!(
        service = service_name,
        otlp = otlp_endpoint.unwrap_or("disabled"),
        "Tracing initialized"
    );

    Ok(())
}

/// Shutdown the tracing subsystem gracefully
///
/// Flushes any pending spans to the collector
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
    tracing::info!("OpenTelemetry tracing shutdown complete");
}
