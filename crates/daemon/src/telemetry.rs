//! Logging and optional OpenTelemetry export

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Targets are crate paths, so every workspace crate is listed
const DEFAULT_FILTER: &str = "warn,enrich_daemon=info,enrich_core=info,enrich_api_rpc=info,\
enrich_infra_http=info,enrich_infra_sqlite=info";

/// Install the global subscriber.
///
/// # Environment Variables
///
/// - `RUST_LOG`: filter directives (default: workspace crates at `info`)
/// - `ENRICH_LOG_FORMAT`: `pretty` (default) or `json`
/// - `ENRICH_LOG_DIR`: also write daily-rotated JSON logs to this directory
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: export spans (needs the `telemetry` feature)
///
/// The returned guard flushes the file writer and must be held until exit.
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var("ENRICH_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    match log_format.as_str() {
        // Production: JSON structured logging
        "json" => layers.push(fmt::layer().json().boxed()),
        // Development: Pretty formatting with colors
        _ => layers.push(fmt::layer().pretty().boxed()),
    }

    let guard = match std::env::var("ENRICH_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "enrich-daemon.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().json().with_writer(writer).boxed());
            Some(guard)
        }
        Err(_) => None,
    };

    let otel_enabled = match otel_layer()? {
        Some(layer) => {
            layers.push(layer);
            true
        }
        None => false,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    if otel_enabled {
        tracing::info!("OpenTelemetry export enabled");
    } else if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        tracing::warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
        tracing::warn!("Rebuild with: cargo build --features telemetry");
    }

    Ok(guard)
}

#[cfg(not(feature = "telemetry"))]
fn otel_layer() -> Result<Option<BoxedLayer>> {
    Ok(None)
}

#[cfg(feature = "telemetry")]
fn otel_layer() -> Result<Option<BoxedLayer>> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};

    let endpoint = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) => endpoint,
        Err(_) => return Ok(None),
    };
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "enrich-daemon".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(Some(tracing_opentelemetry::layer().with_tracer(tracer).boxed()))
}

/// Flush pending spans
pub fn shutdown() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}
