//! Telemetry initialization: the tracing subscriber plus optional OpenTelemetry export.
//!
//! Console output is plain text or JSON lines (`log.format`). The filter comes from `RUST_LOG`
//! when set, otherwise from `log.level`.
//!
//! Span export over OTLP/HTTP is off unless `enable_otel_export` is set, and then reads the usual
//! variables: `OTEL_EXPORTER_OTLP_ENDPOINT` (default `http://localhost:4318`),
//! `OTEL_EXPORTER_OTLP_PROTOCOL` (`http/protobuf` or `http/json`), `OTEL_EXPORTER_OTLP_HEADERS`
//! (`key=value` pairs, commas between them, `%20` for spaces) and `OTEL_SERVICE_NAME`.
//!
//! `tracing-opentelemetry` clones the tracer, not the provider, so the provider is kept in a
//! `OnceLock` and shut down explicitly to flush pending spans on exit.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{LogConfig, LogFormat};

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

const DEFAULT_SERVICE_NAME: &str = "adminctl";

/// Build the filter: `RUST_LOG` wins, then `log.level`, then `info`.
fn env_filter(log: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing with optional OpenTelemetry support
pub fn init_telemetry(log: &LogConfig, enable_otel_export: bool) -> anyhow::Result<()> {
    let json = log.format == LogFormat::Json;

    let (otel_layer, otel_error) = if enable_otel_export {
        match create_otlp_tracer() {
            Ok(tracer) => (Some(tracing_opentelemetry::layer().with_tracer(tracer)), None),
            Err(e) => (None, Some(e)),
        }
    } else {
        (None, None)
    };
    let otel_enabled = otel_layer.is_some();

    tracing_subscriber::registry()
        .with(env_filter(log))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .with(otel_layer)
        .try_init()?;

    match otel_error {
        Some(e) => info!("Telemetry initialized without OTLP export: {e}"),
        None => info!(otlp = otel_enabled, format = ?log.format, "Telemetry initialized"),
    }

    Ok(())
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// OTLP/HTTP span exporter configured from the `OTEL_*` variables listed above. The provider is
/// stashed in [`TRACER_PROVIDER`] for [`shutdown_telemetry`].
fn create_otlp_tracer() -> anyhow::Result<opentelemetry_sdk::trace::Tracer> {
    let service_name = env_or("OTEL_SERVICE_NAME", DEFAULT_SERVICE_NAME);
    let endpoint = env_or("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4318");
    let headers = std::env::var("OTEL_EXPORTER_OTLP_HEADERS")
        .map(|raw| parse_otlp_headers(&raw))
        .unwrap_or_default();
    let protocol = match env_or("OTEL_EXPORTER_OTLP_PROTOCOL", "http/protobuf").as_str() {
        "http/json" => Protocol::HttpJson,
        _ => Protocol::HttpBinary,
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(&endpoint)
        .with_protocol(protocol)
        .with_headers(headers)
        .build()?;

    let resource = opentelemetry_sdk::Resource::builder()
        .with_attribute(KeyValue::new("service.name", service_name.clone()))
        .build();
    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer(service_name);
    let _ = TRACER_PROVIDER.set(provider);
    Ok(tracer)
}

/// Flush pending spans. Call once, on the way out.
pub fn shutdown_telemetry() {
    if let Some(provider) = TRACER_PROVIDER.get()
        && let Err(e) = provider.shutdown()
    {
        tracing::error!("Failed to shutdown tracer provider: {}", e);
    }
}

/// `key=value` pairs separated by commas, `%20` standing for a space.
fn parse_otlp_headers(raw: &str) -> HashMap<String, String> {
    raw.replace("%20", " ")
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_otlp_headers() {
        let headers = parse_otlp_headers("Authorization=Basic%20abc, x-team = core,broken");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["Authorization"], "Basic abc");
        assert_eq!(headers["x-team"], "core");
    }
}
