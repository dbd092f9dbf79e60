//! Tracing and OpenTelemetry setup.
//!
//! Spans from the client pipeline (`request`, cache and governor calls) are
//! exported through the OpenTelemetry stdout exporter, while events go to a
//! human-readable fmt layer on stderr so command output on stdout stays clean.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use opentelemetry_stdout::SpanExporter;
use palisade_error::{ConfigError, PalisadeResult};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Flushes exported spans when dropped.
///
/// Hold it for the life of the program.
#[derive(Debug)]
#[must_use = "dropping the guard shuts the tracer provider down"]
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    /// The `service.name` attached to exported spans.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        shutdown_telemetry();
    }
}

/// `RUST_LOG` when set and valid, otherwise `default_directive`.
fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install a global subscriber exporting spans as `service_name`.
///
/// `default_directive` (for example `"info"` or `"palisade=debug"`) applies
/// when `RUST_LOG` is unset or unparsable.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_telemetry(
    service_name: &str,
    default_directive: &str,
) -> PalisadeResult<TelemetryGuard> {
    let provider = TracerProvider::builder()
        .with_simple_exporter(SpanExporter::default())
        .with_id_generator(RandomIdGenerator::default())
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.to_string(),
        )]))
        .build();
    let tracer = provider.tracer("palisade");

    tracing_subscriber::registry()
        .with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer)
                .with_filter(filter(default_directive)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter(default_directive)),
        )
        .try_init()
        .map_err(|e| ConfigError::new(format!("Failed to initialize tracing: {}", e)))?;

    opentelemetry::global::set_tracer_provider(provider);
    tracing::debug!(service_name, "Telemetry initialized");

    Ok(TelemetryGuard {
        service_name: service_name.to_string(),
    })
}

/// Flush pending spans and shut the global tracer provider down.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}
