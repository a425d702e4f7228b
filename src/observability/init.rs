//! Tracing subscriber setup.

use crate::BridgeConfig;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_sdk::resource::Resource;
use opentelemetry_sdk::trace::TracerProvider;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a global `tracing` subscriber for the bridge.
///
/// The subscriber filters by `RUST_LOG`, falling back to
/// `config.trace_level` and then `"info"`, and forwards spans to an
/// OpenTelemetry tracer named after `config.module_name`.
///
/// Idempotent: if a global subscriber is already set (by an earlier call or
/// by the application), this does nothing.
pub fn init_tracing(config: &BridgeConfig) {
    let level = config
        .trace_level
        .clone()
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        config.module_name.clone(),
    )]);
    let provider = create_tracer_provider(resource);
    let tracer = provider.tracer(config.module_name.clone());

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(OpenTelemetryLayer::new(tracer));

    if subscriber.try_init().is_err() {
        tracing::debug!("global tracing subscriber already set");
    }
}

/// Creates a tracer provider that assigns ids to spans without exporting them.
///
/// Span data is not shipped anywhere: the bridge only needs ids to correlate
/// log records. Applications that export spans install their own provider
/// and subscriber instead of calling [`init_tracing`].
#[must_use]
pub fn create_tracer_provider(resource: Resource) -> TracerProvider {
    TracerProvider::builder()
        .with_config(opentelemetry_sdk::trace::Config::default().with_resource(resource))
        .build()
}
