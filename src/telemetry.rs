use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::{Protocol, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{SERVICE_NAME, SERVICE_VERSION},
    resource::DEPLOYMENT_ENVIRONMENT_NAME,
};
use rocket::{
    Data, Request, Response,
    fairing::{Fairing, Info, Kind},
};
use std::time::Instant;
use tracing::{Span, field, info_span};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Opens one span per request and logs the outcome when the response leaves.
pub struct TelemetryFairing;

#[rocket::async_trait]
impl Fairing for TelemetryFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request tracing",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let method = request.method().to_string();
        let uri = request.uri().path().to_string();

        let span = info_span!(
            "http_request",
            otel.name = format!("{} {}", method, uri),
            http.method = %method,
            http.uri = %uri,
            http.status_code = field::Empty,
            http.duration_ms = field::Empty,
        );

        request.local_cache(|| (span, Instant::now()));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let (span, start_time) = request.local_cache(|| (Span::none(), Instant::now()));

        let duration = start_time.elapsed();
        let status = response.status().code;

        span.record("http.status_code", status);
        span.record("http.duration_ms", duration.as_millis() as i64);

        let _entered = span.enter();
        tracing::info!(
            "Completed {} {} in {}ms with status {}",
            request.method(),
            request.uri().path(),
            duration.as_millis(),
            status
        );
    }
}

fn resource() -> Resource {
    let environment =
        dotenvy::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

    Resource::builder()
        .with_schema_url(
            [
                KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, environment),
            ],
            SCHEMA_URL,
        )
        .build()
}

fn init_tracer_provider(endpoint: &str) -> Option<SdkTracerProvider> {
    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_protocol(Protocol::Grpc);

    if endpoint.starts_with("https://") {
        builder = builder
            .with_tls_config(tonic::transport::ClientTlsConfig::new().with_native_roots());
    }

    let exporter = match builder.build() {
        Ok(exporter) => exporter,
        Err(err) => {
            eprintln!("Failed to build OTLP exporter for {}: {}", endpoint, err);
            return None;
        }
    };

    Some(
        SdkTracerProvider::builder()
            .with_sampler(Sampler::AlwaysOn)
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(resource())
            .with_batch_exporter(exporter)
            .build(),
    )
}

pub struct OtelGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

/// Installs the global subscriber: `RUST_LOG`-filtered console output, plus
/// OTLP export when an endpoint is configured.
pub fn init_tracing() -> OtelGuard {
    let tracer_provider = dotenvy::var(OTLP_ENDPOINT_VAR)
        .ok()
        .filter(|endpoint| !endpoint.is_empty())
        .and_then(|endpoint| init_tracer_provider(&endpoint));

    let otel_layer = tracer_provider
        .as_ref()
        .map(|provider| OpenTelemetryLayer::new(provider.tracer(env!("CARGO_PKG_NAME"))));

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .try_init();

    if tracer_provider.is_some() {
        tracing::info!("Exporting traces over OTLP");
    }

    OtelGuard { tracer_provider }
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(err) = provider.shutdown() {
                eprintln!("Failed to shut down tracer provider: {:?}", err);
            }
        }
    }
}
