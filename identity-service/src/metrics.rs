use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use common_observability::HttpErrorMetrics;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub const SERVICE_NAME: &str = "identity-service";

#[derive(Clone)]
pub struct IdentityMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    refresh_attempts: IntCounterVec,
    http_errors: HttpErrorMetrics,
}

impl IdentityMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "auth_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let refresh_attempts = IntCounterVec::new(
            Opts::new(
                "auth_refresh_attempts_total",
                "Count of token refresh attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(refresh_attempts.clone()))?;

        let http_errors = HttpErrorMetrics::new(&registry, SERVICE_NAME)?;

        Ok(Self {
            registry,
            login_attempts,
            refresh_attempts,
            http_errors,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn refresh_attempt(&self, outcome: &str) {
        self.refresh_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn login_count(&self, outcome: &str) -> u64 {
        self.login_attempts.with_label_values(&[outcome]).get()
    }

    pub fn http_errors(&self) -> &HttpErrorMetrics {
        &self.http_errors
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
