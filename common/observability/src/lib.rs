use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use tracing_subscriber::EnvFilter;

/// Distinct `code` label values tracked before collapsing into [`OVERFLOW_CODE`].
pub const MAX_ERROR_CODES: usize = 40;
pub const OVERFLOW_CODE: &str = "other";

/// Install the fmt subscriber. `RUST_LOG` wins over `default_filter`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// `http_errors_total{service,code,status}` fed from the `X-Error-Code` header.
#[derive(Clone)]
pub struct HttpErrorMetrics {
    service: &'static str,
    http_errors_total: IntCounterVec,
    code_overflow_total: IntCounter,
    seen_codes: Arc<Mutex<HashSet<String>>>,
}

impl HttpErrorMetrics {
    pub fn new(registry: &Registry, service: &'static str) -> prometheus::Result<Self> {
        let http_errors_total = IntCounterVec::new(
            Opts::new(
                "http_errors_total",
                "Count of HTTP error responses emitted (status >= 400)",
            ),
            &["service", "code", "status"],
        )?;
        let code_overflow_total = IntCounter::new(
            "http_error_code_overflow_total",
            "Error responses whose code label was collapsed after the cardinality guard tripped",
        )?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(code_overflow_total.clone()))?;
        Ok(Self {
            service,
            http_errors_total,
            code_overflow_total,
            seen_codes: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn record(&self, code: &str, status: u16) {
        let label = self.code_label(code);
        self.http_errors_total
            .with_label_values(&[self.service, &label, &status.to_string()])
            .inc();
    }

    pub fn count(&self, code: &str, status: u16) -> u64 {
        self.http_errors_total
            .with_label_values(&[self.service, code, &status.to_string()])
            .get()
    }

    pub fn distinct_codes(&self) -> usize {
        match self.seen_codes.lock() {
            Ok(seen) => seen.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn overflow_count(&self) -> u64 {
        self.code_overflow_total.get()
    }

    fn code_label(&self, code: &str) -> String {
        let mut seen = match self.seen_codes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if seen.contains(code) {
            return code.to_string();
        }
        if seen.len() < MAX_ERROR_CODES {
            seen.insert(code.to_string());
            return code.to_string();
        }
        self.code_overflow_total.inc();
        OVERFLOW_CODE.to_string()
    }
}

/// Response middleware; mount with `axum::middleware::from_fn_with_state`.
pub async fn track_http_errors(
    State(metrics): State<HttpErrorMetrics>,
    req: Request,
    next: Next,
) -> Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get("X-Error-Code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        metrics.record(code, status.as_u16());
    }
    resp
}
