use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::SecondsFormat;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::aggregate::{AggregateError, Aggregator, DiagnosticRun, SourceResults, Summary};
use crate::classify::{Classifier, Comparison, Recommendation};
use crate::config::DiagnosticsConfig;
use crate::fetch::{HttpTransport, RetryingFetcher};
use crate::probe::sources_from_config;

#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<Aggregator>,
    classifier: Arc<Classifier>,
}

impl AppState {
    pub fn new(aggregator: Aggregator, classifier: Classifier) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            classifier: Arc::new(classifier),
        }
    }

    /// Production wiring: reqwest transport, configured retry policy and the
    /// reference sources.
    pub fn from_config(cfg: &DiagnosticsConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(&cfg.fetch)?;
        let fetcher = RetryingFetcher::new(Arc::new(transport), cfg.retry_policy())
            .with_request_timeout(cfg.request_timeout());
        let aggregator = Aggregator::new(Arc::new(fetcher), sources_from_config(cfg))
            .with_probe_timeout(cfg.probe_timeout());
        let classifier = Classifier::new(cfg.expectations.clone(), cfg.classify.healthy_floor);
        Ok(Self::new(aggregator, classifier))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/debug", get(debug_report))
        .route("/api/diagnostics", get(classified_report))
        // answers every OPTIONS request with an empty 200
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportEnvelope<'a> {
    success: bool,
    timestamp: String,
    execution_time: String,
    results: &'a SourceResults,
    summary: &'a Summary,
}

impl<'a> ReportEnvelope<'a> {
    fn from_run(run: &'a DiagnosticRun) -> Self {
        Self {
            success: true,
            timestamp: run.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            execution_time: format!("{}ms", run.elapsed.as_millis()),
            results: &run.report.results,
            summary: &run.report.summary,
        }
    }
}

#[derive(Serialize)]
struct ClassifiedEnvelope<'a> {
    #[serde(flatten)]
    report: ReportEnvelope<'a>,
    comparison: Vec<Comparison>,
    recommendations: Vec<Recommendation>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

fn internal_error(err: &AggregateError) -> Response {
    tracing::error!(target: "diagnostics", error = %err, "diagnostics run failed");
    let body = ErrorEnvelope {
        success: false,
        error: err.to_string(),
        // debug representation only in dev builds
        stack: cfg!(debug_assertions).then(|| format!("{err:?}")),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

async fn debug_report(State(state): State<AppState>) -> Response {
    match state.aggregator.run_diagnostics().await {
        Ok(run) => Json(ReportEnvelope::from_run(&run)).into_response(),
        Err(e) => internal_error(&e),
    }
}

async fn classified_report(State(state): State<AppState>) -> Response {
    match state.aggregator.run_diagnostics().await {
        Ok(run) => {
            let body = ClassifiedEnvelope {
                report: ReportEnvelope::from_run(&run),
                comparison: state.classifier.compare(&run.report),
                recommendations: state.classifier.classify(&run.report),
            };
            Json(body).into_response()
        }
        Err(e) => internal_error(&e),
    }
}
