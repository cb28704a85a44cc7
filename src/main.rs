// src/main.rs

use anyhow::{bail, Context, Result};
use axum::http::StatusCode as AxumStatusCode;
use axum::http::{header, HeaderMap};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use chrono::{Duration, Local, NaiveDate};
use clap::Parser;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, sync::Arc};
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod access;
mod aggregate;
mod identity;
mod reconcile;
mod records;
mod store;
mod upstream;

mod reconcile_tests;

use access::{filter_snapshot, AccessLevel, CallerContext};
use aggregate::{aggregate_date, aggregate_range, available_dates, DateAttendance, DateSummary};
use identity::IdentityResolver;
use reconcile::group_by_employee_date;
use records::{
    ActivityRecord, DailyTargetReportRecord, EmployeeRef, HourlyReportRecord, RecordSnapshot,
};
use store::{fetch_snapshot, ActivityStore, InMemoryRecordStore, ReportingStore, StoreError};
use upstream::{UpstreamClient, UpstreamConfig};

const DATE_FORMAT: &str = "%Y-%m-%d";

// --- CLI ---

#[derive(Parser, Debug)]
#[command(
    name = "attendance-core",
    about = "Reconciles employee activity, report and leave records into daily attendance summaries"
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
    /// Serve records from a JSON fixture file instead of the upstream
    /// record service.
    #[arg(long)]
    data_file: Option<PathBuf>,
}

// --- Error Handling ---

#[derive(Error, Debug)]
enum AppError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("Attendance data unavailable: {0}")]
    DataSourceUnavailable(#[from] StoreError),
    #[error("Failed to render CSV export: {0}")]
    CsvRender(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        error!("Request failed: {}", self);
        let status_code = match &self {
            AppError::MissingParameter(_)
            | AppError::InvalidDate(_)
            | AppError::InvalidRange { .. } => AxumStatusCode::BAD_REQUEST,
            // Partial attendance data is never served; a failed fetch fails
            // the whole request.
            AppError::DataSourceUnavailable(_) => AxumStatusCode::BAD_GATEWAY,
            AppError::CsvRender(_) => AxumStatusCode::INTERNAL_SERVER_ERROR,
        };
        (status_code, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// --- Shared App State ---

#[derive(Clone)]
struct AppState {
    activities: Arc<dyn ActivityStore>,
    reports: Arc<dyn ReportingStore>,
    mode: &'static str,
}

// --- Request / Response Shapes ---

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DateSummaryResponse {
    summary: DateSummary,
    activities: Vec<ActivityRecord>,
    daily_reports: Vec<DailyTargetReportRecord>,
    hourly_reports: Vec<HourlyReportRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailableDatesResponse {
    dates: Vec<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceResponse {
    #[serde(flatten)]
    attendance: DateAttendance,
    access_level: AccessLevel,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RangeTotals {
    total_days: usize,
    total_employees: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RangeResponse {
    summary: RangeTotals,
    daily_data: BTreeMap<NaiveDate, DateSummary>,
    dates_with_data: Vec<NaiveDate>,
    access_level: AccessLevel,
}

// --- Parameter Helpers ---

fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| AppError::InvalidDate(value.to_string()))
}

fn require_date(value: Option<&str>, name: &'static str) -> Result<NaiveDate, AppError> {
    match value {
        Some(raw) if !raw.trim().is_empty() => parse_date(raw),
        _ => Err(AppError::MissingParameter(name)),
    }
}

fn require_range(params: &RangeQuery) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = require_date(params.start_date.as_deref(), "startDate")?;
    let end = require_date(params.end_date.as_deref(), "endDate")?;
    if start > end {
        return Err(AppError::InvalidRange { start, end });
    }
    Ok((start, end))
}

/// Caller identity and role, populated by the upstream auth proxy. A
/// request with no auth headers resolves to a restricted caller that can
/// see nothing.
fn caller_from_headers(headers: &HeaderMap) -> CallerContext {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    CallerContext {
        identity: EmployeeRef {
            user_id: header_str("x-user-id").and_then(|v| v.parse().ok()),
            employee_code: header_str("x-employee-code"),
            username: header_str("x-username"),
        },
        role: header_str("x-role").unwrap_or_default(),
    }
}

// --- Handlers ---

async fn handle_date_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DateQuery>,
) -> Result<Json<DateSummaryResponse>, AppError> {
    let date = require_date(params.date.as_deref(), "date")?;
    let caller = caller_from_headers(&headers);
    info!("Handling /date-summary for {}", date);

    let snapshot =
        fetch_snapshot(state.activities.as_ref(), state.reports.as_ref(), date, date).await?;
    let mut resolver = IdentityResolver::new();
    let (visible, _access) = filter_snapshot(snapshot, &mut resolver, &caller);
    let grouped = group_by_employee_date(&visible, &mut resolver);
    let attendance = aggregate_date(date, &grouped, &resolver);
    drop(grouped);

    Ok(Json(DateSummaryResponse {
        summary: attendance.summary,
        activities: visible.activities,
        daily_reports: visible.daily_reports,
        hourly_reports: visible.hourly_reports,
    }))
}

async fn handle_available_dates(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AvailableDatesResponse>, AppError> {
    let caller = caller_from_headers(&headers);
    let today = Local::now().date_naive();
    let window_start = today - Duration::days(30);
    info!("Handling /available-dates ({}..{})", window_start, today);

    let activities = state
        .activities
        .activities_in_range(window_start, today)
        .await?;
    let snapshot = RecordSnapshot {
        activities,
        ..Default::default()
    };
    let mut resolver = IdentityResolver::new();
    let (visible, _access) = filter_snapshot(snapshot, &mut resolver, &caller);

    Ok(Json(AvailableDatesResponse {
        dates: available_dates(&visible.activities, today),
    }))
}

async fn handle_attendance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DateQuery>,
) -> Result<Json<AttendanceResponse>, AppError> {
    let date = require_date(params.date.as_deref(), "date")?;
    let caller = caller_from_headers(&headers);
    info!("Handling /attendance for {}", date);

    let snapshot =
        fetch_snapshot(state.activities.as_ref(), state.reports.as_ref(), date, date).await?;
    let mut resolver = IdentityResolver::new();
    let (visible, access_level) = filter_snapshot(snapshot, &mut resolver, &caller);
    let grouped = group_by_employee_date(&visible, &mut resolver);
    let attendance = aggregate_date(date, &grouped, &resolver);

    Ok(Json(AttendanceResponse {
        attendance,
        access_level,
    }))
}

async fn handle_attendance_range(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RangeQuery>,
) -> Result<Json<RangeResponse>, AppError> {
    let (start, end) = require_range(&params)?;
    let caller = caller_from_headers(&headers);
    info!("Handling /attendance/range for {}..{}", start, end);

    let snapshot =
        fetch_snapshot(state.activities.as_ref(), state.reports.as_ref(), start, end).await?;
    let mut resolver = IdentityResolver::new();
    let (visible, access_level) = filter_snapshot(snapshot, &mut resolver, &caller);
    let grouped = group_by_employee_date(&visible, &mut resolver);
    let summary = aggregate_range(start, end, &grouped, &resolver);

    Ok(Json(RangeResponse {
        summary: RangeTotals {
            total_days: summary.total_days,
            total_employees: summary.total_employees,
        },
        dates_with_data: summary.per_date.keys().copied().collect(),
        daily_data: summary.per_date,
        access_level,
    }))
}

async fn handle_attendance_range_export(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (start, end) = require_range(&params)?;
    let caller = caller_from_headers(&headers);
    info!("Handling /attendance/range/export for {}..{}", start, end);

    let snapshot =
        fetch_snapshot(state.activities.as_ref(), state.reports.as_ref(), start, end).await?;
    let mut resolver = IdentityResolver::new();
    let (visible, _access) = filter_snapshot(snapshot, &mut resolver, &caller);
    let grouped = group_by_employee_date(&visible, &mut resolver);
    let summary = aggregate_range(start, end, &grouped, &resolver);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "date",
            "total",
            "present",
            "absent",
            "on_leave",
            "pending_approval",
            "unknown",
        ])
        .map_err(|e| AppError::CsvRender(e.to_string()))?;
    for (date, day) in &summary.per_date {
        writer
            .write_record([
                date.format(DATE_FORMAT).to_string(),
                day.total.to_string(),
                day.present.to_string(),
                day.absent.to_string(),
                day.on_leave.to_string(),
                day.pending_approval.to_string(),
                day.unknown.to_string(),
            ])
            .map_err(|e| AppError::CsvRender(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::CsvRender(e.to_string()))?;
    let body = String::from_utf8(bytes).map_err(|e| AppError::CsvRender(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body))
}

async fn handle_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "mode": state.mode,
        "serverTime": Local::now().to_rfc3339(),
    }))
}

// --- Bootstrap ---

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let state = match &cli.data_file {
        Some(path) => {
            let store = Arc::new(
                InMemoryRecordStore::from_json_file(path)
                    .with_context(|| format!("Failed to load record fixture {}", path.display()))?,
            );
            AppState {
                activities: store.clone(),
                reports: store,
                mode: "fixture",
            }
        }
        None => {
            let config = UpstreamConfig::from_env()
                .context("Record service configuration (UPSTREAM_* variables)")?;
            let client = Arc::new(UpstreamClient::new(&config)?);
            AppState {
                activities: client.clone(),
                reports: client,
                mode: "upstream",
            }
        }
    };
    info!("Record source: {}", state.mode);

    let app = Router::new()
        .route("/date-summary", get(handle_date_summary))
        .route("/available-dates", get(handle_available_dates))
        .route("/attendance", get(handle_attendance))
        .route("/attendance/range", get(handle_attendance_range))
        .route("/attendance/range/export", get(handle_attendance_range_export))
        .route("/status", get(handle_status))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state);

    match load_tls_config().await? {
        Some(tls_config) => {
            info!("Starting server on https://{}", cli.listen);
            axum_server::bind_rustls(cli.listen, tls_config)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            info!("Starting server on http://{}", cli.listen);
            axum_server::bind(cli.listen)
                .serve(app.into_make_service())
                .await
                .context("HTTP server failed")?;
        }
    }

    Ok(())
}

/// TLS is optional: both CERT_PATH and KEY_PATH enable it, neither serves
/// plain HTTP, and setting only one is a configuration mistake.
async fn load_tls_config() -> Result<Option<RustlsConfig>> {
    match (env::var("CERT_PATH").ok(), env::var("KEY_PATH").ok()) {
        (Some(cert_path), Some(key_path)) => {
            let config = RustlsConfig::from_pem_file(&cert_path, &key_path)
                .await
                .context("Failed to load TLS cert/key")?;
            Ok(Some(config))
        }
        (None, None) => Ok(None),
        _ => bail!("CERT_PATH and KEY_PATH must be set together"),
    }
}
