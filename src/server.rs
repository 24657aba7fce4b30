// 🌐 HTTP API - axum router over the journal, ledger, registries and reports
//
// One SQLite connection sits behind a mutex; every handler holds the lock for
// the whole request, so each mutation and its reconciliation run alone.

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Form, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::auth::{SessionStore, SessionUser};
use crate::cashflow::{
    ledger_totals, list_entries, record_manual_adjustment, AdjustmentForm, CashFlowEntry, LedgerTotals,
};
use crate::config::Settings;
use crate::dashboard::{dashboard, DashboardSummary};
use crate::entities::contractor::{create_contractor, get_contractor, list_contractors, Contractor, ContractorForm};
use crate::entities::user::{check_password, find_by_username};
use crate::entities::vehicle::{
    create_vehicle, get_vehicle, list_vehicles, set_vehicle_status, Vehicle, VehicleForm, VehicleStatus,
};
use crate::error::FleetError;
use crate::journal::{
    append_event, delete_event, events_by_contractor, events_by_vehicle, get_event, list_events, Event,
    EventForm, EventType,
};
use crate::reconciliation::{audit_ledger, LedgerDiscrepancy};
use crate::report::{build_report, CsvRenderer, ReportKind, ReportRenderer};

pub const SESSION_COOKIE: &str = "fleet_session";

// ============================================================================
// STATE & RESPONSE WRAPPERS
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub sessions: SessionStore,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(conn: Connection, settings: Settings) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            sessions: SessionStore::new(),
            settings: Arc::new(settings),
        }
    }

    // A panic inside a handler rolls its transaction back before the guard
    // drops, so a poisoned connection is still consistent.
    fn db(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// `FleetError` rendered as a status code plus an error envelope
pub struct ApiError(FleetError);

impl From<FleetError> for ApiError {
    fn from(e: FleetError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FleetError::NotFound { .. } => StatusCode::NOT_FOUND,
            FleetError::Conflict { .. } => StatusCode::CONFLICT,
            FleetError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FleetError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "Request failed");
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };

        (status, Json(ApiResponse::err(message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

fn created<T>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(data))))
}

// ============================================================================
// SESSIONS
// ============================================================================

/// Bearer token first, then the session cookie
fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let user = session_token(req.headers()).and_then(|token| state.sessions.resolve(&token));

    match user {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None => ApiError(FleetError::Unauthorized).into_response(),
    }
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user: SessionUser,
}

/// POST /api/login
async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Result<Response, ApiError> {
    let user = {
        let conn = state.db();
        find_by_username(&conn, form.username.trim())?.ok_or(FleetError::Unauthorized)?
    };

    let password = form.password;
    let user = tokio::task::spawn_blocking(move || check_password(user, &password))
        .await
        .map_err(|e| FleetError::Io(e.into()))??;

    let session = SessionUser::from(&user);
    let token = state.sessions.issue(session.clone());
    info!(user_id = user.id, username = %user.username, "User logged in");

    let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token);
    let body = ApiResponse::ok(LoginResponse { token, user: session });

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /api/logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(&token);
    }

    let cookie = format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE);
    ([(header::SET_COOKIE, cookie)], Json(ApiResponse::ok("logged out"))).into_response()
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

async fn get_dashboard(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    ok(dashboard(&state.db())?)
}

// ---- Vehicles ----

async fn get_vehicles(State(state): State<AppState>) -> ApiResult<Vec<Vehicle>> {
    ok(list_vehicles(&state.db())?)
}

async fn post_vehicle(State(state): State<AppState>, Form(form): Form<VehicleForm>) -> Created<Vehicle> {
    let vehicle = form.into_new_vehicle()?;
    created(create_vehicle(&state.db(), &vehicle)?)
}

async fn get_vehicle_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vehicle> {
    ok(get_vehicle(&state.db(), id)?)
}

#[derive(Deserialize)]
struct StatusForm {
    #[serde(default)]
    status: String,
}

async fn post_vehicle_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<StatusForm>,
) -> ApiResult<Vehicle> {
    let status = VehicleStatus::parse(&form.status)
        .ok_or_else(|| FleetError::InvalidInput(format!("unknown vehicle status '{}'", form.status)))?;
    ok(set_vehicle_status(&state.db(), id, status)?)
}

async fn get_vehicle_events(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<Event>> {
    ok(events_by_vehicle(&state.db(), id)?)
}

// ---- Contractors ----

async fn get_contractors(State(state): State<AppState>) -> ApiResult<Vec<Contractor>> {
    ok(list_contractors(&state.db())?)
}

async fn post_contractor(
    State(state): State<AppState>,
    Form(form): Form<ContractorForm>,
) -> Created<Contractor> {
    created(create_contractor(&state.db(), &form.into())?)
}

async fn get_contractor_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Contractor> {
    ok(get_contractor(&state.db(), id)?)
}

async fn get_contractor_events(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<Event>> {
    ok(events_by_contractor(&state.db(), id)?)
}

// ---- Events ----

async fn get_events(State(state): State<AppState>) -> ApiResult<Vec<Event>> {
    ok(list_events(&state.db())?)
}

async fn post_event(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Form(form): Form<EventForm>,
) -> Created<Event> {
    let event = form.into_new_event(state.settings.timestamp_policy())?;
    let mut conn = state.db();
    created(append_event(&mut conn, &event, Some(user.id))?)
}

async fn get_event_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Event> {
    ok(get_event(&state.db(), id)?)
}

async fn post_delete_event(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Event> {
    let mut conn = state.db();
    ok(delete_event(&mut conn, id)?)
}

#[derive(Serialize)]
struct EventTypeInfo {
    event_type: EventType,
    subtypes: &'static [&'static str],
}

/// GET /api/events/types - suggested subtypes per event type
async fn get_event_types() -> ApiResult<Vec<EventTypeInfo>> {
    ok(EventType::ALL
        .iter()
        .map(|t| EventTypeInfo {
            event_type: *t,
            subtypes: t.suggested_subtypes(),
        })
        .collect())
}

// ---- Cash flow ----

#[derive(Serialize)]
struct CashFlowResponse {
    entries: Vec<CashFlowEntry>,
    totals: LedgerTotals,
}

async fn get_cashflow(State(state): State<AppState>) -> ApiResult<CashFlowResponse> {
    let conn = state.db();
    ok(CashFlowResponse {
        entries: list_entries(&conn)?,
        totals: ledger_totals(&conn)?,
    })
}

async fn post_adjustment(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Form(form): Form<AdjustmentForm>,
) -> Created<Vec<Event>> {
    let adjustment = form.into_adjustment()?;
    let mut conn = state.db();
    created(record_manual_adjustment(&mut conn, &adjustment, Some(user.id))?)
}

async fn get_ledger_audit(State(state): State<AppState>) -> ApiResult<Vec<LedgerDiscrepancy>> {
    ok(audit_ledger(&state.db())?)
}

// ---- Reports ----

/// GET /api/reports/:kind - CSV download
async fn get_report(State(state): State<AppState>, Path(kind): Path<String>) -> Result<Response, ApiError> {
    let kind = ReportKind::parse(&kind).ok_or_else(|| FleetError::not_found("report", &kind))?;

    let table = build_report(&state.db(), kind, &state.settings.report_format())?;
    let renderer = CsvRenderer;
    let bytes = renderer.render(&table)?;

    let headers = [
        (header::CONTENT_TYPE, renderer.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", kind.file_name(&renderer)),
        ),
    ];

    Ok((headers, bytes).into_response())
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/dashboard", get(get_dashboard))
        .route("/vehicles", get(get_vehicles).post(post_vehicle))
        .route("/vehicles/:id", get(get_vehicle_by_id))
        .route("/vehicles/:id/status", post(post_vehicle_status))
        .route("/vehicles/:id/events", get(get_vehicle_events))
        .route("/contractors", get(get_contractors).post(post_contractor))
        .route("/contractors/:id", get(get_contractor_by_id))
        .route("/contractors/:id/events", get(get_contractor_events))
        .route("/events", get(get_events).post(post_event))
        .route("/events/types", get(get_event_types))
        .route("/events/:id", get(get_event_by_id))
        .route("/events/:id/delete", post(post_delete_event))
        .route("/cashflow", get(get_cashflow))
        .route("/cashflow/adjust", post(post_adjustment))
        .route("/cashflow/audit", get(get_ledger_audit))
        .route("/reports/:kind", get(get_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .merge(protected)
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_token_from_bearer_and_cookie() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; fleet_session=abc123"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (FleetError::not_found("vehicle", 1), StatusCode::NOT_FOUND),
            (
                FleetError::Conflict {
                    field: "license plate",
                    value: "AA1".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (FleetError::InvalidInput("bad".to_string()), StatusCode::BAD_REQUEST),
            (FleetError::Unauthorized, StatusCode::UNAUTHORIZED),
            (FleetError::Report("boom".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }
}
