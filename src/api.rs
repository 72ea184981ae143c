// 🌐 REST API - Axum router over the shared store
//
// Every response is `{ success, data, error }`. Handlers lock the store for
// the length of one request; there is no other coordination.

use crate::db::{SqliteStore, Store};
use crate::edit::EditState;
use crate::entities::{
    BenefitPlan, Dependent, Entity, Group, MedicarePlan, Participant, PlanOption, Program, Provider, Repository, User,
};
use crate::error::{ConsoleError, FormatError, StoreError, ValidationErrors};
use crate::importer::{file_fingerprint, import_rate_file, RateFileRow};
use crate::lifecycle::{self, HistoryView, RateBuckets, SortOrder};
use crate::participants::{import_participants, save_participants};
use crate::rate_form::{
    add_medicare_rate, medicare_rate_list, option_history, plan_history, LabeledRate, OptionHistory, RateTableForm,
};
use crate::validation::RuleTable;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Header carrying the (percent-encoded) name of an uploaded file.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub rules: Arc<RuleTable>,
}

impl AppState {
    pub fn new(store: SqliteStore, rules: RuleTable) -> Self {
        AppState {
            store: Arc::new(store),
            rules: Arc::new(rules),
        }
    }

    fn repo(&self) -> Repository<'_> {
        Repository::new(self.store.as_ref(), self.rules.as_ref()).with_actor("api")
    }
}

// ============================================================================
// RESPONSES
// ============================================================================

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Console(ConsoleError),
    BadRequest(String),
}

impl From<ConsoleError> for ApiError {
    fn from(err: ConsoleError) -> Self {
        ApiError::Console(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Console(err.into())
    }
}

impl From<FormatError> for ApiError {
    fn from(err: FormatError) -> Self {
        ApiError::Console(err.into())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        ApiError::Console(err.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Console(ConsoleError::Format(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Console(ConsoleError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Console(ConsoleError::Store(StoreError::NotFound { .. })) => StatusCode::NOT_FOUND,
            ApiError::Console(ConsoleError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, data) = match &self {
            ApiError::BadRequest(message) => (message.clone(), Value::Null),
            ApiError::Console(ConsoleError::Validation(errors)) => {
                (errors.to_string(), serde_json::to_value(errors).unwrap_or(Value::Null))
            }
            ApiError::Console(err) => (err.to_string(), Value::Null),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "request rejected");
        }

        let body = ApiResponse {
            success: false,
            data,
            error: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Every `/api` route, without middleware.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        .route("/rates/import", post(preview_rate_file))
        .route("/plans/:id/rates", get(get_plan_rates).post(submit_plan_rates))
        .route("/options/:id/rates", get(get_option_rates))
        .route("/medicare-plans/:id/rates", get(get_medicare_rates).post(post_medicare_rate))
        .route("/participants/import", post(post_participant_file))
        .route("/events/:entity_type/:entity_id", get(get_events));

    let api = crud::<Group>(api, "/groups");
    let api = crud::<BenefitPlan>(api, "/plans");
    let api = crud::<PlanOption>(api, "/options");
    let api = crud::<MedicarePlan>(api, "/medicare-plans");
    let api = crud::<Participant>(api, "/participants");
    let api = crud::<Dependent>(api, "/dependents");
    let api = crud::<Provider>(api, "/providers");
    let api = crud::<Program>(api, "/programs");
    let api = crud::<User>(api, "/users");

    Router::new().nest("/api", api.with_state(state))
}

fn crud<E: Entity>(router: Router<AppState>, path: &str) -> Router<AppState> {
    router
        .route(path, get(list_entities::<E>).post(create_entity::<E>))
        .route(
            &format!("{}/:id", path),
            get(get_entity::<E>).put(update_entity::<E>).delete(delete_entity::<E>),
        )
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> ApiResult<&'static str> {
    ok("OK")
}

async fn list_entities<E: Entity>(State(state): State<AppState>) -> ApiResult<Vec<E>> {
    ok(state.repo().list::<E>()?)
}

async fn get_entity<E: Entity>(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<E> {
    ok(state.repo().get::<E>(id)?)
}

async fn create_entity<E: Entity>(
    State(state): State<AppState>,
    Json(entity): Json<E>,
) -> Result<(StatusCode, Json<ApiResponse<E>>), ApiError> {
    let created = state.repo().create(&entity)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

async fn update_entity<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(entity): Json<E>,
) -> ApiResult<E> {
    let repo = state.repo();
    let mut edit = EditState::viewing(repo.get::<E>(id)?).begin_edit();
    edit.update_draft(|draft| *draft = entity);

    let (edit, saved) = edit.save(&repo, id);
    saved?;
    ok(edit.current().clone())
}

async fn delete_entity<E: Entity>(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<i64> {
    state.repo().delete::<E>(id)?;
    ok(id)
}

#[derive(Debug, Serialize)]
struct RateFilePreview {
    file_name: String,
    sha256: String,
    rows: Vec<RateFileRow>,
}

fn upload_name(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(FILE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            urlencoding::decode(raw)
                .map(|name| name.into_owned())
                .unwrap_or_else(|_| raw.to_string())
        })
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// POST /api/rates/import - Decode an uploaded rate file without saving it
async fn preview_rate_file(headers: HeaderMap, body: Bytes) -> ApiResult<RateFilePreview> {
    let file_name = upload_name(&headers, "upload.csv");
    let rows = import_rate_file(&file_name, &body)?;
    ok(RateFilePreview {
        sha256: file_fingerprint(&body),
        file_name,
        rows,
    })
}

#[derive(Debug, Deserialize)]
struct OrderQuery {
    order: Option<String>,
}

impl OrderQuery {
    fn resolve(&self, view: HistoryView) -> Result<SortOrder, ApiError> {
        match self.order.as_deref() {
            None => Ok(view.default_order()),
            Some(raw) => SortOrder::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("order must be 'asc' or 'desc', got '{}'", raw))),
        }
    }
}

/// GET /api/plans/:id/rates - Grouped history of every option of a plan
async fn get_plan_rates(
    State(state): State<AppState>,
    Path(plan_id): Path<i64>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Vec<OptionHistory>> {
    let order = query.resolve(HistoryView::Combined)?;
    let repo = state.repo();
    repo.get::<BenefitPlan>(plan_id)?;
    ok(plan_history(&repo, plan_id, lifecycle::today(), order)?)
}

/// POST /api/plans/:id/rates - Submit a rate table form
async fn submit_plan_rates(
    State(state): State<AppState>,
    Path(plan_id): Path<i64>,
    Json(form): Json<RateTableForm>,
) -> ApiResult<Vec<OptionHistory>> {
    ok(form.submit(&state.repo(), plan_id, lifecycle::today())?)
}

/// GET /api/options/:id/rates - Pending / Active / Ended history
async fn get_option_rates(
    State(state): State<AppState>,
    Path(option_id): Path<i64>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<RateBuckets<LabeledRate>> {
    let order = query.resolve(HistoryView::Combined)?;
    let repo = state.repo();
    repo.get::<PlanOption>(option_id)?;
    ok(option_history(&repo, option_id, lifecycle::today(), order)?)
}

/// GET /api/medicare-plans/:id/rates - Planned / Current / Ended list
async fn get_medicare_rates(
    State(state): State<AppState>,
    Path(medicare_plan_id): Path<i64>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Vec<LabeledRate>> {
    let order = query.resolve(HistoryView::FlatList)?;
    let repo = state.repo();
    repo.get::<MedicarePlan>(medicare_plan_id)?;
    ok(medicare_rate_list(&repo, medicare_plan_id, lifecycle::today(), order)?)
}

#[derive(Debug, Deserialize)]
struct NewMedicareRate {
    rate: f64,
    start_date: NaiveDate,
}

/// POST /api/medicare-plans/:id/rates - Add a rate, closing the open one
async fn post_medicare_rate(
    State(state): State<AppState>,
    Path(medicare_plan_id): Path<i64>,
    Json(new_rate): Json<NewMedicareRate>,
) -> ApiResult<Vec<LabeledRate>> {
    ok(add_medicare_rate(
        &state.repo(),
        medicare_plan_id,
        new_rate.rate,
        new_rate.start_date,
        lifecycle::today(),
    )?)
}

#[derive(Debug, Deserialize)]
struct ParticipantImportQuery {
    group_id: i64,
}

/// POST /api/participants/import?group_id= - Load a participant census CSV
async fn post_participant_file(
    State(state): State<AppState>,
    Query(query): Query<ParticipantImportQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<Vec<Participant>>>), ApiError> {
    let repo = state.repo();
    repo.get::<Group>(query.group_id)?;

    let file_name = upload_name(&headers, "participants.csv");
    let participants = import_participants(&file_name, &body, query.group_id)?;
    let saved = save_participants(&repo, &participants)?;

    repo.audit(
        "participants_imported",
        Group::ENTITY_TYPE,
        query.group_id,
        serde_json::json!({
            "file_name": file_name,
            "sha256": file_fingerprint(&body),
            "count": saved.len(),
        }),
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(saved))))
}

/// GET /api/events/:entity_type/:entity_id - Audit trail, newest first
async fn get_events(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, String)>,
) -> ApiResult<Vec<crate::db::Event>> {
    ok(state.store.events_for(&entity_type, &entity_id)?)
}

// ============================================================================
// TESTS
// ============================================================================
