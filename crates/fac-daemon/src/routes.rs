//! Axum router and HTTP handlers for fac-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Every `/v1` route except health requires an [`Actor`].

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use fac_audit::{AuditEntry, HistoryPoint};
use fac_engine::ProfileAggregate;
use fac_reconcile::ConsistencyReport;
use fac_schemas::{
    ApprovalStatus, FinanceError, Installment, InstallmentPatch, LoanRepayment, LoanRequest,
    LoanWithdrawal, Money, NewInstallment, NewLoanRequest, NewProfile, NewRepayment,
    NewWithdrawal, ObligationProfile, ProfileStatus,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{
    api_types::{
        AmountQuery, EvaluationResponse, HealthResponse, OutstandingResponse, StatusChangeRequest,
    },
    auth::Actor,
    error::ApiResult,
    state::{uptime_secs, AppState, BusMsg},
};

type St = State<Arc<AppState>>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Middleware layers (CORS, tracing) are not applied here so tests can use
/// the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        // garnishments
        .route("/v1/profiles", get(list_profiles).post(create_profile))
        .route("/v1/profiles/:id", get(get_profile).delete(delete_profile))
        .route("/v1/profiles/:id/status", post(change_profile_status))
        .route("/v1/profiles/:id/installments", post(create_installment))
        .route("/v1/profiles/:id/consistency", get(check_profile))
        .route("/v1/installments/:id", put(update_installment))
        // loans
        .route("/v1/employees/:id/loans/outstanding", get(outstanding))
        .route("/v1/employees/:id/loans/evaluate", get(evaluate))
        .route("/v1/employees/:id/loans/withdrawals", post(record_withdrawal))
        .route("/v1/employees/:id/loans/repayments", post(record_repayment))
        .route(
            "/v1/employees/:id/loans/requests",
            get(list_requests).post(submit_request),
        )
        .route("/v1/withdrawals/:id/status", post(change_withdrawal_status))
        .route("/v1/requests/:id/status", post(change_request_status))
        // audit
        .route("/v1/audit/:table/:record_id", get(audit_entries))
        .route("/v1/audit/:table/:record_id/history", get(audit_history))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): St) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            store: st.store_kind.to_string(),
            config_hash: st.config_hash.clone(),
            uptime_secs: uptime_secs(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Garnishments
// ---------------------------------------------------------------------------

pub(crate) async fn list_profiles(
    State(st): St,
    _actor: Actor,
) -> ApiResult<Json<Vec<ObligationProfile>>> {
    Ok(Json(st.console.garnishments.list_profiles().await?))
}

pub(crate) async fn create_profile(
    State(st): St,
    Actor(p): Actor,
    Json(draft): Json<NewProfile>,
) -> ApiResult<(StatusCode, Json<ObligationProfile>)> {
    let profile = st.console.garnishments.create_profile(&p, draft).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub(crate) async fn get_profile(
    State(st): St,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProfileAggregate>> {
    Ok(Json(st.console.garnishments.get_profile(id).await?))
}

pub(crate) async fn delete_profile(
    State(st): St,
    Actor(p): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    st.console.garnishments.delete_profile(&p, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn change_profile_status(
    State(st): St,
    Actor(p): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusChangeRequest>,
) -> ApiResult<Json<ObligationProfile>> {
    let target = ProfileStatus::parse(&req.status)?;
    let profile = st
        .console
        .garnishments
        .change_profile_status(&p, id, target)
        .await?;
    Ok(Json(profile))
}

pub(crate) async fn create_installment(
    State(st): St,
    Actor(p): Actor,
    Path(id): Path<Uuid>,
    Json(draft): Json<NewInstallment>,
) -> ApiResult<(StatusCode, Json<Installment>)> {
    let inst = st
        .console
        .garnishments
        .create_installment(&p, id, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(inst)))
}

pub(crate) async fn update_installment(
    State(st): St,
    Actor(p): Actor,
    Path(id): Path<Uuid>,
    Json(patch): Json<InstallmentPatch>,
) -> ApiResult<Json<Installment>> {
    let inst = st
        .console
        .garnishments
        .update_installment(&p, id, patch)
        .await?;
    Ok(Json(inst))
}

pub(crate) async fn check_profile(
    State(st): St,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ConsistencyReport>> {
    Ok(Json(st.console.garnishments.check_profile(id).await?))
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

fn parse_amount(raw: &str) -> Result<Money, FinanceError> {
    Money::parse(raw).map_err(|e| FinanceError::validation(format!("amount: {e}")))
}

pub(crate) async fn outstanding(
    State(st): St,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OutstandingResponse>> {
    let loans = &st.console.loans;
    let outstanding = loans.outstanding_balance(id).await?;
    Ok(Json(OutstandingResponse {
        employee_id: id,
        policy: loans.policy().as_str().to_string(),
        outstanding,
    }))
}

pub(crate) async fn evaluate(
    State(st): St,
    _actor: Actor,
    Path(id): Path<Uuid>,
    Query(q): Query<AmountQuery>,
) -> ApiResult<Json<EvaluationResponse>> {
    let requested = parse_amount(&q.amount)?;
    let e = st.console.loans.evaluate_withdrawal(id, requested).await?;
    Ok(Json(EvaluationResponse {
        employee_id: id,
        requested,
        total_outstanding_at_time: e.total_outstanding_at_time,
        requires_interest: e.requires_interest,
    }))
}

pub(crate) async fn record_withdrawal(
    State(st): St,
    Actor(p): Actor,
    Path(id): Path<Uuid>,
    Json(draft): Json<NewWithdrawal>,
) -> ApiResult<(StatusCode, Json<LoanWithdrawal>)> {
    let w = st.console.loans.record_withdrawal(&p, id, draft).await?;
    Ok((StatusCode::CREATED, Json(w)))
}

pub(crate) async fn record_repayment(
    State(st): St,
    Actor(p): Actor,
    Path(id): Path<Uuid>,
    Json(draft): Json<NewRepayment>,
) -> ApiResult<(StatusCode, Json<LoanRepayment>)> {
    let r = st.console.loans.record_repayment(&p, id, draft).await?;
    Ok((StatusCode::CREATED, Json(r)))
}

pub(crate) async fn list_requests(
    State(st): St,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<LoanRequest>>> {
    Ok(Json(st.console.loans.list_requests(id).await?))
}

pub(crate) async fn submit_request(
    State(st): St,
    Actor(p): Actor,
    Path(id): Path<Uuid>,
    Json(draft): Json<NewLoanRequest>,
) -> ApiResult<(StatusCode, Json<LoanRequest>)> {
    let r = st.console.loans.submit_request(&p, id, draft).await?;
    Ok((StatusCode::CREATED, Json(r)))
}

pub(crate) async fn change_withdrawal_status(
    State(st): St,
    Actor(p): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusChangeRequest>,
) -> ApiResult<Json<LoanWithdrawal>> {
    let target = ApprovalStatus::parse(&req.status)?;
    let w = st
        .console
        .loans
        .change_withdrawal_status(&p, id, target)
        .await?;
    Ok(Json(w))
}

pub(crate) async fn change_request_status(
    State(st): St,
    Actor(p): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusChangeRequest>,
) -> ApiResult<Json<LoanRequest>> {
    let target = ApprovalStatus::parse(&req.status)?;
    let r = st
        .console
        .loans
        .change_request_status(&p, id, target)
        .await?;
    Ok(Json(r))
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

pub(crate) async fn audit_entries(
    State(st): St,
    _actor: Actor,
    Path((table, record_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    Ok(Json(
        st.console
            .garnishments
            .audit_history(&table, record_id)
            .await?,
    ))
}

pub(crate) async fn audit_history(
    State(st): St,
    _actor: Actor,
    Path((table, record_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<Vec<HistoryPoint>>> {
    Ok(Json(
        st.console
            .garnishments
            .reconstruct(&table, record_id)
            .await?,
    ))
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): St, _actor: Actor) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let events = broadcast_to_sse(st.bus.subscribe());
    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Change(_) => "change",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
