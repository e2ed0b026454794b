//! In-process scenario tests for fac-daemon HTTP endpoints.
//!
//! The router is driven via `tower::ServiceExt::oneshot` over an in-memory
//! store; no socket is bound.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use fac_daemon::{routes, state::AppState};
use fac_engine::MemStore;
use fac_loans::OutstandingPolicy;
use fac_schemas::Employee;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    st: Arc<AppState>,
    store: Arc<MemStore>,
}

impl Harness {
    fn new() -> Self {
        let (st, store) = AppState::in_memory(OutstandingPolicy::ApprovedOnly);
        Self {
            st: Arc::new(st),
            store,
        }
    }

    async fn send(&self, req: Request<axum::body::Body>) -> (StatusCode, Value) {
        let resp = routes::build_router(Arc::clone(&self.st))
            .oneshot(req)
            .await
            .expect("oneshot failed");
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .expect("body collect failed")
            .to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("body is not valid JSON")
        };
        (status, json)
    }

    async fn call(&self, role: &str, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-actor-id", Uuid::new_v4().to_string())
            .header("x-actor-name", format!("{role}-user"))
            .header("x-actor-role", role);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(axum::body::Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(axum::body::Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    async fn new_profile(&self, owed: &str) -> String {
        let (status, json) = self
            .call(
                "editor",
                "POST",
                "/v1/profiles",
                Some(json!({
                    "case_number": format!("GC-{}", Uuid::new_v4().simple()),
                    "employee_id": Uuid::new_v4(),
                    "creditor_name": "First Lending",
                    "court_district": "Eastern",
                    "law_firm": "Roe & Partners",
                    "total_amount_owed": owed,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["id"].as_str().unwrap().to_string()
    }

    async fn new_employee(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .add_employee(Employee {
                id,
                full_name: "Jordan Avery".into(),
                active: true,
            })
            .await;
        id
    }
}

fn installment(amount: &str, date: &str) -> Value {
    json!({ "amount": amount, "payroll_date": date })
}

// ---------------------------------------------------------------------------
// Health and identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_needs_no_principal() {
    let h = Harness::new();
    let req = Request::builder()
        .uri("/v1/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, json) = h.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "fac-daemon");
    assert_eq!(json["store"], "memory");
}

#[tokio::test]
async fn missing_principal_is_401() {
    let h = Harness::new();
    let req = Request::builder()
        .uri("/v1/profiles")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, json) = h.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "UNAUTHENTICATED");

    let (status, _) = h.call("superuser", "GET", "/v1/profiles", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn viewer_cannot_write() {
    let h = Harness::new();
    let (status, json) = h
        .call(
            "viewer",
            "POST",
            "/v1/profiles",
            Some(json!({
                "case_number": "GC-V",
                "employee_id": Uuid::new_v4(),
                "creditor_name": "x",
                "court_district": "",
                "law_firm": "",
                "total_amount_owed": "10.00",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "FORBIDDEN");
}

// ---------------------------------------------------------------------------
// Garnishments
// ---------------------------------------------------------------------------

#[tokio::test]
async fn installment_lifecycle_over_http() {
    let h = Harness::new();
    let id = h.new_profile("1000.00").await;
    let uri = format!("/v1/profiles/{id}/installments");

    let (status, first) = h
        .call("editor", "POST", &uri, Some(installment("300.00", "2024-07-01")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["installment_number"], 1);

    let (status, json) = h
        .call("editor", "POST", &uri, Some(installment("800.00", "2024-07-15")))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "VALIDATION");

    let (status, json) = h
        .call("editor", "POST", &uri, Some(installment("10.00", "2024-07-01")))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{json}");

    let (status, _) = h
        .call("editor", "POST", &uri, Some(installment("700.00", "2024-07-15")))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, agg) = h.call("viewer", "GET", &format!("/v1/profiles/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agg["profile"]["balance_remaining"], "0.00");
    assert_eq!(agg["installments"].as_array().unwrap().len(), 2);

    let (status, report) = h
        .call("viewer", "GET", &format!("/v1/profiles/{id}/consistency"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["findings"], json!([]));

    let status_uri = format!("/v1/profiles/{id}/status");
    let (status, json) = h
        .call("editor", "POST", &status_uri, Some(json!({"status": "completed"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "completed");

    let (status, json) = h
        .call("editor", "POST", &status_uri, Some(json!({"status": "active"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "INVALID_STATE_TRANSITION");
}

#[tokio::test]
async fn update_installment_and_read_history() {
    let h = Harness::new();
    let id = h.new_profile("500.00").await;
    let (_, inst) = h
        .call(
            "editor",
            "POST",
            &format!("/v1/profiles/{id}/installments"),
            Some(installment("100.00", "2024-08-01")),
        )
        .await;
    let inst_id = inst["id"].as_str().unwrap();

    let (status, json) = h
        .call(
            "editor",
            "PUT",
            &format!("/v1/installments/{inst_id}"),
            Some(json!({"amount": "150.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["amount"], "150.00");

    let (status, entries) = h
        .call(
            "viewer",
            "GET",
            &format!("/v1/audit/garnishment_installments/{inst_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["action"], "update");
    assert_eq!(entries[1]["new_values"], json!({"amount": "150.00"}));

    let (status, points) = h
        .call(
            "viewer",
            "GET",
            &format!("/v1/audit/garnishment_profiles/{id}/history"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let last = points.as_array().unwrap().last().unwrap();
    assert_eq!(last["state"]["balance_remaining"], "350.00");

    let (status, _) = h
        .call("viewer", "GET", &format!("/v1/audit/payroll_runs/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_profile_is_404_and_delete_needs_admin() {
    let h = Harness::new();
    let (status, json) = h
        .call("viewer", "GET", &format!("/v1/profiles/{}", Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "NOT_FOUND");

    let id = h.new_profile("10.00").await;
    let uri = format!("/v1/profiles/{id}");
    let (status, _) = h.call("manager", "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = h.call("admin", "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = h.call("viewer", "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_outage_is_503() {
    let h = Harness::new();
    h.store.set_unavailable(true);
    let (status, json) = h.call("viewer", "GET", "/v1/profiles", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "COLLABORATOR_UNAVAILABLE");
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

#[tokio::test]
async fn loan_flow_over_http() {
    let h = Harness::new();
    let emp = h.new_employee().await;
    let base = format!("/v1/employees/{emp}/loans");

    let (status, w) = h
        .call(
            "editor",
            "POST",
            &format!("{base}/withdrawals"),
            Some(json!({
                "amount": "600.00",
                "withdrawal_date": "2024-01-02",
                "due_date": "2024-06-30",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{w}");
    assert_eq!(w["status"], "pending");
    assert_eq!(w["requires_interest"], false);
    let wid = w["id"].as_str().unwrap();

    // pending does not count under approved_only
    let (_, out) = h.call("viewer", "GET", &format!("{base}/outstanding"), None).await;
    assert_eq!(out["outstanding"], "0.00");
    assert_eq!(out["policy"], "approved_only");

    let status_uri = format!("/v1/withdrawals/{wid}/status");
    let (status, json) = h
        .call("editor", "POST", &status_uri, Some(json!({"status": "approved_manager"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{json}");
    let (status, json) = h
        .call("manager", "POST", &status_uri, Some(json!({"status": "approved_manager"})))
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");

    let (_, out) = h.call("viewer", "GET", &format!("{base}/outstanding"), None).await;
    assert_eq!(out["outstanding"], "600.00");

    let (status, eval) = h
        .call("viewer", "GET", &format!("{base}/evaluate?amount=500.00"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(eval["total_outstanding_at_time"], "600.00");
    assert_eq!(eval["requires_interest"], true);

    let (status, _) = h
        .call("viewer", "GET", &format!("{base}/evaluate?amount=lots"), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, json) = h
        .call(
            "editor",
            "POST",
            &format!("{base}/repayments"),
            Some(json!({"amount": "700.00", "payroll_date": "2024-02-15"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{json}");

    let (status, req) = h
        .call(
            "editor",
            "POST",
            &format!("{base}/requests"),
            Some(json!({"requested_amount": "450.00", "purpose": "car repair"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(req["notes"].as_str().unwrap().contains("1050.00"));

    let (status, list) = h.call("viewer", "GET", &format!("{base}/requests"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let rid = req["id"].as_str().unwrap();
    let (status, json) = h
        .call(
            "manager",
            "POST",
            &format!("/v1/requests/{rid}/status"),
            Some(json!({"status": "rejected"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "rejected");
}

#[tokio::test]
async fn unknown_employee_is_404() {
    let h = Harness::new();
    let (status, _) = h
        .call(
            "viewer",
            "GET",
            &format!("/v1/employees/{}/loans/outstanding", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
