//! Request and response types for the fac-daemon HTTP endpoints.
//!
//! Entity bodies (profiles, installments, loans) are the `fac_schemas` types
//! themselves; only envelopes and small request shapes live here.

use fac_schemas::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub store: String,
    pub config_hash: Option<String>,
    pub uptime_secs: u64,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code, e.g. "VALIDATION".
    pub error: String,
    pub message: String,
}

/// `{"status": "<target>"}` for every status-change endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountQuery {
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutstandingResponse {
    pub employee_id: Uuid,
    pub policy: String,
    pub outstanding: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub employee_id: Uuid,
    pub requested: Money,
    pub total_outstanding_at_time: Money,
    pub requires_interest: bool,
}
