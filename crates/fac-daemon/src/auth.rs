//! Principal extraction.
//!
//! Identity is resolved upstream (reverse proxy / SSO); the daemon trusts
//! three headers and refuses requests that lack any of them.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use fac_schemas::{Principal, Role};
use uuid::Uuid;

use crate::error::ApiError;

pub const HDR_ACTOR_ID: &str = "x-actor-id";
pub const HDR_ACTOR_NAME: &str = "x-actor-name";
pub const HDR_ACTOR_ROLE: &str = "x-actor-role";

/// The acting principal of a request.
#[derive(Debug, Clone)]
pub struct Actor(pub Principal);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {name} header")))
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = Uuid::parse_str(header(parts, HDR_ACTOR_ID)?)
            .map_err(|_| ApiError::Unauthenticated(format!("{HDR_ACTOR_ID} is not a uuid")))?;
        let name = header(parts, HDR_ACTOR_NAME)?.to_string();
        let role = Role::parse(header(parts, HDR_ACTOR_ROLE)?)
            .map_err(|e| ApiError::Unauthenticated(e.to_string()))?;
        Ok(Actor(Principal::new(id, name, role)))
    }
}
