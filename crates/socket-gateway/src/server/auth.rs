//! Owner id extraction for the upgrade route
//!
//! With a JWT secret configured, the owner id is the `id` claim of the bearer token. Without
//! one, every connection is anonymous and gets a generated id.

use super::App;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use socket_common::AppError;

/// Owner id the connection will be registered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(pub String);

/// Refusal of an upgrade request
#[derive(Debug)]
pub struct AuthRejection(pub AppError);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::FORBIDDEN);
        (status, self.0.to_string()).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
    App: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = App::from_ref(state);

        let Some(verifier) = app.jwt() else {
            return Ok(OwnerId(uuid::Uuid::new_v4().to_string()));
        };

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AuthRejection(AppError::MissingAuth))?;

        let owner_id = verifier.owner_id(bearer.token()).map_err(|e| {
            tracing::warn!(error = %e, "Rejected connection token");
            AuthRejection(e)
        })?;

        Ok(OwnerId(owner_id))
    }
}
