use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::claims::TokenKind;
use crate::auth::jwt::JwtKeys;
use crate::auth::repo::User;
use crate::error::ApiError;
use crate::state::AppState;

/// Verified identity for the current request: bearer token parsed, session
/// purpose checked, subject resolved to a live user. Every request re-verifies;
/// nothing is cached across requests.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::MissingToken)?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(ApiError::MissingToken)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token, TokenKind::Session).map_err(|e| {
            warn!(error = %e, "session token rejected");
            ApiError::InvalidToken
        })?;

        // A vanished subject gets the same rejection as a bad token; the 401
        // must not reveal which it was.
        let user = User::find_by_id(&state.db, claims.sub)
            .await
            .map_err(ApiError::Dependency)?
            .ok_or(ApiError::InvalidToken)?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("/api/contacts");
        if let Some(v) = value {
            builder = builder.header(axum::http::header::AUTHORIZATION, v);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(None);
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejection");
        assert!(matches!(err, ApiError::MissingToken));
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(Some("Basic QW5uOnNlY3JldDE="));
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejection");
        assert!(matches!(err, ApiError::MissingToken));
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(Some("Bearer not-a-token"));
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejection");
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[tokio::test]
    async fn reset_token_is_rejected_at_the_gate() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_reset(Uuid::new_v4()).expect("sign reset");
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejection");
        assert!(matches!(err, ApiError::InvalidToken));
    }
}
