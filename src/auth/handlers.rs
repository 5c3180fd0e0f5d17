use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::TokenKind,
        dto::{
            AuthResponse, DeleteAccountRequest, DeletionStats, ForgotPasswordRequest,
            LoginRequest, MessageResponse, PublicUser, RegisterRequest, ResetPasswordRequest,
            UserResponse,
        },
        extractors::CurrentUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::User,
    },
    contacts::repo::{Activity, Contact},
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-token", get(verify_token))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/delete-account", post(delete_account))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.name = payload.name.trim().to_string();
    payload.email = payload.email.trim().to_string();

    if payload.name.is_empty() {
        return Err(ApiError::Validation {
            field: "name",
            reason: "Name is required",
        });
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation {
            field: "email",
            reason: "Invalid email",
        });
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation {
            field: "password",
            reason: "Password too short",
        });
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already exists"));
    }

    let hash = hash_password(&payload.password)?;

    // The unique constraint closes the find/create race.
    let user = match User::create(&state.db, &payload.name, &payload.email, &hash).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "email already registered (race)");
            return Err(ApiError::Conflict("Email already exists"));
        }
        Err(e) => return Err(ApiError::Dependency(e)),
    };

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: PublicUser::from(user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation {
            field: "email",
            reason: "Invalid email",
        });
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::InvalidCredentials
        })?;

    if !verify_password(&payload.password, &user.password_hash) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(user),
    }))
}

#[instrument(skip_all)]
pub async fn verify_token(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse {
        user: PublicUser::from(user),
    })
}

/// Issued session tokens stay valid until natural expiry; logout only records
/// the timestamp.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MessageResponse>, ApiError> {
    User::record_logout(&state.db, user.id).await?;
    info!(user_id = %user.id, "user logged out");
    Ok(Json(MessageResponse {
        message: "Logged out",
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_string();

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::NotFound("Email not found"))?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_reset(user.id)?;

    // At most one live reset token per user; a new request supersedes the old.
    User::set_reset_token(&state.db, user.id, &token).await?;

    let body = reset_email_body(
        &state.config.frontend_url,
        &token,
        state.config.jwt.reset_ttl_minutes,
    );
    state
        .mailer
        .send(&user.email, "Password Reset Request", &body)
        .await
        .map_err(ApiError::NotificationFailed)?;

    info!(user_id = %user.id, "password reset email sent");
    Ok(Json(MessageResponse {
        message: "Password reset email sent",
    }))
}

fn reset_email_body(frontend_url: &str, token: &str, ttl_minutes: i64) -> String {
    let reset_url = format!("{frontend_url}/reset_password?token={token}");
    format!(
        "To reset your password, visit the following link: {reset_url}\n\n\
         The link expires in {ttl_minutes} minutes. If you did not request a \
         password reset, you can safely ignore this email."
    )
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.password.len() < 8 {
        return Err(ApiError::Validation {
            field: "password",
            reason: "Password too short",
        });
    }

    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify(&payload.token, TokenKind::Reset)
        .map_err(|e| {
            warn!(error = %e, "reset token rejected");
            ApiError::InvalidResetToken
        })?;

    let hash = hash_password(&payload.password)?;

    // Hash swap and token clear happen in one statement; a consumed or
    // superseded token matches zero rows.
    let redeemed = User::redeem_reset_token(&state.db, claims.sub, &payload.token, &hash).await?;
    if !redeemed {
        warn!(user_id = %claims.sub, "reset token already consumed or never issued");
        return Err(ApiError::InvalidResetToken);
    }

    info!(user_id = %claims.sub, "password reset");
    Ok(Json(MessageResponse {
        message: "Password reset successful",
    }))
}

#[instrument(skip_all)]
pub async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<DeleteAccountRequest>,
) -> Result<Json<DeletionStats>, ApiError> {
    // A stolen session token alone must not be enough for destruction; the
    // caller re-proves possession of the password.
    if !verify_password(&payload.password, &user.password_hash) {
        warn!(user_id = %user.id, "delete-account password mismatch");
        return Err(ApiError::InvalidCredentials);
    }

    // Dependents first, so no contact or activity outlives its owner. There is
    // no rollback; partial failure reports the counts gathered so far.
    let contacts_deleted = Contact::delete_by_owner(&state.db, user.id)
        .await
        .map_err(|e| ApiError::DeletionPartiallyFailed {
            contacts_deleted: 0,
            activities_deleted: 0,
            source: e,
        })?;

    let activities_deleted = Activity::delete_by_owner(&state.db, user.id)
        .await
        .map_err(|e| ApiError::DeletionPartiallyFailed {
            contacts_deleted,
            activities_deleted: 0,
            source: e,
        })?;

    User::delete_by_id(&state.db, user.id)
        .await
        .map_err(|e| ApiError::DeletionPartiallyFailed {
            contacts_deleted,
            activities_deleted,
            source: e,
        })?;

    info!(
        user_id = %user.id,
        contacts_deleted,
        activities_deleted,
        "account deleted"
    );
    Ok(Json(DeletionStats {
        contacts_deleted,
        activities_deleted,
        account_deleted: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("ann@x.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("spaces in@x.com"));
        assert!(!is_valid_email("@x.com"));
    }

    #[test]
    fn reset_email_embeds_the_token_link() {
        let body = reset_email_body("https://app.example.com", "tok-123", 20);
        assert!(body.contains("https://app.example.com/reset_password?token=tok-123"));
        assert!(body.contains("20 minutes"));
    }
}
