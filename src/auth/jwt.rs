use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::config::JwtConfig;
use crate::state::AppState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("unexpected token purpose")]
    PurposeMismatch,
}

/// Holds signing and verification keys with config data. The secret lives in
/// process-wide configuration and is never embedded in token payloads.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub session_ttl: Duration,
    pub reset_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            session_ttl_minutes,
            reset_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            session_ttl: Duration::from_secs((session_ttl_minutes as u64) * 60),
            reset_ttl: Duration::from_secs((reset_ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    fn sign_with_ttl(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        ttl: TimeDuration,
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + ttl;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_session(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_ttl(
            user_id,
            TokenKind::Session,
            TimeDuration::seconds(self.session_ttl.as_secs() as i64),
        )
    }

    pub fn sign_reset(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_ttl(
            user_id,
            TokenKind::Reset,
            TimeDuration::seconds(self.reset_ttl.as_secs() as i64),
        )
    }

    /// Verify signature, expiry, issuer/audience and purpose. The purpose check
    /// keeps a reset token from ever standing in for a session token.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        // No leeway: a token is invalid the moment exp passes.
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?;
        if data.claims.kind != expected {
            return Err(TokenError::PurposeMismatch);
        }
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    fn keys_with_secret(secret: &str) -> JwtKeys {
        let mut keys = make_keys();
        keys.encoding = EncodingKey::from_secret(secret.as_bytes());
        keys.decoding = DecodingKey::from_secret(secret.as_bytes());
        keys
    }

    #[tokio::test]
    async     fn sign_and_verify_session_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_session(user_id).expect("sign session");
        let claims = keys.verify(&token, TokenKind::Session).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Session);
    }

    #[tokio::test]
    async     fn sign_and_verify_reset_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_reset(user_id).expect("sign reset");
        let claims = keys.verify(&token, TokenKind::Reset).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Reset);
    }

    #[tokio::test]
    async     fn reset_token_never_verifies_as_session() {
        let keys = make_keys();
        let token = keys.sign_reset(Uuid::new_v4()).expect("sign reset");
        let err = keys.verify(&token, TokenKind::Session).unwrap_err();
        assert_eq!(err, TokenError::PurposeMismatch);
    }

    #[tokio::test]
    async     fn session_token_never_verifies_as_reset() {
        let keys = make_keys();
        let token = keys.sign_session(Uuid::new_v4()).expect("sign session");
        let err = keys.verify(&token, TokenKind::Reset).unwrap_err();
        assert_eq!(err, TokenError::PurposeMismatch);
    }

    #[tokio::test]
    async     fn expired_token_fails_with_expired() {
        let keys = make_keys();
        let token = keys
            .sign_with_ttl(Uuid::new_v4(), TokenKind::Session, TimeDuration::seconds(-5))
            .expect("sign");
        let err = keys.verify(&token, TokenKind::Session).unwrap_err();
        assert_eq!(err, TokenError::Expired);
    }

    #[tokio::test]
    async     fn garbage_fails_with_malformed() {
        let keys = make_keys();
        let err = keys.verify("not-a-token", TokenKind::Session).unwrap_err();
        assert_eq!(err, TokenError::Malformed);
    }

    #[tokio::test]
    async     fn wrong_secret_fails_with_malformed() {
        let keys = make_keys();
        let other = keys_with_secret("some-other-secret");
        let token = other.sign_session(Uuid::new_v4()).expect("sign");
        let err = keys.verify(&token, TokenKind::Session).unwrap_err();
        assert_eq!(err, TokenError::Malformed);
    }
}
