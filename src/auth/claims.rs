use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purpose of a JWT: a session credential or a password-reset grant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Session,
    Reset,
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub iat: usize,      // issued at (unix timestamp)
    pub exp: usize,      // expires at (unix timestamp)
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // token purpose
}
