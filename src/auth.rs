use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::{config::AppConfig, error::AppError};

/// The only role allowed past the access guard.
pub const ADMIN_ROLE: &str = "admin";

/// Claims
///
/// Payload of the session token issued by the identity provider. The dashboard only reads
/// it; issuing and revoking sessions is the provider's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the identity provider's user id.
    pub sub: String,
    /// Role claim, `admin` or anything else.
    pub role: String,
    /// Expiration time. Expired tokens are treated exactly like missing ones.
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Session
///
/// A verified session: the raw bearer credential plus its decoded claims.
/// It is passed explicitly into every backend call, so no upstream request can be issued
/// without one. The only constructors are the verifying ones below.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    claims: Claims,
}

impl Session {
    /// Verifies `token` against `secret`. Any decode failure (bad signature, malformed,
    /// expired) yields `None`; callers treat that as "no session".
    pub fn verify(token: &str, secret: &str) -> Option<Session> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        match decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
            Ok(data) => Some(Session {
                token: token.to_string(),
                claims: data.claims,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "session token rejected");
                None
            }
        }
    }

    /// Resolves the session from a request's headers: `Authorization: Bearer` first,
    /// then the session cookie.
    pub fn from_headers(headers: &HeaderMap, config: &AppConfig) -> Option<Session> {
        let token = bearer_token(headers).or_else(|| cookie_token(headers, &config.session_cookie))?;
        Session::verify(&token, &config.jwt_secret)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn is_admin(&self) -> bool {
        self.claims.role == ADMIN_ROLE
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn cookie_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Session Extractor Implementation
///
/// Handlers take `Session` as an argument to receive the caller's verified credential.
/// On guarded routes the access guard has already stored it in the request extensions;
/// anywhere else the headers are decoded again. Non-admin sessions are rejected here too,
/// so a handler mounted outside the guard still cannot act for a non-admin.
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }

        let config = AppConfig::from_ref(state);
        Session::from_headers(&parts.headers, &config)
            .filter(Session::is_admin)
            .ok_or(AppError::Unauthorized)
    }
}
