use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{auth::Session, config::AppConfig, error::LOGIN_PATH};

/// is_public_path
///
/// True when `path` equals one of the allow-listed prefixes or lives underneath one
/// (`/login`, `/login/reset`), but not for look-alikes such as `/loginx`.
pub fn is_public_path(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        path == prefix
            || path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// access_guard
///
/// The perimeter middleware applied to every route.
///
/// *Mechanism*: public prefixes pass through untouched. For everything else the session
/// token is decoded exactly once; a missing token, a decode failure, an expired token and a
/// non-admin role all produce the same `303` redirect to the login screen. The guard never
/// errors and never retries. Verified admin sessions are stored in the request extensions
/// for the `Session` extractor.
pub async fn access_guard(
    State(config): State<AppConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_public_path(request.uri().path(), &config.public_prefixes) {
        return next.run(request).await;
    }

    match Session::from_headers(request.headers(), &config) {
        Some(session) if session.is_admin() => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Some(session) => {
            tracing::info!(
                sub = %session.claims().sub,
                role = %session.claims().role,
                path = %request.uri().path(),
                "non-admin session redirected to login"
            );
            Redirect::to(LOGIN_PATH).into_response()
        }
        None => {
            tracing::debug!(path = %request.uri().path(), "no valid session, redirecting to login");
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec!["/login".to_string(), "/_next".to_string(), "/favicon.ico".to_string()]
    }

    #[test]
    fn exact_and_nested_prefixes_are_public() {
        assert!(is_public_path("/login", &prefixes()));
        assert!(is_public_path("/_next/static/chunk.js", &prefixes()));
        assert!(is_public_path("/favicon.ico", &prefixes()));
    }

    #[test]
    fn look_alike_paths_are_protected() {
        assert!(!is_public_path("/loginx", &prefixes()));
        assert!(!is_public_path("/user-management", &prefixes()));
        assert!(!is_public_path("/", &prefixes()));
    }
}
