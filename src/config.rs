use std::env;

/// Prefixes that bypass the access guard when `PUBLIC_PREFIXES` is not set.
/// Static assets and the auth proxy must stay reachable or the login screen itself breaks.
pub const DEFAULT_PUBLIC_PREFIXES: &[&str] = &[
    "/login",
    "/logout",
    "/health",
    "/_next",
    "/static",
    "/assets",
    "/favicon.ico",
    "/api/auth",
    "/swagger-ui",
    "/api-docs",
];

const LOCAL_JWT_SECRET: &str = "pitchside-local-development-secret";
const LOCAL_BACKEND_URL: &str = "http://localhost:5000/api/v1";

/// AppConfig
///
/// Holds the dashboard's entire configuration state. Loaded once at startup and shared
/// read-only through `FromRef`, so the guard, the backend client and the handlers all see
/// the same values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format, cookie flags and fallbacks.
    pub env: Env,
    // Base URL of the REST backend every panel reads from and writes to.
    pub backend_url: String,
    // Base URL of the identity provider's login endpoint (usually the backend itself).
    pub auth_url: String,
    // Shared HS256 secret used to verify session tokens issued by the identity provider.
    pub jwt_secret: String,
    pub bind_addr: String,
    // Default page size for every paginated list.
    pub page_size: u32,
    // Name of the cookie carrying the session token.
    pub session_cookie: String,
    // Path prefixes the access guard lets through without a session.
    pub public_prefixes: Vec<String>,
    pub request_timeout_secs: u64,
    // Lifetime of a cached list page before it is refetched.
    pub cache_ttl_secs: u64,
}

/// Env
///
/// Runtime context. `Local` enables development fallbacks, `Production` demands every
/// secret explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking configuration used to scaffold test state without touching the
    /// process environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            backend_url: LOCAL_BACKEND_URL.to_string(),
            auth_url: LOCAL_BACKEND_URL.to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            page_size: 8,
            session_cookie: "session-token".to_string(),
            public_prefixes: default_public_prefixes(),
            request_timeout_secs: 30,
            cache_ttl_secs: 30,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment and applies the **fail-fast** principle.
    ///
    /// # Panics
    /// Panics in `Production` when `JWT_SECRET` or `BACKEND_URL` is missing, so the
    /// dashboard never starts with a guard that cannot verify sessions.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let (jwt_secret, backend_url) = match env {
            Env::Production => (
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
                env::var("BACKEND_URL").expect("FATAL: BACKEND_URL must be set in production."),
            ),
            Env::Local => (
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                env::var("BACKEND_URL").unwrap_or_else(|_| LOCAL_BACKEND_URL.to_string()),
            ),
        };
        let backend_url = backend_url.trim_end_matches('/').to_string();

        let auth_url = env::var("AUTH_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| backend_url.clone());

        let public_prefixes = env::var("PUBLIC_PREFIXES")
            .map(|raw| parse_prefixes(&raw))
            .unwrap_or_else(|_| default_public_prefixes());

        Self {
            env,
            backend_url,
            auth_url,
            jwt_secret,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            page_size: parse_or("PAGE_SIZE", 8),
            session_cookie: env::var("SESSION_COOKIE")
                .unwrap_or_else(|_| "session-token".to_string()),
            public_prefixes,
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 30),
            cache_ttl_secs: parse_or("CACHE_TTL_SECS", 30),
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }
}

pub fn default_public_prefixes() -> Vec<String> {
    DEFAULT_PUBLIC_PREFIXES.iter().map(|p| p.to_string()).collect()
}

/// Splits a comma separated prefix list, dropping blanks and trailing slashes.
pub fn parse_prefixes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let trimmed = p.trim_end_matches('/');
            if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() }
        })
        .collect()
}

fn parse_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable config value");
            fallback
        }),
        Err(_) => fallback,
    }
}
