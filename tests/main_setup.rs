use pitchside_admin::{AppConfig, config::Env};
use serial_test::serial;
use std::{env, panic};

const CONFIG_VARS: &[&str] = &[
    "APP_ENV",
    "JWT_SECRET",
    "BACKEND_URL",
    "AUTH_URL",
    "PUBLIC_PREFIXES",
    "PAGE_SIZE",
    "SESSION_COOKIE",
    "CACHE_TTL_SECS",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with a clean config environment and restores the previous values afterwards.
fn run_with_env<T, R>(test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals.into_iter().rev() {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_production_without_jwt_secret_fails_fast() {
    let result = run_with_env(|| {
        panic::catch_unwind(|| {
            unsafe {
                env::set_var("APP_ENV", "production");
                env::set_var("BACKEND_URL", "https://api.example.com/api/v1");
            }
            AppConfig::load()
        })
    });

    assert!(
        result.is_err(),
        "Production config loading should panic without JWT_SECRET"
    );
}

#[test]
#[serial]
fn test_production_without_backend_url_fails_fast() {
    let result = run_with_env(|| {
        panic::catch_unwind(|| {
            unsafe {
                env::set_var("APP_ENV", "production");
                env::set_var("JWT_SECRET", "prod-secret");
            }
            AppConfig::load()
        })
    });

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_local_env_defaults() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("APP_ENV", "local");
        }
        AppConfig::load()
    });

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.page_size, 8);
    assert_eq!(config.session_cookie, "session-token");
    assert_eq!(config.auth_url, config.backend_url);
    assert!(config.public_prefixes.iter().any(|p| p == "/login"));
    assert!(config.public_prefixes.iter().any(|p| p == "/_next"));
    assert!(!config.is_production());
}

#[test]
#[serial]
fn test_overrides_are_read_and_normalised() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("BACKEND_URL", "http://backend:5000/api/v1/");
            env::set_var("AUTH_URL", "http://auth:7000/");
            env::set_var("PUBLIC_PREFIXES", " /login, /health/ ,, /static ");
            env::set_var("PAGE_SIZE", "20");
            env::set_var("SESSION_COOKIE", "admin-session");
        }
        AppConfig::load()
    });

    assert_eq!(config.backend_url, "http://backend:5000/api/v1");
    assert_eq!(config.auth_url, "http://auth:7000");
    assert_eq!(config.public_prefixes, vec!["/login", "/health", "/static"]);
    assert_eq!(config.page_size, 20);
    assert_eq!(config.session_cookie, "admin-session");
}

#[test]
#[serial]
fn test_unparsable_numbers_fall_back_to_defaults() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("PAGE_SIZE", "eight");
            env::set_var("CACHE_TTL_SECS", "-5");
        }
        AppConfig::load()
    });

    assert_eq!(config.page_size, 8);
    assert_eq!(config.cache_ttl_secs, 30);
}
