use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    AppState,
    auth::Session,
    config::AppConfig,
    entities::{EntityKind, MIN_PASSWORD_LEN, PASSWORD_SCHEMA, PROFILE_SCHEMA},
    error::{AppError, LOGIN_PATH, ValidationErrors},
    models::{
        ActionResponse, ChangePassword, DashboardView, LoginRequest, LoginResponse, PageQuery,
        PanelStatus, PanelView, PaymentsView, ProfileResponse, Record, Toast, UserDetailView,
        UsersView,
    },
    panel::{Command, PanelContext, ResourcePanel},
    schema::{Mode, Submission, Upload},
};

/// Where a signed-in admin lands.
pub const HOME_PATH: &str = "/dashboard";

// --- Query Structs ---

/// DashboardQuery
///
/// The revenue chart's year selector. Defaults to the current calendar year.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct DashboardQuery {
    pub year: Option<i32>,
}

/// UserDetailQuery
///
/// Selects the active stat/history tab and the page shown inside it.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct UserDetailQuery {
    /// Entity key of the active tab, e.g. `rating`. Defaults to the first tab.
    pub tab: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// DeleteQuery
///
/// A delete is only sent upstream with `confirm=true`.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct DeleteQuery {
    #[serde(default)]
    pub confirm: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// --- Helpers ---

fn panel_context<'a>(state: &'a AppState, session: &'a Session) -> PanelContext<'a> {
    PanelContext {
        backend: state.backend.as_ref(),
        cache: &state.cache,
        mutations: &state.mutations,
        session,
    }
}

fn parse_entity(key: &str) -> Result<EntityKind, AppError> {
    EntityKind::from_key(key).ok_or_else(|| AppError::UnknownEntity(key.to_string()))
}

fn current_year() -> i32 {
    Utc::now().year()
}

/// Reads a panel form from either a JSON object or a multipart body.
async fn read_submission(request: Request) -> Result<Submission, AppError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !is_multipart {
        let Json(fields) = Json::<Map<String, Value>>::from_request(request, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return Ok(Submission::from_fields(fields));
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    let mut submission = Submission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                // Browsers send an empty part when no file was picked.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                submission.files.push(Upload {
                    field: name,
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                submission.fields.insert(name, Value::String(text));
            }
        }
    }

    Ok(submission)
}

/// Business and transport failures still answer with the panel, so the unchanged list is
/// rendered next to the error toast.
fn mutation_response(
    panel: &ResourcePanel,
    outcome: Result<(), AppError>,
    success: StatusCode,
) -> Result<(StatusCode, Json<PanelView>), AppError> {
    match outcome {
        Ok(()) => Ok((success, Json(panel.view()))),
        Err(e @ (AppError::Business(_) | AppError::Transport(_))) => {
            Ok((e.status(), Json(panel.view())))
        }
        Err(e) => Err(e),
    }
}

// --- Session ---

/// login_page
///
/// [Public Route] Sends an already signed-in admin straight to the dashboard.
#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 204, description = "No admin session; show the login form"),
        (status = 303, description = "Already signed in")
    )
)]
pub async fn login_page(State(config): State<AppConfig>, headers: HeaderMap) -> Response {
    match Session::from_headers(&headers, &config) {
        Some(session) if session.is_admin() => Redirect::to(HOME_PATH).into_response(),
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

/// login
///
/// [Public Route] Exchanges credentials at the identity provider and stores the issued
/// token in the session cookie.
///
/// *Authorization*: only tokens carrying the admin role are accepted. Anyone else is
/// refused here, before a cookie is set, so the guard never sees them.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Rejected credentials"),
        (status = 422, description = "Missing email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(credentials): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let mut errors = ValidationErrors::default();
    if credentials.email.trim().is_empty() {
        errors.add("email", "Email is required");
    }
    if credentials.password.is_empty() {
        errors.add("password", "Password is required");
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let token = state.backend.login(&credentials).await?;
    let session = Session::verify(&token, &state.config.jwt_secret)
        .ok_or_else(|| AppError::Business("Received an invalid session token".to_string()))?;

    if !session.is_admin() {
        tracing::info!(sub = %session.claims().sub, "non-admin login refused");
        return Err(AppError::Business(
            "Only administrators can sign in to the dashboard".to_string(),
        ));
    }

    tracing::info!(sub = %session.claims().sub, "admin signed in");
    let cookie = Cookie::build((state.config.session_cookie.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.is_production())
        .build();

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            success: true,
            redirect: HOME_PATH.to_string(),
        }),
    ))
}

/// logout
///
/// [Public Route] Drops the session cookie and returns to the login screen.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 303, description = "Signed out"))
)]
pub async fn logout(State(config): State<AppConfig>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar.remove(Cookie::build(config.session_cookie).path("/"));
    (jar, Redirect::to(LOGIN_PATH))
}

// --- Dashboard & Revenue ---

/// dashboard
///
/// [Admin Route] Headline counters plus the monthly revenue chart for `year`.
/// The three upstream reads are independent and run concurrently.
#[utoipa::path(
    get,
    path = "/dashboard",
    params(DashboardQuery),
    responses((status = 200, description = "Dashboard overview", body = DashboardView))
)]
pub async fn dashboard(
    session: Session,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardView>, AppError> {
    let year = query.year.unwrap_or_else(current_year);
    let backend = state.backend.as_ref();

    let (overview, total_revenue, monthly_revenue) = tokio::join!(
        backend.overview(&session),
        backend.total_revenue(&session),
        backend.monthly_revenue(&session, year),
    );

    Ok(Json(DashboardView {
        year,
        overview: overview?,
        total_revenue: total_revenue?,
        monthly_revenue: monthly_revenue?,
    }))
}

/// payments
///
/// [Admin Route] Paginated player payments for the selected year.
#[utoipa::path(
    get,
    path = "/payments",
    params(PageQuery),
    responses((status = 200, description = "Player payments", body = PaymentsView))
)]
pub async fn payments(
    session: Session,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PaymentsView>, AppError> {
    let year = query.year.unwrap_or_else(current_year);
    let query = PageQuery {
        year: Some(year),
        search: None,
        ..query.normalized(state.config.page_size)
    };

    let page = state.backend.player_revenue(&session, &query).await?;
    let status = if page.total == 0 && page.records.is_empty() {
        PanelStatus::Empty
    } else {
        PanelStatus::Populated
    };

    Ok(Json(PaymentsView {
        year,
        status,
        pagination: page.pagination(),
        payments: page.records,
    }))
}

// --- User Management ---

/// list_users
///
/// [Admin Route] Paginated user list with optional name/email search.
#[utoipa::path(
    get,
    path = "/user-management",
    params(PageQuery),
    responses((status = 200, description = "Users", body = UsersView))
)]
pub async fn list_users(
    session: Session,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<UsersView>, AppError> {
    let query = PageQuery {
        year: None,
        ..query.normalized(state.config.page_size)
    };
    let page = state.backend.list_users(&session, &query).await?;

    Ok(Json(UsersView {
        pagination: page.pagination(),
        users: page.records,
        search: query.search,
    }))
}

/// user_detail
///
/// [Admin Route] A player's profile, the tab list and the selected tab's panel.
#[utoipa::path(
    get,
    path = "/user-management/{id}",
    params(UserDetailQuery),
    responses(
        (status = 200, description = "User detail", body = UserDetailView),
        (status = 404, description = "Unknown tab")
    )
)]
pub async fn user_detail(
    session: Session,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<UserDetailQuery>,
) -> Result<Json<UserDetailView>, AppError> {
    let entity = match query.tab.as_deref() {
        Some(key) => parse_entity(key)?,
        None => EntityKind::ALL[0],
    };
    let page_query = PageQuery {
        page: query.page,
        limit: query.limit,
        year: None,
        search: None,
    };

    let ctx = panel_context(&state, &session);
    let mut panel =
        ResourcePanel::new(entity, user_id.clone(), &page_query, state.config.page_size);
    let (user, loaded) = tokio::join!(
        state.backend.get_user(&session, &user_id),
        panel.load(&ctx),
    );
    loaded?;

    Ok(Json(UserDetailView {
        user: user?,
        tabs: EntityKind::tabs(),
        active_tab: entity.key().to_string(),
        panel: panel.view(),
    }))
}

/// update_profile
///
/// [Admin Route] Edits a player's profile fields. Validated before anything is sent.
#[utoipa::path(
    put,
    path = "/user-management/{id}",
    request_body = Record,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 422, description = "Invalid fields")
    )
)]
pub async fn update_profile(
    session: Session,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<ProfileResponse>, AppError> {
    let clean = PROFILE_SCHEMA
        .validate(&Submission::from_fields(fields), Mode::Update)
        .map_err(AppError::Validation)?;

    let user = state
        .backend
        .update_user(&session, &user_id, &clean.fields)
        .await?;

    Ok(Json(ProfileResponse {
        user,
        toast: Toast::success("Profile updated successfully"),
    }))
}

/// change_password
///
/// [Admin Route] Changes the signed-in admin's password.
#[utoipa::path(
    post,
    path = "/change-password",
    request_body = Record,
    responses(
        (status = 200, description = "Password changed", body = ActionResponse),
        (status = 422, description = "Invalid fields")
    )
)]
pub async fn change_password(
    session: Session,
    State(state): State<AppState>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<ActionResponse>, AppError> {
    let submission = Submission::from_fields(fields);
    PASSWORD_SCHEMA
        .validate(&submission, Mode::Create)
        .map_err(AppError::Validation)?;

    // Passwords are forwarded exactly as typed.
    let raw = |name: &str| {
        submission
            .fields
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let (old_password, new_password) = (raw("oldPassword"), raw("newPassword"));

    let mut errors = ValidationErrors::default();
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "newPassword",
            format!("New password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
    if raw("confirmPassword") != new_password {
        errors.add("confirmPassword", "Passwords do not match");
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let message = state
        .backend
        .change_password(
            &session,
            &ChangePassword {
                old_password,
                new_password,
            },
        )
        .await?;

    Ok(Json(ActionResponse {
        success: true,
        toast: Toast::success(message),
    }))
}

// --- Resource Panels ---

/// list_panel
///
/// [Admin Route] One page of `owner_id`'s records for `entity`.
#[utoipa::path(
    get,
    path = "/panels/{entity}/{owner_id}",
    params(PageQuery),
    responses(
        (status = 200, description = "Panel", body = PanelView),
        (status = 404, description = "Unknown entity")
    )
)]
pub async fn list_panel(
    session: Session,
    State(state): State<AppState>,
    Path((entity, owner_id)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PanelView>, AppError> {
    let entity = parse_entity(&entity)?;
    let ctx = panel_context(&state, &session);
    let mut panel = ResourcePanel::new(entity, owner_id, &query, state.config.page_size);
    panel.load(&ctx).await?;
    Ok(Json(panel.view()))
}

/// create_panel_record
///
/// [Admin Route] Adds a record from the panel's modal. Accepts JSON, or multipart for
/// entities carrying an image.
#[utoipa::path(
    post,
    path = "/panels/{entity}/{owner_id}",
    params(PageQuery),
    request_body = Record,
    responses(
        (status = 201, description = "Record added; refreshed panel", body = PanelView),
        (status = 400, description = "Backend refused; unchanged panel with toast", body = PanelView),
        (status = 409, description = "Another request for this panel is in flight"),
        (status = 422, description = "Invalid fields")
    )
)]
pub async fn create_panel_record(
    session: Session,
    State(state): State<AppState>,
    Path((entity, owner_id)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
    request: Request,
) -> Result<(StatusCode, Json<PanelView>), AppError> {
    let entity = parse_entity(&entity)?;
    let submission = read_submission(request).await?;

    let ctx = panel_context(&state, &session);
    let mut panel = ResourcePanel::new(entity, owner_id, &query, state.config.page_size);
    panel.load(&ctx).await?;

    let outcome = panel.submit(&ctx, Command::Create(submission)).await;
    mutation_response(&panel, outcome.map(|_| ()), StatusCode::CREATED)
}

/// update_panel_record
///
/// [Admin Route] Edits one record from the panel's modal.
#[utoipa::path(
    put,
    path = "/panels/{entity}/{owner_id}/{record_id}",
    params(PageQuery),
    request_body = Record,
    responses(
        (status = 200, description = "Record updated; refreshed panel", body = PanelView),
        (status = 400, description = "Backend refused; unchanged panel with toast", body = PanelView),
        (status = 422, description = "Invalid fields")
    )
)]
pub async fn update_panel_record(
    session: Session,
    State(state): State<AppState>,
    Path((entity, owner_id, record_id)): Path<(String, String, String)>,
    Query(query): Query<PageQuery>,
    request: Request,
) -> Result<(StatusCode, Json<PanelView>), AppError> {
    let entity = parse_entity(&entity)?;
    let body = read_submission(request).await?;

    let ctx = panel_context(&state, &session);
    let mut panel = ResourcePanel::new(entity, owner_id, &query, state.config.page_size);
    panel.load(&ctx).await?;

    let outcome = panel
        .submit(&ctx, Command::Update { record_id, body })
        .await;
    mutation_response(&panel, outcome.map(|_| ()), StatusCode::OK)
}

/// delete_panel_record
///
/// [Admin Route] Deletes one record. Without `confirm=true` nothing is sent and the
/// confirmation prompt is returned with `428`.
#[utoipa::path(
    delete,
    path = "/panels/{entity}/{owner_id}/{record_id}",
    params(DeleteQuery),
    responses(
        (status = 200, description = "Record deleted; refreshed panel", body = PanelView),
        (status = 400, description = "Backend refused; unchanged panel with toast", body = PanelView),
        (status = 428, description = "Confirmation required")
    )
)]
pub async fn delete_panel_record(
    session: Session,
    State(state): State<AppState>,
    Path((entity, owner_id, record_id)): Path<(String, String, String)>,
    Query(query): Query<DeleteQuery>,
) -> Result<(StatusCode, Json<PanelView>), AppError> {
    let entity = parse_entity(&entity)?;
    let page_query = PageQuery {
        page: query.page,
        limit: query.limit,
        year: None,
        search: None,
    };

    let ctx = panel_context(&state, &session);
    let mut panel =
        ResourcePanel::new(entity, owner_id, &page_query, state.config.page_size);
    panel.load(&ctx).await?;

    let prompt = panel.request_delete(record_id)?;
    if !query.confirm {
        tracing::debug!(%prompt, "delete awaiting confirmation");
        panel.cancel_delete();
        return Err(AppError::ConfirmationRequired(entity.label().to_lowercase()));
    }

    let outcome = panel.confirm_delete(&ctx).await;
    mutation_response(&panel, outcome, StatusCode::OK)
}
