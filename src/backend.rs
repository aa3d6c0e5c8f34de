use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    RequestBuilder, StatusCode, Url,
    multipart::{Form, Part},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    auth::Session,
    config::AppConfig,
    entities::{BodyEncoding, EntityKind},
    error::AppError,
    models::{
        ChangePassword, DashboardOverview, LoginRequest, MonthlyRevenue, Page, PageQuery,
        PaymentRecord, Record, TotalRevenue, UserSummary,
    },
    schema::Submission,
};

/// Backend Trait
///
/// The contract for every call the dashboard makes against the REST backend. Handlers and
/// panels only see this trait, so the real HTTP client and the in-memory backend used by
/// tests are interchangeable.
///
/// Every data call takes the caller's `Session` explicitly: there is no way to issue an
/// authenticated read or write without a verified credential in hand.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Exchanges credentials for a session token at the identity provider.
    async fn login(&self, credentials: &LoginRequest) -> Result<String, AppError>;

    // --- Panel Resources ---
    async fn list_records(
        &self,
        session: &Session,
        entity: EntityKind,
        owner_id: &str,
        query: &PageQuery,
    ) -> Result<Page<Record>, AppError>;
    async fn create_record(
        &self,
        session: &Session,
        entity: EntityKind,
        owner_id: &str,
        body: &Submission,
    ) -> Result<Record, AppError>;
    async fn update_record(
        &self,
        session: &Session,
        entity: EntityKind,
        record_id: &str,
        body: &Submission,
    ) -> Result<Record, AppError>;
    async fn delete_record(
        &self,
        session: &Session,
        entity: EntityKind,
        record_id: &str,
    ) -> Result<(), AppError>;

    // --- Users ---
    async fn list_users(
        &self,
        session: &Session,
        query: &PageQuery,
    ) -> Result<Page<UserSummary>, AppError>;
    async fn get_user(&self, session: &Session, user_id: &str) -> Result<UserSummary, AppError>;
    async fn update_user(
        &self,
        session: &Session,
        user_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<UserSummary, AppError>;

    // --- Revenue ---
    async fn overview(&self, session: &Session) -> Result<DashboardOverview, AppError>;
    async fn total_revenue(&self, session: &Session) -> Result<TotalRevenue, AppError>;
    async fn monthly_revenue(
        &self,
        session: &Session,
        year: i32,
    ) -> Result<Vec<MonthlyRevenue>, AppError>;
    async fn player_revenue(
        &self,
        session: &Session,
        query: &PageQuery,
    ) -> Result<Page<PaymentRecord>, AppError>;

    /// Returns the backend's confirmation message.
    async fn change_password(
        &self,
        session: &Session,
        request: &ChangePassword,
    ) -> Result<String, AppError>;
}

/// The shared handle stored in application state.
pub type BackendState = Arc<dyn Backend>;

// --- Wire Envelope ---

/// PageMeta
///
/// Pagination metadata as reported by the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(alias = "totalCount", alias = "totalItems")]
    pub total: Option<u64>,
}

/// Envelope
///
/// Every backend response is `{success, message, data, meta}`. `success` may be omitted,
/// in which case the HTTP status decides.
#[derive(Debug, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

/// List payloads arrive either as a bare array (with top-level `meta`) or wrapped as
/// `{result, meta}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListPayload<T> {
    Items(Vec<T>),
    Wrapped {
        #[serde(alias = "data", alias = "items")]
        result: Vec<T>,
        #[serde(default)]
        meta: Option<PageMeta>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    #[serde(alias = "token", alias = "access_token")]
    access_token: String,
}

impl Envelope {
    /// Deserialises `data` into `T`. A shape mismatch is a transport-level failure.
    pub fn data<T: DeserializeOwned>(self, endpoint: &str) -> Result<T, AppError> {
        serde_json::from_value(self.data.unwrap_or(Value::Null)).map_err(|e| {
            AppError::Transport(format!("{endpoint}: unexpected response shape: {e}"))
        })
    }

    /// Deserialises a list payload into a page, taking `total` from whichever meta block
    /// is present and falling back to the number of records returned.
    pub fn page<T: DeserializeOwned>(
        self,
        endpoint: &str,
        page: u32,
        limit: u32,
    ) -> Result<Page<T>, AppError> {
        let top_meta = self.meta.clone();
        let payload: ListPayload<T> = self.data(endpoint)?;
        let (records, nested_meta) = match payload {
            ListPayload::Items(records) => (records, None),
            ListPayload::Wrapped { result, meta } => (result, meta),
        };
        let meta = nested_meta.or(top_meta).unwrap_or_default();
        let total = meta.total.unwrap_or(records.len() as u64);

        Ok(Page {
            records,
            total,
            page: meta.page.unwrap_or(page),
            limit: meta.limit.unwrap_or(limit),
        })
    }
}

// --- The Real Implementation ---

/// HttpBackend
///
/// `reqwest` client for the REST backend. Attaches the session's bearer credential to every
/// call and maps responses onto the dashboard's error taxonomy:
/// - 401/403: `Unauthorized` (the session is sent back to the login screen)
/// - non-2xx or `success:false` with a message: `Business`
/// - anything else unreadable: `Transport`
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    auth_url: Url,
    page_size: u32,
}

/// Whether a 401/403 means the caller's session was rejected. At login there is no session
/// yet, so a refusal there is an ordinary failure with a message to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthContext {
    Session,
    Login,
}

impl HttpBackend {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Transport(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: parse_base(&config.backend_url)?,
            auth_url: parse_base(&config.auth_url)?,
            page_size: config.page_size,
        })
    }

    /// Appends each segment as exactly one path segment of the backend URL.
    fn url(&self, segments: &[&str]) -> Result<Url, AppError> {
        join_segments(&self.base_url, segments)
    }

    fn page_params(&self, query: &PageQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", query.page().to_string()),
            ("limit", query.limit_or(self.page_size).to_string()),
        ];
        if let Some(year) = query.year {
            params.push(("year", year.to_string()));
        }
        if let Some(search) = &query.search {
            params.push(("searchTerm", search.clone()));
        }
        params
    }

    fn with_body(
        &self,
        request: RequestBuilder,
        entity: EntityKind,
        body: &Submission,
    ) -> Result<RequestBuilder, AppError> {
        match entity.encoding() {
            BodyEncoding::Json => Ok(request.json(&body.fields)),
            BodyEncoding::Multipart => Ok(request.multipart(multipart_form(body)?)),
        }
    }

    /// Sends one request and unwraps its envelope. No retries: every failure is terminal.
    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Envelope, AppError> {
        self.send_as(request, endpoint, AuthContext::Session).await
    }

    async fn send_as(
        &self,
        request: RequestBuilder,
        endpoint: &str,
        context: AuthContext,
    ) -> Result<Envelope, AppError> {
        tracing::debug!(endpoint, "calling backend");

        let response = request.send().await.map_err(|e| {
            tracing::warn!(endpoint, error = %e, "backend request failed");
            AppError::Transport(format!("{endpoint}: {e}"))
        })?;

        let status = response.status();
        let refused = status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;
        if refused && context == AuthContext::Session {
            tracing::info!(endpoint, %status, "backend rejected the session");
            return Err(AppError::Unauthorized);
        }

        let body = response.bytes().await?;
        let envelope: Envelope = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                return Err(AppError::Transport(format!(
                    "{endpoint}: unreadable response ({status}): {e}"
                )));
            }
        };

        if !status.is_success() || envelope.success == Some(false) {
            return match envelope.message.filter(|m| !m.trim().is_empty()) {
                Some(message) => {
                    tracing::warn!(endpoint, %status, %message, "backend reported failure");
                    Err(AppError::Business(message))
                }
                None => Err(AppError::Transport(format!("{endpoint}: responded with {status}"))),
            };
        }

        Ok(envelope)
    }
}

fn parse_base(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw)
        .map_err(|e| AppError::Transport(format!("invalid backend url {raw:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(AppError::Transport(format!("backend url {raw:?} cannot carry a path")));
    }
    Ok(url)
}

fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, AppError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| AppError::Transport(format!("backend url {base} cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Ids come from the dashboard's own path and must name a single upstream resource.
fn path_id(id: &str) -> Result<&str, AppError> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(AppError::BadRequest(format!("invalid identifier {id:?}")));
    }
    Ok(id)
}

/// Builds a multipart body: scalar fields as text parts, uploads as file parts.
fn multipart_form(body: &Submission) -> Result<Form, AppError> {
    let mut form = Form::new();
    for (name, value) in &body.fields {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        form = form.text(name.clone(), text);
    }
    for upload in &body.files {
        let mut part = Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
        if let Some(content_type) = &upload.content_type {
            part = part.mime_str(content_type).map_err(|e| {
                AppError::BadRequest(format!("invalid content type for {}: {e}", upload.field))
            })?;
        }
        form = form.part(upload.field.clone(), part);
    }
    Ok(form)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn login(&self, credentials: &LoginRequest) -> Result<String, AppError> {
        let endpoint = "auth/login";
        let request = self
            .client
            .post(join_segments(&self.auth_url, &["auth", "login"])?)
            .json(credentials);
        let data: LoginData = self
            .send_as(request, endpoint, AuthContext::Login)
            .await?
            .data(endpoint)?;
        Ok(data.access_token)
    }

    async fn list_records(
        &self,
        session: &Session,
        entity: EntityKind,
        owner_id: &str,
        query: &PageQuery,
    ) -> Result<Page<Record>, AppError> {
        let owner_id = path_id(owner_id)?;
        let endpoint = format!("{}/{owner_id}", entity.path());
        let request = self
            .client
            .get(self.url(&[entity.path(), owner_id])?)
            .bearer_auth(session.token())
            .query(&self.page_params(query));
        self.send(request, &endpoint)
            .await?
            .page(&endpoint, query.page(), query.limit_or(self.page_size))
    }

    async fn create_record(
        &self,
        session: &Session,
        entity: EntityKind,
        owner_id: &str,
        body: &Submission,
    ) -> Result<Record, AppError> {
        let owner_id = path_id(owner_id)?;
        let endpoint = format!("{}/{owner_id}", entity.path());
        let request = self
            .client
            .post(self.url(&[entity.path(), owner_id])?)
            .bearer_auth(session.token());
        let request = self.with_body(request, entity, body)?;
        record_or_empty(self.send(request, &endpoint).await?, &endpoint)
    }

    async fn update_record(
        &self,
        session: &Session,
        entity: EntityKind,
        record_id: &str,
        body: &Submission,
    ) -> Result<Record, AppError> {
        let record_id = path_id(record_id)?;
        let endpoint = format!("{}/{record_id}", entity.path());
        let request = self
            .client
            .put(self.url(&[entity.path(), record_id])?)
            .bearer_auth(session.token());
        let request = self.with_body(request, entity, body)?;
        record_or_empty(self.send(request, &endpoint).await?, &endpoint)
    }

    async fn delete_record(
        &self,
        session: &Session,
        entity: EntityKind,
        record_id: &str,
    ) -> Result<(), AppError> {
        let record_id = path_id(record_id)?;
        let endpoint = format!("{}/{record_id}", entity.path());
        let request = self
            .client
            .delete(self.url(&[entity.path(), record_id])?)
            .bearer_auth(session.token());
        self.send(request, &endpoint).await.map(|_| ())
    }

    async fn list_users(
        &self,
        session: &Session,
        query: &PageQuery,
    ) -> Result<Page<UserSummary>, AppError> {
        let endpoint = "user/all-user";
        let request = self
            .client
            .get(self.url(&["user", "all-user"])?)
            .bearer_auth(session.token())
            .query(&self.page_params(query));
        self.send(request, endpoint)
            .await?
            .page(endpoint, query.page(), query.limit_or(self.page_size))
    }

    async fn get_user(&self, session: &Session, user_id: &str) -> Result<UserSummary, AppError> {
        let user_id = path_id(user_id)?;
        let endpoint = format!("user/{user_id}");
        let request = self
            .client
            .get(self.url(&["user", user_id])?)
            .bearer_auth(session.token());
        self.send(request, &endpoint).await?.data(&endpoint)
    }

    async fn update_user(
        &self,
        session: &Session,
        user_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<UserSummary, AppError> {
        let user_id = path_id(user_id)?;
        let endpoint = format!("user/{user_id}");
        let request = self
            .client
            .put(self.url(&["user", user_id])?)
            .bearer_auth(session.token())
            .json(fields);
        self.send(request, &endpoint).await?.data(&endpoint)
    }

    async fn overview(&self, session: &Session) -> Result<DashboardOverview, AppError> {
        let endpoint = "dashboard/overview";
        let request = self
            .client
            .get(self.url(&["dashboard", "overview"])?)
            .bearer_auth(session.token());
        self.send(request, endpoint).await?.data(endpoint)
    }

    async fn total_revenue(&self, session: &Session) -> Result<TotalRevenue, AppError> {
        let endpoint = "dashboard/total-revenue";
        let request = self
            .client
            .get(self.url(&["dashboard", "total-revenue"])?)
            .bearer_auth(session.token());
        self.send(request, endpoint).await?.data(endpoint)
    }

    async fn monthly_revenue(
        &self,
        session: &Session,
        year: i32,
    ) -> Result<Vec<MonthlyRevenue>, AppError> {
        let endpoint = "dashboard/monthly-revenue-chart";
        let request = self
            .client
            .get(self.url(&["dashboard", "monthly-revenue-chart"])?)
            .bearer_auth(session.token())
            .query(&[("year", year)]);
        self.send(request, endpoint).await?.data(endpoint)
    }

    async fn player_revenue(
        &self,
        session: &Session,
        query: &PageQuery,
    ) -> Result<Page<PaymentRecord>, AppError> {
        // Path spelling is the backend's.
        let endpoint = "dashboard/all-player-reveneue";
        let request = self
            .client
            .get(self.url(&["dashboard", "all-player-reveneue"])?)
            .bearer_auth(session.token())
            .query(&self.page_params(query));
        self.send(request, endpoint)
            .await?
            .page(endpoint, query.page(), query.limit_or(self.page_size))
    }

    async fn change_password(
        &self,
        session: &Session,
        request: &ChangePassword,
    ) -> Result<String, AppError> {
        let endpoint = "auth/change-password";
        let http_request = self
            .client
            .post(self.url(&["auth", "change-password"])?)
            .bearer_auth(session.token())
            .json(request);
        let envelope = self.send(http_request, endpoint).await?;
        Ok(envelope
            .message
            .unwrap_or_else(|| "Password changed successfully".to_string()))
    }
}

/// Mutations may answer with the stored record or with no data at all.
fn record_or_empty(envelope: Envelope, endpoint: &str) -> Result<Record, AppError> {
    match envelope.data {
        None | Some(Value::Null) => Ok(Record::default()),
        Some(data) => Envelope {
            data: Some(data),
            ..Envelope::default()
        }
        .data(endpoint),
    }
}
