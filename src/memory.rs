use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    auth::Session,
    backend::Backend,
    entities::EntityKind,
    error::AppError,
    models::{
        ChangePassword, DashboardOverview, LoginRequest, MonthlyRevenue, Page, PageQuery,
        PaymentRecord, Record, TotalRevenue, UserSummary,
    },
    schema::Submission,
};

/// Failure
///
/// A failure the in-memory backend can be told to answer with, mirroring what the real
/// backend can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// The session was rejected (401/403).
    Unauthorized,
    /// The network call never completed.
    Transport,
    /// `success:false` with this message.
    Business(String),
}

impl From<&Failure> for AppError {
    fn from(failure: &Failure) -> Self {
        match failure {
            Failure::Unauthorized => AppError::Unauthorized,
            Failure::Transport => AppError::Transport("simulated network failure".to_string()),
            Failure::Business(message) => AppError::Business(message.clone()),
        }
    }
}

struct StoredRecord {
    entity: EntityKind,
    owner_id: String,
    record: Record,
}

#[derive(Default)]
struct MemoryState {
    records: Vec<StoredRecord>,
    users: Vec<UserSummary>,
    payments: Vec<PaymentRecord>,
    overview: DashboardOverview,
    total_revenue: TotalRevenue,
    monthly: HashMap<i32, Vec<MonthlyRevenue>>,
    // email -> (password, token)
    accounts: HashMap<String, (String, String)>,
    // session subject -> current password
    passwords: HashMap<String, String>,
    calls: VecDeque<String>,
    failure: Option<Failure>,
}

/// Calls kept in the log; older ones are dropped.
const MAX_LOGGED_CALLS: usize = 1_000;

/// MemoryBackend
///
/// An in-memory stand-in for the REST backend. It keeps records per entity and owner, hands
/// out UUID identifiers, logs every call it receives and can be told to fail. Integration
/// tests drive the whole router against it, and `BACKEND_URL=memory` runs the dashboard
/// locally without a backend.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Logs the call and returns the injected failure, if any.
    fn enter(&self, call: String) -> Result<MutexGuard<'_, MemoryState>, AppError> {
        let mut state = self.lock();
        if state.calls.len() == MAX_LOGGED_CALLS {
            state.calls.pop_front();
        }
        state.calls.push_back(call);
        if let Some(failure) = &state.failure {
            return Err(failure.into());
        }
        Ok(state)
    }

    // --- Seeding & Inspection ---

    /// Stores a record for `owner_id` and returns its generated id.
    pub fn seed_record(&self, entity: EntityKind, owner_id: &str, fields: Value) -> String {
        let mut map = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let id = Uuid::new_v4().to_string();
        stamp_new(&mut map, &id, owner_id);
        self.lock().records.push(StoredRecord {
            entity,
            owner_id: owner_id.to_string(),
            record: Record(map),
        });
        id
    }

    /// Seeds `count` numbered records and returns their ids in insertion order.
    pub fn seed_records(&self, entity: EntityKind, owner_id: &str, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| self.seed_record(entity, owner_id, serde_json::json!({ "index": i })))
            .collect()
    }

    pub fn seed_user(&self, user: UserSummary) {
        self.lock().users.push(user);
    }

    pub fn seed_payment(&self, payment: PaymentRecord) {
        self.lock().payments.push(payment);
    }

    pub fn set_overview(&self, overview: DashboardOverview, total: TotalRevenue) {
        let mut state = self.lock();
        state.overview = overview;
        state.total_revenue = total;
    }

    pub fn set_monthly_revenue(&self, year: i32, months: Vec<MonthlyRevenue>) {
        self.lock().monthly.insert(year, months);
    }

    /// Registers login credentials and the token the identity provider will issue.
    pub fn register_account(&self, email: &str, password: &str, token: &str) {
        self.lock()
            .accounts
            .insert(email.to_string(), (password.to_string(), token.to_string()));
    }

    pub fn set_password(&self, subject: &str, password: &str) {
        self.lock()
            .passwords
            .insert(subject.to_string(), password.to_string());
    }

    pub fn password_of(&self, subject: &str) -> Option<String> {
        self.lock().passwords.get(subject).cloned()
    }

    /// Every subsequent call fails with `failure` until `clear_failure`.
    pub fn fail_with(&self, failure: Failure) {
        self.lock().failure = Some(failure);
    }

    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }

    /// The most recent calls received, oldest first, e.g. `GET rating/p1?page=1&limit=8`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.iter().cloned().collect()
    }

    pub fn record_count(&self, entity: EntityKind, owner_id: &str) -> usize {
        self.lock()
            .records
            .iter()
            .filter(|stored| stored.entity == entity && stored.owner_id == owner_id)
            .count()
    }
}

fn stamp_new(map: &mut Map<String, Value>, id: &str, owner_id: &str) {
    let now = Utc::now().to_rfc3339();
    map.insert("_id".to_string(), Value::String(id.to_string()));
    map.insert("player".to_string(), Value::String(owner_id.to_string()));
    map.insert("createdAt".to_string(), Value::String(now.clone()));
    map.insert("updatedAt".to_string(), Value::String(now));
}

/// Merges submitted fields into a record. Uploads are stored as their served path.
fn apply_submission(map: &mut Map<String, Value>, body: &Submission) {
    for (name, value) in &body.fields {
        map.insert(name.clone(), value.clone());
    }
    for upload in &body.files {
        map.insert(
            upload.field.clone(),
            Value::String(format!("/uploads/{}", upload.file_name)),
        );
    }
}

fn paginate<T: Clone>(items: &[T], query: &PageQuery, default_limit: u32) -> Page<T> {
    let page = query.page();
    let limit = query.limit_or(default_limit);
    let skip = (page as usize - 1).saturating_mul(limit as usize);
    Page {
        records: items.iter().skip(skip).take(limit as usize).cloned().collect(),
        total: items.len() as u64,
        page,
        limit,
    }
}

fn page_call(query: &PageQuery) -> String {
    let mut call = format!("page={}&limit={}", query.page(), query.limit_or(DEFAULT_LIMIT));
    if let Some(year) = query.year {
        call.push_str(&format!("&year={year}"));
    }
    call
}

const DEFAULT_LIMIT: u32 = 8;

#[async_trait]
impl Backend for MemoryBackend {
    async fn login(&self, credentials: &LoginRequest) -> Result<String, AppError> {
        let state = self.enter("POST auth/login".to_string())?;
        match state.accounts.get(&credentials.email) {
            Some((password, token)) if *password == credentials.password => Ok(token.clone()),
            _ => Err(AppError::Business("Invalid email or password".to_string())),
        }
    }

    async fn list_records(
        &self,
        _session: &Session,
        entity: EntityKind,
        owner_id: &str,
        query: &PageQuery,
    ) -> Result<Page<Record>, AppError> {
        let state = self.enter(format!("GET {}/{owner_id}?{}", entity.path(), page_call(query)))?;
        let owned: Vec<Record> = state
            .records
            .iter()
            .filter(|stored| stored.entity == entity && stored.owner_id == owner_id)
            .map(|stored| stored.record.clone())
            .collect();
        Ok(paginate(&owned, query, DEFAULT_LIMIT))
    }

    async fn create_record(
        &self,
        _session: &Session,
        entity: EntityKind,
        owner_id: &str,
        body: &Submission,
    ) -> Result<Record, AppError> {
        let mut state = self.enter(format!("POST {}/{owner_id}", entity.path()))?;
        let mut map = Map::new();
        apply_submission(&mut map, body);
        stamp_new(&mut map, &Uuid::new_v4().to_string(), owner_id);
        let record = Record(map);
        state.records.push(StoredRecord {
            entity,
            owner_id: owner_id.to_string(),
            record: record.clone(),
        });
        Ok(record)
    }

    async fn update_record(
        &self,
        _session: &Session,
        entity: EntityKind,
        record_id: &str,
        body: &Submission,
    ) -> Result<Record, AppError> {
        let mut state = self.enter(format!("PUT {}/{record_id}", entity.path()))?;
        let stored = state
            .records
            .iter_mut()
            .find(|stored| stored.entity == entity && stored.record.id() == Some(record_id))
            .ok_or_else(|| AppError::Business("not found".to_string()))?;
        apply_submission(&mut stored.record.0, body);
        stored.record.0.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        Ok(stored.record.clone())
    }

    async fn delete_record(
        &self,
        _session: &Session,
        entity: EntityKind,
        record_id: &str,
    ) -> Result<(), AppError> {
        let mut state = self.enter(format!("DELETE {}/{record_id}", entity.path()))?;
        let before = state.records.len();
        state
            .records
            .retain(|stored| !(stored.entity == entity && stored.record.id() == Some(record_id)));
        if state.records.len() == before {
            return Err(AppError::Business("not found".to_string()));
        }
        Ok(())
    }

    async fn list_users(
        &self,
        _session: &Session,
        query: &PageQuery,
    ) -> Result<Page<UserSummary>, AppError> {
        let state = self.enter(format!("GET user/all-user?{}", page_call(query)))?;
        let needle = query.search.as_deref().map(str::to_lowercase);
        let matching: Vec<UserSummary> = state
            .users
            .iter()
            .filter(|user| match &needle {
                None => true,
                Some(needle) => [&user.name, &user.email]
                    .into_iter()
                    .flatten()
                    .any(|text| text.to_lowercase().contains(needle)),
            })
            .cloned()
            .collect();
        Ok(paginate(&matching, query, DEFAULT_LIMIT))
    }

    async fn get_user(&self, _session: &Session, user_id: &str) -> Result<UserSummary, AppError> {
        let state = self.enter(format!("GET user/{user_id}"))?;
        state
            .users
            .iter()
            .find(|user| user.id == user_id)
            .cloned()
            .ok_or_else(|| AppError::Business("User not found".to_string()))
    }

    async fn update_user(
        &self,
        _session: &Session,
        user_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<UserSummary, AppError> {
        let mut state = self.enter(format!("PUT user/{user_id}"))?;
        let user = state
            .users
            .iter_mut()
            .find(|user| user.id == user_id)
            .ok_or_else(|| AppError::Business("User not found".to_string()))?;
        if let Some(name) = fields.get("name").and_then(Value::as_str) {
            user.name = Some(name.to_string());
        }
        if let Some(position) = fields.get("position").and_then(Value::as_str) {
            user.position = Some(position.to_string());
        }
        Ok(user.clone())
    }

    async fn overview(&self, _session: &Session) -> Result<DashboardOverview, AppError> {
        let state = self.enter("GET dashboard/overview".to_string())?;
        Ok(state.overview.clone())
    }

    async fn total_revenue(&self, _session: &Session) -> Result<TotalRevenue, AppError> {
        let state = self.enter("GET dashboard/total-revenue".to_string())?;
        Ok(state.total_revenue.clone())
    }

    async fn monthly_revenue(
        &self,
        _session: &Session,
        year: i32,
    ) -> Result<Vec<MonthlyRevenue>, AppError> {
        let state = self.enter(format!("GET dashboard/monthly-revenue-chart?year={year}"))?;
        Ok(state.monthly.get(&year).cloned().unwrap_or_default())
    }

    async fn player_revenue(
        &self,
        _session: &Session,
        query: &PageQuery,
    ) -> Result<Page<PaymentRecord>, AppError> {
        let state = self.enter(format!("GET dashboard/all-player-reveneue?{}", page_call(query)))?;
        let year_prefix = query.year.map(|year| year.to_string());
        let matching: Vec<PaymentRecord> = state
            .payments
            .iter()
            .filter(|payment| match &year_prefix {
                None => true,
                Some(prefix) => payment
                    .created_at
                    .as_deref()
                    .is_some_and(|created| created.starts_with(prefix.as_str())),
            })
            .cloned()
            .collect();
        Ok(paginate(&matching, query, DEFAULT_LIMIT))
    }

    async fn change_password(
        &self,
        session: &Session,
        request: &ChangePassword,
    ) -> Result<String, AppError> {
        let mut state = self.enter("POST auth/change-password".to_string())?;
        let subject = session.claims().sub.clone();
        if let Some(current) = state.passwords.get(&subject) {
            if *current != request.old_password {
                return Err(AppError::Business("Old password is incorrect".to_string()));
            }
        }
        state.passwords.insert(subject, request.new_password.clone());
        Ok("Password changed successfully".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_log_keeps_only_recent_calls() {
        let backend = MemoryBackend::new();
        for i in 0..MAX_LOGGED_CALLS + 5 {
            drop(backend.enter(format!("GET rating/p{i}")));
        }

        let calls = backend.calls();
        assert_eq!(calls.len(), MAX_LOGGED_CALLS);
        assert_eq!(calls[0], "GET rating/p5");
    }
}
