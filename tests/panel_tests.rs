use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use pitchside_admin::{
    AppConfig, AppError, MemoryBackend,
    auth::{Claims, Session},
    cache::{MutationTracker, QueryCache, Scope},
    entities::EntityKind,
    memory::Failure,
    models::{PageQuery, PanelStatus, ToastKind},
    panel::{Command, PanelContext, PanelState, ResourcePanel},
    schema::Submission,
};
use serde_json::{Value, json};
use std::time::Duration;

// --- Fixture ---

struct Fixture {
    backend: MemoryBackend,
    cache: QueryCache,
    mutations: MutationTracker,
    session: Session,
}

impl Fixture {
    fn new() -> Self {
        let secret = AppConfig::default().jwt_secret;
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "admin-1".to_string(),
            role: "admin".to_string(),
            exp: (now + 3600) as usize,
            iat: now as usize,
            email: None,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        Self {
            backend: MemoryBackend::new(),
            cache: QueryCache::new(Duration::from_secs(60)),
            mutations: MutationTracker::new(),
            session: Session::verify(&token, &secret).unwrap(),
        }
    }

    fn ctx(&self) -> PanelContext<'_> {
        PanelContext {
            backend: &self.backend,
            cache: &self.cache,
            mutations: &self.mutations,
            session: &self.session,
        }
    }

    fn calls_starting_with(&self, prefix: &str) -> usize {
        self.backend
            .calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

fn panel(entity: EntityKind, owner: &str, page: u32) -> ResourcePanel {
    ResourcePanel::new(entity, owner, &PageQuery::new(page, 8), 8)
}

fn form(fields: Value) -> Submission {
    match fields {
        Value::Object(map) => Submission::from_fields(map),
        _ => Submission::default(),
    }
}

fn rating_form(label: &str) -> Submission {
    form(json!({ "match": label, "rating": "7.5", "position": "ST" }))
}

// --- Loading & Pagination ---

#[tokio::test]
async fn test_second_page_of_seventeen_shows_three_pages() {
    let fx = Fixture::new();
    fx.backend.seed_records(EntityKind::Rating, "123", 17);

    let mut panel = panel(EntityKind::Rating, "123", 2);
    panel.load(&fx.ctx()).await.unwrap();

    let view = panel.view();
    assert_eq!(view.status, PanelStatus::Populated);
    assert_eq!(view.records.len(), 8);
    assert_eq!(view.pagination.pages, 3);
    assert_eq!(view.pagination.page, 2);
    assert!(view.pagination.has_prev);
    assert!(view.pagination.has_next);
    assert_eq!(fx.backend.calls(), vec!["GET rating/123?page=2&limit=8"]);
}

#[tokio::test]
async fn test_last_page_disables_next() {
    let fx = Fixture::new();
    fx.backend.seed_records(EntityKind::Fouls, "p1", 17);

    let mut panel = panel(EntityKind::Fouls, "p1", 3);
    panel.load(&fx.ctx()).await.unwrap();

    let view = panel.view();
    assert_eq!(view.records.len(), 1);
    assert!(!view.pagination.has_next);
}

#[tokio::test]
async fn test_no_records_is_empty() {
    let fx = Fixture::new();
    let mut panel = panel(EntityKind::Defensive, "p1", 1);
    panel.load(&fx.ctx()).await.unwrap();

    assert_eq!(panel.state(), &PanelState::Empty);
    assert!(panel.view().can_add);
}

#[tokio::test]
async fn test_page_and_owner_changes_reset_to_loading() {
    let fx = Fixture::new();
    fx.backend.seed_records(EntityKind::Rating, "a", 10);
    let mut panel = panel(EntityKind::Rating, "a", 1);
    panel.load(&fx.ctx()).await.unwrap();

    panel.set_page(2);
    assert_eq!(panel.state(), &PanelState::Loading);
    assert_eq!(panel.view().status, PanelStatus::Loading);

    panel.set_owner("b");
    assert_eq!(panel.state(), &PanelState::Loading);
    panel.load(&fx.ctx()).await.unwrap();
    assert_eq!(panel.owner_id(), "b");
    assert_eq!(panel.state(), &PanelState::Empty);
    assert_eq!(fx.backend.calls().last().unwrap(), "GET rating/b?page=1&limit=8");
}

#[tokio::test]
async fn test_repeat_loads_are_served_from_cache() {
    let fx = Fixture::new();
    fx.backend.seed_records(EntityKind::Rating, "p1", 3);

    for _ in 0..3 {
        let mut panel = panel(EntityKind::Rating, "p1", 1);
        panel.load(&fx.ctx()).await.unwrap();
    }
    assert_eq!(fx.calls_starting_with("GET rating/p1"), 1);
}

#[tokio::test]
async fn test_transport_failure_shows_generic_error_without_retry() {
    let fx = Fixture::new();
    fx.backend.fail_with(Failure::Transport);

    let mut panel = panel(EntityKind::Rating, "p1", 1);
    panel.load(&fx.ctx()).await.unwrap();

    assert_eq!(panel.state(), &PanelState::Error("Something went wrong".to_string()));
    assert_eq!(panel.view().error.as_deref(), Some("Something went wrong"));
    assert_eq!(fx.backend.calls().len(), 1);
}

#[tokio::test]
async fn test_business_failure_message_is_shown_verbatim() {
    let fx = Fixture::new();
    fx.backend.fail_with(Failure::Business("Player is archived".to_string()));

    let mut panel = panel(EntityKind::Rating, "p1", 1);
    panel.load(&fx.ctx()).await.unwrap();

    assert_eq!(panel.state(), &PanelState::Error("Player is archived".to_string()));
}

#[tokio::test]
async fn test_rejected_session_is_returned_to_caller() {
    let fx = Fixture::new();
    fx.backend.fail_with(Failure::Unauthorized);

    let mut panel = panel(EntityKind::Rating, "p1", 1);
    let result = panel.load(&fx.ctx()).await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
}

// --- Mutations ---

#[tokio::test]
async fn test_created_record_appears_on_relist() {
    let fx = Fixture::new();
    fx.backend.seed_records(EntityKind::Rating, "p1", 2);

    let mut panel = panel(EntityKind::Rating, "p1", 1);
    panel.load(&fx.ctx()).await.unwrap();
    let created = panel
        .submit(&fx.ctx(), Command::Create(rating_form("Derby")))
        .await
        .unwrap();

    let new_id = created.id().unwrap().to_string();
    assert_eq!(created.get("player"), Some(&json!("p1")));
    assert_eq!(created.get("rating"), Some(&json!(7.5)));

    // A fresh panel for the same key must see the new record, not the cached page.
    let mut relisted = self::panel(EntityKind::Rating, "p1", 1);
    relisted.load(&fx.ctx()).await.unwrap();
    let view = relisted.view();
    assert_eq!(view.pagination.total, 3);
    assert!(view.records.iter().any(|r| r.id() == Some(new_id.as_str())));

    let toast = panel.toast().unwrap();
    assert_eq!(toast.kind, ToastKind::Success);
    assert_eq!(toast.message, "Rating added successfully");
}

#[tokio::test]
async fn test_update_sends_cleaned_fields_and_refetches() {
    let fx = Fixture::new();
    let id = fx
        .backend
        .seed_record(EntityKind::Rating, "p1", json!({ "match": "Old", "rating": 5 }));

    let mut panel = panel(EntityKind::Rating, "p1", 1);
    panel.load(&fx.ctx()).await.unwrap();
    let mut body = rating_form("Final");
    body.fields.insert("player".to_string(), json!("someone-else"));

    panel
        .submit(
            &fx.ctx(),
            Command::Update {
                record_id: id.clone(),
                body,
            },
        )
        .await
        .unwrap();

    let PanelState::Populated(page) = panel.state() else {
        panic!("expected a populated panel, got {:?}", panel.state());
    };
    let record = page.records.iter().find(|r| r.id() == Some(id.as_str())).unwrap();
    assert_eq!(record.get("match"), Some(&json!("Final")));
    // The owner reference cannot be rewritten through the form.
    assert_eq!(record.get("player"), Some(&json!("p1")));
    assert!(fx.backend.calls().contains(&format!("PUT rating/{id}")));
}

#[tokio::test]
async fn test_negative_goals_never_reach_the_backend() {
    let fx = Fixture::new();
    let mut panel = panel(EntityKind::Attacking, "p1", 1);
    panel.load(&fx.ctx()).await.unwrap();

    let body = form(json!({
        "appearances": 3, "goals": -1, "assists": 0, "shots": 4, "shotsOnTarget": 2
    }));
    let result = panel.submit(&fx.ctx(), Command::Create(body)).await;

    let Err(AppError::Validation(errors)) = result else {
        panic!("expected a validation error");
    };
    assert_eq!(errors.get("goals"), Some("Goals must be 0 or greater"));
    assert_eq!(fx.calls_starting_with("POST"), 0);
    assert_eq!(panel.state(), &PanelState::Empty);
}

#[tokio::test]
async fn test_delete_removes_record_from_later_listings() {
    let fx = Fixture::new();
    let ids = fx.backend.seed_records(EntityKind::Rating, "p1", 3);

    let mut panel = panel(EntityKind::Rating, "p1", 1);
    panel.load(&fx.ctx()).await.unwrap();
    let prompt = panel.request_delete(ids[1].clone()).unwrap();
    assert_eq!(prompt, "Are you sure you want to delete this rating?");
    assert_eq!(fx.calls_starting_with("DELETE"), 0);

    panel.confirm_delete(&fx.ctx()).await.unwrap();

    let mut relisted = self::panel(EntityKind::Rating, "p1", 1);
    relisted.load(&fx.ctx()).await.unwrap();
    let view = relisted.view();
    assert_eq!(view.records.len(), 2);
    assert!(view.records.iter().all(|r| r.id() != Some(ids[1].as_str())));
}

#[tokio::test]
async fn test_deleting_missing_record_keeps_list_and_toasts_message() {
    let fx = Fixture::new();
    fx.backend.seed_records(EntityKind::Rating, "p1", 3);

    let mut panel = panel(EntityKind::Rating, "p1", 1);
    panel.load(&fx.ctx()).await.unwrap();
    let before = panel.state().clone();

    panel.request_delete("missing-id").unwrap();
    let result = panel.confirm_delete(&fx.ctx()).await;

    assert!(matches!(result, Err(AppError::Business(ref m)) if m == "not found"));
    assert_eq!(panel.state(), &before);
    let toast = panel.toast().unwrap();
    assert_eq!(toast.kind, ToastKind::Error);
    assert_eq!(toast.message, "not found");
    assert_eq!(fx.backend.record_count(EntityKind::Rating, "p1"), 3);
}

#[tokio::test]
async fn test_cancelled_or_unrequested_delete_sends_nothing() {
    let fx = Fixture::new();
    let ids = fx.backend.seed_records(EntityKind::Fouls, "p1", 1);

    let mut panel = panel(EntityKind::Fouls, "p1", 1);
    panel.load(&fx.ctx()).await.unwrap();
    panel.request_delete(ids[0].clone()).unwrap();
    panel.cancel_delete();
    assert!(panel.pending_delete().is_none());

    let result = panel.confirm_delete(&fx.ctx()).await;
    assert!(matches!(result, Err(AppError::ConfirmationRequired(_))));
    assert_eq!(fx.calls_starting_with("DELETE"), 0);
}

#[tokio::test]
async fn test_single_record_entities_refuse_a_second_create() {
    let fx = Fixture::new();
    fx.backend.seed_record(
        EntityKind::MarketValue,
        "p1",
        json!({ "value": 1_000_000, "currency": "EUR" }),
    );

    let mut panel = panel(EntityKind::MarketValue, "p1", 1);
    panel.load(&fx.ctx()).await.unwrap();
    assert!(!panel.view().can_add);

    let body = form(json!({ "value": 2_000_000, "currency": "EUR" }));
    let result = panel.submit(&fx.ctx(), Command::Create(body)).await;

    assert!(matches!(result, Err(AppError::Business(_))));
    assert_eq!(
        panel.toast().unwrap().message,
        "Market value already exists for this player"
    );
    assert_eq!(fx.calls_starting_with("POST"), 0);
}

#[tokio::test]
async fn test_outstanding_mutation_makes_panel_busy() {
    let fx = Fixture::new();
    let mut panel = panel(EntityKind::Rating, "p1", 1);
    panel.load(&fx.ctx()).await.unwrap();

    let _in_flight = fx
        .mutations
        .try_begin(&Scope::new(EntityKind::Rating, "p1"))
        .unwrap();
    let result = panel
        .submit(&fx.ctx(), Command::Create(rating_form("Cup")))
        .await;

    assert!(matches!(result, Err(AppError::Busy)));
    assert_eq!(fx.calls_starting_with("POST"), 0);
}

#[tokio::test]
async fn test_mutations_require_a_loaded_panel() {
    let fx = Fixture::new();
    let mut panel = panel(EntityKind::Rating, "p1", 1);

    let result = panel
        .submit(&fx.ctx(), Command::Create(rating_form("Cup")))
        .await;
    assert!(matches!(result, Err(AppError::NotReady)));
    assert!(matches!(panel.request_delete("x"), Err(AppError::NotReady)));
}

#[tokio::test]
async fn test_failed_create_restores_previous_list() {
    let fx = Fixture::new();
    fx.backend.seed_records(EntityKind::Rating, "p1", 2);
    let mut panel = panel(EntityKind::Rating, "p1", 1);
    panel.load(&fx.ctx()).await.unwrap();
    let before = panel.state().clone();

    fx.backend.fail_with(Failure::Business("Season is closed".to_string()));
    let result = panel
        .submit(&fx.ctx(), Command::Create(rating_form("Late")))
        .await;

    assert!(matches!(result, Err(AppError::Business(_))));
    assert_eq!(panel.state(), &before);
    assert_eq!(panel.toast().unwrap().message, "Season is closed");
    assert!(!fx.mutations.is_active(&Scope::new(EntityKind::Rating, "p1")));
}
