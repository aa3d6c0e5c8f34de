//! The Paginated Resource Panel: one list-table-with-CRUD-modal, parameterised by entity.
//!
//! A panel lives for the duration of one dashboard request. It reads its page through the
//! shared [`QueryCache`], and every mutation follows the same command pattern:
//! validate, claim the scope, call the backend, invalidate, refetch. Nothing is applied
//! optimistically.

use std::mem;

use crate::{
    auth::Session,
    backend::Backend,
    cache::{MutationTracker, QueryCache, QueryKey, Scope},
    entities::EntityKind,
    error::AppError,
    models::{Page, PageQuery, PanelStatus, PanelView, Pagination, Record, Toast},
    schema::{Mode, Submission},
};

/// PanelContext
///
/// The collaborators a panel needs for one request. The session is carried explicitly so
/// every backend call made on the panel's behalf is made with it.
#[derive(Clone, Copy)]
pub struct PanelContext<'a> {
    pub backend: &'a dyn Backend,
    pub cache: &'a QueryCache,
    pub mutations: &'a MutationTracker,
    pub session: &'a Session,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelState {
    Loading,
    /// The list could not be loaded; holds the user-facing message.
    Error(String),
    Empty,
    Populated(Page<Record>),
    /// A create, update or delete is outstanding.
    Mutating,
}

/// Command
///
/// A form submission from the add/edit modal.
#[derive(Debug, Clone)]
pub enum Command {
    Create(Submission),
    Update { record_id: String, body: Submission },
}

pub struct ResourcePanel {
    entity: EntityKind,
    owner_id: String,
    query: PageQuery,
    state: PanelState,
    pending_delete: Option<String>,
    toast: Option<Toast>,
}

impl ResourcePanel {
    /// Creates a panel in `Loading` for `owner_id`'s `entity` records. `query` is
    /// normalised against `page_size`.
    pub fn new(
        entity: EntityKind,
        owner_id: impl Into<String>,
        query: &PageQuery,
        page_size: u32,
    ) -> Self {
        Self {
            entity,
            owner_id: owner_id.into(),
            query: PageQuery {
                year: None,
                search: None,
                ..query.normalized(page_size)
            },
            state: PanelState::Loading,
            pending_delete: None,
            toast: None,
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn toast(&self) -> Option<&Toast> {
        self.toast.as_ref()
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    fn scope(&self) -> Scope {
        Scope::new(self.entity, self.owner_id.clone())
    }

    fn reset(&mut self) {
        self.state = PanelState::Loading;
        self.pending_delete = None;
    }

    pub fn set_page(&mut self, page: u32) {
        self.query.page = Some(page.max(1));
        self.reset();
    }

    /// Switching owner starts again from the first page.
    pub fn set_owner(&mut self, owner_id: impl Into<String>) {
        self.owner_id = owner_id.into();
        self.query.page = Some(1);
        self.reset();
    }

    /// Single-record entities lose their add action once a record exists.
    pub fn can_add(&self) -> bool {
        if !self.entity.single_per_owner() {
            return true;
        }
        match &self.state {
            PanelState::Populated(page) => page.total == 0,
            PanelState::Empty => true,
            _ => false,
        }
    }

    /// load
    ///
    /// Moves to `Loading` and resolves the current page, from the cache when fresh.
    /// Backend failures land in `Error` and are not retried. Only a rejected session is
    /// returned to the caller, which answers it with the login redirect.
    pub async fn load(&mut self, ctx: &PanelContext<'_>) -> Result<(), AppError> {
        self.state = PanelState::Loading;
        let key = QueryKey {
            scope: self.scope(),
            query: self.query.clone(),
        };

        if let Some(page) = ctx.cache.get(&key) {
            self.state = populated_or_empty(page);
            return Ok(());
        }

        let ticket = ctx.cache.begin(key);
        match ctx
            .backend
            .list_records(ctx.session, self.entity, &self.owner_id, &self.query)
            .await
        {
            Ok(page) => {
                ctx.cache.complete(ticket, page.clone());
                self.state = populated_or_empty(page);
                Ok(())
            }
            Err(AppError::Unauthorized) => Err(AppError::Unauthorized),
            Err(e) => {
                tracing::warn!(
                    entity = self.entity.key(),
                    owner = %self.owner_id,
                    error = %e,
                    "panel list failed"
                );
                self.state = PanelState::Error(e.user_message());
                Ok(())
            }
        }
    }

    /// submit
    ///
    /// Validates the form and, only if it is clean, sends it upstream. On success the
    /// scope's cached pages are dropped and the panel refetches; on failure the panel keeps
    /// its previous list and carries an error toast.
    pub async fn submit(
        &mut self,
        ctx: &PanelContext<'_>,
        command: Command,
    ) -> Result<Record, AppError> {
        self.ensure_ready()?;
        let schema = self.entity.schema();

        let (mode, body) = match &command {
            Command::Create(body) => (Mode::Create, body),
            Command::Update { body, .. } => (Mode::Update, body),
        };
        let clean = schema.validate(body, mode).map_err(|errors| {
            tracing::debug!(entity = self.entity.key(), %errors, "form rejected before sending");
            AppError::Validation(errors)
        })?;

        if mode == Mode::Create && !self.can_add() {
            let err = AppError::Business(format!(
                "{} already exists for this player",
                self.entity.label()
            ));
            self.toast = Some(Toast::error(err.user_message()));
            return Err(err);
        }

        let entity = self.entity;
        let owner_id = self.owner_id.clone();
        let outcome = self
            .mutate(ctx, async move {
                match &command {
                    Command::Create(_) => {
                        ctx.backend
                            .create_record(ctx.session, entity, &owner_id, &clean)
                            .await
                    }
                    Command::Update { record_id, .. } => {
                        ctx.backend
                            .update_record(ctx.session, entity, record_id, &clean)
                            .await
                    }
                }
            })
            .await;

        let verb = if mode == Mode::Create { "added" } else { "updated" };
        let record = outcome?;
        self.toast = Some(Toast::success(format!(
            "{} {verb} successfully",
            self.entity.label()
        )));
        self.load(ctx).await?;
        Ok(record)
    }

    /// Opens the confirmation step for deleting `record_id` and returns its prompt.
    pub fn request_delete(&mut self, record_id: impl Into<String>) -> Result<String, AppError> {
        self.ensure_ready()?;
        self.pending_delete = Some(record_id.into());
        Ok(AppError::ConfirmationRequired(self.entity.label().to_lowercase()).to_string())
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Sends the delete opened by `request_delete`. Without one, nothing is sent.
    pub async fn confirm_delete(&mut self, ctx: &PanelContext<'_>) -> Result<(), AppError> {
        self.ensure_ready()?;
        let record_id = self
            .pending_delete
            .take()
            .ok_or_else(|| AppError::ConfirmationRequired(self.entity.label().to_lowercase()))?;

        let entity = self.entity;
        self.mutate(ctx, async move {
            ctx.backend.delete_record(ctx.session, entity, &record_id).await
        })
        .await?;

        self.toast = Some(Toast::success(format!(
            "{} deleted successfully",
            self.entity.label()
        )));
        self.load(ctx).await
    }

    fn ensure_ready(&self) -> Result<(), AppError> {
        match self.state {
            PanelState::Populated(_) | PanelState::Empty => Ok(()),
            _ => Err(AppError::NotReady),
        }
    }

    /// Runs one upstream mutation while holding the scope's mutation slot. Success
    /// invalidates the scope; failure restores the pre-mutation state with an error toast.
    async fn mutate<T, F>(&mut self, ctx: &PanelContext<'_>, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let scope = self.scope();
        let _slot = ctx.mutations.try_begin(&scope)?;
        let previous = mem::replace(&mut self.state, PanelState::Mutating);

        match call.await {
            Ok(value) => {
                ctx.cache.invalidate(&scope);
                tracing::info!(
                    entity = self.entity.key(),
                    owner = %self.owner_id,
                    "panel mutation applied"
                );
                Ok(value)
            }
            Err(e) => {
                self.state = previous;
                if !matches!(e, AppError::Unauthorized) {
                    tracing::warn!(
                        entity = self.entity.key(),
                        owner = %self.owner_id,
                        error = %e,
                        "panel mutation failed"
                    );
                    self.toast = Some(Toast::error(e.user_message()));
                }
                Err(e)
            }
        }
    }

    /// view
    ///
    /// Snapshot for rendering: rows, page controls, the modal's fields and any message.
    pub fn view(&self) -> PanelView {
        let limit = self.query.limit.unwrap_or_default();
        let (status, records, pagination, error) = match &self.state {
            PanelState::Loading => (PanelStatus::Loading, vec![], self.blank(limit), None),
            PanelState::Mutating => (PanelStatus::Mutating, vec![], self.blank(limit), None),
            PanelState::Error(message) => (
                PanelStatus::Error,
                vec![],
                self.blank(limit),
                Some(message.clone()),
            ),
            PanelState::Empty => (PanelStatus::Empty, vec![], self.blank(limit), None),
            PanelState::Populated(page) => (
                PanelStatus::Populated,
                page.records.clone(),
                page.pagination(),
                None,
            ),
        };

        PanelView {
            entity: self.entity.key().to_string(),
            label: self.entity.label().to_string(),
            owner_id: self.owner_id.clone(),
            status,
            records,
            pagination,
            can_add: self.can_add(),
            fields: self.entity.schema().descriptors(),
            error,
            toast: self.toast.clone(),
        }
    }

    fn blank(&self, limit: u32) -> Pagination {
        Pagination::new(self.query.page(), limit, 0)
    }
}

fn populated_or_empty(page: Page<Record>) -> PanelState {
    if page.total == 0 && page.records.is_empty() {
        PanelState::Empty
    } else {
        PanelState::Populated(page)
    }
}
