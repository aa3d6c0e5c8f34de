use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Generic Resource Shapes ---

/// Record
///
/// One backend-owned resource row (stat line, transfer event, report...). The dashboard
/// never interprets the entity-specific fields; it only needs the identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(transparent)]
#[ts(export)]
#[schema(value_type = Object)]
pub struct Record(
    #[ts(type = "Record<string, unknown>")]
    pub Map<String, Value>,
);

impl Record {
    /// The backend identifier, read from `id` or the document-store style `_id`.
    pub fn id(&self) -> Option<&str> {
        self.0
            .get("id")
            .or_else(|| self.0.get("_id"))
            .and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Record(fields)
    }
}

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// PageQuery
///
/// Pagination and filter parameters accepted by every list screen. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Year filter for revenue screens; changing it only changes the upstream query.
    pub year: Option<i32>,
    pub search: Option<String>,
}

impl PageQuery {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            year: None,
            search: None,
        }
    }

    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p >= 1).unwrap_or(1)
    }

    /// Page size, falling back to the configured default when absent or zero and capped
    /// at `MAX_PAGE_SIZE`.
    pub fn limit_or(&self, default_limit: u32) -> u32 {
        self.limit
            .filter(|l| *l >= 1)
            .unwrap_or(default_limit)
            .min(MAX_PAGE_SIZE)
    }

    /// Resolves defaults so two queries for the same window compare equal.
    pub fn normalized(&self, default_limit: u32) -> Self {
        Self {
            page: Some(self.page()),
            limit: Some(self.limit_or(default_limit)),
            year: self.year,
            search: self
                .search
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}

/// Page
///
/// A bounded window over a backend collection plus the collection's total size.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit, self.total)
    }
}

/// Number of pages needed to show `total` records `limit` at a time.
pub fn page_count(total: u64, limit: u32) -> u32 {
    if limit == 0 {
        return 0;
    }
    let pages = total.div_ceil(u64::from(limit));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Pagination
///
/// What the page controls need: the selected page, how many pages exist and whether the
/// previous/next controls are enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    #[ts(type = "number")]
    pub total: u64,
    pub pages: u32,
    pub has_prev: bool,
    pub has_next: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = page_count(total, limit);
        Self {
            page,
            limit,
            total,
            pages,
            has_prev: page > 1,
            has_next: page < pages,
        }
    }
}

// --- Notifications ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ToastKind {
    Success,
    Error,
}

/// Toast
///
/// A transient notification describing a mutation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Error,
            message: message.into(),
        }
    }
}

// --- Users & Revenue (typed upstream payloads) ---

/// UserSummary
///
/// A platform user as listed on the user-management screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// DashboardOverview
///
/// Headline counters. All sums are computed upstream and displayed as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct DashboardOverview {
    #[serde(alias = "totalUser")]
    #[ts(type = "number")]
    pub total_users: u64,
    #[serde(alias = "totalPlayer")]
    #[ts(type = "number")]
    pub total_players: u64,
    #[ts(type = "number")]
    pub total_subscriptions: u64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct TotalRevenue {
    #[serde(alias = "total")]
    pub total_revenue: f64,
}

/// MonthlyRevenue
///
/// One bar of the revenue chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MonthlyRevenue {
    pub month: String,
    #[serde(alias = "total", alias = "amount", default)]
    pub revenue: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PaymentStatus {
    Completed,
    Pending,
    Failed,
}

/// PaymentRecord
///
/// A single player payment on the revenue screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "name")]
    pub player_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    pub status: PaymentStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// ChangePassword
///
/// Validated password change forwarded to `/auth/change-password`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    pub old_password: String,
    pub new_password: String,
}

// --- View Models (Output) ---

/// PanelStatus
///
/// Externally visible state of a resource panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PanelStatus {
    Loading,
    Error,
    Empty,
    Populated,
    Mutating,
}

/// FieldDescriptor
///
/// Describes one input of a panel's add/edit modal so the UI can render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    pub kind: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub options: Vec<String>,
}

/// PanelView
///
/// Everything needed to render one list-table-with-CRUD-modal panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PanelView {
    pub entity: String,
    pub label: String,
    pub owner_id: String,
    pub status: PanelStatus,
    pub records: Vec<Record>,
    pub pagination: Pagination,
    /// False once a single-record entity already holds its record.
    pub can_add: bool,
    pub fields: Vec<FieldDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub toast: Option<Toast>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UsersView {
    pub users: Vec<UserSummary>,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TabDescriptor {
    pub key: String,
    pub label: String,
}

/// UserDetailView
///
/// A player's profile plus the currently selected stat/history panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserDetailView {
    pub user: UserSummary,
    pub tabs: Vec<TabDescriptor>,
    pub active_tab: String,
    pub panel: PanelView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfileResponse {
    pub user: UserSummary,
    pub toast: Toast,
}

/// DashboardView
///
/// Overview counters and the revenue chart for the selected year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardView {
    pub year: i32,
    pub overview: DashboardOverview,
    pub total_revenue: TotalRevenue,
    pub monthly_revenue: Vec<MonthlyRevenue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentsView {
    pub year: i32,
    pub status: PanelStatus,
    pub payments: Vec<PaymentRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ActionResponse {
    pub success: bool,
    pub toast: Toast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub success: bool,
    pub redirect: String,
}
