//! Resource registry: one entry per player-owned entity a panel can manage.
//!
//! Every stat/history screen is the same panel parameterised by an [`EntityKind`].

use crate::{
    models::TabDescriptor,
    schema::{
        FieldKind::{Choice, Count, Date, Decimal, File, Opaque, Text},
        FieldSpec, Schema,
    },
};

/// Position codes accepted by profile and rating forms.
pub const POSITIONS: &[&str] = &[
    "GK", "CB", "LB", "RB", "LWB", "RWB", "CDM", "CM", "CAM", "LM", "RM", "LW", "RW", "CF", "ST",
];

pub const PREFERRED_FOOT: &[&str] = &["left", "right", "both"];

pub const CURRENCIES: &[&str] = &["EUR", "USD", "GBP"];

/// How a create/update body is sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Json,
    /// Entities carrying an image (national flag, club crest).
    Multipart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Attacking,
    Defensive,
    GkStats,
    GkDistribution,
    Distribution,
    Fouls,
    SetPieces,
    Rating,
    National,
    TransferHistory,
    PlayerReport,
    MarketValue,
}

impl EntityKind {
    pub const ALL: [EntityKind; 12] = [
        EntityKind::Attacking,
        EntityKind::Defensive,
        EntityKind::GkStats,
        EntityKind::GkDistribution,
        EntityKind::Distribution,
        EntityKind::Fouls,
        EntityKind::SetPieces,
        EntityKind::Rating,
        EntityKind::National,
        EntityKind::TransferHistory,
        EntityKind::PlayerReport,
        EntityKind::MarketValue,
    ];

    /// The key used in dashboard URLs and cache keys. Matches the upstream path segment.
    pub fn key(&self) -> &'static str {
        match self {
            EntityKind::Attacking => "attacking",
            EntityKind::Defensive => "defensive",
            EntityKind::GkStats => "gkstats",
            EntityKind::GkDistribution => "gkdistributionstats",
            EntityKind::Distribution => "distributionstats",
            EntityKind::Fouls => "fouls",
            EntityKind::SetPieces => "setpieces",
            EntityKind::Rating => "rating",
            EntityKind::National => "national",
            EntityKind::TransferHistory => "transferhistory",
            EntityKind::PlayerReport => "player-rapot",
            EntityKind::MarketValue => "marketvalue",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    /// Upstream collection path, relative to the backend base URL.
    pub fn path(&self) -> &'static str {
        self.key()
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Attacking => "Attacking stats",
            EntityKind::Defensive => "Defensive stats",
            EntityKind::GkStats => "Goalkeeping stats",
            EntityKind::GkDistribution => "Goalkeeper distribution",
            EntityKind::Distribution => "Distribution stats",
            EntityKind::Fouls => "Fouls",
            EntityKind::SetPieces => "Set pieces",
            EntityKind::Rating => "Rating",
            EntityKind::National => "National team",
            EntityKind::TransferHistory => "Transfer history",
            EntityKind::PlayerReport => "Player report",
            EntityKind::MarketValue => "Market value",
        }
    }

    /// Entities the dashboard keeps at one record per player.
    pub fn single_per_owner(&self) -> bool {
        matches!(
            self,
            EntityKind::MarketValue | EntityKind::GkStats | EntityKind::GkDistribution
        )
    }

    pub fn encoding(&self) -> BodyEncoding {
        if self.schema().has_files() {
            BodyEncoding::Multipart
        } else {
            BodyEncoding::Json
        }
    }

    pub fn schema(&self) -> Schema {
        match self {
            EntityKind::Attacking => ATTACKING,
            EntityKind::Defensive => DEFENSIVE,
            EntityKind::GkStats => GK_STATS,
            EntityKind::GkDistribution => GK_DISTRIBUTION,
            EntityKind::Distribution => DISTRIBUTION,
            EntityKind::Fouls => FOULS,
            EntityKind::SetPieces => SET_PIECES,
            EntityKind::Rating => RATING,
            EntityKind::National => NATIONAL,
            EntityKind::TransferHistory => TRANSFER_HISTORY,
            EntityKind::PlayerReport => PLAYER_REPORT,
            EntityKind::MarketValue => MARKET_VALUE,
        }
    }

    pub fn tabs() -> Vec<TabDescriptor> {
        Self::ALL
            .iter()
            .map(|kind| TabDescriptor {
                key: kind.key().to_string(),
                label: kind.label().to_string(),
            })
            .collect()
    }
}

const ATTACKING: Schema = Schema::new(&[
    FieldSpec::required("appearances", "Appearances", Count),
    FieldSpec::required("goals", "Goals", Count),
    FieldSpec::required("assists", "Assists", Count),
    FieldSpec::required("shots", "Shots", Count),
    FieldSpec::required("shotsOnTarget", "Shots on target", Count),
    FieldSpec::optional("shootingAccuracy", "Shooting accuracy", Opaque),
    FieldSpec::optional("bigChancesCreated", "Big chances created", Count),
    FieldSpec::optional("dribbles", "Successful dribbles", Count),
    FieldSpec::optional("season", "Season", Text),
]);

const DEFENSIVE: Schema = Schema::new(&[
    FieldSpec::required("tackles", "Tackles", Count),
    FieldSpec::required("interceptions", "Interceptions", Count),
    FieldSpec::required("clearances", "Clearances", Count),
    FieldSpec::required("blocks", "Blocked shots", Count),
    FieldSpec::optional("duelsWon", "Duels won", Count),
    FieldSpec::optional("aerialDuelsWon", "Aerial duels won", Count),
    FieldSpec::optional("recoveries", "Ball recoveries", Count),
    FieldSpec::optional("season", "Season", Text),
]);

const GK_STATS: Schema = Schema::new(&[
    FieldSpec::required("saves", "Saves", Count),
    FieldSpec::required("cleanSheets", "Clean sheets", Count),
    FieldSpec::required("goalsConceded", "Goals conceded", Count),
    FieldSpec::optional("penaltiesSaved", "Penalties saved", Count),
    FieldSpec::optional("punches", "Punches", Count),
    FieldSpec::optional("highClaims", "High claims", Count),
]);

const GK_DISTRIBUTION: Schema = Schema::new(&[
    FieldSpec::required("goalKicks", "Goal kicks", Count),
    FieldSpec::required("throws", "Throws", Count),
    FieldSpec::required("longBalls", "Long balls", Count),
    FieldSpec::optional("passesAccuracy", "Passes accuracy", Opaque),
]);

const DISTRIBUTION: Schema = Schema::new(&[
    FieldSpec::required("passes", "Passes", Count),
    FieldSpec::required("keyPasses", "Key passes", Count),
    FieldSpec::required("crosses", "Crosses", Count),
    FieldSpec::optional("longBalls", "Long balls", Count),
    FieldSpec::optional("throughBalls", "Through balls", Count),
    FieldSpec::optional("passesAccuracy", "Passes accuracy", Opaque),
]);

const FOULS: Schema = Schema::new(&[
    FieldSpec::required("foulsCommitted", "Fouls committed", Count),
    FieldSpec::required("foulsWon", "Fouls won", Count),
    FieldSpec::required("yellowCards", "Yellow cards", Count),
    FieldSpec::required("redCards", "Red cards", Count),
    FieldSpec::optional("offsides", "Offsides", Count),
]);

const SET_PIECES: Schema = Schema::new(&[
    FieldSpec::required("corners", "Corners taken", Count),
    FieldSpec::required("freeKicks", "Free kicks taken", Count),
    FieldSpec::required("penaltiesTaken", "Penalties taken", Count),
    FieldSpec::required("penaltiesScored", "Penalties scored", Count),
    FieldSpec::optional("freeKickGoals", "Free kick goals", Count),
]);

const RATING: Schema = Schema::new(&[
    FieldSpec::required("match", "Match", Text),
    FieldSpec::required("rating", "Rating", Decimal),
    FieldSpec::required("position", "Position played", Choice(POSITIONS)),
    FieldSpec::optional("minutesPlayed", "Minutes played", Count),
    FieldSpec::optional("date", "Match date", Date),
]);

const NATIONAL: Schema = Schema::new(&[
    FieldSpec::required("country", "Country", Text),
    FieldSpec::required("caps", "Caps", Count),
    FieldSpec::required("goals", "Goals", Count),
    FieldSpec::optional("debut", "Debut date", Date),
    FieldSpec::required("flag", "Flag", File),
]);

const TRANSFER_HISTORY: Schema = Schema::new(&[
    FieldSpec::required("fromClub", "From club", Text),
    FieldSpec::required("toClub", "To club", Text),
    FieldSpec::required("season", "Season", Text),
    FieldSpec::optional("fee", "Fee", Opaque),
    FieldSpec::optional("date", "Transfer date", Date),
    FieldSpec::required("flag", "Club crest", File),
]);

const PLAYER_REPORT: Schema = Schema::new(&[
    FieldSpec::required("title", "Title", Text),
    FieldSpec::required("summary", "Summary", Text),
    FieldSpec::optional("strengths", "Strengths", Text),
    FieldSpec::optional("weaknesses", "Weaknesses", Text),
    FieldSpec::optional("overall", "Overall score", Decimal),
]);

const MARKET_VALUE: Schema = Schema::new(&[
    FieldSpec::required("value", "Market value", Count),
    FieldSpec::required("currency", "Currency", Choice(CURRENCIES)),
    FieldSpec::optional("date", "Valuation date", Date),
]);

/// Player profile edits on the user detail screen.
pub const PROFILE_SCHEMA: Schema = Schema::new(&[
    FieldSpec::required("name", "Name", Text),
    FieldSpec::optional("email", "Email", Text),
    FieldSpec::optional("position", "Position", Choice(POSITIONS)),
    FieldSpec::optional("preferredFoot", "Preferred foot", Choice(PREFERRED_FOOT)),
    FieldSpec::optional("club", "Club", Text),
    FieldSpec::optional("nationality", "Nationality", Text),
    FieldSpec::optional("dateOfBirth", "Date of birth", Date),
    FieldSpec::optional("height", "Height (cm)", Count),
    FieldSpec::optional("weight", "Weight (kg)", Count),
]);

pub const PASSWORD_SCHEMA: Schema = Schema::new(&[
    FieldSpec::required("oldPassword", "Current password", Text),
    FieldSpec::required("newPassword", "New password", Text),
    FieldSpec::required("confirmPassword", "Confirm password", Text),
]);

/// Minimum length for a new admin password.
pub const MIN_PASSWORD_LEN: usize = 8;
