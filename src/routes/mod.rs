/// Router Module Index
///
/// Splits the HTTP surface by who may reach it. The access guard wraps the merged router,
/// so a route's module decides only where it lives, not whether it is protected: anything
/// outside the public allow-list requires an admin session.

/// Session entry and exit, plus the health probe. Reachable without a session.
pub mod public;

/// Dashboard screens: overview, revenue, user management and password change.
pub mod admin;

/// The generic resource panel endpoints, one set for every player-owned entity.
pub mod panels;
