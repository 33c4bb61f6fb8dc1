//! Domain-level constants.
//!
//! These constants define business rules shared by the notification job
//! and the storage layer.

// =============================================================================
// User Roles
// =============================================================================

/// Role for users who browse migrations and receive notifications
pub const ROLE_CITIZEN: &str = "CITIZEN";

/// Role for users allowed to define migrations
pub const ROLE_BIOLOGIST: &str = "BIOLOGIST";

// =============================================================================
// Notifications
// =============================================================================

/// Minimum number of minutes between two notification passes
pub const DEFAULT_NOTIFICATION_COOLDOWN_MINUTES: i64 = 5;

/// Lead-in sentence of every digest email body
pub const DIGEST_LEAD_IN: &str = "You can find more info about these migrations here:<br>";

/// Separator placed between the links of a digest email body
pub const DIGEST_LINK_SEPARATOR: &str = "<br/>";

/// Separator placed between species names in a digest subject
pub const DIGEST_SPECIES_SEPARATOR: &str = ", ";

/// Path segment of the per-migration detail page
pub const MIGRATION_DETAIL_PATH: &str = "/migrations/";
