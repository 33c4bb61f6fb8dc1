//! Place domain entity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named geographic location that migration steps pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: Uuid,
    /// Unique display name, e.g. "Berlin"
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
}
