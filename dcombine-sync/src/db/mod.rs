//! Database repositories
//!
//! Functions that run inside a contact's unit of work take
//! `&mut SqliteConnection` so callers can pass `&mut *tx`. Read-only queries
//! used outside reconciliation take `&SqlitePool`.

pub mod contacts;
pub mod lists;
pub mod memberships;
pub mod phones;
pub mod remediation;
pub mod sub_records;

use dcombine_common::{Error, Result};
use uuid::Uuid;

/// Parse a guid column value
pub(crate) fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid guid '{}': {}", value, e)))
}
