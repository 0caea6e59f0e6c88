//! Address, email and note persistence
//!
//! All three are owned by a single contact and keyed by a remote
//! sub-identifier, so one set of functions driven by the entity's
//! [`EntityMapping`] covers them.

use dcombine_common::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::field_map::{EntityMapping, MappedRow};

/// Column values of one stored sub-record
pub type StoredRecord = BTreeMap<&'static str, Option<String>>;

/// True when a row with this remote sub-identifier already exists
pub async fn sub_record_exists(conn: &mut SqliteConnection, mapping: &EntityMapping, cc_id: &str) -> Result<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?)",
        mapping.table, mapping.identity
    );
    let exists: bool = sqlx::query_scalar(&sql)
        .bind(cc_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// Insert a mapped sub-record owned by `contact_id`
pub async fn insert_sub_record(
    conn: &mut SqliteConnection,
    mapping: &EntityMapping,
    contact_id: Uuid,
    row: &MappedRow,
) -> Result<Uuid> {
    if row.values.is_empty() {
        return Err(Error::InvalidInput(format!("{} row has no columns", mapping.entity)));
    }

    let columns: Vec<&str> = row.columns().collect();
    let placeholders = vec!["?"; columns.len() + 2].join(", ");
    let sql = format!(
        "INSERT INTO {} (guid, contact_id, {}) VALUES ({})",
        mapping.table,
        columns.join(", "),
        placeholders
    );

    let guid = Uuid::new_v4();
    let mut query = sqlx::query(&sql)
        .bind(guid.to_string())
        .bind(contact_id.to_string());
    for (_, value) in &row.values {
        query = query.bind(value.clone());
    }
    query.execute(&mut *conn).await?;

    Ok(guid)
}

/// Sub-records owned by a contact, in insertion order
pub async fn load_sub_records(
    pool: &SqlitePool,
    mapping: &EntityMapping,
    contact_id: Uuid,
) -> Result<Vec<StoredRecord>> {
    let columns: Vec<&str> = mapping.fields.iter().map(|f| f.column).collect();
    let sql = format!(
        "SELECT {} FROM {} WHERE contact_id = ? ORDER BY rowid",
        columns.join(", "),
        mapping.table
    );

    let rows = sqlx::query(&sql)
        .bind(contact_id.to_string())
        .fetch_all(pool)
        .await?;

    let records: Vec<StoredRecord> = rows
        .iter()
        .map(|row| {
            mapping
                .fields
                .iter()
                .map(|f| (f.column, row.get::<Option<String>, _>(f.column)))
                .collect()
        })
        .collect();
    Ok(records)
}

pub async fn count_sub_records(pool: &SqlitePool, mapping: &EntityMapping) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", mapping.table))
        .fetch_one(pool)
        .await?;
    Ok(count)
}
