//! Remediation entry persistence (append-only)

use dcombine_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::{PhoneRole, RemediationCategory, RemediationEntry};

/// Record an entry against its owning contact
pub async fn save_remediation_entry(
    conn: &mut SqliteConnection,
    contact_id: Uuid,
    entry: &RemediationEntry,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO remediation_entries (guid, contact_id, contact_cc_id, field_name, raw_value)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(contact_id.to_string())
    .bind(entry.contact_cc_id)
    .bind(&entry.field_name)
    .bind(serde_json::to_string(&entry.raw_value)?)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Entries for one contact (by remote id), oldest first
pub async fn load_remediation_entries(pool: &SqlitePool, contact_cc_id: i64) -> Result<Vec<RemediationEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT contact_cc_id, field_name, raw_value
        FROM remediation_entries
        WHERE contact_cc_id = ?
        ORDER BY recorded_at, rowid
        "#,
    )
    .bind(contact_cc_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let field_name: String = row.get("field_name");
            let raw: String = row.get("raw_value");
            let category = if PhoneRole::from_str_opt(&field_name).is_some() {
                RemediationCategory::Phone
            } else {
                RemediationCategory::Relation
            };
            Ok(RemediationEntry {
                contact_cc_id: row.get("contact_cc_id"),
                field_name,
                raw_value: serde_json::from_str(&raw)?,
                category,
            })
        })
        .collect()
}

pub async fn count_remediation_entries(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM remediation_entries")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
