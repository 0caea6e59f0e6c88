//! Phone number persistence
//!
//! Phone rows are shared between contacts and addressed by content: a
//! normalized `(area_code, number, extension)` triple is stored once and
//! linked to every contact that uses it.

use dcombine_common::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::parse_guid;
use crate::models::{PhoneNumber, PhoneRole};

/// Find the stored row holding exactly this triple
pub async fn find_phone(conn: &mut SqliteConnection, phone: &PhoneNumber) -> Result<Option<Uuid>> {
    let guid: Option<String> = sqlx::query_scalar(
        r#"
        SELECT guid FROM phone_numbers
        WHERE IFNULL(area_code, '') = ? AND number = ? AND IFNULL(extension, '') = ?
        "#,
    )
    .bind(phone.area_code.as_deref().unwrap_or(""))
    .bind(phone.number.as_deref().unwrap_or(""))
    .bind(phone.extension.as_deref().unwrap_or(""))
    .fetch_optional(&mut *conn)
    .await?;

    guid.as_deref().map(parse_guid).transpose()
}

/// Reuse the stored row for this triple or insert a new one
pub async fn find_or_insert_phone(conn: &mut SqliteConnection, phone: &PhoneNumber) -> Result<Uuid> {
    let Some(number) = phone.number.as_deref() else {
        return Err(Error::InvalidInput("Cannot store a phone number without digits".to_string()));
    };

    if let Some(existing) = find_phone(conn, phone).await? {
        debug!(phone = %phone, "Phone number is already in database");
        return Ok(existing);
    }

    let guid = Uuid::new_v4();
    sqlx::query("INSERT INTO phone_numbers (guid, area_code, number, extension) VALUES (?, ?, ?, ?)")
        .bind(guid.to_string())
        .bind(&phone.area_code)
        .bind(number)
        .bind(&phone.extension)
        .execute(&mut *conn)
        .await?;

    Ok(guid)
}

/// Link a phone row to a contact under `role` (no-op when already linked)
pub async fn link_phone(
    conn: &mut SqliteConnection,
    contact_id: Uuid,
    phone_id: Uuid,
    role: PhoneRole,
) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO contact_phones (contact_id, phone_id, role) VALUES (?, ?, ?)")
        .bind(contact_id.to_string())
        .bind(phone_id.to_string())
        .bind(role.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Phones linked to a contact, first per role
pub async fn load_contact_phones(pool: &SqlitePool, contact_id: Uuid) -> Result<Vec<(PhoneRole, PhoneNumber)>> {
    let rows = sqlx::query(
        r#"
        SELECT cp.role, p.area_code, p.number, p.extension
        FROM contact_phones cp
        JOIN phone_numbers p ON p.guid = cp.phone_id
        WHERE cp.contact_id = ?
        ORDER BY cp.role, p.rowid
        "#,
    )
    .bind(contact_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut phones: Vec<(PhoneRole, PhoneNumber)> = Vec::new();
    for row in rows {
        let role: String = row.get("role");
        let Some(role) = PhoneRole::from_str_opt(&role) else {
            continue;
        };
        if phones.iter().any(|(r, _)| *r == role) {
            continue;
        }
        phones.push((
            role,
            PhoneNumber {
                area_code: row.get("area_code"),
                number: row.get("number"),
                extension: row.get("extension"),
            },
        ));
    }
    Ok(phones)
}

pub async fn count_phone_numbers(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM phone_numbers")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
