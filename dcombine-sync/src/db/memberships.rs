//! List membership persistence (contact x list with per-membership status)

use dcombine_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// What `upsert_membership` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Created,
    Updated,
    Unchanged,
}

/// Create the membership, or update its status in place when it differs
pub async fn upsert_membership(
    conn: &mut SqliteConnection,
    contact_id: Uuid,
    list_id: Uuid,
    status: &str,
) -> Result<MembershipChange> {
    let existing: Option<String> =
        sqlx::query_scalar("SELECT status FROM list_memberships WHERE contact_id = ? AND list_id = ?")
            .bind(contact_id.to_string())
            .bind(list_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

    match existing {
        Some(current) if current == status => Ok(MembershipChange::Unchanged),
        Some(_) => {
            sqlx::query("UPDATE list_memberships SET status = ? WHERE contact_id = ? AND list_id = ?")
                .bind(status)
                .bind(contact_id.to_string())
                .bind(list_id.to_string())
                .execute(&mut *conn)
                .await?;
            Ok(MembershipChange::Updated)
        }
        None => {
            sqlx::query(
                "INSERT INTO list_memberships (guid, contact_id, list_id, status) VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(contact_id.to_string())
            .bind(list_id.to_string())
            .bind(status)
            .execute(&mut *conn)
            .await?;
            Ok(MembershipChange::Created)
        }
    }
}

/// `(list remote id, status code)` for each list the contact belongs to
pub async fn load_contact_memberships(pool: &SqlitePool, contact_id: Uuid) -> Result<Vec<(i64, String)>> {
    let rows = sqlx::query(
        r#"
        SELECT l.cc_id, m.status
        FROM list_memberships m
        JOIN remote_lists l ON l.guid = m.list_id
        WHERE m.contact_id = ?
        ORDER BY l.cc_id
        "#,
    )
    .bind(contact_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get("cc_id"), row.get("status")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::contacts::{insert_contact, Contact};
    use crate::db::lists::{save_list, RemoteList};
    use crate::models::field_map::CONTACT;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_upsert_membership_transitions() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        dcombine_common::db::init_schema(&pool).await.unwrap();

        let row = CONTACT
            .map_record(&json!({"id": 3, "created_date": "2012-01-01T00:00:00Z", "modified_date": "2012-01-01T00:00:00Z"}))
            .unwrap();
        let contact = Contact::from_row(&row, String::new(), None).unwrap();
        let list = RemoteList::new(
            11,
            "Board".to_string(),
            "AC",
            "2012-01-01T00:00:00.000Z".to_string(),
            "2012-01-01T00:00:00.000Z".to_string(),
        );

        let mut conn = pool.acquire().await.unwrap();
        insert_contact(&mut conn, &contact).await.unwrap();
        save_list(&mut conn, &list).await.unwrap();

        let change = upsert_membership(&mut conn, contact.guid, list.guid, "AC").await.unwrap();
        assert_eq!(change, MembershipChange::Created);
        let change = upsert_membership(&mut conn, contact.guid, list.guid, "AC").await.unwrap();
        assert_eq!(change, MembershipChange::Unchanged);
        let change = upsert_membership(&mut conn, contact.guid, list.guid, "HI").await.unwrap();
        assert_eq!(change, MembershipChange::Updated);
        drop(conn);

        let memberships = load_contact_memberships(&pool, contact.guid).await.unwrap();
        assert_eq!(memberships, vec![(11, "HI".to_string())]);
    }
}
