//! Remote list persistence

use dcombine_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::parse_guid;

/// Remote mailing list
#[derive(Debug, Clone)]
pub struct RemoteList {
    pub guid: Uuid,
    pub cc_id: i64,
    pub name: String,
    /// `AC` or `HI`
    pub status: String,
    pub created_date: String,
    pub modified_date: String,
}

impl RemoteList {
    pub fn new(cc_id: i64, name: String, status: &str, created_date: String, modified_date: String) -> Self {
        Self {
            guid: Uuid::new_v4(),
            cc_id,
            name,
            status: status.to_string(),
            created_date,
            modified_date,
        }
    }

    /// Structural identity: same numeric remote id and same name
    pub fn matches(&self, other: &RemoteList) -> bool {
        self.cc_id == other.cc_id && self.name == other.name
    }
}

/// Insert a new list
pub async fn save_list(conn: &mut SqliteConnection, list: &RemoteList) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO remote_lists (guid, cc_id, name, status, created_date, modified_date)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(list.guid.to_string())
    .bind(list.cc_id)
    .bind(&list.name)
    .bind(&list.status)
    .bind(&list.created_date)
    .bind(&list.modified_date)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Load list by remote id
pub async fn load_list_by_cc_id(conn: &mut SqliteConnection, cc_id: i64) -> Result<Option<RemoteList>> {
    let row = sqlx::query(
        r#"
        SELECT guid, cc_id, name, status, created_date, modified_date
        FROM remote_lists
        WHERE cc_id = ?
        "#,
    )
    .bind(cc_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let guid: String = row.get("guid");
            Ok(Some(RemoteList {
                guid: parse_guid(&guid)?,
                cc_id: row.get("cc_id"),
                name: row.get("name"),
                status: row.get("status"),
                created_date: row.get("created_date"),
                modified_date: row.get("modified_date"),
            }))
        }
        None => Ok(None),
    }
}

/// Newest stored list modification time, `None` for an empty store
pub async fn most_recent_list_modified(pool: &SqlitePool) -> Result<Option<String>> {
    let newest: Option<String> =
        sqlx::query_scalar("SELECT modified_date FROM remote_lists ORDER BY modified_date DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;
    Ok(newest)
}

pub async fn count_lists(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM remote_lists")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        dcombine_common::db::init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_save_and_load_list() {
        let pool = setup_test_db().await;
        let list = RemoteList::new(
            1648,
            "Volunteers".to_string(),
            "AC",
            "2013-01-01T00:00:00.000Z".to_string(),
            "2014-02-03T04:05:06.000Z".to_string(),
        );

        let mut conn = pool.acquire().await.unwrap();
        save_list(&mut conn, &list).await.unwrap();
        let loaded = load_list_by_cc_id(&mut conn, 1648).await.unwrap().unwrap();
        drop(conn);

        assert_eq!(loaded.guid, list.guid);
        assert!(loaded.matches(&list));
        assert_eq!(count_lists(&pool).await.unwrap(), 1);
        assert_eq!(
            most_recent_list_modified(&pool).await.unwrap().as_deref(),
            Some("2014-02-03T04:05:06.000Z")
        );
    }

    #[tokio::test]
    async fn test_most_recent_on_empty_store() {
        let pool = setup_test_db().await;
        assert_eq!(most_recent_list_modified(&pool).await.unwrap(), None);
    }
}
