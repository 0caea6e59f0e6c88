//! Contact persistence

use chrono::{TimeZone, Utc};
use dcombine_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::parse_guid;
use crate::models::field_map::MappedRow;

/// Contact record
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub guid: Uuid,
    pub cc_id: i64,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub prefix_name: Option<String>,
    pub source: Option<String>,
    pub confirmed: Option<bool>,
    /// Two-letter status code, empty when unknown
    pub status: String,
    pub created_date: String,
    /// Remote modification time, normalized ISO-8601
    pub cc_modified_date: String,
    /// Local modification time, advanced on every reconciliation
    pub local_modified_at: String,
}

impl Contact {
    /// Build a new contact from mapped scalar columns
    pub fn from_row(row: &MappedRow, status: String, confirmed: Option<bool>) -> Result<Self> {
        let mut contact = Self {
            guid: Uuid::new_v4(),
            cc_id: row.get_i64("cc_id")?,
            first_name: None,
            middle_name: None,
            last_name: None,
            company_name: None,
            job_title: None,
            prefix_name: None,
            source: None,
            confirmed: None,
            status: String::new(),
            created_date: String::new(),
            cc_modified_date: String::new(),
            local_modified_at: next_local_modified(None)?,
        };
        contact.apply(row, status, confirmed)?;
        Ok(contact)
    }

    /// Overwrite scalar fields with incoming values, keeping identity
    pub fn apply(&mut self, row: &MappedRow, status: String, confirmed: Option<bool>) -> Result<()> {
        let text = |column: &str| row.get(column).map(String::from);
        let required = |column: &str| {
            text(column).ok_or_else(|| Error::InvalidInput(format!("Contact has no '{}'", column)))
        };

        self.first_name = text("first_name");
        self.middle_name = text("middle_name");
        self.last_name = text("last_name");
        self.company_name = text("company_name");
        self.job_title = text("job_title");
        self.prefix_name = text("prefix_name");
        self.source = text("source");
        self.created_date = required("created_date")?;
        self.cc_modified_date = required("cc_modified_date")?;
        self.status = status;
        self.confirmed = confirmed;
        Ok(())
    }
}

/// Next local modification time: now, but always after `previous`
pub fn next_local_modified(previous: Option<&str>) -> Result<String> {
    let now_ms = time::now().timestamp_millis();
    let next_ms = match previous {
        Some(prev) => now_ms.max(time::parse_iso8601(prev)?.timestamp_millis() + 1),
        None => now_ms,
    };
    let next = Utc
        .timestamp_millis_opt(next_ms)
        .single()
        .ok_or_else(|| Error::Internal(format!("timestamp out of range: {}", next_ms)))?;
    Ok(time::to_iso8601(&next))
}

/// Insert a new contact
pub async fn insert_contact(conn: &mut SqliteConnection, contact: &Contact) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO contacts (
            guid, cc_id, first_name, middle_name, last_name, company_name,
            job_title, prefix_name, source, confirmed, status,
            created_date, cc_modified_date, local_modified_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(contact.guid.to_string())
    .bind(contact.cc_id)
    .bind(&contact.first_name)
    .bind(&contact.middle_name)
    .bind(&contact.last_name)
    .bind(&contact.company_name)
    .bind(&contact.job_title)
    .bind(&contact.prefix_name)
    .bind(&contact.source)
    .bind(contact.confirmed)
    .bind(&contact.status)
    .bind(&contact.created_date)
    .bind(&contact.cc_modified_date)
    .bind(&contact.local_modified_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Persist scalar fields and timestamps of an existing contact
pub async fn update_contact(conn: &mut SqliteConnection, contact: &Contact) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE contacts SET
            first_name = ?, middle_name = ?, last_name = ?, company_name = ?,
            job_title = ?, prefix_name = ?, source = ?, confirmed = ?, status = ?,
            created_date = ?, cc_modified_date = ?, local_modified_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&contact.first_name)
    .bind(&contact.middle_name)
    .bind(&contact.last_name)
    .bind(&contact.company_name)
    .bind(&contact.job_title)
    .bind(&contact.prefix_name)
    .bind(&contact.source)
    .bind(contact.confirmed)
    .bind(&contact.status)
    .bind(&contact.created_date)
    .bind(&contact.cc_modified_date)
    .bind(&contact.local_modified_at)
    .bind(contact.guid.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

const SELECT_CONTACT: &str = r#"
    SELECT guid, cc_id, first_name, middle_name, last_name, company_name,
           job_title, prefix_name, source, confirmed, status,
           created_date, cc_modified_date, local_modified_at
    FROM contacts
"#;

fn contact_from_row(row: &SqliteRow) -> Result<Contact> {
    let guid: String = row.get("guid");
    let status: Option<String> = row.get("status");
    Ok(Contact {
        guid: parse_guid(&guid)?,
        cc_id: row.get("cc_id"),
        first_name: row.get("first_name"),
        middle_name: row.get("middle_name"),
        last_name: row.get("last_name"),
        company_name: row.get("company_name"),
        job_title: row.get("job_title"),
        prefix_name: row.get("prefix_name"),
        source: row.get("source"),
        confirmed: row.get("confirmed"),
        status: status.unwrap_or_default(),
        created_date: row.get("created_date"),
        cc_modified_date: row.get("cc_modified_date"),
        local_modified_at: row.get("local_modified_at"),
    })
}

/// Load contact by remote id
pub async fn load_contact_by_cc_id(conn: &mut SqliteConnection, cc_id: i64) -> Result<Option<Contact>> {
    let row = sqlx::query(&format!("{} WHERE cc_id = ?", SELECT_CONTACT))
        .bind(cc_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(contact_from_row).transpose()
}

/// Load contacts by guid, in the order given (unknown guids are skipped)
pub async fn load_contacts_by_guids(pool: &SqlitePool, guids: &[Uuid]) -> Result<Vec<Contact>> {
    let mut contacts = Vec::with_capacity(guids.len());
    for guid in guids {
        let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT_CONTACT))
            .bind(guid.to_string())
            .fetch_optional(pool)
            .await?;
        if let Some(row) = row {
            contacts.push(contact_from_row(&row)?);
        }
    }
    Ok(contacts)
}

/// Newest stored remote modification time, `None` for an empty store
pub async fn most_recent_contact_modified(pool: &SqlitePool) -> Result<Option<String>> {
    let newest: Option<String> =
        sqlx::query_scalar("SELECT cc_modified_date FROM contacts ORDER BY cc_modified_date DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;
    Ok(newest)
}

pub async fn count_contacts(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
