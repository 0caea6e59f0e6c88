//! Contact export and publish
//!
//! Renders a stored contact back into the remote record shape and posts it
//! to the remote API.

use dcombine_common::{Error, Result};
use serde_json::{json, Map, Value};
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::api_client::{read_json, ApiClient};
use crate::db::sub_records::{self, StoredRecord};
use crate::db::{contacts, memberships, phones};
use crate::models::field_map::{
    choice_label, Choices, ADDRESS, ADDRESS_TYPE_CHOICES, CONFIRM_STATUS_CHOICES, EMAIL_ADDRESS,
    LIST_STATUS_CHOICES, NOTE, OPT_IN_SOURCE_CHOICES, STATUS_CHOICES,
};
use crate::models::PhoneRole;

/// Written into every exported record
pub const SOURCE_DETAILS: &str = "Data Combine";

const DEFAULT_STATUS: &str = "ACTIVE";

/// Publish behaviour
#[derive(Debug, Clone, Copy)]
pub struct PublishOptions {
    /// Look each email address up remotely before posting
    pub check_existing: bool,
    /// Post even when the remote already holds a matching contact
    pub allow_update: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            check_existing: true,
            allow_update: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// Remote already has the contact and updates are not allowed
    Skipped { existing: Value },
    Published { response: Value },
}

/// Render the stored contact with remote id `cc_id` as a remote record
pub async fn export_contact(pool: &SqlitePool, cc_id: i64) -> Result<Value> {
    let contact = {
        let mut conn = pool.acquire().await?;
        contacts::load_contact_by_cc_id(&mut *conn, cc_id).await?
    }
    .ok_or_else(|| Error::NotFound(format!("Contact {}", cc_id)))?;

    let mut phone_values: Map<String, Value> = PhoneRole::ALL
        .iter()
        .map(|role| (role.as_str().to_string(), Value::from("")))
        .collect();
    for (role, phone) in phones::load_contact_phones(pool, contact.guid).await? {
        phone_values.insert(role.as_str().to_string(), Value::from(phone.to_string()));
    }

    let addresses: Vec<Value> = sub_records::load_sub_records(pool, &ADDRESS, contact.guid)
        .await?
        .iter()
        .map(|a| {
            json!({
                "address_type": label(ADDRESS_TYPE_CHOICES, a.get("address_type")),
                "city": text(a, "city"),
                "id": text_or_empty(a, "cc_id"),
                "line1": text(a, "line1"),
                "line2": text(a, "line2"),
                "line3": text(a, "line3"),
                "postal_code": text(a, "postal_code"),
                "state": text(a, "state"),
                "state_code": text(a, "state_code"),
                "sub_postal_code": text(a, "sub_postal_code"),
            })
        })
        .collect();

    let email_addresses: Vec<Value> = sub_records::load_sub_records(pool, &EMAIL_ADDRESS, contact.guid)
        .await?
        .iter()
        .map(|e| {
            json!({
                "confirm_status": label(CONFIRM_STATUS_CHOICES, e.get("confirm_status")),
                "email_address": text(e, "email_address"),
                "id": text_or_empty(e, "cc_id"),
                "opt_in_date": text_or_empty(e, "opt_in_date"),
                "opt_in_source": label(OPT_IN_SOURCE_CHOICES, e.get("opt_in_source")).unwrap_or_default(),
                "status": label(STATUS_CHOICES, e.get("status")),
            })
        })
        .collect();

    let notes: Vec<Value> = sub_records::load_sub_records(pool, &NOTE, contact.guid)
        .await?
        .iter()
        .map(|n| {
            json!({
                "created_date": text(n, "created_date"),
                "id": text_or_empty(n, "cc_id"),
                "modified_date": text(n, "modified_date"),
                "note": text(n, "note"),
            })
        })
        .collect();

    let lists: Vec<Value> = memberships::load_contact_memberships(pool, contact.guid)
        .await?
        .into_iter()
        .map(|(list_cc_id, status)| {
            json!({
                "id": list_cc_id.to_string(),
                "status": choice_label(LIST_STATUS_CHOICES, &status),
            })
        })
        .collect();

    let status = choice_label(STATUS_CHOICES, &contact.status).unwrap_or_else(|| DEFAULT_STATUS.to_string());

    let mut record = json!({
        "addresses": addresses,
        "company_name": contact.company_name,
        "confirmed": contact.confirmed,
        "created_date": contact.created_date,
        "email_addresses": email_addresses,
        "first_name": contact.first_name,
        "id": contact.cc_id.to_string(),
        "job_title": contact.job_title,
        "last_name": contact.last_name,
        "lists": lists,
        "middle_name": contact.middle_name,
        "modified_date": contact.cc_modified_date,
        "notes": notes,
        "prefix_name": contact.prefix_name,
        "source": contact.source,
        "source_details": SOURCE_DETAILS,
        "status": status,
    });
    if let Value::Object(fields) = &mut record {
        fields.extend(phone_values);
    }

    Ok(record)
}

/// Export the contact and post it to `contacts_uri`
///
/// # Errors
/// - `Error::NotFound` when no contact has remote id `cc_id`
/// - `Error::Fetch` when the lookup or the post answers with status >= 400
pub async fn publish_contact(
    client: &ApiClient,
    pool: &SqlitePool,
    contacts_uri: &str,
    cc_id: i64,
    options: PublishOptions,
) -> Result<PublishOutcome> {
    let record = export_contact(pool, cc_id).await?;

    if options.check_existing {
        let emails = record["email_addresses"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|e| e["email_address"].as_str());

        for email in emails {
            let response = client.get(contacts_uri, &[("email", email.to_string())]).await?;
            let body = read_json(response).await?.map_err(Error::from)?;

            let existing = body.get("results").filter(|r| match r {
                Value::Array(results) => !results.is_empty(),
                Value::Null => false,
                _ => true,
            });

            if let Some(existing) = existing {
                if !options.allow_update {
                    warn!(
                        "Updates not allowed and contact exists: {}, quitting.",
                        existing
                    );
                    return Ok(PublishOutcome::Skipped {
                        existing: existing.clone(),
                    });
                }
            }
        }
    }

    let params = [("action_by", "ACTION_BY_OWNER".to_string())];
    let response = client.post_json(contacts_uri, &params, &record).await?;
    let reason = response.status().canonical_reason().unwrap_or("").to_string();
    let body = read_json(response).await?.map_err(Error::from)?;

    let remote_id = body.get("id").cloned().unwrap_or_default();
    info!("{} ID#: {}", reason, remote_id);
    Ok(PublishOutcome::Published { response: body })
}

fn text(record: &StoredRecord, column: &str) -> Value {
    record.get(column).cloned().flatten().into()
}

fn text_or_empty(record: &StoredRecord, column: &str) -> Value {
    Value::from(record.get(column).cloned().flatten().unwrap_or_default())
}

fn label(choices: Choices, code: Option<&Option<String>>) -> Option<String> {
    code.and_then(Option::as_deref)
        .and_then(|c| choice_label(choices, c))
}
