//! Test Helper Utilities
//!
//! Shared fixtures for dcombine-sync integration tests

#![allow(dead_code)]

pub mod mock_api;

use dcombine_common::db::init_database;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create a temporary database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn setup_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("test_dcombine.db")).await.unwrap();
    (temp_dir, pool)
}

/// Remote list record
pub fn sample_list(id: i64, name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "name": name,
        "status": "ACTIVE",
        "created_date": "2017-03-01T10:00:00.000Z",
        "modified_date": "2017-03-01T10:00:00.000Z",
        "contact_count": 3
    })
}

/// Remote contact record with one list membership, one address and one email
pub fn sample_contact(id: i64, first_name: &str, last_name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "status": "ACTIVE",
        "first_name": first_name,
        "last_name": last_name,
        "company_name": "Crimson Star",
        "job_title": "Engineer",
        "source": "Site Owner",
        "confirmed": false,
        "created_date": "2017-08-26T14:52:00.000Z",
        "modified_date": "2017-08-26T14:52:00.000Z",
        "home_phone": "",
        "work_phone": null,
        "cell_phone": "(904) 712-1983",
        "fax": "",
        "lists": [{"id": "1648", "status": "ACTIVE"}],
        "addresses": [{
            "id": format!("addr-{}", id),
            "address_type": "BUSINESS",
            "city": "Jacksonville",
            "country_code": "us",
            "line1": "1 Main St",
            "line2": "",
            "line3": "",
            "postal_code": "32202",
            "state": "Florida",
            "state_code": "FL",
            "sub_postal_code": ""
        }],
        "email_addresses": [{
            "id": format!("email-{}", id),
            "status": "ACTIVE",
            "confirm_status": "NO_CONFIRMATION_REQUIRED",
            "opt_in_source": "ACTION_BY_OWNER",
            "opt_in_date": "2017-08-26T14:52:00.000Z",
            "email_address": format!("{}.{}@example.com", first_name.to_lowercase(), last_name.to_lowercase())
        }],
        "notes": []
    })
}
