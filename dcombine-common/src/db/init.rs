//! Database initialization
//!
//! Creates the database on first run and brings the schema up to date:
//! 1. CREATE TABLE IF NOT EXISTS for every entity table
//! 2. Versioned migrations (see `migrations.rs`)

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL keeps readers (matcher, export) unblocked while a run commits
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and run pending migrations (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_schema_version_table(pool).await?;
    create_remote_lists_table(pool).await?;
    create_contacts_table(pool).await?;
    create_phone_numbers_table(pool).await?;
    create_contact_phones_table(pool).await?;
    create_addresses_table(pool).await?;
    create_email_addresses_table(pool).await?;
    create_notes_table(pool).await?;
    create_list_memberships_table(pool).await?;
    create_remediation_entries_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the remote_lists table
///
/// One row per remote mailing list, keyed by the numeric remote id.
pub async fn create_remote_lists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS remote_lists (
            guid TEXT PRIMARY KEY,
            cc_id INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('AC', 'HI')),
            created_date TEXT NOT NULL,
            modified_date TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the contacts table
///
/// `cc_modified_date` is the remote modification time; `local_modified_at`
/// advances on every successful reconciliation.
pub async fn create_contacts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            guid TEXT PRIMARY KEY,
            cc_id INTEGER NOT NULL UNIQUE,
            first_name TEXT,
            middle_name TEXT,
            last_name TEXT,
            company_name TEXT,
            job_title TEXT,
            prefix_name TEXT,
            source TEXT,
            confirmed INTEGER,
            status TEXT,
            created_date TEXT NOT NULL,
            cc_modified_date TEXT NOT NULL,
            local_modified_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the phone_numbers table
///
/// Rows are content-addressed: the unique index treats NULL parts as empty
/// so two `(NULL, 1234567, NULL)` rows cannot coexist.
pub async fn create_phone_numbers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS phone_numbers (
            guid TEXT PRIMARY KEY,
            area_code TEXT,
            number TEXT NOT NULL,
            extension TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_phone_numbers_content
        ON phone_numbers (IFNULL(area_code, ''), number, IFNULL(extension, ''))
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the contact_phones linking table (contact x phone x role)
pub async fn create_contact_phones_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contact_phones (
            contact_id TEXT NOT NULL REFERENCES contacts(guid) ON DELETE CASCADE,
            phone_id TEXT NOT NULL REFERENCES phone_numbers(guid),
            role TEXT NOT NULL CHECK (role IN ('cell_phone', 'home_phone', 'work_phone', 'fax')),
            PRIMARY KEY (contact_id, role, phone_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the addresses table
pub async fn create_addresses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS addresses (
            guid TEXT PRIMARY KEY,
            contact_id TEXT NOT NULL REFERENCES contacts(guid) ON DELETE CASCADE,
            cc_id TEXT NOT NULL UNIQUE,
            address_type TEXT,
            city TEXT,
            country_code TEXT,
            line1 TEXT,
            line2 TEXT,
            line3 TEXT,
            postal_code TEXT,
            state TEXT,
            state_code TEXT,
            sub_postal_code TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the email_addresses table
pub async fn create_email_addresses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS email_addresses (
            guid TEXT PRIMARY KEY,
            contact_id TEXT NOT NULL REFERENCES contacts(guid) ON DELETE CASCADE,
            cc_id TEXT NOT NULL UNIQUE,
            confirm_status TEXT,
            status TEXT,
            opt_in_date TEXT,
            opt_out_date TEXT,
            email_address TEXT,
            opt_in_source TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the notes table (append-only)
pub async fn create_notes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            guid TEXT PRIMARY KEY,
            contact_id TEXT NOT NULL REFERENCES contacts(guid) ON DELETE CASCADE,
            cc_id TEXT NOT NULL UNIQUE,
            created_date TEXT,
            modified_date TEXT,
            note TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the list_memberships table (contact x list with per-membership status)
pub async fn create_list_memberships_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS list_memberships (
            guid TEXT PRIMARY KEY,
            contact_id TEXT NOT NULL REFERENCES contacts(guid) ON DELETE CASCADE,
            list_id TEXT NOT NULL REFERENCES remote_lists(guid),
            status TEXT NOT NULL CHECK (status IN ('AC', 'HI')),
            UNIQUE (contact_id, list_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the remediation_entries table (append-only ledger)
pub async fn create_remediation_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS remediation_entries (
            guid TEXT PRIMARY KEY,
            contact_id TEXT NOT NULL REFERENCES contacts(guid) ON DELETE CASCADE,
            contact_cc_id INTEGER NOT NULL,
            field_name TEXT NOT NULL,
            raw_value TEXT NOT NULL,
            recorded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
