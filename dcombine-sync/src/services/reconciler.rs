//! Reconciliation engine
//!
//! Turns harvested remote records into local rows. A run is two ordered
//! phases: every remote list first (so memberships can resolve), then every
//! contact. Each list and each contact is its own unit of work, committed
//! or rolled back as a whole.
//!
//! Per-contact failures never abort the batch:
//! - a bad phone, address, email, note or membership value is recorded to
//!   the remediation ledger and the contact still commits
//! - an oversized contact field, a storage failure or any other error skips
//!   the contact and the run moves on
//!
//! Cancellation is checked between contacts; contacts already committed stay
//! committed.

use dcombine_common::events::ProgressEvent;
use dcombine_common::{Error, ErrorKind, Result};
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::progress::ProgressReporter;
use crate::db::contacts::{self, Contact};
use crate::db::lists::{self, RemoteList};
use crate::db::memberships::{self, MembershipChange};
use crate::db::{phones, remediation, sub_records};
use crate::models::field_map::{
    self, scalar_text, EntityMapping, MappedRow, ADDRESS, CONTACT, EMAIL_ADDRESS, NOTE, REMOTE_LIST,
};
use crate::models::status::{contact_status_code, list_status_code, membership_status_code};
use crate::models::{PhoneNumber, PhoneRole, RemediationEntry, RemediationLedger};

/// What happened to one list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOutcome {
    Inserted,
    Unchanged,
}

/// What happened to one contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    Created,
    Updated,
    /// Stored remote modification time matched; nothing written
    Unchanged,
}

/// Result of reconciling one contact
#[derive(Debug, Clone)]
pub struct ContactResult {
    pub cc_id: i64,
    pub outcome: ContactOutcome,
    /// Values recorded for remediation (already persisted with the contact)
    pub remediation: Vec<RemediationEntry>,
}

/// List phase counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListsReport {
    pub inserted: usize,
    pub unchanged: usize,
    pub conflicts: usize,
    pub failed: usize,
}

/// Summary of a reconciliation run
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub lists: ListsReport,
    /// Contacts in the batch
    pub total: usize,
    /// Contacts handled, including skipped and failed ones
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Remediation entries recorded during this run
    pub remediation: RemediationLedger,
    pub elapsed: Duration,
    /// Run stopped early on a cancellation request
    pub interrupted: bool,
}

/// Reconciles remote lists and contacts into the local store
pub struct Reconciler {
    pool: SqlitePool,
    cancel_token: CancellationToken,
}

impl Reconciler {
    /// Create a reconciler; fails when the field-mapping tables are inconsistent
    pub fn new(pool: SqlitePool) -> Result<Self> {
        field_map::validate_all()?;
        Ok(Self {
            pool,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Stop between contacts once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Reconcile all lists, then all contacts
    pub async fn reconcile(
        &self,
        lists: &[Value],
        contacts: &[Value],
        progress: &dyn ProgressReporter,
    ) -> ReconcileReport {
        let lists_report = self.reconcile_lists(lists).await;
        let mut report = self.reconcile_contacts(contacts, progress).await;
        report.lists = lists_report;
        report
    }

    /// Reconcile every list; a failing list is logged and skipped
    pub async fn reconcile_lists(&self, records: &[Value]) -> ListsReport {
        let mut report = ListsReport::default();

        for (ordinal, record) in records.iter().enumerate() {
            match self.reconcile_list(record).await {
                Ok(ListOutcome::Inserted) => report.inserted += 1,
                Ok(ListOutcome::Unchanged) => report.unchanged += 1,
                Err(e) if e.kind() == ErrorKind::Conflict => {
                    error!(list = ordinal, "{}", e);
                    report.conflicts += 1;
                }
                Err(e) => {
                    error!(list = ordinal, "Could not reconcile list: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            inserted = report.inserted,
            unchanged = report.unchanged,
            conflicts = report.conflicts,
            failed = report.failed,
            "Lists reconciled"
        );
        report
    }

    /// Reconcile one list in its own unit of work
    ///
    /// # Errors
    /// - `Error::Format` when either date is not extended ISO-8601
    /// - `Error::Conflict` when a stored list has the same remote id but a
    ///   different name; the stored list is left unchanged
    pub async fn reconcile_list(&self, record: &Value) -> Result<ListOutcome> {
        let row = REMOTE_LIST.map_record(record)?;
        let incoming = RemoteList::new(
            row.get_i64("cc_id")?,
            required(&row, "name")?,
            list_status_code(record.get("status").and_then(Value::as_str)),
            required(&row, "created_date")?,
            required(&row, "modified_date")?,
        );

        let mut tx = self.pool.begin().await?;

        match lists::load_list_by_cc_id(&mut *tx, incoming.cc_id).await? {
            Some(existing) if existing.matches(&incoming) => {
                debug!("List named '{}' already found in db skipping...", existing.name);
                Ok(ListOutcome::Unchanged)
            }
            Some(existing) => Err(Error::Conflict(format!(
                "Lists with same ID do not match: {} and {}, {} and {}.",
                incoming.name, existing.name, incoming.cc_id, existing.cc_id
            ))),
            None => {
                lists::save_list(&mut *tx, &incoming).await?;
                tx.commit().await?;
                Ok(ListOutcome::Inserted)
            }
        }
    }

    /// Reconcile every contact, reporting progress after each one
    pub async fn reconcile_contacts(&self, records: &[Value], progress: &dyn ProgressReporter) -> ReconcileReport {
        let started = Instant::now();
        let mut report = ReconcileReport {
            total: records.len(),
            ..Default::default()
        };

        for (ordinal, record) in records.iter().enumerate() {
            if self.cancel_token.is_cancelled() {
                info!("Interrupt signal received...quitting.");
                report.interrupted = true;
                break;
            }

            match self.reconcile_contact(record).await {
                Ok(result) => {
                    match result.outcome {
                        ContactOutcome::Created => report.created += 1,
                        ContactOutcome::Updated => report.updated += 1,
                        ContactOutcome::Unchanged => report.unchanged += 1,
                    }
                    for entry in &result.remediation {
                        report.remediation.record(entry);
                    }
                }
                Err(e) => {
                    log_contact_failure(ordinal, &e);
                    report.failed += 1;
                }
            }

            report.processed += 1;
            progress.report(ProgressEvent::new(report.processed, report.total));
        }

        report.elapsed = started.elapsed();
        let secs = report.elapsed.as_secs_f64();
        info!(
            "Combined time to process '{}' contacts: {} minutes and {:.2} seconds.",
            report.processed,
            (secs / 60.0).floor(),
            secs % 60.0
        );
        report
    }

    /// Reconcile one contact in its own unit of work
    ///
    /// Sub-record value failures are returned in
    /// [`ContactResult::remediation`] and do not fail the contact.
    pub async fn reconcile_contact(&self, record: &Value) -> Result<ContactResult> {
        let row = CONTACT.map_record(record)?;
        let cc_id = row.get_i64("cc_id")?;
        let status = contact_status_code(record.get("status").and_then(Value::as_str));
        let confirmed = record.get("confirmed").and_then(Value::as_bool);

        let mut tx = self.pool.begin().await?;

        let (mut contact, outcome) = match contacts::load_contact_by_cc_id(&mut *tx, cc_id).await? {
            Some(existing) if row.get("cc_modified_date") == Some(existing.cc_modified_date.as_str()) => {
                debug!(contact = cc_id, "Contact unchanged since last reconciliation");
                return Ok(ContactResult {
                    cc_id,
                    outcome: ContactOutcome::Unchanged,
                    remediation: Vec::new(),
                });
            }
            Some(mut existing) => {
                existing.apply(&row, status, confirmed)?;
                (existing, ContactOutcome::Updated)
            }
            None => {
                let contact = Contact::from_row(&row, status, confirmed)?;
                contacts::insert_contact(&mut *tx, &contact).await?;
                (contact, ContactOutcome::Created)
            }
        };

        let mut ledger = Vec::new();

        reconcile_memberships(&mut *tx, &contact, record, &mut ledger).await?;
        reconcile_phones(&mut *tx, &contact, record, &mut ledger).await?;

        for mapping in [&ADDRESS, &EMAIL_ADDRESS, &NOTE] {
            for sub in records_in(record, mapping.collection) {
                match mapping.map_record(sub) {
                    Ok(sub_row) => store_sub_record(&mut *tx, mapping, contact.guid, &sub_row).await?,
                    Err(e) if matches!(e.kind(), ErrorKind::FieldOverflow | ErrorKind::Format) => {
                        log_field_error(cc_id, &e);
                        ledger.push(field_remediation(cc_id, mapping, sub, &e));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        contact.local_modified_at = contacts::next_local_modified(Some(&contact.local_modified_at))?;
        contacts::update_contact(&mut *tx, &contact).await?;

        for entry in &ledger {
            remediation::save_remediation_entry(&mut *tx, contact.guid, entry).await?;
        }

        tx.commit().await?;

        Ok(ContactResult {
            cc_id,
            outcome,
            remediation: ledger,
        })
    }
}

/// Create or update each membership; unknown lists go to remediation
async fn reconcile_memberships(
    conn: &mut SqliteConnection,
    contact: &Contact,
    record: &Value,
    ledger: &mut Vec<RemediationEntry>,
) -> Result<()> {
    for membership in records_in(record, "lists") {
        let status = membership_status_code(membership.get("status").and_then(Value::as_str));
        let list = match numeric_id(membership.get("id")) {
            Some(list_cc_id) => lists::load_list_by_cc_id(conn, list_cc_id).await?,
            None => None,
        };

        let Some(list) = list else {
            warn!(contact = contact.cc_id, membership = %membership, "Membership names an unknown list, recording for remediation");
            ledger.push(RemediationEntry::relation(contact.cc_id, "lists", membership.clone()));
            continue;
        };

        if memberships::upsert_membership(conn, contact.guid, list.guid, status).await? == MembershipChange::Updated {
            debug!(contact = contact.cc_id, list = list.cc_id, status, "Membership status updated");
        }
    }
    Ok(())
}

/// Normalize, deduplicate and link each phone role; bad values go to remediation
async fn reconcile_phones(
    conn: &mut SqliteConnection,
    contact: &Contact,
    record: &Value,
    ledger: &mut Vec<RemediationEntry>,
) -> Result<()> {
    for role in PhoneRole::ALL {
        let Some(raw) = scalar_text(record.get(role.as_str())).filter(|s| !s.is_empty()) else {
            continue;
        };

        match PhoneNumber::normalize(&raw) {
            Ok(phone) if phone.is_empty() => {
                info!("phone_num='{}' produces no phone", raw);
            }
            Ok(phone) => {
                let phone_id = phones::find_or_insert_phone(conn, &phone).await?;
                phones::link_phone(conn, contact.guid, phone_id, role).await?;
            }
            Err(e) => {
                warn!(contact = contact.cc_id, role = %role, "Field error: {}...recording for remediation", e);
                ledger.push(RemediationEntry::phone(contact.cc_id, role.as_str(), &raw));
            }
        }
    }
    Ok(())
}

/// Insert a sub-record unless its remote sub-identifier is already stored
async fn store_sub_record(
    conn: &mut SqliteConnection,
    mapping: &EntityMapping,
    contact_id: Uuid,
    row: &MappedRow,
) -> Result<()> {
    let cc_id = required(row, mapping.identity)?;
    if sub_records::sub_record_exists(conn, mapping, &cc_id).await? {
        debug!("{} {} already in database...skipping", mapping.entity, cc_id);
        return Ok(());
    }
    sub_records::insert_sub_record(conn, mapping, contact_id, row).await?;
    Ok(())
}

/// Ledger entry naming the offending `collection.column` and its raw value;
/// the whole sub-record when no single field is to blame
fn field_remediation(contact_cc_id: i64, mapping: &EntityMapping, sub: &Value, err: &Error) -> RemediationEntry {
    match mapping.offending_field(sub, err) {
        Some((column, raw)) => {
            RemediationEntry::relation(contact_cc_id, &format!("{}.{}", mapping.collection, column), raw)
        }
        None => RemediationEntry::relation(contact_cc_id, mapping.collection, sub.clone()),
    }
}

fn required(row: &MappedRow, column: &str) -> Result<String> {
    row.get(column)
        .map(String::from)
        .ok_or_else(|| Error::InvalidInput(format!("missing '{}'", column)))
}

/// Array under `key`, or nothing when absent or not an array
fn records_in<'a>(record: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    record
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn numeric_id(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn log_field_error(contact_cc_id: i64, err: &Error) {
    match err {
        Error::FieldOverflow { entity, field, value, .. } => {
            error!(contact = contact_cc_id, "For class object {}.{}={}. Is too long.", entity, field, value);
        }
        other => {
            warn!(contact = contact_cc_id, "Field error: {}...recording for remediation", other);
        }
    }
}

/// Log a skipped contact according to its failure kind
fn log_contact_failure(ordinal: usize, err: &Error) {
    match err.kind() {
        ErrorKind::FieldOverflow => {
            if let Error::FieldOverflow { entity, field, value, .. } = err {
                error!("For class object {}.{}={}. Is too long.", entity, field, value);
            }
        }
        ErrorKind::Storage => {
            error!("Data error on contact #{} {}", ordinal, err);
        }
        ErrorKind::Format => {
            warn!("Field error on contact #{}: {}...skipping...", ordinal, err);
        }
        _ => {
            error!("Exception on contact #{}: {}...skipping...", ordinal, err);
        }
    }
}
