//! Incremental refresh
//!
//! Harvests only lists and contacts modified since the newest timestamp
//! already stored, then reconciles them.

use dcombine_common::Result;
use tracing::{info, warn};

use super::harvester::{Collection, HarvestOutcome, Harvester};
use super::progress::ProgressReporter;
use super::reconciler::{ReconcileReport, Reconciler};
use crate::db::{contacts, lists};

/// Result of one refresh
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub lists_since: Option<String>,
    pub contacts_since: Option<String>,
    /// False when either harvest ended early
    pub harvest_complete: bool,
    pub report: ReconcileReport,
}

/// Harvest changes since the stored high-water marks and reconcile them
///
/// A harvest that ends early still reconciles whatever was gathered.
pub async fn refresh(
    harvester: &Harvester,
    reconciler: &Reconciler,
    progress: &dyn ProgressReporter,
) -> Result<RefreshOutcome> {
    let lists_since = lists::most_recent_list_modified(reconciler.pool()).await?;
    let contacts_since = contacts::most_recent_contact_modified(reconciler.pool()).await?;

    info!(
        lists_since = lists_since.as_deref().unwrap_or("-"),
        contacts_since = contacts_since.as_deref().unwrap_or("-"),
        "Refreshing from remote"
    );

    let lists = harvester.harvest(Collection::Lists, lists_since.as_deref()).await?;
    let contacts = harvester.harvest(Collection::Contacts, contacts_since.as_deref()).await?;
    let harvest_complete = lists.is_complete() && contacts.is_complete();

    warn_partial(Collection::Lists, &lists);
    warn_partial(Collection::Contacts, &contacts);

    let report = reconciler.reconcile(&lists.records, &contacts.records, progress).await;

    Ok(RefreshOutcome {
        lists_since,
        contacts_since,
        harvest_complete,
        report,
    })
}

/// Log when `outcome` stopped before its last page
pub(super) fn warn_partial(collection: Collection, outcome: &HarvestOutcome) {
    if let Some(failure) = &outcome.failure {
        warn!(
            status = failure.status,
            "Reconciling partial {} harvest ({} records)",
            collection.name(),
            outcome.records.len()
        );
    } else if let Some(e) = &outcome.error {
        warn!(
            "Reconciling partial {} harvest ({} records): {}",
            collection.name(),
            outcome.records.len(),
            e
        );
    }
}
