//! Harvest-then-reconcile task with phase progress
//!
//! Emits `{harvest_done, process_percent}` events: one before harvesting,
//! one once harvesting is done, then one per contact reconciled.

use dcombine_common::events::{ProgressEvent, TaskProgress};
use dcombine_common::Result;
use tokio::sync::mpsc;
use tracing::info;

use super::harvester::{Collection, Harvester};
use super::reconciler::{ReconcileReport, Reconciler};
use super::refresh::warn_partial;

/// Full harvest followed by reconciliation
///
/// Harvest failures keep the partial result, as in [`super::refresh`].
pub async fn run_task(
    harvester: &Harvester,
    reconciler: &Reconciler,
    tx: mpsc::UnboundedSender<TaskProgress>,
) -> Result<ReconcileReport> {
    let _ = tx.send(TaskProgress::harvesting());

    let lists = harvester.harvest(Collection::Lists, None).await?;
    let contacts = harvester.harvest(Collection::Contacts, None).await?;
    warn_partial(Collection::Lists, &lists);
    warn_partial(Collection::Contacts, &contacts);

    let _ = tx.send(TaskProgress::harvested());
    info!(
        lists = lists.records.len(),
        contacts = contacts.records.len(),
        "Harvest finished, reconciling"
    );

    let reporter = move |event: ProgressEvent| {
        let _ = tx.send(TaskProgress::processing(&event));
    };
    Ok(reconciler.reconcile(&lists.records, &contacts.records, &reporter).await)
}
