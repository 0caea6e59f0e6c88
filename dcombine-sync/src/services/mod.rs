//! Sync services: harvesting, snapshot caching, reconciliation and the
//! operations built on top of them

pub mod api_client;
pub mod harvester;
pub mod matcher;
pub mod progress;
pub mod publisher;
pub mod reconciler;
pub mod refresh;
pub mod snapshot;
pub mod task;

pub use api_client::{ApiClient, FetchFailure};
pub use harvester::{Collection, HarvestOutcome, Harvester};
pub use matcher::match_contacts;
pub use progress::{ChannelProgress, ConsoleProgress, ProgressReporter, SilentProgress};
pub use publisher::{export_contact, publish_contact, PublishOptions, PublishOutcome};
pub use reconciler::{ContactOutcome, ListOutcome, ReconcileReport, Reconciler};
pub use refresh::{refresh, RefreshOutcome};
pub use snapshot::{SaveMode, Snapshot, SnapshotStore};
pub use task::run_task;
