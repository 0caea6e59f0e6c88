//! dcombine-sync library interface
//!
//! Exposes the repositories, models and services for the binary and for
//! integration testing.

pub mod db;
pub mod models;
pub mod services;

pub use services::{Harvester, ReconcileReport, Reconciler, SnapshotStore};
