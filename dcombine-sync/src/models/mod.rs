//! Data models: field parsers, mapping tables and the remediation ledger

pub mod field_map;
pub mod phone;
pub mod remediation;
pub mod status;

pub use phone::{PhoneNumber, PhoneRole};
pub use remediation::{RemediationCategory, RemediationEntry, RemediationLedger};
