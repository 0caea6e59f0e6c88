//! # Data Combine Common Library
//!
//! Shared code for the contact synchronization engine:
//! - Error taxonomy and classification
//! - Configuration loading
//! - ISO-8601 timestamp handling
//! - Database initialization and migrations
//! - Progress event types consumed by callers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, ErrorKind, Result};
