//! # Revenda Core
//!
//! Shared foundation for the Revenda back office: domain types,
//! configuration, the error type, and the storage layer the automation
//! scheduler consumes.
//!
//! The CRUD API that creates clients, templates, and automation
//! configs lives in a separate service; this crate only defines the
//! contracts that service and the scheduler agree on, plus the SQLite
//! implementation both sides share.

pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::RevendaConfig;
pub use error::{Result, RevendaError};
#[cfg(any(test, feature = "test-util"))]
pub use storage::MemoryStorage;
pub use storage::{SqliteStorage, Storage};
pub use types::{
    AutomationConfig, AutomationType, Client, MessageTemplate, SubItem, SubscriptionStatus,
};
