// Public fallible APIs in this crate share one concrete error contract (`VaultError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod grammar;
pub mod models;
pub mod mutator;
pub mod query;
pub mod session;
pub mod settings;
pub mod vault;

pub use catalog::TaskCatalog;
pub use client::TaskVault;
pub use config::VaultConfig;
pub use error::{Result, VaultError};
pub use grammar::parse_document;
pub use models::{PropertyList, TaskPriority, TaskRecord, TaskState, VaultEvent};
pub use query::{GroupBy, PriorityFilter, QueryDefinition, execute_query, group_tasks};
pub use session::Dispatcher;
pub use settings::{SavedQuery, TaskVaultSettings};
pub use vault::{LocalVault, VaultStore};
