//! # Storage Module
//!
//! Handles all data persistence for the budget engine.
//!
//! The traits here abstract away the specific storage backend so the domain
//! layer can work against any store that offers the same query/insert/update
//! shape plus a change-notification stream. The shipped implementation is
//! SQLite via SQLx; notifications carry only the table that changed, never
//! row payloads, so subscribers refetch rather than merge.

pub mod connection;
pub mod settings_repository;
pub mod transaction_repository;

pub use connection::DbConnection;
pub use settings_repository::SettingsRepository;
pub use transaction_repository::TransactionRepository;

use anyhow::Result;
use async_trait::async_trait;
use shared::{CycleSettings, Transaction};
use tokio::sync::broadcast;

/// Table that changed in the store. Fired on any insert/update/delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableChange {
    Transactions,
    CycleSettings,
}

/// Trait defining the interface for transaction storage operations
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Store a new transaction
    async fn store_transaction(&self, transaction: &Transaction) -> Result<()>;

    /// List a user's transactions with `start <= date < end` (string bounds
    /// against the stored RFC 3339 timestamps), ordered by date descending
    async fn list_transactions_in_range(
        &self,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<Transaction>>;

    /// List a user's transactions with `date >= start`, ordered by date
    /// descending
    async fn get_transactions_since(&self, user_id: &str, start: &str) -> Result<Vec<Transaction>>;

    /// Delete a single transaction
    /// Returns true if the transaction was found and deleted, false otherwise
    async fn delete_transaction(&self, user_id: &str, transaction_id: &str) -> Result<bool>;
}

/// Trait defining the interface for cycle settings storage operations
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Fetch the settings row for `(user_id, cycle_key)`
    async fn get_settings(&self, user_id: &str, cycle_key: &str) -> Result<Option<CycleSettings>>;

    /// Atomically insert `defaults` unless a row already exists, then return
    /// whatever the store holds. Concurrent first-time callers for the same
    /// key all end up with the single stored row.
    async fn insert_settings_if_absent(&self, defaults: &CycleSettings) -> Result<CycleSettings>;

    /// Insert or replace the settings row keyed by `(user_id, cycle_key)`
    async fn upsert_settings(&self, settings: &CycleSettings) -> Result<()>;
}

/// Trait defining the interface for storage connections
///
/// Provides factory methods for creating repositories plus the
/// change-notification stream, so the domain layer works with any storage
/// backend without knowing the implementation.
pub trait Connection: Clone + Send + Sync + 'static {
    /// The type of TransactionStore this connection creates
    type TransactionRepository: TransactionStore + Clone + Send + Sync + 'static;

    /// The type of SettingsStore this connection creates
    type SettingsRepository: SettingsStore + Clone + Send + Sync + 'static;

    /// Create a new transaction repository for this connection
    fn create_transaction_repository(&self) -> Self::TransactionRepository;

    /// Create a new settings repository for this connection
    fn create_settings_repository(&self) -> Self::SettingsRepository;

    /// Subscribe to the change-notification stream
    fn subscribe_changes(&self) -> broadcast::Receiver<TableChange>;
}
