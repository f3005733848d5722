//! Transaction management service.
//!
//! Validates and stores logged expenses and serves the two fetch windows
//! the engine works with: the current cycle and the recent history used by
//! the charts.

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate};
use shared::{CreateTransactionRequest, Cycle, ParsedTransaction, Transaction, TransactionType};
use tracing::info;
use uuid::Uuid;

use crate::storage::{Connection, TransactionStore};

/// Longest accepted description.
const MAX_DESCRIPTION_LENGTH: usize = 256;

/// Hard ceiling on a single transaction amount.
const MAX_AMOUNT: f64 = 1_000_000.0;

/// Days of history fetched for the charts window.
pub const RECENT_WINDOW_DAYS: i64 = 90;

#[derive(Debug, thiserror::Error)]
pub enum TransactionValidationError {
    #[error("amount must be greater than 0")]
    AmountNotPositive,
    #[error("amount is too large")]
    AmountTooLarge,
    #[error("category must not be empty")]
    EmptyCategory,
    #[error("description is too long ({0} characters)")]
    DescriptionTooLong(usize),
    #[error("invalid date: {0}")]
    InvalidDate(String),
}

/// Service for creating, listing and deleting transactions
#[derive(Clone)]
pub struct TransactionService<C: Connection> {
    transaction_repository: C::TransactionRepository,
}

impl<C: Connection> TransactionService<C> {
    pub fn new(connection: &C) -> Self {
        Self {
            transaction_repository: connection.create_transaction_repository(),
        }
    }

    /// Validate and store a new transaction.
    pub async fn create_transaction(
        &self,
        user_id: &str,
        request: CreateTransactionRequest,
    ) -> Result<Transaction> {
        Self::validate(&request)?;

        let date = match request.date {
            Some(date) => date,
            None => Local::now().to_rfc3339(),
        };
        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind: request.kind.unwrap_or(TransactionType::Expense),
            amount: request.amount,
            category: request.category.trim().to_string(),
            description: request.description.trim().to_string(),
            date,
            raw_text: request.raw_text,
        };

        self.transaction_repository.store_transaction(&transaction).await?;
        info!("created transaction {} for user {}", transaction.id, user_id);
        Ok(transaction)
    }

    /// Store a transaction produced by the text-parsing collaborator,
    /// keeping the originally captured text alongside it.
    pub async fn create_from_parsed(
        &self,
        user_id: &str,
        parsed: ParsedTransaction,
        raw_text: String,
    ) -> Result<Transaction> {
        self.create_transaction(
            user_id,
            CreateTransactionRequest {
                amount: parsed.amount,
                category: parsed.category,
                description: parsed.description,
                kind: Some(TransactionType::Expense),
                date: Some(parsed.date),
                raw_text: Some(raw_text),
            },
        )
        .await
    }

    /// Fetch the current cycle's transactions, newest first.
    ///
    /// The SQL window gets a day of slack on both ends because stored
    /// timestamps carry arbitrary offsets; rows are then filtered on their
    /// parsed local date. Rows that don't parse are kept so the aggregator
    /// can warn about them.
    pub async fn list_cycle_window(&self, user_id: &str, cycle: &Cycle) -> Result<Vec<Transaction>> {
        let start = (cycle.start - Duration::days(1)).to_string();
        let end = (cycle.end + Duration::days(1)).to_string();

        let rows = self
            .transaction_repository
            .list_transactions_in_range(user_id, &start, &end)
            .await?;
        Ok(rows
            .into_iter()
            .filter(|tx| {
                tx.local_date()
                    .map(|d| d >= cycle.start && d < cycle.end)
                    .unwrap_or(true)
            })
            .collect())
    }

    /// Fetch the chart window (everything since [`RECENT_WINDOW_DAYS`] ago),
    /// newest first.
    pub async fn list_recent_window(&self, user_id: &str, today: NaiveDate) -> Result<Vec<Transaction>> {
        let since = today - Duration::days(RECENT_WINDOW_DAYS);

        let rows = self
            .transaction_repository
            .get_transactions_since(user_id, &(since - Duration::days(1)).to_string())
            .await?;
        Ok(rows
            .into_iter()
            .filter(|tx| tx.local_date().map(|d| d >= since).unwrap_or(true))
            .collect())
    }

    /// Delete a transaction. Returns false when no row matched.
    pub async fn delete_transaction(&self, user_id: &str, transaction_id: &str) -> Result<bool> {
        let deleted = self
            .transaction_repository
            .delete_transaction(user_id, transaction_id)
            .await?;
        if deleted {
            info!("deleted transaction {} for user {}", transaction_id, user_id);
        }
        Ok(deleted)
    }

    fn validate(request: &CreateTransactionRequest) -> Result<(), TransactionValidationError> {
        if request.amount <= 0.0 {
            return Err(TransactionValidationError::AmountNotPositive);
        }
        if request.amount > MAX_AMOUNT {
            return Err(TransactionValidationError::AmountTooLarge);
        }
        if request.category.trim().is_empty() {
            return Err(TransactionValidationError::EmptyCategory);
        }
        let description = request.description.trim();
        if description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(TransactionValidationError::DescriptionTooLong(description.len()));
        }
        if let Some(date) = &request.date {
            DateTime::parse_from_rfc3339(date)
                .map_err(|e| TransactionValidationError::InvalidDate(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cycle;
    use crate::storage::DbConnection;
    use chrono::TimeZone;
    use shared::DEFAULT_CYCLE_START_DAY;

    async fn create_test_service() -> TransactionService<DbConnection> {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        TransactionService::new(&db)
    }

    fn request(amount: f64, category: &str, date: Option<String>) -> CreateTransactionRequest {
        CreateTransactionRequest {
            amount,
            category: category.to_string(),
            description: "test spend".to_string(),
            kind: None,
            date,
            raw_text: None,
        }
    }

    fn local_ts(y: i32, m: u32, d: u32) -> String {
        Local
            .with_ymd_and_hms(y, m, d, 12, 0, 0)
            .earliest()
            .expect("valid local time")
            .to_rfc3339()
    }

    #[tokio::test]
    async fn test_create_transaction_defaults() {
        let service = create_test_service().await;

        let transaction = service
            .create_transaction("u1", request(12.5, "Food", None))
            .await
            .unwrap();

        assert_eq!(transaction.kind, TransactionType::Expense);
        assert_eq!(transaction.amount, 12.5);
        assert!(DateTime::parse_from_rfc3339(&transaction.date).is_ok());
    }

    #[tokio::test]
    async fn test_create_transaction_validation() {
        let service = create_test_service().await;

        let err = service
            .create_transaction("u1", request(0.0, "Food", None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("greater than 0"));

        let err = service
            .create_transaction("u1", request(5.0, "  ", None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("category"));

        let err = service
            .create_transaction("u1", request(5.0, "Food", Some("yesterday".to_string())))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid date"));

        let mut too_long = request(5.0, "Food", None);
        too_long.description = "x".repeat(300);
        let err = service.create_transaction("u1", too_long).await.unwrap_err();
        assert!(err.to_string().contains("too long"));
    }

    #[tokio::test]
    async fn test_create_from_parsed_keeps_raw_text() {
        let service = create_test_service().await;

        let parsed = ParsedTransaction {
            amount: 4.5,
            category: "Other".to_string(),
            description: "coffee".to_string(),
            date: local_ts(2024, 3, 5),
        };
        let transaction = service
            .create_from_parsed("u1", parsed, "coffee 4.5".to_string())
            .await
            .unwrap();

        assert_eq!(transaction.raw_text, Some("coffee 4.5".to_string()));
        assert_eq!(transaction.kind, TransactionType::Expense);
    }

    #[tokio::test]
    async fn test_list_cycle_window_filters_precisely() {
        let service = create_test_service().await;
        let cycle = cycle::resolve(
            chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            DEFAULT_CYCLE_START_DAY,
        );

        // Inside, before start, on the exclusive end
        service
            .create_transaction("u1", request(10.0, "Food", Some(local_ts(2024, 2, 15))))
            .await
            .unwrap();
        service
            .create_transaction("u1", request(20.0, "Food", Some(local_ts(2024, 2, 10))))
            .await
            .unwrap();
        service
            .create_transaction("u1", request(30.0, "Food", Some(local_ts(2024, 3, 11))))
            .await
            .unwrap();

        let listed = service.list_cycle_window("u1", &cycle).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].amount, 10.0);
    }

    #[tokio::test]
    async fn test_list_recent_window() {
        let service = create_test_service().await;
        let today = Local::now().date_naive();

        service
            .create_transaction("u1", request(10.0, "Food", Some(Local::now().to_rfc3339())))
            .await
            .unwrap();
        let old = Local::now() - Duration::days(RECENT_WINDOW_DAYS + 10);
        service
            .create_transaction("u1", request(20.0, "Food", Some(old.to_rfc3339())))
            .await
            .unwrap();

        let listed = service.list_recent_window("u1", today).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].amount, 10.0);
    }

    #[tokio::test]
    async fn test_delete_transaction() {
        let service = create_test_service().await;

        let transaction = service
            .create_transaction("u1", request(10.0, "Food", None))
            .await
            .unwrap();

        assert!(service.delete_transaction("u1", &transaction.id).await.unwrap());
        assert!(!service.delete_transaction("u1", &transaction.id).await.unwrap());
    }
}
