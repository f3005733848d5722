use anyhow::Result;
use async_trait::async_trait;
use shared::{Transaction, TransactionType};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{DbConnection, TableChange, TransactionStore};

/// Repository for transaction operations
#[derive(Clone)]
pub struct TransactionRepository {
    db: DbConnection,
}

impl TransactionRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn row_to_transaction(row: &SqliteRow) -> Transaction {
        let kind: String = row.get("kind");
        Transaction {
            id: row.get("id"),
            user_id: row.get("user_id"),
            kind: if kind == "income" {
                TransactionType::Income
            } else {
                TransactionType::Expense
            },
            amount: row.get("amount"),
            category: row.get("category"),
            description: row.get("description"),
            date: row.get("date"),
            raw_text: row.get("raw_text"),
        }
    }

    fn kind_to_str(kind: TransactionType) -> &'static str {
        match kind {
            TransactionType::Expense => "expense",
            TransactionType::Income => "income",
        }
    }
}

#[async_trait]
impl TransactionStore for TransactionRepository {
    async fn store_transaction(&self, transaction: &Transaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, kind, amount, category, description, date, raw_text)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.user_id)
        .bind(Self::kind_to_str(transaction.kind))
        .bind(transaction.amount)
        .bind(&transaction.category)
        .bind(&transaction.description)
        .bind(&transaction.date)
        .bind(&transaction.raw_text)
        .execute(self.db.pool())
        .await?;

        self.db.notify(TableChange::Transactions);
        Ok(())
    }

    async fn list_transactions_in_range(
        &self,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, kind, amount, category, description, date, raw_text
            FROM transactions
            WHERE user_id = ? AND date >= ? AND date < ?
            ORDER BY date DESC
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(Self::row_to_transaction).collect())
    }

    async fn get_transactions_since(&self, user_id: &str, start: &str) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, kind, amount, category, description, date, raw_text
            FROM transactions
            WHERE user_id = ? AND date >= ?
            ORDER BY date DESC
            "#,
        )
        .bind(user_id)
        .bind(start)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(Self::row_to_transaction).collect())
    }

    async fn delete_transaction(&self, user_id: &str, transaction_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(transaction_id)
            .execute(self.db.pool())
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.db.notify(TableChange::Transactions);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Connection;

    fn transaction(id: &str, user_id: &str, amount: f64, date: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            user_id: user_id.to_string(),
            kind: TransactionType::Expense,
            amount,
            category: "Food".to_string(),
            description: "test".to_string(),
            date: date.to_string(),
            raw_text: None,
        }
    }

    async fn create_test_repository() -> TransactionRepository {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        TransactionRepository::new(db)
    }

    #[tokio::test]
    async fn test_store_and_list_in_range() {
        let repo = create_test_repository().await;

        repo.store_transaction(&transaction("t1", "u1", 10.0, "2024-03-01T09:00:00+00:00"))
            .await
            .unwrap();
        repo.store_transaction(&transaction("t2", "u1", 20.0, "2024-03-03T09:00:00+00:00"))
            .await
            .unwrap();
        repo.store_transaction(&transaction("t3", "u1", 30.0, "2024-03-05T09:00:00+00:00"))
            .await
            .unwrap();

        let listed = repo
            .list_transactions_in_range("u1", "2024-03-01", "2024-03-05")
            .await
            .unwrap();

        // End bound excludes t3; ordering is newest first
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "t2");
        assert_eq!(listed[1].id, "t1");
    }

    #[tokio::test]
    async fn test_list_filters_by_owner() {
        let repo = create_test_repository().await;

        repo.store_transaction(&transaction("t1", "u1", 10.0, "2024-03-01T09:00:00+00:00"))
            .await
            .unwrap();
        repo.store_transaction(&transaction("t2", "u2", 20.0, "2024-03-01T10:00:00+00:00"))
            .await
            .unwrap();

        let listed = repo
            .list_transactions_in_range("u1", "2024-01-01", "2025-01-01")
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].user_id, "u1");
    }

    #[tokio::test]
    async fn test_get_transactions_since() {
        let repo = create_test_repository().await;

        repo.store_transaction(&transaction("old", "u1", 10.0, "2024-01-01T09:00:00+00:00"))
            .await
            .unwrap();
        repo.store_transaction(&transaction("new", "u1", 20.0, "2024-03-01T09:00:00+00:00"))
            .await
            .unwrap();

        let listed = repo.get_transactions_since("u1", "2024-02-01").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "new");
    }

    #[tokio::test]
    async fn test_kind_round_trips() {
        let repo = create_test_repository().await;

        let mut income = transaction("t1", "u1", 100.0, "2024-03-01T09:00:00+00:00");
        income.kind = TransactionType::Income;
        income.raw_text = Some("salary 100".to_string());
        repo.store_transaction(&income).await.unwrap();

        let listed = repo.get_transactions_since("u1", "2024-01-01").await.unwrap();
        assert_eq!(listed[0].kind, TransactionType::Income);
        assert_eq!(listed[0].raw_text, Some("salary 100".to_string()));
    }

    #[tokio::test]
    async fn test_delete_transaction() {
        let repo = create_test_repository().await;

        repo.store_transaction(&transaction("t1", "u1", 10.0, "2024-03-01T09:00:00+00:00"))
            .await
            .unwrap();

        // Wrong owner deletes nothing
        assert!(!repo.delete_transaction("u2", "t1").await.unwrap());
        assert!(repo.delete_transaction("u1", "t1").await.unwrap());
        assert!(!repo.delete_transaction("u1", "t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_mutations_notify() {
        let db = DbConnection::init_test().await.unwrap();
        let repo = TransactionRepository::new(db.clone());
        let mut changes = db.subscribe_changes();

        repo.store_transaction(&transaction("t1", "u1", 10.0, "2024-03-01T09:00:00+00:00"))
            .await
            .unwrap();
        assert_eq!(changes.recv().await.unwrap(), TableChange::Transactions);

        repo.delete_transaction("u1", "t1").await.unwrap();
        assert_eq!(changes.recv().await.unwrap(), TableChange::Transactions);

        // A miss is not a mutation and must not notify
        repo.delete_transaction("u1", "missing").await.unwrap();
        assert!(changes.try_recv().is_err());
    }
}
