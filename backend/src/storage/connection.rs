use anyhow::Result;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::{Connection, SettingsRepository, TableChange, TransactionRepository};

// The database URL for the production database
const DATABASE_URL: &str = "sqlite:dailyleft.db";

// Subscribers that lag past this many queued notifications refetch anyway,
// so overflow is harmless
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// DbConnection manages database operations and owns the
/// change-notification stream.
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
    changes: broadcast::Sender<TableChange>,
}

impl DbConnection {
    /// Create a new database connection
    pub async fn new(url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        // Connect to the database
        let pool = SqlitePool::connect(url).await?;

        // Setup database schema
        Self::setup_schema(&pool).await?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            pool: Arc::new(pool),
            changes,
        })
    }

    /// Initialize the standard database
    pub async fn init() -> Result<Self> {
        Self::new(DATABASE_URL).await
    }

    /// Initialize a test database with a unique name
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        // Generate a unique database name for tests
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Publish a change notification. A send error only means nobody is
    /// listening right now.
    pub(crate) fn notify(&self, change: TableChange) {
        let _ = self.changes.send(change);
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        // Create transactions table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                description TEXT NOT NULL,
                date TEXT NOT NULL,
                raw_text TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Create index for owner plus timestamp-range queries
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_user_date
            ON transactions(user_id, date DESC);
            "#,
        )
        .execute(pool)
        .await?;

        // Create cycle_settings table; the composite key is what makes
        // lazy creation race-free
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cycle_settings (
                user_id TEXT NOT NULL,
                cycle_key TEXT NOT NULL,
                income REAL NOT NULL DEFAULT 0,
                savings_goal REAL NOT NULL DEFAULT 0,
                initial_spent REAL NOT NULL DEFAULT 0,
                cycle_start_day INTEGER NOT NULL DEFAULT 11,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, cycle_key)
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

impl Connection for DbConnection {
    type TransactionRepository = TransactionRepository;
    type SettingsRepository = SettingsRepository;

    fn create_transaction_repository(&self) -> TransactionRepository {
        TransactionRepository::new(self.clone())
    }

    fn create_settings_repository(&self) -> SettingsRepository {
        SettingsRepository::new(self.clone())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<TableChange> {
        self.changes.subscribe()
    }
}
