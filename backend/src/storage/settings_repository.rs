use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::CycleSettings;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{DbConnection, SettingsStore, TableChange};

/// Repository for cycle settings operations
#[derive(Clone)]
pub struct SettingsRepository {
    db: DbConnection,
}

impl SettingsRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn row_to_settings(row: &SqliteRow) -> CycleSettings {
        CycleSettings {
            user_id: row.get("user_id"),
            cycle_key: row.get("cycle_key"),
            income: row.get("income"),
            savings_goal: row.get("savings_goal"),
            initial_spent: row.get("initial_spent"),
            cycle_start_day: row.get::<i64, _>("cycle_start_day") as u32,
        }
    }
}

#[async_trait]
impl SettingsStore for SettingsRepository {
    async fn get_settings(&self, user_id: &str, cycle_key: &str) -> Result<Option<CycleSettings>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, cycle_key, income, savings_goal, initial_spent, cycle_start_day
            FROM cycle_settings
            WHERE user_id = ? AND cycle_key = ?
            "#,
        )
        .bind(user_id)
        .bind(cycle_key)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(Self::row_to_settings))
    }

    async fn insert_settings_if_absent(&self, defaults: &CycleSettings) -> Result<CycleSettings> {
        // The composite primary key makes this atomic: of any number of
        // concurrent first-time callers, exactly one insert wins
        let result = sqlx::query(
            r#"
            INSERT INTO cycle_settings (user_id, cycle_key, income, savings_goal, initial_spent, cycle_start_day)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, cycle_key) DO NOTHING
            "#,
        )
        .bind(&defaults.user_id)
        .bind(&defaults.cycle_key)
        .bind(defaults.income)
        .bind(defaults.savings_goal)
        .bind(defaults.initial_spent)
        .bind(defaults.cycle_start_day as i64)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            self.db.notify(TableChange::CycleSettings);
        }

        self.get_settings(&defaults.user_id, &defaults.cycle_key)
            .await?
            .context("settings row missing right after insert-if-absent")
    }

    async fn upsert_settings(&self, settings: &CycleSettings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cycle_settings (user_id, cycle_key, income, savings_goal, initial_spent, cycle_start_day)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, cycle_key) DO UPDATE SET
                income = excluded.income,
                savings_goal = excluded.savings_goal,
                initial_spent = excluded.initial_spent,
                cycle_start_day = excluded.cycle_start_day,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&settings.user_id)
        .bind(&settings.cycle_key)
        .bind(settings.income)
        .bind(settings.savings_goal)
        .bind(settings.initial_spent)
        .bind(settings.cycle_start_day as i64)
        .execute(self.db.pool())
        .await?;

        self.db.notify(TableChange::CycleSettings);
        Ok(())
    }
}
