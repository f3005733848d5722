//! Cycle settings service.
//!
//! Wraps the settings store with the lazy-creation and clamping rules: a
//! cycle observed for the first time gets a defaults row atomically, and a
//! start day outside 1-28 silently falls back to the default wherever it
//! shows up.

use anyhow::Result;
use shared::{CycleSettings, UpdateSettingsRequest, DEFAULT_CYCLE_START_DAY};
use tracing::info;

use crate::domain::cycle;
use crate::storage::{Connection, SettingsStore};

/// Service for reading and editing per-cycle budget settings
#[derive(Clone)]
pub struct SettingsService<C: Connection> {
    settings_repository: C::SettingsRepository,
}

impl<C: Connection> SettingsService<C> {
    pub fn new(connection: &C) -> Self {
        Self {
            settings_repository: connection.create_settings_repository(),
        }
    }

    /// Load the settings row for a cycle, creating the defaults row the
    /// first time the cycle is observed. `inherited_start_day` seeds the
    /// new row so an edited start day carries into later cycles.
    pub async fn get_or_create(
        &self,
        user_id: &str,
        cycle_key: &str,
        inherited_start_day: u32,
    ) -> Result<CycleSettings> {
        let defaults = CycleSettings::defaults(
            user_id,
            cycle_key,
            cycle::clamp_start_day(inherited_start_day),
        );
        let mut settings = self.settings_repository.insert_settings_if_absent(&defaults).await?;
        // A bad stored value degrades the same way a bad configured one does
        settings.cycle_start_day = cycle::clamp_start_day(settings.cycle_start_day);
        Ok(settings)
    }

    /// Apply a user edit. Negative money inputs are rejected; an omitted
    /// start day keeps the stored one.
    pub async fn update(
        &self,
        user_id: &str,
        cycle_key: &str,
        request: UpdateSettingsRequest,
    ) -> Result<CycleSettings> {
        if request.income < 0.0 || request.savings_goal < 0.0 || request.initial_spent < 0.0 {
            return Err(anyhow::anyhow!("settings amounts cannot be negative"));
        }

        let existing = self.settings_repository.get_settings(user_id, cycle_key).await?;
        let cycle_start_day = cycle::clamp_start_day(request.cycle_start_day.unwrap_or_else(|| {
            existing
                .as_ref()
                .map(|s| s.cycle_start_day)
                .unwrap_or(DEFAULT_CYCLE_START_DAY)
        }));

        let settings = CycleSettings {
            user_id: user_id.to_string(),
            cycle_key: cycle_key.to_string(),
            income: request.income,
            savings_goal: request.savings_goal,
            initial_spent: request.initial_spent,
            cycle_start_day,
        };
        self.settings_repository.upsert_settings(&settings).await?;

        info!("updated cycle settings for user {} cycle {}", user_id, cycle_key);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DbConnection;

    async fn create_test_service() -> SettingsService<DbConnection> {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        SettingsService::new(&db)
    }

    fn update_request(income: f64, savings_goal: f64, initial_spent: f64) -> UpdateSettingsRequest {
        UpdateSettingsRequest {
            income,
            savings_goal,
            initial_spent,
            cycle_start_day: None,
        }
    }

    #[tokio::test]
    async fn test_lazy_creation_defaults() {
        let service = create_test_service().await;

        // Settings row absent for (user=42, cycle_key='2024-05')
        let settings = service.get_or_create("42", "2024-05", DEFAULT_CYCLE_START_DAY).await.unwrap();

        assert_eq!(settings.income, 0.0);
        assert_eq!(settings.savings_goal, 0.0);
        assert_eq!(settings.initial_spent, 0.0);
        assert_eq!(settings.cycle_start_day, 11);
    }

    #[tokio::test]
    async fn test_lazy_creation_inherits_start_day() {
        let service = create_test_service().await;

        let settings = service.get_or_create("u1", "2024-06", 15).await.unwrap();
        assert_eq!(settings.cycle_start_day, 15);
    }

    #[tokio::test]
    async fn test_invalid_inherited_start_day_falls_back() {
        let service = create_test_service().await;

        let settings = service.get_or_create("u1", "2024-06", 31).await.unwrap();
        assert_eq!(settings.cycle_start_day, DEFAULT_CYCLE_START_DAY);
    }

    #[tokio::test]
    async fn test_get_or_create_keeps_existing_values() {
        let service = create_test_service().await;

        let mut request = update_request(6000.0, 1000.0, 500.0);
        request.cycle_start_day = Some(15);
        service.update("u1", "2024-05", request).await.unwrap();

        let settings = service.get_or_create("u1", "2024-05", 11).await.unwrap();
        assert_eq!(settings.income, 6000.0);
        assert_eq!(settings.cycle_start_day, 15);
    }

    #[tokio::test]
    async fn test_update_rejects_negative_amounts() {
        let service = create_test_service().await;

        let err = service
            .update("u1", "2024-05", update_request(-1.0, 0.0, 0.0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[tokio::test]
    async fn test_update_clamps_start_day() {
        let service = create_test_service().await;

        let mut request = update_request(1000.0, 0.0, 0.0);
        request.cycle_start_day = Some(31);
        let settings = service.update("u1", "2024-05", request).await.unwrap();
        assert_eq!(settings.cycle_start_day, DEFAULT_CYCLE_START_DAY);
    }

    #[tokio::test]
    async fn test_update_without_start_day_keeps_stored_one() {
        let service = create_test_service().await;

        let mut request = update_request(1000.0, 0.0, 0.0);
        request.cycle_start_day = Some(20);
        service.update("u1", "2024-05", request).await.unwrap();

        let settings = service
            .update("u1", "2024-05", update_request(2000.0, 100.0, 0.0))
            .await
            .unwrap();
        assert_eq!(settings.cycle_start_day, 20);
        assert_eq!(settings.income, 2000.0);
    }
}
