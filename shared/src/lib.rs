use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Day of month a spending cycle starts on when the user has not picked one.
pub const DEFAULT_CYCLE_START_DAY: u32 = 11;

/// A single logged transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    /// ID of the user this transaction belongs to
    pub user_id: String,
    /// Signed-amount classification; only expenses count against the budget
    pub kind: TransactionType,
    /// Transaction amount, always positive (the kind carries the sign)
    pub amount: f64,
    /// Category label (e.g. "Food", "Transport")
    pub category: String,
    /// Free-text description (max 256 characters)
    pub description: String,
    /// Timestamp with timezone (RFC 3339)
    pub date: String,
    /// Original captured text when the transaction came from the voice/AI flow
    pub raw_text: Option<String>,
}

/// Type of transaction for budgeting and rendering purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money spent; counts against the cycle budget
    Expense,
    /// Money received; tracked but never counted into expense totals
    Income,
}

impl Transaction {
    /// Parse the RFC 3339 timestamp and return the calendar date in local time.
    ///
    /// Returns `None` for timestamps that don't parse; callers decide whether
    /// to skip or surface the row.
    pub fn local_date(&self) -> Option<NaiveDate> {
        DateTime::parse_from_rfc3339(&self.date)
            .ok()
            .map(|dt| dt.with_timezone(&Local).date_naive())
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionType::Expense
    }
}

/// Per-user, per-cycle budget plan, keyed by (`user_id`, `cycle_key`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSettings {
    pub user_id: String,
    /// Calendar month of the cycle start, formatted `YYYY-MM`
    pub cycle_key: String,
    /// Total income planned for the cycle
    pub income: f64,
    /// Amount the user wants to keep unspent
    pub savings_goal: f64,
    /// Spending that happened outside the tracked ledger, counted once
    pub initial_spent: f64,
    /// Day of month (1-28) the cycle starts on
    pub cycle_start_day: u32,
}

impl CycleSettings {
    /// The row inserted when a cycle is observed for the first time.
    pub fn defaults(user_id: &str, cycle_key: &str, cycle_start_day: u32) -> Self {
        Self {
            user_id: user_id.to_string(),
            cycle_key: cycle_key.to_string(),
            income: 0.0,
            savings_goal: 0.0,
            initial_spent: 0.0,
            cycle_start_day,
        }
    }
}

/// A resolved spending cycle. Derived from a reference date and the
/// configured start day; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    /// First day of the cycle (inclusive, local midnight)
    pub start: NaiveDate,
    /// First day of the next cycle (exclusive)
    pub end: NaiveDate,
    /// `YYYY-MM` of `start`; keys the settings row
    pub key: String,
    /// Whole days between `start` and `end`, always >= 1
    pub total_days: i64,
}

/// The derived budget figures for the current cycle and day.
///
/// Always replaced wholesale from a fresh aggregate pass; consumers never
/// see a partially updated snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    /// Cycle expenses so far, including the `initial_spent` offset
    pub total_expenses: f64,
    /// Expenses strictly before today's local midnight, including the offset
    pub expenses_before_today: f64,
    /// Expenses dated today (offset never counted here)
    pub today_expenses: f64,
    /// income - savings_goal - total_expenses
    pub monthly_available: f64,
    /// income - savings_goal - initial_spent; fixed baseline for the cycle
    pub cycle_total_budget: f64,
    /// Even-split reference rate over the whole cycle
    pub baseline_daily_allowance: f64,
    /// Today's allowance, frozen when the day starts
    pub daily_allowance_snapshot: f64,
    /// Allowance minus today's spending; depletes in real time
    pub daily_available: f64,
    /// Projected even rate for the days after today, from the live total
    pub cycle_daily_allowance: f64,
    /// cycle_daily_allowance - baseline_daily_allowance
    pub cycle_daily_delta: f64,
    /// Cycle days left, inclusive of today
    pub remaining_days: i64,
}

/// Where the reactive synchronizer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    /// No user session established
    Uninitialized,
    /// First fetch for the session is in flight
    Loading,
    /// At least one fetch has completed; numbers are live
    Ready,
}

/// Output shape of the text-parsing collaborator (AI service or the local
/// fallback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub amount: f64,
    pub category: String,
    pub description: String,
    /// RFC 3339 timestamp
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    /// Transaction amount, must be positive
    pub amount: f64,
    pub category: String,
    /// Description (max 256 characters)
    pub description: String,
    /// Defaults to expense when omitted
    pub kind: Option<TransactionType>,
    /// Optional timestamp override (RFC 3339) - uses current time if not provided
    pub date: Option<String>,
    /// Original captured text for the voice/AI flow
    pub raw_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSettingsRequest {
    pub income: f64,
    pub savings_goal: f64,
    pub initial_spent: f64,
    /// Out-of-range values fall back to the default start day
    pub cycle_start_day: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseTextRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub user_id: String,
}

/// Per-category expense total for the distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

/// Per-day expense total for the history chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Cycle expenses grouped by category, largest first
    pub categories: Vec<CategoryTotal>,
    /// Recent-window expenses summed per local calendar day, oldest first
    pub daily: Vec<DailyTotal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_local_date() {
        let tx = Transaction {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            kind: TransactionType::Expense,
            amount: 12.5,
            category: "Food".to_string(),
            description: "lunch".to_string(),
            date: "2024-03-05T12:30:00+00:00".to_string(),
            raw_text: None,
        };

        // The exact local date depends on the host timezone; it must parse
        // and land within a day of the UTC date.
        let date = tx.local_date().unwrap();
        let utc_date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!((date - utc_date).num_days().abs() <= 1);
    }

    #[test]
    fn test_transaction_local_date_invalid() {
        let tx = Transaction {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            kind: TransactionType::Expense,
            amount: 1.0,
            category: "Other".to_string(),
            description: String::new(),
            date: "not-a-date".to_string(),
            raw_text: None,
        };
        assert_eq!(tx.local_date(), None);
    }

    #[test]
    fn test_settings_defaults() {
        let settings = CycleSettings::defaults("42", "2024-05", DEFAULT_CYCLE_START_DAY);
        assert_eq!(settings.user_id, "42");
        assert_eq!(settings.cycle_key, "2024-05");
        assert_eq!(settings.income, 0.0);
        assert_eq!(settings.savings_goal, 0.0);
        assert_eq!(settings.initial_spent, 0.0);
        assert_eq!(settings.cycle_start_day, 11);
    }

    #[test]
    fn test_transaction_type_serialization() {
        assert_eq!(
            serde_json::to_string(&TransactionType::Expense).unwrap(),
            "\"expense\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionType::Income).unwrap(),
            "\"income\""
        );
    }
}
