//! Transaction aggregation into cycle-scoped expense totals.
//!
//! Splits the cycle's expenses at today's local midnight so the allowance
//! calculator can keep one frozen daily figure and one live one. The
//! `initial_spent` offset is folded in here, exactly once.

use chrono::NaiveDate;
use shared::{Cycle, Transaction};
use tracing::warn;

use crate::domain::allowance::round2;

/// Cycle expense totals, split at the "today" boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleTotals {
    /// All cycle expenses plus the `initial_spent` offset
    pub total_expenses: f64,
    /// Expenses strictly before today, plus the offset
    pub expenses_before_today: f64,
    /// Expenses dated today; the offset is never counted here
    pub today_expenses: f64,
}

/// Sum a user's fetched transactions into [`CycleTotals`].
///
/// Only `expense` rows inside `[cycle.start, cycle.end)` count. Rows with
/// unparseable dates are skipped with a warning rather than failing the
/// whole pass.
pub fn aggregate(
    transactions: &[Transaction],
    cycle: &Cycle,
    today: NaiveDate,
    initial_spent: f64,
) -> CycleTotals {
    let mut before = 0.0;
    let mut today_sum = 0.0;
    let mut after = 0.0;

    for tx in transactions.iter().filter(|t| t.is_expense()) {
        let Some(date) = tx.local_date() else {
            warn!("skipping transaction {} with unparseable date {:?}", tx.id, tx.date);
            continue;
        };
        if date < cycle.start || date >= cycle.end {
            continue;
        }
        if date < today {
            before += tx.amount;
        } else if date == today {
            today_sum += tx.amount;
        } else {
            // Forward-dated rows stay in the cycle total but in neither
            // day bucket
            after += tx.amount;
        }
    }

    let expenses_before_today = round2(before + initial_spent);
    let today_expenses = round2(today_sum);
    CycleTotals {
        total_expenses: round2(expenses_before_today + today_expenses + round2(after)),
        expenses_before_today,
        today_expenses,
    }
}
