//! Allowance calculation.
//!
//! Pure functions turning cycle totals and settings into the reported
//! budget figures. Two of them deliberately disagree: the daily allowance
//! is frozen when the day starts (its inputs only move at midnight or on a
//! settings edit), while the daily available amount depletes as today's
//! transactions post. Every monetary figure is rounded to 2 decimals here,
//! at computation time, so later sums can't drift.

use shared::{BudgetSnapshot, CycleSettings};

use crate::domain::aggregate::CycleTotals;

/// Round a monetary value to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Division that yields 0 instead of dividing by zero.
fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Derive the full set of budget figures for one cycle and day.
///
/// `remaining_days` includes today and comes straight from the cycle
/// resolver; `cycle_total_days` is the cycle length.
pub fn compute_snapshot(
    settings: &CycleSettings,
    totals: &CycleTotals,
    cycle_total_days: i64,
    remaining_days: i64,
) -> BudgetSnapshot {
    let surplus = settings.income - settings.savings_goal;

    let monthly_available = round2(surplus - totals.total_expenses);
    let cycle_total_budget = round2(surplus - settings.initial_spent);
    let baseline_daily_allowance = round2(safe_div(cycle_total_budget, cycle_total_days as f64));

    // Frozen for the calendar day: both inputs are fixed once the day starts
    let daily_allowance_snapshot =
        round2(safe_div(surplus - totals.expenses_before_today, remaining_days as f64));
    let daily_available = round2(daily_allowance_snapshot - totals.today_expenses);

    // Projected rate for the days strictly after today, from the live total
    let cycle_daily_allowance = if remaining_days <= 1 {
        0.0
    } else {
        round2(monthly_available / (remaining_days - 1) as f64)
    };
    let cycle_daily_delta = round2(cycle_daily_allowance - baseline_daily_allowance);

    BudgetSnapshot {
        total_expenses: totals.total_expenses,
        expenses_before_today: totals.expenses_before_today,
        today_expenses: totals.today_expenses,
        monthly_available,
        cycle_total_budget,
        baseline_daily_allowance,
        daily_allowance_snapshot,
        daily_available,
        cycle_daily_allowance,
        cycle_daily_delta,
        remaining_days,
    }
}
