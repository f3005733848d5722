//! Chart aggregations over fetched transactions.
//!
//! Feeds the spending-distribution and history views. Pure functions; the
//! engine hands these the windows it already holds.

use std::collections::{BTreeMap, HashMap};

use shared::{CategoryTotal, DailyTotal, Transaction};

use crate::domain::allowance::round2;

/// Cycle expenses grouped by category, largest total first.
pub fn category_breakdown(transactions: &[Transaction]) -> Vec<CategoryTotal> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for tx in transactions.iter().filter(|t| t.is_expense()) {
        *totals.entry(tx.category.as_str()).or_insert(0.0) += tx.amount;
    }

    let mut breakdown: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, total)| CategoryTotal {
            category: category.to_string(),
            total: round2(total),
        })
        .collect();
    breakdown.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    breakdown
}

/// Expenses summed per local calendar day, oldest first.
///
/// Rows whose timestamps don't parse are left out; the aggregator already
/// warns about those.
pub fn daily_totals(transactions: &[Transaction]) -> Vec<DailyTotal> {
    let mut totals = BTreeMap::new();
    for tx in transactions.iter().filter(|t| t.is_expense()) {
        if let Some(date) = tx.local_date() {
            *totals.entry(date).or_insert(0.0) += tx.amount;
        }
    }

    totals
        .into_iter()
        .map(|(date, total)| DailyTotal { date, total: round2(total) })
        .collect()
}
