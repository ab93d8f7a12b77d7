//! Aggregate statistics over a run's trial records.

use colored::Colorize;
use indexmap::IndexMap;
use serde::Serialize;

use crate::trial::TrialRecord;

/// Derived, non-persisted summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    /// Success percentage, rounded to two decimals.
    pub success_rate: f64,
    /// Failure categories among failed trials, descending by frequency;
    /// ties keep first-seen order.
    pub reasons: Vec<(String, usize)>,
}

impl AggregateReport {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a TrialRecord>,
    {
        let mut total = 0usize;
        let mut ok = 0usize;
        let mut counts: IndexMap<String, usize> = IndexMap::new();

        for record in records {
            total += 1;
            if record.ok {
                ok += 1;
            } else {
                *counts.entry(record.error_type.clone()).or_insert(0) += 1;
            }
        }

        let failed = total - ok;
        let success_rate = if total == 0 {
            0.0
        } else {
            (ok as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
        };

        // Stable sort: equal counts keep insertion (first-seen) order.
        let mut reasons: Vec<(String, usize)> = counts.into_iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(&a.1));

        Self {
            total,
            ok,
            failed,
            success_rate,
            reasons,
        }
    }

    /// Prints the recap to standard output.
    pub fn print(&self) {
        println!("Runs: {}", self.total);
        println!(
            "{}: {}, {}: {}, SuccessRate: {:.2}%",
            "OK".green().bold(),
            self.ok,
            "FAIL".red().bold(),
            self.failed,
            self.success_rate
        );
        if !self.reasons.is_empty() {
            println!("Failure reasons:");
            for (category, count) in &self.reasons {
                println!("  - {}: {}", category.yellow(), count);
            }
        }
    }
}
