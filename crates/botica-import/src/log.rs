//! # Import Log
//!
//! Shared by the producer, every validator and the collector. Writers only
//! bump counters or push to the bounded error list, so a plain
//! `std::sync::Mutex` is never held across an await.

use std::fmt::Display;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// Errors kept for diagnostics. Later failures only count.
pub const MAX_RECORDED_ERRORS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    pub failed_errors: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ImportLog {
    inner: Mutex<ImportSummary>,
}

impl ImportLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ImportSummary> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A non-vacuous data row was read.
    pub fn count_row(&self) {
        self.lock().total_rows += 1;
    }

    pub fn succeed(&self, rows: usize) {
        self.lock().successful_rows += rows;
    }

    /// One row failed to read or map.
    pub fn fail_row(&self, line: usize, reason: impl Display) {
        self.fail(1, format!("row {}: {}", line, reason));
    }

    /// A whole batch failed to commit.
    pub fn fail_batch(&self, rows: usize, first_line: usize, last_line: usize, reason: impl Display) {
        self.fail(rows, format!("rows {}-{}: {}", first_line, last_line, reason));
    }

    fn fail(&self, rows: usize, message: String) {
        let mut summary = self.lock();
        summary.failed_rows += rows;
        if summary.failed_errors.len() < MAX_RECORDED_ERRORS {
            summary.failed_errors.push(message);
        }
    }

    pub fn summary(&self) -> ImportSummary {
        self.lock().clone()
    }
}
