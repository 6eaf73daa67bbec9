//! Bounded batch evaluation with partial-failure isolation.

use crate::engine::{ValidationEngine, ValidationFinding};
use crate::error::BatchError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One (email, ip) input pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchRecord {
    pub email: String,
    pub ip: String,
}

/// Per-record outcome. A malformed record gets a row describing the
/// failure instead of dropping the rest of the batch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordResult {
    Evaluated(ValidationFinding),
    Malformed { reason: String },
}

/// Hard caps on batch size. Exceeding either rejects the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchLimits {
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_max_records() -> usize {
    10_000
}

fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            max_bytes: default_max_bytes(),
        }
    }
}

pub struct BatchEvaluator {
    engine: Arc<ValidationEngine>,
    limits: BatchLimits,
}

impl BatchEvaluator {
    pub fn new(engine: Arc<ValidationEngine>, limits: BatchLimits) -> Self {
        Self { engine, limits }
    }

    /// Run every record through the single-record pipeline.
    ///
    /// Over-limit batches are rejected wholesale, producing zero rows;
    /// otherwise the output has exactly one row per input, in input order.
    pub fn evaluate(&self, records: &[BatchRecord]) -> Result<Vec<RecordResult>, BatchError> {
        if records.len() > self.limits.max_records {
            return Err(BatchError::TooManyRecords {
                count: records.len(),
                limit: self.limits.max_records,
            });
        }

        let bytes: usize = records.iter().map(|r| r.email.len() + r.ip.len()).sum();
        if bytes > self.limits.max_bytes {
            return Err(BatchError::TooLarge {
                bytes,
                limit: self.limits.max_bytes,
            });
        }

        log::debug!("Evaluating batch of {} records", records.len());

        Ok(records
            .iter()
            .map(|record| match self.engine.evaluate(&record.email, &record.ip) {
                Ok(finding) => RecordResult::Evaluated(finding),
                Err(e) => RecordResult::Malformed {
                    reason: e.to_string(),
                },
            })
            .collect())
    }
}
