//! Single-pair validation: reads the current snapshot of both stores and
//! aggregates the findings into one scored result.

use crate::email_store::EmailStore;
use crate::error::MalformedInput;
use crate::ip_store::IpStore;
use crate::metrics::MetricsRecorder;
use crate::risk;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Combined result for one (email, ip) pair. Created fresh per request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationFinding {
    pub email_disposable: bool,
    pub email_reason: String,
    pub email_role_based: bool,
    pub email_typo_suggestion: Option<String>,
    pub ip_blacklisted: bool,
    pub ip_blacklist_hits: usize,
    pub ip_blacklist_sources: Vec<String>,
    pub risk_score: u8,
}

/// Per-source data freshness, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub entries: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub disposable_domains: usize,
    pub email_last_updated: Option<DateTime<Utc>>,
    pub ip_blacklists: Vec<SourceStatus>,
}

pub struct ValidationEngine {
    email_store: Arc<EmailStore>,
    ip_store: Arc<IpStore>,
    metrics: Option<MetricsRecorder>,
}

impl ValidationEngine {
    pub fn new(email_store: Arc<EmailStore>, ip_store: Arc<IpStore>) -> Self {
        Self {
            email_store,
            ip_store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, recorder: MetricsRecorder) -> Self {
        self.metrics = Some(recorder);
        self
    }

    /// Evaluate one pair against the currently published snapshots.
    ///
    /// Inputs arrive schema-validated from the transport layer but are
    /// re-validated here; a malformed email or IP rejects the record.
    pub fn evaluate(&self, email: &str, ip: &str) -> Result<ValidationFinding, MalformedInput> {
        let started = Instant::now();
        let result = self.evaluate_inner(email, ip);

        if let Some(metrics) = &self.metrics {
            metrics.record_evaluation(started.elapsed(), result.is_ok());
        }

        result
    }

    fn evaluate_inner(&self, email: &str, ip: &str) -> Result<ValidationFinding, MalformedInput> {
        let email_finding = self.email_store.evaluate(email)?;
        let ip_finding = self.ip_store.evaluate(ip)?;
        let risk_score = risk::aggregate(&email_finding, &ip_finding);

        log::debug!(
            "Evaluated email={email} ip={ip} risk_score={risk_score} \
             disposable={} hits={}",
            email_finding.disposable,
            ip_finding.hits
        );

        Ok(ValidationFinding {
            email_disposable: email_finding.disposable,
            email_reason: email_finding.reason,
            email_role_based: email_finding.role_based,
            email_typo_suggestion: email_finding.typo_suggestion,
            ip_blacklisted: ip_finding.blacklisted,
            ip_blacklist_hits: ip_finding.hits,
            ip_blacklist_sources: ip_finding.sources,
            risk_score,
        })
    }

    /// Data freshness and size of everything currently loaded.
    pub fn status(&self) -> StatusReport {
        let ip_snapshot = self.ip_store.snapshot();
        let updated = ip_snapshot.last_updated();

        let ip_blacklists = ip_snapshot
            .source_counts()
            .into_iter()
            .map(|(name, entries)| SourceStatus {
                last_updated: updated.get(&name).copied(),
                name,
                entries,
            })
            .collect();

        StatusReport {
            disposable_domains: self.email_store.domain_count(),
            email_last_updated: self.email_store.last_updated(),
            ip_blacklists,
        }
    }

    pub fn email_store(&self) -> &Arc<EmailStore> {
        &self.email_store
    }

    pub fn ip_store(&self) -> &Arc<IpStore> {
        &self.ip_store
    }
}
