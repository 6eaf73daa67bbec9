//! Disposable/role/typo email analysis against a point-in-time snapshot of
//! known disposable domains.

use crate::error::{MalformedInput, ParseError};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Weight added when the domain (or its parent) is a disposable provider.
pub const DISPOSABLE_WEIGHT: u32 = 70;
/// Weight added for administrative mailbox names.
pub const ROLE_WEIGHT: u32 = 20;
/// Weight added when the domain is a known misspelling of a major provider.
pub const TYPO_WEIGHT: u32 = 10;

/// Closed set of organizational mailbox names.
const ROLE_ACCOUNTS: &[&str] = &[
    "admin",
    "administrator",
    "contact",
    "info",
    "support",
    "sales",
    "help",
    "noreply",
    "no-reply",
    "postmaster",
    "webmaster",
    "hostmaster",
    "abuse",
    "security",
    "privacy",
    "legal",
    "billing",
    "marketing",
];

/// Common misspellings of major mail providers and their corrections.
const DOMAIN_TYPOS: &[(&str, &str)] = &[
    ("gmal.com", "gmail.com"),
    ("gmial.com", "gmail.com"),
    ("gmil.com", "gmail.com"),
    ("yahooo.com", "yahoo.com"),
    ("yaho.com", "yahoo.com"),
    ("hotmial.com", "hotmail.com"),
    ("hotmal.com", "hotmail.com"),
];

/// Result of evaluating one email address.
///
/// `score` is the raw additive sub-score (disposable + role + typo); the
/// risk aggregator clamps later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailFinding {
    pub disposable: bool,
    pub reason: String,
    pub role_based: bool,
    pub typo_suggestion: Option<String>,
    pub score: u32,
}

/// Immutable view of the disposable-domain list at one retrieval instant.
#[derive(Debug, Clone, Default)]
pub struct EmailSnapshot {
    domains: HashSet<String>,
    retrieved_at: Option<DateTime<Utc>>,
}

impl EmailSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from entries that are already normalized, e.g. a
    /// reloaded cache file. `retrieved_at` is `None` for warm starts.
    pub fn from_entries(domains: HashSet<String>, retrieved_at: Option<DateTime<Utc>>) -> Self {
        Self {
            domains,
            retrieved_at,
        }
    }

    /// Parse a newline-delimited domain list as served by the remote
    /// source. Blank lines and `#` comments are skipped; entries are
    /// trimmed, lowercased and deduplicated.
    pub fn parse(
        source_name: &str,
        raw: &[u8],
        retrieved_at: DateTime<Utc>,
    ) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|e| ParseError {
            source_name: source_name.to_string(),
            detail: format!("payload is not valid UTF-8: {e}"),
        })?;

        let domains: HashSet<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_lowercase)
            .collect();

        Ok(Self {
            domains,
            retrieved_at: Some(retrieved_at),
        })
    }

    /// Evaluate a single address against this snapshot.
    ///
    /// The address is split on the last `@` so a local-part containing `@`
    /// is preserved verbatim. Role and typo checks always run; the
    /// disposable lookup short-circuits on the first match (exact domain,
    /// then the last two labels for subdomains of disposable providers).
    pub fn evaluate(&self, email: &str) -> Result<EmailFinding, MalformedInput> {
        let at = email.rfind('@').ok_or_else(|| MalformedInput::Email {
            input: email.to_string(),
        })?;

        let local_part = email[..at].to_lowercase();
        let domain = email[at + 1..].to_lowercase();

        let mut finding = EmailFinding {
            disposable: false,
            reason: String::new(),
            role_based: false,
            typo_suggestion: None,
            score: 0,
        };

        if ROLE_ACCOUNTS.contains(&local_part.as_str()) {
            finding.role_based = true;
            finding.score += ROLE_WEIGHT;
        }

        // Runs regardless of the disposable outcome: a misspelled domain in
        // the disposable list still gets a suggestion.
        if let Some((_, correction)) = DOMAIN_TYPOS.iter().find(|(typo, _)| *typo == domain) {
            finding.typo_suggestion = Some(format!("{local_part}@{correction}"));
            finding.score += TYPO_WEIGHT;
        }

        if self.domains.contains(&domain) {
            finding.disposable = true;
            finding.reason = format!("Domain '{domain}' is in disposable email list");
            finding.score += DISPOSABLE_WEIGHT;
            return Ok(finding);
        }

        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() > 2 {
            let parent_domain = labels[labels.len() - 2..].join(".");
            if self.domains.contains(&parent_domain) {
                finding.disposable = true;
                finding.reason =
                    format!("Parent domain '{parent_domain}' is in disposable email list");
                finding.score += DISPOSABLE_WEIGHT;
                return Ok(finding);
            }
        }

        finding.reason = format!("Domain '{domain}' is not in disposable email list");
        Ok(finding)
    }

    pub fn domains(&self) -> &HashSet<String> {
        &self.domains
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn retrieved_at(&self) -> Option<DateTime<Utc>> {
        self.retrieved_at
    }
}

/// Holds the currently published snapshot. Readers clone the `Arc` and
/// never block on an in-progress refresh; publication is a single swap.
pub struct EmailStore {
    current: RwLock<Arc<EmailSnapshot>>,
}

impl EmailStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(EmailSnapshot::empty())),
        }
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<EmailSnapshot> {
        self.current
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_else(|_| Arc::new(EmailSnapshot::empty()))
    }

    /// Atomically replace the published snapshot.
    pub fn publish(&self, snapshot: EmailSnapshot) {
        if let Ok(mut guard) = self.current.write() {
            *guard = Arc::new(snapshot);
        }
    }

    /// Evaluate against whatever snapshot is currently published.
    pub fn evaluate(&self, email: &str) -> Result<EmailFinding, MalformedInput> {
        self.snapshot().evaluate(email)
    }

    pub fn domain_count(&self) -> usize {
        self.snapshot().len()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.snapshot().retrieved_at()
    }
}

impl Default for EmailStore {
    fn default() -> Self {
        Self::new()
    }
}
