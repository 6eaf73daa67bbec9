//! Multi-source IP blacklist membership against a point-in-time snapshot.
//!
//! Every source is tested independently; a lookup reports all sources that
//! list the address, not just the first.

use crate::error::{MalformedInput, ParseError};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

/// Result of evaluating one IP address across all loaded sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpFinding {
    pub blacklisted: bool,
    pub hits: usize,
    pub sources: Vec<String>,
}

/// Parse a raw blacklist payload into canonical address strings.
///
/// The first whitespace-delimited token per line is the address candidate
/// (some feeds append score columns); tokens that do not parse as IPv4 or
/// IPv6 are discarded rather than failing the whole payload.
pub fn parse_source(source_name: &str, raw: &[u8]) -> Result<HashSet<String>, ParseError> {
    let text = std::str::from_utf8(raw).map_err(|e| ParseError {
        source_name: source_name.to_string(),
        detail: format!("payload is not valid UTF-8: {e}"),
    })?;

    let addrs: HashSet<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|token| token.parse::<IpAddr>().ok())
        .map(|ip| ip.to_string())
        .collect();

    Ok(addrs)
}

/// Immutable view of all per-source blacklists.
#[derive(Debug, Clone, Default)]
pub struct IpSnapshot {
    sources: HashMap<String, HashSet<String>>,
    updated: HashMap<String, DateTime<Utc>>,
}

impl IpSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Evaluate an address against every source independently.
    pub fn evaluate(&self, ip: &str) -> Result<IpFinding, MalformedInput> {
        let parsed: IpAddr = ip.trim().parse().map_err(|_| MalformedInput::Ip {
            input: ip.to_string(),
        })?;
        let normalized = parsed.to_string();

        let mut hits: Vec<String> = self
            .sources
            .iter()
            .filter(|(_, addrs)| addrs.contains(&normalized))
            .map(|(name, _)| name.clone())
            .collect();
        hits.sort_unstable();

        Ok(IpFinding {
            blacklisted: !hits.is_empty(),
            hits: hits.len(),
            sources: hits,
        })
    }

    pub fn has_source(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Entry counts per source, sorted by source name.
    pub fn source_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = self
            .sources
            .iter()
            .map(|(name, addrs)| (name.clone(), addrs.len()))
            .collect();
        counts.sort_unstable();
        counts
    }

    pub fn last_updated(&self) -> &HashMap<String, DateTime<Utc>> {
        &self.updated
    }
}

/// Holds the currently published snapshot. Replacing one source's set
/// builds a complete replacement snapshot and swaps it in whole, so readers
/// never observe a half-updated structure.
pub struct IpStore {
    current: RwLock<Arc<IpSnapshot>>,
}

impl IpStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(IpSnapshot::empty())),
        }
    }

    pub fn snapshot(&self) -> Arc<IpSnapshot> {
        self.current
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_else(|_| Arc::new(IpSnapshot::empty()))
    }

    /// Replace one source's address set, leaving every other source
    /// untouched. `retrieved_at` is `None` for cache warm starts.
    pub fn publish_source(
        &self,
        name: &str,
        addrs: HashSet<String>,
        retrieved_at: Option<DateTime<Utc>>,
    ) {
        if let Ok(mut guard) = self.current.write() {
            let mut next = (**guard).clone();
            next.sources.insert(name.to_string(), addrs);
            match retrieved_at {
                Some(ts) => {
                    next.updated.insert(name.to_string(), ts);
                }
                None => {
                    next.updated.remove(name);
                }
            }
            *guard = Arc::new(next);
        }
    }

    pub fn evaluate(&self, ip: &str) -> Result<IpFinding, MalformedInput> {
        self.snapshot().evaluate(ip)
    }

    pub fn source_counts(&self) -> Vec<(String, usize)> {
        self.snapshot().source_counts()
    }

    pub fn last_updated(&self) -> HashMap<String, DateTime<Utc>> {
        self.snapshot().last_updated().clone()
    }
}

impl Default for IpStore {
    fn default() -> Self {
        Self::new()
    }
}
