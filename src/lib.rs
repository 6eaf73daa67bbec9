pub mod batch;
pub mod cache;
pub mod config;
pub mod email_store;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod ip_store;
pub mod metrics;
pub mod refresh;
pub mod risk;

pub use batch::{BatchEvaluator, BatchLimits, BatchRecord, RecordResult};
pub use config::Config;
pub use email_store::{EmailFinding, EmailSnapshot, EmailStore};
pub use engine::{StatusReport, ValidationEngine, ValidationFinding};
pub use error::{BatchError, FetchError, MalformedInput, ParseError, RefreshError};
pub use fetcher::SourceFetcher;
pub use ip_store::{IpFinding, IpSnapshot, IpStore};
pub use metrics::{MetricsCollector, MetricsRecorder};
pub use refresh::{RefreshCoordinator, RefreshHandle, RefreshOutcome};
pub use risk::aggregate;
