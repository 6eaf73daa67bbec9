//! Evaluation metrics reporting.
//!
//! The engine's only obligation is to report (latency, outcome) per
//! evaluation call; aggregation into percentiles is an external concern.
//! Events travel over a channel to a worker task so the evaluation path
//! never waits on the sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;

#[derive(Debug, Clone)]
pub enum MetricEvent {
    Evaluation { latency: Duration, ok: bool },
}

/// Running totals since startup.
#[derive(Debug, Default)]
pub struct MetricTotals {
    pub evaluations: AtomicU64,
    pub rejected: AtomicU64,
    pub latency_micros: AtomicU64,
}

impl MetricTotals {
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn mean_latency_micros(&self) -> u64 {
        let count = self.evaluations();
        if count == 0 {
            0
        } else {
            self.latency_micros.load(Ordering::Relaxed) / count
        }
    }
}

/// Cheap cloneable handle held by evaluation callers.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    sender: mpsc::UnboundedSender<MetricEvent>,
}

impl MetricsRecorder {
    pub fn record_evaluation(&self, latency: Duration, ok: bool) {
        if let Err(e) = self.sender.send(MetricEvent::Evaluation { latency, ok }) {
            log::warn!("Failed to send metric event: {e}");
        }
    }
}

/// Owns the sink worker; drop it to stop collection.
pub struct MetricsCollector {
    totals: Arc<MetricTotals>,
    sender: mpsc::UnboundedSender<MetricEvent>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MetricsCollector {
    pub fn new(flush_interval_seconds: u64) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let totals = Arc::new(MetricTotals::default());

        let worker_totals = Arc::clone(&totals);
        let handle = tokio::spawn(async move {
            Self::worker(worker_totals, receiver, flush_interval_seconds).await;
        });

        Self {
            totals,
            sender,
            _handle: handle,
        }
    }

    pub fn recorder(&self) -> MetricsRecorder {
        MetricsRecorder {
            sender: self.sender.clone(),
        }
    }

    pub fn totals(&self) -> Arc<MetricTotals> {
        Arc::clone(&self.totals)
    }

    async fn worker(
        totals: Arc<MetricTotals>,
        mut receiver: mpsc::UnboundedReceiver<MetricEvent>,
        flush_interval_seconds: u64,
    ) {
        let mut flush_timer = interval(Duration::from_secs(flush_interval_seconds.max(1)));
        flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // An interval's first tick completes immediately
        flush_timer.tick().await;

        let mut window_count: u64 = 0;
        let mut window_rejected: u64 = 0;
        let mut window_micros: u64 = 0;

        loop {
            tokio::select! {
                event = receiver.recv() => {
                    match event {
                        Some(MetricEvent::Evaluation { latency, ok }) => {
                            let micros = latency.as_micros() as u64;
                            totals.evaluations.fetch_add(1, Ordering::Relaxed);
                            totals.latency_micros.fetch_add(micros, Ordering::Relaxed);
                            if !ok {
                                totals.rejected.fetch_add(1, Ordering::Relaxed);
                            }
                            window_count += 1;
                            window_micros += micros;
                            if !ok {
                                window_rejected += 1;
                            }
                        }
                        None => break,
                    }
                }
                _ = flush_timer.tick() => {
                    if window_count > 0 {
                        log::info!(
                            "Processed {window_count} evaluations ({window_rejected} rejected), \
                             avg latency {:.2}ms",
                            window_micros as f64 / window_count as f64 / 1000.0
                        );
                        window_count = 0;
                        window_rejected = 0;
                        window_micros = 0;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_totals() {
        let collector = MetricsCollector::new(60);
        let recorder = collector.recorder();

        recorder.record_evaluation(Duration::from_millis(2), true);
        recorder.record_evaluation(Duration::from_millis(4), false);

        // The worker drains the channel asynchronously
        let totals = collector.totals();
        for _ in 0..50 {
            if totals.evaluations() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(totals.evaluations(), 2);
        assert_eq!(totals.rejected(), 1);
        assert_eq!(totals.mean_latency_micros(), 3000);
    }

    #[tokio::test]
    async fn test_recorder_survives_collector_use() {
        let collector = MetricsCollector::new(60);
        let a = collector.recorder();
        let b = collector.recorder();
        a.record_evaluation(Duration::from_micros(100), true);
        b.record_evaluation(Duration::from_micros(100), true);

        let totals = collector.totals();
        for _ in 0..50 {
            if totals.evaluations() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(totals.evaluations(), 2);
    }
}
