// Request counters exposed on /metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-endpoint counters
#[derive(Debug, Clone)]
pub struct EndpointMetrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub total_latency_ms: Arc<AtomicU64>,
    pub max_latency_ms: Arc<AtomicU64>,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            total_latency_ms: Arc::new(AtomicU64::new(0)),
            max_latency_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_request(&self, latency_ms: u64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(latency_ms, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let count = self.request_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    pub fn stats(&self) -> EndpointStats {
        EndpointStats {
            request_count: self.request_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            avg_latency_ms: self.avg_latency_ms(),
            max_latency_ms: self.max_latency_ms.load(Ordering::Relaxed),
        }
    }
}

impl Default for EndpointMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcomes of document ingestion
#[derive(Debug, Clone, Default)]
pub struct IngestionMetrics {
    pub ready: Arc<AtomicU64>,
    pub failed: Arc<AtomicU64>,
    pub timed_out: Arc<AtomicU64>,
    pub rejected: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct AppMetrics {
    pub chat: EndpointMetrics,
    pub tts: EndpointMetrics,
    pub upload: EndpointMetrics,
    pub ingestion: IngestionMetrics,
    started: Instant,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self {
            chat: EndpointMetrics::new(),
            tts: EndpointMetrics::new(),
            upload: EndpointMetrics::new(),
            ingestion: IngestionMetrics::default(),
            started: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self, audio_assets: usize) -> MetricsResponse {
        MetricsResponse {
            timestamp: Utc::now(),
            uptime_seconds: self.uptime_seconds(),
            endpoints: EndpointMetricsResponse {
                chat: self.chat.stats(),
                tts: self.tts.stats(),
                upload: self.upload.stats(),
            },
            ingestion: IngestionStats {
                ready: self.ingestion.ready.load(Ordering::Relaxed),
                failed: self.ingestion.failed.load(Ordering::Relaxed),
                timed_out: self.ingestion.timed_out.load(Ordering::Relaxed),
                rejected: self.ingestion.rejected.load(Ordering::Relaxed),
            },
            audio_assets,
        }
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub endpoints: EndpointMetricsResponse,
    pub ingestion: IngestionStats,
    pub audio_assets: usize,
}

#[derive(Serialize)]
pub struct EndpointMetricsResponse {
    pub chat: EndpointStats,
    pub tts: EndpointStats,
    pub upload: EndpointStats,
}

#[derive(Serialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: u64,
}

#[derive(Serialize)]
pub struct IngestionStats {
    pub ready: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub rejected: u64,
}
