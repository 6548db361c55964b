use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

/// Counters for workflow activity
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    pub packets_created: AtomicU64,
    pub transitions: AtomicU64,
    pub rejections: AtomicU64,
    pub items_enqueued: AtomicU64,
    pub items_completed: AtomicU64,
    pub items_failed: AtomicU64,
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_packet_created(&self) {
        self.packets_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self, count: usize) {
        self.items_enqueued.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.items_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> WorkflowStats {
        WorkflowStats {
            packets_created: self.packets_created.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            items_enqueued: self.items_enqueued.load(Ordering::Relaxed),
            items_completed: self.items_completed.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkflowStats {
    pub packets_created: u64,
    pub transitions: u64,
    pub rejections: u64,
    pub items_enqueued: u64,
    pub items_completed: u64,
    pub items_failed: u64,
}

/// Logs the elapsed time of an operation when finished or dropped
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        debug!(
            operation = self.operation,
            duration_us = self.start.elapsed().as_micros() as u64,
            "Operation completed"
        );
    }
}

#[macro_export]
macro_rules! time_operation {
    ($operation:expr) => {
        let _timer = $crate::observability::OperationTimer::new($operation);
    };
}
