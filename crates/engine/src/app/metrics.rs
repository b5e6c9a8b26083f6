use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

pub const FPS_WINDOW_MS: f64 = 1000.0;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopMetricsSnapshot {
    pub fps: u32,
    pub total_ticks: u64,
    pub throttled_calls: u64,
}

/// Shared read side of the loop telemetry, published once per FPS window.
#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

/// Counts executed frames inside a rolling one-second window.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FpsWindow {
    window_start_ms: f64,
    frame_counter: u32,
    current_fps: u32,
}

impl FpsWindow {
    pub(crate) fn starting_at(now_ms: f64) -> Self {
        Self {
            window_start_ms: now_ms,
            ..Self::default()
        }
    }

    /// Returns the closed window's frame count when `now_ms` ends the window.
    pub(crate) fn record_frame(&mut self, now_ms: f64) -> Option<u32> {
        self.frame_counter = self.frame_counter.saturating_add(1);
        if now_ms < self.window_start_ms + FPS_WINDOW_MS {
            return None;
        }

        self.current_fps = self.frame_counter;
        self.frame_counter = 0;
        self.window_start_ms = now_ms;
        Some(self.current_fps)
    }

    pub(crate) fn current_fps(&self) -> u32 {
        self.current_fps
    }

    #[cfg(test)]
    pub(crate) fn frames_in_window(&self) -> u32 {
        self.frame_counter
    }
}
