use std::cell::Cell;
use std::time::Instant;

use thiserror::Error;
use tracing::{trace, warn};

use super::metrics::FpsWindow;

pub const DEFAULT_TARGET_FPS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u64);

/// Tags callbacks so they can be cancelled together, e.g. everything a room scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackGroup(pub u64);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("{what} must be at least 1 tick, got {value}")]
    InvalidArgument { what: &'static str, value: u32 },
}

pub type Callback<C> = Box<dyn FnMut(&mut C, &mut Scheduler<C>)>;

/// Monotonic millisecond clock consumed by the host loop.
pub trait TimeSource {
    fn now_ms(&self) -> f64;
}

#[derive(Debug, Clone, Copy)]
pub struct InstantTimeSource {
    origin: Instant,
}

impl InstantTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for InstantTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for InstantTimeSource {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven clock for deterministic tests and replays.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now_ms: Cell<f64>,
}

impl ManualTimeSource {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now_ms: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, delta_ms: f64) -> f64 {
        let next = self.now_ms.get() + delta_ms.max(0.0);
        self.now_ms.set(next);
        next
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> f64 {
        self.now_ms.get()
    }
}

#[derive(Debug, Clone, Copy)]
struct FrameClock {
    last_throttle_time: f64,
    frame_interval_ms: f64,
    fps: FpsWindow,
}

impl FrameClock {
    fn new(target_fps: u32) -> Self {
        Self {
            last_throttle_time: 0.0,
            frame_interval_ms: 1000.0 / f64::from(target_fps.max(1)),
            fps: FpsWindow::default(),
        }
    }

    fn is_due(&self, now_ms: f64) -> bool {
        now_ms - self.last_throttle_time > self.frame_interval_ms
    }

    /// `None` when the call lands inside the current frame interval.
    fn advance(&mut self, now_ms: f64) -> Option<FrameTick> {
        let delta = now_ms - self.last_throttle_time;
        if delta <= self.frame_interval_ms {
            return None;
        }

        self.last_throttle_time = now_ms - (delta % self.frame_interval_ms);
        let fps_sample = self.fps.record_frame(now_ms);
        Some(FrameTick { fps_sample })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    /// Set on the tick that closed an FPS window.
    pub fps_sample: Option<u32>,
}

struct QueuedCallback<C> {
    handle: CallbackHandle,
    group: Option<CallbackGroup>,
    callback: Option<Callback<C>>,
    ticks_remaining: u32,
    repeat_interval_ticks: u32,
    cancelled: bool,
    finished: bool,
}

impl<C> QueuedCallback<C> {
    fn is_live(&self) -> bool {
        !self.cancelled && !self.finished
    }
}

/// Fixed-rate frame pump with a tick-counted callback queue.
///
/// `C` is the context handed to every callback and to the per-frame hook.
pub struct Scheduler<C> {
    clock: FrameClock,
    queue: Vec<QueuedCallback<C>>,
    next_handle: u64,
    total_ticks: u64,
    throttled_calls: u64,
    running: bool,
}

impl<C> Scheduler<C> {
    pub fn new(target_fps: u32) -> Self {
        Self {
            clock: FrameClock::new(target_fps),
            queue: Vec::new(),
            next_handle: 0,
            total_ticks: 0,
            throttled_calls: 0,
            running: false,
        }
    }

    pub fn frame_interval_ms(&self) -> f64 {
        self.clock.frame_interval_ms
    }

    pub fn last_throttle_time(&self) -> f64 {
        self.clock.last_throttle_time
    }

    pub fn current_fps(&self) -> u32 {
        self.clock.fps.current_fps()
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn throttled_calls(&self) -> u64 {
        self.throttled_calls
    }

    /// Restarts throttling and FPS sampling from `now_ms` without touching the queue.
    pub fn reset_clock(&mut self, now_ms: f64) {
        self.clock.last_throttle_time = now_ms;
        self.clock.fps = FpsWindow::starting_at(now_ms);
    }

    /// Whether a `tick` at `now_ms` would run a frame.
    pub fn is_due(&self, now_ms: f64) -> bool {
        !self.running && self.clock.is_due(now_ms)
    }

    /// Runs one frame if `now_ms` is past the frame interval: due callbacks first,
    /// then `on_frame` exactly once. A `tick` from inside a running frame does nothing.
    pub fn tick<F>(&mut self, now_ms: f64, ctx: &mut C, on_frame: F) -> Option<FrameTick>
    where
        F: FnOnce(&mut C, &mut Self),
    {
        if self.running {
            warn!(now_ms, "nested_tick_ignored");
            return None;
        }
        let Some(frame) = self.clock.advance(now_ms) else {
            self.throttled_calls = self.throttled_calls.saturating_add(1);
            return None;
        };
        self.total_ticks = self.total_ticks.saturating_add(1);

        self.running = true;
        self.run_due(ctx);
        on_frame(ctx, self);
        self.running = false;
        Some(frame)
    }

    pub fn schedule_once<F>(
        &mut self,
        callback: F,
        delay_ticks: u32,
    ) -> Result<CallbackHandle, ScheduleError>
    where
        F: FnMut(&mut C, &mut Scheduler<C>) + 'static,
    {
        self.schedule_with(None, Box::new(callback), delay_ticks, false)
    }

    pub fn schedule_repeating<F>(
        &mut self,
        callback: F,
        interval_ticks: u32,
    ) -> Result<CallbackHandle, ScheduleError>
    where
        F: FnMut(&mut C, &mut Scheduler<C>) + 'static,
    {
        self.schedule_with(None, Box::new(callback), interval_ticks, true)
    }

    pub fn schedule_once_in<F>(
        &mut self,
        group: CallbackGroup,
        callback: F,
        delay_ticks: u32,
    ) -> Result<CallbackHandle, ScheduleError>
    where
        F: FnMut(&mut C, &mut Scheduler<C>) + 'static,
    {
        self.schedule_with(Some(group), Box::new(callback), delay_ticks, false)
    }

    pub fn schedule_repeating_in<F>(
        &mut self,
        group: CallbackGroup,
        callback: F,
        interval_ticks: u32,
    ) -> Result<CallbackHandle, ScheduleError>
    where
        F: FnMut(&mut C, &mut Scheduler<C>) + 'static,
    {
        self.schedule_with(Some(group), Box::new(callback), interval_ticks, true)
    }

    pub(crate) fn schedule_with(
        &mut self,
        group: Option<CallbackGroup>,
        callback: Callback<C>,
        ticks: u32,
        repeating: bool,
    ) -> Result<CallbackHandle, ScheduleError> {
        if ticks == 0 {
            return Err(ScheduleError::InvalidArgument {
                what: if repeating {
                    "interval_ticks"
                } else {
                    "delay_ticks"
                },
                value: ticks,
            });
        }

        let handle = CallbackHandle(self.next_handle);
        self.next_handle = self.next_handle.saturating_add(1);
        self.queue.push(QueuedCallback {
            handle,
            group,
            callback: Some(callback),
            ticks_remaining: ticks,
            repeat_interval_ticks: if repeating { ticks } else { 0 },
            cancelled: false,
            finished: false,
        });
        Ok(handle)
    }

    /// Idempotent; unknown or already-fired handles are ignored.
    pub fn cancel(&mut self, handle: CallbackHandle) {
        if let Some(entry) = self.queue.iter_mut().find(|entry| entry.handle == handle) {
            entry.cancelled = true;
        }
    }

    /// Returns how many live callbacks were cancelled.
    pub fn cancel_group(&mut self, group: CallbackGroup) -> usize {
        let mut cancelled = 0;
        for entry in self
            .queue
            .iter_mut()
            .filter(|entry| entry.group == Some(group) && entry.is_live())
        {
            entry.cancelled = true;
            cancelled += 1;
        }
        cancelled
    }

    pub fn is_queued(&self, handle: CallbackHandle) -> bool {
        self.queue
            .iter()
            .any(|entry| entry.handle == handle && entry.is_live())
    }

    pub fn queued_len(&self) -> usize {
        self.queue.iter().filter(|entry| entry.is_live()).count()
    }

    pub fn queued_in_group(&self, group: CallbackGroup) -> usize {
        self.queue
            .iter()
            .filter(|entry| entry.group == Some(group) && entry.is_live())
            .count()
    }

    fn run_due(&mut self, ctx: &mut C) {
        // Entries pushed by callbacks during this pass wait for the next tick.
        let due_count = self.queue.len();
        for index in 0..due_count {
            let entry = &mut self.queue[index];
            if !entry.is_live() {
                continue;
            }
            entry.ticks_remaining = entry.ticks_remaining.saturating_sub(1);
            if entry.ticks_remaining > 0 {
                continue;
            }
            let handle = entry.handle;
            let Some(mut callback) = entry.callback.take() else {
                entry.finished = true;
                continue;
            };

            callback(ctx, self);
            trace!(handle = handle.0, "callback_fired");

            let entry = &mut self.queue[index];
            if entry.repeat_interval_ticks > 0 && !entry.cancelled {
                entry.ticks_remaining = entry.repeat_interval_ticks;
                entry.callback = Some(callback);
            } else {
                entry.finished = true;
            }
        }

        self.queue.retain(QueuedCallback::is_live);
    }
}
