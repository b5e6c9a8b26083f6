use thiserror::Error;
use tracing::{error, info};

use super::audio::{AudioSink, NullAudio};
use super::config::LoopConfig;
use super::input::{InputMap, KeySnapshot};
use super::metrics::{LoopMetricsSnapshot, MetricsHandle};
use super::rendering::FrameView;
use super::room::{Room, RoomError, RoomFactory, TransitionOptions};
use super::room_manager::{RoomManager, RoomRegistry, TransitionOutcome};
use super::scheduler::{CallbackHandle, ScheduleError, Scheduler};
use super::stage::Stage;

/// Aggregate failure reported by the resource loader.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("resource initialization failed: {}", failures.join("; "))]
pub struct ResourceInitFailure {
    pub failures: Vec<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("finish_loading called after loading already finished")]
    NotLoading,
    #[error(transparent)]
    ResourceInit(#[from] ResourceInitFailure),
    #[error("no room is registered under the name {name:?}")]
    UnknownRoom { name: String },
    #[error("no rooms are registered; there is nothing to start")]
    EmptyRegistry,
    #[error(transparent)]
    Room(RoomError),
}

impl From<RoomError> for RuntimeError {
    fn from(source: RoomError) -> Self {
        match source {
            RoomError::UnknownRoom { name } => Self::UnknownRoom { name },
            other => Self::Room(other),
        }
    }
}

/// Everything scheduled callbacks and the per-frame hook may touch.
pub struct RuntimeContext {
    pub(crate) rooms: RoomManager,
    pub(crate) input: InputMap,
}

impl RuntimeContext {
    pub fn new(rooms: RoomManager, input: InputMap) -> Self {
        Self { rooms, input }
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    pub fn rooms_mut(&mut self) -> &mut RoomManager {
        &mut self.rooms
    }

    pub fn input(&self) -> &InputMap {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputMap {
        &mut self.input
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BootState {
    Loading,
    Booting { start_at_ms: f64 },
    Running,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Loading, booting or failed; nothing ran.
    NotStarted,
    Throttled,
    Ran { room_changed: bool },
}

#[derive(Debug, Clone, Copy)]
struct RuntimeSettings {
    quick_boot: bool,
    boot_delay_ms: u64,
    show_fps: bool,
    show_room_info: bool,
}

pub struct Runtime {
    scheduler: Scheduler<RuntimeContext>,
    context: RuntimeContext,
    boot: BootState,
    settings: RuntimeSettings,
    metrics: MetricsHandle,
}

impl Runtime {
    pub fn new(config: &LoopConfig, registry: RoomRegistry) -> Self {
        Self::with_parts(config, registry, Box::new(NullAudio), MetricsHandle::default())
    }

    pub fn with_parts(
        config: &LoopConfig,
        registry: RoomRegistry,
        audio: Box<dyn AudioSink>,
        metrics: MetricsHandle,
    ) -> Self {
        let config = config.clone().normalized();
        let mut input = InputMap::new(config.input.repeat_timing());
        for (name, code) in &config.input.bindings {
            input.map_input(name, code);
        }

        Self {
            scheduler: Scheduler::new(config.target_fps),
            context: RuntimeContext::new(RoomManager::with_audio(registry, audio), input),
            boot: BootState::Loading,
            settings: RuntimeSettings {
                quick_boot: config.quick_boot,
                boot_delay_ms: config.boot_delay_ms,
                show_fps: config.show_fps,
                show_room_info: config.show_room_info,
            },
            metrics,
        }
    }

    pub fn boot_state(&self) -> BootState {
        self.boot
    }

    /// Called once by the loader. On success the starting room is installed and
    /// ticking begins immediately (quick boot) or after the boot delay.
    pub fn finish_loading(
        &mut self,
        now_ms: f64,
        result: Result<(), ResourceInitFailure>,
    ) -> Result<(), RuntimeError> {
        if self.boot != BootState::Loading {
            return Err(RuntimeError::NotLoading);
        }
        if let Err(failure) = result {
            error!(failures = ?failure.failures, "resource_init_failed");
            self.boot = BootState::Failed;
            return Err(failure.into());
        }
        let Some(starting_room) = self.context.rooms.registry().starting_room() else {
            self.boot = BootState::Failed;
            return Err(RuntimeError::EmptyRegistry);
        };

        info!(room = starting_room.name(), "loading_complete");
        self.context.rooms.change_room(
            &mut self.scheduler,
            starting_room,
            TransitionOptions::default(),
        );

        if self.settings.quick_boot {
            self.enter_running(now_ms);
        } else {
            let start_at_ms = now_ms + self.settings.boot_delay_ms as f64;
            self.boot = BootState::Booting { start_at_ms };
            info!(boot_delay_ms = self.settings.boot_delay_ms, "boot_delay_started");
        }
        Ok(())
    }

    pub fn tick(&mut self, now_ms: f64, keys: &KeySnapshot) -> TickOutcome {
        match self.boot {
            BootState::Loading | BootState::Failed => return TickOutcome::NotStarted,
            BootState::Booting { start_at_ms } => {
                if now_ms < start_at_ms {
                    return TickOutcome::NotStarted;
                }
                self.enter_running(now_ms);
            }
            BootState::Running => {}
        }

        if self.scheduler.is_due(now_ms) {
            self.context.rooms.begin_tick();
        }
        let installs_before = self.context.rooms.rooms_installed();
        let frame = self
            .scheduler
            .tick(now_ms, &mut self.context, |ctx, scheduler| {
                let RuntimeContext { rooms, input } = ctx;
                input.update(keys);
                rooms.update(input, scheduler);
            });
        let Some(frame) = frame else {
            return TickOutcome::Throttled;
        };

        if let Some(fps) = frame.fps_sample {
            let snapshot = LoopMetricsSnapshot {
                fps,
                total_ticks: self.scheduler.total_ticks(),
                throttled_calls: self.scheduler.throttled_calls(),
            };
            self.metrics.publish(snapshot);
            info!(
                fps = snapshot.fps,
                total_ticks = snapshot.total_ticks,
                throttled_calls = snapshot.throttled_calls,
                room = self.current_room().map(|room| room.name()).unwrap_or("<none>"),
                "loop_metrics"
            );
        }

        TickOutcome::Ran {
            room_changed: self.context.rooms.rooms_installed() != installs_before,
        }
    }

    pub fn change_room(&mut self, name: &str) -> Result<TransitionOutcome, RuntimeError> {
        self.change_room_named_with(name, TransitionOptions::default())
    }

    pub fn change_room_named_with(
        &mut self,
        name: &str,
        options: TransitionOptions,
    ) -> Result<TransitionOutcome, RuntimeError> {
        Ok(self
            .context
            .rooms
            .change_room_named(&mut self.scheduler, name, options)?)
    }

    pub fn change_room_with(
        &mut self,
        factory: RoomFactory,
        options: TransitionOptions,
    ) -> TransitionOutcome {
        self.context
            .rooms
            .change_room(&mut self.scheduler, factory, options)
    }

    /// Host-owned callback; survives room swaps.
    pub fn schedule_once<F>(
        &mut self,
        callback: F,
        delay_ticks: u32,
    ) -> Result<CallbackHandle, ScheduleError>
    where
        F: FnMut(&mut RuntimeContext, &mut Scheduler<RuntimeContext>) + 'static,
    {
        self.scheduler.schedule_once(callback, delay_ticks)
    }

    pub fn schedule_repeating<F>(
        &mut self,
        callback: F,
        interval_ticks: u32,
    ) -> Result<CallbackHandle, ScheduleError>
    where
        F: FnMut(&mut RuntimeContext, &mut Scheduler<RuntimeContext>) + 'static,
    {
        self.scheduler.schedule_repeating(callback, interval_ticks)
    }

    pub fn cancel(&mut self, handle: CallbackHandle) {
        self.scheduler.cancel(handle);
    }

    pub fn scheduler(&self) -> &Scheduler<RuntimeContext> {
        &self.scheduler
    }

    pub fn current_fps(&self) -> u32 {
        self.scheduler.current_fps()
    }

    pub fn current_room(&self) -> Option<&dyn Room> {
        self.context.rooms.current_room()
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.context.rooms
    }

    pub fn stage(&self) -> &Stage {
        self.context.rooms.stage()
    }

    pub fn input(&self) -> &InputMap {
        &self.context.input
    }

    pub fn input_mut(&mut self) -> &mut InputMap {
        &mut self.context.input
    }

    pub fn metrics(&self) -> MetricsHandle {
        self.metrics.clone()
    }

    pub fn debug_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.settings.show_fps {
            lines.push(self.current_fps().to_string());
        }
        if self.settings.show_room_info {
            if let Some(room) = self.current_room() {
                let counts = self.stage().instance_counts();
                lines.push(room.name().to_string());
                lines.push(format!("{} x {}", room.width(), room.height()));
                lines.push(format!("ACTS: {}", counts.actives));
                lines.push(format!("BAKS: {}", counts.backdrops));
                lines.push(format!("TEXT: {}", counts.paragraphs));
            }
        }
        lines
    }

    pub fn frame_view(&self) -> FrameView {
        match self.current_room() {
            Some(room) => {
                let fade = room.fade_info();
                FrameView {
                    background: room.background_color(),
                    fade_color: fade.overlay_color(),
                    overlay_opacity: fade.overlay_opacity(),
                }
            }
            None => FrameView::default(),
        }
    }

    fn enter_running(&mut self, now_ms: f64) {
        self.scheduler.reset_clock(now_ms);
        self.boot = BootState::Running;
        info!(target_fps_interval_ms = self.scheduler.frame_interval_ms(), "runtime_started");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use super::*;
    use crate::app::config::InputConfig;
    use crate::app::room::{RoomCommand, RoomContext, RoomCore, Rgb};

    struct CountingRoom {
        core: RoomCore,
        updates: Rc<Cell<u32>>,
    }

    impl Room for CountingRoom {
        fn core(&self) -> &RoomCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut RoomCore {
            &mut self.core
        }

        fn update(&mut self, ctx: &mut RoomContext<'_>) -> Result<RoomCommand, RoomError> {
            self.updates.set(self.updates.get() + 1);
            if ctx.input().pressed("confirm", false)? {
                return Ok(RoomCommand::change_to("second"));
            }
            Ok(RoomCommand::None)
        }
    }

    fn registry(updates: &Rc<Cell<u32>>) -> RoomRegistry {
        let first_updates = Rc::clone(updates);
        let second_updates = Rc::clone(updates);
        RoomRegistry::new()
            .with(RoomFactory::new("first", move |setup| {
                setup.stage_mut().add_active("hero", 8.0, 8.0);
                setup.stage_mut().add_backdrop("sky", 0.0, 0.0);
                setup.stage_mut().add_paragraph("system_counter", 0.0, 0.0, "HI");
                let mut core = RoomCore::new("first", 320, 240);
                core.set_background_color(10, 20, 30);
                Box::new(CountingRoom {
                    core,
                    updates: Rc::clone(&first_updates),
                })
            }))
            .with(RoomFactory::new("second", move |_| {
                let mut core = RoomCore::new("second", 160, 120);
                core.configure_fade_in(4, 0, Rgb::new(255, 255, 255));
                Box::new(CountingRoom {
                    core,
                    updates: Rc::clone(&second_updates),
                })
            }))
    }

    fn config(quick_boot: bool) -> LoopConfig {
        let mut bindings = BTreeMap::new();
        bindings.insert("confirm".to_string(), "KeyZ".to_string());
        LoopConfig {
            quick_boot,
            show_fps: true,
            show_room_info: true,
            input: InputConfig {
                bindings,
                ..InputConfig::default()
            },
            ..LoopConfig::default()
        }
    }

    #[test]
    fn ticks_are_no_ops_until_loading_finishes() {
        let updates = Rc::new(Cell::new(0));
        let mut runtime = Runtime::new(&config(true), registry(&updates));

        assert_eq!(runtime.tick(100.0, &KeySnapshot::empty()), TickOutcome::NotStarted);
        assert!(runtime.current_room().is_none());
        assert_eq!(updates.get(), 0);
    }

    #[test]
    fn resource_failure_keeps_runtime_unstarted() {
        let updates = Rc::new(Cell::new(0));
        let mut runtime = Runtime::new(&config(true), registry(&updates));
        let failure = ResourceInitFailure {
            failures: vec!["backdrops/sky.png".to_string()],
        };

        assert_eq!(
            runtime.finish_loading(0.0, Err(failure.clone())),
            Err(RuntimeError::ResourceInit(failure))
        );
        assert_eq!(runtime.boot_state(), BootState::Failed);
        assert_eq!(runtime.tick(500.0, &KeySnapshot::empty()), TickOutcome::NotStarted);
        assert_eq!(runtime.finish_loading(0.0, Ok(())), Err(RuntimeError::NotLoading));
    }

    #[test]
    fn empty_registry_cannot_start() {
        let mut runtime = Runtime::new(&config(true), RoomRegistry::new());

        assert_eq!(
            runtime.finish_loading(0.0, Ok(())),
            Err(RuntimeError::EmptyRegistry)
        );
    }

    #[test]
    fn quick_boot_runs_starting_room_immediately() {
        let updates = Rc::new(Cell::new(0));
        let mut runtime = Runtime::new(&config(true), registry(&updates));
        runtime.finish_loading(1000.0, Ok(())).expect("loaded");

        assert_eq!(runtime.boot_state(), BootState::Running);
        assert_eq!(runtime.current_room().map(|room| room.name()), Some("first"));
        assert_eq!(runtime.tick(1005.0, &KeySnapshot::empty()), TickOutcome::Throttled);
        assert_eq!(
            runtime.tick(1020.0, &KeySnapshot::empty()),
            TickOutcome::Ran {
                room_changed: false
            }
        );
        assert_eq!(updates.get(), 1);
    }

    #[test]
    fn boot_delay_defers_first_tick() {
        let updates = Rc::new(Cell::new(0));
        let mut runtime = Runtime::new(&config(false), registry(&updates));
        runtime.finish_loading(0.0, Ok(())).expect("loaded");

        assert_eq!(
            runtime.boot_state(),
            BootState::Booting {
                start_at_ms: 1500.0
            }
        );
        assert_eq!(runtime.tick(1000.0, &KeySnapshot::empty()), TickOutcome::NotStarted);
        assert_eq!(runtime.tick(1500.0, &KeySnapshot::empty()), TickOutcome::Throttled);
        assert_eq!(runtime.boot_state(), BootState::Running);
        assert!(matches!(
            runtime.tick(1520.0, &KeySnapshot::empty()),
            TickOutcome::Ran { .. }
        ));
    }

    #[test]
    fn configured_binding_drives_room_change() {
        let updates = Rc::new(Cell::new(0));
        let mut runtime = Runtime::new(&config(true), registry(&updates));
        runtime.finish_loading(0.0, Ok(())).expect("loaded");

        let outcome = runtime.tick(20.0, &KeySnapshot::empty().with_held("KeyZ"));

        assert_eq!(outcome, TickOutcome::Ran { room_changed: true });
        assert_eq!(runtime.current_room().map(|room| room.name()), Some("second"));
        let view = runtime.frame_view();
        assert_eq!(view.fade_color, Rgb::new(255, 255, 255));
        assert_eq!(view.overlay_opacity, 1.0);
    }

    #[test]
    fn debug_lines_show_fps_and_room_info() {
        let updates = Rc::new(Cell::new(0));
        let mut runtime = Runtime::new(&config(true), registry(&updates));
        runtime.finish_loading(0.0, Ok(())).expect("loaded");

        assert_eq!(
            runtime.debug_lines(),
            vec!["0", "first", "320 x 240", "ACTS: 1", "BAKS: 1", "TEXT: 1"]
        );
        assert_eq!(runtime.frame_view().background, Rgb::new(10, 20, 30));
    }

    #[test]
    fn metrics_publish_when_fps_window_closes() {
        let updates = Rc::new(Cell::new(0));
        let mut runtime = Runtime::new(&config(true), registry(&updates));
        runtime.finish_loading(0.0, Ok(())).expect("loaded");
        let metrics = runtime.metrics();

        for frame in 1..=60 {
            runtime.tick(f64::from(frame) * 16.7, &KeySnapshot::empty());
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fps, 60);
        assert_eq!(snapshot.total_ticks, 60);
        assert_eq!(runtime.current_fps(), 60);
    }

    #[test]
    fn swap_from_a_callback_is_flagged_on_that_tick() {
        let updates = Rc::new(Cell::new(0));
        let mut runtime = Runtime::new(&config(true), registry(&updates));
        runtime.finish_loading(0.0, Ok(())).expect("loaded");
        runtime
            .schedule_once(
                |ctx: &mut RuntimeContext, scheduler: &mut Scheduler<RuntimeContext>| {
                    ctx.rooms_mut()
                        .change_room_named(scheduler, "second", TransitionOptions::default())
                        .expect("registered");
                },
                2,
            )
            .expect("schedule");

        assert_eq!(
            runtime.tick(20.0, &KeySnapshot::empty()),
            TickOutcome::Ran {
                room_changed: false
            }
        );
        assert!(!runtime.rooms().has_changed_this_tick());

        assert_eq!(
            runtime.tick(40.0, &KeySnapshot::empty()),
            TickOutcome::Ran { room_changed: true }
        );
        assert!(runtime.rooms().has_changed_this_tick());

        assert_eq!(runtime.tick(45.0, &KeySnapshot::empty()), TickOutcome::Throttled);
        assert!(runtime.rooms().has_changed_this_tick());

        runtime.tick(60.0, &KeySnapshot::empty());
        assert!(!runtime.rooms().has_changed_this_tick());
    }

    #[test]
    fn host_callbacks_survive_room_swaps() {
        let updates = Rc::new(Cell::new(0));
        let mut runtime = Runtime::new(&config(true), registry(&updates));
        runtime.finish_loading(0.0, Ok(())).expect("loaded");
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        runtime
            .schedule_repeating(
                move |_: &mut RuntimeContext, _: &mut Scheduler<RuntimeContext>| {
                    counter.set(counter.get() + 1)
                },
                1,
            )
            .expect("schedule");

        runtime.change_room("second").expect("registered");
        runtime.tick(20.0, &KeySnapshot::empty());
        runtime.tick(40.0, &KeySnapshot::empty());

        assert_eq!(fired.get(), 2);
        assert_eq!(
            runtime.change_room("missing"),
            Err(RuntimeError::UnknownRoom {
                name: "missing".to_string()
            })
        );
    }
}
