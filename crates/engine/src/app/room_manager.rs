use tracing::{debug, error, info, warn};

use super::audio::{AudioSink, NullAudio};
use super::input::InputMap;
use super::room::{
    FadeConfig, FadeKind, Room, RoomCommand, RoomContext, RoomError, RoomFactory, RoomSetup,
    TransitionOptions, FADE_LEVEL_MAX,
};
use super::runtime::RuntimeContext;
use super::scheduler::{CallbackGroup, CallbackHandle, ScheduleError, Scheduler};
use super::stage::Stage;

/// Upper bound on constructor redirects followed by a single swap.
pub const MAX_ROOM_REDIRECTS: usize = 16;

/// Ordered set of named room constructors. The first registration is the starting room.
#[derive(Debug, Clone, Default)]
pub struct RoomRegistry {
    factories: Vec<RoomFactory>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering an existing name replaces its factory in place.
    pub fn register(&mut self, factory: RoomFactory) {
        match self
            .factories
            .iter_mut()
            .find(|existing| existing.name() == factory.name())
        {
            Some(existing) => *existing = factory,
            None => self.factories.push(factory),
        }
    }

    pub fn with(mut self, factory: RoomFactory) -> Self {
        self.register(factory);
        self
    }

    pub fn get(&self, name: &str) -> Result<RoomFactory, RoomError> {
        self.factories
            .iter()
            .find(|factory| factory.name() == name)
            .cloned()
            .ok_or_else(|| RoomError::UnknownRoom {
                name: name.to_string(),
            })
    }

    pub fn starting_room(&self) -> Option<RoomFactory> {
        self.factories.first().cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(RoomFactory::name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    FadingOut,
    Swapping,
    FadingIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The new room was installed synchronously.
    Swapped,
    /// A fade-out is running; the swap is queued on the scheduler.
    FadingOut,
    /// Another transition was already in progress. Nothing changed.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
struct ActiveFade {
    kind: FadeKind,
    step: CallbackHandle,
    done: CallbackHandle,
}

pub struct RoomManager {
    registry: RoomRegistry,
    active: Option<Box<dyn Room>>,
    active_group: Option<CallbackGroup>,
    next_group: u64,
    stage: Stage,
    audio: Box<dyn AudioSink>,
    is_changing: bool,
    changed_this_tick: bool,
    fade: Option<ActiveFade>,
    phase: TransitionPhase,
    rooms_installed: u64,
}

impl RoomManager {
    pub fn new(registry: RoomRegistry) -> Self {
        Self::with_audio(registry, Box::new(NullAudio))
    }

    pub fn with_audio(registry: RoomRegistry, audio: Box<dyn AudioSink>) -> Self {
        Self {
            registry,
            active: None,
            active_group: None,
            next_group: 0,
            stage: Stage::default(),
            audio,
            is_changing: false,
            changed_this_tick: false,
            fade: None,
            phase: TransitionPhase::Idle,
            rooms_installed: 0,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// `None` only before the first room has been installed.
    pub fn current_room(&self) -> Option<&dyn Room> {
        self.active.as_deref()
    }

    pub fn is_changing(&self) -> bool {
        self.is_changing
    }

    /// True from the install of a room until the next fired tick begins.
    pub fn has_changed_this_tick(&self) -> bool {
        self.changed_this_tick
    }

    /// Called once per fired tick, before the scheduler's callback pass.
    pub(crate) fn begin_tick(&mut self) {
        self.changed_this_tick = false;
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    pub fn active_group(&self) -> Option<CallbackGroup> {
        self.active_group
    }

    pub fn rooms_installed(&self) -> u64 {
        self.rooms_installed
    }

    pub fn change_room_named(
        &mut self,
        scheduler: &mut Scheduler<RuntimeContext>,
        name: &str,
        options: TransitionOptions,
    ) -> Result<TransitionOutcome, RoomError> {
        let factory = self.registry.get(name)?;
        Ok(self.change_room(scheduler, factory, options))
    }

    pub fn change_room(
        &mut self,
        scheduler: &mut Scheduler<RuntimeContext>,
        factory: RoomFactory,
        options: TransitionOptions,
    ) -> TransitionOutcome {
        if self.is_changing {
            warn!(
                requested = factory.name(),
                phase = ?self.phase,
                "transition_ignored"
            );
            return TransitionOutcome::Ignored;
        }
        self.is_changing = true;

        let fade_out = self
            .active
            .as_ref()
            .map(|room| room.fade_info().fade_out)
            .filter(|config| config.enabled);

        let Some(config) = fade_out else {
            self.perform_swap(scheduler, factory, options);
            return TransitionOutcome::Swapped;
        };

        match self.begin_fade_out(scheduler, config, factory.clone(), options) {
            Ok(()) => TransitionOutcome::FadingOut,
            Err(source) => {
                error!(error = %source, "fade_out_schedule_failed");
                self.cancel_fade(scheduler);
                self.perform_swap(scheduler, factory, options);
                TransitionOutcome::Swapped
            }
        }
    }

    /// Runs the active room for one tick and applies the command it returns.
    pub fn update(&mut self, input: &InputMap, scheduler: &mut Scheduler<RuntimeContext>) {
        let Some(room) = self.active.as_mut() else {
            return;
        };
        let mut ctx = RoomContext::new(input, &mut self.stage, scheduler, self.active_group);
        let command = match room.update(&mut ctx) {
            Ok(command) => command,
            Err(source) => {
                error!(room = room.name(), error = %source, "room_update_failed");
                RoomCommand::None
            }
        };

        if let RoomCommand::ChangeRoom { room, options } = command {
            if let Err(source) = self.change_room_named(scheduler, &room, options) {
                error!(requested = room.as_str(), error = %source, "room_change_failed");
            }
        }
    }

    fn begin_fade_out(
        &mut self,
        scheduler: &mut Scheduler<RuntimeContext>,
        config: FadeConfig,
        factory: RoomFactory,
        options: TransitionOptions,
    ) -> Result<(), ScheduleError> {
        let start_level = self
            .active
            .as_ref()
            .map(|room| room.fade_info())
            .filter(|fade| fade.kind == FadeKind::FadeIn && fade.level < FADE_LEVEL_MAX)
            .map_or(0.0, |fade| FADE_LEVEL_MAX - fade.level);
        self.cancel_fade(scheduler);

        let fade_ticks = remaining_fade_ticks(config.fade_frames, start_level);
        if let Some(room) = self.active.as_mut() {
            room.core_mut().begin_fade(FadeKind::FadeOut, start_level);
        }
        if options.fade_music {
            self.audio.stop_music(Some(fade_ticks));
        }

        let step = config.step_per_tick();
        let step_handle = scheduler.schedule_repeating(
            move |ctx: &mut RuntimeContext, _: &mut Scheduler<RuntimeContext>| {
                ctx.rooms.advance_fade(step)
            },
            1,
        )?;
        let done_handle = scheduler.schedule_once(
            |ctx: &mut RuntimeContext, scheduler: &mut Scheduler<RuntimeContext>| {
                ctx.rooms.finish_fade(scheduler)
            },
            fade_ticks,
        )?;
        self.fade = Some(ActiveFade {
            kind: FadeKind::FadeOut,
            step: step_handle,
            done: done_handle,
        });

        scheduler.schedule_once(
            move |ctx: &mut RuntimeContext, scheduler: &mut Scheduler<RuntimeContext>| {
                ctx.rooms
                    .perform_swap(scheduler, factory.clone(), options)
            },
            fade_ticks.saturating_add(config.pause_frames),
        )?;

        self.phase = TransitionPhase::FadingOut;
        debug!(
            fade_ticks,
            pause_frames = config.pause_frames,
            start_level,
            "fade_out_started"
        );
        Ok(())
    }

    fn begin_fade_in(
        &mut self,
        scheduler: &mut Scheduler<RuntimeContext>,
        config: FadeConfig,
        group: CallbackGroup,
    ) -> Result<(), ScheduleError> {
        if let Some(room) = self.active.as_mut() {
            room.core_mut().begin_fade(FadeKind::FadeIn, 0.0);
        }

        let step = config.step_per_tick();
        let step_handle = scheduler.schedule_repeating_in(
            group,
            move |ctx: &mut RuntimeContext, _: &mut Scheduler<RuntimeContext>| {
                ctx.rooms.advance_fade(step)
            },
            1,
        )?;
        let done_handle = scheduler.schedule_once_in(
            group,
            |ctx: &mut RuntimeContext, scheduler: &mut Scheduler<RuntimeContext>| {
                ctx.rooms.finish_fade(scheduler)
            },
            config.fade_frames,
        )?;
        self.fade = Some(ActiveFade {
            kind: FadeKind::FadeIn,
            step: step_handle,
            done: done_handle,
        });
        self.phase = TransitionPhase::FadingIn;
        Ok(())
    }

    fn advance_fade(&mut self, step: f32) {
        if let Some(room) = self.active.as_mut() {
            room.core_mut().advance_fade(step);
        }
    }

    fn finish_fade(&mut self, scheduler: &mut Scheduler<RuntimeContext>) {
        let Some(fade) = self.fade.take() else {
            return;
        };
        scheduler.cancel(fade.step);
        if let Some(room) = self.active.as_mut() {
            room.core_mut().finish_fade();
        }
        // A finished fade-out stays in FadingOut through its pause frames.
        if fade.kind == FadeKind::FadeIn {
            self.phase = TransitionPhase::Idle;
        }
    }

    fn cancel_fade(&mut self, scheduler: &mut Scheduler<RuntimeContext>) {
        if let Some(fade) = self.fade.take() {
            scheduler.cancel(fade.step);
            scheduler.cancel(fade.done);
        }
    }

    fn perform_swap(
        &mut self,
        scheduler: &mut Scheduler<RuntimeContext>,
        factory: RoomFactory,
        options: TransitionOptions,
    ) {
        self.phase = TransitionPhase::Swapping;
        self.reset_for_swap(scheduler, options);
        self.is_changing = false;

        let room = self.build_room(factory);
        self.install(scheduler, room);
    }

    fn reset_for_swap(
        &mut self,
        scheduler: &mut Scheduler<RuntimeContext>,
        options: TransitionOptions,
    ) {
        self.stage.clear();
        if !options.persist_audio {
            self.audio.stop_all_sounds();
            self.audio.stop_music(None);
        }
        self.cancel_fade(scheduler);
        if let Some(group) = self.active_group.take() {
            let cancelled = scheduler.cancel_group(group);
            debug!(group = group.0, cancelled, "room_callbacks_cancelled");
        }
    }

    /// Builds `factory`'s room, following constructor redirects so only the last
    /// room in the chain survives.
    fn build_room(&mut self, mut factory: RoomFactory) -> Box<dyn Room> {
        let mut redirects = 0;
        loop {
            let mut setup = RoomSetup::new(&mut self.stage, &self.registry);
            let room = factory.build(&mut setup);
            let Some(next) = setup.into_redirect() else {
                return room;
            };
            if redirects >= MAX_ROOM_REDIRECTS {
                error!(
                    room = room.name(),
                    redirects, "room_redirect_limit_reached"
                );
                return room;
            }
            redirects += 1;
            debug!(from = room.name(), to = next.name(), "room_redirected");
            drop(room);
            self.stage.clear();
            factory = next;
        }
    }

    fn install(&mut self, scheduler: &mut Scheduler<RuntimeContext>, room: Box<dyn Room>) {
        let group = CallbackGroup(self.next_group);
        self.next_group = self.next_group.saturating_add(1);
        self.active_group = Some(group);
        self.changed_this_tick = true;
        self.rooms_installed = self.rooms_installed.saturating_add(1);

        info!(
            room = room.name(),
            width = room.width(),
            height = room.height(),
            "room_changed"
        );
        let fade_in = room.fade_info().fade_in;
        self.active = Some(room);

        self.phase = TransitionPhase::Idle;
        if fade_in.enabled {
            if let Err(source) = self.begin_fade_in(scheduler, fade_in, group) {
                error!(error = %source, "fade_in_schedule_failed");
                self.cancel_fade(scheduler);
                if let Some(room) = self.active.as_mut() {
                    room.core_mut().finish_fade();
                }
                self.phase = TransitionPhase::Idle;
            }
        }
    }
}

fn remaining_fade_ticks(fade_frames: u32, start_level: f32) -> u32 {
    let fade_frames = fade_frames.max(1);
    if start_level <= 0.0 {
        return fade_frames;
    }
    let remaining = f64::from(fade_frames) * f64::from(FADE_LEVEL_MAX - start_level)
        / f64::from(FADE_LEVEL_MAX);
    (remaining.ceil() as u32).max(1)
}
