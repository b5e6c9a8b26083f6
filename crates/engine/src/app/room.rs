use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use super::input::{InputError, InputMap};
use super::room_manager::RoomRegistry;
use super::runtime::RuntimeContext;
use super::scheduler::{CallbackGroup, CallbackHandle, ScheduleError, Scheduler};
use super::stage::Stage;

pub const FADE_LEVEL_MAX: f32 = 100.0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("no room is registered under the name {name:?}")]
    UnknownRoom { name: String },
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("room update failed: {0}")]
    Update(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Builds a color from unconstrained channel values, clamping each to 0..=255.
    pub fn clamped(r: i32, g: i32, b: i32) -> Self {
        let channel = |value: i32| value.clamp(0, 255) as u8;
        Self {
            r: channel(r),
            g: channel(g),
            b: channel(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeKind {
    FadeIn,
    FadeOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeConfig {
    pub enabled: bool,
    pub fade_frames: u32,
    pub pause_frames: u32,
    pub color: Rgb,
}

impl FadeConfig {
    pub const DISABLED: FadeConfig = FadeConfig {
        enabled: false,
        fade_frames: 1,
        pause_frames: 0,
        color: Rgb::BLACK,
    };

    pub fn new(fade_frames: u32, pause_frames: u32, color: Rgb) -> Self {
        Self {
            enabled: true,
            fade_frames: fade_frames.max(1),
            pause_frames,
            color,
        }
    }

    pub fn step_per_tick(&self) -> f32 {
        FADE_LEVEL_MAX / self.fade_frames.max(1) as f32
    }
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self::DISABLED
    }
}

/// Snapshot of a room's fade state. `level` is the progress of `kind`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeInfo {
    pub level: f32,
    pub kind: FadeKind,
    pub fade_in: FadeConfig,
    pub fade_out: FadeConfig,
}

impl FadeInfo {
    /// 0.0 is fully visible, 1.0 fully covered by the fade color.
    pub fn overlay_opacity(&self) -> f32 {
        let progress = (self.level / FADE_LEVEL_MAX).clamp(0.0, 1.0);
        match self.kind {
            FadeKind::FadeOut => progress,
            FadeKind::FadeIn => 1.0 - progress,
        }
    }

    pub fn overlay_color(&self) -> Rgb {
        match self.kind {
            FadeKind::FadeIn => self.fade_in.color,
            FadeKind::FadeOut => self.fade_out.color,
        }
    }
}

/// Properties every room carries: identity, size, clear color and fades.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomCore {
    name: String,
    width: u32,
    height: u32,
    background: Rgb,
    fade_level: f32,
    fade_kind: FadeKind,
    fade_in: FadeConfig,
    fade_out: FadeConfig,
}

impl RoomCore {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            background: Rgb::BLACK,
            fade_level: FADE_LEVEL_MAX,
            fade_kind: FadeKind::FadeIn,
            fade_in: FadeConfig::DISABLED,
            fade_out: FadeConfig::DISABLED,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background_color(&self) -> Rgb {
        self.background
    }

    pub fn set_background_color(&mut self, r: i32, g: i32, b: i32) {
        self.background = Rgb::clamped(r, g, b);
    }

    pub fn configure_fade_in(&mut self, fade_frames: u32, pause_frames: u32, color: Rgb) {
        self.fade_in = FadeConfig::new(fade_frames, pause_frames, color);
    }

    pub fn configure_fade_out(&mut self, fade_frames: u32, pause_frames: u32, color: Rgb) {
        self.fade_out = FadeConfig::new(fade_frames, pause_frames, color);
    }

    pub fn fade_info(&self) -> FadeInfo {
        FadeInfo {
            level: self.fade_level,
            kind: self.fade_kind,
            fade_in: self.fade_in,
            fade_out: self.fade_out,
        }
    }

    pub(crate) fn begin_fade(&mut self, kind: FadeKind, level: f32) {
        self.fade_kind = kind;
        self.fade_level = level.clamp(0.0, FADE_LEVEL_MAX);
    }

    pub(crate) fn advance_fade(&mut self, step: f32) {
        self.fade_level = (self.fade_level + step).min(FADE_LEVEL_MAX);
    }

    pub(crate) fn finish_fade(&mut self) {
        self.fade_level = FADE_LEVEL_MAX;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionOptions {
    pub fade_music: bool,
    pub persist_audio: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCommand {
    None,
    ChangeRoom {
        room: String,
        options: TransitionOptions,
    },
}

impl RoomCommand {
    pub fn change_to(room: impl Into<String>) -> Self {
        Self::ChangeRoom {
            room: room.into(),
            options: TransitionOptions::default(),
        }
    }

    pub fn change_with(room: impl Into<String>, options: TransitionOptions) -> Self {
        Self::ChangeRoom {
            room: room.into(),
            options,
        }
    }
}

/// What the active room sees during its per-tick update.
pub struct RoomContext<'a> {
    input: &'a InputMap,
    stage: &'a mut Stage,
    scheduler: &'a mut Scheduler<RuntimeContext>,
    group: Option<CallbackGroup>,
}

impl<'a> RoomContext<'a> {
    pub(crate) fn new(
        input: &'a InputMap,
        stage: &'a mut Stage,
        scheduler: &'a mut Scheduler<RuntimeContext>,
        group: Option<CallbackGroup>,
    ) -> Self {
        Self {
            input,
            stage,
            scheduler,
            group,
        }
    }

    pub fn input(&self) -> &InputMap {
        self.input
    }

    pub fn stage(&self) -> &Stage {
        self.stage
    }

    pub fn stage_mut(&mut self) -> &mut Stage {
        self.stage
    }

    pub fn current_fps(&self) -> u32 {
        self.scheduler.current_fps()
    }

    pub fn total_ticks(&self) -> u64 {
        self.scheduler.total_ticks()
    }

    /// Schedules a callback owned by this room; it is cancelled when the room is swapped out.
    pub fn schedule_once<F>(
        &mut self,
        callback: F,
        delay_ticks: u32,
    ) -> Result<CallbackHandle, RoomError>
    where
        F: FnMut(&mut RuntimeContext, &mut Scheduler<RuntimeContext>) + 'static,
    {
        Ok(self
            .scheduler
            .schedule_with(self.group, Box::new(callback), delay_ticks, false)?)
    }

    pub fn schedule_repeating<F>(
        &mut self,
        callback: F,
        interval_ticks: u32,
    ) -> Result<CallbackHandle, RoomError>
    where
        F: FnMut(&mut RuntimeContext, &mut Scheduler<RuntimeContext>) + 'static,
    {
        Ok(self
            .scheduler
            .schedule_with(self.group, Box::new(callback), interval_ticks, true)?)
    }

    pub fn cancel(&mut self, handle: CallbackHandle) {
        self.scheduler.cancel(handle);
    }
}

/// Handed to a room factory while the new room is being constructed.
pub struct RoomSetup<'a> {
    stage: &'a mut Stage,
    registry: &'a RoomRegistry,
    redirect: Option<RoomFactory>,
}

impl<'a> RoomSetup<'a> {
    pub(crate) fn new(stage: &'a mut Stage, registry: &'a RoomRegistry) -> Self {
        Self {
            stage,
            registry,
            redirect: None,
        }
    }

    pub fn stage_mut(&mut self) -> &mut Stage {
        self.stage
    }

    pub fn registry(&self) -> &RoomRegistry {
        self.registry
    }

    /// Replaces the room under construction with `room` before it ever becomes active.
    pub fn redirect_to(&mut self, room: &str) -> Result<(), RoomError> {
        let factory = self.registry.get(room)?;
        self.redirect = Some(factory);
        Ok(())
    }

    pub fn redirect(&mut self, factory: RoomFactory) {
        self.redirect = Some(factory);
    }

    pub(crate) fn into_redirect(self) -> Option<RoomFactory> {
        self.redirect
    }
}

pub trait Room {
    fn core(&self) -> &RoomCore;
    fn core_mut(&mut self) -> &mut RoomCore;

    fn update(&mut self, _ctx: &mut RoomContext<'_>) -> Result<RoomCommand, RoomError> {
        Ok(RoomCommand::None)
    }

    fn name(&self) -> &str {
        self.core().name()
    }

    fn width(&self) -> u32 {
        self.core().width()
    }

    fn height(&self) -> u32 {
        self.core().height()
    }

    fn background_color(&self) -> Rgb {
        self.core().background_color()
    }

    fn fade_info(&self) -> FadeInfo {
        self.core().fade_info()
    }
}

type BuildRoom = dyn Fn(&mut RoomSetup<'_>) -> Box<dyn Room>;

/// Named constructor for a room.
#[derive(Clone)]
pub struct RoomFactory {
    name: Rc<str>,
    build: Rc<BuildRoom>,
}

impl RoomFactory {
    pub fn new<F>(name: &str, build: F) -> Self
    where
        F: Fn(&mut RoomSetup<'_>) -> Box<dyn Room> + 'static,
    {
        Self {
            name: Rc::from(name),
            build: Rc::new(build),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn build(&self, setup: &mut RoomSetup<'_>) -> Box<dyn Room> {
        (self.build)(setup)
    }
}

impl fmt::Debug for RoomFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomFactory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_room_is_fully_visible_with_fades_disabled() {
        let core = RoomCore::new("title", 320, 240);
        let fade = core.fade_info();

        assert_eq!(fade.level, FADE_LEVEL_MAX);
        assert_eq!(fade.kind, FadeKind::FadeIn);
        assert!(!fade.fade_in.enabled);
        assert!(!fade.fade_out.enabled);
        assert_eq!(fade.overlay_opacity(), 0.0);
        assert_eq!(core.background_color(), Rgb::BLACK);
    }

    #[test]
    fn background_color_is_clamped() {
        let mut core = RoomCore::new("title", 320, 240);
        core.set_background_color(-20, 128, 300);

        assert_eq!(core.background_color(), Rgb::new(0, 128, 255));
    }

    #[test]
    fn fade_frames_are_at_least_one() {
        let config = FadeConfig::new(0, 4, Rgb::BLACK);

        assert!(config.enabled);
        assert_eq!(config.fade_frames, 1);
        assert_eq!(config.step_per_tick(), FADE_LEVEL_MAX);
    }

    #[test]
    fn overlay_opacity_tracks_fade_direction() {
        let mut core = RoomCore::new("title", 320, 240);
        core.configure_fade_out(10, 0, Rgb::new(255, 255, 255));

        core.begin_fade(FadeKind::FadeOut, 0.0);
        core.advance_fade(25.0);
        assert!((core.fade_info().overlay_opacity() - 0.25).abs() < f32::EPSILON);
        assert_eq!(core.fade_info().overlay_color(), Rgb::new(255, 255, 255));

        core.begin_fade(FadeKind::FadeIn, 0.0);
        core.advance_fade(25.0);
        assert!((core.fade_info().overlay_opacity() - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn fade_level_never_exceeds_max() {
        let mut core = RoomCore::new("title", 320, 240);
        core.begin_fade(FadeKind::FadeOut, 90.0);
        core.advance_fade(33.0);

        assert_eq!(core.fade_info().level, FADE_LEVEL_MAX);
    }
}
