mod audio;
mod config;
mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod room;
mod room_manager;
mod runtime;
mod scheduler;
mod stage;

pub use audio::{AudioSink, NullAudio};
pub use config::{
    parse_bool_flag, resolve_quick_boot, InputConfig, LoopConfig, DEFAULT_BOOT_DELAY_MS,
    QUICK_BOOT_ENV_VAR,
};
pub use input::{
    BindingState, InputBinding, InputError, InputMap, KeySnapshot, KeyState, RepeatTiming,
    DEFAULT_REPEAT_DELAY, DEFAULT_REPEAT_WAIT_TIME,
};
pub use loop_runner::{run_app, run_app_with_metrics, AppError};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle, FPS_WINDOW_MS};
pub use rendering::{
    blend_overlay, stage_to_buffer_px, BufferSize, FrameView, Renderer, PLACEHOLDER_HALF_SIZE_PX,
};
pub use room::{
    FadeConfig, FadeInfo, FadeKind, Rgb, Room, RoomCommand, RoomContext, RoomCore, RoomError,
    RoomFactory, RoomSetup, TransitionOptions, FADE_LEVEL_MAX,
};
pub use room_manager::{
    RoomManager, RoomRegistry, TransitionOutcome, TransitionPhase, MAX_ROOM_REDIRECTS,
};
pub use runtime::{
    BootState, ResourceInitFailure, Runtime, RuntimeContext, RuntimeError, TickOutcome,
};
pub use scheduler::{
    Callback, CallbackGroup, CallbackHandle, FrameTick, InstantTimeSource, ManualTimeSource,
    ScheduleError, Scheduler, TimeSource, DEFAULT_TARGET_FPS,
};
pub use stage::{
    Camera, CameraBounds, Instance, InstanceCounts, InstanceId, InstanceIdAllocator, InstanceKind,
    Stage, TilemapRef,
};
