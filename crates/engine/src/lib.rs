//! Fixed-rate 2D game loop: a throttled tick scheduler with a tick-counted
//! callback queue, a room lifecycle with fade transitions, and logical input
//! with edge detection and auto-repeat.

pub mod app;

pub use app::{
    run_app, run_app_with_metrics, AppError, AudioSink, BootState, CallbackGroup, CallbackHandle,
    Camera, CameraBounds, FadeConfig, FadeInfo, FadeKind, FrameView, InputConfig, InputError,
    InputMap, InstanceCounts, InstanceId, KeySnapshot, LoopConfig, LoopMetricsSnapshot,
    ManualTimeSource, MetricsHandle, NullAudio, RepeatTiming, ResourceInitFailure, Rgb, Room,
    RoomCommand, RoomContext, RoomCore, RoomError, RoomFactory, RoomManager, RoomRegistry,
    RoomSetup, Runtime, RuntimeContext, RuntimeError, ScheduleError, Scheduler, Stage,
    TickOutcome, TimeSource, TransitionOptions, TransitionOutcome, TransitionPhase,
    QUICK_BOOT_ENV_VAR,
};
