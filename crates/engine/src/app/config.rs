use std::collections::BTreeMap;
use std::env;

use serde::Deserialize;
use tracing::warn;

use super::input::{RepeatTiming, DEFAULT_REPEAT_DELAY, DEFAULT_REPEAT_WAIT_TIME};
use super::scheduler::DEFAULT_TARGET_FPS;

pub const QUICK_BOOT_ENV_VAR: &str = "MINTLOOP_QUICK_BOOT";
pub const DEFAULT_BOOT_DELAY_MS: u64 = 1500;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub repeat_wait_time: u32,
    pub repeat_delay: u32,
    /// Logical input name -> physical code (`"KeyZ"`, `"ArrowUp"`, `"Mouse0"`).
    pub bindings: BTreeMap<String, String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            repeat_wait_time: DEFAULT_REPEAT_WAIT_TIME,
            repeat_delay: DEFAULT_REPEAT_DELAY,
            bindings: BTreeMap::new(),
        }
    }
}

impl InputConfig {
    pub fn repeat_timing(&self) -> RepeatTiming {
        RepeatTiming::new(self.repeat_wait_time, self.repeat_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub window_title: String,
    pub base_width: u32,
    pub base_height: u32,
    pub screen_scale: u32,
    pub target_fps: u32,
    pub quick_boot: bool,
    pub show_fps: bool,
    pub show_room_info: bool,
    pub boot_delay_ms: u64,
    pub input: InputConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "mintloop".to_string(),
            base_width: 320,
            base_height: 240,
            screen_scale: 2,
            target_fps: DEFAULT_TARGET_FPS,
            quick_boot: false,
            show_fps: false,
            show_room_info: false,
            boot_delay_ms: DEFAULT_BOOT_DELAY_MS,
            input: InputConfig::default(),
        }
    }
}

impl LoopConfig {
    /// Clamps values a zero would break to their smallest usable setting.
    pub fn normalized(mut self) -> Self {
        self.base_width = self.base_width.max(1);
        self.base_height = self.base_height.max(1);
        self.screen_scale = self.screen_scale.max(1);
        self.target_fps = self.target_fps.max(1);
        let timing = self.input.repeat_timing();
        self.input.repeat_wait_time = timing.wait_time;
        self.input.repeat_delay = timing.delay;
        self
    }

    pub fn window_size(&self) -> (u32, u32) {
        (
            self.base_width.saturating_mul(self.screen_scale),
            self.base_height.saturating_mul(self.screen_scale),
        )
    }
}

pub fn resolve_quick_boot(config_quick_boot: bool) -> bool {
    match env::var(QUICK_BOOT_ENV_VAR) {
        Ok(value) => quick_boot_from_env_value(&value, config_quick_boot),
        Err(env::VarError::NotPresent) => config_quick_boot,
        Err(err) => {
            warn!(
                env_var = QUICK_BOOT_ENV_VAR,
                error = %err,
                "unable to read quick-boot env var; falling back to config"
            );
            config_quick_boot
        }
    }
}

fn quick_boot_from_env_value(value: &str, fallback: bool) -> bool {
    match parse_bool_flag(value) {
        Some(flag) => flag,
        None => {
            warn!(
                env_var = QUICK_BOOT_ENV_VAR,
                value, "invalid quick-boot env var value; falling back to config"
            );
            fallback
        }
    }
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
