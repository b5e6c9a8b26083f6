use std::collections::BTreeMap;

use mintloop::{Room, RoomCore, RoomFactory, RoomRegistry};
use serde::Deserialize;
use tracing::error;

mod play;
mod title;

pub(crate) use play::PlayRoom;
pub(crate) use title::TitleRoom;

pub(crate) const TITLE_ROOM: &str = "title";
pub(crate) const REDIRECT_ROOM: &str = "redirect";
pub(crate) const PLAY_ROOM: &str = "play";

pub(crate) const ROOM_WIDTH: u32 = 320;
pub(crate) const ROOM_HEIGHT: u32 = 240;
pub(crate) const FONT_NAME: &str = "system_counter";

/// Tunables for the demo rooms, read from the `demo` section of the config file.
/// A fade length of zero disables that fade.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct DemoConfig {
    pub(crate) marker_speed: f32,
    pub(crate) title_fade_frames: u32,
    pub(crate) title_pause_frames: u32,
    pub(crate) play_fade_frames: u32,
    pub(crate) prompt_blink_ticks: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            marker_speed: 2.0,
            title_fade_frames: 30,
            title_pause_frames: 10,
            play_fade_frames: 15,
            prompt_blink_ticks: 30,
        }
    }
}

pub(crate) fn default_bindings() -> BTreeMap<String, String> {
    [
        ("confirm", "KeyZ"),
        ("back", "KeyX"),
        ("up", "ArrowUp"),
        ("down", "ArrowDown"),
        ("left", "ArrowLeft"),
        ("right", "ArrowRight"),
    ]
    .into_iter()
    .map(|(name, code)| (name.to_string(), code.to_string()))
    .collect()
}

/// Title first: it is the starting room.
pub(crate) fn build_registry(config: &DemoConfig) -> RoomRegistry {
    let title_config = config.clone();
    let play_config = config.clone();
    RoomRegistry::new()
        .with(RoomFactory::new(TITLE_ROOM, move |setup| {
            Box::new(TitleRoom::new(setup, &title_config))
        }))
        .with(RoomFactory::new(REDIRECT_ROOM, |setup| {
            if let Err(error) = setup.redirect_to(PLAY_ROOM) {
                error!(error = %error, "redirect_target_missing");
            }
            Box::new(RedirectRoom {
                core: RoomCore::new(REDIRECT_ROOM, ROOM_WIDTH, ROOM_HEIGHT),
            })
        }))
        .with(RoomFactory::new(PLAY_ROOM, move |setup| {
            Box::new(PlayRoom::new(setup, &play_config))
        }))
}

/// Never becomes active; its constructor forwards to the play room.
struct RedirectRoom {
    core: RoomCore,
}

impl Room for RedirectRoom {
    fn core(&self) -> &RoomCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RoomCore {
        &mut self.core
    }
}
