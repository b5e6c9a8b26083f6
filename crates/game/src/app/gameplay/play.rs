use mintloop::{
    InstanceId, Rgb, Room, RoomCommand, RoomContext, RoomCore, RoomError, RoomSetup,
    TransitionOptions,
};
use tracing::debug;

use super::{DemoConfig, FONT_NAME, PLAY_ROOM, ROOM_HEIGHT, ROOM_WIDTH, TITLE_ROOM};

pub(crate) struct PlayRoom {
    core: RoomCore,
    marker: InstanceId,
    counter: InstanceId,
    speed: f32,
    repeats: u32,
}

impl PlayRoom {
    pub(crate) fn new(setup: &mut RoomSetup<'_>, config: &DemoConfig) -> Self {
        let mut core = RoomCore::new(PLAY_ROOM, ROOM_WIDTH, ROOM_HEIGHT);
        core.set_background_color(16, 48, 32);
        if config.play_fade_frames > 0 {
            core.configure_fade_in(config.play_fade_frames, 0, Rgb::BLACK);
        }

        let stage = setup.stage_mut();
        let marker = stage.add_active(
            "marker",
            ROOM_WIDTH as f32 / 2.0,
            ROOM_HEIGHT as f32 / 2.0,
        );
        let counter = stage.add_paragraph(FONT_NAME, 4.0, 4.0, &repeat_label(0));

        Self {
            core,
            marker,
            counter,
            speed: config.marker_speed,
            repeats: 0,
        }
    }
}

pub(crate) fn repeat_label(repeats: u32) -> String {
    format!("REPEATS: {repeats}")
}

fn axis(negative: bool, positive: bool) -> f32 {
    match (negative, positive) {
        (true, false) => -1.0,
        (false, true) => 1.0,
        _ => 0.0,
    }
}

impl Room for PlayRoom {
    fn core(&self) -> &RoomCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RoomCore {
        &mut self.core
    }

    fn update(&mut self, ctx: &mut RoomContext<'_>) -> Result<RoomCommand, RoomError> {
        let input = ctx.input();
        let dx = axis(input.held("left")?, input.held("right")?);
        let dy = axis(input.held("up")?, input.held("down")?);
        let confirm = input.pressed("confirm", true)?;
        let back = input.pressed("back", false)?;

        if dx != 0.0 || dy != 0.0 {
            let (width, height) = (self.core.width() as f32, self.core.height() as f32);
            if let Some(marker) = ctx.stage_mut().find_mut(self.marker) {
                marker.x = (marker.x + dx * self.speed).clamp(0.0, width);
                marker.y = (marker.y + dy * self.speed).clamp(0.0, height);
            }
        }

        if confirm {
            self.repeats += 1;
            if let Some(counter) = ctx.stage_mut().find_mut(self.counter) {
                counter.text = Some(repeat_label(self.repeats));
            }
            debug!(repeats = self.repeats, "confirm_repeated");
        }

        if back {
            return Ok(RoomCommand::change_with(
                TITLE_ROOM,
                TransitionOptions {
                    fade_music: false,
                    persist_audio: true,
                },
            ));
        }
        Ok(RoomCommand::None)
    }
}
