use mintloop::{
    CallbackHandle, InstanceId, Rgb, Room, RoomCommand, RoomContext, RoomCore, RoomError,
    RoomSetup, RuntimeContext, Scheduler, TransitionOptions,
};

use super::{DemoConfig, FONT_NAME, PLAY_ROOM, ROOM_HEIGHT, ROOM_WIDTH, TITLE_ROOM};

pub(crate) const TITLE_TEXT: &str = "MINTLOOP";
pub(crate) const PROMPT_TEXT: &str = "PRESS Z";

pub(crate) struct TitleRoom {
    core: RoomCore,
    prompt: InstanceId,
    blink_ticks: u32,
    blink: Option<CallbackHandle>,
}

impl TitleRoom {
    pub(crate) fn new(setup: &mut RoomSetup<'_>, config: &DemoConfig) -> Self {
        let mut core = RoomCore::new(TITLE_ROOM, ROOM_WIDTH, ROOM_HEIGHT);
        core.set_background_color(24, 28, 64);
        if config.title_fade_frames > 0 {
            core.configure_fade_in(config.title_fade_frames, 0, Rgb::BLACK);
            core.configure_fade_out(
                config.title_fade_frames,
                config.title_pause_frames,
                Rgb::BLACK,
            );
        }

        let stage = setup.stage_mut();
        stage.add_backdrop("title_backdrop", 0.0, 0.0);
        stage.add_paragraph(FONT_NAME, 128.0, 96.0, TITLE_TEXT);
        let prompt = stage.add_paragraph(FONT_NAME, 132.0, 140.0, PROMPT_TEXT);

        Self {
            core,
            prompt,
            blink_ticks: config.prompt_blink_ticks.max(1),
            blink: None,
        }
    }

    fn start_blinking(&mut self, ctx: &mut RoomContext<'_>) -> Result<(), RoomError> {
        let prompt = self.prompt;
        let handle = ctx.schedule_repeating(
            move |runtime: &mut RuntimeContext, _: &mut Scheduler<RuntimeContext>| {
                if let Some(instance) = runtime.rooms_mut().stage_mut().find_mut(prompt) {
                    let shown = instance.text.as_deref() == Some(PROMPT_TEXT);
                    instance.text = Some(if shown { "" } else { PROMPT_TEXT }.to_string());
                }
            },
            self.blink_ticks,
        )?;
        self.blink = Some(handle);
        Ok(())
    }
}

impl Room for TitleRoom {
    fn core(&self) -> &RoomCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RoomCore {
        &mut self.core
    }

    fn update(&mut self, ctx: &mut RoomContext<'_>) -> Result<RoomCommand, RoomError> {
        if self.blink.is_none() {
            self.start_blinking(ctx)?;
        }

        if ctx.input().pressed("confirm", false)? {
            return Ok(RoomCommand::change_with(
                PLAY_ROOM,
                TransitionOptions {
                    fade_music: true,
                    persist_audio: false,
                },
            ));
        }
        Ok(RoomCommand::None)
    }
}
