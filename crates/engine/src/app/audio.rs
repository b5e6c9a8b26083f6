use tracing::debug;

/// Playback collaborator the room manager silences on room swaps.
pub trait AudioSink {
    fn stop_all_sounds(&mut self);
    /// `fade_ticks` of `None` stops immediately.
    fn stop_music(&mut self, fade_ticks: Option<u32>);
}

#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn stop_all_sounds(&mut self) {
        debug!("audio_stop_all_sounds");
    }

    fn stop_music(&mut self, fade_ticks: Option<u32>) {
        debug!(fade_ticks = ?fade_ticks, "audio_stop_music");
    }
}
