use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::stage::Stage;

use super::{paint_frame, stage_to_buffer_px, BufferSize, FrameView};

/// Draws into a buffer at the room's base resolution and lets `pixels`
/// scale it onto the window surface.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    buffer: BufferSize,
    markers: Vec<(i32, i32)>,
}

impl Renderer {
    pub fn new(window: Arc<Window>, base_width: u32, base_height: u32) -> Result<Self, Error> {
        let buffer = BufferSize {
            width: base_width.max(1),
            height: base_height.max(1),
        };
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height, buffer)?;
        Ok(Self {
            window,
            pixels,
            buffer,
            markers: Vec::new(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height, self.buffer)?;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
        buffer: BufferSize,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(buffer.width, buffer.height, surface)
    }

    pub fn draw(&mut self, view: &FrameView, stage: &Stage) -> Result<(), Error> {
        let camera = stage.camera();
        self.markers.clear();
        self.markers.extend(
            stage
                .main_draw_order()
                .iter()
                .filter_map(|id| stage.find(*id))
                .map(|instance| stage_to_buffer_px(instance.x, instance.y, camera)),
        );

        paint_frame(self.pixels.frame_mut(), self.buffer, view, &self.markers);
        self.pixels.render()
    }
}
