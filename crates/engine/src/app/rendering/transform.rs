use crate::app::stage::Camera;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSize {
    pub width: u32,
    pub height: u32,
}

impl BufferSize {
    /// Byte offset of an RGBA pixel, or `None` outside the buffer.
    pub fn pixel_index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }
}

/// Room coordinates are pixels from the room's top-left corner; the camera is
/// the top-left of the visible area.
pub fn stage_to_buffer_px(x: f32, y: f32, camera: Camera) -> (i32, i32) {
    ((x - camera.x).round() as i32, (y - camera.y).round() as i32)
}
