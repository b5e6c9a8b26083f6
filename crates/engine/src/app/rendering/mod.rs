mod renderer;
mod transform;

pub use renderer::Renderer;
pub use transform::{stage_to_buffer_px, BufferSize};

use super::room::Rgb;

pub const PLACEHOLDER_HALF_SIZE_PX: i32 = 2;
const PLACEHOLDER_COLOR: Rgb = Rgb::new(220, 220, 240);

/// What the draw hook needs from the active room for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameView {
    pub background: Rgb,
    pub fade_color: Rgb,
    /// 0.0 leaves the frame untouched, 1.0 paints it entirely in `fade_color`.
    pub overlay_opacity: f32,
}

impl Default for FrameView {
    fn default() -> Self {
        Self {
            background: Rgb::BLACK,
            fade_color: Rgb::BLACK,
            overlay_opacity: 0.0,
        }
    }
}

pub fn blend_overlay(base: Rgb, overlay: Rgb, opacity: f32) -> Rgb {
    let opacity = opacity.clamp(0.0, 1.0);
    let channel = |base: u8, overlay: u8| {
        let mixed = f32::from(base) + (f32::from(overlay) - f32::from(base)) * opacity;
        mixed.round().clamp(0.0, 255.0) as u8
    };
    Rgb::new(
        channel(base.r, overlay.r),
        channel(base.g, overlay.g),
        channel(base.b, overlay.b),
    )
}

/// Fills an RGBA buffer: background, placeholder markers, then the fade overlay.
pub(crate) fn paint_frame(
    frame: &mut [u8],
    size: BufferSize,
    view: &FrameView,
    markers: &[(i32, i32)],
) {
    let background = rgba(blend_overlay(view.background, view.fade_color, view.overlay_opacity));
    for chunk in frame.chunks_exact_mut(4) {
        chunk.copy_from_slice(&background);
    }

    let marker = rgba(blend_overlay(
        PLACEHOLDER_COLOR,
        view.fade_color,
        view.overlay_opacity,
    ));
    for &(center_x, center_y) in markers {
        for y in (center_y - PLACEHOLDER_HALF_SIZE_PX)..=(center_y + PLACEHOLDER_HALF_SIZE_PX) {
            for x in (center_x - PLACEHOLDER_HALF_SIZE_PX)..=(center_x + PLACEHOLDER_HALF_SIZE_PX) {
                if let Some(index) = size.pixel_index(x, y) {
                    if let Some(pixel) = frame.get_mut(index..index + 4) {
                        pixel.copy_from_slice(&marker);
                    }
                }
            }
        }
    }
}

fn rgba(color: Rgb) -> [u8; 4] {
    [color.r, color.g, color.b, 255]
}
