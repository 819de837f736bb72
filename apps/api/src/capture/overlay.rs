//! Face overlay: one box and one labelled tag per detection, on a surface
//! sized to the video's native resolution.
//!
//! Rendering is a pure function of the latest detections and the frame size.
//! Nothing carries over between frames.

use image::{Rgba, RgbaImage};

use crate::capture::detector::FaceBox;

pub const STROKE_WIDTH: f32 = 3.0;
pub const STROKE_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const TAG_HEIGHT: f32 = 22.0;
pub const TAG_PADDING: f32 = 10.0;
pub const TAG_COLOR: Rgba<u8> = Rgba([0, 0, 0, 128]);
/// Approximate advance of one glyph of the 18px label font.
pub const LABEL_CHAR_WIDTH: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceMarker {
    pub outline: Rect,
    pub tag: Rect,
    pub label: String,
    /// Baseline origin of the label text inside the tag.
    pub label_origin: (f32, f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub width: u32,
    pub height: u32,
    pub markers: Vec<FaceMarker>,
}

/// Where overlays are painted. `present` replaces whatever was drawn before.
pub trait OverlaySurface: Send + Sync {
    fn present(&self, overlay: &Overlay);
    fn clear(&self);
}

/// Builds the overlay for one frame. `None` while the video size is unknown.
pub fn render_overlay(faces: &[FaceBox], video_width: u32, video_height: u32) -> Option<Overlay> {
    if video_width == 0 || video_height == 0 {
        return None;
    }

    let markers = faces
        .iter()
        .enumerate()
        .map(|(i, face)| {
            let label = format!("Face {}", i + 1);
            let text_width = label.chars().count() as f32 * LABEL_CHAR_WIDTH;
            FaceMarker {
                outline: Rect {
                    x: face.x,
                    y: face.y,
                    width: face.width,
                    height: face.height,
                },
                tag: Rect {
                    x: face.x,
                    y: face.y - TAG_HEIGHT,
                    width: text_width + TAG_PADDING,
                    height: TAG_HEIGHT,
                },
                label_origin: (face.x + 4.0, face.y - 6.0),
                label,
            }
        })
        .collect();

    Some(Overlay {
        width: video_width,
        height: video_height,
        markers,
    })
}

impl Overlay {
    /// Paints outlines and tag backgrounds onto a transparent image.
    /// Label glyphs are left to hosts with a text renderer.
    pub fn rasterize(&self) -> RgbaImage {
        let mut img = RgbaImage::new(self.width, self.height);
        for marker in &self.markers {
            fill_rect(&mut img, &marker.tag, TAG_COLOR);
            stroke_rect(&mut img, &marker.outline, STROKE_WIDTH, STROKE_COLOR);
        }
        img
    }
}

fn fill_rect(img: &mut RgbaImage, rect: &Rect, color: Rgba<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let x0 = (rect.x.floor() as i64).clamp(0, w);
    let y0 = (rect.y.floor() as i64).clamp(0, h);
    let x1 = ((rect.x + rect.width).ceil() as i64).clamp(0, w);
    let y1 = ((rect.y + rect.height).ceil() as i64).clamp(0, h);
    for y in y0..y1 {
        for x in x0..x1 {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Strokes centred on the rectangle's edges.
fn stroke_rect(img: &mut RgbaImage, rect: &Rect, line_width: f32, color: Rgba<u8>) {
    let half = line_width / 2.0;
    let (left, top) = (rect.x, rect.y);
    let (right, bottom) = (rect.x + rect.width, rect.y + rect.height);
    let edges = [
        Rect { x: left - half, y: top - half, width: rect.width + line_width, height: line_width },
        Rect { x: left - half, y: bottom - half, width: rect.width + line_width, height: line_width },
        Rect { x: left - half, y: top - half, width: line_width, height: rect.height + line_width },
        Rect { x: right - half, y: top - half, width: line_width, height: rect.height + line_width },
    ];
    for edge in &edges {
        fill_rect(img, edge, color);
    }
}
