//! # Overlay Rendering
//!
//! Presents each captured frame with its [`Overlay`]. The camera client has
//! no window; [`PreviewWriter`] keeps an annotated copy of the latest frame on
//! disk and [`LogRenderer`] reports changes in the log.

use std::path::PathBuf;

use image::{Rgb, RgbImage};
use log::{debug, error};

use super::cache::Overlay;
use crate::recognition::{FaceRegion, UNKNOWN_LABEL};

const GRANTED: Rgb<u8> = Rgb([0, 200, 0]);
const DENIED: Rgb<u8> = Rgb([220, 0, 0]);
const LOCAL: Rgb<u8> = Rgb([0, 120, 255]);

const BOX_THICKNESS: u32 = 2;
const STATUS_BAR_HEIGHT: u32 = 8;

pub trait OverlayRenderer: Send {
    fn render(&mut self, frame: &RgbImage, overlay: &Overlay);
}

/// Logs the overlay whenever its summary changes.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last: Option<String>,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverlayRenderer for LogRenderer {
    fn render(&mut self, _frame: &RgbImage, overlay: &Overlay) {
        let summary = describe(overlay);
        if self.last.as_deref() != Some(summary.as_str()) {
            debug!("🖼️  {}", summary);
            self.last = Some(summary);
        }
    }
}

/// Saves the annotated frame to `path`, overwriting the previous one.
#[derive(Debug)]
pub struct PreviewWriter {
    path: PathBuf,
}

impl PreviewWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OverlayRenderer for PreviewWriter {
    fn render(&mut self, frame: &RgbImage, overlay: &Overlay) {
        let annotated = annotate(frame, overlay);
        if let Err(e) = annotated.save(&self.path) {
            error!("❌ Failed to write preview {}: {}", self.path.display(), e);
        }
    }
}

/// Any number of renderers, in order.
impl OverlayRenderer for Vec<Box<dyn OverlayRenderer>> {
    fn render(&mut self, frame: &RgbImage, overlay: &Overlay) {
        for renderer in self.iter_mut() {
            renderer.render(frame, overlay);
        }
    }
}

/// One-line description, e.g. `Access GRANTED: Alice, Unknown`.
pub fn describe(overlay: &Overlay) -> String {
    match overlay {
        Overlay::Server {
            results,
            access_granted,
        } => {
            let names: Vec<&str> = results.iter().map(|r| r.label.as_str()).collect();
            format!(
                "Access {}: {}",
                if *access_granted { "GRANTED" } else { "DENIED" },
                if names.is_empty() { UNKNOWN_LABEL.to_string() } else { names.join(", ") }
            )
        }
        Overlay::Local { regions } => format!("No server decision, {} face(s) in view", regions.len()),
    }
}

/// Copy of `frame` with boxes and a status bar drawn on it.
///
/// Recognised faces are green when access was granted, everything else the
/// server labelled is red; locally detected faces are blue.
pub fn annotate(frame: &RgbImage, overlay: &Overlay) -> RgbImage {
    let mut annotated = frame.clone();
    let status = match overlay {
        Overlay::Server {
            results,
            access_granted,
        } => {
            for result in results {
                let color = if *access_granted && result.label != UNKNOWN_LABEL {
                    GRANTED
                } else {
                    DENIED
                };
                draw_box(&mut annotated, &result.region, color);
            }
            if *access_granted {
                GRANTED
            } else {
                DENIED
            }
        }
        Overlay::Local { regions } => {
            for region in regions {
                draw_box(&mut annotated, region, LOCAL);
            }
            LOCAL
        }
    };
    fill_rows(&mut annotated, 0, STATUS_BAR_HEIGHT, status);
    annotated
}

/// Hollow rectangle, clipped to the image.
fn draw_box(image: &mut RgbImage, region: &FaceRegion, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    // Nothing of the box is visible
    if region.right < 0 || region.bottom < 0 || region.left >= width as i32 || region.top >= height as i32 {
        return;
    }
    let clamp_x = |x: i32| x.clamp(0, width as i32 - 1) as u32;
    let clamp_y = |y: i32| y.clamp(0, height as i32 - 1) as u32;

    let (left, right) = (clamp_x(region.left), clamp_x(region.right));
    let (top, bottom) = (clamp_y(region.top), clamp_y(region.bottom));
    if left > right || top > bottom {
        return;
    }

    for offset in 0..BOX_THICKNESS {
        for x in left..=right {
            image.put_pixel(x, (top + offset).min(bottom), color);
            image.put_pixel(x, bottom.saturating_sub(offset).max(top), color);
        }
        for y in top..=bottom {
            image.put_pixel((left + offset).min(right), y, color);
            image.put_pixel(right.saturating_sub(offset).max(left), y, color);
        }
    }
}

fn fill_rows(image: &mut RgbImage, from: u32, count: u32, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    for y in from..(from + count).min(height) {
        for x in 0..width {
            image.put_pixel(x, y, color);
        }
    }
}
