//! Frame annotation for event payloads.
//!
//! Draws detection boxes onto a copy of the frame and encodes the result as
//! a base64 JPEG, small enough to ride along with a detection event.

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use sctv_models::RawDetection;

use crate::error::MediaResult;
use crate::frame::Frame;

/// JPEG quality used for annotated frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 70;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;

/// Copy the frame and draw one box per detection.
pub fn annotate_frame(frame: &Frame, detections: &[RawDetection]) -> MediaResult<RgbImage> {
    let mut image = frame.to_rgb_image()?;
    let (width, height) = image.dimensions();

    for detection in detections {
        let x1 = (detection.bbox.x1.max(0.0) as i32).min(width as i32 - 1);
        let y1 = (detection.bbox.y1.max(0.0) as i32).min(height as i32 - 1);
        let x2 = (detection.bbox.x2.max(0.0) as i32).min(width as i32 - 1);
        let y2 = (detection.bbox.y2.max(0.0) as i32).min(height as i32 - 1);

        for inset in 0..BOX_THICKNESS {
            let w = x2 - x1 - 2 * inset;
            let h = y2 - y1 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut image, rect, BOX_COLOR);
        }
    }

    Ok(image)
}

/// Encode an image as JPEG and return it base64-encoded.
pub fn encode_jpeg_base64(image: &RgbImage, quality: u8) -> MediaResult<String> {
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder.encode_image(image)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&buffer))
}

/// Encode a raw frame as JPEG bytes.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> MediaResult<Vec<u8>> {
    let image = frame.to_rgb_image()?;
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder.encode_image(&image)?;
    Ok(buffer)
}
