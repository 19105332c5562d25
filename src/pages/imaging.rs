//! Page image utilities: loading, quarter-turn and arbitrary rotation,
//! skew estimation and cropping.

use std::path::Path;

use image::{imageops, GrayImage, ImageResult, Luma};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use crate::core::geometry::Rect;
use crate::core::model::Rotation;

const WHITE: Luma<u8> = Luma([255]);
const BLANK: Luma<u8> = Luma([0]);
/// Pixels at or below this level count as ink.
const INK_LEVEL: u8 = 127;

/// Widest image the skew search works on; larger pages are downscaled first.
const SKEW_SEARCH_WIDTH: u32 = 600;
const SKEW_RANGE_DEGREES: f32 = 5.0;
const SKEW_STEP_DEGREES: f32 = 0.5;

pub fn load_gray(path: &Path) -> ImageResult<GrayImage> {
    Ok(image::open(path)?.to_luma8())
}

/// Clockwise quarter-turn rotation.
pub fn rotate_quarter(image: &GrayImage, rotation: Rotation) -> GrayImage {
    match rotation {
        Rotation::Deg0 => image.clone(),
        Rotation::Deg90 => imageops::rotate90(image),
        Rotation::Deg180 => imageops::rotate180(image),
        Rotation::Deg270 => imageops::rotate270(image),
    }
}

/// Rotates by `degrees` about the center, growing the canvas so no
/// content is cut off. New pixels are white.
pub fn rotate_expanded(image: &GrayImage, degrees: f32) -> GrayImage {
    if degrees.abs() < 0.01 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let radians = degrees.to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    let new_width = (width as f32 * cos + height as f32 * sin).ceil() as u32;
    let new_height = (width as f32 * sin + height as f32 * cos).ceil() as u32;

    let mut canvas = GrayImage::from_pixel(new_width.max(width), new_height.max(height), WHITE);
    let offset_x = (canvas.width() - width) / 2;
    let offset_y = (canvas.height() - height) / 2;
    imageops::replace(&mut canvas, image, offset_x as i64, offset_y as i64);

    rotate_about_center(&canvas, radians, Interpolation::Bilinear, WHITE)
}

/// Skew angle in degrees that best levels the text rows of `image`.
/// Returns 0 when no angle beats the unrotated page.
pub fn estimate_skew(image: &GrayImage) -> f32 {
    let (width, height) = image.dimensions();
    if width < 10 || height < 10 {
        return 0.0;
    }

    let sample = if width > SKEW_SEARCH_WIDTH {
        let scaled_height = (height as u64 * SKEW_SEARCH_WIDTH as u64 / width as u64).max(1) as u32;
        imageops::resize(image, SKEW_SEARCH_WIDTH, scaled_height, imageops::FilterType::Triangle)
    } else {
        image.clone()
    };
    // Ink becomes white on black so rotation fills with background.
    let sample = threshold(&sample, INK_LEVEL, ThresholdType::BinaryInverted);

    let mut best_angle = 0.0;
    let mut best_score = projection_score(&sample);

    let steps = (SKEW_RANGE_DEGREES / SKEW_STEP_DEGREES) as i32;
    for step in -steps..=steps {
        if step == 0 {
            continue;
        }
        let angle = step as f32 * SKEW_STEP_DEGREES;
        let rotated = rotate_about_center(&sample, angle.to_radians(), Interpolation::Nearest, BLANK);
        let score = projection_score(&rotated);
        if score > best_score {
            best_score = score;
            best_angle = angle;
        }
    }

    best_angle
}

/// Sharpness of the horizontal ink profile of a binarized image: sum of
/// squared differences between consecutive row counts.
fn projection_score(binary: &GrayImage) -> f64 {
    let profile: Vec<f64> = binary
        .rows()
        .map(|row| row.filter(|pixel| pixel[0] != 0).count() as f64)
        .collect();
    profile
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).powi(2))
        .sum()
}

pub fn deskew(image: &GrayImage) -> GrayImage {
    let angle = estimate_skew(image);
    rotate_expanded(image, angle)
}

/// Copies `rect`, clipped to the image, into a new image.
pub fn crop(image: &GrayImage, rect: Rect) -> Option<GrayImage> {
    let clipped = rect.clip_to(image.width(), image.height());
    if clipped.is_empty() {
        return None;
    }
    Some(
        imageops::crop_imm(
            image,
            clipped.x as u32,
            clipped.y as u32,
            clipped.width as u32,
            clipped.height as u32,
        )
        .to_image(),
    )
}
