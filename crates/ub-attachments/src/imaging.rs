//! Raster operations used to derive thumbnails
//!
//! All functions here are blocking; callers run them off the async executor.

use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, ImageResult, Rgba, RgbaImage};

use crate::model::ThumbnailProfile;

const MATTE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Decode an image file, guessing the format from its content
pub fn open(path: &Path) -> ImageResult<DynamicImage> {
    ImageReader::open(path)?.with_guessed_format()?.decode()
}

/// EXIF orientation tag of a file, 1 (normal) when absent or unreadable
pub fn read_exif_orientation(path: &Path) -> u32 {
    let Ok(file) = File::open(path) else {
        return 1;
    };
    let mut reader = BufReader::new(file);
    exif::Reader::new()
        .read_from_container(&mut reader)
        .ok()
        .and_then(|data| {
            data.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1)
}

/// Rotation (degrees clockwise) and horizontal/vertical flips that undo an
/// EXIF orientation. Rotation is applied before flipping.
pub fn orientation_transforms(orientation: u32) -> (Option<u16>, bool, bool) {
    match orientation {
        2 => (None, true, false),
        3 => (Some(180), false, false),
        4 => (None, false, true),
        5 => (Some(90), true, false),
        6 => (Some(90), false, false),
        7 => (Some(270), true, false),
        8 => (Some(270), false, false),
        _ => (None, false, false),
    }
}

/// Apply an EXIF orientation so the image displays upright
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    let (rotate, flip_h, flip_v) = orientation_transforms(orientation);
    if orientation != 1 {
        tracing::debug!(orientation, "Applying EXIF orientation");
    }

    let img = match rotate {
        Some(90) => img.rotate90(),
        Some(180) => img.rotate180(),
        Some(270) => img.rotate270(),
        _ => img,
    };
    let img = if flip_h { img.fliph() } else { img };
    if flip_v {
        img.flipv()
    } else {
        img
    }
}

fn fits_within(img: &DynamicImage, width: u32, height: u32) -> bool {
    let (w, h) = img.dimensions();
    w <= width && h <= height
}

fn scaled(value: u32, ratio: f64) -> u32 {
    ((value as f64 * ratio).round() as u32).max(1)
}

/// Scale to cover the box and crop the centre to it. Never upscales, so an
/// image smaller than the box in one dimension yields a smaller result.
pub fn crop_to_box(img: DynamicImage, width: u32, height: u32) -> DynamicImage {
    if fits_within(&img, width, height) {
        return img;
    }

    let (w, h) = img.dimensions();
    let ratio = f64::max(width as f64 / w as f64, height as f64 / h as f64).min(1.0);
    let img = if ratio < 1.0 {
        img.resize_exact(scaled(w, ratio), scaled(h, ratio), FilterType::Lanczos3)
    } else {
        img
    };

    let (sw, sh) = img.dimensions();
    let cw = width.min(sw);
    let ch = height.min(sh);
    img.crop_imm((sw - cw) / 2, (sh - ch) / 2, cw, ch)
}

/// Scale to fit inside the box, preserving aspect ratio. Never upscales.
pub fn fit_to_box(img: DynamicImage, width: u32, height: u32) -> DynamicImage {
    if fits_within(&img, width, height) {
        return img;
    }
    img.resize(width, height, FilterType::Lanczos3)
}

/// Centre an image smaller than the box on a white matte of the box size
pub fn inset_on_matte(img: DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w >= width && h >= height {
        return img;
    }

    let mut matte = RgbaImage::from_pixel(width, height, MATTE);
    let x = (width as i64 - w as i64) / 2;
    let y = (height as i64 - h as i64) / 2;
    imageops::overlay(&mut matte, &img.to_rgba8(), x, y);
    DynamicImage::ImageRgba8(matte)
}

/// Encode `img` to `path`, choosing the format from the extension.
/// JPEG output honours `quality`.
///
/// The image is encoded in memory and moved into place with a rename, so a
/// failed encode or write never leaves a file at `path`.
pub fn save(img: &DynamicImage, path: &Path, quality: u8) -> ImageResult<()> {
    let format = ImageFormat::from_path(path)?;
    let mut encoded = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut encoded, quality.clamp(1, 100));
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
        _ => img.write_to(&mut encoded, format)?,
    }

    let partial = partial_path(path);
    if let Err(e) = fs::write(&partial, encoded.into_inner()).and_then(|()| fs::rename(&partial, path)) {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.part", name))
}

/// Derive one thumbnail from `source` and write it to `target`
pub fn render_thumbnail(
    source: &Path,
    target: &Path,
    profile: &ThumbnailProfile,
    rotate_by_exif: bool,
) -> ImageResult<()> {
    let mut img = open(source)?;
    if rotate_by_exif {
        img = apply_orientation(img, read_exif_orientation(source));
    }

    let thumbnail = if let Some(processor) = &profile.processor {
        processor.process(img, profile)?
    } else if profile.crop {
        let cropped = crop_to_box(img, profile.width, profile.height);
        if profile.inset {
            inset_on_matte(cropped, profile.width, profile.height)
        } else {
            cropped
        }
    } else {
        fit_to_box(img, profile.width, profile.height)
    };

    save(&thumbnail, target, profile.quality)
}
