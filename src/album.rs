//! Album page compositing.
//!
//! Lays every successful thumbnail out on one fixed-size page, landscape
//! row on top, portrait row below, each drawn like a tilted photo print
//! with a white border and a soft drop shadow. The tilt is sampled per
//! image, so two compositions of the same inputs are intentionally not
//! byte-identical; only the layout geometry is deterministic.

use futures_util::future::try_join_all;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgba, RgbaImage};
use rand::Rng;
use tracing::info;

use crate::generation::types::{AspectRatio, decode_data_uri};

pub const CANVAS_WIDTH: u32 = 3300;
pub const CANVAS_HEIGHT: u32 = 2550;

const PADDING: f64 = 150.0;
const HEADER_HEIGHT: f64 = 300.0;
const ROW_GAP: f64 = 100.0;
const BORDER: f64 = 15.0;
const SHADOW_OFFSET: f64 = 10.0;
const SHADOW_BLUR: f64 = 40.0;
const SHADOW_ALPHA: f64 = 0.5;
/// Maximum print tilt, in radians (about 2.3 degrees either way).
const MAX_TILT: f64 = 0.04;
const JPEG_QUALITY: u8 = 92;
const BACKGROUND: Rgba<u8> = Rgba([26, 26, 26, 255]);

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("no images to compose")]
    Empty,

    #[error("failed to decode album image {index}: {cause}")]
    Decode { index: usize, cause: String },

    #[error("failed to encode album page: {0}")]
    Encode(String),

    #[error("compositing task failed: {0}")]
    Task(String),
}

/// One successful thumbnail handed over for compositing.
#[derive(Debug, Clone)]
pub struct AlbumImage {
    pub data_uri: String,
    pub aspect_ratio: AspectRatio,
}

/// Axis-aligned slot an image is laid out into, before its tilt is
/// applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Placement {
    pub fn overlaps(&self, other: &Placement) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Computed page geometry for one compose call. Ephemeral; never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub landscape: Vec<Placement>,
    pub portrait: Vec<Placement>,
}

/// Two-row grid: the landscape row fills 90% of the content width split
/// evenly, the portrait row sizes each print to 90% of the row height and
/// centers the group. Every slot is forced to its nominal ratio no matter
/// what shape the model actually returned.
pub fn compute_layout(landscape_count: usize, portrait_count: usize) -> AlbumLayout {
    let content_width = CANVAS_WIDTH as f64 - 2.0 * PADDING;
    let content_height = CANVAS_HEIGHT as f64 - HEADER_HEIGHT - PADDING;
    let row_height = (content_height - ROW_GAP) / 2.0;

    let mut landscape = Vec::with_capacity(landscape_count);
    if landscape_count > 0 {
        let total_width = content_width * 0.9;
        let width = total_width / landscape_count as f64;
        let height = width * 9.0 / 16.0;
        let start_x = (CANVAS_WIDTH as f64 - total_width) / 2.0;
        let y = HEADER_HEIGHT + (row_height - height) / 2.0;
        for index in 0..landscape_count {
            landscape.push(Placement {
                x: start_x + index as f64 * width,
                y,
                width,
                height,
            });
        }
    }

    let mut portrait = Vec::with_capacity(portrait_count);
    if portrait_count > 0 {
        let height = row_height * 0.9;
        let width = height * 9.0 / 16.0;
        let group_width = width * portrait_count as f64;
        let start_x = (CANVAS_WIDTH as f64 - group_width) / 2.0;
        let y = HEADER_HEIGHT + row_height + ROW_GAP + (row_height - height) / 2.0;
        for index in 0..portrait_count {
            portrait.push(Placement {
                x: start_x + index as f64 * width,
                y,
                width,
                height,
            });
        }
    }

    AlbumLayout {
        canvas_width: CANVAS_WIDTH,
        canvas_height: CANVAS_HEIGHT,
        landscape,
        portrait,
    }
}

pub struct AlbumCompositor;

impl AlbumCompositor {
    pub fn new() -> Self {
        Self
    }

    /// Compose all given images onto one page and return it as JPEG bytes.
    ///
    /// Decoding runs concurrently; a single undecodable image aborts the
    /// whole page rather than producing a partial album.
    pub async fn compose(&self, images: Vec<AlbumImage>) -> Result<Vec<u8>, ComposeError> {
        if images.is_empty() {
            return Err(ComposeError::Empty);
        }

        // Landscape group first, portrait second, relative order preserved
        // within each group.
        let (landscape, portrait): (Vec<AlbumImage>, Vec<AlbumImage>) = images
            .into_iter()
            .partition(|image| image.aspect_ratio == AspectRatio::Landscape);
        let landscape_count = landscape.len();

        let decode_tasks = landscape
            .into_iter()
            .chain(portrait)
            .enumerate()
            .map(|(index, image)| {
                tokio::task::spawn_blocking(move || decode_album_image(index, &image))
            });

        let mut decoded = try_join_all(decode_tasks)
            .await
            .map_err(|e| ComposeError::Task(e.to_string()))?
            .into_iter()
            .collect::<Result<Vec<RgbaImage>, ComposeError>>()?;

        let portrait_images = decoded.split_off(landscape_count);
        let landscape_images = decoded;
        info!(
            landscape = landscape_images.len(),
            portrait = portrait_images.len(),
            "composing album page"
        );

        tokio::task::spawn_blocking(move || render_page(&landscape_images, &portrait_images))
            .await
            .map_err(|e| ComposeError::Task(e.to_string()))?
    }
}

impl Default for AlbumCompositor {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_album_image(index: usize, image: &AlbumImage) -> Result<RgbaImage, ComposeError> {
    let bytes = decode_data_uri(&image.data_uri).map_err(|e| ComposeError::Decode {
        index,
        cause: e.to_string(),
    })?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| ComposeError::Decode {
        index,
        cause: e.to_string(),
    })?;
    Ok(decoded.to_rgba8())
}

fn render_page(landscape: &[RgbaImage], portrait: &[RgbaImage]) -> Result<Vec<u8>, ComposeError> {
    let layout = compute_layout(landscape.len(), portrait.len());
    let mut canvas: RgbaImage =
        ImageBuffer::from_pixel(layout.canvas_width, layout.canvas_height, BACKGROUND);

    let mut rng = rand::thread_rng();
    for (image, placement) in landscape.iter().zip(&layout.landscape) {
        let tilt = rng.gen_range(-MAX_TILT..MAX_TILT);
        draw_tilted_print(&mut canvas, image, placement, tilt);
    }
    for (image, placement) in portrait.iter().zip(&layout.portrait) {
        let tilt = rng.gen_range(-MAX_TILT..MAX_TILT);
        draw_tilted_print(&mut canvas, image, placement, tilt);
    }

    let rgb = image::DynamicImage::ImageRgba8(canvas).to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| ComposeError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Draw one image into its slot, tilted by `angle`, with a white print
/// border and a soft shadow offset to the lower right. The shadow sits
/// under the border rectangle; the image itself is drawn on top of both.
///
/// Rendered by inverse mapping: every destination pixel inside a
/// conservative bounding box is rotated back into print space and
/// classified as image, border, shadow, or untouched background.
fn draw_tilted_print(canvas: &mut RgbaImage, source: &RgbaImage, placement: &Placement, angle: f64) {
    let center_x = placement.x + placement.width / 2.0;
    let center_y = placement.y + placement.height / 2.0;
    let half_w = placement.width / 2.0;
    let half_h = placement.height / 2.0;
    let border_half_w = half_w + BORDER;
    let border_half_h = half_h + BORDER;

    let (sin, cos) = angle.sin_cos();
    let reach =
        (border_half_w.powi(2) + border_half_h.powi(2)).sqrt() + SHADOW_OFFSET + SHADOW_BLUR;

    let min_x = ((center_x - reach).floor().max(0.0)) as u32;
    let max_x = ((center_x + reach).ceil().min(canvas.width() as f64 - 1.0)) as u32;
    let min_y = ((center_y - reach).floor().max(0.0)) as u32;
    let max_y = ((center_y + reach).ceil().min(canvas.height() as f64 - 1.0)) as u32;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f64 + 0.5 - center_x;
            let dy = y as f64 + 0.5 - center_y;

            // Back-rotate into the print's local frame.
            let u = dx * cos + dy * sin;
            let v = -dx * sin + dy * cos;

            if u.abs() <= half_w && v.abs() <= half_h {
                let sample_x = (u + half_w) / placement.width * source.width() as f64;
                let sample_y = (v + half_h) / placement.height * source.height() as f64;
                canvas.put_pixel(x, y, sample_bilinear(source, sample_x, sample_y));
            } else if u.abs() <= border_half_w && v.abs() <= border_half_h {
                canvas.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            } else {
                // Shadow of the border rectangle, displaced before
                // back-rotation so it always falls to the lower right.
                let sdx = dx - SHADOW_OFFSET;
                let sdy = dy - SHADOW_OFFSET;
                let su = sdx * cos + sdy * sin;
                let sv = -sdx * sin + sdy * cos;
                let outside_x = (su.abs() - border_half_w).max(0.0);
                let outside_y = (sv.abs() - border_half_h).max(0.0);
                let distance = (outside_x.powi(2) + outside_y.powi(2)).sqrt();
                if distance < SHADOW_BLUR {
                    let alpha = SHADOW_ALPHA * (1.0 - distance / SHADOW_BLUR);
                    let shadow = Rgba([0, 0, 0, (alpha * 255.0) as u8]);
                    let pixel = canvas.get_pixel_mut(x, y);
                    blend_pixel(pixel, &shadow);
                }
            }
        }
    }
}

fn sample_bilinear(image: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let max_x = (image.width() - 1) as f64;
    let max_y = (image.height() - 1) as f64;
    let x = (x - 0.5).clamp(0.0, max_x);
    let y = (y - 0.5).clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = image.get_pixel(x0, y0);
    let p10 = image.get_pixel(x1, y0);
    let p01 = image.get_pixel(x0, y1);
    let p11 = image.get_pixel(x1, y1);

    let mut result = [0u8; 4];
    for channel in 0..4 {
        let top = p00[channel] as f64 * (1.0 - fx) + p10[channel] as f64 * fx;
        let bottom = p01[channel] as f64 * (1.0 - fx) + p11[channel] as f64 * fx;
        result[channel] = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
    Rgba(result)
}

fn blend_pixel(base: &mut Rgba<u8>, overlay: &Rgba<u8>) {
    let alpha = overlay[3] as f64 / 255.0;
    if alpha <= 0.0 {
        return;
    }
    let inv_alpha = 1.0 - alpha;
    for channel in 0..3 {
        base[channel] =
            (overlay[channel] as f64 * alpha + base[channel] as f64 * inv_alpha).round() as u8;
    }
    base[3] = 255;
}
