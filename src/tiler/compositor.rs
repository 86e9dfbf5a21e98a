// Tile rendering: crop -> rotate -> scale -> dither -> pad onto canvas

use image::imageops::{self, FilterType};
use image::{GrayAlphaImage, GrayImage, Luma, LumaA};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use super::{GridGeometry, PixelRect, Tile};
use crate::error::TileError;

/// Binarization applied to every composed tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dither {
    /// Floyd-Steinberg error diffusion, good for photos and gradients.
    #[default]
    FloydSteinberg,
    /// 4x4 Bayer matrix, a regular grid pattern that often reads better
    /// for text.
    Ordered,
    /// Pure 50% threshold, sharpest for clean line art.
    Threshold,
    /// Keep grayscale.
    Off,
}

/// Configuration for canvas composition.
#[derive(Debug, Clone, Copy)]
pub struct CompositorConfig {
    /// Device canvas width in pixels.
    pub target_width: u32,
    /// Device canvas height in pixels.
    pub target_height: u32,
    pub dither: Dither,
    /// Canvas fill, white or black.
    pub pad_color: u8,
    /// Draw the active-segment highlight on the thumbnail strip.
    pub thumbnail_highlight: bool,
}

/// Position-indicating thumbnail of the full cropped page, rotated to
/// the device orientation, pasted into the canvas corner of every
/// segment tile.
pub struct ThumbnailStrip {
    image: GrayAlphaImage,
    /// Source-pixel -> thumbnail-pixel scale.
    scale: f64,
    /// Strip height on the canvas (the requested thumbnail width,
    /// which becomes height after rotation).
    strip: u32,
    /// Page height in thumbnail pixels (strip width after rotation).
    extent: u32,
}

const HIGHLIGHT_OPACITY: u8 = 96;

/// Build the thumbnail strip for a cropped page, or `None` when the
/// requested width is zero.
pub fn build_thumbnail(
    cropped: &GrayImage,
    thumbnail_width: u32,
    pad_color: u8,
) -> Option<ThumbnailStrip> {
    if thumbnail_width == 0 {
        return None;
    }
    let (w, h) = cropped.dimensions();
    let scale = thumbnail_width as f64 / w as f64;
    let extent = (scale * h as f64) as u32;
    if extent == 0 {
        return None;
    }

    let small = imageops::resize(cropped, thumbnail_width, extent, FilterType::Lanczos3);
    let rotated = imageops::rotate90(&small);
    let mut image = GrayAlphaImage::from_fn(rotated.width(), rotated.height(), |x, y| {
        LumaA([rotated.get_pixel(x, y).0[0], 255])
    });
    for t in 0..5u32.min(thumbnail_width) {
        draw_hollow_rect_mut(
            &mut image,
            Rect::at(t as i32, t as i32).of_size(
                extent.saturating_sub(2 * t).max(1),
                thumbnail_width.saturating_sub(2 * t).max(1),
            ),
            LumaA([pad_color, 255]),
        );
    }

    Some(ThumbnailStrip {
        image,
        scale,
        strip: thumbnail_width,
        extent,
    })
}

impl ThumbnailStrip {
    /// Flatten to grayscale, with the tile's position highlighted when
    /// requested. The page's vertical axis runs right-to-left across
    /// the rotated strip, so row offsets are measured from the right
    /// edge.
    fn render(&self, highlight: Option<(&GridGeometry, &Tile)>, pad_color: u8) -> GrayImage {
        let mut base = self.image.clone();
        if let Some((grid, tile)) = highlight {
            let p = grid.physical_col(tile.col) as i64;
            // Strides are source pixels; scale into thumbnail space.
            let right = self.extent as f64 - grid.stride_y as f64 * tile.row as f64 * self.scale;
            let left = right - grid.tile_h as f64 * self.scale;
            let top = grid.stride_x as f64 * p as f64 * self.scale;
            let bottom = self.strip as f64
                - grid.stride_x as f64 * (grid.cols as i64 - 1 - p) as f64 * self.scale;

            let mut overlay = GrayAlphaImage::from_pixel(
                base.width(),
                base.height(),
                LumaA([0, 0]),
            );
            let (l, t, r, b) = (left as i64, top as i64, right as i64, bottom as i64);
            if r > l && b > t {
                let rect = Rect::at(l as i32, t as i32).of_size((r - l) as u32, (b - t) as u32);
                draw_filled_rect_mut(&mut overlay, rect, LumaA([255, HIGHLIGHT_OPACITY]));
                for w in 0..3i32 {
                    let inset = Rect::at(l as i32 + w, t as i32 + w).of_size(
                        ((r - l) as u32).saturating_sub(2 * w as u32).max(1),
                        ((b - t) as u32).saturating_sub(2 * w as u32).max(1),
                    );
                    draw_hollow_rect_mut(&mut overlay, inset, LumaA([pad_color, 255]));
                }
            }
            alpha_over(&mut base, &overlay);
        }
        GrayImage::from_fn(base.width(), base.height(), |x, y| {
            Luma([base.get_pixel(x, y).0[0]])
        })
    }
}

/// `src` over `dst`, straight alpha.
fn alpha_over(dst: &mut GrayAlphaImage, src: &GrayAlphaImage) {
    for (d, s) in dst.pixels_mut().zip(src.pixels()) {
        let a = s.0[1] as u32;
        if a == 0 {
            continue;
        }
        let blended = (s.0[0] as u32 * a + d.0[0] as u32 * (255 - a)) / 255;
        d.0[0] = blended as u8;
    }
}

/// Render one segment tile: crop its rect, rotate clockwise, and
/// compose onto the canvas with the optional thumbnail strip.
pub fn render_segment(
    source: &GrayImage,
    tile: &Tile,
    grid: Option<&GridGeometry>,
    thumbnail: Option<&ThumbnailStrip>,
    cfg: &CompositorConfig,
) -> crate::error::Result<GrayImage> {
    let crop = crop_rect(source, &tile.rect)?;
    let rotated = imageops::rotate90(&crop);
    let thumb = thumbnail.map(|strip| {
        let highlight = if cfg.thumbnail_highlight {
            grid.map(|g| (g, tile))
        } else {
            None
        };
        strip.render(highlight, cfg.pad_color)
    });
    Ok(compose_canvas(&rotated, cfg, thumb.as_ref()))
}

/// Render a full-page spread tile, always rotated.
pub fn render_spread(cropped: &GrayImage, cfg: &CompositorConfig) -> GrayImage {
    let rotated = imageops::rotate90(cropped);
    compose_canvas(&rotated, cfg, None)
}

/// Render an overview tile from the uncropped page. Sideways mode skips
/// the rotation and asks the reader to turn the device instead.
pub fn render_overview(uncropped: &GrayImage, sideways: bool, cfg: &CompositorConfig) -> GrayImage {
    if sideways {
        compose_canvas(uncropped, cfg, None)
    } else {
        compose_canvas(&imageops::rotate90(uncropped), cfg, None)
    }
}

fn crop_rect(source: &GrayImage, rect: &PixelRect) -> crate::error::Result<GrayImage> {
    let (w, h) = source.dimensions();
    if rect.x1 > w || rect.y1 > h || rect.width() == 0 || rect.height() == 0 {
        return Err(TileError::render(format!(
            "tile rect [{},{},{},{}] outside {w}x{h} source",
            rect.x0, rect.y0, rect.x1, rect.y1
        )));
    }
    Ok(imageops::crop_imm(source, rect.x0, rect.y0, rect.width(), rect.height()).to_image())
}

/// Fit-resize onto the fixed-resolution canvas.
///
/// The image is scaled to the largest size fitting the canvas, dithered
/// per policy, and centered, except that a thumbnail pushes it to the
/// bottom edge so the strip has the canvas origin to itself.
fn compose_canvas(
    img: &GrayImage,
    cfg: &CompositorConfig,
    thumbnail: Option<&GrayImage>,
) -> GrayImage {
    let (w, h) = img.dimensions();
    let scale = (cfg.target_width as f64 / w as f64).min(cfg.target_height as f64 / h as f64);
    let new_w = ((w as f64 * scale) as u32).max(1);
    let new_h = ((h as f64 * scale) as u32).max(1);

    let mut resized = imageops::resize(img, new_w, new_h, FilterType::Lanczos3);
    binarize(&mut resized, cfg.dither);

    let mut canvas =
        GrayImage::from_pixel(cfg.target_width, cfg.target_height, Luma([cfg.pad_color]));
    let x = (cfg.target_width.saturating_sub(new_w)) / 2;
    let y = if thumbnail.is_some() {
        cfg.target_height.saturating_sub(new_h)
    } else {
        (cfg.target_height.saturating_sub(new_h)) / 2
    };
    imageops::replace(&mut canvas, &resized, x as i64, y as i64);

    if let Some(thumb) = thumbnail {
        let mut thumb = thumb.clone();
        binarize(&mut thumb, cfg.dither);
        imageops::replace(&mut canvas, &thumb, 0, 0);
    }
    canvas
}

/// Bayer 4x4 threshold matrix.
const BAYER_4X4: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

/// Reduce to pure black and white in place, per the selected mode.
pub fn binarize(img: &mut GrayImage, dither: Dither) {
    match dither {
        Dither::Off => {}
        Dither::FloydSteinberg => {
            imageops::dither(img, &imageops::BiLevel);
        }
        Dither::Threshold => {
            for p in img.pixels_mut() {
                p.0[0] = if p.0[0] >= 128 { 255 } else { 0 };
            }
        }
        Dither::Ordered => {
            for (x, y, p) in img.enumerate_pixels_mut() {
                let cell = BAYER_4X4[(y % 4) as usize][(x % 4) as usize];
                let threshold = ((cell as u16 * 2 + 1) * 255 / 32) as u8;
                p.0[0] = if p.0[0] > threshold { 255 } else { 0 };
            }
        }
    }
}
