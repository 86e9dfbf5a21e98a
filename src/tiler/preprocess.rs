// Page preparation: half crop -> grayscale -> autocontrast -> margin crop

use image::{DynamicImage, GrayImage};

use super::PageHalf;
use crate::error::TileError;

/// Margin cropping mode, applied after contrast normalization and never
/// to overview-role output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropSpec {
    None,
    /// Trim background from all four sides via an inverted-bbox probe.
    AutoBbox,
    /// Crop the same percentage from every side.
    Uniform(f64),
    /// Crop per-side percentages, LTRB order.
    PerSide {
        left: f64,
        top: f64,
        right: f64,
        bottom: f64,
    },
}

/// Histogram-cutoff contrast boost. Levels map to cutoff percentages as
/// `black = 3 * dark`, `white = 3 + 9 * light`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContrastPolicy {
    pub dark: i32,
    pub light: i32,
}

impl Default for ContrastPolicy {
    fn default() -> Self {
        // Level 4: cutoff (12, 39)
        ContrastPolicy { dark: 4, light: 4 }
    }
}

impl ContrastPolicy {
    pub fn level(level: i32) -> Self {
        ContrastPolicy {
            dark: level,
            light: level,
        }
    }

    /// A matched pair of zeros disables the boost, as does an
    /// out-of-range level (only checked when dark == light, since an
    /// explicit pair is taken at face value).
    pub fn is_noop(&self) -> bool {
        if self.dark != self.light {
            return false;
        }
        self.dark == 0 || self.dark < 0 || self.dark > 8
    }

    pub fn cutoffs(&self) -> (u32, u32) {
        ((3 * self.dark) as u32, (3 + 9 * self.light) as u32)
    }
}

/// Preprocessed page buffers. `uncropped` keeps the full contrast-boosted
/// page for overview rendering; `cropped` is what segmentation sees.
pub struct PreparedPage {
    pub uncropped: GrayImage,
    pub cropped: GrayImage,
}

/// Run the preprocess stage for one pass over a page.
///
/// 1. If a half-selector is set, crop to that 50% width slice.
/// 2. Convert to single-channel intensity.
/// 3. Apply the contrast policy.
/// 4. Apply the crop spec. A half-selector forces auto-bbox, because the
///    inner edge of a split spread has no trustworthy margin.
pub fn prepare(
    raw: &DynamicImage,
    half: Option<PageHalf>,
    contrast: &ContrastPolicy,
    crop: &CropSpec,
) -> crate::error::Result<PreparedPage> {
    let mut gray = raw.to_luma8();

    if let Some(side) = half {
        gray = crop_half(&gray, side)?;
    }

    if !contrast.is_noop() {
        let (black, white) = contrast.cutoffs();
        gray = autocontrast(&gray, black, white);
    }

    let effective = if half.is_some() {
        CropSpec::AutoBbox
    } else {
        *crop
    };

    let cropped = apply_crop(&gray, &effective)?;
    if cropped.width() == 0 || cropped.height() == 0 {
        return Err(TileError::geometry("page is empty after cropping"));
    }

    Ok(PreparedPage {
        uncropped: gray,
        cropped,
    })
}

fn crop_half(img: &GrayImage, side: PageHalf) -> crate::error::Result<GrayImage> {
    let (w, h) = img.dimensions();
    if w < 2 || h == 0 {
        return Err(TileError::geometry(format!(
            "page too small to halve: {w}x{h}"
        )));
    }
    let mid = w / 2;
    let view = match side {
        PageHalf::Left => image::imageops::crop_imm(img, 0, 0, w - mid, h),
        PageHalf::Right => image::imageops::crop_imm(img, mid, 0, w - mid, h),
    };
    Ok(view.to_image())
}

fn apply_crop(img: &GrayImage, crop: &CropSpec) -> crate::error::Result<GrayImage> {
    let (w, h) = img.dimensions();
    match crop {
        CropSpec::None => Ok(img.clone()),
        CropSpec::Uniform(pct) if *pct == 0.0 => Ok(img.clone()),
        CropSpec::Uniform(pct) => crop_percent(img, *pct, *pct, *pct, *pct),
        CropSpec::PerSide {
            left,
            top,
            right,
            bottom,
        } => crop_percent(img, *left, *top, *right, *bottom),
        CropSpec::AutoBbox => {
            // Probe: invert, then a hard cutoff boost so that any residual
            // paper tint becomes true black before the bbox scan.
            let mut probe = img.clone();
            image::imageops::invert(&mut probe);
            let probe = autocontrast(&probe, 59, 40);
            match content_bbox(&probe) {
                Some((x0, y0, x1, y1)) => {
                    Ok(image::imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image())
                }
                // Entirely background: nothing to trim.
                None => Ok(img.clone()),
            }
        }
    }
    .and_then(|out| {
        if out.width() == 0 || out.height() == 0 {
            Err(TileError::geometry(format!(
                "crop left no pixels (source {w}x{h})"
            )))
        } else {
            Ok(out)
        }
    })
}

fn crop_percent(
    img: &GrayImage,
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
) -> crate::error::Result<GrayImage> {
    let (w, h) = img.dimensions();
    let x0 = (left / 100.0 * w as f64) as u32;
    let y0 = (top / 100.0 * h as f64) as u32;
    let x1 = w.saturating_sub((right / 100.0 * w as f64) as u32);
    let y1 = h.saturating_sub((bottom / 100.0 * h as f64) as u32);
    if x1 <= x0 || y1 <= y0 {
        return Err(TileError::geometry(format!(
            "margin crop ({left},{top},{right},{bottom}) consumes the whole {w}x{h} page"
        )));
    }
    Ok(image::imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image())
}

/// Bounding box of all non-zero pixels, exclusive upper bounds.
fn content_bbox(img: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = img.dimensions();
    let mut x0 = w;
    let mut y0 = h;
    let mut x1 = 0u32;
    let mut y1 = 0u32;
    let mut found = false;
    for (x, y, p) in img.enumerate_pixels() {
        if p.0[0] != 0 {
            found = true;
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x + 1);
            y1 = y1.max(y + 1);
        }
    }
    found.then_some((x0, y0, x1, y1))
}

/// Cutoff-based histogram stretch, equivalent to the usual autocontrast
/// with tone preservation on a single-channel image.
///
/// `black_cutoff` percent of the darkest and `white_cutoff` percent of
/// the lightest pixels are removed from the histogram before the
/// remaining range is stretched linearly to 0..=255. Degenerate ranges
/// leave the image untouched.
pub fn autocontrast(img: &GrayImage, black_cutoff: u32, white_cutoff: u32) -> GrayImage {
    let mut hist = [0u64; 256];
    for p in img.pixels() {
        hist[p.0[0] as usize] += 1;
    }
    let n: u64 = hist.iter().sum();
    if n == 0 {
        return img.clone();
    }

    let mut cut = n * black_cutoff as u64 / 100;
    for bin in hist.iter_mut() {
        if cut > *bin {
            cut -= *bin;
            *bin = 0;
        } else {
            *bin -= cut;
            cut = 0;
        }
        if cut == 0 {
            break;
        }
    }
    let mut cut = n * white_cutoff as u64 / 100;
    for bin in hist.iter_mut().rev() {
        if cut > *bin {
            cut -= *bin;
            *bin = 0;
        } else {
            *bin -= cut;
            cut = 0;
        }
        if cut == 0 {
            break;
        }
    }

    let lo = hist.iter().position(|&c| c > 0);
    let hi = hist.iter().rposition(|&c| c > 0);
    let (lo, hi) = match (lo, hi) {
        (Some(lo), Some(hi)) if hi > lo => (lo as f64, hi as f64),
        _ => return img.clone(),
    };

    let scale = 255.0 / (hi - lo);
    let offset = -lo * scale;
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = ((i as f64 * scale + offset) as i32).clamp(0, 255) as u8;
    }

    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = lut[p.0[0] as usize];
    }
    out
}
