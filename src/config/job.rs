use serde::Deserialize;

use crate::error::TileError;
use crate::tiler::compositor::Dither;
use crate::tiler::overrides::SpecialSplit;
use crate::tiler::planner::MAX_V_SEGMENTS;
use crate::tiler::preprocess::{ContrastPolicy, CropSpec};

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub jobs: Vec<Job>,
}

/// One tiling job. Every field except `input`/`output` is optional and
/// falls back to [`Settings`](super::settings::Settings).
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    /// Directory of decoded page images, sorted by filename.
    pub input: String,
    /// Directory receiving the rendered tiles.
    pub output: String,

    pub manga: Option<bool>,
    pub dither: Option<String>,
    pub pad_black: Option<bool>,
    /// "auto", a single percentage, or "left,top,right,bottom".
    pub margin: Option<String>,
    /// A level 0-8, or "dark,light".
    pub contrast: Option<String>,

    /// Activate overlap segmentation with default counts.
    pub overlap: Option<bool>,
    pub hsplit_count: Option<u32>,
    pub hsplit_overlap: Option<f64>,
    pub hsplit_max_width: Option<u32>,
    pub vsplit_target: Option<u32>,
    pub vsplit_min_overlap: Option<f64>,

    pub thumbnail_width: Option<u32>,
    pub thumbnail_highlight: Option<bool>,

    pub include_overviews: Option<bool>,
    pub sideways_overviews: Option<bool>,
    pub select_overviews: Option<String>,

    /// "all" or a page list.
    pub split_spreads: Option<String>,
    pub split_all: Option<bool>,
    pub dont_split: Option<String>,

    pub skip: Option<String>,
    pub only: Option<String>,
    pub start: Option<u32>,
    pub stop: Option<u32>,

    /// Specifiers `page-h-v[-mask][-overlap]`, e.g. `121-2-4-01010111-50`.
    pub special_split: Option<Vec<String>>,
    /// Specifiers `page-dark-light`, e.g. `121-5-2`.
    pub special_contrast: Option<Vec<String>>,

    pub write_report: Option<bool>,
}

/// Parse a page list string into page numbers.
///
/// Accepts single pages, ranges, and comma-separated mixes:
/// `"5"`, `"5-10"`, `"1, 3, 5-10, 15"`. Result is sorted and deduped.
pub fn parse_page_list(s: &str) -> crate::error::Result<Vec<u32>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(TileError::policy("Page list cannot be empty"));
    }

    let mut pages = Vec::new();

    for part in trimmed.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start_str, end_str)) = part.split_once('-') {
            let start: u32 = start_str.trim().parse().map_err(|_| {
                TileError::policy(format!("Invalid page number in range: '{start_str}'"))
            })?;
            let end: u32 = end_str.trim().parse().map_err(|_| {
                TileError::policy(format!("Invalid page number in range: '{end_str}'"))
            })?;

            if start > end {
                return Err(TileError::policy(format!(
                    "Invalid page range: start ({start}) > end ({end})"
                )));
            }

            for page in start..=end {
                pages.push(page);
            }
        } else {
            let page: u32 = part
                .parse()
                .map_err(|_| TileError::policy(format!("Invalid page number: '{part}'")))?;
            pages.push(page);
        }
    }

    if pages.is_empty() {
        return Err(TileError::policy("Page list resolved to empty set"));
    }

    pages.sort();
    pages.dedup();
    Ok(pages)
}

/// Parse a dithering mode name.
pub fn parse_dither(s: &str) -> crate::error::Result<Dither> {
    match s.trim().to_lowercase().as_str() {
        "floyd" | "floyd-steinberg" => Ok(Dither::FloydSteinberg),
        "ordered" => Ok(Dither::Ordered),
        "none" | "threshold" => Ok(Dither::Threshold),
        "off" => Ok(Dither::Off),
        other => Err(TileError::policy(format!(
            "Unknown dither mode '{other}' (expected floyd, ordered, none or off)"
        ))),
    }
}

/// Parse a margin value: "auto", a single percentage, or an LTRB list.
/// Short LTRB lists are padded with zeros.
pub fn parse_margin(s: &str) -> crate::error::Result<CropSpec> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("auto") {
        return Ok(CropSpec::AutoBbox);
    }
    let values: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    let parse = |v: &str| -> crate::error::Result<f64> {
        let pct: f64 = v
            .parse()
            .map_err(|_| TileError::policy(format!("Invalid margin value: '{v}'")))?;
        if !(0.0..50.0).contains(&pct) {
            return Err(TileError::policy(format!(
                "Margin percentage out of range: {pct}"
            )));
        }
        Ok(pct)
    };
    match values.len() {
        1 => {
            let pct = parse(values[0])?;
            if pct == 0.0 {
                Ok(CropSpec::None)
            } else {
                Ok(CropSpec::Uniform(pct))
            }
        }
        2..=4 => {
            let mut sides = [0.0f64; 4];
            for (slot, v) in sides.iter_mut().zip(values.iter()) {
                *slot = parse(v)?;
            }
            Ok(CropSpec::PerSide {
                left: sides[0],
                top: sides[1],
                right: sides[2],
                bottom: sides[3],
            })
        }
        _ => Err(TileError::policy(format!(
            "Margin takes at most 4 values, got '{trimmed}'"
        ))),
    }
}

/// Parse a contrast value: a single level or "dark,light".
pub fn parse_contrast(s: &str) -> crate::error::Result<ContrastPolicy> {
    let parse = |v: &str| -> crate::error::Result<i32> {
        v.trim()
            .parse()
            .map_err(|_| TileError::policy(format!("Invalid contrast value: '{v}'")))
    };
    match s.trim().split_once(',') {
        Some((dark, light)) => Ok(ContrastPolicy {
            dark: parse(dark)?,
            light: parse(light)?,
        }),
        None => {
            let level = parse(s)?;
            Ok(ContrastPolicy::level(level))
        }
    }
}

/// Parse one special-split specifier: `page-h-v[-mask][-overlap]`.
///
/// The mask is a run of `0`/`1` flags, one per grid position in
/// left-to-right, top-to-bottom order; a fourth field made only of
/// those characters is read as the mask, anything else as the overlap
/// percentage.
pub fn parse_special_split(s: &str) -> crate::error::Result<(u32, SpecialSplit)> {
    let parts: Vec<&str> = s.trim().split('-').collect();
    if parts.len() < 3 || parts.len() > 5 {
        return Err(TileError::policy(format!(
            "Invalid special-split specifier '{s}' (expected page-h-v[-mask][-overlap])"
        )));
    }
    let page: u32 = parts[0]
        .parse()
        .map_err(|_| TileError::policy(format!("Invalid page number in special-split: '{s}'")))?;
    let h_segments: u32 = parts[1]
        .parse()
        .map_err(|_| TileError::policy(format!("Invalid h count in special-split: '{s}'")))?;
    let v_segments: u32 = parts[2]
        .parse()
        .map_err(|_| TileError::policy(format!("Invalid v count in special-split: '{s}'")))?;
    // Both axes share the a..z label alphabet.
    if h_segments == 0
        || h_segments as i64 > MAX_V_SEGMENTS
        || v_segments == 0
        || v_segments as i64 > MAX_V_SEGMENTS
    {
        return Err(TileError::policy(format!(
            "Special-split counts out of range in '{s}' (1 <= h, v <= {MAX_V_SEGMENTS})"
        )));
    }

    let mut mask: Option<Vec<bool>> = None;
    let mut h_overlap_percent: Option<f64> = None;
    for extra in &parts[3..] {
        if mask.is_none()
            && h_overlap_percent.is_none()
            && !extra.is_empty()
            && extra.chars().all(|c| c == '0' || c == '1')
        {
            mask = Some(extra.chars().map(|c| c == '1').collect());
        } else if h_overlap_percent.is_none() {
            let pct: f64 = extra.parse().map_err(|_| {
                TileError::policy(format!("Invalid overlap in special-split: '{s}'"))
            })?;
            // 100% overlap collapses the column geometry to zero width.
            if pct >= 100.0 {
                return Err(TileError::policy(format!(
                    "Overlap must be below 100 in special-split: '{s}'"
                )));
            }
            h_overlap_percent = Some(pct);
        } else {
            return Err(TileError::policy(format!(
                "Trailing fields in special-split specifier '{s}'"
            )));
        }
    }

    Ok((
        page,
        SpecialSplit {
            h_segments,
            v_segments,
            mask,
            h_overlap_percent,
        },
    ))
}

/// Parse one special-contrast specifier: `page-dark-light`.
pub fn parse_special_contrast(s: &str) -> crate::error::Result<(u32, ContrastPolicy)> {
    let parts: Vec<&str> = s.trim().split('-').collect();
    if parts.len() != 3 {
        return Err(TileError::policy(format!(
            "Invalid special-contrast specifier '{s}' (expected page-dark-light)"
        )));
    }
    let page: u32 = parts[0].parse().map_err(|_| {
        TileError::policy(format!("Invalid page number in special-contrast: '{s}'"))
    })?;
    let dark: i32 = parts[1]
        .parse()
        .map_err(|_| TileError::policy(format!("Invalid dark level in special-contrast: '{s}'")))?;
    let light: i32 = parts[2].parse().map_err(|_| {
        TileError::policy(format!("Invalid light level in special-contrast: '{s}'"))
    })?;
    Ok((page, ContrastPolicy { dark, light }))
}
