// Segmentation planning: split decision + overlap-resolution search

use tracing::{debug, warn};

use super::{GridGeometry, PixelRect, SegmentationPlan, Tile, TileRole};
use crate::error::TileError;

/// Row labels run a..z, so a plan can never carry more vertical
/// segments than the alphabet has letters.
pub const MAX_V_SEGMENTS: i64 = 26;

/// Overlap-aware segmentation parameters, already merged with any
/// per-page override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationPolicy {
    /// Horizontal segment count. 0 means overlap segmentation is not
    /// active and portrait pages fall back to the two-piece split.
    pub h_segments: u32,
    /// Horizontal overlap between adjacent columns, percent.
    pub h_overlap_percent: f64,
    /// Desired (minimum) vertical segment count the search starts from.
    pub v_target: u32,
    /// Minimum vertical overlap, percent. -100 disables the search and
    /// accepts `v_target` as-is.
    pub v_min_overlap_percent: f64,
    /// Maximum logical segment width in device units.
    pub max_split_width: u32,
}

impl Default for SegmentationPolicy {
    fn default() -> Self {
        SegmentationPolicy {
            h_segments: 0,
            h_overlap_percent: 70.0,
            v_target: 3,
            v_min_overlap_percent: 5.0,
            max_split_width: 800,
        }
    }
}

/// Everything the planner needs for one page pass.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    /// Cropped page width in source pixels.
    pub width: u32,
    /// Cropped page height in source pixels.
    pub height: u32,
    /// Device width in pixels; segments are sized so a rotated segment
    /// row fills this many device units vertically.
    pub device_width: u32,
    pub seg: SegmentationPolicy,
    pub manga: bool,
    /// Force-split every page regardless of orientation.
    pub split_all: bool,
    /// Page is explicitly listed for spread splitting.
    pub listed_spread_split: bool,
    /// Page is explicitly listed as never-split.
    pub listed_dont_split: bool,
    /// This pass is one half of a spread (recursion level 1).
    pub is_half: bool,
    /// Overlap segmentation is active for this page.
    pub overlap_active: bool,
    /// Per-page inclusion mask, indexed left-to-right and top-to-bottom
    /// over physical grid positions.
    pub mask: Option<Vec<bool>>,
}

/// Decide how a page is tiled.
///
/// Portrait pages split, landscape pages become spreads; the force
/// flags override in the order the request fields document. The
/// returned tiles are in emission order and their union always spans
/// the full cropped page.
pub fn plan(req: &PlanRequest) -> crate::error::Result<SegmentationPlan> {
    if req.width == 0 || req.height == 0 {
        return Err(TileError::geometry(format!(
            "degenerate page dimensions {}x{}",
            req.width, req.height
        )));
    }

    let mut should_split = req.width < req.height;
    if req.listed_spread_split {
        // Top level: the spread controller halves the page instead.
        // Half level: the half cannot recurse again, it must split.
        should_split = req.is_half;
    }
    if req.split_all {
        should_split = true;
    }
    if !req.is_half && req.listed_dont_split {
        should_split = false;
    }

    if should_split {
        if req.overlap_active {
            plan_grid(req)
        } else {
            Ok(plan_two_piece(req))
        }
    } else if req.width >= req.height || req.listed_spread_split {
        Ok(SegmentationPlan {
            role: TileRole::Spread,
            tiles: vec![Tile {
                row: 0,
                col: 0,
                rect: PixelRect::full(req.width, req.height),
                included: true,
            }],
            grid: None,
        })
    } else {
        Ok(SegmentationPlan {
            role: TileRole::DontSplitOverview,
            tiles: vec![Tile {
                row: 0,
                col: 0,
                rect: PixelRect::full(req.width, req.height),
                included: true,
            }],
            grid: None,
        })
    }
}

/// Legacy mode: top half and bottom half, no overlap.
fn plan_two_piece(req: &PlanRequest) -> SegmentationPlan {
    let (w, h) = (req.width, req.height);
    let half = h / 2;
    let tiles = vec![
        Tile {
            row: 0,
            col: 0,
            rect: PixelRect {
                x0: 0,
                y0: 0,
                x1: w,
                y1: half,
            },
            included: true,
        },
        Tile {
            row: 1,
            col: 0,
            rect: PixelRect {
                x0: 0,
                y0: half,
                x1: w,
                y1: h,
            },
            included: true,
        },
    ];
    SegmentationPlan {
        role: TileRole::Segment,
        tiles,
        grid: Some(GridGeometry {
            rows: 2,
            cols: 1,
            stride_x: 0,
            stride_y: half as i64,
            tile_w: w as i64,
            tile_h: half as i64,
            manga: req.manga,
        }),
    }
}

/// The overlap-resolution search.
///
/// Horizontal geometry is fixed by the requested column count and
/// overlap; the vertical count grows from `v_target` until adjacent
/// rows overlap by at least `v_min_overlap_percent`, or the row-label
/// alphabet runs out. Division results are floored after every step so
/// segment boundaries land on the same pixels for the same input every
/// time.
fn plan_grid(req: &PlanRequest) -> crate::error::Result<SegmentationPlan> {
    let w = req.width as f64;
    let h = req.height as f64;
    let seg = &req.seg;
    let nh = seg.h_segments.max(1) as i64;
    let wmax = seg.max_split_width as f64;

    // Total logical width in device units occupied by nh overlapping
    // columns, e.g. 1 -> 800, 2 at 33% -> 1334, 3 at 33% -> 1868.
    let total_width_units =
        (wmax * nh as f64) - ((nh - 1) as f64 * (wmax * 0.01 * seg.h_overlap_percent)).trunc();
    let scale = total_width_units / w;

    let tile_w = (wmax / scale).floor();
    let mut stride_x = 0.0f64;
    if nh > 1 {
        stride_x = tile_w - ((tile_w * nh as f64 - w) / (nh - 1) as f64).floor();
    }

    // Same scale vertically keeps the device aspect ratio across axes.
    let tile_h = (req.device_width as f64 / scale).floor();
    if tile_w < 1.0 || tile_h < 1.0 {
        return Err(TileError::geometry(format!(
            "segment geometry collapsed (tile {tile_w}x{tile_h} source px)"
        )));
    }

    let min_overlap = req.seg.v_min_overlap_percent;
    let mut nv = seg.v_target as i64 - 1;
    let mut stride_y = f64::MAX;
    while nv < MAX_V_SEGMENTS && stride_y / tile_h > 1.0 - 0.01 * min_overlap {
        nv += 1;
        stride_y = 0.0;
        if nv > 1 {
            stride_y = tile_h - ((tile_h * nv as f64 - h) / (nv - 1) as f64).floor();
        }
    }
    if nv >= MAX_V_SEGMENTS && stride_y / tile_h > 1.0 - 0.01 * min_overlap {
        // Hard cap: emit the best effort rather than failing the page.
        warn!(
            rows = nv,
            achieved_overlap = 1.0 - stride_y / tile_h,
            required_overlap = 0.01 * min_overlap,
            "vertical segment count capped before reaching requested overlap"
        );
    }
    debug!(
        width = req.width,
        height = req.height,
        cols = nh,
        rows = nv,
        tile_w,
        tile_h,
        stride_x,
        stride_y,
        scale,
        "segment grid resolved"
    );

    let rows = nv as u32;
    let cols = nh as u32;
    let grid = GridGeometry {
        rows,
        cols,
        stride_x: stride_x as i64,
        stride_y: stride_y as i64,
        tile_w: tile_w as i64,
        tile_h: tile_h as i64,
        manga: req.manga,
    };

    let mask = req.mask.clone().unwrap_or_default();

    let mut tiles = Vec::with_capacity((rows * cols) as usize);
    for row in 0..rows {
        for col in 0..cols {
            let p = grid.physical_col(col) as i64;
            let x0 = grid.stride_x * p;
            let y0 = grid.stride_y * row as i64;
            let x1 = req.width as i64 - grid.stride_x * (nh - 1 - p);
            let y1 = req.height as i64 - grid.stride_y * (nv - 1 - row as i64);
            let rect = clamp_rect(x0, y0, x1, y1, req.width, req.height)?;
            // Mask entries run over physical positions, left-to-right
            // and top-to-bottom, independent of reading direction; a
            // short mask leaves the remaining tiles included.
            let included = mask
                .get(row as usize * cols as usize + p as usize)
                .copied()
                .unwrap_or(true);
            tiles.push(Tile {
                row,
                col,
                rect,
                included,
            });
        }
    }

    Ok(SegmentationPlan {
        role: TileRole::Segment,
        tiles,
        grid: Some(grid),
    })
}

fn clamp_rect(
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
    w: u32,
    h: u32,
) -> crate::error::Result<PixelRect> {
    let x0 = x0.clamp(0, w as i64);
    let y0 = y0.clamp(0, h as i64);
    let x1 = x1.clamp(0, w as i64);
    let y1 = y1.clamp(0, h as i64);
    if x1 <= x0 || y1 <= y0 {
        return Err(TileError::geometry(format!(
            "empty tile rect [{x0},{y0},{x1},{y1}] in {w}x{h} page"
        )));
    }
    Ok(PixelRect {
        x0: x0 as u32,
        y0: y0 as u32,
        x1: x1 as u32,
        y1: y1 as u32,
    })
}
