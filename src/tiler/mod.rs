pub mod compositor;
pub mod overrides;
pub mod planner;
pub mod preprocess;
pub mod spread;

use std::collections::HashSet;

use image::GrayImage;

use self::compositor::Dither;
use self::planner::SegmentationPolicy;
use self::preprocess::{ContrastPolicy, CropSpec};

/// Which pages get a full-page overview tile ahead of their segments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OverviewSelection {
    #[default]
    None,
    All,
    Pages(HashSet<u32>),
}

impl OverviewSelection {
    pub fn applies_to(&self, page: u32) -> bool {
        match self {
            OverviewSelection::None => false,
            OverviewSelection::All => true,
            OverviewSelection::Pages(pages) => pages.contains(&page),
        }
    }
}

/// Which spreads are additionally split into two half-page passes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpreadSplitting {
    #[default]
    Off,
    All,
    Pages(HashSet<u32>),
}

impl SpreadSplitting {
    /// Pages explicitly listed for spread splitting get special split
    /// decisions even when portrait; `All` does not.
    pub fn lists(&self, page: u32) -> bool {
        matches!(self, SpreadSplitting::Pages(pages) if pages.contains(&page))
    }
}

/// The resolved, immutable configuration object the engine runs under.
/// Constructed once per batch and shared read-only across workers.
#[derive(Debug, Clone)]
pub struct TilingPolicy {
    /// Device canvas width (default 480).
    pub target_width: u32,
    /// Device canvas height (default 800).
    pub target_height: u32,
    /// Right-to-left reading order: reverses column emission and the
    /// spread half order.
    pub manga: bool,
    pub crop: CropSpec,
    pub contrast: ContrastPolicy,
    pub segmentation: SegmentationPolicy,
    pub dither: Dither,
    pub pad_color: u8,
    /// Width of the position thumbnail strip; 0 disables it.
    pub thumbnail_width: u32,
    pub thumbnail_highlight: bool,
    pub overviews: OverviewSelection,
    /// Emit overviews unrotated.
    pub sideways_overviews: bool,
    /// Split every page regardless of orientation.
    pub split_all: bool,
    pub split_spreads: SpreadSplitting,
    /// Pages rendered as a single overview instead of being split.
    pub dont_split_pages: HashSet<u32>,
}

impl Default for TilingPolicy {
    fn default() -> Self {
        TilingPolicy {
            target_width: 480,
            target_height: 800,
            manga: false,
            crop: CropSpec::None,
            contrast: ContrastPolicy::default(),
            segmentation: SegmentationPolicy::default(),
            dither: Dither::default(),
            pad_color: 255,
            thumbnail_width: 0,
            thumbnail_highlight: true,
            overviews: OverviewSelection::None,
            sideways_overviews: false,
            split_all: false,
            split_spreads: SpreadSplitting::Off,
            dont_split_pages: HashSet::new(),
        }
    }
}

/// One decoded page handed to the engine. Immutable once constructed;
/// every buffer derived from it lives on the page's own call stack.
pub struct SourcePage {
    /// 1-based page number.
    pub number: u32,
    pub image: image::DynamicImage,
}

/// Output role of a rendered tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileRole {
    /// Full-page preview emitted before a page's segments.
    Overview,
    /// Full landscape page, rotated to fit the portrait screen.
    Spread,
    /// One cell of the segmentation grid (or a legacy half-page piece).
    Segment,
    /// Page exempted from splitting, rendered like an overview.
    DontSplitOverview,
}

/// Half of a wide page selected during spread splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageHalf {
    Left,
    Right,
}

/// Axis-aligned rectangle in cropped-page pixel coordinates.
/// `x1`/`y1` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn full(width: u32, height: u32) -> Self {
        PixelRect {
            x0: 0,
            y0: 0,
            x1: width,
            y1: height,
        }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

/// One planned output unit.
///
/// `row`/`col` are emission indices: in manga mode column 0 is the
/// rightmost physical column. `included` is false for tiles suppressed
/// by a per-page inclusion mask; their geometry still participates in
/// row/column numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub row: u32,
    pub col: u32,
    pub rect: PixelRect,
    pub included: bool,
}

/// Grid parameters behind a segment plan, kept for the thumbnail
/// highlight which needs strides in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub rows: u32,
    pub cols: u32,
    pub stride_x: i64,
    pub stride_y: i64,
    pub tile_w: i64,
    pub tile_h: i64,
    /// Column emission order is right-to-left.
    pub manga: bool,
}

impl GridGeometry {
    /// Physical column index for an emission column index.
    pub fn physical_col(&self, col: u32) -> u32 {
        if self.manga { self.cols - 1 - col } else { col }
    }
}

/// Ordered tiling decision for one page (or one half of a spread).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationPlan {
    pub role: TileRole,
    pub tiles: Vec<Tile>,
    /// Present only for segment grids (including the legacy two-piece mode).
    pub grid: Option<GridGeometry>,
}

/// A tile rendered to the device canvas, ready for encoding.
pub struct RenderedTile {
    pub role: TileRole,
    pub row: u32,
    pub col: u32,
    /// True when the plan had more than one column, which switches the
    /// collaborator's naming to row+column letters.
    pub multi_column: bool,
    pub image: GrayImage,
}

/// Everything emitted for one pass over a page: the main pass has an
/// empty suffix, spread halves carry `_1` / `_2`.
pub struct PageOutput {
    pub page_number: u32,
    pub suffix: String,
    /// Plan was the legacy two-piece split, which collaborators name
    /// differently from the overlap grid.
    pub two_piece: bool,
    pub tiles: Vec<RenderedTile>,
}
