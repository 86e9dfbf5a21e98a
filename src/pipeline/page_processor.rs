// Per-page pipeline: preprocess -> override merge -> plan -> compose

use tracing::debug;

use crate::tiler::compositor::{self, CompositorConfig};
use crate::tiler::overrides::PageOverrides;
use crate::tiler::planner::{self, PlanRequest};
use crate::tiler::preprocess;
use crate::tiler::spread;
use crate::tiler::{PageHalf, PageOutput, RenderedTile, SourcePage, TileRole, TilingPolicy};

/// Process one source page into its full tile set.
///
/// The main pass comes first; when the page is a spread marked for
/// splitting, the two half passes follow, each re-run through the whole
/// pipeline with its own suffix. Pages are independent: this function
/// reads only the page and the shared read-only policy tables.
pub fn process_page(
    page: &SourcePage,
    policy: &TilingPolicy,
    overrides: &PageOverrides,
) -> crate::error::Result<Vec<PageOutput>> {
    let mut outputs = Vec::new();
    run_pass(page, policy, overrides, None, "", &mut outputs)?;
    Ok(outputs)
}

fn run_pass(
    page: &SourcePage,
    policy: &TilingPolicy,
    overrides: &PageOverrides,
    half: Option<PageHalf>,
    suffix: &str,
    outputs: &mut Vec<PageOutput>,
) -> crate::error::Result<()> {
    let contrast = overrides.resolve_contrast(page.number, &policy.contrast);
    let prepared = preprocess::prepare(&page.image, half, &contrast, &policy.crop)?;
    let (width, height) = prepared.cropped.dimensions();

    let resolved = overrides.resolve_segmentation(page.number, &policy.segmentation);
    let overlap_active = policy.segmentation.h_segments > 0 || resolved.overridden;

    let request = PlanRequest {
        width,
        height,
        device_width: policy.target_width,
        seg: resolved.seg,
        manga: policy.manga,
        split_all: policy.split_all,
        listed_spread_split: policy.split_spreads.lists(page.number),
        listed_dont_split: policy.dont_split_pages.contains(&page.number),
        is_half: half.is_some(),
        overlap_active,
        mask: resolved.mask,
    };
    let plan = planner::plan(&request)?;
    debug!(
        page = page.number,
        suffix,
        role = ?plan.role,
        tiles = plan.tiles.len(),
        "plan resolved"
    );

    let cfg = CompositorConfig {
        target_width: policy.target_width,
        target_height: policy.target_height,
        dither: policy.dither,
        pad_color: policy.pad_color,
        thumbnail_highlight: policy.thumbnail_highlight,
    };

    let mut tiles: Vec<RenderedTile> = Vec::new();
    let multi_column = plan
        .grid
        .map(|g| g.cols > 1)
        .unwrap_or(false);

    match plan.role {
        TileRole::Segment => {
            if policy.overviews.applies_to(page.number) {
                tiles.push(RenderedTile {
                    role: TileRole::Overview,
                    row: 0,
                    col: 0,
                    multi_column: false,
                    image: compositor::render_overview(
                        &prepared.uncropped,
                        policy.sideways_overviews,
                        &cfg,
                    ),
                });
            }

            let thumbnail =
                compositor::build_thumbnail(&prepared.cropped, policy.thumbnail_width, cfg.pad_color);
            for tile in plan.tiles.iter().filter(|t| t.included) {
                let image = compositor::render_segment(
                    &prepared.cropped,
                    tile,
                    plan.grid.as_ref(),
                    thumbnail.as_ref(),
                    &cfg,
                )?;
                tiles.push(RenderedTile {
                    role: TileRole::Segment,
                    row: tile.row,
                    col: tile.col,
                    multi_column,
                    image,
                });
            }
        }
        TileRole::Spread => {
            tiles.push(RenderedTile {
                role: TileRole::Spread,
                row: 0,
                col: 0,
                multi_column: false,
                image: compositor::render_spread(&prepared.cropped, &cfg),
            });
        }
        TileRole::DontSplitOverview => {
            tiles.push(RenderedTile {
                role: TileRole::DontSplitOverview,
                row: 0,
                col: 0,
                multi_column: false,
                image: compositor::render_overview(
                    &prepared.uncropped,
                    policy.sideways_overviews,
                    &cfg,
                ),
            });
        }
        TileRole::Overview => unreachable!("planner never emits an overview-role plan"),
    }

    let two_piece = plan.role == TileRole::Segment && !overlap_active;
    outputs.push(PageOutput {
        page_number: page.number,
        suffix: suffix.to_string(),
        two_piece,
        tiles,
    });

    // Spread fork: two independent half passes, depth exactly one.
    if plan.role == TileRole::Spread
        && spread::wants_half_passes(policy, page.number, half.is_some())
    {
        for (side, sub) in spread::half_passes(policy.manga) {
            let child_suffix = format!("{suffix}{sub}");
            run_pass(page, policy, overrides, Some(side), &child_suffix, outputs)?;
        }
    }

    Ok(())
}
