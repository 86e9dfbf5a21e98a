use std::collections::{HashMap, HashSet};

use super::job::{
    self, Job, parse_contrast, parse_dither, parse_margin, parse_special_contrast,
    parse_special_split,
};
use super::settings::Settings;
use crate::pipeline::job_runner::PageFilters;
use crate::tiler::overrides::PageOverrides;
use crate::tiler::planner::SegmentationPolicy;
use crate::tiler::preprocess::{ContrastPolicy, CropSpec};
use crate::tiler::{OverviewSelection, SpreadSplitting, TilingPolicy};

/// Fully resolved configuration for one job: the engine policy, the
/// per-page override tables, and the runner-side page filters. All
/// specifier parsing happens here, before any page work starts, so a
/// malformed job fails the whole configuration step.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub policy: TilingPolicy,
    pub overrides: PageOverrides,
    pub filters: PageFilters,
    pub write_report: bool,
}

impl MergedConfig {
    /// Job values win over Settings values where present.
    pub fn new(settings: &Settings, job: &Job) -> crate::error::Result<Self> {
        let dither_name = job.dither.as_deref().unwrap_or(&settings.dither);
        let dither = parse_dither(dither_name)?;

        let crop = match &job.margin {
            Some(m) => parse_margin(m)?,
            None => CropSpec::None,
        };
        let contrast = match &job.contrast {
            Some(c) => parse_contrast(c)?,
            None => ContrastPolicy::default(),
        };

        // Any overlap-related request activates grid segmentation with
        // default counts; otherwise portrait pages get the two-piece
        // split.
        let overlap_active = job.overlap.unwrap_or(false)
            || job.hsplit_count.is_some()
            || job.vsplit_target.is_some();
        let segmentation = SegmentationPolicy {
            h_segments: if overlap_active {
                job.hsplit_count.unwrap_or(1)
            } else {
                0
            },
            h_overlap_percent: job.hsplit_overlap.unwrap_or(settings.hsplit_overlap),
            v_target: job.vsplit_target.unwrap_or(settings.vsplit_target),
            v_min_overlap_percent: job.vsplit_min_overlap.unwrap_or(settings.vsplit_min_overlap),
            max_split_width: job.hsplit_max_width.unwrap_or(settings.hsplit_max_width),
        };
        if segmentation.h_segments > 26 {
            return Err(crate::error::TileError::policy(format!(
                "hsplit_count {} exceeds the column label alphabet",
                segmentation.h_segments
            )));
        }
        if segmentation.v_target == 0 || segmentation.v_target > 26 {
            return Err(crate::error::TileError::policy(format!(
                "vsplit_target {} out of range (1-26)",
                segmentation.v_target
            )));
        }
        // At 100% the total logical width collapses to zero and the
        // column strides degenerate.
        if segmentation.h_overlap_percent >= 100.0 {
            return Err(crate::error::TileError::policy(format!(
                "hsplit_overlap {} must be below 100",
                segmentation.h_overlap_percent
            )));
        }

        let overviews = if job.include_overviews.unwrap_or(false) {
            OverviewSelection::All
        } else if let Some(pages) = &job.select_overviews {
            OverviewSelection::Pages(page_set(pages)?)
        } else if job.sideways_overviews.unwrap_or(false) {
            // Sideways mode alone still requests overviews for all pages.
            OverviewSelection::All
        } else {
            OverviewSelection::None
        };

        let split_spreads = match job.split_spreads.as_deref().map(str::trim) {
            None => SpreadSplitting::Off,
            Some(s) if s.eq_ignore_ascii_case("all") => SpreadSplitting::All,
            Some(s) => SpreadSplitting::Pages(page_set(s)?),
        };

        let policy = TilingPolicy {
            target_width: settings.target_width,
            target_height: settings.target_height,
            manga: job.manga.unwrap_or(false),
            crop,
            contrast,
            segmentation,
            dither,
            pad_color: if job.pad_black.unwrap_or(settings.pad_black) {
                0
            } else {
                255
            },
            thumbnail_width: job.thumbnail_width.unwrap_or(settings.thumbnail_width),
            thumbnail_highlight: job
                .thumbnail_highlight
                .unwrap_or(settings.thumbnail_highlight),
            overviews,
            sideways_overviews: job.sideways_overviews.unwrap_or(false),
            split_all: job.split_all.unwrap_or(false),
            split_spreads,
            dont_split_pages: match &job.dont_split {
                Some(pages) => page_set(pages)?,
                None => HashSet::new(),
            },
        };

        let mut special_splits = HashMap::new();
        for spec in job.special_split.iter().flatten() {
            let (page, split) = parse_special_split(spec)?;
            special_splits.insert(page, split);
        }
        let mut special_contrast = HashMap::new();
        for spec in job.special_contrast.iter().flatten() {
            let (page, contrast) = parse_special_contrast(spec)?;
            special_contrast.insert(page, contrast);
        }

        let filters = PageFilters {
            skip: match &job.skip {
                Some(pages) => page_set(pages)?,
                None => HashSet::new(),
            },
            only: match &job.only {
                Some(pages) => page_set(pages)?,
                None => HashSet::new(),
            },
            start: job.start,
            stop: job.stop,
        };

        Ok(MergedConfig {
            policy,
            overrides: PageOverrides::new(special_splits, special_contrast),
            filters,
            write_report: job.write_report.unwrap_or(settings.write_report),
        })
    }
}

fn page_set(s: &str) -> crate::error::Result<HashSet<u32>> {
    Ok(job::parse_page_list(s)?.into_iter().collect())
}
