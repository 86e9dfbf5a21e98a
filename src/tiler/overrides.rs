// Per-page policy overrides, resolved once per batch into typed maps

use std::collections::HashMap;

use super::planner::SegmentationPolicy;
use super::preprocess::ContrastPolicy;

/// Per-page segmentation override. Replaces the column count, the
/// vertical start count, and optionally the horizontal overlap; always
/// defeats the vertical overlap search so the requested count is used
/// exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialSplit {
    pub h_segments: u32,
    pub v_segments: u32,
    /// Ordered inclusion flags, one per physical grid position in
    /// left-to-right, top-to-bottom order.
    pub mask: Option<Vec<bool>>,
    pub h_overlap_percent: Option<f64>,
}

/// Result of merging a page's overrides into the global policy.
pub struct ResolvedSegmentation {
    pub seg: SegmentationPolicy,
    pub mask: Option<Vec<bool>>,
    /// An override was present, which activates overlap segmentation
    /// for this page even when the global policy leaves it off.
    pub overridden: bool,
}

/// Read-only override tables shared by all worker threads.
#[derive(Debug, Clone, Default)]
pub struct PageOverrides {
    special_splits: HashMap<u32, SpecialSplit>,
    special_contrast: HashMap<u32, ContrastPolicy>,
}

impl PageOverrides {
    pub fn new(
        special_splits: HashMap<u32, SpecialSplit>,
        special_contrast: HashMap<u32, ContrastPolicy>,
    ) -> Self {
        PageOverrides {
            special_splits,
            special_contrast,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.special_splits.is_empty() && self.special_contrast.is_empty()
    }

    pub fn has_split_override(&self, page: u32) -> bool {
        self.special_splits.contains_key(&page)
    }

    /// Merge the page's split override into the base policy. Absence
    /// falls through to the base unchanged.
    pub fn resolve_segmentation(
        &self,
        page: u32,
        base: &SegmentationPolicy,
    ) -> ResolvedSegmentation {
        match self.special_splits.get(&page) {
            None => ResolvedSegmentation {
                seg: *base,
                mask: None,
                overridden: false,
            },
            Some(special) => ResolvedSegmentation {
                seg: SegmentationPolicy {
                    h_segments: special.h_segments,
                    h_overlap_percent: special
                        .h_overlap_percent
                        .unwrap_or(base.h_overlap_percent),
                    v_target: special.v_segments,
                    // Accept the requested count unconditionally.
                    v_min_overlap_percent: -100.0,
                    max_split_width: base.max_split_width,
                },
                mask: special.mask.clone(),
                overridden: true,
            },
        }
    }

    /// A contrast override replaces the page's contrast policy entirely.
    pub fn resolve_contrast(&self, page: u32, base: &ContrastPolicy) -> ContrastPolicy {
        self.special_contrast.get(&page).copied().unwrap_or(*base)
    }
}
