// Spread handling: a wide page may fork into two half-page passes

use super::{PageHalf, SpreadSplitting, TilingPolicy};

/// Whether this page's spread should additionally be split into two
/// half-page passes. Only ever true at the top level; a half-page is
/// never itself treated as a spread, which pins the recursion depth at
/// exactly one.
pub fn wants_half_passes(policy: &TilingPolicy, page: u32, is_half: bool) -> bool {
    if is_half {
        return false;
    }
    match &policy.split_spreads {
        SpreadSplitting::Off => false,
        SpreadSplitting::All => true,
        SpreadSplitting::Pages(pages) => pages.contains(&page),
    }
}

/// The two half passes in emission order with their sub-page suffixes.
/// Manga reads right-to-left, so the right half comes first.
pub fn half_passes(manga: bool) -> [(PageHalf, &'static str); 2] {
    if manga {
        [(PageHalf::Right, "_1"), (PageHalf::Left, "_2")]
    } else {
        [(PageHalf::Left, "_1"), (PageHalf::Right, "_2")]
    }
}
