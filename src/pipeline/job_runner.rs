// Job pipeline: list pages -> decode -> parallel tiling -> PNG output

use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::TileError;
use crate::tiler::overrides::PageOverrides;
use crate::tiler::{PageOutput, SourcePage, TileRole, TilingPolicy};
use crate::pipeline::page_processor::process_page;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

const ROW_LETTERS: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

/// Page selection filters, applied before any page work starts.
#[derive(Debug, Clone, Default)]
pub struct PageFilters {
    pub skip: HashSet<u32>,
    /// When non-empty, only these pages are rendered.
    pub only: HashSet<u32>,
    pub start: Option<u32>,
    pub stop: Option<u32>,
}

impl PageFilters {
    pub fn includes(&self, page: u32) -> bool {
        if self.skip.contains(&page) {
            return false;
        }
        if !self.only.is_empty() && !self.only.contains(&page) {
            return false;
        }
        if let Some(start) = self.start
            && page < start
        {
            return false;
        }
        if let Some(stop) = self.stop
            && page > stop
        {
            return false;
        }
        true
    }
}

/// Configuration for a single job.
pub struct JobConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub policy: TilingPolicy,
    pub overrides: PageOverrides,
    pub filters: PageFilters,
    /// Write a `report.json` with per-tile byte sizes next to the tiles.
    pub write_report: bool,
}

/// Result of processing a single job.
pub struct JobResult {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub pages_processed: usize,
    pub pages_failed: usize,
    pub tiles_written: usize,
    pub bytes_written: u64,
}

#[derive(Serialize)]
struct TileReport {
    name: String,
    role: &'static str,
    bytes: u64,
}

#[derive(Serialize)]
struct PageReport {
    page: u32,
    tiles: Vec<TileReport>,
}

/// Run one job: walk the input directory, decode each page, fan the
/// pages out over the rayon pool, and write the resulting tiles.
///
/// A page failure is isolated: it is logged, counted, and the batch
/// continues. Only job-level problems (unreadable directory, output
/// not writable) abort the job.
pub fn run_job(config: &JobConfig) -> crate::error::Result<JobResult> {
    let pages = list_page_files(&config.input_dir)?;
    if pages.is_empty() {
        return Err(TileError::policy(format!(
            "no page images found in {}",
            config.input_dir.display()
        )));
    }
    std::fs::create_dir_all(&config.output_dir)?;

    let selected: Vec<(u32, &PathBuf)> = pages
        .iter()
        .enumerate()
        .map(|(i, p)| (i as u32 + 1, p))
        .filter(|(n, _)| config.filters.includes(*n))
        .collect();
    info!(
        input = %config.input_dir.display(),
        pages = pages.len(),
        selected = selected.len(),
        "job started"
    );

    // Pages are independent; policy and overrides are shared read-only.
    let results: Vec<(u32, crate::error::Result<PageReport>)> = selected
        .par_iter()
        .map(|&(number, path)| (number, run_page(number, path, config)))
        .collect();

    let mut reports: Vec<PageReport> = Vec::new();
    let mut pages_failed = 0usize;
    for (number, result) in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                // Zero output for this page, siblings unaffected.
                warn!(page = number, error = %e, "page failed");
                pages_failed += 1;
            }
        }
    }
    reports.sort_by_key(|r| r.page);

    let tiles_written = reports.iter().map(|r| r.tiles.len()).sum();
    let bytes_written = reports
        .iter()
        .flat_map(|r| r.tiles.iter())
        .map(|t| t.bytes)
        .sum();

    if config.write_report {
        let json = serde_json::to_vec_pretty(&reports)?;
        std::fs::write(config.output_dir.join("report.json"), json)?;
    }

    Ok(JobResult {
        input_dir: config.input_dir.clone(),
        output_dir: config.output_dir.clone(),
        pages_processed: reports.len(),
        pages_failed,
        tiles_written,
        bytes_written,
    })
}

fn run_page(number: u32, path: &Path, config: &JobConfig) -> crate::error::Result<PageReport> {
    let image = image::open(path)
        .map_err(|e| TileError::decode(format!("{}: {e}", path.display())))?;
    let page = SourcePage { number, image };
    let outputs = process_page(&page, &config.policy, &config.overrides)?;

    let mut tiles = Vec::new();
    for output in &outputs {
        for tile in &output.tiles {
            let name = tile_name(output, tile.role, tile.row, tile.col, tile.multi_column);
            let mut png = Vec::new();
            tile.image
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|e| TileError::render(e.to_string()))?;
            let bytes = png.len() as u64;
            std::fs::write(config.output_dir.join(format!("{name}.png")), png)?;
            tiles.push(TileReport {
                name,
                role: role_name(tile.role),
                bytes,
            });
        }
    }
    Ok(PageReport {
        page: number,
        tiles,
    })
}

/// Collaborator-side tile naming: zero-padded page number, sub-page
/// suffix, then a role/series marker. Segments get row letters (and a
/// column letter when the grid has more than one column); the legacy
/// two-piece split keeps its historical `_2_` series.
fn tile_name(output: &PageOutput, role: TileRole, row: u32, col: u32, multi_column: bool) -> String {
    let base = format!("{:04}{}", output.page_number, output.suffix);
    match role {
        TileRole::Overview | TileRole::DontSplitOverview => format!("{base}_0_overview"),
        TileRole::Spread => format!("{base}_0_spread"),
        TileRole::Segment => {
            let series = if output.two_piece { 2 } else { 3 };
            let row_letter = ROW_LETTERS[(row as usize).min(25)] as char;
            if multi_column {
                let col_letter = ROW_LETTERS[(col as usize).min(25)] as char;
                format!("{base}_{series}_{row_letter}_{col_letter}")
            } else {
                format!("{base}_{series}_{row_letter}")
            }
        }
    }
}

fn role_name(role: TileRole) -> &'static str {
    match role {
        TileRole::Overview => "overview",
        TileRole::Spread => "spread",
        TileRole::Segment => "segment",
        TileRole::DontSplitOverview => "dont-split-overview",
    }
}

/// Sorted list of page image files in a directory. Non-image files and
/// OS metadata droppings are ignored.
fn list_page_files(dir: &Path) -> crate::error::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.starts_with("__macos") || name.starts_with('.') {
            continue;
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
