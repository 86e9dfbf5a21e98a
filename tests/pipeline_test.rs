use std::collections::HashMap;
use std::fs;
use std::path::Path;

use image::{DynamicImage, GrayImage, Luma};
use page_tiling::pipeline::job_runner::{JobConfig, PageFilters, run_job};
use page_tiling::pipeline::orchestrator::run_all_jobs;
use page_tiling::pipeline::page_processor::process_page;
use page_tiling::tiler::overrides::{PageOverrides, SpecialSplit};
use page_tiling::tiler::{
    OverviewSelection, SourcePage, SpreadSplitting, TileRole, TilingPolicy,
};

fn gray_page(number: u32, width: u32, height: u32, value: u8) -> SourcePage {
    SourcePage {
        number,
        image: DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value]))),
    }
}

/// Landscape page: left half black, right half white.
fn spread_page(number: u32, width: u32, height: u32) -> SourcePage {
    let img = GrayImage::from_fn(width, height, |x, _| {
        Luma([if x < width / 2 { 0 } else { 255 }])
    });
    SourcePage {
        number,
        image: DynamicImage::ImageLuma8(img),
    }
}

fn mostly_white(img: &GrayImage) -> bool {
    let white = img.pixels().filter(|p| p.0[0] == 255).count();
    white * 100 / (img.width() * img.height()) as usize > 95
}

// ============================================================
// 1. process_page
// ============================================================

#[test]
fn test_portrait_page_defaults_to_two_piece_split() {
    let page = gray_page(1, 400, 600, 128);
    let outputs = process_page(&page, &TilingPolicy::default(), &PageOverrides::default())
        .expect("process_page");

    assert_eq!(outputs.len(), 1);
    let out = &outputs[0];
    assert_eq!(out.suffix, "");
    assert!(out.two_piece);
    assert_eq!(out.tiles.len(), 2);
    assert!(out.tiles.iter().all(|t| t.role == TileRole::Segment));
    assert_eq!(out.tiles[0].row, 0);
    assert_eq!(out.tiles[1].row, 1);
    assert!(out.tiles.iter().all(|t| t.image.dimensions() == (480, 800)));
}

#[test]
fn test_spread_splitting_forks_two_half_passes() {
    let mut policy = TilingPolicy::default();
    policy.split_spreads = SpreadSplitting::All;

    let page = spread_page(1, 600, 400);
    let outputs = process_page(&page, &policy, &PageOverrides::default()).expect("process_page");

    assert_eq!(outputs.len(), 3);
    assert_eq!(outputs[0].suffix, "");
    assert_eq!(outputs[0].tiles.len(), 1);
    assert_eq!(outputs[0].tiles[0].role, TileRole::Spread);
    assert_eq!(outputs[1].suffix, "_1");
    assert_eq!(outputs[2].suffix, "_2");
    // Each portrait half goes through the normal two-piece split.
    assert!(outputs[1].two_piece);
    assert_eq!(outputs[1].tiles.len(), 2);
    assert_eq!(outputs[2].tiles.len(), 2);
}

#[test]
fn test_manga_emits_right_half_first() {
    let mut policy = TilingPolicy::default();
    policy.split_spreads = SpreadSplitting::All;
    policy.manga = true;

    let page = spread_page(1, 600, 400);
    let outputs = process_page(&page, &policy, &PageOverrides::default()).expect("process_page");

    // The white right half leads, the black left half follows.
    assert!(mostly_white(&outputs[1].tiles[0].image));
    assert!(!mostly_white(&outputs[2].tiles[0].image));

    let mut western = policy.clone();
    western.manga = false;
    let outputs = process_page(&page, &western, &PageOverrides::default()).expect("process_page");
    assert!(!mostly_white(&outputs[1].tiles[0].image));
}

#[test]
fn test_overview_precedes_segments() {
    let mut policy = TilingPolicy::default();
    policy.segmentation.h_segments = 1;
    policy.overviews = OverviewSelection::All;

    let page = gray_page(1, 400, 600, 128);
    let outputs = process_page(&page, &policy, &PageOverrides::default()).expect("process_page");

    let out = &outputs[0];
    assert!(!out.two_piece);
    assert_eq!(out.tiles[0].role, TileRole::Overview);
    assert!(out.tiles[1..].iter().all(|t| t.role == TileRole::Segment));
    // 400x600 at max width 800: scale 2, tile height 240, three rows.
    assert_eq!(out.tiles.len(), 4);
}

#[test]
fn test_dont_split_page_is_a_single_overview() {
    let mut policy = TilingPolicy::default();
    policy.dont_split_pages.insert(1);

    let page = gray_page(1, 400, 600, 128);
    let outputs = process_page(&page, &policy, &PageOverrides::default()).expect("process_page");
    assert_eq!(outputs[0].tiles.len(), 1);
    assert_eq!(outputs[0].tiles[0].role, TileRole::DontSplitOverview);
}

#[test]
fn test_split_override_activates_grid_for_one_page() {
    let mut splits = HashMap::new();
    splits.insert(
        5,
        SpecialSplit {
            h_segments: 1,
            v_segments: 2,
            mask: None,
            h_overlap_percent: None,
        },
    );
    let overrides = PageOverrides::new(splits, HashMap::new());
    let policy = TilingPolicy::default();

    let overridden = process_page(&gray_page(5, 400, 600, 128), &policy, &overrides)
        .expect("process_page");
    assert!(!overridden[0].two_piece);
    assert_eq!(overridden[0].tiles.len(), 2);

    let plain = process_page(&gray_page(6, 400, 600, 128), &policy, &overrides)
        .expect("process_page");
    assert!(plain[0].two_piece);
}

#[test]
fn test_split_override_mask_drops_tiles() {
    let mut splits = HashMap::new();
    splits.insert(
        5,
        SpecialSplit {
            h_segments: 1,
            v_segments: 3,
            mask: Some(vec![true, false, true]),
            h_overlap_percent: None,
        },
    );
    let overrides = PageOverrides::new(splits, HashMap::new());

    let outputs = process_page(&gray_page(5, 400, 600, 128), &TilingPolicy::default(), &overrides)
        .expect("process_page");
    let rows: Vec<u32> = outputs[0].tiles.iter().map(|t| t.row).collect();
    assert_eq!(rows, vec![0, 2], "middle row masked out");
}

// ============================================================
// 2. run_job
// ============================================================

fn write_page(dir: &Path, name: &str, width: u32, height: u32) {
    let img = GrayImage::from_pixel(width, height, Luma([128]));
    img.save(dir.join(name)).expect("save page");
}

fn job_config(input: &Path, output: &Path) -> JobConfig {
    JobConfig {
        input_dir: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        policy: TilingPolicy::default(),
        overrides: PageOverrides::default(),
        filters: PageFilters::default(),
        write_report: false,
    }
}

#[test]
fn test_run_job_writes_named_tiles() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("pages");
    let output = tmp.path().join("tiles");
    fs::create_dir(&input).unwrap();
    write_page(&input, "0001.png", 200, 300);
    write_page(&input, "0002.png", 200, 300);
    // Non-image clutter must be ignored, not counted as a page.
    fs::write(input.join("notes.txt"), "ignore me").unwrap();

    let result = run_job(&job_config(&input, &output)).expect("run_job");
    assert_eq!(result.pages_processed, 2);
    assert_eq!(result.pages_failed, 0);
    assert_eq!(result.tiles_written, 4);
    assert!(result.bytes_written > 0);

    // Two-piece naming: page, series 2, row letter.
    for name in ["0001_2_a.png", "0001_2_b.png", "0002_2_a.png", "0002_2_b.png"] {
        assert!(output.join(name).is_file(), "missing {name}");
    }
}

#[test]
fn test_run_job_isolates_a_broken_page() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("pages");
    let output = tmp.path().join("tiles");
    fs::create_dir(&input).unwrap();
    write_page(&input, "0001.png", 200, 300);
    fs::write(input.join("0002.png"), "not an image").unwrap();
    write_page(&input, "0003.png", 200, 300);

    let result = run_job(&job_config(&input, &output)).expect("run_job");
    assert_eq!(result.pages_processed, 2);
    assert_eq!(result.pages_failed, 1);
    assert_eq!(result.tiles_written, 4);
    assert!(output.join("0001_2_a.png").is_file());
    assert!(output.join("0003_2_a.png").is_file());
}

#[test]
fn test_run_job_filters_pages_before_decoding() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("pages");
    let output = tmp.path().join("tiles");
    fs::create_dir(&input).unwrap();
    write_page(&input, "0001.png", 200, 300);
    write_page(&input, "0002.png", 200, 300);
    write_page(&input, "0003.png", 200, 300);

    let mut config = job_config(&input, &output);
    config.filters.skip.insert(2);
    config.filters.stop = Some(2);

    let result = run_job(&config).expect("run_job");
    assert_eq!(result.pages_processed, 1);
    assert!(output.join("0001_2_a.png").is_file());
    assert!(!output.join("0002_2_a.png").exists());
    assert!(!output.join("0003_2_a.png").exists());
}

#[test]
fn test_run_job_report_lists_every_tile() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("pages");
    let output = tmp.path().join("tiles");
    fs::create_dir(&input).unwrap();
    write_page(&input, "0001.png", 200, 300);

    let mut config = job_config(&input, &output);
    config.write_report = true;

    run_job(&config).expect("run_job");
    let report: serde_json::Value =
        serde_json::from_slice(&fs::read(output.join("report.json")).unwrap()).unwrap();
    let pages = report.as_array().expect("array of pages");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0]["page"], 1);
    let tiles = pages[0]["tiles"].as_array().unwrap();
    assert_eq!(tiles.len(), 2);
    assert_eq!(tiles[0]["name"], "0001_2_a");
    assert_eq!(tiles[0]["role"], "segment");
    assert!(tiles[0]["bytes"].as_u64().unwrap() > 0);
}

#[test]
fn test_run_job_fails_on_empty_input() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("pages");
    fs::create_dir(&input).unwrap();
    let result = run_job(&job_config(&input, &tmp.path().join("tiles")));
    assert!(result.is_err());
}

// ============================================================
// 3. run_all_jobs
// ============================================================

#[test]
fn test_run_all_jobs_isolates_job_failures() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("pages");
    fs::create_dir(&input).unwrap();
    write_page(&input, "0001.png", 200, 300);

    let jobs = vec![
        job_config(&tmp.path().join("missing"), &tmp.path().join("out_a")),
        job_config(&input, &tmp.path().join("out_b")),
    ];
    let results = run_all_jobs(&jobs);
    assert_eq!(results.len(), 2);
    assert!(results[0].is_err());
    let ok = results[1].as_ref().expect("second job succeeds");
    assert_eq!(ok.pages_processed, 1);
}
