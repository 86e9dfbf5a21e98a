use image::{GrayImage, Luma};
use page_tiling::error::TileError;
use page_tiling::tiler::compositor::{
    CompositorConfig, Dither, binarize, build_thumbnail, render_overview, render_segment,
    render_spread,
};
use page_tiling::tiler::{GridGeometry, PixelRect, Tile};

fn cfg(dither: Dither, pad_color: u8) -> CompositorConfig {
    CompositorConfig {
        target_width: 480,
        target_height: 800,
        dither,
        pad_color,
        thumbnail_highlight: true,
    }
}

fn flat(width: u32, height: u32, value: u8) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([value]))
}

fn gradient(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        Luma([((x + y) * 255 / (width + height - 2)) as u8])
    })
}

fn full_tile(width: u32, height: u32) -> Tile {
    Tile {
        row: 0,
        col: 0,
        rect: PixelRect::full(width, height),
        included: true,
    }
}

// ============================================================
// 1. Canvas geometry
// ============================================================

#[test]
fn test_every_render_path_yields_the_device_canvas() {
    let c = cfg(Dither::Off, 255);
    let src = flat(123, 456, 128);

    let seg = render_segment(&src, &full_tile(123, 456), None, None, &c).expect("segment");
    assert_eq!(seg.dimensions(), (480, 800));

    assert_eq!(render_spread(&src, &c).dimensions(), (480, 800));
    assert_eq!(render_overview(&src, false, &c).dimensions(), (480, 800));
    assert_eq!(render_overview(&src, true, &c).dimensions(), (480, 800));
}

#[test]
fn test_padding_fills_with_configured_color() {
    // A 100x200 black page rotates to 200x100, scales to 480x240 and
    // sits centered; the corners stay padding.
    let src = flat(100, 200, 0);

    let white = render_segment(&src, &full_tile(100, 200), None, None, &cfg(Dither::Off, 255))
        .expect("segment");
    assert_eq!(white.get_pixel(0, 0).0[0], 255);
    assert_eq!(white.get_pixel(479, 799).0[0], 255);
    assert_eq!(white.get_pixel(240, 400).0[0], 0);

    let black = render_segment(&src, &full_tile(100, 200), None, None, &cfg(Dither::Off, 0))
        .expect("segment");
    assert_eq!(black.get_pixel(0, 0).0[0], 0);
}

#[test]
fn test_sideways_overview_skips_rotation() {
    // Portrait 100x200 source: rotated it fills the canvas width with
    // bands of padding above and below; sideways it fills the height
    // with padding left and right.
    let src = flat(100, 200, 0);
    let c = cfg(Dither::Off, 255);

    let rotated = render_overview(&src, false, &c);
    assert_eq!(rotated.get_pixel(0, 400).0[0], 0);
    assert_eq!(rotated.get_pixel(240, 10).0[0], 255);

    let sideways = render_overview(&src, true, &c);
    assert_eq!(sideways.get_pixel(0, 400).0[0], 255);
    assert_eq!(sideways.get_pixel(240, 400).0[0], 0);
}

#[test]
fn test_out_of_bounds_tile_rect_is_a_render_error() {
    let src = flat(100, 100, 128);
    let tile = Tile {
        row: 0,
        col: 0,
        rect: PixelRect {
            x0: 50,
            y0: 50,
            x1: 150,
            y1: 150,
        },
        included: true,
    };
    match render_segment(&src, &tile, None, None, &cfg(Dither::Off, 255)) {
        Err(TileError::RenderError(_)) => {}
        Err(other) => panic!("expected RenderError, got {other:?}"),
        Ok(_) => panic!("expected RenderError, got a canvas"),
    }
}

// ============================================================
// 2. Binarization
// ============================================================

#[test]
fn test_floyd_steinberg_output_is_bilevel() {
    let mut img = gradient(64, 64);
    binarize(&mut img, Dither::FloydSteinberg);
    assert!(img.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
}

#[test]
fn test_ordered_output_is_bilevel_and_patterned() {
    let mut img = flat(8, 8, 128);
    binarize(&mut img, Dither::Ordered);
    assert!(img.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    // Mid gray under a Bayer matrix must produce both levels.
    assert!(img.pixels().any(|p| p.0[0] == 0));
    assert!(img.pixels().any(|p| p.0[0] == 255));
}

#[test]
fn test_threshold_splits_at_128() {
    let mut img = flat(2, 1, 127);
    img.put_pixel(1, 0, Luma([128]));
    binarize(&mut img, Dither::Threshold);
    assert_eq!(img.get_pixel(0, 0).0[0], 0);
    assert_eq!(img.get_pixel(1, 0).0[0], 255);
}

#[test]
fn test_dither_off_preserves_grayscale() {
    let mut img = flat(4, 4, 100);
    binarize(&mut img, Dither::Off);
    assert!(img.pixels().all(|p| p.0[0] == 100));
}

// ============================================================
// 3. Thumbnail strip
// ============================================================

#[test]
fn test_thumbnail_disabled_when_width_is_zero() {
    assert!(build_thumbnail(&flat(100, 200, 128), 0, 255).is_none());
}

#[test]
fn test_thumbnail_degenerate_page_yields_none() {
    // 1000x50 page at width 10 scales the height below one pixel.
    assert!(build_thumbnail(&flat(1000, 50, 128), 10, 255).is_none());
}

#[test]
fn test_thumbnail_pushes_content_to_bottom_edge() {
    let src = flat(100, 200, 0);
    let strip = build_thumbnail(&src, 40, 255).expect("thumbnail");

    let with = render_segment(&src, &full_tile(100, 200), None, Some(&strip), &cfg(Dither::Off, 255))
        .expect("segment");
    let without = render_segment(&src, &full_tile(100, 200), None, None, &cfg(Dither::Off, 255))
        .expect("segment");

    // Content is 480x240 after rotation and scaling: centered it covers
    // y 280..520, bottom-anchored it covers y 560..800.
    assert_eq!(without.get_pixel(240, 300).0[0], 0);
    assert_eq!(with.get_pixel(240, 300).0[0], 255);
    assert_eq!(with.get_pixel(240, 700).0[0], 0);
}

#[test]
fn test_thumbnail_highlight_marks_the_active_segment() {
    let src = flat(100, 200, 128);
    let grid = GridGeometry {
        rows: 2,
        cols: 1,
        stride_x: 0,
        stride_y: 100,
        tile_w: 100,
        tile_h: 100,
        manga: false,
    };
    let tile = Tile {
        row: 0,
        col: 0,
        rect: PixelRect {
            x0: 0,
            y0: 0,
            x1: 100,
            y1: 100,
        },
        included: true,
    };
    let strip = build_thumbnail(&src, 40, 255).expect("thumbnail");

    let highlighted = render_segment(
        &src,
        &tile,
        Some(&grid),
        Some(&strip),
        &cfg(Dither::Off, 255),
    )
    .expect("segment");

    let mut plain_cfg = cfg(Dither::Off, 255);
    plain_cfg.thumbnail_highlight = false;
    let plain =
        render_segment(&src, &tile, Some(&grid), Some(&strip), &plain_cfg).expect("segment");

    assert_ne!(
        highlighted.as_raw(),
        plain.as_raw(),
        "highlight must alter the strip"
    );
    // Only the strip region may differ.
    for y in 40..800 {
        for x in 0..480 {
            assert_eq!(highlighted.get_pixel(x, y), plain.get_pixel(x, y));
        }
    }
}
