//! End-to-end scenarios against the public API: decode, operate, encode.

use rendition::config::{self, RenderSettings};
use rendition::imaging::{
    self, Anchor, Color, FillPolicy, Filter, ImageFilter, ImageFormat, Palette, PixelBuffer,
    PixelFormat, ResizeRequest, Rotate, Shadow,
};
use rendition::process::{self, Operation, RenderJob};
use std::f64::consts::PI;
use tempfile::TempDir;

fn gradient(width: u32, height: u32) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, |x, y| {
        Color::rgb(
            (x as u64 * 255 / width as u64) as u8,
            (y as u64 * 255 / height as u64) as u8,
            100,
        )
    })
    .unwrap()
}

/// 150x55 GIF-style logo: transparent left half, red right half.
fn transparent_logo() -> PixelBuffer {
    let palette = Palette::new(vec![[0, 0, 0], [255, 0, 0]], Some(0)).unwrap();
    let indices = (0..55)
        .flat_map(|_| (0..150).map(|x| if x < 75 { 0 } else { 1 }))
        .collect();
    PixelBuffer::indexed(150, 55, indices, palette).unwrap()
}

fn close(a: u8, b: u8, tolerance: u8) -> bool {
    a.abs_diff(b) <= tolerance
}

#[test]
fn cover_photo_anchored_up_left() {
    let photo = gradient(2272, 1704);
    let request = ResizeRequest::cover(690, 219, Anchor::UpLeft);
    let out = imaging::resize(&photo, &request, &RenderSettings::default()).unwrap();
    assert_eq!(out.dimensions(), (690, 219));

    // Full width kept, the top 721 source rows cropped in
    let top_left = out.get(0, 0);
    assert!(top_left.r < 10 && top_left.g < 10, "got {top_left:?}");
    let bottom_right = out.get(689, 218);
    assert!(bottom_right.r > 240, "got {bottom_right:?}");
    assert!((95..=120).contains(&bottom_right.g), "got {bottom_right:?}");
}

#[test]
fn transparent_gif_survives_fit_and_reencode() {
    let settings = RenderSettings::default();
    let gif = imaging::encode(&transparent_logo(), ImageFormat::Gif, &settings).unwrap();

    let decoded = imaging::decode(&gif).unwrap();
    assert_eq!(decoded.format(), PixelFormat::Indexed);
    assert_eq!(decoded.get(10, 10).a, 0);
    assert_eq!(decoded.get(140, 10), Color::RED);

    let fitted = imaging::resize(&decoded, &ResizeRequest::fit(75, 75), &settings).unwrap();
    assert_eq!(fitted.dimensions(), (75, 27));

    let regif = imaging::encode(&fitted, ImageFormat::Gif, &settings).unwrap();
    let info = imaging::identify(&regif).unwrap();
    assert_eq!((info.width, info.height), (75, 27));
    assert!(info.has_alpha);
    let back = imaging::decode(&regif).unwrap();
    assert_eq!(back.get(5, 13).a, 0);
    assert_eq!(back.get(70, 13), Color::RED);
}

#[test]
fn transparent_gif_to_jpeg_is_white_backed() {
    let settings = RenderSettings::default();
    let jpeg = imaging::encode(&transparent_logo(), ImageFormat::Jpeg, &settings).unwrap();
    let decoded = imaging::decode(&jpeg).unwrap();
    assert_eq!(decoded.format(), PixelFormat::Rgb);

    let clear = decoded.get(20, 27);
    assert!(
        close(clear.r, 255, 6) && close(clear.g, 255, 6) && close(clear.b, 255, 6),
        "got {clear:?}"
    );
    let red = decoded.get(130, 27);
    assert!(red.r > 230 && red.g < 30 && red.b < 30, "got {red:?}");
}

#[test]
fn crop_to_size_pads_outside_the_source() {
    let source = PixelBuffer::filled(200, 150, Color::RED).unwrap();
    let settings = RenderSettings {
        fill: FillPolicy::Color(Color::WHITE),
        ..RenderSettings::default()
    };
    let out =
        imaging::crop_to_size(&source, -50, -50, 400, 300, 160, 120, None, &settings).unwrap();
    assert_eq!(out.dimensions(), (160, 120));
    // 50 source pixels of margin scale by 0.4 to 20 output pixels
    assert_eq!(out.get(5, 5), Color::WHITE);
    assert_eq!(out.get(5, 60), Color::WHITE);
    assert_eq!(out.get(60, 50), Color::RED);
    assert_eq!(out.get(150, 110), Color::WHITE);

    let transparent = imaging::crop_to_size(
        &source,
        -50,
        -50,
        400,
        300,
        160,
        120,
        None,
        &RenderSettings::default(),
    )
    .unwrap();
    assert_eq!(transparent.get(0, 0).a, 0);
}

/// 16x8 ink samples: left half red ink, right half pure key.
fn cmyk_ink() -> Vec<u8> {
    (0..8)
        .flat_map(|_| {
            (0..16).flat_map(|x| if x < 8 { [0u8, 255, 255, 0] } else { [0, 0, 0, 255] })
        })
        .collect()
}

fn encode_cmyk(samples: &[u8], color_type: jpeg_encoder::ColorType) -> Vec<u8> {
    let mut bytes = Vec::new();
    jpeg_encoder::Encoder::new(&mut bytes, 100)
        .encode(samples, 16, 8, color_type)
        .unwrap();
    bytes
}

/// Remove the Adobe APP14 segment, which precedes the scan data.
fn strip_app14(jpeg: &[u8]) -> Vec<u8> {
    let at = jpeg.windows(2).position(|w| w == [0xFF, 0xEE]).unwrap();
    let len = u16::from_be_bytes([jpeg[at + 2], jpeg[at + 3]]) as usize;
    [&jpeg[..at], &jpeg[at + 2 + len..]].concat()
}

fn assert_red_and_black(jpeg: &[u8]) {
    let decoded = imaging::decode(jpeg).unwrap();
    assert_eq!(decoded.dimensions(), (16, 8));
    assert_eq!(decoded.format(), PixelFormat::Rgb);

    let red = decoded.get(2, 4);
    assert!(red.r > 230 && red.g < 30 && red.b < 30, "got {red:?}");
    let black = decoded.get(13, 4);
    assert!(black.r < 25 && black.g < 25 && black.b < 25, "got {black:?}");
}

#[test]
fn adobe_cmyk_jpeg_decodes_to_rgb() {
    assert_red_and_black(&encode_cmyk(&cmyk_ink(), jpeg_encoder::ColorType::Cmyk));
}

#[test]
fn adobe_ycck_jpeg_decodes_to_rgb() {
    let jpeg = encode_cmyk(&cmyk_ink(), jpeg_encoder::ColorType::CmykAsYcck);
    assert_red_and_black(&jpeg);
}

#[test]
fn plain_cmyk_jpeg_without_adobe_marker_decodes_to_rgb() {
    // The encoder inverts what it is given, so inverted input stores plain ink
    let inverted: Vec<u8> = cmyk_ink().iter().map(|v| 255 - v).collect();
    let jpeg = strip_app14(&encode_cmyk(&inverted, jpeg_encoder::ColorType::Cmyk));
    assert!(!jpeg.windows(5).any(|w| w == b"Adobe"));
    assert_red_and_black(&jpeg);
}

#[test]
fn png_file_roundtrip_keeps_alpha() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("alpha.png");
    let buffer = PixelBuffer::from_fn(9, 7, |x, y| {
        Color::rgba((x * 20) as u8, (y * 30) as u8, 7, (x * 28 + y) as u8)
    })
    .unwrap();
    imaging::write(&buffer, &path, ImageFormat::Png, &RenderSettings::default()).unwrap();

    let back = imaging::read(&path).unwrap();
    assert_eq!(back.format(), PixelFormat::Rgba);
    assert_eq!(back.to_rgba_vec(), buffer.to_rgba_vec());
}

#[test]
fn resize_modes_honor_their_size_contracts() {
    let settings = RenderSettings::default();
    for (sw, sh) in [(300, 200), (120, 400), (64, 64)] {
        let source = gradient(sw, sh);
        for (tw, th) in [(100, 100), (250, 90), (30, 200)] {
            let letterbox = ResizeRequest::letterbox(tw, th, FillPolicy::Transparent, Anchor::Center);
            let out = imaging::resize(&source, &letterbox, &settings).unwrap();
            assert_eq!(out.dimensions(), (tw, th));

            let cover = ResizeRequest::cover(tw, th, Anchor::Center);
            let out = imaging::resize(&source, &cover, &settings).unwrap();
            assert_eq!(out.dimensions(), (tw, th));

            let (fw, fh) = imaging::resize(&source, &ResizeRequest::fit(tw, th), &settings)
                .unwrap()
                .dimensions();
            assert!(fw <= tw && fh <= th);
            assert!(fw == tw || fh == th, "{sw}x{sh} into {tw}x{th} gave {fw}x{fh}");
            let source_aspect = sw as f64 / sh as f64;
            let fit_aspect = fw as f64 / fh as f64;
            // Flooring one axis moves the aspect by less than one pixel
            assert!((source_aspect - fit_aspect).abs() <= source_aspect / fh.min(fw) as f64);
        }
    }
}

#[test]
fn shadow_grows_canvas_and_chain_dimensions_are_stable() {
    let settings = RenderSettings {
        filters: vec![Filter::Shadow(Shadow::new(10, 10))],
        ..RenderSettings::default()
    };
    let photo = PixelBuffer::filled(800, 600, Color::WHITE).unwrap();
    let out = imaging::apply_filters(&photo, &settings).unwrap();
    assert_eq!(out.dimensions(), (820, 620));
    assert_eq!(imaging::apply_filter_dimensions(800, 600, &settings), (820, 620));
    assert_eq!(
        imaging::apply_filter_dimensions(800, 600, &settings),
        imaging::apply_filter_dimensions(800, 600, &settings)
    );
}

#[test]
fn rotating_by_pi_twice_restores_pixels() {
    let source = gradient(31, 17);
    let rotate = Rotate::new(PI);
    let settings = RenderSettings::default();
    let once = rotate.apply(&source, &settings).unwrap();
    let twice = rotate.apply(&once, &settings).unwrap();
    assert_eq!(twice.dimensions(), source.dimensions());
    assert_eq!(twice.to_rgba_vec(), source.to_rgba_vec());
}

#[test]
fn settings_file_drives_a_batch() {
    let tmp = TempDir::new().unwrap();
    let settings_path = tmp.path().join("settings.toml");
    std::fs::write(
        &settings_path,
        r##"
fill = "#ffffff"

[[filters]]
type = "grayscale"
"##,
    )
    .unwrap();
    let settings = config::load_settings(&settings_path).unwrap();

    let inputs: Vec<_> = (0..4)
        .map(|i| {
            let path = tmp.path().join(format!("in{i}.png"));
            imaging::write(
                &gradient(40 + i * 10, 30),
                &path,
                ImageFormat::Png,
                &settings,
            )
            .unwrap();
            path
        })
        .collect();

    let job = RenderJob {
        operations: vec![
            Operation::Resize(ResizeRequest::letterbox(
                32,
                32,
                FillPolicy::Color(Color::WHITE),
                Anchor::Center,
            )),
            Operation::Filters,
        ],
        format: Some(ImageFormat::Png),
    };
    let out_dir = tmp.path().join("out");
    let report = process::process_files(&inputs, &out_dir, &job, &settings).unwrap();
    assert!(report.failed.is_empty());
    assert_eq!(report.processed.len(), 4);

    for image in &report.processed {
        let rendered = imaging::read(&image.output).unwrap();
        assert_eq!(rendered.dimensions(), (32, 32));
        let px = rendered.get(16, 16);
        assert_eq!((px.r, px.g), (px.g, px.b), "not gray: {px:?}");
        assert_eq!(rendered.get(0, 0), Color::WHITE);
    }
}

#[test]
fn stock_settings_file_loads_as_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("settings.toml");
    std::fs::write(&path, config::stock_settings_toml()).unwrap();
    assert_eq!(config::load_settings(&path).unwrap(), RenderSettings::default());
}
