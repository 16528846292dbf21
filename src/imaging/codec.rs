//! Decoding bytes into [`PixelBuffer`]s and encoding them back.
//!
//! | Format | Decode | Encode |
//! |---|---|---|
//! | **JPEG** | `image` (YCbCr/gray), `jpeg-decoder` for 4-component CMYK | `image` JPEG encoder, quality from settings, flattened |
//! | **PNG** | `png` directly for palette images, otherwise `image` | `image` PNG encoder, full alpha |
//! | **GIF** | `gif` with indexed output, first frame only | `gif`, palette kept or quantized with `color_quant` |
//!
//! The format is always sniffed from the content signature; file extensions
//! only matter when choosing an *output* format ([`ImageFormat::from_path`]).

use super::buffer::{Palette, PixelBuffer, PixelFormat, Pixels};
use super::color::{Color, FillPolicy};
use super::error::{ImagingError, Result};
use super::jpeg_markers::scan_jpeg_header;
use super::params::Quality;
use crate::config::RenderSettings;
use image::ImageEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Gif,
}

impl ImageFormat {
    /// Detect the format from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Result<Self> {
        match image::guess_format(bytes) {
            Ok(image::ImageFormat::Jpeg) => Ok(ImageFormat::Jpeg),
            Ok(image::ImageFormat::Png) => Ok(ImageFormat::Png),
            Ok(image::ImageFormat::Gif) => Ok(ImageFormat::Gif),
            Ok(other) => Err(ImagingError::decode(format!(
                "unsupported image format: {other:?}"
            ))),
            Err(_) => Err(ImagingError::decode("unrecognized image signature")),
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical file extension.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
        })
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_extension(s.trim()).ok_or_else(|| format!("unknown image format: {s}"))
    }
}

/// What [`identify`] reports about an encoded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub color_model: PixelFormat,
    pub has_alpha: bool,
}

/// Format, dimensions and color model of an encoded image.
pub fn identify(bytes: &[u8]) -> Result<ImageInfo> {
    let format = ImageFormat::sniff(bytes)?;
    let buffer = decode(bytes)?;
    Ok(ImageInfo {
        format,
        width: buffer.width(),
        height: buffer.height(),
        color_model: buffer.format(),
        has_alpha: buffer.has_alpha(),
    })
}

/// Decode an encoded image, detecting the format from its content.
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub fn decode(bytes: &[u8]) -> Result<PixelBuffer> {
    match ImageFormat::sniff(bytes)? {
        ImageFormat::Jpeg => decode_jpeg(bytes),
        ImageFormat::Png => decode_png(bytes),
        ImageFormat::Gif => decode_gif(bytes),
    }
}

/// Read and decode a file.
pub fn read(path: &Path) -> Result<PixelBuffer> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

/// Encode `buffer` as `format` and write it to `path`.
pub fn write(
    buffer: &PixelBuffer,
    path: &Path,
    format: ImageFormat,
    settings: &RenderSettings,
) -> Result<()> {
    let bytes = encode(buffer, format, settings)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Encode a buffer into `format`.
///
/// Transparency handling depends on the target:
/// - JPEG has no alpha, so pixels are composited onto the settings fill,
///   or onto white when the fill is transparent.
/// - GIF keeps an exact transparent index unless the fill is a color, in
///   which case the fill is composited in first.
/// - PNG keeps full alpha.
pub fn encode(
    buffer: &PixelBuffer,
    format: ImageFormat,
    settings: &RenderSettings,
) -> Result<Vec<u8>> {
    match format {
        ImageFormat::Jpeg => encode_jpeg(buffer, settings),
        ImageFormat::Png => encode_png(buffer),
        ImageFormat::Gif => encode_gif(buffer, settings.fill),
    }
}

// ---------------------------------------------------------------------------
// JPEG
// ---------------------------------------------------------------------------

fn decode_jpeg(bytes: &[u8]) -> Result<PixelBuffer> {
    let header = scan_jpeg_header(bytes);
    if header.is_cmyk() {
        debug!(adobe = header.has_adobe_marker(), "decoding CMYK JPEG");
        return decode_cmyk_jpeg(bytes, header.has_adobe_marker());
    }

    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
        .map_err(|e| ImagingError::decode(e.to_string()))?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let data = rgb
        .into_raw()
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();
    PixelBuffer::rgb(width, height, data)
}

/// `jpeg-decoder` inverts 4-component samples unconditionally, which is right
/// for Adobe files (stored inverted) and wrong for plain ones. After undoing
/// that where needed, samples are ink amounts: 0 = no ink.
fn decode_cmyk_jpeg(bytes: &[u8], adobe: bool) -> Result<PixelBuffer> {
    let mut decoder = jpeg_decoder::Decoder::new(Cursor::new(bytes));
    let samples = decoder
        .decode()
        .map_err(|e| ImagingError::decode(e.to_string()))?;
    let info = decoder
        .info()
        .ok_or_else(|| ImagingError::decode("JPEG frame header missing"))?;
    if info.pixel_format != jpeg_decoder::PixelFormat::CMYK32 {
        return Err(ImagingError::decode(format!(
            "expected CMYK samples, decoder produced {:?}",
            info.pixel_format
        )));
    }

    let data = samples
        .chunks_exact(4)
        .map(|px| {
            let ink = |v: u8| if adobe { v } else { 255 - v };
            cmyk_to_rgb(ink(px[0]), ink(px[1]), ink(px[2]), ink(px[3]))
        })
        .collect();
    PixelBuffer::rgb(info.width as u32, info.height as u32, data)
}

/// Naive device CMYK to RGB.
fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let white = 255 - k as u32;
    let channel = |ink: u8| ((255 - ink as u32) * white / 255) as u8;
    [channel(c), channel(m), channel(y)]
}

fn encode_jpeg(buffer: &PixelBuffer, settings: &RenderSettings) -> Result<Vec<u8>> {
    let background = match settings.fill {
        FillPolicy::Color(c) => c,
        FillPolicy::Transparent => Color::WHITE,
    };
    let flat = buffer.flatten(background);
    let Pixels::Rgb(data) = flat.pixels() else {
        return Err(ImagingError::encode("flattened buffer is not RGB"));
    };
    let quality = Quality::from_fraction(settings.compression_quality);
    debug!(quality = quality.value(), "encoding JPEG");

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.value() as u8)
        .write_image(
            data.as_flattened(),
            flat.width(),
            flat.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| ImagingError::encode(e.to_string()))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

fn decode_png(bytes: &[u8]) -> Result<PixelBuffer> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder
        .read_info()
        .map_err(|e| ImagingError::decode(e.to_string()))?;

    let info = reader.info();
    if info.color_type != png::ColorType::Indexed {
        return decode_png_truecolor(bytes);
    }
    let palette_bytes = info
        .palette
        .as_ref()
        .map(|p| p.to_vec())
        .ok_or_else(|| ImagingError::decode("indexed PNG without PLTE"))?;
    let trns = info.trns.as_ref().map(|t| t.to_vec()).unwrap_or_default();

    let mut raw = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut raw)
        .map_err(|e| ImagingError::decode(e.to_string()))?;
    let indices = unpack_indices(
        &raw,
        frame.width,
        frame.height,
        frame.line_size,
        frame.bit_depth as u8,
    );
    let colors: Vec<[u8; 3]> = palette_bytes
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();

    match single_transparent_index(&trns) {
        Some(transparent) => {
            let palette = Palette::new(colors, transparent)?;
            PixelBuffer::indexed(frame.width, frame.height, indices, palette)
        }
        None => {
            // Graded palette alpha cannot be kept as one transparent index
            let alpha = |i: u8| trns.get(i as usize).copied().unwrap_or(255);
            let mut data = Vec::with_capacity(indices.len());
            for i in indices {
                let [r, g, b] = *colors
                    .get(i as usize)
                    .ok_or_else(|| ImagingError::decode("palette index out of range"))?;
                data.push([r, g, b, alpha(i)]);
            }
            PixelBuffer::rgba(frame.width, frame.height, data)
        }
    }
}

/// `Some(None)` for no tRNS, `Some(Some(i))` when exactly one entry is fully
/// transparent and every other is opaque, `None` otherwise.
fn single_transparent_index(trns: &[u8]) -> Option<Option<u8>> {
    let mut transparent = None;
    for (i, &a) in trns.iter().enumerate() {
        match a {
            255 => {}
            0 if transparent.is_none() => transparent = Some(i as u8),
            _ => return None,
        }
    }
    Some(transparent)
}

/// Expand 1/2/4/8-bit packed palette indices to one byte per pixel.
fn unpack_indices(raw: &[u8], width: u32, height: u32, line_size: usize, depth: u8) -> Vec<u8> {
    let (width, height) = (width as usize, height as usize);
    let depth = depth as usize;
    if depth == 8 {
        return raw
            .chunks(line_size)
            .take(height)
            .flat_map(|row| row[..width].iter().copied())
            .collect();
    }
    let mask = (1u8 << depth) - 1;
    let mut out = Vec::with_capacity(width * height);
    for row in raw.chunks(line_size).take(height) {
        for x in 0..width {
            let bit = x * depth;
            let shift = 8 - depth - bit % 8;
            out.push((row[bit / 8] >> shift) & mask);
        }
    }
    out
}

fn decode_png_truecolor(bytes: &[u8]) -> Result<PixelBuffer> {
    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
        .map_err(|e| ImagingError::decode(e.to_string()))?;
    if img.color().has_alpha() {
        PixelBuffer::from_rgba_image(img.to_rgba8())
    } else {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let data = rgb
            .into_raw()
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        PixelBuffer::rgb(width, height, data)
    }
}

fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>> {
    let (data, color) = match buffer.pixels() {
        Pixels::Rgb(p) => (p.as_flattened().to_vec(), image::ExtendedColorType::Rgb8),
        _ => (
            buffer.to_rgba_vec().as_flattened().to_vec(),
            image::ExtendedColorType::Rgba8,
        ),
    };
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(&data, buffer.width(), buffer.height(), color)
        .map_err(|e| ImagingError::encode(e.to_string()))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// GIF
// ---------------------------------------------------------------------------

fn decode_gif(bytes: &[u8]) -> Result<PixelBuffer> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options
        .read_info(Cursor::new(bytes))
        .map_err(|e| ImagingError::decode(e.to_string()))?;

    let (width, height) = (decoder.width() as u32, decoder.height() as u32);
    let global = decoder.global_palette().map(|p| p.to_vec());
    let frame = decoder
        .read_next_frame()
        .map_err(|e| ImagingError::decode(e.to_string()))?
        .ok_or_else(|| ImagingError::decode("GIF contains no frames"))?;

    let palette_bytes = frame
        .palette
        .clone()
        .or(global)
        .ok_or_else(|| ImagingError::decode("GIF frame has no color table"))?;
    let mut colors: Vec<[u8; 3]> = palette_bytes
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();
    // A transparent index past the table still marks transparency
    if let Some(t) = frame.transparent
        && t as usize >= colors.len()
    {
        debug!(index = t, colors = colors.len(), "padding palette for transparent index");
        colors.resize(t as usize + 1, [0, 0, 0]);
    }

    // Blit the first frame onto the logical screen. Indices past the table
    // become transparent, or entry 0 when there is no transparent index.
    let background = frame.transparent.unwrap_or(0);
    let mut indices = vec![background; width as usize * height as usize];
    let mut out_of_range = 0usize;
    let (left, top) = (frame.left as usize, frame.top as usize);
    let frame_w = frame.width as usize;
    for (row, line) in frame.buffer.chunks(frame_w.max(1)).enumerate() {
        let y = top + row;
        if y >= height as usize {
            break;
        }
        for (col, &idx) in line.iter().enumerate() {
            let x = left + col;
            if x < width as usize {
                indices[y * width as usize + x] = if (idx as usize) < colors.len() {
                    idx
                } else {
                    out_of_range += 1;
                    background
                };
            }
        }
    }
    if out_of_range > 0 {
        debug!(pixels = out_of_range, "GIF pixels index past the color table");
    }
    let palette = Palette::new(colors, frame.transparent)?;
    PixelBuffer::indexed(width, height, indices, palette)
}

fn encode_gif(buffer: &PixelBuffer, fill: FillPolicy) -> Result<Vec<u8>> {
    let (indices, palette) = match (buffer.pixels(), fill) {
        (Pixels::Indexed { indices, palette }, FillPolicy::Transparent) => {
            (indices.clone(), palette.clone())
        }
        (Pixels::Indexed { indices, palette }, FillPolicy::Color(c)) => {
            // The transparent slot becomes the fill color
            let mut colors = palette.colors().to_vec();
            if let Some(t) = palette.transparent() {
                colors[t as usize] = c.to_rgb();
            }
            (indices.clone(), Palette::new(colors, None)?)
        }
        (_, FillPolicy::Color(c)) => quantize(&buffer.flatten(c))?,
        (_, FillPolicy::Transparent) => quantize(buffer)?,
    };
    write_gif(&indices, &palette, buffer.width(), buffer.height())
}

/// Reduce a truecolor buffer to at most 256 palette entries.
///
/// Pixels with alpha below 128 map to a dedicated transparent index. Opaque
/// colors are kept exactly when they fit, otherwise NeuQuant picks them.
fn quantize(buffer: &PixelBuffer) -> Result<(Vec<u8>, Palette)> {
    let pixels = buffer.to_rgba_vec();
    let is_clear = |px: &[u8; 4]| px[3] < 128;
    let has_transparency = pixels.iter().any(is_clear);
    let budget = if has_transparency { 255 } else { 256 };

    let mut exact: HashMap<[u8; 3], u8> = HashMap::new();
    let mut colors: Vec<[u8; 3]> = Vec::new();
    for px in pixels.iter().filter(|px| !is_clear(px)) {
        let rgb = [px[0], px[1], px[2]];
        if exact.contains_key(&rgb) {
            continue;
        }
        if colors.len() == budget {
            colors.clear();
            break;
        }
        exact.insert(rgb, colors.len() as u8);
        colors.push(rgb);
    }

    let mut indices = Vec::with_capacity(pixels.len());
    if !colors.is_empty() || pixels.iter().all(is_clear) {
        for px in &pixels {
            indices.push(exact.get(&[px[0], px[1], px[2]]).copied().unwrap_or(0));
        }
    } else {
        debug!(budget, "quantizing with NeuQuant");
        let opaque: Vec<u8> = pixels
            .iter()
            .filter(|px| !is_clear(px))
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect();
        let nq = color_quant::NeuQuant::new(10, budget, &opaque);
        colors = nq
            .color_map_rgb()
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        for px in &pixels {
            indices.push(nq.index_of(&[px[0], px[1], px[2], 255]) as u8);
        }
    }

    let transparent = if has_transparency {
        let t = colors.len() as u8;
        colors.push([0, 0, 0]);
        for (idx, px) in indices.iter_mut().zip(&pixels) {
            if is_clear(px) {
                *idx = t;
            }
        }
        Some(t)
    } else {
        None
    };
    Ok((indices, Palette::new(colors, transparent)?))
}

fn write_gif(indices: &[u8], palette: &Palette, width: u32, height: u32) -> Result<Vec<u8>> {
    let too_large = || ImagingError::encode(format!("{width}x{height} exceeds GIF limits"));
    let w = u16::try_from(width).map_err(|_| too_large())?;
    let h = u16::try_from(height).map_err(|_| too_large())?;

    let frame = gif::Frame {
        width: w,
        height: h,
        buffer: Cow::Borrowed(indices),
        palette: Some(palette.colors().as_flattened().to_vec()),
        transparent: palette.transparent(),
        ..gif::Frame::default()
    };

    let mut out = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, w, h, &[])
            .map_err(|e| ImagingError::encode(e.to_string()))?;
        encoder
            .write_frame(&frame)
            .map_err(|e| ImagingError::encode(e.to_string()))?;
    }
    Ok(out)
}
