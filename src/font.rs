//! Font resolution and text rasterization for the banner strips
//!
//! The `font` setting names a family ("liberation-sans"); fontconfig
//! resolves it to a file path and fontdue rasterizes glyphs. Text is blended
//! in software over the solid banner background, so no render extension is
//! needed on the wire.

use anyhow::{Context, Result, anyhow};
use fontconfig::{Fontconfig, Pattern};
use fontdue::{Font, FontSettings};
use std::ffi::CString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::color::HexColor;
use crate::config::Settings;
use crate::constants::banner;

/// Paths tried when fontconfig cannot resolve the configured family
const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
];

/// Map a Pango-style size token to a pixel size; bare numbers are accepted
pub fn size_to_pixels(token: &str) -> f32 {
    match token.to_ascii_lowercase().as_str() {
        "xx-small" => 9.0,
        "x-small" => 11.0,
        "small" => 13.0,
        "medium" => 16.0,
        "large" => 19.0,
        "x-large" => 24.0,
        "xx-large" => 32.0,
        other => match other.parse::<f32>() {
            Ok(value) if value > 0.0 => value,
            _ => {
                warn!(size = other, "unrecognized font size, using small");
                13.0
            }
        },
    }
}

/// Translate the `weight` setting into a fontconfig style name
fn weight_to_style(weight: &str) -> Option<&'static str> {
    match weight.to_ascii_lowercase().as_str() {
        "bold" => Some("Bold"),
        "medium" => Some("Medium"),
        "light" => Some("Light"),
        "black" => Some("Black"),
        "thin" => Some("Thin"),
        "normal" | "regular" | "" => None,
        other => {
            debug!(weight = other, "unrecognized font weight, matching any style");
            None
        }
    }
}

/// Resolve a family name (plus weight) to a font file via fontconfig.
/// Hyphenated families like "liberation-sans" are normalized before the
/// query so the shipped default matches "Liberation Sans".
fn find_font_path(family: &str, weight: &str) -> Result<PathBuf> {
    let fc = Fontconfig::new().context("failed to initialize fontconfig")?;
    let family = family.replace('-', " ");

    let mut pattern = Pattern::new(&fc);
    let family_cstr = CString::new(family.as_str())
        .with_context(|| format!("invalid font family name: {family}"))?;
    pattern.add_string(fontconfig::FC_FAMILY, &family_cstr);

    if let Some(style) = weight_to_style(weight) {
        let style_cstr =
            CString::new(style).with_context(|| format!("invalid font style name: {style}"))?;
        pattern.add_string(fontconfig::FC_STYLE, &style_cstr);
    }

    let matched = pattern.font_match();

    // Fontconfig matches fuzzily and may hand back a substitute family;
    // treat that as "not installed" so the fallback list takes over
    if let Some(matched_family) = matched.get_string(fontconfig::FC_FAMILY)
        && !matched_family.eq_ignore_ascii_case(&family)
    {
        return Err(anyhow!(
            "font family '{family}' not found, fontconfig offered '{matched_family}' instead"
        ));
    }

    let file_path = matched
        .filename()
        .with_context(|| format!("no font file found for '{family}'"))?;
    let path = PathBuf::from(file_path);
    if !path.exists() {
        return Err(anyhow!(
            "font file '{}' from fontconfig does not exist",
            path.display()
        ));
    }

    debug!(family, weight, path = %path.display(), "resolved font via fontconfig");
    Ok(path)
}

/// A loaded face at a fixed pixel size
pub struct FontRenderer {
    font: Font,
    size: f32,
    ascent: f32,
    line_height: u16,
}

impl FontRenderer {
    /// Discover and load the configured family, falling back to known
    /// system font paths when the family is missing
    pub fn new(family: &str, weight: &str, size: f32) -> Result<Self> {
        match find_font_path(family, weight) {
            Ok(path) => match Self::from_path(&path, size) {
                Ok(renderer) => return Ok(renderer),
                Err(err) => {
                    warn!(family, path = %path.display(), %err, "failed to load discovered font, trying fallbacks");
                }
            },
            Err(err) => warn!(family, %err, "font discovery failed, trying fallback paths"),
        }

        for &path in FALLBACK_FONTS {
            if let Ok(renderer) = Self::from_path(Path::new(path), size) {
                info!(path, "using fallback font");
                return Ok(renderer);
            }
        }

        Err(anyhow!(
            "no usable font for family '{family}'; tried fontconfig and fallback paths {FALLBACK_FONTS:?}"
        ))
    }

    fn from_path(path: &Path, size: f32) -> Result<Self> {
        let font_data = fs::read(path)
            .with_context(|| format!("failed to read font file {}", path.display()))?;
        let font = Font::from_bytes(font_data, FontSettings::default())
            .map_err(|err| anyhow!("failed to parse font {}: {err}", path.display()))?;

        let (ascent, line_height) = match font.horizontal_line_metrics(size) {
            Some(metrics) => (metrics.ascent, (metrics.ascent - metrics.descent).ceil()),
            // Fallback proportions for faces without horizontal metrics
            None => (size * 0.8, size * 1.2),
        };

        Ok(Self {
            font,
            size,
            ascent,
            line_height: line_height.ceil() as u16,
        })
    }

    /// Height of one line box, in pixels
    pub fn line_height(&self) -> u16 {
        self.line_height
    }

    /// Advance width of a run of text, in pixels
    pub fn text_width(&self, text: &str) -> u16 {
        let width: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, self.size).advance_width)
            .sum();
        width.ceil().min(f32::from(u16::MAX)) as u16
    }

    /// Width of a fixed slot measured in character cells (digit advance)
    pub fn cell_width(&self, chars: u16) -> u16 {
        let advance = self.font.metrics('0', self.size).advance_width;
        (advance * f32::from(chars)).ceil().min(f32::from(u16::MAX)) as u16
    }

    /// Blend a run of text into the canvas; (x, y) is the top-left of the
    /// line box and clipping happens per pixel
    pub fn draw(&self, canvas: &mut Canvas, x: i32, y: i32, text: &str, fg: HexColor) {
        let baseline = y + self.ascent.round() as i32;
        let mut cursor = x as f32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.size);
            let glyph_x = cursor.round() as i32 + metrics.xmin;
            let glyph_top = baseline - (metrics.height as i32 + metrics.ymin);
            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = f32::from(bitmap[gy * metrics.width + gx]) / 255.0;
                    if coverage > 0.0 {
                        canvas.blend(glyph_x + gx as i32, glyph_top + gy as i32, coverage, fg);
                    }
                }
            }
            cursor += metrics.advance_width;
        }
    }
}

/// The two faces a banner needs: the configured label face and the small
/// normal-weight face used for the escape hint
pub struct FontSet {
    pub label: FontRenderer,
    pub hint: FontRenderer,
}

impl FontSet {
    pub fn load(settings: &Settings) -> Result<Self> {
        let label = FontRenderer::new(
            &settings.font,
            &settings.weight,
            size_to_pixels(&settings.size),
        )?;
        let hint = FontRenderer::new(
            banner::ESC_HINT_FONT,
            "normal",
            size_to_pixels(banner::ESC_HINT_SIZE),
        )?;
        Ok(Self { label, hint })
    }
}

/// Software canvas one banner strip is composed into before upload
pub struct Canvas {
    width: u16,
    height: u16,
    pixels: Vec<u32>,
}

impl Canvas {
    pub fn filled(width: u16, height: u16, color: HexColor) -> Self {
        Self {
            width,
            height,
            pixels: vec![color.to_pixel(); usize::from(width) * usize::from(height)],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Pixel rows, 0x00RRGGBB, row-major
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Blend a foreground color over the current pixel at the given coverage
    fn blend(&mut self, x: i32, y: i32, coverage: f32, fg: HexColor) {
        if x < 0 || y < 0 || x >= i32::from(self.width) || y >= i32::from(self.height) {
            return;
        }
        let index = y as usize * usize::from(self.width) + x as usize;
        let bg = self.pixels[index];
        let mix = |bg_channel: u32, fg_channel: u8| -> u32 {
            let bg_channel = bg_channel as f32;
            (bg_channel + (f32::from(fg_channel) - bg_channel) * coverage).round() as u32 & 0xFF
        };
        let r = mix((bg >> 16) & 0xFF, fg.r);
        let g = mix((bg >> 8) & 0xFF, fg.g);
        let b = mix(bg & 0xFF, fg.b);
        self.pixels[index] = (r << 16) | (g << 8) | b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_tokens_map_monotonically() {
        let sizes: Vec<f32> = [
            "xx-small", "x-small", "small", "medium", "large", "x-large", "xx-large",
        ]
        .iter()
        .map(|token| size_to_pixels(token))
        .collect();
        assert!(sizes.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn size_tokens_are_case_insensitive() {
        assert_eq!(size_to_pixels("Small"), size_to_pixels("small"));
    }

    #[test]
    fn numeric_sizes_are_accepted() {
        assert_eq!(size_to_pixels("18"), 18.0);
        assert_eq!(size_to_pixels("13.5"), 13.5);
    }

    #[test]
    fn unknown_sizes_fall_back_to_small() {
        assert_eq!(size_to_pixels("enormous"), size_to_pixels("small"));
        assert_eq!(size_to_pixels("-4"), size_to_pixels("small"));
    }

    #[test]
    fn weight_styles() {
        assert_eq!(weight_to_style("bold"), Some("Bold"));
        assert_eq!(weight_to_style("BOLD"), Some("Bold"));
        assert_eq!(weight_to_style("normal"), None);
        assert_eq!(weight_to_style("wiggly"), None);
    }

    #[test]
    fn canvas_starts_filled_with_the_background() {
        let bg = HexColor {
            r: 0x00,
            g: 0x7A,
            b: 0x33,
        };
        let canvas = Canvas::filled(4, 2, bg);
        assert_eq!(canvas.pixels().len(), 8);
        assert!(canvas.pixels().iter().all(|&px| px == bg.to_pixel()));
    }

    #[test]
    fn full_coverage_blend_replaces_the_pixel() {
        let bg = HexColor { r: 0, g: 0, b: 0 };
        let fg = HexColor {
            r: 0xFF,
            g: 0xFF,
            b: 0xFF,
        };
        let mut canvas = Canvas::filled(2, 1, bg);
        canvas.blend(1, 0, 1.0, fg);
        assert_eq!(canvas.pixels()[1], fg.to_pixel());
        assert_eq!(canvas.pixels()[0], bg.to_pixel());
    }

    #[test]
    fn half_coverage_blend_mixes_channels() {
        let bg = HexColor { r: 0, g: 0, b: 0 };
        let fg = HexColor {
            r: 0xFF,
            g: 0xFF,
            b: 0xFF,
        };
        let mut canvas = Canvas::filled(1, 1, bg);
        canvas.blend(0, 0, 0.5, fg);
        let px = canvas.pixels()[0];
        assert_eq!((px >> 16) & 0xFF, 128);
    }

    #[test]
    fn out_of_bounds_blend_is_clipped() {
        let bg = HexColor { r: 0, g: 0, b: 0 };
        let fg = HexColor {
            r: 0xFF,
            g: 0xFF,
            b: 0xFF,
        };
        let mut canvas = Canvas::filled(2, 2, bg);
        canvas.blend(-1, 0, 1.0, fg);
        canvas.blend(0, 5, 1.0, fg);
        canvas.blend(2, 0, 1.0, fg);
        assert!(canvas.pixels().iter().all(|&px| px == bg.to_pixel()));
    }

    #[test]
    fn discovery_resolves_installed_families() {
        // Environment-dependent: only assert when the family is present
        for family in ["Liberation Sans", "DejaVu Sans", "liberation-sans"] {
            if let Ok(path) = find_font_path(family, "bold") {
                assert!(path.is_absolute());
            }
        }
    }
}
