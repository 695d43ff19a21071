//! Layout Engine
//!
//! Computes absolute geometry for the border, QR symbol, logo and company
//! text. Independent of the render backend: the raster and vector
//! compositors consume the same [`LayoutGeometry`].
//!
//! ```text
//! Standard (stacked logo)        Side-by-Side
//! +-------------------+          +--------+---------+--------+
//! |      [logo]       |          |        |         |        |
//! |  +-------------+  |          | (logo) |   QR    |  text  |
//! |  |     QR      |  |          |        |         |        |
//! |  +-------------+  |          +--------+---------+--------+
//! |       text        |
//! +-------------------+
//! ```

use crate::style::{Layout, LogoPosition, StyleConfig};

pub const STANDARD_BORDER: u32 = 20;
/// Distance between a corner logo and the symbol edge
pub const EMBED_INSET: u32 = 20;
pub const LOGO_BAND_MIN: u32 = 80;
pub const LOGO_BAND_MAX: u32 = 120;
const LOGO_BAND_RATIO: f64 = 0.15;
/// Stacked logos keep this much headroom inside their band
const LOGO_BAND_FIT: f64 = 1.25;

pub const SIDE_PADDING: u32 = 40;
pub const SIDE_PANEL: u32 = 300;

pub const PAD_RATIO: f64 = 1.2;
const PAD_CORNER_RATIO: f64 = 0.15;

pub const MIN_FONT_SIZE: u32 = 12;
const STANDARD_FONT_DIVISOR: u32 = 20;
const SIDE_FONT_DIVISOR: u32 = 15;

/// Why the geometry is computed; selects the Standard logo sub-mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutIntent {
    Preview,
    Download,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn square(x: i32, y: i32, side: u32) -> Self {
        Self::new(x, y, side, side)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadShape {
    Circle,
    RoundedRect { radius: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoMode {
    /// In a reserved band above the symbol
    Stacked,
    /// Overlaid on the symbol itself
    Embedded,
    /// Centered in the left side panel
    Panel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoPlacement {
    pub logo: Rect,
    pub pad: Rect,
    pub pad_shape: PadShape,
    pub mode: LogoMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPlacement {
    /// Center of the text run
    pub x: i32,
    pub y: i32,
    pub font_size: u32,
    pub shadow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutGeometry {
    pub width: u32,
    pub height: u32,
    pub qr: Rect,
    pub logo: Option<LogoPlacement>,
    pub text: Option<TextPlacement>,
}

/// Compute the geometry for a style and the symbol's pixel size
pub fn compute_geometry(style: &StyleConfig, qr_size: u32, intent: LayoutIntent) -> LayoutGeometry {
    match style.layout {
        Layout::Standard => standard_geometry(style, qr_size, intent),
        Layout::SideBySide => side_by_side_geometry(style, qr_size),
    }
}

// =============================================================================
// Standard
// =============================================================================

fn standard_geometry(style: &StyleConfig, qr_size: u32, intent: LayoutIntent) -> LayoutGeometry {
    let border = STANDARD_BORDER;
    let width = qr_size + 2 * border;

    let mode = if !style.has_logo() {
        None
    } else if intent == LayoutIntent::Download && style.logo_position == LogoPosition::Center {
        Some(LogoMode::Stacked)
    } else {
        Some(LogoMode::Embedded)
    };

    let logo_band = match mode {
        Some(LogoMode::Stacked) => logo_band_height(qr_size),
        _ => 0,
    };

    let font_size = (width / STANDARD_FONT_DIVISOR).max(MIN_FONT_SIZE);
    let text_band = if style.company_text.is_some() { 2 * font_size } else { 0 };

    let height = border + logo_band + qr_size + text_band + border;
    let qr = Rect::square(border as i32, (border + logo_band) as i32, qr_size);

    let logo = mode.map(|mode| {
        let logo = match mode {
            LogoMode::Stacked => {
                let side = percent_of(qr_size, style.logo_size_percent)
                    .min((logo_band as f64 / LOGO_BAND_FIT).floor() as u32);
                Rect::square(
                    ((width - side) / 2) as i32,
                    (border + (logo_band - side) / 2) as i32,
                    side,
                )
            }
            _ => embedded_logo_rect(&qr, percent_of(qr_size, style.logo_size_percent), style.logo_position),
        };
        place_logo(logo, style, mode)
    });

    let text = style.company_text.as_ref().map(|_| TextPlacement {
        x: (width / 2) as i32,
        y: (border + logo_band + qr_size + text_band / 2) as i32,
        font_size,
        shadow: true,
    });

    LayoutGeometry {
        width,
        height,
        qr,
        logo,
        text,
    }
}

fn logo_band_height(qr_size: u32) -> u32 {
    ((qr_size as f64 * LOGO_BAND_RATIO).round() as u32).clamp(LOGO_BAND_MIN, LOGO_BAND_MAX)
}

/// Logo box overlaid on the symbol, at its center or inset from a corner
fn embedded_logo_rect(qr: &Rect, side: u32, position: LogoPosition) -> Rect {
    let inset = EMBED_INSET as i32;
    let near_x = qr.x + inset;
    let near_y = qr.y + inset;
    let far_x = qr.x + qr.width as i32 - side as i32 - inset;
    let far_y = qr.y + qr.height as i32 - side as i32 - inset;

    let (x, y) = match position {
        LogoPosition::Center => (
            qr.x + (qr.width as i32 - side as i32) / 2,
            qr.y + (qr.height as i32 - side as i32) / 2,
        ),
        LogoPosition::TopLeft => (near_x, near_y),
        LogoPosition::TopRight => (far_x, near_y),
        LogoPosition::BottomLeft => (near_x, far_y),
        LogoPosition::BottomRight => (far_x, far_y),
    };
    Rect::square(x, y, side)
}

// =============================================================================
// Side-by-Side
// =============================================================================

fn side_by_side_geometry(style: &StyleConfig, qr_size: u32) -> LayoutGeometry {
    let padding = SIDE_PADDING;
    let panel = SIDE_PANEL;
    let strip = panel + padding;

    let width = qr_size + 2 * panel + 2 * padding;
    let height = qr_size + 2 * padding;
    let qr = Rect::square(strip as i32, padding as i32, qr_size);

    let logo = if style.has_logo() {
        let side = (panel - 2 * padding).min(qr_size);
        let logo = Rect::square(((strip - side) / 2) as i32, ((height - side) / 2) as i32, side);
        Some(place_logo(logo, style, LogoMode::Panel))
    } else {
        None
    };

    let text = style.company_text.as_ref().map(|_| TextPlacement {
        x: (strip + qr_size + strip / 2) as i32,
        y: (height / 2) as i32,
        font_size: (height / SIDE_FONT_DIVISOR).max(MIN_FONT_SIZE),
        shadow: false,
    });

    LayoutGeometry {
        width,
        height,
        qr,
        logo,
        text,
    }
}

// =============================================================================
// Shared
// =============================================================================

fn percent_of(size: u32, percent: u8) -> u32 {
    ((size as f64 * percent as f64 / 100.0).round() as u32).max(1)
}

/// Wrap a logo box with its backdrop pad
fn place_logo(logo: Rect, style: &StyleConfig, mode: LogoMode) -> LogoPlacement {
    let pad_side = (logo.width as f64 * PAD_RATIO).round() as u32;
    let grow = (pad_side - logo.width) as i32 / 2;
    let pad = Rect::square(logo.x - grow, logo.y - grow, pad_side);

    let pad_shape = if style.module_style.is_round() {
        PadShape::Circle
    } else {
        PadShape::RoundedRect {
            radius: (pad_side as f64 * PAD_CORNER_RATIO).round() as u32,
        }
    };

    LogoPlacement {
        logo,
        pad,
        pad_shape,
        mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::LogoAsset;
    use crate::style::ModuleStyle;

    fn with_logo(style: StyleConfig) -> StyleConfig {
        StyleConfig {
            logo: Some(LogoAsset {
                key: "logos/test.png".to_string(),
                digest: "d".to_string(),
            }),
            ..style
        }
    }

    #[test]
    fn test_plain_standard() {
        let geometry = compute_geometry(&StyleConfig::default(), 300, LayoutIntent::Preview);
        assert_eq!(geometry.width, 340);
        assert_eq!(geometry.height, 340);
        assert_eq!(geometry.qr, Rect::square(20, 20, 300));
        assert!(geometry.logo.is_none());
        assert!(geometry.text.is_none());
    }

    #[test]
    fn test_standard_text_band_without_logo_band() {
        let style = StyleConfig {
            company_text: Some("Acme".to_string()),
            ..Default::default()
        };
        let geometry = compute_geometry(&style, 800, LayoutIntent::Download);
        let text = geometry.text.unwrap();

        // font = 840 / 20 = 42, band = 84
        assert_eq!(text.font_size, 42);
        assert_eq!(geometry.height, 800 + 2 * STANDARD_BORDER + 84);
        assert_eq!(geometry.qr.y, STANDARD_BORDER as i32);
        assert_eq!(text.x, 420);
        assert_eq!(text.y, 20 + 800 + 42);
        assert!(text.shadow);
    }

    #[test]
    fn test_font_size_floor() {
        let style = StyleConfig {
            company_text: Some("Acme".to_string()),
            ..Default::default()
        };
        let geometry = compute_geometry(&style, 100, LayoutIntent::Preview);
        assert_eq!(geometry.text.unwrap().font_size, MIN_FONT_SIZE);
    }

    #[test]
    fn test_stacked_logo_for_download_center() {
        let style = with_logo(StyleConfig::default());
        let geometry = compute_geometry(&style, 800, LayoutIntent::Download);
        let logo = geometry.logo.unwrap();

        // band = clamp(120, 80, 120)
        assert_eq!(logo.mode, LogoMode::Stacked);
        assert_eq!(geometry.qr.y, 20 + 120);
        assert_eq!(geometry.height, 20 + 120 + 800 + 20);
        // 25% of 800 = 200, capped to 120 / 1.25 = 96
        assert_eq!(logo.logo.width, 96);
        assert_eq!(logo.logo.x, (840 - 96) / 2);
        assert_eq!(logo.logo.y, 20 + 12);
        assert!(logo.pad.y >= 20 && logo.pad.y + logo.pad.height as i32 <= 140);
    }

    #[test]
    fn test_logo_band_minimum() {
        assert_eq!(logo_band_height(300), 80);
        assert_eq!(logo_band_height(600), 90);
        assert_eq!(logo_band_height(2000), 120);
    }

    #[test]
    fn test_embedded_center_for_preview() {
        let style = with_logo(StyleConfig::default());
        let geometry = compute_geometry(&style, 300, LayoutIntent::Preview);
        let logo = geometry.logo.unwrap();

        assert_eq!(logo.mode, LogoMode::Embedded);
        assert_eq!(geometry.height, 340);
        assert_eq!(logo.logo.width, 75);
        assert_close(logo.logo.center(), geometry.qr.center());
    }

    fn assert_close(a: (f64, f64), b: (f64, f64)) {
        assert!((a.0 - b.0).abs() <= 0.5 && (a.1 - b.1).abs() <= 0.5, "{:?} vs {:?}", a, b);
    }

    #[test]
    fn test_embedded_corner_positions() {
        let qr = Rect::square(20, 20, 300);
        assert_eq!(embedded_logo_rect(&qr, 60, LogoPosition::TopLeft), Rect::square(40, 40, 60));
        assert_eq!(embedded_logo_rect(&qr, 60, LogoPosition::TopRight), Rect::square(240, 40, 60));
        assert_eq!(embedded_logo_rect(&qr, 60, LogoPosition::BottomLeft), Rect::square(40, 240, 60));
        assert_eq!(embedded_logo_rect(&qr, 60, LogoPosition::BottomRight), Rect::square(240, 240, 60));
    }

    #[test]
    fn test_corner_logo_is_embedded_even_for_download() {
        let style = with_logo(StyleConfig {
            logo_position: LogoPosition::BottomRight,
            ..Default::default()
        });
        let geometry = compute_geometry(&style, 800, LayoutIntent::Download);
        assert_eq!(geometry.logo.unwrap().mode, LogoMode::Embedded);
        assert_eq!(geometry.height, 840);
    }

    #[test]
    fn test_pad_is_larger_and_centered() {
        let style = with_logo(StyleConfig::default());
        let geometry = compute_geometry(&style, 300, LayoutIntent::Preview);
        let logo = geometry.logo.unwrap();
        assert_eq!(logo.pad.width, 90);
        assert_close(logo.pad.center(), logo.logo.center());
        assert_eq!(logo.pad_shape, PadShape::RoundedRect { radius: 14 });
    }

    #[test]
    fn test_pad_shape_follows_module_style() {
        for module_style in [ModuleStyle::Dots, ModuleStyle::Rounded] {
            let style = with_logo(StyleConfig {
                module_style,
                ..Default::default()
            });
            let geometry = compute_geometry(&style, 300, LayoutIntent::Preview);
            assert_eq!(geometry.logo.unwrap().pad_shape, PadShape::Circle);
        }
    }

    #[test]
    fn test_side_by_side() {
        let style = with_logo(StyleConfig {
            layout: Layout::SideBySide,
            company_text: Some("Acme".to_string()),
            ..Default::default()
        });
        let geometry = compute_geometry(&style, 800, LayoutIntent::Download);

        assert_eq!(geometry.width, 800 + 600 + 80);
        assert_eq!(geometry.height, 880);
        assert_eq!(geometry.qr, Rect::square(340, 40, 800));

        let logo = geometry.logo.unwrap();
        assert_eq!(logo.mode, LogoMode::Panel);
        assert_eq!(logo.logo.width, 220);
        assert_eq!(logo.logo.center(), (170.0, 440.0));

        let text = geometry.text.unwrap();
        assert_eq!((text.x, text.y), (340 + 800 + 170, 440));
        assert_eq!(text.font_size, 880 / 15);
        assert!(!text.shadow);
    }

    #[test]
    fn test_side_by_side_small_symbol_limits_logo() {
        let style = with_logo(StyleConfig {
            layout: Layout::SideBySide,
            ..Default::default()
        });
        let geometry = compute_geometry(&style, 150, LayoutIntent::Preview);
        assert_eq!(geometry.logo.unwrap().logo.width, 150);
    }

    #[test]
    fn test_geometry_is_pure() {
        let style = with_logo(StyleConfig {
            company_text: Some("Acme".to_string()),
            ..Default::default()
        });
        let a = compute_geometry(&style, 512, LayoutIntent::Download);
        let b = compute_geometry(&style, 512, LayoutIntent::Download);
        assert_eq!(a, b);
    }
}
