//! Style Resolution
//!
//! Resolves loosely-typed style options (CLI flags, JSON files) into a
//! validated, immutable [`StyleConfig`]. Every field has a product default;
//! a field that is present but malformed is a validation error rather than
//! being silently replaced.

use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::assets::LogoAsset;
use crate::error::{Error, Result};

pub const MIN_PIXEL_SIZE: u32 = 64;
pub const MAX_PIXEL_SIZE: u32 = 4096;
pub const MIN_LOGO_PERCENT: u8 = 10;
pub const MAX_LOGO_PERCENT: u8 = 40;
pub const MAX_COMPANY_TEXT: usize = 255;

// === Resolved Types ===

/// Opaque RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const WHITE: Color = Color(255, 255, 255);
    pub const BLACK: Color = Color(0, 0, 0);

    /// Lowercase `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    pub fn to_rgb(&self) -> RGBColor {
        RGBColor(self.0, self.1, self.2)
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_color(s).ok_or_else(|| {
            Error::validation(
                "border_color",
                format!("invalid color '{}' (expected #RRGGBB, #RGB or a color name)", s.trim()),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ModuleStyle {
    #[default]
    Square,
    Dots,
    Rounded,
}

impl ModuleStyle {
    /// Dots and rounded modules get circular logo backdrops
    pub fn is_round(&self) -> bool {
        matches!(self, ModuleStyle::Dots | ModuleStyle::Rounded)
    }
}

impl FromStr for ModuleStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "square" => Ok(ModuleStyle::Square),
            "dots" | "dot" => Ok(ModuleStyle::Dots),
            "rounded" | "round" => Ok(ModuleStyle::Rounded),
            other => Err(Error::validation(
                "module_style",
                format!("unknown module style '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

impl ErrorCorrection {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCorrection::L => "L",
            ErrorCorrection::M => "M",
            ErrorCorrection::Q => "Q",
            ErrorCorrection::H => "H",
        }
    }
}

impl FromStr for ErrorCorrection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "L" | "LOW" => Ok(ErrorCorrection::L),
            "M" | "MEDIUM" => Ok(ErrorCorrection::M),
            "Q" | "QUARTILE" => Ok(ErrorCorrection::Q),
            "H" | "HIGH" => Ok(ErrorCorrection::H),
            other => Err(Error::validation(
                "error_correction",
                format!("unknown level '{}' (expected L, M, Q or H)", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum LogoPosition {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl FromStr for LogoPosition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "center" | "centre" => Ok(LogoPosition::Center),
            "topleft" => Ok(LogoPosition::TopLeft),
            "topright" => Ok(LogoPosition::TopRight),
            "bottomleft" => Ok(LogoPosition::BottomLeft),
            "bottomright" => Ok(LogoPosition::BottomRight),
            _ => Err(Error::validation(
                "logo_position",
                format!("unknown logo position '{}'", s.trim()),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum Layout {
    #[default]
    Standard,
    SideBySide,
}

impl Layout {
    pub fn slug(&self) -> &'static str {
        match self {
            Layout::Standard => "standard",
            Layout::SideBySide => "sides",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Layout::Standard => "Standard",
            Layout::SideBySide => "Side-by-Side",
        }
    }
}

impl FromStr for Layout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Layout::Standard),
            "sides" | "side-by-side" | "sidebyside" | "side_by_side" => Ok(Layout::SideBySide),
            other => Err(Error::validation("layout", format!("unknown layout '{}'", other))),
        }
    }
}

/// Validated visual parameters for one render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleConfig {
    pub border_color: Color,
    pub module_style: ModuleStyle,
    pub error_correction: ErrorCorrection,
    pub pixel_size: u32,
    pub logo: Option<LogoAsset>,
    pub logo_size_percent: u8,
    pub logo_position: LogoPosition,
    pub company_text: Option<String>,
    pub layout: Layout,
}

impl Default for StyleConfig {
    fn default() -> Self {
        StyleConfig {
            border_color: Color(0x10, 0xb9, 0x81),
            module_style: ModuleStyle::Square,
            error_correction: ErrorCorrection::M,
            pixel_size: 300,
            logo: None,
            logo_size_percent: 25,
            logo_position: LogoPosition::Center,
            company_text: None,
            layout: Layout::Standard,
        }
    }
}

impl StyleConfig {
    /// Level actually requested from the encoder; a logo occludes modules
    pub fn effective_error_correction(&self) -> ErrorCorrection {
        if self.logo.is_some() {
            ErrorCorrection::H
        } else {
            self.error_correction
        }
    }

    pub fn has_logo(&self) -> bool {
        self.logo.is_some()
    }

    /// Same style with the logo dropped, used when the asset vanished
    pub fn without_logo(&self) -> StyleConfig {
        StyleConfig {
            logo: None,
            ..self.clone()
        }
    }
}

// === Raw Options ===

/// Unvalidated style input, as read from a JSON file or CLI flags
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StyleOptions {
    pub border_color: Option<String>,
    pub module_style: Option<String>,
    pub error_correction: Option<String>,
    pub pixel_size: Option<u32>,
    pub logo: Option<LogoAsset>,
    pub logo_size_percent: Option<i64>,
    pub logo_position: Option<String>,
    pub company_text: Option<String>,
    pub layout: Option<String>,
}

impl StyleOptions {
    /// Resolve the options into a concrete style.
    ///
    /// Resolution order for each field:
    /// 1. Parse the provided value (an error if it is malformed)
    /// 2. Fall back to the product default
    pub fn resolve(&self) -> Result<StyleConfig> {
        let defaults = StyleConfig::default();

        let border_color = match &self.border_color {
            Some(c) => c.parse()?,
            None => defaults.border_color,
        };
        let module_style = parse_or(&self.module_style, defaults.module_style)?;
        let error_correction = parse_or(&self.error_correction, defaults.error_correction)?;
        let logo_position = parse_or(&self.logo_position, defaults.logo_position)?;
        let layout = parse_or(&self.layout, defaults.layout)?;

        let pixel_size = self.pixel_size.unwrap_or(defaults.pixel_size);
        if !(MIN_PIXEL_SIZE..=MAX_PIXEL_SIZE).contains(&pixel_size) {
            return Err(Error::validation(
                "pixel_size",
                format!(
                    "{} is outside {}..={}",
                    pixel_size, MIN_PIXEL_SIZE, MAX_PIXEL_SIZE
                ),
            ));
        }

        let logo_size_percent = match self.logo_size_percent {
            Some(p) if (MIN_LOGO_PERCENT as i64..=MAX_LOGO_PERCENT as i64).contains(&p) => p as u8,
            Some(p) => {
                return Err(Error::validation(
                    "logo_size_percent",
                    format!("{} is outside {}..={}", p, MIN_LOGO_PERCENT, MAX_LOGO_PERCENT),
                ))
            }
            None => defaults.logo_size_percent,
        };

        let company_text = match self.company_text.as_deref().map(str::trim) {
            Some(t) if t.chars().count() > MAX_COMPANY_TEXT => {
                return Err(Error::validation(
                    "company_text",
                    format!("longer than {} characters", MAX_COMPANY_TEXT),
                ))
            }
            Some(t) if !t.is_empty() => Some(t.to_string()),
            _ => None,
        };

        Ok(StyleConfig {
            border_color,
            module_style,
            error_correction,
            pixel_size,
            logo: self.logo.clone(),
            logo_size_percent,
            logo_position,
            company_text,
            layout,
        })
    }
}

fn parse_or<T: FromStr<Err = Error>>(value: &Option<String>, default: T) -> Result<T> {
    match value {
        Some(v) => v.parse(),
        None => Ok(default),
    }
}

// === Color Parsing ===

/// Parse a color string, supporting hex (#RRGGBB, #RGB) and named colors
pub fn parse_color(color_str: &str) -> Option<Color> {
    let color_str = color_str.trim();

    if color_str.starts_with('#') {
        return parse_hex_color(color_str);
    }

    match color_str.to_lowercase().as_str() {
        "white" => Some(Color(255, 255, 255)),
        "black" => Some(Color(0, 0, 0)),
        "red" => Some(Color(255, 0, 0)),
        "green" => Some(Color(0, 128, 0)),
        "blue" => Some(Color(0, 0, 255)),
        "yellow" => Some(Color(255, 255, 0)),
        "cyan" => Some(Color(0, 255, 255)),
        "magenta" => Some(Color(255, 0, 255)),
        "orange" => Some(Color(255, 165, 0)),
        "purple" => Some(Color(128, 0, 128)),
        "pink" => Some(Color(255, 192, 203)),
        "brown" => Some(Color(139, 69, 19)),
        "gray" | "grey" => Some(Color(128, 128, 128)),
        "emerald" => Some(Color(0x10, 0xb9, 0x81)),
        _ => None,
    }
}

/// Parse hex color (#RRGGBB or #RGB)
fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Color(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
            Some(Color(r, g, b))
        }
        _ => None,
    }
}
