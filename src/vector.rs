//! Vector compositor.
//!
//! Restyles the provider's rect-only SVG symbol and places it, with the logo
//! and company text, into a fresh [`Document`]. Needs nothing beyond string
//! handling and base64, so it is the path every other backend falls back to.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use log::debug;
use regex::Regex;
use std::io::Cursor;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::layout::{LayoutGeometry, LogoPlacement, PadShape, TextPlacement};
use crate::render::RenderedArtifact;
use crate::style::{ModuleStyle, StyleConfig};
use crate::svg::{Document, ImageNode, Node, RectNode, TextNode};

const DOTS_RADIUS: f64 = 0.5;
const ROUNDED_RADIUS: f64 = 0.3;
const PAD_OPACITY: f64 = 0.9;
const SHADOW_OPACITY: f64 = 0.35;
pub const FONT_FAMILY: &str = "Arial, Helvetica, sans-serif";

static SVG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<svg\b[^>]*>").unwrap());
static RECT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<rect\b[^>]*>").unwrap());
static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\b([a-zA-Z-]+)\s*=\s*"([^"]*)""#).unwrap());

/// Rect primitives of a provider symbol
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSymbol {
    pub width: f64,
    pub height: f64,
    pub rects: Vec<RectNode>,
}

impl ParsedSymbol {
    fn is_background(&self, rect: &RectNode) -> bool {
        rect.x == 0.0 && rect.y == 0.0 && rect.width >= self.width && rect.height >= self.height
    }
}

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    ATTRIBUTE
        .captures_iter(tag)
        .find(|c| &c[1] == name)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
}

fn number(tag: &str, name: &str) -> Option<f64> {
    attribute(tag, name).and_then(|v| v.trim().trim_end_matches("px").parse().ok())
}

pub fn parse_symbol(markup: &str) -> Result<ParsedSymbol> {
    let root = SVG_TAG
        .find(markup)
        .ok_or_else(|| Error::Backend("symbol markup has no <svg> element".to_string()))?
        .as_str();
    let (width, height) = match (number(root, "width"), number(root, "height")) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => (w, h),
        _ => return Err(Error::Backend("symbol markup has no usable size".to_string())),
    };

    let rects = RECT_TAG
        .find_iter(markup)
        .filter_map(|m| {
            let tag = m.as_str();
            Some(RectNode::new(
                number(tag, "x").unwrap_or(0.0),
                number(tag, "y").unwrap_or(0.0),
                number(tag, "width")?,
                number(tag, "height")?,
                attribute(tag, "fill").unwrap_or("#000000"),
            ))
        })
        .collect();

    Ok(ParsedSymbol { width, height, rects })
}

/// Round module corners by the module style; the background stays square
pub fn style_modules(symbol: &ParsedSymbol, module_style: ModuleStyle) -> Vec<Node> {
    let factor = match module_style {
        ModuleStyle::Square => None,
        ModuleStyle::Dots => Some(DOTS_RADIUS),
        ModuleStyle::Rounded => Some(ROUNDED_RADIUS),
    };

    symbol
        .rects
        .iter()
        .map(|rect| {
            let mut rect = rect.clone();
            if !symbol.is_background(&rect) {
                rect.rx = factor.map(|f| f * rect.width.min(rect.height));
            }
            Node::Rect(rect)
        })
        .collect()
}

fn logo_nodes(placement: &LogoPlacement, logo: &DynamicImage) -> Result<Vec<Node>> {
    let pad = placement.pad;
    let radius = match placement.pad_shape {
        PadShape::Circle => pad.width as f64 * 0.5,
        PadShape::RoundedRect { radius } => radius as f64,
    };
    let backdrop = RectNode {
        rx: Some(radius),
        opacity: Some(PAD_OPACITY),
        ..RectNode::new(
            pad.x as f64,
            pad.y as f64,
            pad.width as f64,
            pad.height as f64,
            "#ffffff",
        )
    };

    let mut png = Vec::new();
    logo.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| Error::Backend(format!("cannot embed logo: {}", e)))?;

    let area = placement.logo;
    Ok(vec![
        Node::Rect(backdrop),
        Node::Image(ImageNode {
            x: area.x as f64,
            y: area.y as f64,
            width: area.width as f64,
            height: area.height as f64,
            href: format!("data:image/png;base64,{}", STANDARD.encode(&png)),
        }),
    ])
}

fn text_nodes(placement: &TextPlacement, content: &str) -> Vec<Node> {
    let text = |offset: f64, fill: &str, opacity: Option<f64>| {
        Node::Text(TextNode {
            x: placement.x as f64 + offset,
            y: placement.y as f64 + offset,
            content: content.to_string(),
            font_family: FONT_FAMILY.to_string(),
            font_size: placement.font_size as f64,
            fill: fill.to_string(),
            opacity,
        })
    };

    let mut nodes = Vec::with_capacity(2);
    if placement.shadow {
        let offset = (placement.font_size / 16).max(1) as f64;
        nodes.push(text(offset, "#000000", Some(SHADOW_OPACITY)));
    }
    nodes.push(text(0.0, "#ffffff", None));
    nodes
}

/// Composite the branded SVG document
pub fn composite_vector(
    qr_markup: &str,
    geometry: &LayoutGeometry,
    style: &StyleConfig,
    logo: Option<&DynamicImage>,
) -> Result<RenderedArtifact> {
    let symbol = parse_symbol(qr_markup)?;
    let (width, height) = (geometry.width as f64, geometry.height as f64);

    let mut doc = Document::new(width, height);
    doc.push(Node::Rect(RectNode::new(0.0, 0.0, width, height, style.border_color.to_hex())));

    let target = geometry.qr.width as f64;
    let scale = (symbol.width != target).then(|| target / symbol.width);
    doc.push(Node::Group {
        translate: (geometry.qr.x as f64, geometry.qr.y as f64),
        scale,
        children: style_modules(&symbol, style.module_style),
    });

    if let (Some(placement), Some(logo)) = (geometry.logo.as_ref(), logo) {
        for node in logo_nodes(placement, logo)? {
            doc.push(node);
        }
    }

    if let (Some(placement), Some(content)) = (geometry.text.as_ref(), style.company_text.as_deref()) {
        for node in text_nodes(placement, content) {
            doc.push(node);
        }
    }

    debug!("vector composite {}x{}, {} symbol rects", geometry.width, geometry.height, symbol.rects.len());
    Ok(RenderedArtifact::Vector {
        markup: doc.to_svg_string(),
        width: geometry.width,
        height: geometry.height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::LogoAsset;
    use crate::layout::{compute_geometry, LayoutIntent};
    use crate::style::Layout;
    use image::{Rgba, RgbaImage};

    const SYMBOL: &str = r##"<?xml version="1.0"?>
<svg viewBox="0 0 100 100" height="100" xmlns="http://www.w3.org/2000/svg" width="100">
<rect width="100" height="100" x="0" y="0" fill="#ffffff"/>
<rect fill="#000000" y="10" x="10" height="10" width="10"/>
<rect x="30" y="10" width="10" height="10"/>
</svg>"##;

    fn markup(artifact: &RenderedArtifact) -> &str {
        match artifact {
            RenderedArtifact::Vector { markup, .. } => markup,
            other => panic!("expected vector, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_is_attribute_order_independent() {
        let symbol = parse_symbol(SYMBOL).unwrap();
        assert_eq!((symbol.width, symbol.height), (100.0, 100.0));
        assert_eq!(symbol.rects.len(), 3);
        assert_eq!(symbol.rects[1], RectNode::new(10.0, 10.0, 10.0, 10.0, "#000000"));
        assert_eq!(symbol.rects[2].fill, "#000000");
    }

    #[test]
    fn test_parse_rejects_missing_size() {
        let result = parse_symbol("<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>");
        assert!(matches!(result, Err(Error::Backend(_))));
    }

    #[test]
    fn test_module_rounding() {
        let symbol = parse_symbol(SYMBOL).unwrap();
        let radius = |style| match &style_modules(&symbol, style)[1] {
            Node::Rect(r) => r.rx,
            _ => unreachable!(),
        };
        assert_eq!(radius(ModuleStyle::Square), None);
        assert_eq!(radius(ModuleStyle::Dots), Some(5.0));
        assert_eq!(radius(ModuleStyle::Rounded), Some(3.0));

        let background = &style_modules(&symbol, ModuleStyle::Dots)[0];
        assert!(matches!(background, Node::Rect(r) if r.rx.is_none()));
    }

    #[test]
    fn test_document_dimensions_match_geometry() {
        let style = StyleConfig {
            company_text: Some("Acme".to_string()),
            ..Default::default()
        };
        let geometry = compute_geometry(&style, 100, LayoutIntent::Download);
        let artifact = composite_vector(SYMBOL, &geometry, &style, None).unwrap();
        let svg = markup(&artifact);

        assert!(svg.contains(&format!(
            "width=\"{0}\" height=\"{1}\" viewBox=\"0 0 {0} {1}\"",
            geometry.width, geometry.height
        )));
        assert!(svg.contains("fill=\"#10b981\""));
        assert!(svg.contains("<g transform=\"translate(20,20)\">"));
        // shadow first, then the white text
        let shadow = svg.find("fill=\"#000000\" opacity=\"0.35\">Acme").unwrap();
        let front = svg.find("fill=\"#ffffff\">Acme").unwrap();
        assert!(shadow < front);
    }

    #[test]
    fn test_symbol_is_scaled_to_box() {
        let style = StyleConfig::default();
        let geometry = compute_geometry(&style, 200, LayoutIntent::Preview);
        let artifact = composite_vector(SYMBOL, &geometry, &style, None).unwrap();
        assert!(markup(&artifact).contains("translate(20,20) scale(2)"));
    }

    #[test]
    fn test_logo_embedded_as_data_uri() {
        let style = StyleConfig {
            module_style: ModuleStyle::Dots,
            layout: Layout::SideBySide,
            logo: Some(LogoAsset {
                key: "logos/x.png".to_string(),
                digest: "x".to_string(),
            }),
            ..Default::default()
        };
        let geometry = compute_geometry(&style, 100, LayoutIntent::Download);
        let logo = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255])));
        let artifact = composite_vector(SYMBOL, &geometry, &style, Some(&logo)).unwrap();
        let svg = markup(&artifact);

        assert!(svg.contains("xlink:href=\"data:image/png;base64,"));
        // circle pad for dot modules: 100 px logo, 120 px pad
        assert!(svg.contains("width=\"120\" height=\"120\" fill=\"#ffffff\" rx=\"60\" ry=\"60\" opacity=\"0.9\""));
    }

    #[test]
    fn test_output_is_deterministic() {
        let style = StyleConfig {
            module_style: ModuleStyle::Rounded,
            company_text: Some("Acme & Co".to_string()),
            ..Default::default()
        };
        let geometry = compute_geometry(&style, 100, LayoutIntent::Download);
        let a = composite_vector(SYMBOL, &geometry, &style, None).unwrap();
        let b = composite_vector(SYMBOL, &geometry, &style, None).unwrap();
        assert_eq!(markup(&a), markup(&b));
        assert!(markup(&a).contains("Acme &amp; Co"));
    }
}
