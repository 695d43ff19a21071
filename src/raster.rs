use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, RgbImage};
use log::{debug, warn};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::error::{Error, Result};
use crate::fonts;
use crate::layout::{LayoutGeometry, LogoPlacement, PadShape, Rect as Area, TextPlacement};
use crate::render::RenderedArtifact;
use crate::style::{Color as BrandColor, StyleConfig};

const PAD_OPACITY: f64 = 0.9;
const SHADOW_OPACITY: f64 = 0.35;
/// Segments used to approximate each rounded corner of the pad
const CORNER_SEGMENTS: usize = 8;

/// RGB pixel canvas drawn with the plotters bitmap backend
pub struct Canvas {
    buffer: Vec<u8>,
    width: u32,
    height: u32,
}

impl Canvas {
    /// Create a canvas filled with a solid color
    pub fn new(width: u32, height: u32, background: BrandColor) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Backend("canvas has no area".to_string()));
        }
        let mut canvas = Canvas {
            buffer: vec![0u8; (width as usize) * (height as usize) * 3],
            width,
            height,
        };
        {
            let root = BitMapBackend::with_buffer(&mut canvas.buffer, (width, height))
                .into_drawing_area();
            root.fill(&background.to_rgb()).map_err(backend_error)?;
            root.present().map_err(backend_error)?;
        }
        Ok(canvas)
    }

    /// Copy the QR bitmap unscaled into its box
    pub fn draw_symbol(&mut self, qr: &GrayImage, area: &Area) -> Result<()> {
        if qr.dimensions() != (area.width, area.height) {
            return Err(Error::Backend(format!(
                "symbol is {}x{} but layout expects {}x{}",
                qr.width(),
                qr.height(),
                area.width,
                area.height
            )));
        }
        let symbol = DynamicImage::ImageLuma8(qr.clone()).to_rgb8();
        let mut target = self.as_image()?;
        imageops::replace(&mut target, &symbol, area.x as i64, area.y as i64);
        self.buffer = target.into_raw();
        Ok(())
    }

    /// Translucent white backdrop behind the logo
    pub fn draw_pad(&mut self, placement: &LogoPlacement) -> Result<()> {
        let root = BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height))
            .into_drawing_area();
        let fill = WHITE.mix(PAD_OPACITY).filled();
        let pad = placement.pad;

        match placement.pad_shape {
            PadShape::Circle => {
                let (cx, cy) = pad.center();
                root.draw(&Circle::new(
                    (cx.round() as i32, cy.round() as i32),
                    pad.width / 2,
                    fill,
                ))
                .map_err(backend_error)?;
            }
            PadShape::RoundedRect { radius } => {
                root.draw(&Polygon::new(rounded_rect_points(&pad, radius), fill))
                    .map_err(backend_error)?;
            }
        }
        root.present().map_err(backend_error)?;
        Ok(())
    }

    /// Fit the logo into its box, preserving aspect ratio, and alpha-blend it
    pub fn draw_logo(&mut self, logo: &DynamicImage, area: &Area) -> Result<()> {
        let fitted = logo.resize(area.width, area.height, FilterType::Lanczos3).to_rgba8();
        let x = area.x as i64 + (area.width as i64 - fitted.width() as i64) / 2;
        let y = area.y as i64 + (area.height as i64 - fitted.height() as i64) / 2;

        let mut target = DynamicImage::ImageRgb8(self.as_image()?).to_rgba8();
        imageops::overlay(&mut target, &fitted, x, y);
        self.buffer = DynamicImage::ImageRgba8(target).to_rgb8().into_raw();
        Ok(())
    }

    /// Draw centered text. Font failures are logged and the text is skipped.
    pub fn draw_text(&mut self, content: &str, placement: &TextPlacement, family: &str) {
        let root = BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height))
            .into_drawing_area();
        let size = placement.font_size as f64;
        let centered = Pos::new(HPos::Center, VPos::Center);

        if placement.shadow {
            let offset = (placement.font_size / 16).max(1) as i32;
            let shadow = (family, size)
                .into_font()
                .color(&BLACK.mix(SHADOW_OPACITY))
                .pos(centered);
            if let Err(e) = root.draw_text(content, &shadow, (placement.x + offset, placement.y + offset)) {
                warn!("text shadow skipped: {}", e);
                return;
            }
        }

        let style = (family, size).into_font().color(&WHITE).pos(centered);
        if let Err(e) = root.draw_text(content, &style, (placement.x, placement.y)) {
            warn!("company text skipped: {}", e);
            return;
        }
        if let Err(e) = root.present() {
            warn!("company text skipped: {}", e);
        }
    }

    /// Encode the canvas as PNG
    pub fn render(self) -> Result<Vec<u8>> {
        let mut png_bytes = Vec::new();
        {
            let encoder =
                PngEncoder::new_with_quality(&mut png_bytes, CompressionType::Best, PngFilter::Adaptive);
            encoder
                .write_image(&self.buffer, self.width, self.height, ExtendedColorType::Rgb8)
                .map_err(|e| Error::Backend(format!("PNG encoding failed: {}", e)))?;
        }
        Ok(png_bytes)
    }

    fn as_image(&mut self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, std::mem::take(&mut self.buffer))
            .ok_or_else(|| Error::Backend("canvas buffer has the wrong length".to_string()))
    }
}

fn backend_error<E: std::fmt::Display>(e: E) -> Error {
    Error::Backend(e.to_string())
}

/// Outline of a rounded rectangle, clockwise from the top-left arc
fn rounded_rect_points(area: &Area, radius: u32) -> Vec<(i32, i32)> {
    let r = radius.min(area.width / 2).min(area.height / 2) as f64;
    let (x0, y0) = (area.x as f64, area.y as f64);
    let (x1, y1) = (x0 + area.width as f64, y0 + area.height as f64);

    // corner centers with the angle each arc starts at
    let corners = [
        (x0 + r, y0 + r, 180.0_f64),
        (x1 - r, y0 + r, 270.0),
        (x1 - r, y1 - r, 0.0),
        (x0 + r, y1 - r, 90.0),
    ];

    let mut points = Vec::with_capacity(corners.len() * (CORNER_SEGMENTS + 1));
    for (cx, cy, start) in corners {
        for step in 0..=CORNER_SEGMENTS {
            let angle = (start + 90.0 * step as f64 / CORNER_SEGMENTS as f64).to_radians();
            points.push((
                (cx + r * angle.cos()).round() as i32,
                (cy + r * angle.sin()).round() as i32,
            ));
        }
    }
    points
}

/// Composite the branded PNG
pub fn composite_raster(
    qr: &GrayImage,
    geometry: &LayoutGeometry,
    style: &StyleConfig,
    logo: Option<&DynamicImage>,
    font_family: Option<&str>,
) -> Result<RenderedArtifact> {
    let mut canvas = Canvas::new(geometry.width, geometry.height, style.border_color)?;
    canvas.draw_symbol(qr, &geometry.qr)?;

    if let (Some(placement), Some(logo)) = (geometry.logo.as_ref(), logo) {
        canvas.draw_pad(placement)?;
        canvas.draw_logo(logo, &placement.logo)?;
    }

    if let (Some(placement), Some(content)) = (geometry.text.as_ref(), style.company_text.as_deref()) {
        match font_family.or_else(|| fonts::bundled_family()) {
            Some(family) => canvas.draw_text(content, placement, family),
            None => warn!("no font available; company text omitted"),
        }
    }

    debug!("raster composite {}x{}", geometry.width, geometry.height);
    let bytes = canvas.render()?;
    Ok(RenderedArtifact::Raster {
        bytes,
        width: geometry.width,
        height: geometry.height,
    })
}
