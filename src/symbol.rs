//! QR symbol provider
//!
//! The engine never encodes QR matrices itself; it asks a [`SymbolProvider`]
//! for a symbol of a given size. [`QrcodeProvider`] adapts the `qrcode`
//! crate and draws its module matrix as a bitmap, a minimal SVG made only of
//! `<rect>` modules, or an unbranded EPS.

use image::{GrayImage, Luma};
use qrcode::{EcLevel, QrCode};

use crate::error::{Error, Result};
use crate::style::ErrorCorrection;
use crate::svg::fmt_num;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Bitmap,
    Vector,
    Eps,
}

/// A raw symbol, owned by the render call that requested it
#[derive(Debug, Clone)]
pub enum Symbol {
    Bitmap(GrayImage),
    Vector(String),
    Eps(String),
}

pub trait SymbolProvider {
    fn encode(
        &self,
        payload: &str,
        error_correction: ErrorCorrection,
        pixel_size: u32,
        kind: SymbolKind,
    ) -> Result<Symbol>;
}

/// Provider backed by the `qrcode` crate
#[derive(Debug, Clone)]
pub struct QrcodeProvider {
    quiet_zone: u32,
}

impl QrcodeProvider {
    pub fn new(quiet_zone: u32) -> Self {
        Self { quiet_zone }
    }

    fn matrix(&self, payload: &str, error_correction: ErrorCorrection) -> Result<ModuleMatrix> {
        if payload.is_empty() {
            return Err(Error::Encoding("content is empty".to_string()));
        }
        let level = match error_correction {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        };
        let code = QrCode::with_error_correction_level(payload.as_bytes(), level)
            .map_err(|e| Error::Encoding(e.to_string()))?;

        let width = code.width();
        let dark = code
            .to_colors()
            .into_iter()
            .map(|c| c == qrcode::Color::Dark)
            .collect();

        Ok(ModuleMatrix {
            width,
            quiet_zone: self.quiet_zone as usize,
            dark,
        })
    }
}

impl Default for QrcodeProvider {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SymbolProvider for QrcodeProvider {
    fn encode(
        &self,
        payload: &str,
        error_correction: ErrorCorrection,
        pixel_size: u32,
        kind: SymbolKind,
    ) -> Result<Symbol> {
        let matrix = self.matrix(payload, error_correction)?;
        if pixel_size < matrix.dimension() as u32 {
            return Err(Error::Encoding(format!(
                "{} px cannot hold a {} module symbol",
                pixel_size,
                matrix.dimension()
            )));
        }

        Ok(match kind {
            SymbolKind::Bitmap => Symbol::Bitmap(matrix.to_bitmap(pixel_size)),
            SymbolKind::Vector => Symbol::Vector(matrix.to_svg(pixel_size)),
            SymbolKind::Eps => Symbol::Eps(matrix.to_eps(pixel_size)),
        })
    }
}

/// Module grid including the quiet zone
struct ModuleMatrix {
    width: usize,
    quiet_zone: usize,
    dark: Vec<bool>,
}

impl ModuleMatrix {
    fn dimension(&self) -> usize {
        self.width + 2 * self.quiet_zone
    }

    fn is_dark(&self, x: usize, y: usize) -> bool {
        let q = self.quiet_zone;
        if x < q || y < q || x >= q + self.width || y >= q + self.width {
            return false;
        }
        self.dark[(y - q) * self.width + (x - q)]
    }

    fn dark_modules(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let dim = self.dimension();
        (0..dim).flat_map(move |y| (0..dim).filter(move |&x| self.is_dark(x, y)).map(move |x| (x, y)))
    }

    /// Exactly `size` pixels square; each pixel samples the module under it
    fn to_bitmap(&self, size: u32) -> GrayImage {
        let dim = self.dimension() as u64;
        GrayImage::from_fn(size, size, |x, y| {
            let mx = (x as u64 * dim / size as u64) as usize;
            let my = (y as u64 * dim / size as u64) as usize;
            if self.is_dark(mx, my) {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        })
    }

    fn to_svg(&self, size: u32) -> String {
        let unit = size as f64 / self.dimension() as f64;
        let mut out = String::new();
        out += "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
        out += &format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{0}\" height=\"{0}\" viewBox=\"0 0 {0} {0}\">\n",
            size
        );
        out += &format!(
            "<rect x=\"0\" y=\"0\" width=\"{0}\" height=\"{0}\" fill=\"#ffffff\"/>\n",
            size
        );
        let side = fmt_num(unit);
        for (x, y) in self.dark_modules() {
            out += &format!(
                "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"#000000\"/>\n",
                fmt_num(x as f64 * unit),
                fmt_num(y as f64 * unit),
                side,
                side
            );
        }
        out += "</svg>\n";
        out
    }

    fn to_eps(&self, size: u32) -> String {
        let unit = size as f64 / self.dimension() as f64;
        let dim = self.dimension();
        let mut out = String::new();
        out += "%!PS-Adobe-3.0 EPSF-3.0\n";
        out += &format!("%%BoundingBox: 0 0 {0} {0}\n", size);
        out += "%%Creator: qrbrand\n";
        out += "%%EndComments\n";
        out += "/F { rectfill } def\n";
        out += &format!("1 1 1 setrgbcolor 0 0 {0} {0} F\n", size);
        out += "0 0 0 setrgbcolor\n";
        for (x, y) in self.dark_modules() {
            // PostScript origin is bottom-left
            let py = (dim - 1 - y) as f64 * unit;
            out += &format!(
                "{} {} {} {} F\n",
                fmt_num(x as f64 * unit),
                fmt_num(py),
                fmt_num(unit),
                fmt_num(unit)
            );
        }
        out += "%%EOF\n";
        out
    }
}
