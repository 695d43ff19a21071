//! Export pipeline.
//!
//! Each format maps to an ordered list of [`Attempt`]s. Attempts run in
//! sequence; backend, asset and assembly failures are logged and the next
//! attempt runs, while encoding errors end the export immediately.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::backend::RenderBackend;
use crate::content::{ContentType, Payload};
use crate::error::{Error, Result};
use crate::layout::LayoutIntent;
use crate::pdf::{build_html, CommandAssembler, DocumentAssembler, DocumentMetadata};
use crate::render::{RenderedArtifact, Renderer, Snapshot};
use crate::style::{Layout, StyleConfig};
use crate::symbol::{Symbol, SymbolKind};

pub const MAX_SLUG_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExportFormat {
    Png,
    Svg,
    Pdf,
    Eps,
}

impl ExportFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Eps => "application/postscript",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Eps => "eps",
        }
    }

    fn of_backend(backend: RenderBackend) -> Self {
        match backend {
            RenderBackend::Raster => ExportFormat::Png,
            RenderBackend::Vector => ExportFormat::Svg,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "svg" => Ok(ExportFormat::Svg),
            "pdf" => Ok(ExportFormat::Pdf),
            "eps" => Ok(ExportFormat::Eps),
            other => Err(Error::validation(
                "format",
                format!("unknown format '{}' (expected png, svg, pdf or eps)", other),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub payload: Payload,
    pub content_type: ContentType,
    pub style: StyleConfig,
    pub format: ExportFormat,
    pub generated_at: DateTime<Utc>,
}

impl ExportRequest {
    pub fn new(payload: Payload, content_type: ContentType, style: StyleConfig, format: ExportFormat) -> Self {
        Self {
            payload,
            content_type,
            style,
            format,
            generated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub filename: String,
    /// Format actually delivered, which may differ from the one requested
    pub format: ExportFormat,
    pub warnings: Vec<String>,
}

/// One step of a format's fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Image(RenderBackend),
    Document { image: RenderBackend, assembler: usize },
    Eps,
}

pub struct ExportPipeline {
    renderer: Renderer,
    assemblers: Vec<Box<dyn DocumentAssembler>>,
}

impl ExportPipeline {
    /// Pipeline with the assemblers listed in the renderer's `[pdf]` settings
    pub fn new(renderer: Renderer) -> Self {
        let assemblers = renderer
            .config()
            .pdf
            .assemblers
            .iter()
            .filter_map(|command| CommandAssembler::from_slice(command))
            .map(|a| Box::new(a) as Box<dyn DocumentAssembler>)
            .collect();
        Self { renderer, assemblers }
    }

    pub fn with_assembler(mut self, assembler: impl DocumentAssembler + 'static) -> Self {
        self.assemblers.push(Box::new(assembler));
        self
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn plan(&self, format: ExportFormat) -> Vec<Attempt> {
        let images = self.renderer.capabilities().ordered();
        match format {
            ExportFormat::Svg => vec![Attempt::Image(RenderBackend::Vector)],
            ExportFormat::Png => images.into_iter().map(Attempt::Image).collect(),
            ExportFormat::Pdf => {
                let count = self.assemblers.len();
                let mut attempts: Vec<Attempt> = images
                    .iter()
                    .flat_map(|&image| (0..count).map(move |assembler| Attempt::Document { image, assembler }))
                    .collect();
                attempts.extend(images.into_iter().map(Attempt::Image));
                attempts
            }
            ExportFormat::Eps => vec![Attempt::Eps],
        }
    }

    pub fn export(&self, request: &ExportRequest) -> Result<ExportOutput> {
        if request.payload.is_empty() {
            return Err(Error::Encoding("content is empty".to_string()));
        }

        let snapshot = self.renderer.snapshot(&request.style);
        let mut warnings = Vec::new();
        if request.style.has_logo() && !snapshot.style.has_logo() {
            warnings.push("logo unavailable; exported without logo".to_string());
        }
        if request.format == ExportFormat::Pdf && self.assemblers.is_empty() {
            warnings.push("no PDF assembler configured".to_string());
        }

        let mut images: HashMap<RenderBackend, RenderedArtifact> = HashMap::new();
        let mut last_error = None;

        for attempt in self.plan(request.format) {
            let result = match attempt {
                Attempt::Image(backend) => self
                    .image(request, &snapshot, backend, &mut images)
                    .map(|artifact| (artifact.bytes().to_vec(), ExportFormat::of_backend(backend))),
                Attempt::Document { image, assembler } => self
                    .document(request, &snapshot, image, assembler, &mut images)
                    .map(|bytes| (bytes, ExportFormat::Pdf)),
                Attempt::Eps => self.eps(request, &snapshot).map(|eps| (eps.into_bytes(), ExportFormat::Eps)),
            };

            match result {
                Ok((bytes, format)) => {
                    if format != request.format {
                        warnings.push(format!(
                            "{} output unavailable; delivered {} instead",
                            request.format.extension().to_uppercase(),
                            format.extension().to_uppercase()
                        ));
                    }
                    for message in &warnings {
                        warn!("{}", message);
                    }
                    debug!("export {:?} via {:?}: {} bytes", request.format, attempt, bytes.len());
                    return Ok(ExportOutput {
                        bytes,
                        mime_type: format.mime_type(),
                        filename: filename(
                            request.style.company_text.as_deref(),
                            request.content_type,
                            snapshot.style.layout,
                            request.generated_at,
                            format,
                        ),
                        format,
                        warnings,
                    });
                }
                Err(e @ (Error::Encoding(_) | Error::Validation { .. })) => return Err(e),
                Err(e) => {
                    warn!("export attempt {:?} failed: {}", attempt, e);
                    last_error = Some(e);
                }
            }
        }

        Err(Error::Export(match last_error {
            Some(e) => e.to_string(),
            None => "no export path available".to_string(),
        }))
    }

    /// Render once per backend within an export
    fn image<'a>(
        &self,
        request: &ExportRequest,
        snapshot: &Snapshot,
        backend: RenderBackend,
        images: &'a mut HashMap<RenderBackend, RenderedArtifact>,
    ) -> Result<&'a RenderedArtifact> {
        if !images.contains_key(&backend) {
            let size = self.renderer.config().download_size;
            let artifact =
                self.renderer
                    .render_with(&request.payload, snapshot, size, LayoutIntent::Download, backend)?;
            images.insert(backend, artifact);
        }
        images
            .get(&backend)
            .ok_or_else(|| Error::Backend(format!("{:?} image missing", backend)))
    }

    fn document(
        &self,
        request: &ExportRequest,
        snapshot: &Snapshot,
        backend: RenderBackend,
        assembler: usize,
        images: &mut HashMap<RenderBackend, RenderedArtifact>,
    ) -> Result<Vec<u8>> {
        let assembler = self
            .assemblers
            .get(assembler)
            .ok_or_else(|| Error::Export(format!("no assembler #{}", assembler)))?;
        let image = self.image(request, snapshot, backend, images)?;
        let metadata = DocumentMetadata {
            content_type: request.content_type,
            content: request.payload.as_str().to_string(),
            error_correction: snapshot.error_correction,
            layout: snapshot.style.layout,
            generated_at: request.generated_at,
        };
        debug!("assembling PDF with {}", assembler.name());
        assembler.assemble(&build_html(image, &metadata))
    }

    fn eps(&self, request: &ExportRequest, snapshot: &Snapshot) -> Result<String> {
        let size = self.renderer.config().download_size;
        match self.renderer.symbol(&request.payload, snapshot, size, SymbolKind::Eps)? {
            Symbol::Eps(eps) => Ok(eps),
            _ => Err(Error::Backend("provider returned a non-EPS symbol".to_string())),
        }
    }
}

// === Filenames ===

/// Lowercase ASCII slug of a company name, at most 40 characters
pub fn slugify(name: &str) -> String {
    deunicode::deunicode(name)
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .take(MAX_SLUG_CHARS)
        .collect()
}

/// `<slug>_qrcode_<content-type>_<layout>_<YYYYmmdd_HHMMSS>.<ext>`
pub fn filename(
    company: Option<&str>,
    content_type: ContentType,
    layout: Layout,
    at: DateTime<Utc>,
    format: ExportFormat,
) -> String {
    let stem = format!(
        "qrcode_{}_{}_{}",
        content_type.slug(),
        layout.slug(),
        at.format("%Y%m%d_%H%M%S")
    );
    match company.map(slugify).filter(|s| !s.is_empty()) {
        Some(slug) => format!("{}_{}.{}", slug, stem, format.extension()),
        None => format!("{}.{}", stem, format.extension()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::content::normalize;
    use crate::render::testing::{forget, renderer, upload_logo};
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct StubAssembler {
        html: Rc<RefCell<Option<String>>>,
        fail: bool,
    }

    impl DocumentAssembler for StubAssembler {
        fn name(&self) -> &str {
            "stub"
        }

        fn assemble(&self, html: &str) -> Result<Vec<u8>> {
            if self.fail {
                return Err(Error::Export("stub failure".to_string()));
            }
            *self.html.borrow_mut() = Some(html.to_string());
            Ok(b"%PDF-1.4 stub".to_vec())
        }
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    fn request(format: ExportFormat, style: StyleConfig) -> ExportRequest {
        ExportRequest {
            payload: normalize("example.com", ContentType::Url),
            content_type: ContentType::Url,
            style,
            format,
            generated_at: stamp(),
        }
    }

    fn pipeline(config: EngineConfig) -> ExportPipeline {
        ExportPipeline::new(renderer(config).0)
    }

    #[test]
    fn test_svg_export() {
        let style = StyleConfig {
            company_text: Some("Acme Corp".to_string()),
            ..Default::default()
        };
        let output = pipeline(EngineConfig::default())
            .export(&request(ExportFormat::Svg, style))
            .unwrap();

        assert_eq!(output.mime_type, "image/svg+xml");
        assert_eq!(output.filename, "acme_corp_qrcode_url_standard_20240501_123000.svg");
        assert!(output.warnings.is_empty());
        let svg = String::from_utf8(output.bytes).unwrap();
        assert!(svg.contains("width=\"840\""));
    }

    #[test]
    fn test_png_export_uses_download_size() {
        let output = pipeline(EngineConfig::default())
            .export(&request(ExportFormat::Png, StyleConfig::default()))
            .unwrap();
        assert_eq!(output.format, ExportFormat::Png);
        let img = image::load_from_memory(&output.bytes).unwrap();
        assert_eq!((img.width(), img.height()), (840, 840));
    }

    #[test]
    fn test_png_falls_back_to_svg() {
        let config = EngineConfig::from_toml_str("[raster]\nenabled = false").unwrap();
        let output = pipeline(config)
            .export(&request(ExportFormat::Png, StyleConfig::default()))
            .unwrap();

        assert_eq!(output.format, ExportFormat::Svg);
        assert_eq!(output.mime_type, "image/svg+xml");
        assert!(output.filename.ends_with(".svg"));
        assert_eq!(output.warnings.len(), 1);
        assert!(output.bytes.starts_with(b"<?xml"));
    }

    #[test]
    fn test_pdf_without_assembler_returns_image() {
        let output = pipeline(EngineConfig::default())
            .export(&request(ExportFormat::Pdf, StyleConfig::default()))
            .unwrap();
        assert_eq!(output.format, ExportFormat::Png);
        assert!(output.warnings.iter().any(|w| w.contains("no PDF assembler")));
    }

    #[test]
    fn test_pdf_with_assembler() {
        let html = Rc::new(RefCell::new(None));
        let pipeline = pipeline(EngineConfig::default())
            .with_assembler(StubAssembler {
                html: html.clone(),
                fail: true,
            })
            .with_assembler(StubAssembler {
                html: html.clone(),
                fail: false,
            });

        let output = pipeline.export(&request(ExportFormat::Pdf, StyleConfig::default())).unwrap();
        assert_eq!(output.format, ExportFormat::Pdf);
        assert_eq!(output.mime_type, "application/pdf");
        assert!(output.filename.ends_with(".pdf"));
        assert!(output.bytes.starts_with(b"%PDF"));

        let html = html.borrow();
        let html = html.as_deref().unwrap();
        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains("https://example.com"));
    }

    #[test]
    fn test_pdf_plan_order() {
        let pipeline = pipeline(EngineConfig::default()).with_assembler(StubAssembler {
            html: Rc::new(RefCell::new(None)),
            fail: false,
        });
        assert_eq!(
            pipeline.plan(ExportFormat::Pdf),
            vec![
                Attempt::Document {
                    image: RenderBackend::Raster,
                    assembler: 0
                },
                Attempt::Document {
                    image: RenderBackend::Vector,
                    assembler: 0
                },
                Attempt::Image(RenderBackend::Raster),
                Attempt::Image(RenderBackend::Vector),
            ]
        );
    }

    #[test]
    fn test_eps_is_unbranded() {
        let style = StyleConfig {
            company_text: Some("Acme".to_string()),
            ..Default::default()
        };
        let output = pipeline(EngineConfig::default())
            .export(&request(ExportFormat::Eps, style))
            .unwrap();
        assert_eq!(output.mime_type, "application/postscript");
        let eps = String::from_utf8(output.bytes).unwrap();
        assert!(eps.starts_with("%!PS-Adobe-3.0 EPSF-3.0"));
        assert!(eps.contains("%%BoundingBox: 0 0 800 800"));
        assert!(!eps.contains("Acme"));
    }

    #[test]
    fn test_empty_payload_is_encoding_error() {
        let mut req = request(ExportFormat::Png, StyleConfig::default());
        req.payload = normalize("", ContentType::Url);
        let result = pipeline(EngineConfig::default()).export(&req);
        assert!(matches!(result, Err(Error::Encoding(_))));
    }

    #[test]
    fn test_vanished_logo_warns() {
        let (renderer, store) = renderer(EngineConfig::default());
        let asset = upload_logo(&renderer);
        forget(&store, &asset);

        let style = StyleConfig {
            logo: Some(asset),
            ..Default::default()
        };
        let output = ExportPipeline::new(renderer)
            .export(&request(ExportFormat::Png, style))
            .unwrap();
        assert_eq!(output.format, ExportFormat::Png);
        assert!(output.warnings.iter().any(|w| w.contains("logo")));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("PNG".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert!(matches!(
            "gif".parse::<ExportFormat>(),
            Err(Error::Validation { field: "format", .. })
        ));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Café Zürich GmbH"), "cafe_zurich_gmbh");
        assert_eq!(slugify("A&B (Holdings)"), "ab_holdings");
        assert_eq!(slugify(&"x".repeat(60)).len(), MAX_SLUG_CHARS);
    }

    #[test]
    fn test_filename_without_company() {
        assert_eq!(
            filename(None, ContentType::Wifi, Layout::SideBySide, stamp(), ExportFormat::Png),
            "qrcode_wifi_sides_20240501_123000.png"
        );
        assert_eq!(
            filename(Some("!!!"), ContentType::Text, Layout::Standard, stamp(), ExportFormat::Eps),
            "qrcode_text_standard_20240501_123000.eps"
        );
    }
}
