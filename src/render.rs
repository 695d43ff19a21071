// Renderer: symbol request, layout and compositing for one payload/style pair

use image::DynamicImage;
use log::{debug, warn};

use crate::assets::LogoLibrary;
use crate::backend::{Capabilities, RenderBackend};
use crate::config::EngineConfig;
use crate::content::Payload;
use crate::error::{Error, Result};
use crate::fonts;
use crate::layout::{compute_geometry, LayoutIntent};
use crate::raster::composite_raster;
use crate::style::{ErrorCorrection, StyleConfig};
use crate::symbol::{QrcodeProvider, Symbol, SymbolKind, SymbolProvider};
use crate::vector::composite_vector;

/// A finished composite
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedArtifact {
    Raster { bytes: Vec<u8>, width: u32, height: u32 },
    Vector { markup: String, width: u32, height: u32 },
}

impl RenderedArtifact {
    pub fn backend(&self) -> RenderBackend {
        match self {
            RenderedArtifact::Raster { .. } => RenderBackend::Raster,
            RenderedArtifact::Vector { .. } => RenderBackend::Vector,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            RenderedArtifact::Raster { .. } => "image/png",
            RenderedArtifact::Vector { .. } => "image/svg+xml",
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            RenderedArtifact::Raster { bytes, .. } => bytes,
            RenderedArtifact::Vector { markup, .. } => markup.as_bytes(),
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            RenderedArtifact::Raster { width, .. } | RenderedArtifact::Vector { width, .. } => *width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            RenderedArtifact::Raster { height, .. } | RenderedArtifact::Vector { height, .. } => *height,
        }
    }
}

/// Inputs frozen at the start of a render. The logo bytes are read once;
/// an asset that vanishes later cannot affect this render.
pub struct Snapshot {
    pub style: StyleConfig,
    pub logo: Option<DynamicImage>,
    pub error_correction: ErrorCorrection,
}

pub struct Renderer {
    provider: Box<dyn SymbolProvider>,
    logos: LogoLibrary,
    capabilities: Capabilities,
    config: EngineConfig,
}

impl Renderer {
    /// Renderer over the `qrcode` provider, with backends detected from `config`
    pub fn new(config: EngineConfig, logos: LogoLibrary) -> Self {
        Self {
            provider: Box::new(QrcodeProvider::new(config.quiet_zone)),
            capabilities: Capabilities::detect(&config),
            logos,
            config,
        }
    }

    pub fn with_provider(mut self, provider: impl SymbolProvider + 'static) -> Self {
        self.provider = Box::new(provider);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn logos(&self) -> &LogoLibrary {
        &self.logos
    }

    pub fn snapshot(&self, style: &StyleConfig) -> Snapshot {
        let error_correction = style.effective_error_correction();
        let Some(asset) = style.logo.as_ref() else {
            return Snapshot {
                style: style.clone(),
                logo: None,
                error_correction,
            };
        };

        match self.logos.load(asset) {
            Ok(image) => Snapshot {
                style: style.clone(),
                logo: Some(image),
                error_correction,
            },
            Err(e) => {
                warn!("rendering without logo: {}", e);
                Snapshot {
                    style: style.without_logo(),
                    logo: None,
                    error_correction,
                }
            }
        }
    }

    pub fn symbol(&self, payload: &Payload, snapshot: &Snapshot, size: u32, kind: SymbolKind) -> Result<Symbol> {
        if payload.is_empty() {
            return Err(Error::Encoding("content is empty".to_string()));
        }
        self.provider
            .encode(payload.as_str(), snapshot.error_correction, size, kind)
    }

    /// One compositing attempt on a specific backend
    pub fn render_with(
        &self,
        payload: &Payload,
        snapshot: &Snapshot,
        size: u32,
        intent: LayoutIntent,
        backend: RenderBackend,
    ) -> Result<RenderedArtifact> {
        if !self.capabilities.supports(backend) {
            return Err(Error::Backend(format!("{:?} backend is not available", backend)));
        }
        let geometry = compute_geometry(&snapshot.style, size, intent);

        match backend {
            RenderBackend::Raster => {
                let Symbol::Bitmap(qr) = self.symbol(payload, snapshot, size, SymbolKind::Bitmap)? else {
                    return Err(Error::Backend("provider returned a non-bitmap symbol".to_string()));
                };
                let family = match snapshot.style.company_text {
                    Some(_) => fonts::resolve_family(&self.config.font),
                    None => None,
                };
                composite_raster(&qr, &geometry, &snapshot.style, snapshot.logo.as_ref(), family.as_deref())
            }
            RenderBackend::Vector => {
                let Symbol::Vector(markup) = self.symbol(payload, snapshot, size, SymbolKind::Vector)? else {
                    return Err(Error::Backend("provider returned a non-vector symbol".to_string()));
                };
                composite_vector(&markup, &geometry, &snapshot.style, snapshot.logo.as_ref())
            }
        }
    }

    /// Render on the first backend that succeeds. Backend failures fall
    /// through to the next backend; any other error is returned at once.
    pub fn render(
        &self,
        payload: &Payload,
        style: &StyleConfig,
        size: u32,
        intent: LayoutIntent,
    ) -> Result<RenderedArtifact> {
        let snapshot = self.snapshot(style);
        let mut last_error = Error::Backend("no render backend available".to_string());

        for backend in self.capabilities.ordered() {
            match self.render_with(payload, &snapshot, size, intent, backend) {
                Ok(artifact) => {
                    debug!("rendered {}x{} on {:?}", artifact.width(), artifact.height(), backend);
                    return Ok(artifact);
                }
                Err(Error::Backend(msg)) => {
                    warn!("{:?} backend failed: {}", backend, msg);
                    last_error = Error::Backend(msg);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    /// Interactive preview at the style's pixel size
    pub fn render_preview(&self, payload: &Payload, style: &StyleConfig) -> Result<RenderedArtifact> {
        self.render(payload, style, style.pixel_size, LayoutIntent::Preview)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::content::{normalize, ContentType};

    fn payload() -> Payload {
        normalize("example.com", ContentType::Url)
    }

    #[test]
    fn test_preview_prefers_raster() {
        let (renderer, _) = renderer(EngineConfig::default());
        let artifact = renderer.render_preview(&payload(), &StyleConfig::default()).unwrap();
        assert_eq!(artifact.backend(), RenderBackend::Raster);
        assert_eq!(artifact.width(), 340);
        assert!(artifact.bytes().starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_raster_disabled_yields_vector() {
        let config = EngineConfig::from_toml_str("[raster]\nenabled = false").unwrap();
        let (renderer, _) = renderer(config);
        let artifact = renderer.render_preview(&payload(), &StyleConfig::default()).unwrap();
        assert_eq!(artifact.mime_type(), "image/svg+xml");
        assert_eq!((artifact.width(), artifact.height()), (340, 340));
    }

    #[test]
    fn test_logo_forces_high_error_correction() {
        let (renderer, _) = renderer(EngineConfig::default());
        let provider = RecordingProvider::default();
        let calls = provider.calls.clone();
        let renderer = renderer.with_provider(provider);

        let style = StyleConfig {
            error_correction: ErrorCorrection::L,
            logo: Some(upload_logo(&renderer)),
            ..Default::default()
        };
        renderer.render_preview(&payload(), &style).unwrap();

        let calls = calls.borrow();
        assert!(!calls.is_empty());
        assert!(calls.iter().all(|(ec, _, _)| *ec == ErrorCorrection::H));
    }

    #[test]
    fn test_style_level_used_without_logo() {
        let (renderer, _) = renderer(EngineConfig::default());
        let provider = RecordingProvider::default();
        let calls = provider.calls.clone();
        let renderer = renderer.with_provider(provider);

        let style = StyleConfig {
            error_correction: ErrorCorrection::Q,
            ..Default::default()
        };
        renderer.render_preview(&payload(), &style).unwrap();
        assert_eq!(calls.borrow()[0], (ErrorCorrection::Q, 300, SymbolKind::Bitmap));
    }

    #[test]
    fn test_missing_logo_renders_without_it() {
        let (renderer, store) = renderer(EngineConfig::default());
        let asset = upload_logo(&renderer);
        forget(&store, &asset);

        let style = StyleConfig {
            logo: Some(asset),
            ..Default::default()
        };
        let snapshot = renderer.snapshot(&style);
        assert!(snapshot.logo.is_none());
        assert!(!snapshot.style.has_logo());

        let artifact = renderer.render_preview(&payload(), &style).unwrap();
        assert_eq!(artifact.height(), 340);
    }

    #[test]
    fn test_empty_payload_is_encoding_error() {
        let (renderer, _) = renderer(EngineConfig::default());
        let empty = normalize("   ", ContentType::Text);
        let result = renderer.render_preview(&empty, &StyleConfig::default());
        assert!(matches!(result, Err(Error::Encoding(_))));
    }

    #[test]
    fn test_unavailable_backend_is_refused() {
        let (renderer, _) = renderer(EngineConfig::default());
        let renderer = renderer.with_capabilities(Capabilities::vector_only());
        let snapshot = renderer.snapshot(&StyleConfig::default());
        let result = renderer.render_with(&payload(), &snapshot, 300, LayoutIntent::Preview, RenderBackend::Raster);
        assert!(matches!(result, Err(Error::Backend(_))));
    }
}
