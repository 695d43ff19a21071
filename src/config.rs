use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::style::{MAX_PIXEL_SIZE, MIN_PIXEL_SIZE};

/// Engine-wide settings, independent of any single style.
///
/// Loaded from TOML; every key is optional:
///
/// ```toml
/// download_size = 800
///
/// [raster]
/// enabled = true
///
/// [font]
/// family = "qrbrand-sans"
/// path = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
///
/// [assets]
/// dir = "storage"
/// retention_secs = 3600
///
/// [pdf]
/// assemblers = [["wkhtmltopdf", "--quiet", "-", "-"]]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Symbol size for exports; previews use the style's pixel size
    #[serde(default = "default_download_size")]
    pub download_size: u32,
    /// Light modules around the symbol, in modules
    #[serde(default = "default_quiet_zone")]
    pub quiet_zone: u32,
    #[serde(default)]
    pub raster: RasterSettings,
    #[serde(default)]
    pub font: FontSettings,
    #[serde(default)]
    pub assets: AssetSettings,
    #[serde(default)]
    pub pdf: PdfSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RasterSettings {
    /// When false the raster backend is reported unavailable
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FontSettings {
    #[serde(default = "default_font_family")]
    pub family: String,
    /// Explicit font file; system fonts are searched when absent
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetSettings {
    #[serde(default = "default_asset_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default = "default_max_logo_dimension")]
    pub max_logo_dimension: u32,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Converters tried in order; each reads HTML on stdin and writes PDF to stdout
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PdfSettings {
    #[serde(default)]
    pub assemblers: Vec<Vec<String>>,
}

fn default_download_size() -> u32 { 800 }
fn default_quiet_zone() -> u32 { 1 }
fn default_true() -> bool { true }
fn default_font_family() -> String { "qrbrand-sans".to_string() }
fn default_asset_dir() -> PathBuf { PathBuf::from("storage") }
fn default_retention_secs() -> u64 { 3600 }
fn default_max_logo_dimension() -> u32 { 512 }
fn default_max_upload_bytes() -> usize { 2 * 1024 * 1024 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            download_size: default_download_size(),
            quiet_zone: default_quiet_zone(),
            raster: RasterSettings::default(),
            font: FontSettings::default(),
            assets: AssetSettings::default(),
            pdf: PdfSettings::default(),
        }
    }
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            family: default_font_family(),
            path: None,
        }
    }
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            dir: default_asset_dir(),
            retention_secs: default_retention_secs(),
            max_logo_dimension: default_max_logo_dimension(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    fn validate(&self) -> Result<()> {
        if !(MIN_PIXEL_SIZE..=MAX_PIXEL_SIZE).contains(&self.download_size) {
            return Err(Error::Config(format!(
                "download_size must be between {} and {}",
                MIN_PIXEL_SIZE, MAX_PIXEL_SIZE
            )));
        }
        if self.pdf.assemblers.iter().any(|c| c.is_empty()) {
            return Err(Error::Config("pdf assembler commands must not be empty".to_string()));
        }
        if self.assets.max_logo_dimension == 0 {
            return Err(Error::Config("max_logo_dimension must be positive".to_string()));
        }
        Ok(())
    }
}
