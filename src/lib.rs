// Library exports for qrbrand

pub mod assets;
pub mod backend;
pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod export;
pub mod fonts;
pub mod layout;
pub mod pdf;
pub mod raster;
pub mod render;
pub mod style;
pub mod svg;
pub mod symbol;
pub mod vector;

pub use cache::PreviewCache;
pub use config::EngineConfig;
pub use content::{normalize, ContentType, Payload};
pub use error::{Error, Result};
pub use export::{ExportFormat, ExportOutput, ExportPipeline, ExportRequest};
pub use render::{RenderedArtifact, Renderer};
pub use style::{StyleConfig, StyleOptions};
