use log::{debug, warn};

use crate::config::EngineConfig;
use crate::raster::Canvas;
use crate::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderBackend {
    Raster,
    Vector,
}

/// Render backends usable in this process, detected once at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    raster: bool,
}

impl Capabilities {
    pub fn detect(config: &EngineConfig) -> Self {
        if !config.raster.enabled {
            debug!("raster backend disabled by configuration");
            return Self::vector_only();
        }
        match Canvas::new(1, 1, Color::WHITE).and_then(|canvas| canvas.render()) {
            Ok(_) => Self { raster: true },
            Err(e) => {
                warn!("raster backend unavailable: {}", e);
                Self::vector_only()
            }
        }
    }

    pub fn vector_only() -> Self {
        Self { raster: false }
    }

    pub fn all() -> Self {
        Self { raster: true }
    }

    pub fn supports(&self, backend: RenderBackend) -> bool {
        match backend {
            RenderBackend::Raster => self.raster,
            RenderBackend::Vector => true,
        }
    }

    /// Backends in preference order
    pub fn ordered(&self) -> Vec<RenderBackend> {
        [RenderBackend::Raster, RenderBackend::Vector]
            .into_iter()
            .filter(|b| self.supports(*b))
            .collect()
    }
}
