//! Single-slot preview memo keyed by a digest of every visual input.

use log::debug;
use std::sync::Arc;

use crate::content::Payload;
use crate::error::{Error, Result};
use crate::render::{RenderedArtifact, Renderer};
use crate::style::StyleConfig;

struct CacheEntry {
    digest: String,
    artifact: Arc<RenderedArtifact>,
}

#[derive(Default)]
pub struct PreviewCache {
    slot: Option<CacheEntry>,
}

/// blake3 over the JSON form of the payload and the full style.
/// The logo is represented by its content digest.
pub fn settings_digest(payload: &Payload, style: &StyleConfig) -> Result<String> {
    let encoded = serde_json::to_vec(&(payload, style))
        .map_err(|e| Error::Encoding(format!("cannot digest settings: {}", e)))?;
    Ok(blake3::hash(&encoded).to_hex().to_string())
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached preview when nothing visual changed, otherwise a fresh render
    /// that replaces the slot. An empty payload renders nothing.
    pub fn get_or_render(
        &mut self,
        renderer: &Renderer,
        payload: &Payload,
        style: &StyleConfig,
    ) -> Result<Option<Arc<RenderedArtifact>>> {
        if payload.is_empty() {
            return Ok(None);
        }

        let digest = settings_digest(payload, style)?;
        if let Some(entry) = &self.slot {
            if entry.digest == digest {
                debug!("preview cache hit {}", &digest[..12]);
                return Ok(Some(entry.artifact.clone()));
            }
        }

        let artifact = Arc::new(renderer.render_preview(payload, style)?);
        debug!("preview cache miss {}", &digest[..12]);
        self.slot = Some(CacheEntry {
            digest,
            artifact: artifact.clone(),
        });
        Ok(Some(artifact))
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}
