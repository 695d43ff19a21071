//! Font resolution for raster text.
//!
//! plotters is built with the `ab_glyph` backend, which only knows faces that
//! were registered explicitly. The configured face (or the first system face
//! found) is registered per `(family, path)` pair; when nothing resolves, the
//! DejaVu Sans face compiled into the binary is used instead.

use log::{debug, warn};
use plotters::style::FontStyle;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, OnceLock};

use crate::config::FontSettings;

/// Family name of the face compiled into the binary
pub const BUNDLED_FAMILY: &str = "qrbrand-bundled";

static BUNDLED_FACE: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/fonts/DejaVuSans.ttf"
));

const SYSTEM_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

type FaceKey = (String, Option<PathBuf>);

static BUNDLED: OnceLock<bool> = OnceLock::new();
static REGISTERED: LazyLock<Mutex<HashMap<FaceKey, Option<String>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Register the compiled-in face; `None` only if it fails to parse
pub fn bundled_family() -> Option<&'static str> {
    let ok = *BUNDLED.get_or_init(|| {
        match plotters::style::register_font(BUNDLED_FAMILY, FontStyle::Normal, BUNDLED_FACE) {
            Ok(()) => true,
            Err(_) => {
                warn!("bundled font face is invalid");
                false
            }
        }
    });
    ok.then_some(BUNDLED_FAMILY)
}

/// Family name usable in plotters text styles. Falls back to the bundled
/// face when neither the configured path nor a system face is usable.
pub fn resolve_family(settings: &FontSettings) -> Option<String> {
    let key = (settings.family.clone(), settings.path.clone());
    let mut registered = REGISTERED.lock().unwrap_or_else(|e| e.into_inner());

    let family = match registered.get(&key) {
        Some(family) => family.clone(),
        None => {
            // Distinct faces never share a registry name
            let taken = registered
                .values()
                .flatten()
                .any(|name| *name == settings.family);
            let name = if taken {
                format!("{}-{}", settings.family, registered.len())
            } else {
                settings.family.clone()
            };
            let family = register(settings.path.as_deref(), &name);
            registered.insert(key, family.clone());
            family
        }
    };

    family.or_else(|| bundled_family().map(str::to_string))
}

fn register(configured: Option<&Path>, name: &str) -> Option<String> {
    let Some(path) = locate(configured) else {
        debug!("no system font face found; using the bundled face");
        return None;
    };

    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("cannot read font {}: {}", path.display(), e);
            return None;
        }
    };

    // The registry keeps the face for the life of the process
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    match plotters::style::register_font(name, FontStyle::Normal, bytes) {
        Ok(()) => {
            debug!("registered font {} as '{}'", path.display(), name);
            Some(name.to_string())
        }
        Err(_) => {
            warn!("{} is not a valid font face; using the bundled face", path.display());
            None
        }
    }
}

/// Configured path when it exists, else the first system candidate
pub fn locate(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!("configured font {} does not exist", path.display());
    }
    SYSTEM_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}
