use thiserror::Error;

/// Errors produced by the rendering and export engine.
///
/// `Validation` and `Encoding` are meant for the caller. `Backend` and `Asset`
/// are recovered inside the engine (fallback chain, logo omission) and only
/// escape from the low-level compositors. `Export` is reported when every
/// document assembly path failed and no raw image could be produced either.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("render backend unavailable: {0}")]
    Backend(String),

    #[error("logo asset error: {0}")]
    Asset(String),

    #[error("content cannot be encoded: {0}")]
    Encoding(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl Error {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = Error::validation("border_color", "expected #RRGGBB");
        assert_eq!(err.to_string(), "invalid border_color: expected #RRGGBB");
    }

    #[test]
    fn test_io_error_is_transparent() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert_eq!(err.to_string(), "gone");
    }
}
