use thiserror::Error;

#[derive(Debug, Error)]
pub enum TileError {
    #[error("Configuration error: {0}")]
    PolicyError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Geometry error: {0}")]
    GeometryError(String),

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`TileError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl TileError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create a policy/configuration error.
    policy => PolicyError,
    /// Create a decode error.
    decode => DecodeError,
    /// Create a geometry error.
    geometry => GeometryError,
    /// Create a render error.
    render => RenderError,
}

impl From<image::ImageError> for TileError {
    fn from(e: image::ImageError) -> Self {
        Self::DecodeError(e.to_string())
    }
}

impl From<serde_yml::Error> for TileError {
    fn from(e: serde_yml::Error) -> Self {
        Self::PolicyError(e.to_string())
    }
}

impl From<serde_json::Error> for TileError {
    fn from(e: serde_json::Error) -> Self {
        Self::RenderError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TileError>;
