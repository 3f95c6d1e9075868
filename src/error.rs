use thiserror::Error;

#[derive(Debug, Error)]
pub enum MrcError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Image load error: {0}")]
    ImageLoadError(String),

    #[error("OCR layout error: {0}")]
    LayoutError(String),

    #[error("Threshold error: {0}")]
    ThresholdError(String),

    #[error("Codec error: {0}")]
    CodecError(String),

    #[error("Codec timed out: {0}")]
    CodecTimeout(String),

    #[error("Artifact error: {0}")]
    ArtifactError(String),

    #[error("Report error: {0}")]
    ReportError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`MrcError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl MrcError {
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
    /// Create a configuration error.
    config => ConfigError,
    /// Create an image load error.
    image_load => ImageLoadError,
    /// Create an OCR layout error.
    layout => LayoutError,
    /// Create a threshold error.
    threshold => ThresholdError,
    /// Create a codec error.
    codec => CodecError,
    /// Create a codec timeout error.
    codec_timeout => CodecTimeout,
    /// Create an artifact error.
    artifact => ArtifactError,
    /// Create a report error.
    report => ReportError,
}

impl From<image::ImageError> for MrcError {
    fn from(e: image::ImageError) -> Self {
        Self::ImageLoadError(e.to_string())
    }
}

impl From<serde_json::Error> for MrcError {
    fn from(e: serde_json::Error) -> Self {
        Self::LayoutError(e.to_string())
    }
}

impl From<serde_yml::Error> for MrcError {
    fn from(e: serde_yml::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MrcError>;
