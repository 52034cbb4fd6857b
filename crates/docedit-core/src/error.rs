use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Failed to load PDF: {0}")]
    Load(String),

    #[error("PDF is encrypted and the password is missing or wrong")]
    PasswordRequired,

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Failed to save PDF: {0}")]
    Save(String),

    #[error(transparent)]
    FieldWrite(#[from] FieldWriteError),

    #[error("Page {page} does not exist (document has {count} pages)")]
    InvalidPage { page: u32, count: u32 },

    #[error("Unsupported image: {0}")]
    Image(String),

    #[error("Document was replaced while the save was in flight")]
    StaleSession,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("PDF operation failed: {0}")]
    Operation(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Page {page} is out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: u32 },

    #[error("Cannot allocate a {width}x{height} drawing surface")]
    SurfaceUnavailable { width: u32, height: u32 },

    #[error("Viewport has no measured width yet")]
    NotMeasured,

    #[error("Rasterizer failed: {0}")]
    Backend(String),
}

/// A single form value that could not be written. Recoverable: the save
/// continues with the remaining fields.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("Cannot set field '{field}': {reason}")]
pub struct FieldWriteError {
    pub field: String,
    pub reason: String,
}

impl FieldWriteError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
