//! Client-side PDF editing core
//!
//! Renders pages into a preview, maps overlay boxes drawn in screen pixels
//! back to document points, and writes text, images, whiteouts, crops,
//! watermarks, page numbers and form values into the document using lopdf.
//!
//! The usual entry point is [`EditorSession`]; the lower-level pieces
//! ([`PageViewport`], [`OverlayModel`], [`MutationCompiler`]) can be used on
//! their own.

pub mod annotations;
pub mod compiler;
pub mod config;
pub(crate) mod content;
pub mod document;
pub mod error;
pub mod forms;
pub mod geometry;
pub mod image;
pub mod metrics;
pub mod overlay;
pub mod page_numbers;
pub mod raster;
pub mod session;
pub mod style;
pub mod viewport;
pub mod watermark;

#[cfg(test)]
mod test_support;

pub use annotations::{extract, extract_document, page_annotations, FormFieldWidget, PageAnnotation};
pub use compiler::{CompileReport, EditJob, MutationCompiler};
pub use config::EditorConfig;
pub use document::{DocumentHandle, DocumentMetadata};
pub use error::{EditorError, FieldWriteError, RenderError};
pub use forms::{FieldKind, FieldValue, FormCatalog, FormField};
pub use geometry::{DocRect, PageGeometry, Rotation, ScreenRect};
pub use overlay::{CropScope, OverlayId, OverlayKind, OverlayModel, OverlayObject, OverlayPayload};
pub use page_numbers::{PageNumberPosition, PageNumberSpec};
pub use raster::{PageRasterizer, PaperBackend, RenderBackend, RenderOutcome, RenderTicket, Surface};
pub use session::{EditorSession, SaveTicket, SavedDocument};
pub use style::TextStyle;
pub use viewport::PageViewport;
pub use watermark::{WatermarkLayout, WatermarkSpec};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8], password: Option<&str>) -> Result<u32, EditorError> {
    Ok(DocumentHandle::load(bytes, password)?.page_count())
}
