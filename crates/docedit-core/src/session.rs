//! Editing session state
//!
//! One session owns one loaded document and every pending edit made against
//! it. Replacing the document or resetting bumps an epoch; renders and saves
//! started under an older epoch are rejected so they never land on new state.

use crate::annotations::{extract, page_annotations, FormFieldWidget};
use crate::compiler::{EditJob, MutationCompiler};
use crate::config::EditorConfig;
use crate::document::{DocumentHandle, DocumentMetadata};
use crate::error::{EditorError, FieldWriteError, RenderError};
use crate::forms::{FieldValue, FormCatalog};
use crate::overlay::OverlayModel;
use crate::page_numbers::PageNumberSpec;
use crate::raster::{PageRasterizer, PaperBackend, RenderBackend, RenderOutcome, RenderTicket};
use crate::viewport::PageViewport;
use crate::watermark::WatermarkSpec;
use serde::Serialize;
use std::collections::BTreeMap;

const DEFAULT_NAME: &str = "document.pdf";

/// Proof that a save was requested under a particular epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTicket {
    epoch: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedDocument {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub suggested_name: String,
    pub field_errors: Vec<FieldWriteError>,
}

pub struct EditorSession<B: RenderBackend = PaperBackend> {
    name: String,
    handle: DocumentHandle,
    epoch: u64,
    config: EditorConfig,
    overlays: OverlayModel,
    catalog: FormCatalog,
    form_values: BTreeMap<String, FieldValue>,
    watermark: Option<WatermarkSpec>,
    page_numbers: Option<PageNumberSpec>,
    rotations: BTreeMap<u32, i64>,
    metadata: Option<DocumentMetadata>,
    rasterizer: PageRasterizer<B>,
}

impl<B: RenderBackend> EditorSession<B> {
    pub fn open(
        name: &str,
        bytes: &[u8],
        password: Option<&str>,
        config: EditorConfig,
        backend: B,
    ) -> Result<Self, EditorError> {
        config.validate()?;
        let handle = DocumentHandle::load(bytes, password)?;
        let rasterizer = PageRasterizer::initialize(backend, &config.render)?;
        let catalog = FormCatalog::read(handle.document());
        tracing::info!(
            "Opened '{}': {} pages, {} form fields",
            name,
            handle.page_count(),
            catalog.len()
        );
        Ok(Self {
            name: display_name(name),
            handle,
            epoch: 0,
            overlays: OverlayModel::new(&config),
            catalog,
            form_values: BTreeMap::new(),
            watermark: None,
            page_numbers: None,
            rotations: BTreeMap::new(),
            metadata: None,
            rasterizer,
            config,
        })
    }

    /// Swap in a different document. On failure the current document and
    /// its edits are kept.
    pub fn replace_document(&mut self, name: &str, bytes: &[u8], password: Option<&str>) -> Result<(), EditorError> {
        let handle = DocumentHandle::load(bytes, password)?;
        self.catalog = FormCatalog::read(handle.document());
        self.handle = handle;
        self.name = display_name(name);
        self.reset();
        tracing::info!("Replaced document with '{}'", self.name);
        Ok(())
    }

    /// Drop every pending edit and invalidate in-flight work
    pub fn reset(&mut self) {
        self.overlays.clear();
        self.form_values.clear();
        self.watermark = None;
        self.page_numbers = None;
        self.rotations.clear();
        self.metadata = None;
        self.epoch += 1;
        self.rasterizer.invalidate();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn handle(&self) -> &DocumentHandle {
        &self.handle
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &FormCatalog {
        &self.catalog
    }

    pub fn overlays(&self) -> &OverlayModel {
        &self.overlays
    }

    pub fn overlays_mut(&mut self) -> &mut OverlayModel {
        &mut self.overlays
    }

    pub fn viewport(&self, page: u32, pixel_width: f64) -> Result<Option<PageViewport>, EditorError> {
        Ok(PageViewport::measure(self.handle.page(page)?, pixel_width))
    }

    pub fn begin_render(&mut self, page: u32, pixel_width: f64) -> Result<Option<RenderTicket>, RenderError> {
        self.rasterizer.begin(&self.handle, page, pixel_width)
    }

    pub fn is_current_render(&self, ticket: &RenderTicket) -> bool {
        self.rasterizer.is_current(ticket)
    }

    pub fn render(&mut self, page: u32, pixel_width: f64) -> Result<RenderOutcome, RenderError> {
        self.rasterizer.render(&self.handle, page, pixel_width)
    }

    /// Paint a ticket from [`begin_render`](Self::begin_render); stale
    /// tickets come back as `Superseded`
    pub fn paint_render(&mut self, ticket: &RenderTicket) -> Result<RenderOutcome, RenderError> {
        self.rasterizer.paint(ticket)
    }

    /// Form widgets of one page laid out for `viewport`
    pub fn form_widgets(&self, viewport: &PageViewport) -> Result<Vec<FormFieldWidget>, EditorError> {
        if self.catalog.is_empty() {
            return Ok(Vec::new());
        }
        let annotations = page_annotations(&self.handle, viewport.page)?;
        Ok(extract(&self.catalog, &annotations, viewport))
    }

    /// Current value of a field, including unsaved edits
    pub fn field_value(&self, name: &str) -> Option<&FieldValue> {
        self.form_values
            .get(name)
            .or_else(|| self.catalog.get(name).map(|f| &f.value))
    }

    /// Record a form value. Only values that differ from the document are kept.
    pub fn set_field_value(&mut self, name: &str, value: FieldValue) -> Result<(), EditorError> {
        let field = self
            .catalog
            .get(name)
            .ok_or_else(|| FieldWriteError::new(name, "no such field"))?;
        if field.value == value {
            self.form_values.remove(name);
        } else {
            self.form_values.insert(name.to_string(), value);
        }
        Ok(())
    }

    pub fn changed_fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.form_values
    }

    pub fn set_watermark(&mut self, spec: Option<WatermarkSpec>) {
        self.watermark = spec;
    }

    pub fn set_page_numbers(&mut self, spec: Option<PageNumberSpec>) {
        self.page_numbers = spec;
    }

    /// Add a clockwise quarter-turn rotation to a page
    pub fn rotate_page(&mut self, page: u32, delta: i64) -> Result<i64, EditorError> {
        self.handle.page(page)?;
        if delta % 90 != 0 {
            return Err(EditorError::Operation(format!(
                "rotation of {} degrees is not a multiple of 90",
                delta
            )));
        }
        let total = (self.rotations.get(&page).copied().unwrap_or(0) + delta).rem_euclid(360);
        if total == 0 {
            self.rotations.remove(&page);
        } else {
            self.rotations.insert(page, total);
        }
        Ok(total)
    }

    pub fn set_metadata(&mut self, metadata: Option<DocumentMetadata>) {
        self.metadata = metadata.filter(|m| !m.is_empty());
    }

    pub fn edit_job(&self) -> EditJob {
        EditJob {
            overlays: self.overlays.objects().to_vec(),
            form_values: self.form_values.clone(),
            watermark: self.watermark.clone(),
            page_numbers: self.page_numbers.clone(),
            rotations: self.rotations.clone(),
            metadata: self.metadata.clone(),
        }
    }

    pub fn begin_save(&self) -> SaveTicket {
        SaveTicket { epoch: self.epoch }
    }

    /// Compile pending edits into a new file. Fails with `StaleSession` if
    /// the document was replaced or reset since `ticket` was issued.
    pub fn complete_save(&self, ticket: SaveTicket) -> Result<SavedDocument, EditorError> {
        if ticket.epoch != self.epoch {
            return Err(EditorError::StaleSession);
        }
        let job = self.edit_job();
        let (bytes, report) = MutationCompiler::new(&self.config).compile(&self.handle, &self.catalog, &job)?;
        Ok(SavedDocument {
            bytes,
            suggested_name: format!("{}{}", job.name_prefix(), self.name),
            field_errors: report.field_errors,
        })
    }

    pub fn save(&self) -> Result<SavedDocument, EditorError> {
        self.complete_save(self.begin_save())
    }
}

fn display_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() {
        return DEFAULT_NAME.to_string();
    }
    if base.to_ascii_lowercase().ends_with(".pdf") {
        base.to_string()
    } else {
        format!("{}.pdf", base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ScreenRect;
    use crate::overlay::OverlayPayload;
    use crate::style::TextStyle;
    use crate::test_support::{form_pdf, letter_pdf};
    use pretty_assertions::assert_eq;

    fn open(bytes: &[u8]) -> EditorSession {
        EditorSession::open("lease.pdf", bytes, None, EditorConfig::default(), PaperBackend).unwrap()
    }

    #[test]
    fn test_save_after_reset_is_stale() {
        let mut session = open(&letter_pdf(1));
        let ticket = session.begin_save();
        session.reset();
        assert!(matches!(session.complete_save(ticket), Err(EditorError::StaleSession)));
        assert!(session.complete_save(session.begin_save()).is_ok());
    }

    #[test]
    fn test_replace_document_clears_edits() {
        let mut session = open(&letter_pdf(1));
        let viewport = session.viewport(1, 600.0).unwrap().unwrap();
        session
            .overlays_mut()
            .add(1, OverlayPayload::whiteout(), &viewport)
            .unwrap();
        let ticket = session.begin_render(1, 600.0).unwrap().unwrap();

        session.replace_document("form.pdf", &form_pdf(), None).unwrap();
        assert!(session.overlays().is_empty());
        assert!(!session.is_current_render(&ticket));
        assert!(matches!(session.paint_render(&ticket).unwrap(), RenderOutcome::Superseded));
        assert_eq!(session.catalog().len(), 5);
        assert_eq!(session.handle().page_count(), 2);
    }

    #[test]
    fn test_failed_replace_keeps_document() {
        let mut session = open(&letter_pdf(3));
        assert!(session.replace_document("bad.pdf", b"not a pdf", None).is_err());
        assert_eq!(session.handle().page_count(), 3);
        assert_eq!(session.epoch(), 0);
    }

    #[test]
    fn test_only_changed_field_values_are_kept() {
        let mut session = open(&form_pdf());
        session.set_field_value("color", FieldValue::from("Green")).unwrap();
        session.set_field_value("name", FieldValue::from("Alice")).unwrap();
        assert_eq!(session.changed_fields().len(), 1);
        assert_eq!(session.field_value("name"), Some(&FieldValue::from("Alice")));
        assert!(matches!(
            session.set_field_value("nope", FieldValue::from("x")),
            Err(EditorError::FieldWrite(_))
        ));
    }

    #[test]
    fn test_rotation_accumulates() {
        let mut session = open(&letter_pdf(2));
        assert_eq!(session.rotate_page(2, 90).unwrap(), 90);
        assert_eq!(session.rotate_page(2, 270).unwrap(), 0);
        assert!(session.edit_job().rotations.is_empty());
        assert!(session.rotate_page(3, 90).is_err());
        assert!(session.rotate_page(1, 30).is_err());
    }

    #[test]
    fn test_suggested_name_follows_tool() {
        let mut session = open(&letter_pdf(1));
        let viewport = session.viewport(1, 600.0).unwrap().unwrap();
        session
            .overlays_mut()
            .add(
                1,
                OverlayPayload::Text {
                    text: "Hi".to_string(),
                    style: TextStyle::default(),
                },
                &viewport,
            )
            .unwrap();
        let saved = session.save().unwrap();
        assert_eq!(saved.suggested_name, "text-added-lease.pdf");

        session.reset();
        session.set_watermark(Some(WatermarkSpec::default()));
        assert_eq!(session.save().unwrap().suggested_name, "watermarked-lease.pdf");
    }

    #[test]
    fn test_form_widgets_for_viewport() {
        let session = open(&form_pdf());
        let viewport = session.viewport(1, 612.0).unwrap().unwrap();
        let widgets = session.form_widgets(&viewport).unwrap();
        assert_eq!(widgets.len(), 6);
        assert!(widgets[0].rect.approx_eq(&ScreenRect::new(100.0, 72.0, 200.0, 20.0), 1e-9));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("/tmp/report"), "report.pdf");
        assert_eq!(display_name("C:\\docs\\Lease.PDF"), "Lease.PDF");
        assert_eq!(display_name(""), "document.pdf");
    }
}
