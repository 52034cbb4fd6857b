//! Edit session exposed to the browser
//!
//! Wraps a core `EditorSession`. Structured values cross the boundary with
//! serde-wasm-bindgen; every fallible call maps its error to a JS `Error`
//! whose `name` identifies the failure.

use crate::to_js_error;
use docedit_core::overlay::OverlayId;
use docedit_core::page_numbers::place;
use docedit_core::watermark::plan;
use docedit_core::{
    DocumentMetadata, EditorConfig, EditorError, EditorSession, FieldValue, OverlayPayload,
    PageNumberSpec, PageViewport, PaperBackend, RenderTicket, SaveTicket, SavedDocument,
    ScreenRect, WatermarkSpec,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

fn from_js<T: DeserializeOwned>(value: JsValue, what: &str) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", what, e)))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// A save that was requested but not yet completed
#[wasm_bindgen]
pub struct PendingSave {
    ticket: SaveTicket,
}

/// Output of a successful save
#[wasm_bindgen]
pub struct SaveResult {
    saved: SavedDocument,
}

#[wasm_bindgen]
impl SaveResult {
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(self.saved.bytes.as_slice())
    }

    #[wasm_bindgen(getter, js_name = suggestedName)]
    pub fn suggested_name(&self) -> String {
        self.saved.suggested_name.clone()
    }

    /// Fields that could not be written, as `[{field, reason}]`
    #[wasm_bindgen(getter, js_name = fieldErrors)]
    pub fn field_errors(&self) -> Result<JsValue, JsValue> {
        to_js(&self.saved.field_errors)
    }
}

/// Session for editing a single PDF document
#[wasm_bindgen]
pub struct EditSession {
    inner: EditorSession<PaperBackend>,
    document_bytes: Vec<u8>,
}

impl EditSession {
    /// Internal constructor (testable without JsValue)
    fn open(
        name: &str,
        bytes: &[u8],
        password: Option<&str>,
        config_toml: Option<&str>,
    ) -> Result<Self, EditorError> {
        let config = match config_toml {
            Some(toml) => EditorConfig::from_toml(toml)?,
            None => EditorConfig::default(),
        };
        let inner = EditorSession::open(name, bytes, password, config, PaperBackend)?;
        Ok(Self {
            inner,
            document_bytes: bytes.to_vec(),
        })
    }

    fn viewport_for(&self, page: u32, pixel_width: f64) -> Result<PageViewport, EditorError> {
        self.inner
            .viewport(page, pixel_width)?
            .ok_or(EditorError::Render(docedit_core::RenderError::NotMeasured))
    }

    fn add_overlay_internal(
        &mut self,
        page: u32,
        payload: OverlayPayload,
        viewport: &PageViewport,
        rect: Option<ScreenRect>,
    ) -> Result<OverlayId, EditorError> {
        let overlays = self.inner.overlays_mut();
        match rect {
            Some(rect) => overlays.add_at(page, payload, viewport, rect),
            None => overlays.add(page, payload, viewport),
        }
    }

    fn save_internal(&self, ticket: SaveTicket) -> Result<SavedDocument, EditorError> {
        let saved = self.inner.complete_save(ticket)?;
        for error in &saved.field_errors {
            web_sys::console::warn_1(&JsValue::from_str(&error.to_string()));
        }
        Ok(saved)
    }
}

#[wasm_bindgen]
impl EditSession {
    /// Open a document. `config_toml` overrides layout defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(
        name: &str,
        bytes: &[u8],
        password: Option<String>,
        config_toml: Option<String>,
    ) -> Result<EditSession, JsValue> {
        Self::open(name, bytes, password.as_deref(), config_toml.as_deref()).map_err(to_js_error)
    }

    /// Load a different file into this session, dropping all edits
    #[wasm_bindgen(js_name = replaceDocument)]
    pub fn replace_document(&mut self, name: &str, bytes: &[u8], password: Option<String>) -> Result<(), JsValue> {
        self.inner
            .replace_document(name, bytes, password.as_deref())
            .map_err(to_js_error)?;
        self.document_bytes = bytes.to_vec();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.inner.handle().page_count()
    }

    #[wasm_bindgen(getter, js_name = documentName)]
    pub fn document_name(&self) -> String {
        self.inner.name().to_string()
    }

    /// Get document bytes for the page renderer
    #[wasm_bindgen(js_name = getDocumentBytes)]
    pub fn get_document_bytes(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(self.document_bytes.as_slice())
    }

    /// Page boxes and rotation
    #[wasm_bindgen(js_name = getPageInfo)]
    pub fn get_page_info(&self, page: u32) -> Result<JsValue, JsValue> {
        let geometry = self.inner.handle().page(page).map_err(to_js_error)?;
        to_js(geometry)
    }

    /// Viewport for a page laid out at `pixel_width`, or null while unmeasured
    pub fn viewport(&self, page: u32, pixel_width: f64) -> Result<JsValue, JsValue> {
        let viewport = self.inner.viewport(page, pixel_width).map_err(to_js_error)?;
        to_js(&viewport)
    }

    /// Start rendering a page. Returns a ticket, or null while the container
    /// has no width. Starting a new render supersedes every older ticket.
    #[wasm_bindgen(js_name = beginRender)]
    pub fn begin_render(&mut self, page: u32, pixel_width: f64) -> Result<JsValue, JsValue> {
        let ticket = self
            .inner
            .begin_render(page, pixel_width)
            .map_err(|e| to_js_error(e.into()))?;
        to_js(&ticket)
    }

    /// Whether a finished render may still be painted
    #[wasm_bindgen(js_name = isCurrentRender)]
    pub fn is_current_render(&self, ticket: JsValue) -> Result<bool, JsValue> {
        let ticket: RenderTicket = from_js(ticket, "render ticket")?;
        Ok(self.inner.is_current_render(&ticket))
    }

    /// Place an overlay at its default position. `payload` is e.g.
    /// `{kind: "image", data: "data:image/png;base64,..."}`.
    #[wasm_bindgen(js_name = addOverlay)]
    pub fn add_overlay(&mut self, page: u32, payload: JsValue, viewport: JsValue) -> Result<f64, JsValue> {
        let payload: OverlayPayload = from_js(payload, "overlay payload")?;
        let viewport: PageViewport = from_js(viewport, "viewport")?;
        let id = self
            .add_overlay_internal(page, payload, &viewport, None)
            .map_err(to_js_error)?;
        Ok(id as f64)
    }

    /// Place an overlay over an explicit screen rectangle
    #[wasm_bindgen(js_name = addOverlayAt)]
    #[allow(clippy::too_many_arguments)]
    pub fn add_overlay_at(
        &mut self,
        page: u32,
        payload: JsValue,
        viewport: JsValue,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<f64, JsValue> {
        let payload: OverlayPayload = from_js(payload, "overlay payload")?;
        let viewport: PageViewport = from_js(viewport, "viewport")?;
        let rect = ScreenRect::new(x, y, width, height);
        let id = self
            .add_overlay_internal(page, payload, &viewport, Some(rect))
            .map_err(to_js_error)?;
        Ok(id as f64)
    }

    /// Whiteout plus replacement text. Returns `[whiteoutId, textId]`.
    #[wasm_bindgen(js_name = addErasePair)]
    pub fn add_erase_pair(
        &mut self,
        page: u32,
        viewport: JsValue,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<Vec<f64>, JsValue> {
        let viewport: PageViewport = from_js(viewport, "viewport")?;
        let (whiteout, text) = self
            .inner
            .overlays_mut()
            .add_erase_pair(page, &viewport, ScreenRect::new(x, y, width, height))
            .map_err(to_js_error)?;
        Ok(vec![whiteout as f64, text as f64])
    }

    #[wasm_bindgen(js_name = moveOverlay)]
    pub fn move_overlay(&mut self, id: f64, x: f64, y: f64) -> bool {
        self.inner.overlays_mut().move_to(id as OverlayId, x, y)
    }

    #[wasm_bindgen(js_name = resizeOverlay)]
    pub fn resize_overlay(&mut self, id: f64, x: f64, y: f64, width: f64, height: f64) -> bool {
        self.inner
            .overlays_mut()
            .resize(id as OverlayId, ScreenRect::new(x, y, width, height))
    }

    #[wasm_bindgen(js_name = setOverlayText)]
    pub fn set_overlay_text(&mut self, id: f64, text: &str) -> bool {
        self.inner.overlays_mut().set_text(id as OverlayId, text)
    }

    /// Remove an overlay (and its pair partner). Returns every removed id.
    #[wasm_bindgen(js_name = removeOverlay)]
    pub fn remove_overlay(&mut self, id: f64) -> Vec<f64> {
        self.inner
            .overlays_mut()
            .remove(id as OverlayId)
            .into_iter()
            .map(|id| id as f64)
            .collect()
    }

    /// Overlays to show while `page` is displayed
    #[wasm_bindgen(js_name = getOverlays)]
    pub fn get_overlays(&self, page: u32) -> Result<JsValue, JsValue> {
        to_js(&self.inner.overlays().on_page(page))
    }

    /// Form widgets of the page described by `viewport`
    #[wasm_bindgen(js_name = getFormWidgets)]
    pub fn get_form_widgets(&self, viewport: JsValue) -> Result<JsValue, JsValue> {
        let viewport: PageViewport = from_js(viewport, "viewport")?;
        let widgets = self.inner.form_widgets(&viewport).map_err(to_js_error)?;
        to_js(&widgets)
    }

    /// `value` is a string, or a boolean for checkboxes
    #[wasm_bindgen(js_name = setFieldValue)]
    pub fn set_field_value(&mut self, name: &str, value: JsValue) -> Result<(), JsValue> {
        let value: FieldValue = from_js(value, "field value")?;
        self.inner.set_field_value(name, value).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = setWatermark)]
    pub fn set_watermark(&mut self, spec: JsValue) -> Result<(), JsValue> {
        let spec: Option<WatermarkSpec> = from_js(spec, "watermark")?;
        self.inner.set_watermark(spec);
        Ok(())
    }

    /// Preview anchors for a watermark on the page described by `viewport`
    #[wasm_bindgen(js_name = getWatermarkPreview)]
    pub fn get_watermark_preview(&self, spec: JsValue, viewport: JsValue) -> Result<JsValue, JsValue> {
        let spec: WatermarkSpec = from_js(spec, "watermark")?;
        let viewport: PageViewport = from_js(viewport, "viewport")?;
        let geometry = self.inner.handle().page(viewport.page).map_err(to_js_error)?;
        let (width, height) = geometry.rotated_size();
        let layout = plan(width, height, &spec, &self.inner.config().watermark);
        to_js(&layout.preview(&viewport))
    }

    #[wasm_bindgen(js_name = setPageNumbers)]
    pub fn set_page_numbers(&mut self, spec: JsValue) -> Result<(), JsValue> {
        let spec: Option<PageNumberSpec> = from_js(spec, "page numbers")?;
        self.inner.set_page_numbers(spec);
        Ok(())
    }

    #[wasm_bindgen(js_name = getPageNumberPreview)]
    pub fn get_page_number_preview(&self, spec: JsValue, viewport: JsValue) -> Result<JsValue, JsValue> {
        let spec: PageNumberSpec = from_js(spec, "page numbers")?;
        let viewport: PageViewport = from_js(viewport, "viewport")?;
        let geometry = self.inner.handle().page(viewport.page).map_err(to_js_error)?;
        let (width, height) = geometry.rotated_size();
        let label = place(&spec, viewport.page, width, height, &self.inner.config().page_numbers);
        to_js(&label.preview(&viewport))
    }

    /// Add a clockwise rotation; returns the page's pending total
    #[wasm_bindgen(js_name = rotatePage)]
    pub fn rotate_page(&mut self, page: u32, degrees: i32) -> Result<i32, JsValue> {
        let total = self
            .inner
            .rotate_page(page, i64::from(degrees))
            .map_err(to_js_error)?;
        Ok(total as i32)
    }

    #[wasm_bindgen(js_name = getMetadata)]
    pub fn get_metadata(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.handle().metadata())
    }

    #[wasm_bindgen(js_name = setMetadata)]
    pub fn set_metadata(&mut self, metadata: JsValue) -> Result<(), JsValue> {
        let metadata: Option<DocumentMetadata> = from_js(metadata, "metadata")?;
        self.inner.set_metadata(metadata);
        Ok(())
    }

    /// Snapshot the session before awaiting anything else; completing the
    /// save fails if the document was replaced or reset in the meantime.
    #[wasm_bindgen(js_name = beginSave)]
    pub fn begin_save(&self) -> PendingSave {
        PendingSave {
            ticket: self.inner.begin_save(),
        }
    }

    #[wasm_bindgen(js_name = completeSave)]
    pub fn complete_save(&self, pending: &PendingSave) -> Result<SaveResult, JsValue> {
        let saved = self.save_internal(pending.ticket).map_err(to_js_error)?;
        Ok(SaveResult { saved })
    }

    pub fn save(&self) -> Result<SaveResult, JsValue> {
        self.complete_save(&self.begin_save())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docedit_core::TextStyle;
    use lopdf::{dictionary, Document, Object, Stream};

    fn create_test_pdf(num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut page_ids = Vec::new();
        for i in 0..num_pages {
            let content = format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", i + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            page_ids.push(Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => Object::Reference(content_id),
            })));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => num_pages as i64,
                "Kids" => page_ids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_open_with_config_override() {
        let config = "[watermark]\ngrid_step = 200.0\n";
        let session = EditSession::open("a.pdf", &create_test_pdf(2), None, Some(config)).unwrap();
        assert_eq!(session.inner.config().watermark.grid_step, 200.0);
        assert_eq!(session.page_count(), 2);
    }

    #[test]
    fn test_open_rejects_invalid_pdf() {
        let result = EditSession::open("bad.pdf", b"not a valid pdf", None, None);
        assert!(matches!(result, Err(EditorError::Load(_))));
    }

    #[test]
    fn test_overlay_then_save() {
        let mut session = EditSession::open("a.pdf", &create_test_pdf(1), None, None).unwrap();
        let viewport = session.viewport_for(1, 600.0).unwrap();
        let payload = OverlayPayload::Text {
            text: "Approved".to_string(),
            style: TextStyle::default(),
        };
        let id = session
            .add_overlay_internal(1, payload, &viewport, Some(ScreenRect::new(10.0, 10.0, 200.0, 40.0)))
            .unwrap();
        assert!(session.move_overlay(id as f64, 20.0, 20.0));

        let saved = session.inner.save().unwrap();
        assert_eq!(saved.suggested_name, "text-added-a.pdf");
        assert!(Document::load_mem(&saved.bytes).is_ok());
    }

    #[test]
    fn test_unmeasured_viewport_is_an_error() {
        let session = EditSession::open("a.pdf", &create_test_pdf(1), None, None).unwrap();
        assert!(matches!(
            session.viewport_for(1, 0.0),
            Err(EditorError::Render(_))
        ));
    }
}
