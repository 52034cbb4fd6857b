//! Form widget extraction
//!
//! Widget annotations are read per page in document space and matched to the
//! form catalog by fully qualified field name. Matching widgets are converted
//! to screen rectangles for the viewport they will be shown in.

use crate::document::{number, resolve, text_of, DocumentHandle};
use crate::error::EditorError;
use crate::forms::{FieldKind, FieldValue, FormCatalog};
use crate::geometry::{DocRect, ScreenRect};
use crate::viewport::PageViewport;
use lopdf::{Dictionary, Document, Object};
use serde::{Deserialize, Serialize};

const MAX_PARENT_DEPTH: usize = 32;

/// One annotation as it appears on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnnotation {
    pub subtype: String,
    pub rect: DocRect,
    /// Fully qualified name of the field a widget belongs to
    pub field_name: Option<String>,
    /// Appearance state that turns a checkbox or radio widget on
    pub on_value: Option<String>,
}

/// A form field widget positioned in screen space
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormFieldWidget {
    pub field_name: String,
    pub kind: FieldKind,
    pub page: u32,
    pub rect: ScreenRect,
    pub options: Vec<String>,
    pub value: FieldValue,
    pub on_value: Option<String>,
}

/// Read the annotations of one page (1-indexed). Malformed entries are skipped.
pub fn page_annotations(handle: &DocumentHandle, page: u32) -> Result<Vec<PageAnnotation>, EditorError> {
    let doc = handle.document();
    let page_id = handle.page_id(page)?;
    let page_dict = doc
        .get_dictionary(page_id)
        .map_err(|e| EditorError::Operation(format!("page {}: {}", page, e)))?;
    let Ok(annots) = page_dict.get(b"Annots") else {
        return Ok(Vec::new());
    };
    let annots = resolve(doc, annots)
        .as_array()
        .map_err(|e| EditorError::Operation(format!("page {} annotations: {}", page, e)))?;

    let mut result = Vec::with_capacity(annots.len());
    for annot in annots {
        let Ok(dict) = resolve(doc, annot).as_dict() else {
            tracing::debug!("Skipping non-dictionary annotation on page {}", page);
            continue;
        };
        match read_annotation(doc, dict) {
            Some(annotation) => result.push(annotation),
            None => tracing::debug!("Skipping annotation without a usable rect on page {}", page),
        }
    }
    Ok(result)
}

fn read_annotation(doc: &Document, dict: &Dictionary) -> Option<PageAnnotation> {
    let subtype = dict
        .get(b"Subtype")
        .ok()
        .and_then(|s| resolve(doc, s).as_name().ok())
        .map(|s| String::from_utf8_lossy(s).into_owned())?;
    let rect = dict.get(b"Rect").ok().and_then(|r| parse_rect(doc, r))?;
    let is_widget = subtype == "Widget";
    Some(PageAnnotation {
        field_name: if is_widget { full_name(doc, dict) } else { None },
        on_value: if is_widget { on_state(doc, dict) } else { None },
        subtype,
        rect,
    })
}

fn parse_rect(doc: &Document, obj: &Object) -> Option<DocRect> {
    let values = resolve(doc, obj).as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let mut corners = [0.0; 4];
    for (slot, value) in corners.iter_mut().zip(values) {
        *slot = number(resolve(doc, value))?;
    }
    Some(DocRect::from_corners(corners[0], corners[1], corners[2], corners[3]))
}

/// Partial names from the widget up through its parents, joined with dots
fn full_name(doc: &Document, widget: &Dictionary) -> Option<String> {
    let mut parts = Vec::new();
    let mut current = widget;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(partial) = current.get(b"T").ok().and_then(|t| text_of(doc, t)) {
            parts.push(partial);
        }
        let Some(parent) = current
            .get(b"Parent")
            .ok()
            .and_then(|p| resolve(doc, p).as_dict().ok())
        else {
            break;
        };
        current = parent;
    }
    if parts.is_empty() {
        return None;
    }
    parts.reverse();
    Some(parts.join("."))
}

fn on_state(doc: &Document, widget: &Dictionary) -> Option<String> {
    let normal = widget
        .get(b"AP")
        .ok()
        .and_then(|ap| resolve(doc, ap).as_dict().ok())
        .and_then(|ap| ap.get(b"N").ok())
        .and_then(|n| resolve(doc, n).as_dict().ok())?;
    normal
        .iter()
        .map(|(k, _)| String::from_utf8_lossy(k).into_owned())
        .find(|k| k != "Off")
}

/// Match widget annotations to catalog fields and place them in `viewport`.
///
/// Annotations that are not widgets, or whose field is not in the catalog,
/// are skipped. The result follows annotation order, so repeated calls with
/// the same inputs return the same list.
pub fn extract(
    catalog: &FormCatalog,
    annotations: &[PageAnnotation],
    viewport: &PageViewport,
) -> Vec<FormFieldWidget> {
    let mut widgets = Vec::new();
    for annotation in annotations {
        if annotation.subtype != "Widget" {
            continue;
        }
        let Some(name) = annotation.field_name.as_deref() else {
            tracing::debug!("Skipping widget without a field name");
            continue;
        };
        let Some(field) = catalog.get(name) else {
            tracing::debug!("Skipping widget for unsupported field '{}'", name);
            continue;
        };
        let Some(rect) = viewport.to_screen(&annotation.rect) else {
            tracing::debug!("Viewport for page {} is not measured yet", viewport.page);
            return Vec::new();
        };
        widgets.push(FormFieldWidget {
            field_name: field.name.clone(),
            kind: field.kind,
            page: viewport.page,
            rect,
            options: field.options.clone(),
            value: field.value.clone(),
            on_value: match field.kind {
                FieldKind::Checkbox | FieldKind::Radio => annotation.on_value.clone(),
                FieldKind::Text | FieldKind::Dropdown => None,
            },
        });
    }
    widgets
}

/// Extract widgets for every page rendered at `pixel_width`.
/// Pages whose annotations cannot be read are logged and skipped.
pub fn extract_document(handle: &DocumentHandle, catalog: &FormCatalog, pixel_width: f64) -> Vec<FormFieldWidget> {
    if catalog.is_empty() {
        return Vec::new();
    }
    let mut widgets = Vec::new();
    for geometry in handle.pages() {
        let Some(viewport) = PageViewport::measure(geometry, pixel_width) else {
            continue;
        };
        match page_annotations(handle, geometry.page) {
            Ok(annotations) => widgets.extend(extract(catalog, &annotations, &viewport)),
            Err(e) => tracing::warn!("Skipping widgets on page {}: {}", geometry.page, e),
        }
    }
    widgets
}
