//! Writing edits into the document
//!
//! An [`EditJob`] collects everything the user asked for. The compiler
//! converts overlays to document space with the viewport captured when each
//! one was placed, draws them into per-page content streams and rewrites page
//! boxes, form values, rotations and metadata. Compilation runs on a copy of
//! the loaded document, so a failure never leaves a half-written result.

use crate::config::EditorConfig;
use crate::content::{page_dict_mut, PageCanvas};
use crate::document::{box_array, serialize, DocumentHandle, DocumentMetadata};
use crate::error::{EditorError, FieldWriteError, RenderError};
use crate::forms::{apply_values, FieldValue, FormCatalog};
use crate::geometry::DocRect;
use crate::image::{decode_payload, embed};
use crate::metrics::{encode_win_ansi, metrics_for, wrap_text};
use crate::overlay::{check_placement, CropScope, OverlayKind, OverlayObject, OverlayPayload};
use crate::page_numbers::{place, PageNumberSpec};
use crate::style::{parse_hex_color, TextStyle};
use crate::viewport::{PageViewport, PlacementFrame};
use crate::watermark::{plan, WatermarkSpec};
use lopdf::{Document, Object};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// All edits for one save
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditJob {
    pub overlays: Vec<OverlayObject>,
    /// Changed form values by fully qualified field name
    pub form_values: BTreeMap<String, FieldValue>,
    pub watermark: Option<WatermarkSpec>,
    pub page_numbers: Option<PageNumberSpec>,
    /// Clockwise rotation added to each listed page, in multiples of 90
    pub rotations: BTreeMap<u32, i64>,
    pub metadata: Option<DocumentMetadata>,
}

impl EditJob {
    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
            && self.form_values.is_empty()
            && self.watermark.is_none()
            && self.page_numbers.is_none()
            && self.rotations.is_empty()
            && self.metadata.is_none()
    }

    /// Download name prefix for the tool that produced this job
    pub fn name_prefix(&self) -> &'static str {
        let mut tools = BTreeSet::new();
        for overlay in &self.overlays {
            tools.insert(match overlay.kind() {
                OverlayKind::Text => "text-added-",
                OverlayKind::Image => "image-added-",
                OverlayKind::Signature => "signed-",
                OverlayKind::Crop => "cropped-",
                OverlayKind::Whiteout => "edited-",
            });
        }
        if !self.form_values.is_empty() {
            tools.insert("filled-");
        }
        if self.watermark.is_some() {
            tools.insert("watermarked-");
        }
        if self.page_numbers.is_some() {
            tools.insert("numbered-");
        }
        if !self.rotations.is_empty() {
            tools.insert("rotated-");
        }
        if self.metadata.is_some() {
            tools.insert("metadata-updated-");
        }
        match (tools.len(), tools.first()) {
            (1, Some(prefix)) => *prefix,
            _ => "edited-",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompileReport {
    /// Pages whose content or boxes changed
    pub pages_touched: BTreeSet<u32>,
    /// Form values that could not be written; the rest of the save went ahead
    pub field_errors: Vec<FieldWriteError>,
}

pub struct MutationCompiler<'a> {
    config: &'a EditorConfig,
}

impl<'a> MutationCompiler<'a> {
    pub fn new(config: &'a EditorConfig) -> Self {
        Self { config }
    }

    /// Apply `job` to a copy of the handle's document and serialize it
    pub fn compile(
        &self,
        handle: &DocumentHandle,
        catalog: &FormCatalog,
        job: &EditJob,
    ) -> Result<(Vec<u8>, CompileReport), EditorError> {
        let mut doc = handle.fork();
        let report = self.apply(&mut doc, handle, catalog, job)?;
        let bytes = serialize(&mut doc)?;
        tracing::info!(
            "Saved PDF: {} bytes, {} pages touched, {} field errors",
            bytes.len(),
            report.pages_touched.len(),
            report.field_errors.len()
        );
        Ok((bytes, report))
    }

    /// Apply `job` to `doc`, which must be a copy of `handle`'s document.
    ///
    /// Drawing order on each page: whiteouts, images and signatures, text,
    /// watermark, page numbers. Whiteouts therefore always sit under any text
    /// placed on the same spot.
    pub fn apply(
        &self,
        doc: &mut Document,
        handle: &DocumentHandle,
        catalog: &FormCatalog,
        job: &EditJob,
    ) -> Result<CompileReport, EditorError> {
        for overlay in &job.overlays {
            handle.page_id(overlay.page)?;
            check_placement(overlay.page, &overlay.viewport, &overlay.rect)?;
        }

        let mut report = CompileReport::default();
        let mut canvases: BTreeMap<u32, PageCanvas> = BTreeMap::new();

        for overlay in overlays_of(job, &[OverlayKind::Whiteout]) {
            let frame = placement(overlay)?;
            let color = match &overlay.payload {
                OverlayPayload::Whiteout { color } => parse_hex_color(color),
                _ => (1.0, 1.0, 1.0),
            };
            let canvas = canvas_for(&mut canvases, doc, handle, overlay.page)?;
            canvas.save_state();
            canvas.concat(frame.matrix);
            canvas.set_fill_rgb(color);
            canvas.fill_rect(0.0, 0.0, frame.width, frame.height);
            canvas.restore_state();
        }

        for overlay in overlays_of(job, &[OverlayKind::Image, OverlayKind::Signature]) {
            let data = match &overlay.payload {
                OverlayPayload::Image { data } | OverlayPayload::Signature { data } => data,
                _ => continue,
            };
            let frame = placement(overlay)?;
            let image = decode_payload(data)?;
            let xobject = embed(doc, &image)?;
            let canvas = canvas_for(&mut canvases, doc, handle, overlay.page)?;
            let name = canvas.image(xobject);
            canvas.save_state();
            canvas.concat(frame.matrix);
            canvas.concat([frame.width, 0.0, 0.0, frame.height, 0.0, 0.0]);
            canvas.draw_xobject(&name);
            canvas.restore_state();
        }

        for overlay in overlays_of(job, &[OverlayKind::Text]) {
            let OverlayPayload::Text { text, style } = &overlay.payload else {
                continue;
            };
            let frame = placement(overlay)?;
            let canvas = canvas_for(&mut canvases, doc, handle, overlay.page)?;
            self.draw_text(doc, canvas, &frame, overlay.viewport.scale, text, style);
        }

        if let Some(spec) = job.watermark.as_ref().filter(|spec| !spec.is_blank()) {
            for geometry in handle.pages() {
                let Some(viewport) = PageViewport::at_scale(geometry, 1.0) else {
                    tracing::warn!("Skipping watermark on page {}: empty page box", geometry.page);
                    continue;
                };
                let (width, height) = geometry.rotated_size();
                let layout = plan(width, height, spec, &self.config.watermark);
                let canvas = canvas_for(&mut canvases, doc, handle, geometry.page)?;
                let font = canvas.font(doc, spec.base_font());
                let state = canvas.opacity(doc, spec.opacity);
                let encoded = encode_win_ansi(&spec.text);
                for (frame, rotation) in layout.instance_frames(&viewport) {
                    canvas.save_state();
                    canvas.concat(frame);
                    canvas.concat(rotation);
                    canvas.set_graphics_state(&state);
                    canvas.set_fill_rgb(spec.rgb());
                    canvas.show_text(
                        &font,
                        layout.font_size,
                        layout.text_offset.0,
                        layout.text_offset.1,
                        encoded.clone(),
                    );
                    canvas.restore_state();
                }
            }
        }

        if let Some(spec) = &job.page_numbers {
            self.draw_page_numbers(doc, handle, spec, &mut canvases)?;
        }

        for (page, canvas) in canvases {
            if !canvas.is_empty() {
                report.pages_touched.insert(page);
            }
            canvas.finish(doc)?;
        }

        for overlay in overlays_of(job, &[OverlayKind::Crop]) {
            let scope = match &overlay.payload {
                OverlayPayload::Crop { scope } => *scope,
                _ => continue,
            };
            let cropped = apply_crop(doc, handle, overlay, scope)?;
            report.pages_touched.extend(cropped);
        }

        report.field_errors = apply_values(doc, catalog, &job.form_values);

        for (&page, &delta) in &job.rotations {
            let rotation = handle.page(page)?.rotation.rotate_by(delta).ok_or_else(|| {
                EditorError::Operation(format!(
                    "rotation of {} degrees on page {} is not a multiple of 90",
                    delta, page
                ))
            })?;
            let page_id = handle.page_id(page)?;
            page_dict_mut(doc, page_id)?.set("Rotate", Object::Integer(rotation.degrees()));
            report.pages_touched.insert(page);
        }

        if let Some(metadata) = &job.metadata {
            metadata.write(doc)?;
        }

        Ok(report)
    }

    /// Wrapped text inside the overlay box. The font size is given in
    /// viewport pixels and converted with the placement-time scale.
    fn draw_text(
        &self,
        doc: &mut Document,
        canvas: &mut PageCanvas,
        frame: &PlacementFrame,
        scale: f64,
        text: &str,
        style: &TextStyle,
    ) {
        let size = style.font_size / scale;
        let base_font = style.base_font();
        let metrics = metrics_for(base_font);
        let line_height = self.config.text.line_advance(style.font_size) / scale;
        let ascent = metrics.ascent_at(size);

        let font = canvas.font(doc, base_font);
        canvas.save_state();
        canvas.concat(frame.matrix);
        canvas.set_fill_rgb(style.rgb());
        for (i, line) in wrap_text(text, metrics, size, frame.width).iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let baseline = frame.height - ascent - i as f64 * line_height;
            canvas.show_text(&font, size, 0.0, baseline, encode_win_ansi(line));
        }
        canvas.restore_state();
    }

    fn draw_page_numbers(
        &self,
        doc: &mut Document,
        handle: &DocumentHandle,
        spec: &PageNumberSpec,
        canvases: &mut BTreeMap<u32, PageCanvas>,
    ) -> Result<(), EditorError> {
        for geometry in handle.pages() {
            let Some(viewport) = PageViewport::at_scale(geometry, 1.0) else {
                tracing::warn!("Skipping page number on page {}: empty page box", geometry.page);
                continue;
            };
            let (width, height) = geometry.rotated_size();
            let label = place(spec, geometry.page, width, height, &self.config.page_numbers);
            let (sx, sy) = label.screen_origin(&viewport);

            let canvas = canvas_for(canvases, doc, handle, geometry.page)?;
            let font = canvas.font(doc, spec.base_font());
            canvas.save_state();
            canvas.concat(viewport.frame_at(sx, sy));
            canvas.set_fill_rgb(spec.rgb());
            canvas.show_text(&font, label.font_size, 0.0, 0.0, encode_win_ansi(&label.text));
            canvas.restore_state();
        }
        Ok(())
    }
}

fn canvas_for<'c>(
    canvases: &'c mut BTreeMap<u32, PageCanvas>,
    doc: &Document,
    handle: &DocumentHandle,
    page: u32,
) -> Result<&'c mut PageCanvas, EditorError> {
    let page_id = handle.page_id(page)?;
    Ok(canvases
        .entry(page)
        .or_insert_with(|| PageCanvas::new(doc, page_id)))
}

fn overlays_of<'j>(job: &'j EditJob, kinds: &'j [OverlayKind]) -> impl Iterator<Item = &'j OverlayObject> {
    job.overlays
        .iter()
        .filter(move |overlay| kinds.contains(&overlay.kind()))
}

fn placement(overlay: &OverlayObject) -> Result<PlacementFrame, EditorError> {
    overlay
        .viewport
        .placement(&overlay.rect)
        .ok_or(EditorError::Render(RenderError::NotMeasured))
}

/// Rewrite MediaBox and CropBox from the crop rectangle. Returns the pages changed.
fn apply_crop(
    doc: &mut Document,
    handle: &DocumentHandle,
    overlay: &OverlayObject,
    scope: CropScope,
) -> Result<Vec<u32>, EditorError> {
    let rect = overlay
        .viewport
        .to_doc(&overlay.rect)
        .ok_or(EditorError::Render(RenderError::NotMeasured))?;
    let own_media = handle.page(overlay.page)?.media_box;
    if rect.intersect(&own_media).is_none() {
        return Err(EditorError::Operation(format!(
            "crop rectangle lies outside page {}",
            overlay.page
        )));
    }

    let targets: Vec<u32> = match scope {
        CropScope::ThisPage => vec![overlay.page],
        CropScope::AllPages => handle.pages().map(|g| g.page).collect(),
    };
    let mut changed = Vec::with_capacity(targets.len());
    for page in targets {
        let media = handle.page(page)?.media_box;
        let Some(visible) = rect.intersect(&media) else {
            tracing::warn!("Crop rectangle misses page {}, leaving it uncropped", page);
            continue;
        };
        set_boxes(doc, handle, page, &visible)?;
        changed.push(page);
    }
    Ok(changed)
}

fn set_boxes(doc: &mut Document, handle: &DocumentHandle, page: u32, rect: &DocRect) -> Result<(), EditorError> {
    let page_id = handle.page_id(page)?;
    let dict = page_dict_mut(doc, page_id)?;
    dict.set("MediaBox", box_array(rect));
    dict.set("CropBox", box_array(rect));
    Ok(())
}
