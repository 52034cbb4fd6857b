//! Overlay objects placed over a rendered page
//!
//! The model only tracks what the user placed and where, in screen pixels,
//! together with the viewport snapshot that was current at placement time.
//! Conversion to document space happens once, when the document is saved.

use crate::config::{EditorConfig, OverlayConfig, TextConfig};
use crate::error::{EditorError, RenderError};
use crate::geometry::ScreenRect;
use crate::style::TextStyle;
use crate::viewport::PageViewport;
use serde::{Deserialize, Serialize};

pub type OverlayId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    Text,
    Image,
    Signature,
    Whiteout,
    Crop,
}

impl OverlayKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(OverlayKind::Text),
            "image" => Some(OverlayKind::Image),
            "signature" => Some(OverlayKind::Signature),
            "whiteout" => Some(OverlayKind::Whiteout),
            "crop" => Some(OverlayKind::Crop),
            _ => None,
        }
    }
}

/// Which pages a crop rectangle applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropScope {
    #[default]
    ThisPage,
    AllPages,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayPayload {
    Text {
        text: String,
        #[serde(default)]
        style: TextStyle,
    },
    /// PNG or JPEG as a data URL or bare base64
    Image { data: String },
    Signature { data: String },
    Whiteout {
        #[serde(default = "default_whiteout_color")]
        color: String,
    },
    Crop {
        #[serde(default)]
        scope: CropScope,
    },
}

fn default_whiteout_color() -> String {
    "#FFFFFF".to_string()
}

impl OverlayPayload {
    pub fn kind(&self) -> OverlayKind {
        match self {
            OverlayPayload::Text { .. } => OverlayKind::Text,
            OverlayPayload::Image { .. } => OverlayKind::Image,
            OverlayPayload::Signature { .. } => OverlayKind::Signature,
            OverlayPayload::Whiteout { .. } => OverlayKind::Whiteout,
            OverlayPayload::Crop { .. } => OverlayKind::Crop,
        }
    }

    pub fn whiteout() -> Self {
        OverlayPayload::Whiteout {
            color: default_whiteout_color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayObject {
    pub id: OverlayId,
    /// Page number (1-indexed)
    pub page: u32,
    pub rect: ScreenRect,
    /// Viewport the rect was measured against
    pub viewport: PageViewport,
    /// Shared by the two halves of an erase pair
    #[serde(default)]
    pub pair: Option<OverlayId>,
    #[serde(flatten)]
    pub payload: OverlayPayload,
}

impl OverlayObject {
    pub fn kind(&self) -> OverlayKind {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayModel {
    next_id: OverlayId,
    objects: Vec<OverlayObject>,
    #[serde(skip)]
    defaults: OverlayConfig,
    #[serde(skip)]
    text: TextConfig,
}

impl OverlayModel {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            next_id: 1,
            objects: Vec::new(),
            defaults: config.overlay.clone(),
            text: config.text.clone(),
        }
    }

    /// Place an object at the default position for its kind
    pub fn add(
        &mut self,
        page: u32,
        payload: OverlayPayload,
        viewport: &PageViewport,
    ) -> Result<OverlayId, EditorError> {
        let rect = self.default_rect(payload.kind(), viewport);
        self.add_at(page, payload, viewport, rect)
    }

    /// Place an object at an explicit rectangle (e.g. a drag selection)
    pub fn add_at(
        &mut self,
        page: u32,
        payload: OverlayPayload,
        viewport: &PageViewport,
        rect: ScreenRect,
    ) -> Result<OverlayId, EditorError> {
        check_placement(page, viewport, &rect)?;

        if payload.kind() == OverlayKind::Crop {
            let replaced: Vec<OverlayId> = self
                .objects
                .iter()
                .filter(|o| o.page == page && o.kind() == OverlayKind::Crop)
                .map(|o| o.id)
                .collect();
            if !replaced.is_empty() {
                tracing::debug!("Replacing crop on page {}", page);
                self.objects.retain(|o| !replaced.contains(&o.id));
            }
        }

        let id = self.allocate_id();
        self.objects.push(OverlayObject {
            id,
            page,
            rect,
            viewport: *viewport,
            pair: None,
            payload,
        });
        Ok(id)
    }

    /// Whiteout plus a text box on top of it, linked so that deleting either
    /// deletes both. Returns `(whiteout_id, text_id)`.
    pub fn add_erase_pair(
        &mut self,
        page: u32,
        viewport: &PageViewport,
        rect: ScreenRect,
    ) -> Result<(OverlayId, OverlayId), EditorError> {
        check_placement(page, viewport, &rect)?;
        let whiteout_id = self.allocate_id();
        let text_id = self.allocate_id();
        let style = TextStyle {
            font_size: self.text.erase_font_size,
            ..TextStyle::default()
        };
        self.objects.push(OverlayObject {
            id: whiteout_id,
            page,
            rect,
            viewport: *viewport,
            pair: Some(whiteout_id),
            payload: OverlayPayload::whiteout(),
        });
        self.objects.push(OverlayObject {
            id: text_id,
            page,
            rect,
            viewport: *viewport,
            pair: Some(whiteout_id),
            payload: OverlayPayload::Text {
                text: self.text.erase_placeholder.clone(),
                style,
            },
        });
        Ok((whiteout_id, text_id))
    }

    pub fn move_to(&mut self, id: OverlayId, x: f64, y: f64) -> bool {
        if !(x.is_finite() && y.is_finite()) {
            return false;
        }
        match self.get_mut(id) {
            Some(object) => {
                object.rect.x = x;
                object.rect.y = y;
                true
            }
            None => false,
        }
    }

    pub fn resize(&mut self, id: OverlayId, rect: ScreenRect) -> bool {
        if !rect.is_finite() || rect.width < 0.0 || rect.height < 0.0 {
            return false;
        }
        match self.get_mut(id) {
            Some(object) => {
                object.rect = rect;
                true
            }
            None => false,
        }
    }

    pub fn set_text(&mut self, id: OverlayId, new_text: &str) -> bool {
        match self.get_mut(id).map(|o| &mut o.payload) {
            Some(OverlayPayload::Text { text, .. }) => {
                *text = new_text.to_string();
                true
            }
            _ => false,
        }
    }

    pub fn set_style(&mut self, id: OverlayId, new_style: TextStyle) -> bool {
        match self.get_mut(id).map(|o| &mut o.payload) {
            Some(OverlayPayload::Text { style, .. }) => {
                *style = new_style;
                true
            }
            _ => false,
        }
    }

    pub fn set_crop_scope(&mut self, id: OverlayId, new_scope: CropScope) -> bool {
        match self.get_mut(id).map(|o| &mut o.payload) {
            Some(OverlayPayload::Crop { scope }) => {
                *scope = new_scope;
                true
            }
            _ => false,
        }
    }

    /// Remove an object and everything paired with it. Returns the removed ids.
    pub fn remove(&mut self, id: OverlayId) -> Vec<OverlayId> {
        let Some(target) = self.get(id) else {
            return Vec::new();
        };
        let pair = target.pair;
        let removed: Vec<OverlayId> = self
            .objects
            .iter()
            .filter(|o| o.id == id || (pair.is_some() && o.pair == pair))
            .map(|o| o.id)
            .collect();
        self.objects.retain(|o| !removed.contains(&o.id));
        removed
    }

    pub fn get(&self, id: OverlayId) -> Option<&OverlayObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    fn get_mut(&mut self, id: OverlayId) -> Option<&mut OverlayObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn objects(&self) -> &[OverlayObject] {
        &self.objects
    }

    pub fn on_page(&self, page: u32) -> Vec<&OverlayObject> {
        self.objects.iter().filter(|o| o.page == page).collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop every object. Ids keep counting up so stale references never
    /// resolve to a new object.
    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restore objects saved with [`OverlayModel::to_json`], keeping the
    /// placement defaults of `config`
    pub fn from_json(json: &str, config: &EditorConfig) -> Result<Self, serde_json::Error> {
        let restored: Self = serde_json::from_str(json)?;
        let max_id = restored.objects.iter().map(|o| o.id).max().unwrap_or(0);
        Ok(Self {
            next_id: restored.next_id.max(max_id + 1),
            objects: restored.objects,
            defaults: config.overlay.clone(),
            text: config.text.clone(),
        })
    }

    fn allocate_id(&mut self) -> OverlayId {
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn default_rect(&self, kind: OverlayKind, viewport: &PageViewport) -> ScreenRect {
        let d = &self.defaults;
        let sized = |[w, h]: [f64; 2]| ScreenRect::new(d.offset, d.offset, w, h);
        match kind {
            OverlayKind::Text => sized(d.text_box),
            OverlayKind::Image => sized(d.image_box),
            OverlayKind::Signature => sized(d.signature_box),
            OverlayKind::Whiteout => sized(d.whiteout_box),
            OverlayKind::Crop => {
                let w = viewport.pixel_width * d.crop_fraction;
                let h = viewport.pixel_height * d.crop_fraction;
                ScreenRect::new(
                    (viewport.pixel_width - w) / 2.0,
                    (viewport.pixel_height - h) / 2.0,
                    w,
                    h,
                )
            }
        }
    }
}

pub(crate) fn check_placement(page: u32, viewport: &PageViewport, rect: &ScreenRect) -> Result<(), EditorError> {
    if !viewport.is_measured() {
        return Err(RenderError::NotMeasured.into());
    }
    if viewport.page != page {
        return Err(EditorError::Operation(format!(
            "viewport of page {} used to place an object on page {}",
            viewport.page, page
        )));
    }
    if !rect.is_finite() || rect.width < 0.0 || rect.height < 0.0 {
        return Err(EditorError::Operation(format!(
            "invalid overlay rectangle {:?}",
            rect
        )));
    }
    Ok(())
}
