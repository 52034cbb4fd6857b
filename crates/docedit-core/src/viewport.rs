//! Viewport measurement and screen <-> document coordinate mapping
//!
//! A [`PageViewport`] is a snapshot of how one page was laid out on screen:
//! which part of the page is visible, its rotation and the pixels-per-point
//! scale. Every conversion between overlay boxes and document rectangles goes
//! through the snapshot taken when the overlay was placed.

use crate::geometry::{DocRect, PageGeometry, Rotation, ScreenRect};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageViewport {
    /// Page number (1-indexed)
    pub page: u32,
    /// Pixels per document point
    pub scale: f64,
    pub rotation: Rotation,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub view_box: DocRect,
}

/// Upright drawing frame for content placed on a possibly rotated page.
///
/// `matrix` maps local coordinates (points, origin at the visual bottom-left of
/// the box, y pointing visually up) to document space. `width` and `height`
/// are the box size in points along the local axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementFrame {
    pub doc_rect: DocRect,
    pub width: f64,
    pub height: f64,
    pub matrix: [f64; 6],
}

impl PageViewport {
    /// Measure a page laid out into `pixel_width` pixels.
    ///
    /// Returns `None` while the container has no usable width (hidden, not yet
    /// laid out). Callers defer conversion until a measurement succeeds.
    pub fn measure(geometry: &PageGeometry, pixel_width: f64) -> Option<Self> {
        if !(pixel_width.is_finite() && pixel_width > 0.0) {
            return None;
        }
        let (width, _) = geometry.rotated_size();
        if !(width.is_finite() && width > 0.0) {
            return None;
        }
        Self::at_scale(geometry, pixel_width / width)
    }

    pub fn at_scale(geometry: &PageGeometry, scale: f64) -> Option<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return None;
        }
        let (width, height) = geometry.rotated_size();
        if !(width > 0.0 && height > 0.0) {
            return None;
        }
        Some(Self {
            page: geometry.page,
            scale,
            rotation: geometry.rotation,
            pixel_width: width * scale,
            pixel_height: height * scale,
            view_box: geometry.view_box,
        })
    }

    /// A snapshot can arrive from outside (JSON jobs), so re-check before use
    pub fn is_measured(&self) -> bool {
        self.scale.is_finite()
            && self.scale > 0.0
            && self.view_box.width > 0.0
            && self.view_box.height > 0.0
    }

    pub fn to_doc(&self, rect: &ScreenRect) -> Option<DocRect> {
        if !self.is_measured() || !rect.is_finite() {
            return None;
        }
        let (x1, y1) = self.screen_point_to_doc(rect.x, rect.y);
        let (x2, y2) = self.screen_point_to_doc(rect.right(), rect.bottom());
        Some(DocRect::from_corners(x1, y1, x2, y2))
    }

    pub fn to_screen(&self, rect: &DocRect) -> Option<ScreenRect> {
        if !self.is_measured() {
            return None;
        }
        let (x1, y1) = self.doc_point_to_screen(rect.x, rect.y);
        let (x2, y2) = self.doc_point_to_screen(rect.right(), rect.top());
        Some(ScreenRect::new(
            x1.min(x2),
            y1.min(y2),
            (x2 - x1).abs(),
            (y2 - y1).abs(),
        ))
    }

    pub fn screen_point_to_doc(&self, sx: f64, sy: f64) -> (f64, f64) {
        let u = sx / self.scale;
        let v = sy / self.scale;
        let b = &self.view_box;
        match self.rotation {
            Rotation::Deg0 => (b.x + u, b.top() - v),
            Rotation::Deg90 => (b.x + v, b.y + u),
            Rotation::Deg180 => (b.right() - u, b.y + v),
            Rotation::Deg270 => (b.right() - v, b.top() - u),
        }
    }

    pub fn doc_point_to_screen(&self, px: f64, py: f64) -> (f64, f64) {
        let b = &self.view_box;
        let (u, v) = match self.rotation {
            Rotation::Deg0 => (px - b.x, b.top() - py),
            Rotation::Deg90 => (py - b.y, px - b.x),
            Rotation::Deg180 => (b.right() - px, py - b.y),
            Rotation::Deg270 => (b.top() - py, b.right() - px),
        };
        (u * self.scale, v * self.scale)
    }

    /// Frame whose origin sits at screen point `(sx, sy)` and whose axes
    /// follow the visual right and up directions, one unit per point.
    pub fn frame_at(&self, sx: f64, sy: f64) -> [f64; 6] {
        let (ox, oy) = self.screen_point_to_doc(sx, sy);
        let (right, up) = match self.rotation {
            Rotation::Deg0 => ((1.0, 0.0), (0.0, 1.0)),
            Rotation::Deg90 => ((0.0, 1.0), (-1.0, 0.0)),
            Rotation::Deg180 => ((-1.0, 0.0), (0.0, -1.0)),
            Rotation::Deg270 => ((0.0, -1.0), (1.0, 0.0)),
        };
        [right.0, right.1, up.0, up.1, ox, oy]
    }

    pub fn placement(&self, rect: &ScreenRect) -> Option<PlacementFrame> {
        let doc_rect = self.to_doc(rect)?;
        Some(PlacementFrame {
            doc_rect,
            width: rect.width / self.scale,
            height: rect.height / self.scale,
            matrix: self.frame_at(rect.x, rect.bottom()),
        })
    }
}
