//! Watermark layout planning
//!
//! Anchors are computed once in page points, in the page's visual frame
//! (origin at the visual bottom-left, y up). The preview and the saved file
//! both derive their positions from the same plan, so the two cannot drift.

use crate::config::WatermarkConfig;
use crate::metrics::metrics_for;
use crate::style::{parse_hex_color, standard_font};
use crate::viewport::PageViewport;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkLayout {
    #[default]
    Single,
    Tiled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkSpec {
    pub text: String,
    /// Tiled font size in points. The single layout enlarges it.
    pub font_size: f64,
    pub opacity: f64,
    pub font_family: String,
    pub layout: WatermarkLayout,
    pub color: String,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: "Confidential".to_string(),
            font_size: 50.0,
            opacity: 0.5,
            font_family: "Helvetica".to_string(),
            layout: WatermarkLayout::Single,
            color: "#000000".to_string(),
        }
    }
}

impl WatermarkSpec {
    pub fn base_font(&self) -> &'static str {
        standard_font(&self.font_family, false, false)
    }

    pub fn rgb(&self) -> (f64, f64, f64) {
        parse_hex_color(&self.color)
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Center of one watermark instance, in page points of the visual frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WatermarkAnchor {
    pub x: f64,
    pub y: f64,
}

/// Where a preview draws one instance, in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreviewAnchor {
    /// Center of the instance, origin at the top-left of the preview
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    /// Clockwise, as CSS `rotate()` expects
    pub css_rotation_degrees: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatermarkPlan {
    pub page_width: f64,
    pub page_height: f64,
    /// Effective font size in points
    pub font_size: f64,
    /// Counter-clockwise rotation of every instance
    pub angle_degrees: f64,
    pub text_width: f64,
    /// Offset from an anchor to the text origin, in the rotated text frame
    pub text_offset: (f64, f64),
    pub anchors: Vec<WatermarkAnchor>,
}

/// Lay out a watermark on a page of the given visual size in points.
pub fn plan(page_width: f64, page_height: f64, spec: &WatermarkSpec, config: &WatermarkConfig) -> WatermarkPlan {
    let font_size = match spec.layout {
        WatermarkLayout::Single => spec.font_size * config.single_font_multiplier,
        WatermarkLayout::Tiled => spec.font_size,
    };
    let metrics = metrics_for(spec.base_font());
    let text_width = metrics.text_width(&spec.text, font_size);
    let vertical_center = (metrics.ascent_at(font_size) + metrics.descent_at(font_size)) / 2.0;

    let anchors = match spec.layout {
        WatermarkLayout::Single => vec![WatermarkAnchor {
            x: page_width / 2.0,
            y: page_height / 2.0,
        }],
        WatermarkLayout::Tiled => tile_anchors(page_width, page_height, config.grid_step),
    };

    WatermarkPlan {
        page_width,
        page_height,
        font_size,
        angle_degrees: config.angle_degrees,
        text_width,
        text_offset: (-text_width / 2.0, -vertical_center),
        anchors,
    }
}

/// Grid anchors from half a step onwards. Each axis runs one step past its
/// page edge so the rotated pattern still reaches every corner.
fn tile_anchors(page_width: f64, page_height: f64, step: f64) -> Vec<WatermarkAnchor> {
    if !(step > 0.0) {
        return Vec::new();
    }
    let xs = axis_coords(page_width + step, step);
    let ys = axis_coords(page_height + step, step);
    let mut anchors = Vec::with_capacity(xs.len() * ys.len());
    for &x in &xs {
        for &y in &ys {
            anchors.push(WatermarkAnchor { x, y });
        }
    }
    anchors
}

/// `step/2, 3*step/2, ...` strictly below `limit`
fn axis_coords(limit: f64, step: f64) -> Vec<f64> {
    let mut coords = Vec::new();
    let mut c = step / 2.0;
    while c < limit {
        coords.push(c);
        c += step;
    }
    coords
}

impl WatermarkPlan {
    /// Screen point of an anchor, origin at the top-left of the preview
    fn screen_point(&self, anchor: &WatermarkAnchor, viewport: &PageViewport) -> (f64, f64) {
        (anchor.x * viewport.scale, (self.page_height - anchor.y) * viewport.scale)
    }

    pub fn preview(&self, viewport: &PageViewport) -> Vec<PreviewAnchor> {
        self.anchors
            .iter()
            .map(|anchor| {
                let (x, y) = self.screen_point(anchor, viewport);
                PreviewAnchor {
                    x,
                    y,
                    font_size: self.font_size * viewport.scale,
                    css_rotation_degrees: -self.angle_degrees,
                }
            })
            .collect()
    }

    /// Anchor positions in document space
    pub fn document_anchors(&self, viewport: &PageViewport) -> Vec<(f64, f64)> {
        self.anchors
            .iter()
            .map(|anchor| {
                let (sx, sy) = self.screen_point(anchor, viewport);
                viewport.screen_point_to_doc(sx, sy)
            })
            .collect()
    }

    /// Transforms taking the text frame of each instance to document space
    pub(crate) fn instance_frames(&self, viewport: &PageViewport) -> Vec<([f64; 6], [f64; 6])> {
        let radians = self.angle_degrees.to_radians();
        let (sin, cos) = radians.sin_cos();
        let rotation = [cos, sin, -sin, cos, 0.0, 0.0];
        self.anchors
            .iter()
            .map(|anchor| {
                let (sx, sy) = self.screen_point(anchor, viewport);
                (viewport.frame_at(sx, sy), rotation)
            })
            .collect()
    }
}
