//! Page number placement
//!
//! Labels are positioned in page points of the visual frame (origin at the
//! visual bottom-left, y up), with one margin shared by the preview and the
//! saved output.

use crate::config::PageNumberConfig;
use crate::document::DocumentHandle;
use crate::metrics::metrics_for;
use crate::style::{parse_hex_color, standard_font};
use crate::viewport::PageViewport;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageNumberPosition {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    #[default]
    BottomCenter,
    BottomRight,
}

impl PageNumberPosition {
    fn is_top(self) -> bool {
        matches!(
            self,
            PageNumberPosition::TopLeft | PageNumberPosition::TopCenter | PageNumberPosition::TopRight
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageNumberSpec {
    pub position: PageNumberPosition,
    /// Label of the first page
    pub start_number: u32,
    /// Font size in points
    pub font_size: f64,
    pub font_family: String,
    pub color: String,
}

impl Default for PageNumberSpec {
    fn default() -> Self {
        Self {
            position: PageNumberPosition::BottomCenter,
            start_number: 1,
            font_size: 12.0,
            font_family: "Helvetica".to_string(),
            color: "#000000".to_string(),
        }
    }
}

impl PageNumberSpec {
    pub fn base_font(&self) -> &'static str {
        standard_font(&self.font_family, false, false)
    }

    pub fn rgb(&self) -> (f64, f64, f64) {
        parse_hex_color(&self.color)
    }

    pub fn label(&self, page: u32) -> String {
        (u64::from(self.start_number) + u64::from(page.saturating_sub(1))).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageNumberPlacement {
    pub page: u32,
    pub text: String,
    /// Baseline origin in page points
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub width: f64,
    ascent: f64,
    page_height: f64,
}

/// Label box in viewport pixels, origin at the top-left of the preview
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageNumberPreview {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
}

pub fn place(
    spec: &PageNumberSpec,
    page: u32,
    page_width: f64,
    page_height: f64,
    config: &PageNumberConfig,
) -> PageNumberPlacement {
    let text = spec.label(page);
    let metrics = metrics_for(spec.base_font());
    let width = metrics.text_width(&text, spec.font_size);
    let ascent = metrics.ascent_at(spec.font_size);
    let margin = config.margin;

    let x = match spec.position {
        PageNumberPosition::TopLeft | PageNumberPosition::BottomLeft => margin,
        PageNumberPosition::TopCenter | PageNumberPosition::BottomCenter => (page_width - width) / 2.0,
        PageNumberPosition::TopRight | PageNumberPosition::BottomRight => page_width - margin - width,
    };
    let y = if spec.position.is_top() {
        page_height - margin - ascent
    } else {
        margin
    };

    PageNumberPlacement {
        page,
        text,
        x,
        y,
        font_size: spec.font_size,
        width,
        ascent,
        page_height,
    }
}

/// Placement for every page, using each page's size as displayed
pub fn place_all(spec: &PageNumberSpec, handle: &DocumentHandle, config: &PageNumberConfig) -> Vec<PageNumberPlacement> {
    handle
        .pages()
        .map(|geometry| {
            let (width, height) = geometry.rotated_size();
            place(spec, geometry.page, width, height, config)
        })
        .collect()
}

impl PageNumberPlacement {
    /// Screen point of the baseline origin
    pub(crate) fn screen_origin(&self, viewport: &PageViewport) -> (f64, f64) {
        (self.x * viewport.scale, (self.page_height - self.y) * viewport.scale)
    }

    pub fn preview(&self, viewport: &PageViewport) -> PageNumberPreview {
        PageNumberPreview {
            text: self.text.clone(),
            x: self.x * viewport.scale,
            y: (self.page_height - self.y - self.ascent) * viewport.scale,
            font_size: self.font_size * viewport.scale,
        }
    }
}
