//! Editor configuration
//!
//! Every tunable constant the editor uses (watermark grid spacing, default
//! overlay boxes, line height, page number margin, surface limits) lives here
//! and can be overridden from a TOML file. Missing sections and keys fall back
//! to the built-in defaults.

use crate::error::EditorError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EditorConfig {
    #[serde(default)]
    pub watermark: WatermarkConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub text: TextConfig,
    #[serde(default)]
    pub page_numbers: PageNumberConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl EditorConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Config`] if the file cannot be read, the TOML is
    /// malformed, or a value is out of range.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EditorError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EditorError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// ```
    /// use docedit_core::EditorConfig;
    ///
    /// let config = EditorConfig::from_toml("[watermark]\ngrid_step = 100.0\n").unwrap();
    /// assert_eq!(config.watermark.grid_step, 100.0);
    /// assert_eq!(config.text.line_height_factor, 1.2);
    /// ```
    pub fn from_toml(s: &str) -> Result<Self, EditorError> {
        let config: Self = toml::from_str(s).map_err(|e| EditorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EditorError> {
        if !(self.watermark.grid_step.is_finite() && self.watermark.grid_step > 0.0) {
            return Err(EditorError::Config(
                "watermark.grid_step must be a positive number".to_string(),
            ));
        }
        if !(self.text.line_height_factor.is_finite() && self.text.line_height_factor > 0.0) {
            return Err(EditorError::Config(
                "text.line_height_factor must be a positive number".to_string(),
            ));
        }
        if !(self.text.line_gap.is_finite() && self.text.line_gap >= 0.0) {
            return Err(EditorError::Config(
                "text.line_gap must be a non-negative number".to_string(),
            ));
        }
        let fraction = self.overlay.crop_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(EditorError::Config(
                "overlay.crop_fraction must be in (0, 1]".to_string(),
            ));
        }
        if self.render.max_surface_pixels == 0 {
            return Err(EditorError::Config(
                "render.max_surface_pixels must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Watermark layout constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkConfig {
    /// Distance between tiled anchors in page points (default: 150)
    #[serde(default = "default_grid_step")]
    pub grid_step: f64,
    /// Font size multiplier for the single centered layout (default: 2.0)
    #[serde(default = "default_single_font_multiplier")]
    pub single_font_multiplier: f64,
    /// Counter-clockwise rotation of every instance, in degrees (default: 45)
    #[serde(default = "default_angle_degrees")]
    pub angle_degrees: f64,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            grid_step: default_grid_step(),
            single_font_multiplier: default_single_font_multiplier(),
            angle_degrees: default_angle_degrees(),
        }
    }
}

fn default_grid_step() -> f64 {
    150.0
}

fn default_single_font_multiplier() -> f64 {
    2.0
}

fn default_angle_degrees() -> f64 {
    45.0
}

/// Default placement of freshly added overlay objects, in viewport pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "default_offset")]
    pub offset: f64,
    #[serde(default = "default_text_box")]
    pub text_box: [f64; 2],
    #[serde(default = "default_image_box")]
    pub image_box: [f64; 2],
    #[serde(default = "default_signature_box")]
    pub signature_box: [f64; 2],
    #[serde(default = "default_whiteout_box")]
    pub whiteout_box: [f64; 2],
    /// Fraction of the preview covered by a new crop rectangle (default: 0.9)
    #[serde(default = "default_crop_fraction")]
    pub crop_fraction: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            offset: default_offset(),
            text_box: default_text_box(),
            image_box: default_image_box(),
            signature_box: default_signature_box(),
            whiteout_box: default_whiteout_box(),
            crop_fraction: default_crop_fraction(),
        }
    }
}

fn default_offset() -> f64 {
    50.0
}

fn default_text_box() -> [f64; 2] {
    [200.0, 50.0]
}

fn default_image_box() -> [f64; 2] {
    [150.0, 150.0]
}

fn default_signature_box() -> [f64; 2] {
    [150.0, 75.0]
}

fn default_whiteout_box() -> [f64; 2] {
    [150.0, 40.0]
}

fn default_crop_fraction() -> f64 {
    0.9
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextConfig {
    /// Line advance as a multiple of the font size (default: 1.2)
    #[serde(default = "default_line_height_factor")]
    pub line_height_factor: f64,
    /// Extra leading added to every line, in pixels (default: 0).
    /// `line_height_factor = 1.0` with `line_gap = 2.0` spaces lines at
    /// font size plus two pixels.
    #[serde(default)]
    pub line_gap: f64,
    /// Font size used for the text half of an erase pair, in pixels (default: 14)
    #[serde(default = "default_erase_font_size")]
    pub erase_font_size: f64,
    /// Placeholder text of a new erase pair
    #[serde(default = "default_erase_placeholder")]
    pub erase_placeholder: String,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            line_height_factor: default_line_height_factor(),
            line_gap: 0.0,
            erase_font_size: default_erase_font_size(),
            erase_placeholder: default_erase_placeholder(),
        }
    }
}

impl TextConfig {
    /// Distance between baselines for a font size, both in pixels
    pub fn line_advance(&self, font_size: f64) -> f64 {
        font_size * self.line_height_factor + self.line_gap
    }
}

fn default_line_height_factor() -> f64 {
    1.2
}

fn default_erase_font_size() -> f64 {
    14.0
}

fn default_erase_placeholder() -> String {
    "Type here...".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageNumberConfig {
    /// Distance from the page edge in points (default: 20)
    #[serde(default = "default_margin")]
    pub margin: f64,
}

impl Default for PageNumberConfig {
    fn default() -> Self {
        Self {
            margin: default_margin(),
        }
    }
}

fn default_margin() -> f64 {
    20.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Largest surface the rasterizer will allocate (default: 40 million pixels)
    #[serde(default = "default_max_surface_pixels")]
    pub max_surface_pixels: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_surface_pixels: default_max_surface_pixels(),
        }
    }
}

fn default_max_surface_pixels() -> u64 {
    40_000_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = EditorConfig::from_toml("").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.watermark.grid_step, 150.0);
        assert_eq!(config.overlay.text_box, [200.0, 50.0]);
        assert_eq!(config.page_numbers.margin, 20.0);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml = r#"
            [overlay]
            offset = 10.0
            signature_box = [300.0, 100.0]

            [render]
            max_surface_pixels = 1000
        "#;
        let config = EditorConfig::from_toml(toml).unwrap();
        assert_eq!(config.overlay.offset, 10.0);
        assert_eq!(config.overlay.signature_box, [300.0, 100.0]);
        assert_eq!(config.overlay.image_box, [150.0, 150.0]);
        assert_eq!(config.render.max_surface_pixels, 1000);
        assert_eq!(config.watermark, WatermarkConfig::default());
    }

    #[test]
    fn test_line_advance() {
        assert!((TextConfig::default().line_advance(16.0) - 19.2).abs() < 1e-9);

        let config = EditorConfig::from_toml("[text]\nline_height_factor = 1.0\nline_gap = 2.0\n").unwrap();
        assert_eq!(config.text.line_advance(16.0), 18.0);
        assert!(EditorConfig::from_toml("[text]\nline_gap = -1.0\n").is_err());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = EditorConfig::from_toml("[watermark]\ngrid_step = 0.0\n").unwrap_err();
        assert!(matches!(err, EditorError::Config(_)));

        let err = EditorConfig::from_toml("[overlay]\ncrop_fraction = 1.5\n").unwrap_err();
        assert!(matches!(err, EditorError::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = EditorConfig::from_toml("[watermark\n").unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }
}
