//! Text style and standard font selection
//!
//! Overlay text is always set in one of the PDF standard 14 fonts so the
//! saved file never needs embedded font programs. Family names coming from a
//! UI font picker ("Arial", "Times New Roman", "monospace") are mapped onto
//! the closest standard family.

use serde::{Deserialize, Serialize};

/// Style carried by a text overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Font size in viewport pixels, as the user sees it
    pub font_size: f64,
    /// `#rrggbb`
    pub color: String,
    /// Family picked in the UI. A name that already names a face
    /// ("Times-BoldItalic", "Arial-BoldMT") keeps its weight and slant.
    pub font_family: String,
    pub bold: bool,
    pub italic: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            color: "#000000".to_string(),
            font_family: "Helvetica".to_string(),
            bold: false,
            italic: false,
        }
    }
}

impl TextStyle {
    /// Standard 14 font used on output
    pub fn base_font(&self) -> &'static str {
        standard_font(&self.font_family, self.bold, self.italic)
    }

    pub fn rgb(&self) -> (f64, f64, f64) {
        parse_hex_color(&self.color)
    }
}

/// The five standard 14 families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFamily {
    Helvetica,
    Times,
    Courier,
    Symbol,
    ZapfDingbats,
}

impl StandardFamily {
    /// Closest standard family for a CSS generic or a concrete family name
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        match lower.as_str() {
            "serif" => return Self::Times,
            "monospace" => return Self::Courier,
            "sans-serif" | "cursive" | "fantasy" | "system-ui" => return Self::Helvetica,
            _ => {}
        }
        let any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
        if any(&["times", "georgia", "garamond", "serif"]) && !lower.contains("sans") {
            Self::Times
        } else if any(&["courier", "mono", "consolas", "monaco"]) {
            Self::Courier
        } else if lower.contains("symbol") {
            Self::Symbol
        } else if any(&["zapf", "dingbat"]) {
            Self::ZapfDingbats
        } else {
            Self::Helvetica
        }
    }

    /// Face name for a weight and slant. Symbol and ZapfDingbats have a
    /// single face.
    pub fn face(self, bold: bool, italic: bool) -> &'static str {
        let faces: [&'static str; 4] = match self {
            Self::Helvetica => ["Helvetica", "Helvetica-Oblique", "Helvetica-Bold", "Helvetica-BoldOblique"],
            Self::Times => ["Times-Roman", "Times-Italic", "Times-Bold", "Times-BoldItalic"],
            Self::Courier => ["Courier", "Courier-Oblique", "Courier-Bold", "Courier-BoldOblique"],
            Self::Symbol => return "Symbol",
            Self::ZapfDingbats => return "ZapfDingbats",
        };
        faces[usize::from(bold) * 2 + usize::from(italic)]
    }
}

/// Standard 14 font for a family name plus weight and slant flags. Weight
/// and slant spelled in the name itself count as well.
pub fn standard_font(family: &str, bold: bool, italic: bool) -> &'static str {
    let lower = family.to_lowercase();
    let bold = bold || lower.contains("bold");
    let italic = italic || lower.contains("italic") || lower.contains("oblique");
    StandardFamily::from_name(family).face(bold, italic)
}

/// Parse `#RRGGBB`, `RRGGBB` or `#RGB` into 0..1 components. Anything else is black.
pub fn parse_hex_color(color: &str) -> (f64, f64, f64) {
    let hex = color.trim().trim_start_matches('#');
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        _ => hex.to_string(),
    };
    if expanded.len() != 6 || !expanded.is_ascii() {
        return (0.0, 0.0, 0.0);
    }
    let Ok(value) = u32::from_str_radix(&expanded, 16) else {
        return (0.0, 0.0, 0.0);
    };
    let channel = |shift: u32| ((value >> shift) & 0xFF) as f64 / 255.0;
    (channel(16), channel(8), channel(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_family_from_css_generics() {
        assert_eq!(StandardFamily::from_name("serif"), StandardFamily::Times);
        assert_eq!(StandardFamily::from_name("sans-serif"), StandardFamily::Helvetica);
        assert_eq!(StandardFamily::from_name("monospace"), StandardFamily::Courier);
        assert_eq!(StandardFamily::from_name("cursive"), StandardFamily::Helvetica);
    }

    #[test]
    fn test_family_from_concrete_names() {
        assert_eq!(StandardFamily::from_name("Times New Roman"), StandardFamily::Times);
        assert_eq!(StandardFamily::from_name("Georgia"), StandardFamily::Times);
        assert_eq!(StandardFamily::from_name("Noto Sans"), StandardFamily::Helvetica);
        assert_eq!(StandardFamily::from_name("Courier New"), StandardFamily::Courier);
        assert_eq!(StandardFamily::from_name("JetBrains Mono"), StandardFamily::Courier);
        assert_eq!(StandardFamily::from_name("Arial"), StandardFamily::Helvetica);
        assert_eq!(StandardFamily::from_name("ZapfDingbats"), StandardFamily::ZapfDingbats);
    }

    #[test]
    fn test_standard_font_combines_flags_and_name() {
        assert_eq!(standard_font("Helvetica", false, false), "Helvetica");
        assert_eq!(standard_font("Arial", true, false), "Helvetica-Bold");
        assert_eq!(standard_font("serif", true, true), "Times-BoldItalic");
        assert_eq!(standard_font("Courier", false, true), "Courier-Oblique");
        assert_eq!(standard_font("Times-BoldItalic", false, false), "Times-BoldItalic");
        assert_eq!(standard_font("Arial-BoldMT", false, true), "Helvetica-BoldOblique");
        assert_eq!(standard_font("Symbol", true, true), "Symbol");
    }

    #[test]
    fn test_style_json_fills_defaults() {
        let style: TextStyle = serde_json::from_str(r##"{"font_size": 24, "bold": true}"##).unwrap();
        assert_eq!(style.font_size, 24.0);
        assert_eq!(style.color, "#000000");
        assert_eq!(style.base_font(), "Helvetica-Bold");
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FFFFFF"), (1.0, 1.0, 1.0));
        assert_eq!(parse_hex_color("FF0000"), (1.0, 0.0, 0.0));
        assert_eq!(parse_hex_color("#0f0"), (0.0, 1.0, 0.0));
        assert_eq!(parse_hex_color("nonsense"), (0.0, 0.0, 0.0));
        assert_eq!(parse_hex_color("#GG0000"), (0.0, 0.0, 0.0));
    }
}
