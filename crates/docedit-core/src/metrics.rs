//! Glyph metrics for the standard fonts
//!
//! Advance widths come from the Adobe core font AFM files, in 1/1000 em.
//! Bold and oblique variants reuse the regular widths of their family; the
//! difference is a few percent and only affects wrapping and centering.

use std::mem;

pub struct FontMetrics {
    /// Ascender in 1/1000 em
    pub ascent: f64,
    /// Descender in 1/1000 em (negative)
    pub descent: f64,
    widths: Option<&'static [u16; 95]>,
    fallback_width: u16,
}

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
const TIMES_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    278, 278, 564, 564, 564, 444, 921,
    722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889,
    722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611,
    333, 278, 333, 469, 500, 333,
    444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778,
    500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444,
    480, 200, 480, 541,
];

static HELVETICA: FontMetrics = FontMetrics {
    ascent: 718.0,
    descent: -207.0,
    widths: Some(&HELVETICA_WIDTHS),
    fallback_width: 556,
};

static TIMES: FontMetrics = FontMetrics {
    ascent: 683.0,
    descent: -217.0,
    widths: Some(&TIMES_WIDTHS),
    fallback_width: 500,
};

static COURIER: FontMetrics = FontMetrics {
    ascent: 629.0,
    descent: -157.0,
    widths: None,
    fallback_width: 600,
};

pub fn metrics_for(base_font: &str) -> &'static FontMetrics {
    if base_font.starts_with("Times") {
        &TIMES
    } else if base_font.starts_with("Courier") {
        &COURIER
    } else {
        &HELVETICA
    }
}

impl FontMetrics {
    /// Advance width of one character in 1/1000 em
    pub fn char_width(&self, c: char) -> f64 {
        let code = c as u32;
        let width = match self.widths {
            Some(table) if (32..=126).contains(&code) => table[(code - 32) as usize],
            _ => self.fallback_width,
        };
        width as f64
    }

    pub fn text_width(&self, text: &str, font_size: f64) -> f64 {
        text.chars().map(|c| self.char_width(c)).sum::<f64>() * font_size / 1000.0
    }

    pub fn ascent_at(&self, font_size: f64) -> f64 {
        self.ascent * font_size / 1000.0
    }

    pub fn descent_at(&self, font_size: f64) -> f64 {
        self.descent * font_size / 1000.0
    }
}

/// Greedy word wrap. Explicit newlines always break; words wider than the
/// line are split between characters. A non-positive width disables wrapping.
pub fn wrap_text(text: &str, metrics: &FontMetrics, font_size: f64, max_width: f64) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        if !(max_width > 0.0) {
            lines.push(paragraph.to_string());
            continue;
        }

        let fits = |s: &str| metrics.text_width(s, font_size) <= max_width;
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if fits(&candidate) {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(mem::take(&mut current));
            }
            if fits(word) {
                current = word.to_string();
                continue;
            }
            for c in word.chars() {
                let mut next = current.clone();
                next.push(c);
                if !current.is_empty() && !fits(&next) {
                    lines.push(mem::replace(&mut current, c.to_string()));
                } else {
                    current = next;
                }
            }
        }
        lines.push(current);
    }
    lines
}

/// Encode text for a simple font with WinAnsiEncoding. Characters outside
/// the encoding become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => match c {
                '\u{20AC}' => 0x80,
                '\u{201A}' => 0x82,
                '\u{2026}' => 0x85,
                '\u{2018}' => 0x91,
                '\u{2019}' => 0x92,
                '\u{201C}' => 0x93,
                '\u{201D}' => 0x94,
                '\u{2022}' => 0x95,
                '\u{2013}' => 0x96,
                '\u{2014}' => 0x97,
                '\u{2122}' => 0x99,
                '\t' => b' ',
                _ => b'?',
            },
        })
        .collect()
}
