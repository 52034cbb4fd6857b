//! Rectangles, rotations and page boxes
//!
//! Two coordinate spaces meet in the editor. Screen space is what the user
//! sees: pixels, origin at the top-left of the rendered (possibly rotated)
//! page. Document space is the PDF user space of the unrotated page: points,
//! origin at the bottom-left.

use serde::{Deserialize, Serialize};

/// Rectangle in viewport pixels, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Compare with a tolerance relative to the magnitude of each component
    pub fn approx_eq(&self, other: &ScreenRect, rel_tol: f64) -> bool {
        approx(self.x, other.x, rel_tol)
            && approx(self.y, other.y, rel_tol)
            && approx(self.width, other.width, rel_tol)
            && approx(self.height, other.height, rel_tol)
    }
}

/// Rectangle in document points, origin bottom-left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DocRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from two opposite corners in any order
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    /// Corners as a PDF box array `[llx, lly, urx, ury]`
    pub fn corners(&self) -> [f64; 4] {
        [self.x, self.y, self.right(), self.top()]
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn intersect(&self, other: &DocRect) -> Option<DocRect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.top().min(other.top());
        if x2 > x1 && y2 > y1 {
            Some(DocRect::from_corners(x1, y1, x2, y2))
        } else {
            None
        }
    }

    pub fn approx_eq(&self, other: &DocRect, rel_tol: f64) -> bool {
        approx(self.x, other.x, rel_tol)
            && approx(self.y, other.y, rel_tol)
            && approx(self.width, other.width, rel_tol)
            && approx(self.height, other.height, rel_tol)
    }
}

fn approx(a: f64, b: f64, rel_tol: f64) -> bool {
    (a - b).abs() <= rel_tol * a.abs().max(b.abs()).max(1.0)
}

/// Clockwise page rotation applied when the page is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalize a multiple of 90, negative or past a full turn. Any other
    /// angle is not a page rotation and gives `None`.
    pub fn from_degrees(degrees: i64) -> Option<Rotation> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(match (degrees / 90).rem_euclid(4) {
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            3 => Rotation::Deg270,
            _ => Rotation::Deg0,
        })
    }

    pub fn degrees(self) -> i64 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// True when width and height swap on screen
    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// `None` unless `delta` is a multiple of 90
    pub fn rotate_by(self, delta: i64) -> Option<Rotation> {
        Rotation::from_degrees(self.degrees() + delta)
    }
}

impl TryFrom<i64> for Rotation {
    type Error = String;

    fn try_from(degrees: i64) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
            .ok_or_else(|| format!("rotation must be a multiple of 90, got {}", degrees))
    }
}

impl From<Rotation> for i64 {
    fn from(rotation: Rotation) -> i64 {
        rotation.degrees()
    }
}

/// Physical description of one page, read from the document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Page number (1-indexed)
    pub page: u32,
    pub media_box: DocRect,
    /// Visible region: the crop box clipped to the media box
    pub view_box: DocRect,
    pub rotation: Rotation,
}

impl PageGeometry {
    /// Width and height as displayed, after rotation
    pub fn rotated_size(&self) -> (f64, f64) {
        if self.rotation.is_quarter_turn() {
            (self.view_box.height, self.view_box.width)
        } else {
            (self.view_box.width, self.view_box.height)
        }
    }
}
