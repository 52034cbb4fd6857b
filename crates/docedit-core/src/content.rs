//! Page content writer
//!
//! A [`PageCanvas`] collects drawing operators and resource references for
//! one page, then appends them in a single stream. The existing content is
//! wrapped in `q ... Q` so any graphics state it leaves behind (a transform,
//! a clip) cannot leak into the appended drawing.

use crate::document::{inherited, real};
use crate::error::EditorError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat, Stream};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Font,
    XObject,
    ExtGState,
}

impl Category {
    const ALL: [Category; 3] = [Category::Font, Category::XObject, Category::ExtGState];

    fn key(self) -> &'static [u8] {
        match self {
            Category::Font => b"Font",
            Category::XObject => b"XObject",
            Category::ExtGState => b"ExtGState",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Category::Font => "DxF",
            Category::XObject => "DxIm",
            Category::ExtGState => "DxGS",
        }
    }
}

pub(crate) struct PageCanvas {
    page_id: ObjectId,
    operations: Vec<Operation>,
    resources: Vec<(Category, String, ObjectId)>,
    fonts: HashMap<&'static str, String>,
    states: HashMap<u32, String>,
    taken: BTreeSet<String>,
}

impl PageCanvas {
    pub fn new(doc: &Document, page_id: ObjectId) -> Self {
        let mut taken = BTreeSet::new();
        if let Some(resources) = inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok()) {
            for category in Category::ALL {
                let names = resources
                    .get(category.key())
                    .ok()
                    .map(|obj| crate::document::resolve(doc, obj))
                    .and_then(|obj| obj.as_dict().ok());
                if let Some(names) = names {
                    taken.extend(names.iter().map(|(k, _)| String::from_utf8_lossy(k).into_owned()));
                }
            }
        }
        Self {
            page_id,
            operations: Vec::new(),
            resources: Vec::new(),
            fonts: HashMap::new(),
            states: HashMap::new(),
            taken,
        }
    }

    fn allocate(&mut self, category: Category, target: ObjectId) -> String {
        let mut n = 1;
        let name = loop {
            let candidate = format!("{}{}", category.prefix(), n);
            if self.taken.insert(candidate.clone()) {
                break candidate;
            }
            n += 1;
        };
        self.resources.push((category, name.clone(), target));
        name
    }

    /// Resource name of a standard 14 font, adding the font dictionary on first use
    pub fn font(&mut self, doc: &mut Document, base_font: &'static str) -> String {
        if let Some(name) = self.fonts.get(base_font) {
            return name.clone();
        }
        let mut font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base_font,
        };
        if base_font != "Symbol" && base_font != "ZapfDingbats" {
            font.set("Encoding", "WinAnsiEncoding");
        }
        let font_id = doc.add_object(font);
        let name = self.allocate(Category::Font, font_id);
        self.fonts.insert(base_font, name.clone());
        name
    }

    /// Resource name of a graphics state with the given fill and stroke alpha
    pub fn opacity(&mut self, doc: &mut Document, opacity: f64) -> String {
        let alpha = opacity.clamp(0.0, 1.0);
        let key = (alpha * 1000.0).round() as u32;
        if let Some(name) = self.states.get(&key) {
            return name.clone();
        }
        let state_id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => real(alpha),
            "CA" => real(alpha),
        });
        let name = self.allocate(Category::ExtGState, state_id);
        self.states.insert(key, name.clone());
        name
    }

    pub fn image(&mut self, xobject: ObjectId) -> String {
        self.allocate(Category::XObject, xobject)
    }

    pub fn save_state(&mut self) {
        self.push("q", vec![]);
    }

    pub fn restore_state(&mut self) {
        self.push("Q", vec![]);
    }

    pub fn concat(&mut self, matrix: [f64; 6]) {
        self.push("cm", matrix.iter().map(|v| real(*v)).collect());
    }

    pub fn set_graphics_state(&mut self, name: &str) {
        self.push("gs", vec![Object::Name(name.as_bytes().to_vec())]);
    }

    pub fn set_fill_rgb(&mut self, (r, g, b): (f64, f64, f64)) {
        self.push("rg", vec![real(r), real(g), real(b)]);
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.push("re", vec![real(x), real(y), real(width), real(height)]);
        self.push("f", vec![]);
    }

    /// One line of text with its baseline origin at `(x, y)`
    pub fn show_text(&mut self, font: &str, size: f64, x: f64, y: f64, encoded: Vec<u8>) {
        self.push("BT", vec![]);
        self.push("Tf", vec![Object::Name(font.as_bytes().to_vec()), real(size)]);
        self.push(
            "Tm",
            vec![real(1.0), real(0.0), real(0.0), real(1.0), real(x), real(y)],
        );
        self.push("Tj", vec![Object::String(encoded, StringFormat::Hexadecimal)]);
        self.push("ET", vec![]);
    }

    pub fn draw_xobject(&mut self, name: &str) {
        self.push("Do", vec![Object::Name(name.as_bytes().to_vec())]);
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Write resources and the appended content stream into the page
    pub fn finish(self, doc: &mut Document) -> Result<(), EditorError> {
        if self.operations.is_empty() {
            return Ok(());
        }
        localize_resources(doc, self.page_id)?;

        let page = page_dict_mut(doc, self.page_id)?;
        let resources = page
            .get_mut(b"Resources")
            .and_then(Object::as_dict_mut)
            .map_err(|e| EditorError::Operation(format!("page resources: {}", e)))?;
        for category in Category::ALL {
            let entries: Vec<_> = self
                .resources
                .iter()
                .filter(|(c, _, _)| *c == category)
                .collect();
            if entries.is_empty() {
                continue;
            }
            if !matches!(resources.get(category.key()), Ok(Object::Dictionary(_))) {
                resources.set(category.key().to_vec(), Dictionary::new());
            }
            let names = resources
                .get_mut(category.key())
                .and_then(Object::as_dict_mut)
                .map_err(|e| EditorError::Operation(format!("resource dictionary: {}", e)))?;
            for (_, name, id) in entries {
                names.set(name.as_bytes().to_vec(), Object::Reference(*id));
            }
        }

        let existing = existing_contents(doc, self.page_id);
        let encoded = Content {
            operations: self.operations,
        }
        .encode()
        .map_err(|e| EditorError::Operation(format!("content encoding: {}", e)))?;

        let contents = if existing.is_empty() {
            vec![Object::Reference(
                doc.add_object(Stream::new(Dictionary::new(), encoded)),
            )]
        } else {
            let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            // Existing streams may end without whitespace
            let mut body = b"\nQ\n".to_vec();
            body.extend(encoded);
            let close = doc.add_object(Stream::new(Dictionary::new(), body));
            let mut contents = vec![Object::Reference(open)];
            contents.extend(existing);
            contents.push(Object::Reference(close));
            contents
        };
        page_dict_mut(doc, self.page_id)?.set("Contents", contents);
        Ok(())
    }
}

pub(crate) fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, EditorError> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| EditorError::Operation(format!("page {:?}: {}", page_id, e)))
}

/// Give the page its own Resources dictionary (and own Font/XObject/ExtGState
/// sub-dictionaries) so additions never leak into pages sharing them.
fn localize_resources(doc: &mut Document, page_id: ObjectId) -> Result<(), EditorError> {
    let mut local = inherited(doc, page_id, b"Resources")
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default();
    for category in Category::ALL {
        let id = match local.get(category.key()) {
            Ok(Object::Reference(id)) => *id,
            _ => continue,
        };
        let shared = doc.get_dictionary(id).cloned().unwrap_or_default();
        local.set(category.key().to_vec(), shared);
    }
    page_dict_mut(doc, page_id)?.set("Resources", local);
    Ok(())
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}
