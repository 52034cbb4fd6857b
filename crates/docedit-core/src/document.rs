//! Loaded document handle: page geometry, metadata and serialization

use crate::error::EditorError;
use crate::geometry::{DocRect, PageGeometry, Rotation};
use lopdf::encryption::DecryptionError;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use serde::{Deserialize, Serialize};

/// US Letter, used when a page has no readable MediaBox
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Guard against cyclic /Parent chains
const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Debug, Clone)]
struct PageEntry {
    id: ObjectId,
    geometry: PageGeometry,
}

/// A parsed, decrypted document plus its page table.
///
/// The handle is never mutated by the editor. Saving works on a copy so a
/// failed save leaves the loaded document untouched.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    document: Document,
    pages: Vec<PageEntry>,
}

impl DocumentHandle {
    /// Parse PDF bytes, decrypting with `password` when the file is protected.
    ///
    /// Files protected by an owner password only open without a password.
    pub fn load(bytes: &[u8], password: Option<&str>) -> Result<Self, EditorError> {
        if bytes.is_empty() {
            return Err(EditorError::Load("input is empty".to_string()));
        }

        let mut document = Document::load_mem(bytes).map_err(|e| EditorError::Load(e.to_string()))?;

        if document.is_encrypted() {
            document.decrypt(password.unwrap_or("")).map_err(decryption_error)?;
            document.trailer.remove(b"Encrypt");
        }

        let pages = read_pages(&document);
        if pages.is_empty() {
            return Err(EditorError::Load("document has no pages".to_string()));
        }

        tracing::debug!("Loaded PDF with {} pages", pages.len());
        Ok(Self { document, pages })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn page(&self, page: u32) -> Result<&PageGeometry, EditorError> {
        self.entry(page).map(|entry| &entry.geometry)
    }

    pub fn pages(&self) -> impl Iterator<Item = &PageGeometry> {
        self.pages.iter().map(|entry| &entry.geometry)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata::read(&self.document)
    }

    pub(crate) fn page_id(&self, page: u32) -> Result<ObjectId, EditorError> {
        self.entry(page).map(|entry| entry.id)
    }

    pub(crate) fn page_ids(&self) -> impl Iterator<Item = (u32, ObjectId)> + '_ {
        self.pages
            .iter()
            .map(|entry| (entry.geometry.page, entry.id))
    }

    /// Independent copy of the object graph for a save pass
    pub(crate) fn fork(&self) -> Document {
        self.document.clone()
    }

    fn entry(&self, page: u32) -> Result<&PageEntry, EditorError> {
        if page == 0 || page > self.page_count() {
            return Err(EditorError::InvalidPage {
                page,
                count: self.page_count(),
            });
        }
        Ok(&self.pages[(page - 1) as usize])
    }
}

/// Serialize a document into a fresh buffer
pub fn serialize(document: &mut Document) -> Result<Vec<u8>, EditorError> {
    let mut output = Vec::new();
    document
        .save_to(&mut output)
        .map_err(|e| EditorError::Save(e.to_string()))?;
    Ok(output)
}

/// Only a rejected password is worth prompting for again. Every other
/// failure (AES handlers, unknown revisions, broken dictionaries) would
/// reject the right password too.
fn decryption_error(error: lopdf::Error) -> EditorError {
    match error {
        lopdf::Error::Decryption(DecryptionError::IncorrectPassword) => {
            tracing::debug!("Password rejected");
            EditorError::PasswordRequired
        }
        other => EditorError::Load(format!("unsupported encryption: {}", other)),
    }
}

fn read_pages(document: &Document) -> Vec<PageEntry> {
    document
        .get_pages()
        .into_iter()
        .map(|(page, id)| PageEntry {
            id,
            geometry: read_geometry(document, page, id),
        })
        .collect()
}

fn read_geometry(document: &Document, page: u32, id: ObjectId) -> PageGeometry {
    let media = inherited(document, id, b"MediaBox")
        .and_then(|obj| parse_box(document, obj))
        .unwrap_or(DEFAULT_MEDIA_BOX);
    let media_box = DocRect::from_corners(media[0], media[1], media[2], media[3]);

    let view_box = inherited(document, id, b"CropBox")
        .and_then(|obj| parse_box(document, obj))
        .map(|c| DocRect::from_corners(c[0], c[1], c[2], c[3]))
        .and_then(|crop| crop.intersect(&media_box))
        .unwrap_or(media_box);

    let rotation = inherited(document, id, b"Rotate")
        .and_then(number)
        .and_then(|deg| {
            let rotation = Rotation::from_degrees(deg as i64).filter(|_| deg.fract() == 0.0);
            if rotation.is_none() {
                tracing::warn!("Ignoring /Rotate {} on page {}", deg, page);
            }
            rotation
        })
        .unwrap_or_default();

    PageGeometry {
        page,
        media_box,
        view_box,
        rotation,
    }
}

/// Follow one level of indirection
pub(crate) fn resolve<'a>(document: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => document.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

pub(crate) fn resolve_dict<'a>(document: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(document, obj).as_dict().ok()
}

/// Look up a page attribute, walking up the page tree for inheritable keys
pub(crate) fn inherited<'a>(document: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = document.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(resolve(document, value));
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = document.get_dictionary(parent).ok()?;
    }
    None
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(n) => Some(*n as f64),
        Object::Real(n) => Some(*n as f64),
        _ => None,
    }
}

pub(crate) fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

pub(crate) fn box_array(rect: &DocRect) -> Object {
    Object::Array(rect.corners().iter().map(|v| real(*v)).collect())
}

fn parse_box(document: &Document, obj: &Object) -> Option<[f64; 4]> {
    let array = obj.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut result = [0.0; 4];
    for (i, item) in array.iter().enumerate() {
        result[i] = number(resolve(document, item))?;
    }
    Some(result)
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8 with BOM, or Latin-1)
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|b| *b as char).collect()
}

/// Encode a PDF text string, using UTF-16BE only when ASCII cannot hold it
pub(crate) fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

pub(crate) fn text_of(document: &Document, obj: &Object) -> Option<String> {
    match resolve(document, obj) {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Document information dictionary fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub producer: Option<String>,
    /// PDF date string, e.g. `D:20240101120000Z`
    #[serde(default)]
    pub modification_date: Option<String>,
}

const INFO_KEYS: [&[u8]; 7] = [
    b"Title",
    b"Author",
    b"Subject",
    b"Keywords",
    b"Creator",
    b"Producer",
    b"ModDate",
];

impl DocumentMetadata {
    pub fn read(document: &Document) -> Self {
        let mut meta = Self::default();
        let Some(info) = document
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|obj| resolve_dict(document, obj))
        else {
            return meta;
        };
        for (key, slot) in INFO_KEYS.iter().zip(meta.slots_mut()) {
            *slot = info.get(key).ok().and_then(|v| text_of(document, v));
        }
        meta
    }

    /// Write every populated field into the Info dictionary, creating it when
    /// absent. Fields left as `None` are not touched.
    pub(crate) fn write(&self, document: &mut Document) -> Result<(), EditorError> {
        let info_id = match document.trailer.get(b"Info").and_then(Object::as_reference) {
            Ok(id) => id,
            Err(_) => {
                let inline = document
                    .trailer
                    .get(b"Info")
                    .ok()
                    .and_then(|obj| obj.as_dict().ok())
                    .cloned()
                    .unwrap_or_default();
                let id = document.add_object(Object::Dictionary(inline));
                document.trailer.set("Info", Object::Reference(id));
                id
            }
        };

        let info = document
            .get_object_mut(info_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| EditorError::Operation(format!("Info dictionary: {}", e)))?;
        for (key, value) in INFO_KEYS.iter().zip(self.slots()) {
            if let Some(value) = value {
                info.set(key.to_vec(), encode_text_string(value));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.slots().iter().all(|slot| slot.is_none())
    }

    fn slots(&self) -> [&Option<String>; 7] {
        [
            &self.title,
            &self.author,
            &self.subject,
            &self.keywords,
            &self.creator,
            &self.producer,
            &self.modification_date,
        ]
    }

    fn slots_mut(&mut self) -> [&mut Option<String>; 7] {
        [
            &mut self.title,
            &mut self.author,
            &mut self.subject,
            &mut self.keywords,
            &mut self.creator,
            &mut self.producer,
            &mut self.modification_date,
        ]
    }
}
