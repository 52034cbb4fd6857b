//! Interactive form catalog and value writing
//!
//! Fields are read from the AcroForm field tree. Hierarchical names are
//! joined with dots, and the field type and flags are inherited down the
//! tree. Push buttons and signature fields are not editable here and are left
//! out of the catalog.

use crate::document::{decode_text_string, encode_text_string, resolve, resolve_dict, text_of};
use crate::error::FieldWriteError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

const FF_RADIO: i64 = 1 << 15;
const FF_PUSHBUTTON: i64 = 1 << 16;
const FF_EDIT: i64 = 1 << 18;

/// Guard against malformed, deeply nested or cyclic field trees
const MAX_FIELD_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Checkbox,
    Dropdown,
    Radio,
}

/// A value the user entered, or the value a field currently holds.
/// Checkboxes use `Checked`; every other kind uses `Text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Checked(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Checked(_) => None,
        }
    }

    pub fn as_checked(&self) -> Option<bool> {
        match self {
            FieldValue::Checked(b) => Some(*b),
            FieldValue::Text(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Checked(b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    /// Fully qualified name, e.g. `address.street`
    pub name: String,
    pub kind: FieldKind,
    /// Export values of a dropdown, or the states of a radio group
    pub options: Vec<String>,
    pub value: FieldValue,
    #[serde(skip)]
    pub(crate) object_id: ObjectId,
    #[serde(skip)]
    pub(crate) widgets: Vec<ObjectId>,
    #[serde(skip)]
    on_states: Vec<String>,
    #[serde(skip)]
    max_len: Option<usize>,
    #[serde(skip)]
    editable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormCatalog {
    fields: Vec<FormField>,
}

struct Inherited<'a> {
    name: Option<&'a str>,
    field_type: Option<&'a [u8]>,
    flags: i64,
}

impl FormCatalog {
    /// Read every supported field. A document without a form yields an empty catalog.
    pub fn read(doc: &Document) -> Self {
        let mut fields = Vec::new();
        let Some(roots) = acroform(doc)
            .and_then(|form| form.get(b"Fields").ok())
            .and_then(|f| resolve(doc, f).as_array().ok())
        else {
            return Self { fields };
        };

        let mut visited = HashSet::new();
        let inherited = Inherited {
            name: None,
            field_type: None,
            flags: 0,
        };
        for root in roots {
            if let Ok(id) = root.as_reference() {
                walk(doc, id, &inherited, 0, &mut visited, &mut fields);
            }
        }
        tracing::debug!("Form catalog has {} fields", fields.len());
        Self { fields }
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn initial_values(&self) -> BTreeMap<String, FieldValue> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect()
    }
}

fn acroform(doc: &Document) -> Option<&Dictionary> {
    let root = doc.trailer.get(b"Root").ok()?;
    let catalog = resolve_dict(doc, root)?;
    resolve_dict(doc, catalog.get(b"AcroForm").ok()?)
}

fn walk(
    doc: &Document,
    id: ObjectId,
    parent: &Inherited,
    depth: usize,
    visited: &mut HashSet<ObjectId>,
    out: &mut Vec<FormField>,
) {
    if depth > MAX_FIELD_DEPTH || !visited.insert(id) {
        return;
    }
    let Ok(dict) = doc.get_dictionary(id) else {
        return;
    };

    let partial = dict.get(b"T").ok().and_then(|t| text_of(doc, t));
    let name = match (parent.name, partial) {
        (Some(p), Some(t)) => Some(format!("{}.{}", p, t)),
        (None, Some(t)) => Some(t),
        (p, None) => p.map(str::to_string),
    };
    let field_type = dict
        .get(b"FT")
        .ok()
        .and_then(|o| resolve(doc, o).as_name().ok())
        .or(parent.field_type);
    let flags = dict
        .get(b"Ff")
        .ok()
        .and_then(|o| resolve(doc, o).as_i64().ok())
        .unwrap_or(parent.flags);

    let kids: Vec<ObjectId> = dict
        .get(b"Kids")
        .ok()
        .and_then(|k| resolve(doc, k).as_array().ok())
        .map(|items| items.iter().filter_map(|k| k.as_reference().ok()).collect())
        .unwrap_or_default();
    let (child_fields, widgets): (Vec<ObjectId>, Vec<ObjectId>) = kids.into_iter().partition(|kid| {
        doc.get_dictionary(*kid)
            .map(|d| d.has(b"T"))
            .unwrap_or(false)
    });

    let inherited = Inherited {
        name: name.as_deref(),
        field_type,
        flags,
    };
    for child in &child_fields {
        walk(doc, *child, &inherited, depth + 1, visited, out);
    }
    if !child_fields.is_empty() && widgets.is_empty() {
        return;
    }

    let Some(name) = name.clone() else {
        return;
    };
    let Some(kind) = classify(field_type, flags) else {
        tracing::debug!("Skipping unsupported field '{}'", name);
        return;
    };
    let widgets = if widgets.is_empty() { vec![id] } else { widgets };
    let on_states = collect_on_states(doc, &widgets);
    let options = match kind {
        FieldKind::Dropdown => choice_options(doc, dict),
        FieldKind::Radio => on_states.clone(),
        FieldKind::Text | FieldKind::Checkbox => Vec::new(),
    };
    let value = read_value(doc, dict, kind, &widgets);
    let max_len = dict
        .get(b"MaxLen")
        .ok()
        .and_then(|o| resolve(doc, o).as_i64().ok())
        .and_then(|n| usize::try_from(n).ok());

    out.push(FormField {
        name,
        kind,
        options,
        value,
        object_id: id,
        widgets,
        on_states,
        max_len,
        editable: flags & FF_EDIT != 0,
    });
}

fn classify(field_type: Option<&[u8]>, flags: i64) -> Option<FieldKind> {
    match field_type? {
        b"Tx" => Some(FieldKind::Text),
        b"Btn" if flags & FF_PUSHBUTTON != 0 => None,
        b"Btn" if flags & FF_RADIO != 0 => Some(FieldKind::Radio),
        b"Btn" => Some(FieldKind::Checkbox),
        // Combo boxes and list boxes both pick one export value
        b"Ch" => Some(FieldKind::Dropdown),
        _ => None,
    }
}

/// Appearance state names other than Off, in widget order
fn collect_on_states(doc: &Document, widgets: &[ObjectId]) -> Vec<String> {
    let mut states = Vec::new();
    for widget in widgets {
        for state in widget_states(doc, *widget) {
            if !states.contains(&state) {
                states.push(state);
            }
        }
    }
    states
}

fn widget_states(doc: &Document, widget: ObjectId) -> Vec<String> {
    let normal = doc
        .get_dictionary(widget)
        .ok()
        .and_then(|w| w.get(b"AP").ok())
        .and_then(|ap| resolve_dict(doc, ap))
        .and_then(|ap| ap.get(b"N").ok())
        .and_then(|n| resolve_dict(doc, n));
    normal
        .map(|n| {
            n.iter()
                .map(|(k, _)| String::from_utf8_lossy(k).into_owned())
                .filter(|k| k != "Off")
                .collect()
        })
        .unwrap_or_default()
}

fn choice_options(doc: &Document, dict: &Dictionary) -> Vec<String> {
    let Some(items) = dict
        .get(b"Opt")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
    else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match resolve(doc, item) {
            // [export value, display text]
            Object::Array(pair) => pair.first().and_then(|v| text_of(doc, v)),
            other => text_of(doc, other),
        })
        .collect()
}

fn read_value(doc: &Document, dict: &Dictionary, kind: FieldKind, widgets: &[ObjectId]) -> FieldValue {
    let v = dict.get(b"V").ok().map(|o| resolve(doc, o));
    match kind {
        FieldKind::Checkbox => {
            let state = v
                .and_then(|o| o.as_name().ok())
                .or_else(|| {
                    widgets
                        .first()
                        .and_then(|w| doc.get_dictionary(*w).ok())
                        .and_then(|w| w.get(b"AS").ok())
                        .and_then(|s| s.as_name().ok())
                });
            FieldValue::Checked(matches!(state, Some(s) if s != b"Off"))
        }
        FieldKind::Radio => {
            let state = v
                .and_then(|o| o.as_name().ok())
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .filter(|s| s != "Off")
                .unwrap_or_default();
            FieldValue::Text(state)
        }
        FieldKind::Text | FieldKind::Dropdown => {
            let text = match v {
                Some(Object::String(bytes, _)) => decode_text_string(bytes),
                Some(Object::Array(items)) => items.first().and_then(|i| text_of(doc, i)).unwrap_or_default(),
                Some(other) => text_of(doc, other).unwrap_or_default(),
                None => String::new(),
            };
            FieldValue::Text(text)
        }
    }
}

/// Write one value. Returns true when viewers must regenerate appearances.
pub(crate) fn write_value(
    doc: &mut Document,
    field: &FormField,
    value: &FieldValue,
) -> Result<bool, FieldWriteError> {
    let fail = |reason: String| FieldWriteError::new(&field.name, reason);
    match field.kind {
        FieldKind::Text => {
            let text = value
                .as_text()
                .ok_or_else(|| fail("text field expects a string".to_string()))?;
            if let Some(max) = field.max_len {
                if text.chars().count() > max {
                    return Err(fail(format!("value exceeds the maximum length of {}", max)));
                }
            }
            set_on_field(doc, field, "V", encode_text_string(text))?;
            drop_appearances(doc, field);
            Ok(true)
        }
        FieldKind::Dropdown => {
            let choice = value
                .as_text()
                .ok_or_else(|| fail("dropdown expects a string".to_string()))?;
            if !field.editable && !field.options.is_empty() && !field.options.iter().any(|o| o == choice) {
                return Err(fail(format!("'{}' is not one of the options", choice)));
            }
            set_on_field(doc, field, "V", encode_text_string(choice))?;
            drop_appearances(doc, field);
            Ok(true)
        }
        FieldKind::Checkbox => {
            let checked = value
                .as_checked()
                .ok_or_else(|| fail("checkbox expects true or false".to_string()))?;
            let on = field.on_states.first().cloned().unwrap_or_else(|| "Yes".to_string());
            let state = if checked { on.as_str() } else { "Off" };
            set_on_field(doc, field, "V", Object::Name(state.as_bytes().to_vec()))?;
            for widget in &field.widgets {
                let widget_on = widget_states(doc, *widget).into_iter().next().unwrap_or_else(|| on.clone());
                let appearance = if checked { widget_on } else { "Off".to_string() };
                set_on_widget(doc, *widget, "AS", Object::Name(appearance.into_bytes()));
            }
            Ok(false)
        }
        FieldKind::Radio => {
            let choice = value
                .as_text()
                .ok_or_else(|| fail("radio group expects a string".to_string()))?;
            let selected = if choice.is_empty() || choice == "Off" {
                "Off"
            } else if field.options.iter().any(|o| o == choice) {
                choice
            } else {
                return Err(fail(format!("'{}' is not one of the options", choice)));
            };
            set_on_field(doc, field, "V", Object::Name(selected.as_bytes().to_vec()))?;
            for widget in &field.widgets {
                let states = widget_states(doc, *widget);
                let appearance = if states.iter().any(|s| s == selected) { selected } else { "Off" };
                set_on_widget(doc, *widget, "AS", Object::Name(appearance.as_bytes().to_vec()));
            }
            Ok(false)
        }
    }
}

fn set_on_field(doc: &mut Document, field: &FormField, key: &str, value: Object) -> Result<(), FieldWriteError> {
    let dict = doc
        .get_object_mut(field.object_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| FieldWriteError::new(&field.name, format!("field dictionary: {}", e)))?;
    dict.set(key, value);
    Ok(())
}

fn set_on_widget(doc: &mut Document, widget: ObjectId, key: &str, value: Object) {
    if let Ok(dict) = doc.get_object_mut(widget).and_then(Object::as_dict_mut) {
        dict.set(key, value);
    }
}

/// Stale appearance streams would keep showing the old value
fn drop_appearances(doc: &mut Document, field: &FormField) {
    for widget in &field.widgets {
        if let Ok(dict) = doc.get_object_mut(*widget).and_then(Object::as_dict_mut) {
            dict.remove(b"AP");
        }
    }
}

fn set_need_appearances(doc: &mut Document) -> Result<(), String> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|e| format!("catalog: {}", e))?;
    let form_ref = doc
        .get_dictionary(catalog_id)
        .and_then(|c| c.get(b"AcroForm"))
        .map_err(|e| format!("AcroForm: {}", e))?
        .as_reference()
        .ok();
    let form = match form_ref {
        Some(id) => doc.get_object_mut(id).and_then(Object::as_dict_mut),
        None => doc
            .get_object_mut(catalog_id)
            .and_then(Object::as_dict_mut)
            .and_then(|c| c.get_mut(b"AcroForm"))
            .and_then(Object::as_dict_mut),
    }
    .map_err(|e| format!("AcroForm: {}", e))?;
    form.set("NeedAppearances", Object::Boolean(true));
    Ok(())
}

/// Write every value, collecting per-field failures instead of stopping.
pub fn apply_values(
    doc: &mut Document,
    catalog: &FormCatalog,
    values: &BTreeMap<String, FieldValue>,
) -> Vec<FieldWriteError> {
    let mut errors = Vec::new();
    let mut needs_appearances = false;
    for (name, value) in values {
        let result = match catalog.get(name) {
            Some(field) => write_value(doc, field, value),
            None => Err(FieldWriteError::new(name, "no such field")),
        };
        match result {
            Ok(regenerate) => needs_appearances |= regenerate,
            Err(e) => {
                tracing::warn!("{}", e);
                errors.push(e);
            }
        }
    }
    if needs_appearances {
        if let Err(e) = set_need_appearances(doc) {
            tracing::warn!("Could not request appearance regeneration: {}", e);
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{form_pdf, letter_pdf};
    use pretty_assertions::assert_eq;

    fn form_doc() -> Document {
        Document::load_mem(&form_pdf()).unwrap()
    }

    #[test]
    fn test_catalog_reads_supported_fields() {
        let catalog = FormCatalog::read(&form_doc());
        let names: Vec<&str> = catalog.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "subscribe", "color", "size", "address.street"]);

        let kinds: Vec<FieldKind> = catalog.fields().iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FieldKind::Text,
                FieldKind::Checkbox,
                FieldKind::Dropdown,
                FieldKind::Radio,
                FieldKind::Text
            ]
        );
    }

    #[test]
    fn test_catalog_options_and_values() {
        let catalog = FormCatalog::read(&form_doc());
        let color = catalog.get("color").unwrap();
        assert_eq!(color.options, vec!["Red", "Green", "Blue"]);
        assert_eq!(color.value, FieldValue::from("Green"));

        let size = catalog.get("size").unwrap();
        assert_eq!(size.options, vec!["S", "M", "L"]);
        assert_eq!(size.value, FieldValue::from("M"));
        assert_eq!(size.widgets.len(), 3);

        assert_eq!(catalog.get("subscribe").unwrap().value, FieldValue::Checked(false));
        assert_eq!(catalog.get("name").unwrap().value, FieldValue::from(""));
    }

    #[test]
    fn test_document_without_form_has_empty_catalog() {
        let doc = Document::load_mem(&letter_pdf(1)).unwrap();
        assert!(FormCatalog::read(&doc).is_empty());
    }

    #[test]
    fn test_apply_values_writes_and_reports_failures() {
        let mut doc = form_doc();
        let catalog = FormCatalog::read(&doc);
        let mut values = BTreeMap::new();
        values.insert("name".to_string(), FieldValue::from("Alice"));
        values.insert("subscribe".to_string(), FieldValue::Checked(true));
        values.insert("color".to_string(), FieldValue::from("Purple"));
        values.insert("size".to_string(), FieldValue::Checked(true));
        values.insert("missing".to_string(), FieldValue::from("x"));

        let errors = apply_values(&mut doc, &catalog, &values);
        let failed: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(failed, vec!["color", "missing", "size"]);

        let reread = FormCatalog::read(&doc);
        assert_eq!(reread.get("name").unwrap().value, FieldValue::from("Alice"));
        assert_eq!(reread.get("subscribe").unwrap().value, FieldValue::Checked(true));
        assert_eq!(reread.get("color").unwrap().value, FieldValue::from("Green"));

        let subscribe = reread.get("subscribe").unwrap();
        let widget = doc.get_dictionary(subscribe.widgets[0]).unwrap();
        assert_eq!(widget.get(b"AS").unwrap().as_name().unwrap(), b"Yes");

        let form = acroform(&doc).unwrap();
        assert!(form.get(b"NeedAppearances").unwrap().as_bool().unwrap());
    }

    #[test]
    fn test_radio_selection_updates_widget_states() {
        let mut doc = form_doc();
        let catalog = FormCatalog::read(&doc);
        let size = catalog.get("size").unwrap();
        write_value(&mut doc, size, &FieldValue::from("L")).unwrap();

        let states: Vec<Vec<u8>> = size
            .widgets
            .iter()
            .map(|w| doc.get_dictionary(*w).unwrap().get(b"AS").unwrap().as_name().unwrap().to_vec())
            .collect();
        assert_eq!(states, vec![b"Off".to_vec(), b"Off".to_vec(), b"L".to_vec()]);
        assert_eq!(FormCatalog::read(&doc).get("size").unwrap().value, FieldValue::from("L"));
    }

    #[test]
    fn test_text_value_with_non_latin_characters() {
        let mut doc = form_doc();
        let catalog = FormCatalog::read(&doc);
        let field = catalog.get("address.street").unwrap();
        write_value(&mut doc, field, &FieldValue::from("Stra\u{df}e \u{2116}5")).unwrap();
        assert_eq!(
            FormCatalog::read(&doc).get("address.street").unwrap().value,
            FieldValue::from("Stra\u{df}e \u{2116}5")
        );
    }

    #[test]
    fn test_field_value_json_shape() {
        let values: BTreeMap<String, FieldValue> =
            serde_json::from_str(r#"{"name": "Alice", "subscribe": true}"#).unwrap();
        assert_eq!(values["name"], FieldValue::from("Alice"));
        assert_eq!(values["subscribe"], FieldValue::Checked(true));
    }
}
