//! In-memory PDF builders for the integration tests

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

fn rect(values: [f64; 4]) -> Object {
    Object::Array(values.iter().map(|v| Object::Real(*v as f32)).collect())
}

fn save(doc: &mut Document) -> Vec<u8> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Letter pages with the given /Rotate values
pub fn document(rotations: &[i64]) -> (Document, Vec<ObjectId>) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for (i, rotate) in rotations.iter().enumerate() {
        let content = format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => rect([0.0, 0.0, 612.0, 792.0]),
            "Rotate" => *rotate,
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        }));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    (doc, page_ids)
}

pub fn pdf(rotations: &[i64]) -> Vec<u8> {
    let (mut doc, _) = document(rotations);
    save(&mut doc)
}

/// One page with a text field `name`, a checkbox `subscribe` and a text
/// field `city` that already holds "Paris".
pub fn form_pdf() -> Vec<u8> {
    let (mut doc, pages) = document(&[0]);
    let page = pages[0];

    let on = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let off = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let fields = vec![
        doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal("name"),
            "Rect" => rect([72.0, 700.0, 272.0, 720.0]),
            "P" => Object::Reference(page),
        }),
        doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Btn",
            "T" => Object::string_literal("subscribe"),
            "V" => "Off",
            "AS" => "Off",
            "AP" => dictionary! {
                "N" => dictionary! {
                    "Yes" => Object::Reference(on),
                    "Off" => Object::Reference(off),
                },
            },
            "Rect" => rect([72.0, 650.0, 87.0, 665.0]),
            "P" => Object::Reference(page),
        }),
        doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal("city"),
            "V" => Object::string_literal("Paris"),
            "Rect" => rect([72.0, 600.0, 272.0, 620.0]),
            "P" => Object::Reference(page),
        }),
    ];
    let refs: Vec<Object> = fields.iter().map(|id| Object::Reference(*id)).collect();
    doc.get_object_mut(page)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("Annots", refs.clone());
    let form_id = doc.add_object(dictionary! { "Fields" => refs });
    let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    doc.get_object_mut(catalog_id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("AcroForm", Object::Reference(form_id));
    save(&mut doc)
}

/// Standard security handler whose user password is not empty
pub fn encrypted_pdf() -> Vec<u8> {
    let (mut doc, _) = document(&[0]);
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "Length" => 40,
        "P" => -44,
        "O" => Object::string_literal(vec![0x4Fu8; 32]),
        "U" => Object::string_literal(vec![0x55u8; 32]),
    });
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::string_literal(vec![7u8; 16]),
            Object::string_literal(vec![7u8; 16]),
        ]),
    );
    save(&mut doc)
}

/// Padding string of the standard security handler
const PASSWORD_PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut state: Vec<u8> = (0..=255u8).collect();
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
        state.swap(i, j as usize);
    }
    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(state[i as usize]);
            state.swap(i as usize, j as usize);
            byte ^ state[state[i as usize].wrapping_add(state[j as usize]) as usize]
        })
        .collect()
}

fn set_file_id(doc: &mut Document) {
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(vec![0xA5u8; 16], StringFormat::Hexadecimal),
            Object::String(vec![0xA5u8; 16], StringFormat::Hexadecimal),
        ]),
    );
}

/// Seal a document under the 40-bit RC4 handler (V1, R2) so that `password`
/// is its user password.
fn seal_rc4(doc: &mut Document, password: &str) {
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "Length" => 40,
        "P" => -44,
        "O" => Object::String(vec![0x4Fu8; 32], StringFormat::Hexadecimal),
    });
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    set_file_id(doc);

    let key = lopdf::encryption::get_encryption_key(&*doc, password, false).unwrap();
    let ids: Vec<ObjectId> = doc.objects.keys().copied().filter(|id| *id != encrypt_id).collect();
    for id in ids {
        // RC4 is symmetric: "decrypting" plaintext seals it
        let Ok(sealed) = lopdf::encryption::decrypt_object(&key, id, doc.get_object(id).unwrap()) else {
            continue;
        };
        match doc.get_object_mut(id).unwrap() {
            Object::Stream(stream) => stream.set_content(sealed),
            Object::String(content, _) => *content = sealed,
            _ => {}
        }
    }

    let check = rc4(&key, &PASSWORD_PAD);
    doc.get_object_mut(encrypt_id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("U", Object::String(check, StringFormat::Hexadecimal));
}

/// Seal a document under an AES handler (V4, R4)
fn seal_aes(doc: &mut Document) {
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 4,
        "R" => 4,
        "Length" => 128,
        "P" => -44,
        "CF" => dictionary! {
            "StdCF" => dictionary! { "CFM" => "AESV2", "Length" => 16, "AuthEvent" => "DocOpen" },
        },
        "StmF" => "StdCF",
        "StrF" => "StdCF",
        "O" => Object::String(vec![0x4Fu8; 32], StringFormat::Hexadecimal),
        "U" => Object::String(vec![0x55u8; 32], StringFormat::Hexadecimal),
    });
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    set_file_id(doc);
}

/// Letter pages with the given /Rotate values, sealed with RC4 under a real
/// user password
pub fn rc4_encrypted_pdf(rotations: &[i64], password: &str) -> Vec<u8> {
    let (mut doc, _) = document(rotations);
    seal_rc4(&mut doc, password);
    save(&mut doc)
}

/// Letter page protected by an AES handler
pub fn aes_encrypted_pdf() -> Vec<u8> {
    let (mut doc, _) = document(&[0]);
    seal_aes(&mut doc);
    save(&mut doc)
}
