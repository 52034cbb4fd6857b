//! PDF fixtures shared by the unit tests

use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

pub struct PageSpec {
    pub media_box: [f64; 4],
    pub crop_box: Option<[f64; 4]>,
    pub rotate: Option<i64>,
}

impl PageSpec {
    pub fn letter() -> Self {
        Self {
            media_box: [0.0, 0.0, 612.0, 792.0],
            crop_box: None,
            rotate: None,
        }
    }

    pub fn rotated(rotate: i64) -> Self {
        Self {
            rotate: Some(rotate),
            ..Self::letter()
        }
    }
}

fn box_object(values: [f64; 4]) -> Object {
    Object::Array(values.iter().map(|v| Object::Real(*v as f32)).collect())
}

/// Build a document whose pages each carry a small text content stream and
/// a Helvetica font resource named F1.
pub fn build_document(pages: &[PageSpec]) -> (Document, Vec<ObjectId>) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for (i, spec) in pages.iter().enumerate() {
        let content = format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => box_object(spec.media_box),
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        };
        if let Some(crop) = spec.crop_box {
            page.set("CropBox", box_object(crop));
        }
        if let Some(rotate) = spec.rotate {
            page.set("Rotate", Object::Integer(rotate));
        }
        page_ids.push(doc.add_object(page));
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

pub fn save(doc: &mut Document) -> Vec<u8> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub fn build_pdf(pages: &[PageSpec]) -> Vec<u8> {
    let (mut doc, _) = build_document(pages);
    save(&mut doc)
}

pub fn letter_pdf(page_count: usize) -> Vec<u8> {
    let pages: Vec<PageSpec> = (0..page_count).map(|_| PageSpec::letter()).collect();
    build_pdf(&pages)
}

/// Letter page whose trailer carries a Standard security handler the empty
/// password cannot open.
pub fn encrypted_pdf() -> Vec<u8> {
    let (mut doc, _) = build_document(&[PageSpec::letter()]);
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
            Object::string_literal(vec![1u8; 16]),
            Object::string_literal(vec![1u8; 16]),
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

/// Letter pages sealed with RC4 under a real user password
pub fn rc4_encrypted_pdf(page_count: usize, password: &str) -> Vec<u8> {
    let pages: Vec<PageSpec> = (0..page_count).map(|_| PageSpec::letter()).collect();
    let (mut doc, _) = build_document(&pages);
    seal_rc4(&mut doc, password);
    save(&mut doc)
}

/// Letter page protected by an AES handler lopdf cannot open
pub fn aes_encrypted_pdf() -> Vec<u8> {
    let (mut doc, _) = build_document(&[PageSpec::letter()]);
    seal_aes(&mut doc);
    save(&mut doc)
}

fn appearance(doc: &mut Document, states: &[&str]) -> Object {
    let mut normal = lopdf::Dictionary::new();
    for state in states {
        let stream_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        normal.set(state.as_bytes().to_vec(), Object::Reference(stream_id));
    }
    Object::Dictionary(dictionary! { "N" => normal })
}

/// Two-page form:
///
/// page 1: `name` (text), `subscribe` (checkbox), `color` (combo with
/// Red/Green/Blue, value Green), `size` (radio S/M/L, value M), `submit`
/// (push button), plus a Link annotation.
/// page 2: `address.street` (text, hierarchical name).
pub fn form_pdf() -> Vec<u8> {
    let (mut doc, page_ids) = build_document(&[PageSpec::letter(), PageSpec::letter()]);
    let (p1, p2) = (page_ids[0], page_ids[1]);

    let name_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal("name"),
        "V" => Object::string_literal(""),
        "Rect" => box_object([100.0, 700.0, 300.0, 720.0]),
        "P" => Object::Reference(p1),
    });

    let subscribe_ap = appearance(&mut doc, &["Yes", "Off"]);
    let subscribe_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Btn",
        "T" => Object::string_literal("subscribe"),
        "V" => "Off",
        "AS" => "Off",
        "AP" => subscribe_ap,
        "Rect" => box_object([100.0, 650.0, 115.0, 665.0]),
        "P" => Object::Reference(p1),
    });

    let color_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Ch",
        "Ff" => 1 << 17,
        "T" => Object::string_literal("color"),
        "Opt" => vec![
            Object::string_literal("Red"),
            Object::string_literal("Green"),
            Object::string_literal("Blue"),
        ],
        "V" => Object::string_literal("Green"),
        "Rect" => box_object([100.0, 600.0, 200.0, 620.0]),
        "P" => Object::Reference(p1),
    });

    let size_id = doc.new_object_id();
    let mut size_kids = Vec::new();
    for (i, state) in ["S", "M", "L"].iter().enumerate() {
        let ap = appearance(&mut doc, &[*state, "Off"]);
        let x = 100.0 + 30.0 * i as f64;
        let kid = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Parent" => Object::Reference(size_id),
            "AP" => ap,
            "AS" => if *state == "M" { *state } else { "Off" },
            "Rect" => box_object([x, 550.0, x + 12.0, 562.0]),
            "P" => Object::Reference(p1),
        });
        size_kids.push(Object::Reference(kid));
    }
    doc.objects.insert(
        size_id,
        Object::Dictionary(dictionary! {
            "FT" => "Btn",
            "Ff" => 1 << 15,
            "T" => Object::string_literal("size"),
            "V" => "M",
            "Kids" => size_kids.clone(),
        }),
    );

    let submit_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Btn",
        "Ff" => 1 << 16,
        "T" => Object::string_literal("submit"),
        "Rect" => box_object([400.0, 700.0, 450.0, 720.0]),
        "P" => Object::Reference(p1),
    });

    let link_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => box_object([10.0, 10.0, 50.0, 50.0]),
    });

    let address_id = doc.new_object_id();
    let street_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "Parent" => Object::Reference(address_id),
        "T" => Object::string_literal("street"),
        "Rect" => box_object([72.0, 500.0, 372.0, 520.0]),
        "P" => Object::Reference(p2),
    });
    doc.objects.insert(
        address_id,
        Object::Dictionary(dictionary! {
            "T" => Object::string_literal("address"),
            "Kids" => vec![Object::Reference(street_id)],
        }),
    );

    let mut page1_annots = vec![
        Object::Reference(name_id),
        Object::Reference(subscribe_id),
        Object::Reference(color_id),
    ];
    page1_annots.extend(size_kids);
    page1_annots.push(Object::Reference(submit_id));
    page1_annots.push(Object::Reference(link_id));
    set_annots(&mut doc, p1, page1_annots);
    set_annots(&mut doc, p2, vec![Object::Reference(street_id)]);

    let acroform_id = doc.add_object(dictionary! {
        "Fields" => vec![
            Object::Reference(name_id),
            Object::Reference(subscribe_id),
            Object::Reference(color_id),
            Object::Reference(size_id),
            Object::Reference(submit_id),
            Object::Reference(address_id),
        ],
        "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
    });
    let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    doc.get_object_mut(catalog_id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("AcroForm", Object::Reference(acroform_id));

    save(&mut doc)
}

fn set_annots(doc: &mut Document, page_id: ObjectId, annots: Vec<Object>) {
    doc.get_object_mut(page_id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("Annots", annots);
}

/// 2x1 RGBA PNG: one opaque red pixel, one half-transparent blue pixel
pub fn tiny_png() -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, 2, 1);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer
            .write_image_data(&[255, 0, 0, 255, 0, 0, 255, 128])
            .unwrap();
    }
    out
}

/// Minimal JPEG header: SOI, SOF0 for a 3x2 three-component image, EOI
pub fn tiny_jpeg() -> Vec<u8> {
    vec![
        0xFF, 0xD8, // SOI
        0xFF, 0xE0, 0x00, 0x04, 0x4A, 0x46, // APP0 (truncated payload)
        0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x02, 0x00, 0x03, 0x03, 0x01, 0x22, 0x00, 0x02,
        0x11, 0x01, 0x03, 0x11, 0x01, // SOF0
        0xFF, 0xD9, // EOI
    ]
}
