//! Image payload decoding and XObject embedding
//!
//! Overlay images arrive as data URLs (or bare base64) holding PNG or JPEG
//! bytes. JPEG data is embedded as-is with DCTDecode. PNG data is decoded,
//! split into color and alpha planes and stored Flate-compressed with the
//! alpha plane as a soft mask.

use crate::error::EditorError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, ObjectId, Stream};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

/// Decode a `data:image/...;base64,` URL or a bare base64 string
pub fn decode_payload(data: &str) -> Result<ImagePayload, EditorError> {
    let data = data.trim();
    let (declared, encoded) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, body) = rest
                .split_once(',')
                .ok_or_else(|| EditorError::Image("data URL has no payload".to_string()))?;
            if !header.ends_with(";base64") {
                return Err(EditorError::Image(
                    "only base64 data URLs are supported".to_string(),
                ));
            }
            let mime = header.trim_end_matches(";base64").to_ascii_lowercase();
            let declared = match mime.as_str() {
                "image/png" => Some(ImageFormat::Png),
                "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
                _ => None,
            };
            (declared, body)
        }
        None => (None, data),
    };

    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| EditorError::Image(format!("invalid base64: {}", e)))?;
    let format = declared
        .or_else(|| sniff(&bytes))
        .ok_or_else(|| EditorError::Image("expected PNG or JPEG data".to_string()))?;
    Ok(ImagePayload { format, bytes })
}

pub fn sniff(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some(ImageFormat::Png)
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        Some(ImageFormat::Jpeg)
    } else {
        None
    }
}

/// Add the image (and its soft mask, if any) to the document
pub(crate) fn embed(doc: &mut Document, payload: &ImagePayload) -> Result<ObjectId, EditorError> {
    let stream = match payload.format {
        ImageFormat::Jpeg => jpeg_stream(&payload.bytes)?,
        ImageFormat::Png => png_stream(doc, &payload.bytes)?,
    };
    Ok(doc.add_object(stream))
}

fn jpeg_stream(bytes: &[u8]) -> Result<Stream, EditorError> {
    let info = jpeg_info(bytes)
        .ok_or_else(|| EditorError::Image("JPEG has no frame header".to_string()))?;
    let color_space = match info.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => {
            return Err(EditorError::Image(format!(
                "unsupported JPEG component count {}",
                n
            )))
        }
    };
    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => info.width as i64,
            "Height" => info.height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        bytes.to_vec(),
    ))
}

#[derive(Debug, PartialEq)]
struct JpegInfo {
    width: u32,
    height: u32,
    components: u8,
}

/// Walk the marker segments up to the first start-of-frame
fn jpeg_info(bytes: &[u8]) -> Option<JpegInfo> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = bytes[i + 1];
        match marker {
            0xFF => {
                i += 1;
                continue;
            }
            0x01 | 0xD0..=0xD8 => {
                i += 2;
                continue;
            }
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let length = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            let header = bytes.get(i + 4..i + 10)?;
            return Some(JpegInfo {
                height: u16::from_be_bytes([header[1], header[2]]) as u32,
                width: u16::from_be_bytes([header[3], header[4]]) as u32,
                components: header[5],
            });
        }
        i += 2 + length;
    }
    None
}

fn png_stream(doc: &mut Document, bytes: &[u8]) -> Result<Stream, EditorError> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| EditorError::Image(format!("PNG header: {}", e)))?;
    let mut buffer = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buffer)
        .map_err(|e| EditorError::Image(format!("PNG data: {}", e)))?;
    buffer.truncate(frame.buffer_size());

    let (channels, has_alpha, color_space) = match frame.color_type {
        png::ColorType::Grayscale => (1, false, "DeviceGray"),
        png::ColorType::GrayscaleAlpha => (2, true, "DeviceGray"),
        png::ColorType::Rgb => (3, false, "DeviceRGB"),
        png::ColorType::Rgba => (4, true, "DeviceRGB"),
        png::ColorType::Indexed => {
            return Err(EditorError::Image("indexed PNG was not expanded".to_string()))
        }
    };

    let (color, alpha) = if has_alpha {
        let color_channels = channels - 1;
        let pixel_count = buffer.len() / channels;
        let mut color = Vec::with_capacity(pixel_count * color_channels);
        let mut alpha = Vec::with_capacity(pixel_count);
        for px in buffer.chunks_exact(channels) {
            color.extend_from_slice(&px[..color_channels]);
            alpha.push(px[color_channels]);
        }
        (color, Some(alpha))
    } else {
        (buffer, None)
    };

    let (width, height) = (frame.width as i64, frame.height as i64);
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if let Some(alpha) = alpha {
        let smask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        ));
        dict.set("SMask", smask_id);
    }

    Ok(Stream::new(dict, deflate(&color)?))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, EditorError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| EditorError::Image(format!("compression failed: {}", e)))
}
