//! WASM bindings for the document editor
//!
//! All editing state lives in Rust inside an `EditSession`. JavaScript draws
//! page pixels with its own renderer, asks the session for viewports, render
//! tickets and overlay positions, and hands user gestures back to it.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { EditSession } from './pkg/docedit_wasm.js';
//!
//! await init();
//!
//! const session = new EditSession("lease.pdf", bytes, null, null);
//! const ticket = session.beginRender(1, container.clientWidth);
//! await pdfjsPage.render(...);
//! if (session.isCurrentRender(ticket)) paint();
//!
//! const id = session.addOverlay(1, { kind: "text", text: "Hello" }, ticket.viewport);
//! const result = session.save();
//! download(result.bytes, result.suggestedName);
//! ```

pub mod edit_session;

use docedit_core::EditorError;
use wasm_bindgen::prelude::*;

pub use edit_session::{EditSession, PendingSave, SaveResult};

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Get page count from PDF bytes (convenience function)
#[wasm_bindgen]
pub fn get_page_count(bytes: &[u8], password: Option<String>) -> Result<u32, JsValue> {
    docedit_core::get_page_count(bytes, password.as_deref()).map_err(to_js_error)
}

/// Format bytes as human-readable string
#[wasm_bindgen]
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

/// JS error class name for each failure, so the UI can branch on `err.name`
/// (for example to prompt for a password).
pub fn error_name(error: &EditorError) -> &'static str {
    match error {
        EditorError::Load(_) => "LoadError",
        EditorError::PasswordRequired => "PasswordRequiredError",
        EditorError::Render(_) => "RenderError",
        EditorError::Save(_) => "SaveError",
        EditorError::FieldWrite(_) => "FieldWriteError",
        EditorError::InvalidPage { .. } => "RenderError",
        EditorError::Image(_) => "ImageError",
        EditorError::StaleSession => "StaleSessionError",
        EditorError::Config(_) => "ConfigError",
        EditorError::Operation(_) => "OperationError",
    }
}

pub(crate) fn to_js_error(error: EditorError) -> JsValue {
    let js_error = js_sys::Error::new(&error.to_string());
    js_error.set_name(error_name(&error));
    js_error.into()
}
