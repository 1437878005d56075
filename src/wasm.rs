//! WASM bindings for browser-based export.
//!
//! Trees cross the boundary in their JSON form; errors come back as strings.

use wasm_bindgen::prelude::*;

use crate::options::{ExportOptions, Extensions, Format};

/// Initialize panic hook for better error messages in the browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "wasm")]
    console_error_panic_hook::set_once();
}

/// Render a JSON document tree in the named format with default extensions.
#[wasm_bindgen]
pub fn export_json_tree(json: &str, format: &str) -> Result<String, JsValue> {
    let format = Format::from_name(format).map_err(|e| JsValue::from_str(&e.to_string()))?;
    crate::export_json(json, &ExportOptions::new(format)).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Render a JSON document tree with an explicit extension bit mask.
///
/// `RANDOM_FOOT` numbering is seeded from the clock.
#[wasm_bindgen]
pub fn export_json_tree_with(json: &str, format: &str, extensions: u32) -> Result<String, JsValue> {
    let format = Format::from_name(format).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let options = ExportOptions::new(format)
        .with_extensions(Extensions::from_bits(extensions))
        .with_random_seed(crate::util::time_seed_nanos());
    crate::export_json(json, &options).map_err(|e| JsValue::from_str(&e.to_string()))
}
