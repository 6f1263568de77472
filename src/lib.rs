//! Showcase - media exclusivity, navigation and lazy embeds for an artist site.
//!
//! The runtime keeps at most one audible source playing across native media
//! elements and embedded video players, drives hash-based section and tab
//! navigation, and defers embed loading until frames approach the viewport.
//! In the browser it runs through the `web` adapters; everywhere else the
//! same runtime can be replayed headlessly against in-memory fakes.

pub mod chrome;
pub mod cli;
pub mod config;
pub mod error;
pub mod gallery;
pub mod headless;
pub mod i18n;
pub mod lazy;
pub mod media;
pub mod nav;
pub mod page;
pub mod platform;
pub mod prefs;
#[cfg(test)]
pub mod test_utils;

/// Browser entry point.
#[cfg(all(feature = "web", target_arch = "wasm32"))]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() -> Result<(), wasm_bindgen::JsValue> {
    platform::web::boot()
        .map(|runtime| {
            tracing::info!("Booted with {} observed frames", runtime.observed_frames().len());
        })
        .map_err(|e| {
            let err = error::Error::from(e).context("boot failed");
            wasm_bindgen::JsValue::from_str(&err.to_string())
        })
}
