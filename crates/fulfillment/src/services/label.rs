//! Label fetching and printing traits with in-memory implementations.

use std::io::Cursor;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{LabelError, PrinterError};

/// Downloads the raster image behind a label URL.
#[async_trait]
pub trait LabelFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LabelError>;
}

/// Prints or displays a composed label.
#[async_trait]
pub trait LabelPrinter: Send + Sync {
    /// `name` identifies the label (tracking code, or shipment id if none).
    async fn print(&self, label: &DynamicImage, name: &str) -> Result<(), PrinterError>;
}

/// Encodes a blank white label of the given size as PNG.
pub fn blank_label_png(width: u32, height: u32) -> Result<Vec<u8>, image::ImageError> {
    let image = RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

#[derive(Debug, Default)]
struct FetcherState {
    fetched: Vec<String>,
    fail_on_fetch: bool,
}

/// In-memory label fetcher that serves a blank 4x6 label for every URL.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLabelFetcher {
    state: Arc<RwLock<FetcherState>>,
}

impl InMemoryLabelFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the fetcher to fail every download.
    pub fn set_fail_on_fetch(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_fetch = fail;
    }

    /// Returns every URL requested, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fetched
            .clone()
    }
}

#[async_trait]
impl LabelFetcher for InMemoryLabelFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LabelError> {
        let fail = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.fetched.push(url.to_string());
            state.fail_on_fetch
        };
        if fail {
            return Err(LabelError::Fetch {
                url: url.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(blank_label_png(800, 1200)?)
    }
}

#[derive(Debug, Default)]
struct PrinterState {
    printed: Vec<(String, u32, u32)>,
    fail_on_print: bool,
}

/// Printer that records the name and dimensions of every label it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingLabelPrinter {
    state: Arc<RwLock<PrinterState>>,
}

impl RecordingLabelPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the printer to fail.
    pub fn set_fail_on_print(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_print = fail;
    }

    /// Returns `(name, width, height)` of each printed label.
    pub fn printed(&self) -> Vec<(String, u32, u32)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .printed
            .clone()
    }
}

#[async_trait]
impl LabelPrinter for RecordingLabelPrinter {
    async fn print(&self, label: &DynamicImage, name: &str) -> Result<(), PrinterError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail_on_print {
            return Err(PrinterError::Unavailable("printer offline".to_string()));
        }
        state
            .printed
            .push((name.to_string(), label.width(), label.height()));
        Ok(())
    }
}
