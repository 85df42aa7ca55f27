//! Label composition.

use std::path::Path;

use image::{DynamicImage, imageops};

use crate::error::LabelError;

/// Position of the return-address logo on a label, in pixels from the top left.
pub const LOGO_OFFSET: (i64, i64) = (450, 425);

/// How a fetched label is turned into the image sent to the printer.
#[derive(Debug, Clone)]
pub struct LabelLayout {
    logo: Option<DynamicImage>,
    offset: (i64, i64),
}

impl Default for LabelLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelLayout {
    /// Layout that prints labels unchanged.
    pub fn new() -> Self {
        Self {
            logo: None,
            offset: LOGO_OFFSET,
        }
    }

    /// Overlays `logo` on every label.
    pub fn with_logo(mut self, logo: DynamicImage) -> Self {
        self.logo = Some(logo);
        self
    }

    pub fn with_offset(mut self, x: i64, y: i64) -> Self {
        self.offset = (x, y);
        self
    }

    /// Reads the logo from an image file.
    pub fn load_logo(self, path: impl AsRef<Path>) -> Result<Self, LabelError> {
        let bytes = std::fs::read(path)?;
        let logo = image::load_from_memory(&bytes)?;
        Ok(self.with_logo(logo))
    }

    pub fn has_logo(&self) -> bool {
        self.logo.is_some()
    }

    /// Decodes label bytes and applies the logo overlay.
    pub fn compose(&self, label_bytes: &[u8]) -> Result<DynamicImage, LabelError> {
        let mut label = image::load_from_memory(label_bytes)?;
        if let Some(logo) = &self.logo {
            imageops::overlay(&mut label, logo, self.offset.0, self.offset.1);
        }
        Ok(label)
    }
}
