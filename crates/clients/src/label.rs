//! Label download and output.

use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fulfillment::{LabelError, LabelFetcher, LabelPrinter, PrinterError};
use image::{DynamicImage, ImageFormat};
use reqwest::Client;

use crate::error::ClientError;
use crate::http::build_client;

/// Replaces anything but ASCII alphanumerics, `-` and `_` so a label name is a safe file name.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn encode_png(label: &DynamicImage) -> Result<Vec<u8>, PrinterError> {
    let mut bytes = Vec::new();
    label.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Downloads label images over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLabelFetcher {
    client: Client,
}

impl HttpLabelFetcher {
    pub fn new() -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client()?,
        })
    }
}

#[async_trait]
impl LabelFetcher for HttpLabelFetcher {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LabelError> {
        let failed = |e: reqwest::Error| LabelError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(failed)?;
        let bytes = response.bytes().await.map_err(failed)?;
        Ok(bytes.to_vec())
    }
}

/// Program used to open an image on this platform.
pub fn default_viewer() -> (&'static str, Vec<&'static str>) {
    if cfg!(target_os = "windows") {
        ("powershell", vec!["-c"])
    } else if cfg!(target_os = "macos") {
        ("open", Vec::new())
    } else {
        ("xdg-open", Vec::new())
    }
}

/// Opens each label with the platform image viewer.
///
/// The label is written to a temporary PNG that is left in place, since
/// viewers usually return before they have read the file.
#[derive(Debug, Clone)]
pub struct SystemViewerPrinter {
    program: String,
    args: Vec<String>,
}

impl Default for SystemViewerPrinter {
    fn default() -> Self {
        let (program, args) = default_viewer();
        Self::with_command(program, args)
    }
}

impl SystemViewerPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `program args... <file>` instead of the platform viewer.
    pub fn with_command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl LabelPrinter for SystemViewerPrinter {
    #[tracing::instrument(skip(self, label))]
    async fn print(&self, label: &DynamicImage, name: &str) -> Result<(), PrinterError> {
        let bytes = encode_png(label)?;
        let file = tempfile::Builder::new()
            .prefix(&format!("{}-", file_stem(name)))
            .suffix(".png")
            .tempfile()?;
        let (_, path) = file.keep().map_err(io::Error::from)?;
        tokio::fs::write(&path, bytes).await?;

        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .status()
            .await?;
        if !status.success() {
            return Err(PrinterError::Viewer {
                status: status.to_string(),
            });
        }
        tracing::debug!(path = %path.display(), "label opened");
        Ok(())
    }
}

/// Saves each label as `<name>.png` in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryPrinter {
    dir: PathBuf,
}

impl DirectoryPrinter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path a label with this name is saved to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.png", file_stem(name)))
    }
}

#[async_trait]
impl LabelPrinter for DirectoryPrinter {
    #[tracing::instrument(skip(self, label))]
    async fn print(&self, label: &DynamicImage, name: &str) -> Result<(), PrinterError> {
        let bytes = encode_png(label)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(name);
        tokio::fs::write(&path, bytes).await?;
        tracing::info!(path = %path.display(), "label saved");
        Ok(())
    }
}
