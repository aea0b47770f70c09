//! Video renditions offered to the user.
//!
//! The catalog turns the extractor's raw format list into one option per
//! frame height, best first. Only progressive-friendly containers are kept
//! and a height is represented by the first rendition the extractor reports
//! for it.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::core::error::AppError;
use crate::download::source::{MediaBackend, RawFormat};

/// Containers a height may be offered in
pub const ALLOWED_CONTAINERS: &[&str] = &["mp4", "webm"];

/// One selectable video quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatOption {
    pub height: u32,
    /// Extractor token selecting this rendition
    pub format_token: String,
    pub container: String,
}

impl FormatOption {
    /// Button label, e.g. `720p`.
    pub fn label(&self) -> String {
        format!("{}p", self.height)
    }
}

/// Filters, deduplicates and sorts raw formats.
///
/// Keeps mp4/webm renditions with a positive height; the first rendition seen
/// for each height wins; the result is sorted by height, descending.
pub fn select_renditions(formats: &[RawFormat]) -> Vec<FormatOption> {
    let mut seen = HashSet::new();
    let mut options: Vec<FormatOption> = formats
        .iter()
        .filter(|f| ALLOWED_CONTAINERS.contains(&f.ext.as_str()))
        .filter_map(|f| f.height.filter(|h| *h > 0).map(|h| (h, f)))
        .filter(|(height, _)| seen.insert(*height))
        .map(|(height, f)| FormatOption {
            height,
            format_token: f.format_id.clone(),
            container: f.ext.clone(),
        })
        .collect();

    options.sort_by(|a, b| b.height.cmp(&a.height));
    options
}

/// Rendition listing on top of a [`MediaBackend`].
#[derive(Clone)]
pub struct FormatCatalog {
    backend: Arc<dyn MediaBackend>,
}

impl FormatCatalog {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self { backend }
    }

    /// Lists the selectable video qualities for `url`, best first.
    ///
    /// An empty list is a valid answer; the caller decides how to tell the user.
    pub async fn list_renditions(&self, url: &str) -> Result<Vec<FormatOption>, AppError> {
        let raw = self.backend.list_formats(url).await?;
        let options = select_renditions(&raw);
        log::debug!(
            "{}: {} raw formats, {} selectable heights for {}",
            self.backend.name(),
            raw.len(),
            options.len(),
            url
        );
        Ok(options)
    }

    /// Re-lists renditions and returns the one with `height`.
    ///
    /// # Errors
    /// `AppError::ExtractionFailed` when the height is no longer offered.
    pub async fn resolve(&self, url: &str, height: u32) -> Result<FormatOption, AppError> {
        self.list_renditions(url)
            .await?
            .into_iter()
            .find(|option| option.height == height)
            .ok_or_else(|| AppError::ExtractionFailed(format!("{}p is no longer available", height)))
    }
}
