use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use gallery_core::{page_slug, HarvestSummary, PageRecord};

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// RFC 3339 timestamp recorded in the summary.
    pub extracted_at: String,
    /// Date stamp used in file names, e.g. `2026-10-19`.
    pub date: String,
    pub summary_prefix: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            extracted_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            date: now.format("%Y-%m-%d").to_string(),
            summary_prefix: "all".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub page_files: Vec<PathBuf>,
    pub summary_path: PathBuf,
    pub total_photos: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes one `<page-slug>-projects-<date>.json` per page plus a run summary
/// `<prefix>-projects-<date>.json`.
pub fn export_pages(
    output_dir: &Path,
    pages: &[PageRecord],
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    let writer = AtomicFileWriter::new(output_dir.to_path_buf());

    let mut page_files = Vec::with_capacity(pages.len());
    for page in pages {
        let filename = format!("{}-projects-{}.json", page_slug(&page.page_name), options.date);
        let json = serde_json::to_string_pretty(page)?;
        page_files.push(writer.write(&filename, &json)?);
    }

    let summary = HarvestSummary {
        extracted_at: options.extracted_at.clone(),
        total_pages: pages.len(),
        pages: pages.to_vec(),
    };
    let filename = format!("{}-projects-{}.json", options.summary_prefix, options.date);
    let summary_path = writer.write(&filename, &serde_json::to_string_pretty(&summary)?)?;

    Ok(ExportSummary {
        page_files,
        summary_path,
        total_photos: pages.iter().map(PageRecord::total_photos).sum(),
    })
}
