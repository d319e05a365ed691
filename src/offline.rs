use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::model::{ProjectSummary, SavedDetail};
use crate::parser::{detail, listing};

/// Which extractor to run over saved pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PageKind {
    /// Gallery pages, one summary per project entry
    Listing,
    /// Project pages, one detail record per file
    Detail,
}

/// `.html` files directly under `dir`, sorted by name.
pub fn html_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "html"))
        .collect();
    if files.is_empty() {
        bail!("No HTML files found in {}", dir.display());
    }
    files.sort();
    Ok(files)
}

fn read_page(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(html) => Some(html),
        Err(e) => {
            warn!("Error reading {}: {}", path.display(), e);
            None
        }
    }
}

/// Summaries from every saved gallery page, in file-name order.
pub fn parse_listings(dir: &Path, origin: &str) -> Result<Vec<ProjectSummary>> {
    let files = html_files(dir)?;
    let per_file: Vec<Vec<ProjectSummary>> = files
        .par_iter()
        .map(|path| {
            read_page(path)
                .map(|html| listing::extract(&html, origin))
                .unwrap_or_default()
        })
        .collect();

    let projects: Vec<ProjectSummary> = per_file.into_iter().flatten().collect();
    info!("Parsed {} projects from {} files", projects.len(), files.len());
    Ok(projects)
}

/// One detail record per saved project page. Pages without project markup
/// are skipped.
pub fn parse_details(dir: &Path) -> Result<Vec<SavedDetail>> {
    let files = html_files(dir)?;
    let details: Vec<SavedDetail> = files
        .par_iter()
        .filter_map(|path| {
            let html = read_page(path)?;
            match detail::extract(&html) {
                Ok(detail) => Some(SavedDetail {
                    source_file: path.display().to_string(),
                    detail,
                }),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect();

    info!("Parsed {} of {} project pages", details.len(), files.len());
    Ok(details)
}
