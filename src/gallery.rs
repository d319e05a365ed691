use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::fetch::{page_url, PageFetcher};
use crate::model::{ProjectSummary, Track, TrackSheet};
use crate::parser::{listing, tracks};

/// Walk `{base}?page=1..` until a page has no projects (or `max_pages`).
///
/// A page that fails to load ends the walk; what was gathered so far is kept.
async fn paginate<F, T>(
    fetcher: &F,
    base_url: &str,
    max_pages: Option<usize>,
    extract: impl Fn(&str) -> Vec<T>,
) -> Vec<T>
where
    F: PageFetcher + ?Sized,
{
    let mut all = Vec::new();
    let mut page = 1;

    loop {
        if max_pages.is_some_and(|max| page > max) {
            break;
        }
        let url = page_url(base_url, page);
        let html = match fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Error on page {}: {}", page, e);
                break;
            }
        };

        let items = extract(&html);
        if items.is_empty() {
            break;
        }
        info!("Page {}: found {} entries", page, items.len());
        all.extend(items);
        page += 1;
    }

    all
}

/// Project page URLs across the whole gallery.
pub async fn collect_links<F>(
    fetcher: &F,
    base_url: &str,
    origin: &str,
    max_pages: Option<usize>,
) -> Vec<String>
where
    F: PageFetcher + ?Sized,
{
    let links = paginate(fetcher, base_url, max_pages, |html| {
        listing::extract_links(html, origin)
    })
    .await;
    info!("Total scraped: {} links", links.len());
    links
}

/// Project summaries across the whole gallery.
pub async fn collect_summaries<F>(
    fetcher: &F,
    base_url: &str,
    origin: &str,
    max_pages: Option<usize>,
) -> Vec<ProjectSummary>
where
    F: PageFetcher + ?Sized,
{
    let projects = paginate(fetcher, base_url, max_pages, |html| {
        listing::extract(html, origin)
    })
    .await;
    info!("Total parsed: {} projects", projects.len());
    projects
}

/// Prize tracks from a hackathon landing page.
pub async fn fetch_tracks<F>(fetcher: &F, hackathon_url: &str) -> Result<TrackSheet>
where
    F: PageFetcher + ?Sized,
{
    info!("Fetching hackathon page: {}", hackathon_url);
    let html = fetcher
        .fetch(hackathon_url)
        .await
        .context("Failed to fetch hackathon page")?;

    let tracks: Vec<Track> = tracks::extract(&html);
    info!("Found {} prize tracks", tracks.len());

    Ok(TrackSheet {
        hackathon_url: hackathon_url.to_string(),
        scraped_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        tracks,
    })
}

/// Prize names from a gallery's prize filter.
pub async fn fetch_prize_labels<F>(fetcher: &F, gallery_url: &str) -> Result<Vec<String>>
where
    F: PageFetcher + ?Sized,
{
    let html = fetcher
        .fetch(gallery_url)
        .await
        .context("Failed to fetch gallery page")?;
    Ok(tracks::extract_prize_labels(&html))
}
