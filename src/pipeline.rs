use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::fetch::PageFetcher;
use crate::model::{ProjectContent, ProjectDetail, ProjectSummary};
use crate::parser::detail;

/// Upper bound on the pool width, whatever was configured.
pub const MAX_WORKERS: usize = 256;

/// Outcome of one enrichment run. `summaries` is the input, in input order,
/// with details merged into the records whose fetch succeeded.
pub struct MergeReport {
    pub summaries: Vec<ProjectSummary>,
    pub total: usize,
    pub enriched: usize,
    pub failed: usize,
}

/// Fetch every summary's project page with at most `workers` in flight and
/// fold each detail back into the summary it came from.
///
/// A failed fetch or extraction is logged and leaves its summary as it was;
/// the run always waits for every task.
pub async fn enrich<F>(
    fetcher: Arc<F>,
    mut summaries: Vec<ProjectSummary>,
    workers: usize,
) -> MergeReport
where
    F: PageFetcher + ?Sized + 'static,
{
    let jobs: Vec<(usize, String)> = summaries
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.url.clone().map(|u| (i, u)))
        .collect();
    let total = jobs.len();
    let workers = workers.clamp(1, MAX_WORKERS);

    let pb = progress_bar(total);
    let semaphore = Arc::new(Semaphore::new(workers));
    let (tx, mut rx) = mpsc::channel::<(usize, Option<ProjectDetail>)>(workers * 2);

    for (idx, url) in jobs {
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let detail = match fetch_detail(fetcher.as_ref(), &url).await {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!("Detail fetch failed for {}: {:#}", url, e);
                    None
                }
            };
            let _ = tx.send((idx, detail)).await;
        });
    }

    // rx closes once every task has sent (or died) and dropped its sender
    drop(tx);

    let mut enriched = 0usize;
    while let Some((idx, detail)) = rx.recv().await {
        if let Some(detail) = detail {
            summaries[idx].detail = Some(detail);
            enriched += 1;
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    let failed = total - enriched;
    info!("Enriched {} of {} projects ({} failed)", enriched, total, failed);

    MergeReport {
        summaries,
        total,
        enriched,
        failed,
    }
}

async fn fetch_detail<F>(fetcher: &F, url: &str) -> anyhow::Result<ProjectDetail>
where
    F: PageFetcher + ?Sized,
{
    let html = fetcher.fetch(url).await?;
    detail::extract(&html)
}

/// Title + body text for each link, fetched on the same bounded pool.
/// Links that fail are dropped; the rest keep input order.
pub async fn collect_content<F>(
    fetcher: Arc<F>,
    links: Vec<String>,
    workers: usize,
) -> Vec<ProjectContent>
where
    F: PageFetcher + ?Sized + 'static,
{
    let total = links.len();
    let workers = workers.clamp(1, MAX_WORKERS);
    let pb = progress_bar(total);
    let semaphore = Arc::new(Semaphore::new(workers));
    let (tx, mut rx) = mpsc::channel::<(usize, Option<ProjectContent>)>(workers * 2);

    for (idx, url) in links.into_iter().enumerate() {
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let content = match fetcher.fetch(&url).await {
                Ok(html) => {
                    let c = detail::extract_content(&html, &url);
                    if c.is_none() {
                        warn!("No project title on {}", url);
                    }
                    c
                }
                Err(e) => {
                    warn!("Error scraping {}: {}", url, e);
                    None
                }
            };
            let _ = tx.send((idx, content)).await;
        });
    }
    drop(tx);

    let mut slots: Vec<Option<ProjectContent>> = vec![None; total];
    while let Some((idx, content)) = rx.recv().await {
        slots[idx] = content;
        pb.inc(1);
    }
    pb.finish_and_clear();

    let out: Vec<ProjectContent> = slots.into_iter().flatten().collect();
    info!("Scraped {} of {} project pages", out.len(), total);
    out
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}
