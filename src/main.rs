mod browser;
mod fetch;
mod gallery;
mod matcher;
mod model;
mod offline;
mod parser;
mod pipeline;
mod prize;
mod settings;
mod store;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rayon::prelude::*;

use browser::BrowserSession;
use fetch::{FetchMode, HttpFetcher, PageFetcher, SnapshotFetcher};
use model::{ProjectContent, ProjectMatches, ProjectSummary, TrackSheet};
use offline::PageKind;
use settings::Settings;

#[derive(Parser)]
#[command(name = "gallery_scraper", about = "Hackathon gallery scraper and prize matcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Also keep every fetched page as raw HTML under this directory
    #[arg(long, global = true)]
    save_html: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect project links from every gallery page
    Links {
        /// Gallery URL (e.g. https://<hackathon>.devpost.com/project-gallery)
        url: String,
        /// Max gallery pages to walk (default: until an empty page)
        #[arg(short = 'n', long)]
        pages: Option<usize>,
        /// Render pages in a WebDriver browser instead of plain HTTP
        #[arg(long)]
        browser: bool,
        #[arg(short, long, default_value = store::LINKS_PATH)]
        output: PathBuf,
    },
    /// Parse project summaries from every gallery page
    Gallery {
        url: String,
        #[arg(short = 'n', long)]
        pages: Option<usize>,
        #[arg(long)]
        browser: bool,
        #[arg(short, long, default_value = store::PROJECTS_PATH)]
        output: PathBuf,
    },
    /// Fetch each project's page and merge its details into the summary
    Details {
        #[arg(short, long, default_value = store::PROJECTS_PATH)]
        input: PathBuf,
        #[arg(short, long, default_value = store::DETAILS_PATH)]
        output: PathBuf,
        /// Concurrent fetches (default: from settings)
        #[arg(short, long)]
        workers: Option<usize>,
        #[arg(long)]
        browser: bool,
    },
    /// Scrape title and body text of every linked project
    Content {
        #[arg(short, long, default_value = store::LINKS_PATH)]
        links: PathBuf,
        #[arg(short, long, default_value = store::CONTENT_PATH)]
        output: PathBuf,
        #[arg(short, long)]
        workers: Option<usize>,
        #[arg(long)]
        browser: bool,
    },
    /// Extract prize tracks from a hackathon landing page
    Tracks {
        url: String,
        #[arg(long)]
        browser: bool,
        #[arg(short, long, default_value = store::TRACKS_PATH)]
        output: PathBuf,
    },
    /// Extract the prize list from a gallery's filter panel
    Prizes {
        url: String,
        #[arg(long)]
        browser: bool,
        #[arg(short, long, default_value = store::PRIZES_PATH)]
        output: PathBuf,
    },
    /// Fuzzy-match enriched projects against prize tracks
    MatchTracks {
        #[arg(short, long, default_value = store::DETAILS_PATH)]
        projects: PathBuf,
        #[arg(short, long, default_value = store::TRACKS_PATH)]
        tracks: PathBuf,
        /// Minimum confidence, 0-100 (default: from settings)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: Option<u8>,
        #[arg(short, long, default_value = store::TRACK_MATCHES_PATH)]
        output: PathBuf,
    },
    /// Run the gallery or project extractor over saved HTML files
    Parse {
        /// Directory of saved .html pages
        dir: PathBuf,
        #[arg(short, long, value_enum, default_value = "detail")]
        kind: PageKind,
        /// Output file (default: projects.json for listings, parsed_projects.json for details)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Ask a language model which prize each project fits (updates the file in place)
    MatchPrizes {
        #[arg(short, long, default_value = store::CONTENT_PATH)]
        projects: PathBuf,
        #[arg(long, default_value = store::PRIZES_PATH)]
        prizes: PathBuf,
        /// Skip projects that already carry a result
        #[arg(long)]
        resume: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    let origin = settings.site_origin.as_str();
    let save_html = cli.save_html.as_deref();

    let result = match cli.command {
        Commands::Links { url, pages, browser, output } => {
            let links = with_fetcher(&settings, FetchMode::from_flag(browser), save_html, |fetcher| async move {
                anyhow::Ok(gallery::collect_links(fetcher.as_ref(), &url, origin, pages).await)
            })
            .await?;
            store::write_json(&output, &links)?;
            println!("Saved {} links to {}", links.len(), output.display());
            Ok(())
        }
        Commands::Gallery { url, pages, browser, output } => {
            let projects = with_fetcher(&settings, FetchMode::from_flag(browser), save_html, |fetcher| async move {
                anyhow::Ok(gallery::collect_summaries(fetcher.as_ref(), &url, origin, pages).await)
            })
            .await?;
            store::write_json(&output, &projects)?;
            println!("Saved {} projects to {}", projects.len(), output.display());
            Ok(())
        }
        Commands::Details { input, output, workers, browser } => {
            let summaries: Vec<ProjectSummary> = store::read_json(&input)?;
            if summaries.is_empty() {
                println!("No projects in {}. Run 'gallery' first.", input.display());
                return Ok(());
            }
            let workers = workers.unwrap_or_else(|| settings.workers());
            println!("Fetching details for {} projects ({} workers)...", summaries.len(), workers);

            let report = with_fetcher(&settings, FetchMode::from_flag(browser), save_html, |fetcher| async move {
                anyhow::Ok(pipeline::enrich(fetcher, summaries, workers).await)
            })
            .await?;
            store::write_json(&output, &report.summaries)?;
            println!(
                "Done: {} fetched ({} ok, {} errors).",
                report.total, report.enriched, report.failed
            );
            Ok(())
        }
        Commands::Content { links, output, workers, browser } => {
            let urls: Vec<String> = store::read_json(&links)?;
            if urls.is_empty() {
                println!("No links in {}. Run 'links' first.", links.display());
                return Ok(());
            }
            let total = urls.len();
            let workers = workers.unwrap_or_else(|| settings.workers());

            let content = with_fetcher(&settings, FetchMode::from_flag(browser), save_html, |fetcher| async move {
                anyhow::Ok(pipeline::collect_content(fetcher, urls, workers).await)
            })
            .await?;
            store::write_json(&output, &content)?;
            println!(
                "Done: {} scraped ({} ok, {} errors).",
                total,
                content.len(),
                total - content.len()
            );
            Ok(())
        }
        Commands::Tracks { url, browser, output } => {
            let sheet = with_fetcher(&settings, FetchMode::from_flag(browser), save_html, |fetcher| async move {
                gallery::fetch_tracks(fetcher.as_ref(), &url).await
            })
            .await?;
            store::write_json(&output, &sheet)?;
            println!("Saved {} tracks to {}", sheet.tracks.len(), output.display());
            for t in &sheet.tracks {
                match t.prize_amount {
                    Some(amount) => println!("  {} (${})", truncate(&t.name, 60), amount),
                    None => println!("  {}", truncate(&t.name, 60)),
                }
            }
            Ok(())
        }
        Commands::Prizes { url, browser, output } => {
            let prizes = with_fetcher(&settings, FetchMode::from_flag(browser), save_html, |fetcher| async move {
                gallery::fetch_prize_labels(fetcher.as_ref(), &url).await
            })
            .await?;
            store::write_json(&output, &prizes)?;
            println!("Saved {} prizes to {}", prizes.len(), output.display());
            Ok(())
        }
        Commands::MatchTracks { projects, tracks, threshold, output } => {
            let summaries: Vec<ProjectSummary> = store::read_json(&projects)?;
            let sheet: TrackSheet = store::read_json(&tracks)?;
            let threshold = threshold.unwrap_or_else(|| settings.threshold());
            let matcher = matcher::Matcher::new(&sheet.tracks, threshold);

            let results: Vec<ProjectMatches> = summaries
                .par_iter()
                .map(|s| ProjectMatches {
                    name: s.name.clone(),
                    url: s.url.clone(),
                    matches: matcher.match_text(&s.match_text()),
                })
                .collect();

            let with_match = results.iter().filter(|r| !r.matches.is_empty()).count();
            store::write_json(&output, &results)?;
            println!(
                "Matched {} of {} projects against {} tracks (threshold {}).",
                with_match,
                results.len(),
                sheet.tracks.len(),
                threshold
            );
            Ok(())
        }
        Commands::Parse { dir, kind, output } => {
            match kind {
                PageKind::Listing => {
                    let output = output.unwrap_or_else(|| PathBuf::from(store::PROJECTS_PATH));
                    let projects = offline::parse_listings(&dir, origin)?;
                    store::write_json(&output, &projects)?;
                    println!("Saved {} projects to {}", projects.len(), output.display());
                }
                PageKind::Detail => {
                    let output = output.unwrap_or_else(|| PathBuf::from(store::PARSED_PATH));
                    let details = offline::parse_details(&dir)?;
                    store::write_json(&output, &details)?;
                    println!("Saved {} parsed pages to {}", details.len(), output.display());
                }
            }
            Ok(())
        }
        Commands::MatchPrizes { projects, prizes, resume } => {
            let mut records: Vec<ProjectContent> = store::read_json(&projects)?;
            let prize_list: Vec<String> = store::read_json(&prizes)?;
            let client = prize::OpenAiClient::new(&settings, settings::api_key()?)?;

            println!(
                "Matching {} projects against {} prizes...",
                records.len(),
                prize_list.len()
            );
            let stats = prize::match_all(
                &client,
                &projects,
                &mut records,
                &prize_list,
                settings.request_delay(),
                resume,
            )
            .await?;
            println!(
                "Done: {} matched, {} no match, {} errors, {} skipped.",
                stats.matched, stats.no_match, stats.failed, stats.skipped
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Run `body` with the fetcher `mode` asks for, keeping raw snapshots when
/// `save_html` is set. A browser session lives exactly as long as the body.
async fn with_fetcher<T, F, Fut>(
    settings: &Settings,
    mode: FetchMode,
    save_html: Option<&Path>,
    body: F,
) -> Result<T>
where
    F: FnOnce(Arc<dyn PageFetcher>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let wrap = |fetcher: Arc<dyn PageFetcher>| -> Result<Arc<dyn PageFetcher>> {
        match save_html {
            Some(dir) => Ok(Arc::new(SnapshotFetcher::new(fetcher, dir)?)),
            None => Ok(fetcher),
        }
    };

    match mode {
        FetchMode::Http => {
            let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(settings)?);
            body(wrap(fetcher)?).await
        }
        FetchMode::Browser => {
            BrowserSession::scoped(settings, |session| async move {
                body(wrap(session as Arc<dyn PageFetcher>)?).await
            })
            .await
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
