use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::{has_class, non_empty, sel, text_of};
use crate::fetch::absolutize;
use crate::model::{ProjectSummary, TeamMember};

static ENTRY: LazyLock<Selector> = LazyLock::new(|| sel("div.software-entry"));
static NAME: LazyLock<Selector> = LazyLock::new(|| sel("h5"));
static TAGLINE: LazyLock<Selector> = LazyLock::new(|| sel("p.tagline"));
static THUMBNAIL: LazyLock<Selector> = LazyLock::new(|| sel("img.software_thumbnail_image"));
static MEMBER: LazyLock<Selector> = LazyLock::new(|| sel("span.user-profile-link"));
static IMG: LazyLock<Selector> = LazyLock::new(|| sel("img"));
static LIKES: LazyLock<Selector> = LazyLock::new(|| sel(".counts .like-count"));
static COMMENTS: LazyLock<Selector> = LazyLock::new(|| sel(".counts .comment-count"));
static SOFTWARE_LINK: LazyLock<Selector> = LazyLock::new(|| sel("a.link-to-software"));

/// Project summaries on one gallery page, in page order.
pub fn extract(html: &str, origin: &str) -> Vec<ProjectSummary> {
    let doc = Html::parse_document(html);
    doc.select(&ENTRY)
        .filter_map(|entry| summary(entry, origin))
        .collect()
}

fn summary(entry: ElementRef, origin: &str) -> Option<ProjectSummary> {
    let name = entry.select(&NAME).next().map(text_of).and_then(non_empty)?;

    let tagline = entry.select(&TAGLINE).next().map(text_of).and_then(non_empty);

    let url = entry
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "a" && has_class(*a, "block-wrapper-link"))
        .and_then(|a| a.value().attr("href"))
        .map(|href| absolutize(origin, href));

    let thumbnail_url = entry
        .select(&THUMBNAIL)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);

    let team_members = entry
        .select(&MEMBER)
        .filter_map(|span| {
            let img = span.select(&IMG).next()?;
            Some(TeamMember {
                name: img.value().attr("alt")?.trim().to_string(),
                profile_url: span.value().attr("data-url").map(str::to_string),
                avatar_url: img.value().attr("src").map(str::to_string),
            })
        })
        .collect();

    Some(ProjectSummary {
        name,
        tagline,
        url,
        thumbnail_url,
        team_members,
        likes: count(entry, &LIKES),
        comments: count(entry, &COMMENTS),
        detail: None,
    })
}

fn count(entry: ElementRef, selector: &Selector) -> u32 {
    entry
        .select(selector)
        .next()
        .map(text_of)
        .and_then(|t| t.replace(',', "").parse().ok())
        .unwrap_or(0)
}

/// Project page links on one gallery page; empty once pagination runs out.
pub fn extract_links(html: &str, origin: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&SOFTWARE_LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.is_empty())
        .map(|href| absolutize(origin, href))
        .collect()
}
