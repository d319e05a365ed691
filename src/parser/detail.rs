use std::sync::LazyLock;

use anyhow::{bail, Result};
use scraper::{ElementRef, Html, Selector};

use super::{collapse_ws, inside_any, non_empty, sel, text_of};
use crate::model::{DetailedMember, Link, ProjectContent, ProjectDetail, Submission};

static TITLE: LazyLock<Selector> = LazyLock::new(|| sel("#app-title, h1.software-title"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| sel("#app-details-left, div.software-description"));
static BODY_TEXT: LazyLock<Selector> = LazyLock::new(|| sel("h1, h2, h3, p"));
static TECH: LazyLock<Selector> = LazyLock::new(|| sel("#built-with span.cp-tag"));
static TRY_IT: LazyLock<Selector> = LazyLock::new(|| sel("#try-it-out a[href]"));
static TEAM: LazyLock<Selector> = LazyLock::new(|| sel("#app-team li.software-team-member"));
static PROFILE: LazyLock<Selector> = LazyLock::new(|| sel("a.user-profile-link"));
static IMG: LazyLock<Selector> = LazyLock::new(|| sel("img"));
static BIO: LazyLock<Selector> = LazyLock::new(|| sel(".bubble, .software-member-role"));
static SUBMISSION: LazyLock<Selector> =
    LazyLock::new(|| sel("#submissions .software-list-content"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| sel("a[href]"));
static LI: LazyLock<Selector> = LazyLock::new(|| sel("li"));
static WINNER: LazyLock<Selector> = LazyLock::new(|| sel(".winner"));

/// Sections of the details column that are extracted on their own.
const NON_DESCRIPTION: &[&str] = &["built-with", "app-team", "submissions", "try-it-out", "gallery"];

/// Rich fields of a project page.
///
/// A page with neither a title nor a description does not have the expected
/// markup and is rejected.
pub fn extract(html: &str) -> Result<ProjectDetail> {
    let doc = Html::parse_document(html);

    let title = title(&doc);
    let full_description = description(&doc);
    if title.is_none() && full_description.is_none() {
        bail!("no project title or description in page");
    }

    let technologies = doc
        .select(&TECH)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();

    let links = doc
        .select(&TRY_IT)
        .filter_map(|a| {
            Some(Link {
                text: text_of(a),
                url: a.value().attr("href")?.to_string(),
            })
        })
        .collect();

    Ok(ProjectDetail {
        title,
        full_description,
        technologies,
        links,
        team_members_detailed: doc.select(&TEAM).filter_map(member).collect(),
        hackathon_submissions: doc.select(&SUBMISSION).filter_map(submission).collect(),
    })
}

/// Title and body text only, keyed by the page URL.
pub fn extract_content(html: &str, url: &str) -> Option<ProjectContent> {
    let doc = Html::parse_document(html);
    Some(ProjectContent {
        title: title(&doc)?,
        link: url.to_string(),
        text: description(&doc).unwrap_or_default(),
        matched_prize: None,
    })
}

fn title(doc: &Html) -> Option<String> {
    doc.select(&TITLE).next().map(text_of).and_then(non_empty)
}

fn description(doc: &Html) -> Option<String> {
    let body = doc.select(&BODY).next()?;
    let parts: Vec<String> = body
        .select(&BODY_TEXT)
        .filter(|el| !inside_any(*el, NON_DESCRIPTION))
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();
    non_empty(parts.join(" "))
}

fn member(li: ElementRef) -> Option<DetailedMember> {
    let profiles: Vec<ElementRef> = li.select(&PROFILE).collect();

    // The avatar link carries no text; the name link does.
    let name = profiles
        .iter()
        .map(|a| text_of(*a))
        .find(|t| !t.is_empty())
        .or_else(|| {
            li.select(&IMG)
                .next()
                .and_then(|img| img.value().attr("alt"))
                .map(collapse_ws)
        })
        .and_then(non_empty)?;

    let profile_url = profiles
        .first()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);

    let bio = li.select(&BIO).next().map(text_of).and_then(non_empty);

    Some(DetailedMember {
        name,
        profile_url,
        bio,
    })
}

fn submission(content: ElementRef) -> Option<Submission> {
    let anchor = content.select(&ANCHOR).next()?;
    let name = non_empty(text_of(anchor))?;

    let prizes = content
        .select(&LI)
        .filter(|li| li.select(&WINNER).next().is_some())
        .map(|li| {
            let text = text_of(li);
            text.strip_prefix("Winner").unwrap_or(&text).trim().to_string()
        })
        .filter(|p| !p.is_empty())
        .collect();

    Some(Submission {
        name,
        url: anchor.value().attr("href").map(str::to_string),
        prizes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::fixture;

    #[test]
    fn project_page() {
        let d = extract(&fixture("project")).unwrap();
        assert_eq!(d.title.as_deref(), Some("Moodboard"));
        assert_eq!(d.technologies, vec!["rust", "react", "openai"]);
        assert_eq!(d.links.len(), 2);
        assert_eq!(d.links[0].url, "https://github.com/adapark/moodboard");
    }

    #[test]
    fn description_skips_side_sections() {
        let d = extract(&fixture("project")).unwrap();
        let text = d.full_description.unwrap();
        assert!(text.starts_with("Inspiration"));
        assert!(text.contains("mental health"));
        assert!(!text.contains("Ada Park"), "team leaked into description: {}", text);
        assert!(!text.contains("Seed Hackathon"), "submissions leaked: {}", text);
    }

    #[test]
    fn team_with_bios() {
        let d = extract(&fixture("project")).unwrap();
        let names: Vec<&str> = d.team_members_detailed.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Ada Park", "Lin Osei"]);
        assert_eq!(
            d.team_members_detailed[0].profile_url.as_deref(),
            Some("https://devpost.com/adapark")
        );
        assert_eq!(d.team_members_detailed[0].bio.as_deref(), Some("Built the audio pipeline"));
        assert!(d.team_members_detailed[1].bio.is_none());
    }

    #[test]
    fn submissions_and_prizes() {
        let d = extract(&fixture("project")).unwrap();
        assert_eq!(d.hackathon_submissions.len(), 2);
        let seed = &d.hackathon_submissions[0];
        assert_eq!(seed.name, "Seed Hackathon");
        assert_eq!(seed.prizes, vec!["Best Mental Health Hack"]);
        assert!(d.hackathon_submissions[1].prizes.is_empty());
    }

    #[test]
    fn unrelated_markup_is_rejected() {
        assert!(extract("<html><body><div>Sign in</div></body></html>").is_err());
    }

    #[test]
    fn content_record() {
        let c = extract_content(&fixture("project"), "https://devpost.com/software/moodboard").unwrap();
        assert_eq!(c.title, "Moodboard");
        assert_eq!(c.link, "https://devpost.com/software/moodboard");
        assert!(c.text.contains("What it does"));
        assert!(!c.is_matched());
    }
}
