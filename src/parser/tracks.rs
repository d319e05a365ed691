use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{collapse_ws, has_class, non_empty, sel, text_of};
use crate::model::Track;

static PARENS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$(\d[\d,]*)").unwrap());
static DOLLARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$[\d,]+").unwrap());

static HEADING: LazyLock<Selector> = LazyLock::new(|| sel("article#prizes h6"));
static PRIZE_TITLE: LazyLock<Selector> = LazyLock::new(|| sel(".prize-title"));
static P: LazyLock<Selector> = LazyLock::new(|| sel("p"));
static PRIZE_LABEL: LazyLock<Selector> = LazyLock::new(|| sel("ul.no-bullet li label"));

/// Prize tracks listed on a hackathon landing page.
pub fn extract(html: &str) -> Vec<Track> {
    let doc = Html::parse_document(html);
    doc.select(&HEADING)
        .filter_map(|h6| {
            let title = h6.select(&PRIZE_TITLE).next()?;
            let mut track = parse_heading(&text_of(title))?;
            track.description = prize_block(h6)
                .and_then(|block| block.select(&P).next())
                .map(text_of)
                .and_then(non_empty);
            Some(track)
        })
        .collect()
}

/// Split a prize heading into a clean name and dollar amount.
///
/// Parenthesised groups and `$N` amounts are removed from the name; the
/// heading is kept verbatim in `original_text`.
pub fn parse_heading(text: &str) -> Option<Track> {
    let original = collapse_ws(text);
    let without_parens = PARENS_RE.replace_all(&original, "");
    let name = collapse_ws(&DOLLARS_RE.replace_all(&without_parens, ""));
    if name.is_empty() {
        return None;
    }

    let prize_amount = AMOUNT_RE
        .captures(&original)
        .and_then(|c| c[1].replace(',', "").parse::<u64>().ok());

    Some(Track {
        name,
        original_text: original,
        prize_amount,
        description: None,
    })
}

fn prize_block(h6: ElementRef) -> Option<ElementRef> {
    h6.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div" && has_class(*el, "prize"))
}

/// Prize names from a gallery's prize filter list.
pub fn extract_prize_labels(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&PRIZE_LABEL)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect()
}
