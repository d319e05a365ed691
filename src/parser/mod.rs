pub mod detail;
pub mod listing;
pub mod tracks;

use scraper::{ElementRef, Selector};

/// Compile a CSS selector known at build time.
pub(crate) fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("bad selector {:?}: {:?}", css, e))
}

/// Element text with runs of whitespace collapsed to single spaces.
pub(crate) fn text_of(el: ElementRef) -> String {
    collapse_ws(&el.text().collect::<String>())
}

pub(crate) fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

pub(crate) fn has_class(el: ElementRef, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// True when `el` sits inside an element with one of the given ids.
pub(crate) fn inside_any(el: ElementRef, ids: &[&str]) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().id().is_some_and(|id| ids.contains(&id)))
}

#[cfg(test)]
pub(crate) fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn collapse() {
        assert_eq!(collapse_ws("  Best \n\t Use  of AI "), "Best Use of AI");
        assert_eq!(collapse_ws("   "), "");
    }

    #[test]
    fn inside_any_checks_ancestors() {
        let doc = Html::parse_fragment(r#"<div id="built-with"><p>rust</p></div><p>free</p>"#);
        let ps: Vec<_> = doc.select(&sel("p")).collect();
        assert!(inside_any(ps[0], &["built-with"]));
        assert!(!inside_any(ps[1], &["built-with"]));
    }
}
