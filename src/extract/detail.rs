//! Detail-page extraction
//!
//! Detail pages are messier than listings: the article body can live under
//! several container shapes depending on the skin. Candidate containers are
//! scored by text length and the best one supplies the body text and image
//! references, mirroring how the listing side works from loose candidates.

use crate::extract::list::{cell_text, numeric_cell, selector};
use crate::extract::time::parse_full_timestamp;
use crate::extract::{Counters, Extract, ExtractError, ItemDetail, ItemSummary};
use scraper::{ElementRef, Html};
use url::Url;

const TITLE_CANDIDATES: &[&str] = &["h3.title", "h2.title", "div.title", "h3", "h2"];
const AUTHOR_CANDIDATES: &[&str] = &["span.author", "div.author", "td.author"];
const DATE_CANDIDATES: &[&str] = &["span.date", "div.date", "time"];
const BODY_CANDIDATES: &[&str] = &["div.article-body", "div.view-content", "article", "div#content"];

/// Maximum body text kept when falling back to whole-document text
const FALLBACK_BODY_CHARS: usize = 5000;

/// Board-style extractor for list and detail pages
///
/// Holds only the base URL used to absolutize relative links; parsing itself
/// is stateless.
pub struct BoardExtract {
    base: Url,
}

impl BoardExtract {
    pub fn new(base: Url) -> Self {
        Self { base }
    }
}

impl Extract for BoardExtract {
    fn parse_list(&self, body: &str) -> Result<Vec<ItemSummary>, ExtractError> {
        crate::extract::list::parse_list_page(body, &self.base)
    }

    fn parse_detail(&self, body: &str) -> Result<ItemDetail, ExtractError> {
        parse_detail_page(body, &self.base)
    }
}

pub(crate) fn parse_detail_page(html: &str, base: &Url) -> Result<ItemDetail, ExtractError> {
    let document = Html::parse_document(html);

    let title = first_candidate_text(&document, TITLE_CANDIDATES)?;
    let (author, author_handle) = match first_candidate_text(&document, AUTHOR_CANDIDATES)? {
        Some(text) => split_author(&text),
        None => (None, None),
    };
    let created_at = first_candidate_text(&document, DATE_CANDIDATES)?
        .as_deref()
        .and_then(parse_full_timestamp);

    let counters = Counters {
        views: counter(&document, "span.views")?,
        upvotes: counter(&document, "span.upvotes")?,
        downvotes: counter(&document, "span.downvotes")?,
        comments: counter(&document, "span.comment-count")?,
    };

    let (body_text, media_refs) = extract_body_and_media(&document, base)?;

    Ok(ItemDetail {
        title,
        author,
        author_handle,
        created_at,
        counters,
        body_text,
        media_refs,
    })
}

/// Returns the first non-empty text among the selector candidates
fn first_candidate_text(
    document: &Html,
    candidates: &[&str],
) -> Result<Option<String>, ExtractError> {
    for candidate in candidates {
        let sel = selector(candidate)?;
        if let Some(text) = document.select(&sel).next().map(cell_text) {
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }
    Ok(None)
}

fn counter(document: &Html, source: &str) -> Result<Option<i64>, ExtractError> {
    let sel = selector(source)?;
    Ok(document
        .select(&sel)
        .next()
        .and_then(|element| numeric_cell(&element)))
}

/// Splits an author label like `nick (10.0.0.1)` into name and handle
fn split_author(text: &str) -> (Option<String>, Option<String>) {
    if let Some((name, rest)) = text.split_once('(') {
        let handle = rest.trim_end_matches(')').trim();
        let name = name.trim();
        return (
            (!name.is_empty()).then(|| name.to_string()),
            (!handle.is_empty()).then(|| handle.to_string()),
        );
    }
    let name = text.trim();
    ((!name.is_empty()).then(|| name.to_string()), None)
}

/// Picks the body container with the most text and pulls its images
///
/// When no candidate matches, the whole document's text (truncated) and all
/// of its images are used instead, so a reskinned page still yields data.
fn extract_body_and_media(
    document: &Html,
    base: &Url,
) -> Result<(Option<String>, Vec<String>), ExtractError> {
    let img_sel = selector("img[src]")?;

    let mut best: Option<(usize, ElementRef)> = None;
    for candidate in BODY_CANDIDATES {
        let sel = selector(candidate)?;
        for element in document.select(&sel) {
            let len: usize = element.text().map(str::len).sum();
            if best.map_or(true, |(best_len, _)| len > best_len) {
                best = Some((len, element));
            }
        }
    }

    if let Some((_, element)) = best {
        let text = normalize_text(element.text());
        let media = element
            .select(&img_sel)
            .filter_map(|img| img.value().attr("src"))
            .filter_map(|src| base.join(src).ok())
            .map(|url| url.to_string())
            .collect();
        return Ok(((!text.is_empty()).then_some(text), media));
    }

    let text: String = normalize_text(document.root_element().text())
        .chars()
        .take(FALLBACK_BODY_CHARS)
        .collect();
    let media = document
        .root_element()
        .select(&img_sel)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| base.join(src).ok())
        .map(|url| url.to_string())
        .collect();
    Ok(((!text.is_empty()).then_some(text), media))
}

fn normalize_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
