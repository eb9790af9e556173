//! List-page extraction
//!
//! Board listings render as a table of rows, one item per row. Markup varies
//! between skins, so extraction works from loose selector candidates rather
//! than one rigid shape: the title anchor is preferred, any anchor in the
//! row is the fallback, and trailing numeric cells are read as counters.

use crate::extract::{Counters, ExtractError, ItemSummary};
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub(crate) fn parse_list_page(html: &str, base: &Url) -> Result<Vec<ItemSummary>, ExtractError> {
    let document = Html::parse_document(html);

    let table_sel = selector("table.board-list")?;
    let Some(table) = document.select(&table_sel).next() else {
        return Err(ExtractError::Malformed("board list table not found".into()));
    };

    let row_sel = selector("tbody tr")?;
    let title_sel = selector("td.title a[href]")?;
    let anchor_sel = selector("a[href]")?;
    let author_sel = selector("td.author")?;
    let date_sel = selector("td.date")?;
    let cell_sel = selector("td")?;

    let mut items = Vec::new();
    for row in table.select(&row_sel) {
        // Pinned notices repeat on every page and carry no stable id
        if row.value().classes().any(|class| class == "notice") {
            continue;
        }

        let Some(anchor) = row
            .select(&title_sel)
            .next()
            .or_else(|| row.select(&anchor_sel).next())
        else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(detail_url) = base.join(href) else {
            continue;
        };
        let Some(external_id) = external_id_from_url(&detail_url) else {
            continue;
        };

        let title = cell_text(anchor);
        if title.is_empty() {
            continue;
        }

        let author_label = row
            .select(&author_sel)
            .next()
            .map(cell_text)
            .filter(|text| !text.is_empty());
        let timestamp_text = row
            .select(&date_sel)
            .next()
            .map(cell_text)
            .filter(|text| !text.is_empty());

        // Listings put view and vote counts in the last two cells
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        let mut counters = Counters::default();
        if cells.len() >= 6 {
            counters.views = numeric_cell(&cells[cells.len() - 2]);
            counters.upvotes = numeric_cell(&cells[cells.len() - 1]);
        }

        items.push(ItemSummary {
            external_id,
            detail_url: detail_url.to_string(),
            title,
            author_label,
            timestamp_text,
            counters,
        });
    }

    Ok(items)
}

/// Pulls the source-assigned item id out of a detail URL
///
/// Prefers the `no` query parameter; falls back to a purely numeric final
/// path segment.
pub(crate) fn external_id_from_url(url: &Url) -> Option<i64> {
    if let Some((_, value)) = url.query_pairs().find(|(key, _)| key == "no") {
        if let Ok(id) = value.parse() {
            return Some(id);
        }
    }

    url.path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())?
        .parse()
        .ok()
}

pub(crate) fn selector(source: &str) -> Result<Selector, ExtractError> {
    Selector::parse(source).map_err(|_| ExtractError::Selector(source.to_string()))
}

pub(crate) fn cell_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub(crate) fn numeric_cell(element: &ElementRef) -> Option<i64> {
    let digits: String = element
        .text()
        .collect::<String>()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/board/lists/?page=1").unwrap()
    }

    fn row(id: i64, title: &str) -> String {
        format!(
            r#"<tr><td class="num">{id}</td><td class="title"><a href="/board/view/?no={id}">{title}</a></td><td class="author">tester</td><td class="date">2026.08.05 12:00</td><td class="views">1,234</td><td class="votes">5</td></tr>"#
        )
    }

    fn page(rows: &str) -> String {
        format!(r#"<html><body><table class="board-list"><tbody>{rows}</tbody></table></body></html>"#)
    }

    #[test]
    fn test_parse_rows_in_source_order() {
        let html = page(&format!("{}{}{}", row(3, "c"), row(5, "a"), row(4, "b")));
        let items = parse_list_page(&html, &base()).unwrap();

        let ids: Vec<i64> = items.iter().map(|item| item.external_id).collect();
        assert_eq!(ids, vec![3, 5, 4]);
    }

    #[test]
    fn test_parse_row_fields() {
        let html = page(&row(42, "Hello board"));
        let items = parse_list_page(&html, &base()).unwrap();

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.external_id, 42);
        assert_eq!(item.title, "Hello board");
        assert_eq!(item.detail_url, "https://example.com/board/view/?no=42");
        assert_eq!(item.author_label.as_deref(), Some("tester"));
        assert_eq!(item.timestamp_text.as_deref(), Some("2026.08.05 12:00"));
        assert_eq!(item.counters.views, Some(1234));
        assert_eq!(item.counters.upvotes, Some(5));
    }

    #[test]
    fn test_notice_rows_are_skipped() {
        let notice = r#"<tr class="notice"><td class="num">-</td><td class="title"><a href="/board/view/?no=999">Notice</a></td></tr>"#;
        let html = page(&format!("{}{}", notice, row(1, "real")));
        let items = parse_list_page(&html, &base()).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].external_id, 1);
    }

    #[test]
    fn test_rows_without_id_are_skipped() {
        let bogus = r#"<tr><td class="title"><a href="/board/about">About</a></td></tr>"#;
        let html = page(&format!("{}{}", bogus, row(1, "real")));
        let items = parse_list_page(&html, &base()).unwrap();

        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_fallback_anchor_when_no_title_cell() {
        let plain = r#"<tr><td><a href="/board/view/?no=7">bare</a></td></tr>"#;
        let html = page(plain);
        let items = parse_list_page(&html, &base()).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].external_id, 7);
        assert_eq!(items[0].counters, Counters::default());
    }

    #[test]
    fn test_empty_listing_is_not_an_error() {
        let html = page("");
        let items = parse_list_page(&html, &base()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_missing_table_is_malformed() {
        let html = "<html><body><p>gone away</p></body></html>";
        let result = parse_list_page(html, &base());
        assert!(matches!(result, Err(ExtractError::Malformed(_))));
    }

    #[test]
    fn test_external_id_from_query_param() {
        let url = Url::parse("https://example.com/board/view/?id=x&no=123").unwrap();
        assert_eq!(external_id_from_url(&url), Some(123));
    }

    #[test]
    fn test_external_id_from_path_segment() {
        let url = Url::parse("https://example.com/posts/4567/").unwrap();
        assert_eq!(external_id_from_url(&url), Some(4567));
    }

    #[test]
    fn test_external_id_missing() {
        let url = Url::parse("https://example.com/about").unwrap();
        assert_eq!(external_id_from_url(&url), None);
    }
}
