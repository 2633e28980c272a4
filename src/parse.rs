use std::ops::Deref;

use scraper::{ElementRef, Html, Node, Selector};
use tokio::task::spawn_blocking;
use tracing::{debug, info};
use url::Url;

use crate::model::{AdjectiveMapping, AnimalRef};
use crate::{Error, Result, WIKI_URL};

const ANIMAL_HEADER: &str = "animal";
const ADJECTIVE_HEADER: &str = "collateral adjective";
/// The adjectives table is the second `wikitable` on the page.
const TABLE_INDEX: usize = 1;

/// Parses the adjectives table off the blocking pool.
/// `page_url` is used to make the animal links absolute.
pub async fn parse_adjective_table(html: String, page_url: Option<String>) -> Result<AdjectiveMapping> {
    let mapping = spawn_blocking(move || {
        parse_adjective_html(&html, page_url.as_deref().unwrap_or(WIKI_URL))
    })
    .await??;

    info!(
        adjectives = mapping.len(),
        animals = mapping.unique_animals().len(),
        "Parsed adjective table"
    );
    Ok(mapping)
}

/// Extracts the adjective → animals mapping from the article HTML.
///
/// Rows that are too short are skipped. An animal cell may list several adjectives,
/// separated by commas or `<br>`; footnote markers are dropped.
pub fn parse_adjective_html(html: &str, page_url: &str) -> Result<AdjectiveMapping> {
    let doc = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let table_selector = create_selector("table.wikitable")?;
    let header_selector = create_selector("th")?;
    let row_selector = create_selector("tr")?;
    let cell_selector = create_selector("td, th")?;
    let link_selector = create_selector("a[href]")?;

    let table = doc.select(&table_selector).nth(TABLE_INDEX).ok_or_else(|| {
        Error::Extraction("couldn't find the table with collateral adjectives".into())
    })?;

    let headers: Vec<String> = table
        .select(&header_selector)
        .map(|th| th.text().collect::<String>().trim().to_lowercase())
        .collect();
    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            Error::Extraction(format!(
                "couldn't find the '{name}' column. Found headers: {headers:?}"
            ))
        })
    };
    let name_idx = column(ANIMAL_HEADER)?;
    let adjective_idx = column(ADJECTIVE_HEADER)?;

    let mut mapping = AdjectiveMapping::new();
    for (row_num, row) in table.select(&row_selector).enumerate().skip(1) {
        let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
        if cells.len() <= name_idx.max(adjective_idx) {
            debug!(row = row_num, cols = cells.len(), "Skipping short row");
            continue;
        }

        let name_cell = cells[name_idx];
        let link = name_cell.select(&link_selector).next();
        let wiki_url = link
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| match &base {
                Some(base) => base.join(href).ok().map(String::from),
                None => Some(href.to_string()),
            });
        let name_text: String = link.unwrap_or(name_cell).text().collect();
        let name = strip_qualifier(name_text.trim());
        if name.is_empty() {
            continue;
        }

        for adjective in parse_cell_text(cells[adjective_idx]) {
            mapping.push(
                adjective.to_lowercase(),
                AnimalRef::new(name, wiki_url.clone()),
            );
        }
    }

    Ok(mapping)
}

/// "Cattle (list)" → "Cattle".
fn strip_qualifier(name: &str) -> &str {
    name.split(" (").next().unwrap_or(name).trim()
}

/// Splits a cell into its entries, ignoring `<sup>` footnotes.
///
/// Every direct child of the cell is its own chunk: a text node, or the full text of an
/// element. Chunks are then split on commas. A `<br>` never joins text across it.
pub fn parse_cell_text(cell: ElementRef) -> Vec<String> {
    let mut chunks = Vec::new();
    for child in cell.children() {
        match child.value() {
            Node::Text(text) => chunks.push(text.deref().to_string()),
            Node::Element(elem) if matches!(elem.name(), "sup" | "br") => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    let mut pending = String::new();
                    collect_text(child, &mut pending, &mut chunks);
                    chunks.push(pending);
                }
            }
            _ => {}
        }
    }

    chunks
        .iter()
        .flat_map(|chunk| chunk.split(','))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Text of `element` and its descendants, minus footnotes. Nested `<br>`s close a chunk.
fn collect_text(element: ElementRef, pending: &mut String, chunks: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => pending.push_str(text.deref()),
            Node::Element(elem) => match elem.name() {
                "sup" => {}
                "br" => chunks.push(std::mem::take(pending)),
                _ => {
                    if let Some(child) = ElementRef::wrap(child) {
                        collect_text(child, pending, chunks);
                    }
                }
            },
            _ => {}
        }
    }
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}
