use std::sync::Arc;

use chrono::Utc;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::errors::{CrawlerError, Error, ErrorKind};
use crate::module::base::ResponseParser;
use crate::module::data::{Data, Item, Request, Response};

/// Parser emitting a request for every `<a href>` on an HTML page
pub fn link_parser() -> ResponseParser {
    Arc::new(|response: &Response, depth: u32| {
        if !is_html(response) {
            return (Vec::new(), Vec::new());
        }

        let selector = match Selector::parse("a[href]") {
            Ok(selector) => selector,
            Err(e) => return (Vec::new(), vec![parse_error(format!("bad selector: {}", e))]),
        };

        let document = Html::parse_document(&response.text());
        let data = extract_links(&document, &selector, &response.url)
            .into_iter()
            .map(|url| Data::Request(Request::new(url, depth + 1)))
            .collect();

        (data, Vec::new())
    })
}

/// Parser emitting one item describing the fetched page
pub fn page_parser() -> ResponseParser {
    Arc::new(|response: &Response, depth: u32| {
        let mut item = Item::new();
        item.insert("url".into(), Value::String(response.url.to_string()));
        item.insert("status".into(), Value::from(response.status));
        item.insert("depth".into(), Value::from(depth));
        item.insert("content_length".into(), Value::from(response.body.len()));
        if let Some(content_type) = response.content_type() {
            item.insert("content_type".into(), Value::String(content_type.to_string()));
        }
        if is_html(response) {
            if let Some(title) = page_title(&response.text()) {
                item.insert("title".into(), Value::String(title));
            }
        }
        item.insert("crawled_at".into(), Value::String(Utc::now().to_rfc3339()));

        (vec![Data::Item(item)], Vec::new())
    })
}

fn is_html(response: &Response) -> bool {
    response
        .content_type()
        .map(|content_type| content_type.contains("html"))
        .unwrap_or(true)
}

/// Absolute http(s) links in document order, fragments dropped
fn extract_links(document: &Html, selector: &Selector, base_url: &Url) -> Vec<Url> {
    document
        .select(selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| base_url.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            url
        })
        .collect()
}

fn page_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

fn parse_error(message: String) -> Error {
    CrawlerError::new(ErrorKind::Analyzer, message).into()
}
