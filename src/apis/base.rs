//! Extraction building blocks shared by the site extractors.
//!
//! Parsing helpers are synchronous and return owned data: `scraper::Html` is
//! not `Send` and must never be held across an `.await`.

use crate::app::ports::{Page, PageSession};
use crate::pipeline::processing::mapper::{absolutize, clean_text};
use crate::pipeline::retry::navigate_with_retry;
use crate::types::{ExtractContext, RawListing};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, info, warn};

pub fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}

/// Whitespace-collapsed text content of an element.
pub fn element_text(el: &ElementRef) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first match of `css` under `el`.
pub fn child_text(el: &ElementRef, css: &str) -> Option<String> {
    el.select(&selector(css)).next().map(|c| element_text(&c)).filter(|t| !t.is_empty())
}

/// Attribute of the first match of `css` under `el`.
pub fn child_attr(el: &ElementRef, css: &str, attr: &str) -> Option<String> {
    el.select(&selector(css))
        .next()
        .and_then(|c| c.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Last non-empty path segment, without query or fragment.
pub fn slug_from_url(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

/// Path after `marker`, e.g. `/events/` in `https://x.com/events/a/b/`.
pub fn path_after(url: &str, marker: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.find(marker)
        .map(|i| path[i + marker.len()..].trim_matches('/').to_string())
        .filter(|s| !s.is_empty())
}

/// A link with the text around it.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
    pub title: Option<String>,
    /// Text of the closest enclosing block that says more than the link.
    pub context: String,
}

const CONTEXT_LIMIT: usize = 600;

fn anchor_context(a: &ElementRef, text: &str) -> String {
    let mut node = a.parent();
    for _ in 0..4 {
        let Some(parent) = node else { break };
        if let Some(el) = ElementRef::wrap(parent) {
            let ctx = element_text(&el);
            if ctx.len() > text.len() + 10 {
                return ctx.chars().take(CONTEXT_LIMIT).collect();
            }
        }
        node = parent.parent();
    }
    text.to_string()
}

/// Links matching `css`, resolved against `base`, de-duplicated by href.
pub fn anchors(html: &str, base: &str, css: &str) -> Vec<Anchor> {
    let document = Html::parse_document(html);
    let mut out: Vec<Anchor> = Vec::new();
    for a in document.select(&selector(css)) {
        let Some(href) = a.value().attr("href").and_then(|h| absolutize(base, h)) else { continue };
        if out.iter().any(|x| x.href == href) {
            continue;
        }
        let text = element_text(&a);
        let context = anchor_context(&a, &text);
        out.push(Anchor {
            href,
            text,
            title: a.value().attr("title").map(|t| clean_text(t)).filter(|t| !t.is_empty()),
            context,
        });
    }
    out
}

static LOAD_MORE_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:load more|show more|view more|more events|next(?: page)?|›|»)\s*$").unwrap());

/// URL behind the page's "Load more"/"Next" control, if it is a link.
pub fn find_load_more(html: &str, base: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let explicit = selector(r#"a[rel="next"], link[rel="next"], .pagination a.next, a.load-more, a[data-load-more]"#);
    if let Some(href) = document
        .select(&explicit)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|h| absolutize(base, h))
    {
        return Some(href);
    }
    document
        .select(&selector("a[href]"))
        .filter(|a| LOAD_MORE_TEXT.is_match(&element_text(a)))
        .filter_map(|a| a.value().attr("href"))
        .filter(|h| !h.starts_with('#'))
        .find_map(|h| absolutize(base, h))
}

/// Every `<script type="application/ld+json">` node typed as an event,
/// following `@graph` wrappers and top-level arrays.
pub fn json_ld_events(html: &str) -> Vec<Value> {
    let document = Html::parse_document(html);
    let mut events = Vec::new();
    for script in document.select(&selector(r#"script[type="application/ld+json"]"#)) {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => collect_event_nodes(&value, &mut events),
            Err(e) => debug!("Skipping malformed JSON-LD block: {}", e),
        }
    }
    events
}

fn is_event_type(node: &Value) -> bool {
    let matches = |t: &str| t == "Event" || t.ends_with("Event");
    match node.get("@type") {
        Some(Value::String(t)) => matches(t),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

fn collect_event_nodes(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_event_nodes(v, out)),
        Value::Object(map) => {
            if is_event_type(value) {
                out.push(value.clone());
            }
            if let Some(graph) = map.get("@graph") {
                collect_event_nodes(graph, out);
            }
            if let Some(list) = map.get("itemListElement") {
                collect_event_nodes(list, out);
            }
            if let Some(item) = map.get("item") {
                collect_event_nodes(item, out);
            }
        }
        _ => {}
    }
}

/// String at `key`, or the `name`/`url` of an object there.
pub fn json_str(node: &Value, key: &str) -> Option<String> {
    match node.get(key)? {
        Value::String(s) => Some(clean_text(s)).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.first().and_then(|first| match first {
            Value::String(s) => Some(clean_text(s)),
            other => other.get("url").or_else(|| other.get("name")).and_then(Value::as_str).map(clean_text),
        }),
        Value::Object(_) => {
            let obj = node.get(key)?;
            obj.get("url").or_else(|| obj.get("name")).and_then(Value::as_str).map(clean_text)
        }
        _ => None,
    }
}

fn postal_address(address: &Value) -> Option<String> {
    match address {
        Value::String(s) => Some(clean_text(s)),
        Value::Object(_) => {
            let parts: Vec<String> = ["streetAddress", "addressLocality", "addressRegion", "addressCountry"]
                .iter()
                .filter_map(|k| json_str(address, k))
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

/// Map a JSON-LD Event node onto a raw listing.
pub fn listing_from_jsonld(node: &Value) -> RawListing {
    let location = match node.get("location") {
        Some(Value::Array(items)) => items.first().cloned(),
        other => other.cloned(),
    };
    let (venue, address, online) = match &location {
        Some(Value::String(s)) => (Some(clean_text(s)), None, false),
        Some(loc @ Value::Object(_)) => {
            let virtual_loc = loc.get("@type").and_then(Value::as_str) == Some("VirtualLocation");
            (json_str(loc, "name"), loc.get("address").and_then(postal_address), virtual_loc)
        }
        _ => (None, None, false),
    };

    let free = node
        .get("isAccessibleForFree")
        .and_then(|v| v.as_bool().or_else(|| v.as_str().map(|s| s.eq_ignore_ascii_case("true"))))
        .or_else(|| {
            let offers = node.get("offers")?;
            let offer = offers.as_array().and_then(|a| a.first()).unwrap_or(offers);
            let price = offer.get("price")?;
            let price = price.as_f64().or_else(|| price.as_str().and_then(|s| s.trim().parse().ok()))?;
            Some(price == 0.0)
        });

    RawListing {
        title: json_str(node, "name"),
        href: json_str(node, "url"),
        date_text: json_str(node, "startDate"),
        end_date_text: json_str(node, "endDate"),
        venue_text: venue,
        address_text: address,
        location_text: online.then(|| "Online".to_string()),
        description: json_str(node, "description"),
        image_url: json_str(node, "image"),
        organizer: node.get("organizer").and_then(|o| match o {
            Value::String(s) => Some(clean_text(s)),
            other => json_str(other, "name").or_else(|| other.as_array()?.first().and_then(|f| json_str(f, "name"))),
        }),
        is_free: free,
        ..Default::default()
    }
}

/// `<meta property|name=...>` content.
pub fn meta_content(html: &str, key: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let css = format!(r#"meta[property="{key}"], meta[name="{key}"]"#);
    document
        .select(&selector(&css))
        .filter_map(|m| m.value().attr("content"))
        .map(clean_text)
        .find(|c| !c.is_empty())
}

/// Text of the first element matching `css` anywhere in the document.
pub fn first_text(html: &str, css: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document.select(&selector(css)).map(|el| element_text(&el)).find(|t| !t.is_empty())
}

/// Visible text of the whole body.
pub fn body_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&selector("body"))
        .next()
        .map(|b| element_text(&b))
        .unwrap_or_default()
}

/// Body text with one line per text node, for label-based regexes.
pub fn body_lines(html: &str) -> String {
    let document = Html::parse_document(html);
    let Some(body) = document.select(&selector("body")).next() else {
        return String::new();
    };
    body.descendants()
        .filter(|node| {
            node.parent()
                .and_then(|p| p.value().as_element().map(|el| !matches!(el.name(), "script" | "style" | "noscript")))
                .unwrap_or(true)
        })
        .filter_map(|node| node.value().as_text().map(|t| clean_text(t)))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fields every detail page offers in some form.
#[derive(Debug, Clone, Default)]
pub struct DetailPage {
    pub jsonld: Option<RawListing>,
    pub heading: Option<String>,
    pub og_title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub text: String,
}

pub fn read_detail_page(html: &str) -> DetailPage {
    DetailPage {
        jsonld: json_ld_events(html).first().map(listing_from_jsonld),
        heading: first_text(html, "h1"),
        og_title: meta_content(html, "og:title"),
        description: meta_content(html, "og:description").or_else(|| meta_content(html, "description")),
        image: meta_content(html, "og:image"),
        text: body_text(html),
    }
}

/// JSON assigned to `window.<name>` in an inline script.
///
/// Only literal JSON assignments are understood; function-wrapped payloads
/// yield `None`.
pub fn window_state(html: &str, name: &str) -> Option<Value> {
    let patterns = [format!("window.{name}"), format!("window[\"{name}\"]"), format!("window['{name}']")];
    for pattern in &patterns {
        let mut from = 0;
        while let Some(found) = html[from..].find(pattern.as_str()) {
            let after = from + found + pattern.len();
            let rest = html[after..].trim_start();
            if let Some(rhs) = rest.strip_prefix('=') {
                if let Some(value) = balanced_json(rhs.trim_start()).and_then(|s| serde_json::from_str(s).ok()) {
                    return Some(value);
                }
            }
            from = after;
        }
    }
    None
}

/// Content of `<script id="__NEXT_DATA__">`.
pub fn next_data(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let script = document.select(&selector("script#__NEXT_DATA__")).next()?;
    serde_json::from_str(script.text().collect::<String>().trim()).ok()
}

/// The leading `{...}` or `[...]` of `text`, respecting strings.
fn balanced_json(text: &str) -> Option<&str> {
    let open = text.chars().next()?;
    if open != '{' && open != '[' {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Fetch a listing page with retries. Exhausted retries degrade to `None`.
pub async fn fetch_listing(
    page: &mut dyn PageSession,
    url: &str,
    ctx: &ExtractContext,
    source: &str,
) -> Option<Page> {
    match navigate_with_retry(page, url, &ctx.retry).await {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!(source, "Listing {} unavailable, returning no events: {}", url, e);
            None
        }
    }
}

/// The first listing page plus any pages reachable through load-more links.
pub async fn fetch_paginated(
    page: &mut dyn PageSession,
    url: &str,
    ctx: &ExtractContext,
    source: &str,
) -> Vec<Page> {
    let Some(first) = fetch_listing(page, url, ctx, source).await else {
        return Vec::new();
    };
    let mut visited = vec![url.to_string()];
    let mut next = find_load_more(&first.body, &first.url);
    let mut pages = vec![first];

    for _ in 0..ctx.max_load_more {
        let Some(next_url) = next.take().filter(|u| !visited.contains(u)) else { break };
        page.pause(ctx.detail_pause).await;
        match navigate_with_retry(page, &next_url, &ctx.retry).await {
            Ok(doc) => {
                next = find_load_more(&doc.body, &doc.url);
                pages.push(doc);
            }
            Err(e) => {
                warn!(source, "Stopping pagination at {}: {}", next_url, e);
                break;
            }
        }
        visited.push(next_url);
    }
    if pages.len() > 1 {
        info!(source, "Loaded {} listing pages", pages.len());
    }
    pages
}

/// Visit detail pages one at a time with pacing. A failing page is logged
/// and skipped; `parse` returning `None` drops that candidate.
pub async fn crawl_details<T, F>(
    page: &mut dyn PageSession,
    candidates: Vec<T>,
    ctx: &ExtractContext,
    source: &str,
    url_of: fn(&T) -> &str,
    parse: F,
) -> Vec<RawListing>
where
    T: Send + Sync,
    F: Fn(&T, &Page) -> Option<RawListing> + Send + Sync,
{
    let mut out = Vec::new();
    for (i, candidate) in candidates.iter().take(ctx.max_detail_pages).enumerate() {
        if i > 0 {
            page.pause(ctx.detail_pause).await;
        }
        let url = url_of(candidate);
        match navigate_with_retry(page, url, &ctx.retry).await {
            Ok(doc) => match parse(candidate, &doc) {
                Some(listing) => out.push(listing),
                None => debug!(source, "Detail page {} yielded nothing", url),
            },
            Err(e) => warn!(source, "Detail page {} failed, skipping: {}", url, e),
        }
    }
    out
}

/// First capture of `re` in `text`, trimmed.
pub fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1).or_else(|| c.get(0)))
        .map(|m| clean_text(m.as_str()))
        .filter(|s| !s.is_empty())
}
