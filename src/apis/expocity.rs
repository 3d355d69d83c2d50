use crate::apis::base::{anchors, fetch_listing, path_after, window_state};
use crate::app::ports::PageSession;
use crate::constants::EXPOCITY;
use crate::error::Result;
use crate::pipeline::processing::dates::split_range;
use crate::pipeline::processing::filters::{Verdict, PROFESSIONAL_EVENTS};
use crate::types::{ExtractContext, RawListing, SiteDefaults, SiteExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

const LISTING_URL: &str = "https://www.expocitydubai.com/en/things-to-do/events-and-workshops/";
const DETAIL_MARKER: &str = "/events-and-workshops/";

/// Content-type slugs the CMS uses for shows and screenings.
const ENTERTAINMENT_SUBTYPES: &[&str] = &["event-type-or-entertainment", "entertainment", "tag-movie"];

static CARD_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,2}(?:\s*[-–]\s*\d{1,2})?\s+[A-Za-z]{3,9}\.?(?:\s*[-–]\s*\d{1,2}\s+[A-Za-z]{3,9}\.?)?,?\s+\d{4})")
        .unwrap()
});

/// Expo City Dubai "events and workshops". The page is mostly family and
/// leisure programming, so every title goes through the professional filter.
///
/// Primary: the `window.__NUXT__` hydration state (`data[0].eventsRaw`).
/// Fallback: rendered cards linking under `/events-and-workshops/`.
pub struct ExpoCityExtractor;

impl ExpoCityExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExpoCityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn keep_title(title: &str, subtypes: &[String]) -> bool {
    match PROFESSIONAL_EVENTS.verdict(title) {
        Verdict::Keep => true,
        Verdict::Denied(pattern) => {
            info!("Skipping (title filter {}): {}", pattern, title);
            false
        }
        Verdict::NotProfessional => {
            if subtypes.iter().any(|s| ENTERTAINMENT_SUBTYPES.contains(&s.as_str())) {
                info!("Skipping (entertainment subtype): {}", title);
            } else {
                info!("Skipping (no professional keyword): {}", title);
            }
            false
        }
    }
}

/// Image URL buried in the CMS media collection.
fn media_image(ev: &Value) -> Option<String> {
    let inner = ev.pointer("/mediaCollection/items/0/itemsCollection/items/0")?;
    if let Some(url) = inner.pointer("/assetWithFocalPoint/image/url").and_then(Value::as_str) {
        return Some(url.to_string());
    }
    if let Some(url) = inner.pointer("/videoCover/url").and_then(Value::as_str) {
        return Some(url.to_string());
    }
    let asset = inner.get("asset")?;
    let is_image = asset
        .get("contentType")
        .and_then(Value::as_str)
        .map_or(false, |t| t.starts_with("image/"));
    if is_image {
        asset.get("url").and_then(Value::as_str).map(str::to_string)
    } else {
        None
    }
}

/// Each entry of `eventTimingJson.dates` is `"<start> - <end>"`; the earliest
/// start and the latest start bound the listing.
fn timing_bounds(ev: &Value) -> (Option<String>, Option<String>) {
    let mut starts: Vec<String> = ev
        .pointer("/eventTimingJson/dates")
        .and_then(Value::as_array)
        .map(|dates| {
            dates
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|d| d.split(" - ").next())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    starts.sort();
    let first = starts.first().cloned();
    let last = if starts.len() > 1 { starts.last().cloned() } else { None };
    (first, last)
}

fn events_from_state(state: &Value) -> Option<Vec<RawListing>> {
    let raw = state.pointer("/data/0/eventsRaw")?.as_array()?;
    info!("Raw events from __NUXT__: {}", raw.len());

    let mut out = Vec::new();
    for ev in raw {
        let title = ev.get("title").and_then(Value::as_str).unwrap_or("").trim();
        if title.chars().count() < 3 {
            continue;
        }
        let subtypes: Vec<String> = ev
            .pointer("/subtypeCollection/items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|s| s.get("slug").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if !keep_title(title, &subtypes) {
            continue;
        }

        let (start, end) = timing_bounds(ev);
        if start.is_none() {
            warn!("No date for: {}", title);
            continue;
        }
        let slug = ev.get("slug").and_then(Value::as_str).unwrap_or("").trim();
        out.push(RawListing {
            title: Some(title.to_string()),
            native_id: (!slug.is_empty()).then(|| slug.to_string()),
            href: (!slug.is_empty()).then(|| format!("{LISTING_URL}{slug}/")),
            date_text: start,
            end_date_text: end,
            image_url: media_image(ev),
            is_free: Some(false),
            ..Default::default()
        });
    }
    Some(out)
}

fn parse_cards(html: &str, base: &str) -> Vec<RawListing> {
    anchors(html, base, r#"a[href*="/events-and-workshops/"]"#)
        .into_iter()
        .filter_map(|a| {
            let slug = path_after(&a.href, DETAIL_MARKER)?;
            let title = a.title.clone().unwrap_or_else(|| a.text.clone());
            if title.chars().count() < 3 || !keep_title(&title, &[]) {
                return None;
            }
            let date = CARD_DATE.captures(&a.context).map(|c| c[1].to_string());
            let (date_text, end_date_text) = match date.as_deref().and_then(split_range) {
                Some((start, end)) => (Some(start), Some(end)),
                None => (date, None),
            };
            Some(RawListing {
                title: Some(title),
                native_id: Some(slug),
                href: Some(a.href),
                date_text,
                end_date_text,
                is_free: Some(false),
                ..Default::default()
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl SiteExtractor for ExpoCityExtractor {
    fn name(&self) -> &'static str {
        EXPOCITY
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("ExpoCity", "expocity", LISTING_URL);
        d.organizer = Some("Expo City Dubai");
        d.venue_name = Some("Expo City Dubai");
        d.venue_address = Some("Expo City Dubai, Dubai South");
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let Some(doc) = fetch_listing(page, LISTING_URL, ctx, "ExpoCity").await else {
            return Ok(Vec::new());
        };

        if let Some(listings) = window_state(&doc.body, "__NUXT__")
            .and_then(|state| events_from_state(&state))
            .filter(|found| !found.is_empty())
        {
            return Ok(listings);
        }
        warn!("No events found in __NUXT__.data[0].eventsRaw, reading rendered cards");
        let listings = parse_cards(&doc.body, &doc.url);
        debug!("Rendered cards kept: {}", listings.len());
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::scripted_session::ScriptedSession;

    fn nuxt_page() -> String {
        let state = serde_json::json!({"data": [{"eventsRaw": [
            {
                "title": "World Cities Summit Mayors Forum",
                "slug": "mayors-forum",
                "eventTimingJson": {"dates": [
                    "2026-04-15T09:00+04:00 - 2026-04-15T17:00+04:00",
                    "2026-04-14T09:00+04:00 - 2026-04-14T17:00+04:00"
                ]},
                "mediaCollection": {"items": [{"itemsCollection": {"items": [
                    {"assetWithFocalPoint": {"image": {"url": "https://images.test/mayors.jpg"}}}
                ]}}]}
            },
            {"title": "Kids Coding Expo", "slug": "kids", "eventTimingJson": {"dates": ["2026-04-01T10:00+04:00 - x"]}},
            {"title": "Movie Night", "slug": "movie", "subtypeCollection": {"items": [{"slug": "tag-movie"}]}},
            {"title": "Sustainable Cities Conference", "slug": "no-dates"}
        ]}]});
        format!("<html><script>window.__NUXT__ = {state};</script></html>")
    }

    #[tokio::test]
    async fn reads_hydration_state_through_filter() {
        let mut session = ScriptedSession::new().with_page(LISTING_URL, nuxt_page());
        let listings = ExpoCityExtractor::new().extract(&mut session, &ExtractContext::immediate()).await.unwrap();
        assert_eq!(listings.len(), 1);
        let l = &listings[0];
        assert_eq!(l.native_id.as_deref(), Some("mayors-forum"));
        assert_eq!(l.date_text.as_deref(), Some("2026-04-14T09:00+04:00"));
        assert_eq!(l.end_date_text.as_deref(), Some("2026-04-15T09:00+04:00"));
        assert_eq!(l.image_url.as_deref(), Some("https://images.test/mayors.jpg"));
        assert_eq!(
            l.href.as_deref(),
            Some("https://www.expocitydubai.com/en/things-to-do/events-and-workshops/mayors-forum/")
        );
    }

    #[tokio::test]
    async fn empty_hydration_state_falls_back_to_cards() {
        let page = r#"<html><script>window.__NUXT__ = {"data": [{"eventsRaw": []}]};</script>
            <div class="card"><a href="/en/things-to-do/events-and-workshops/climate-forum/">Climate Forum</a><span>12 - 14 May 2026</span></div>
        </html>"#;
        let mut session = ScriptedSession::new().with_page(LISTING_URL, page);
        let listings = ExpoCityExtractor::new().extract(&mut session, &ExtractContext::immediate()).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].native_id.as_deref(), Some("climate-forum"));
    }

    #[test]
    fn filters_rendered_cards() {
        let html = r#"<div>
            <div class="card"><a href="/en/things-to-do/events-and-workshops/climate-forum/">Climate Forum</a><span>12 - 14 May 2026</span></div>
            <div class="card"><a href="/en/things-to-do/events-and-workshops/yoga-sunrise/">Yoga Sunrise</a><span>1 May 2026</span></div>
        </div>"#;
        let listings = parse_cards(html, LISTING_URL);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].date_text.as_deref(), Some("12 May 2026"));
        assert_eq!(listings[0].end_date_text.as_deref(), Some("14 May 2026"));
    }
}
