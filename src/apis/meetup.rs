use crate::apis::base::{child_attr, child_text, element_text, fetch_paginated, next_data, selector, slug_from_url, window_state};
use crate::app::ports::PageSession;
use crate::constants::MEETUP;
use crate::error::Result;
use crate::pipeline::processing::mapper::absolutize;
use crate::types::{ExtractContext, RawListing, SiteDefaults, SiteExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

const SEARCH_URL: &str = "https://www.meetup.com/find/?location=ae--dubai&source=EVENTS&categoryId=546";

static EVENT_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"events/(\d+)").unwrap());

/// Meetup technology search for Dubai.
///
/// Primary: the Apollo cache, either as `window.__APOLLO_STATE__` or nested
/// in `__NEXT_DATA__`, across the search page and its "next" pages.
/// Fallback: rendered `categoryResults-eventCard` cards.
pub struct MeetupExtractor;

impl MeetupExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MeetupExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn apollo_cache(html: &str) -> Option<Map<String, Value>> {
    let state = window_state(html, "__APOLLO_STATE__").or_else(|| {
        let data = next_data(html)?;
        data.pointer("/props/pageProps/__APOLLO_STATE__").cloned()
    })?;
    match state {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Follow an Apollo `{"__ref": "Group:1"}` pointer, or return the inline object.
fn deref<'a>(cache: &'a Map<String, Value>, value: Option<&'a Value>) -> Option<&'a Value> {
    let value = value?;
    match value.get("__ref").and_then(Value::as_str) {
        Some(key) => cache.get(key),
        None => value.is_object().then_some(value),
    }
}

fn text(value: Option<&Value>, key: &str) -> Option<String> {
    value?.get(key)?.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn listing_from_apollo(cache: &Map<String, Value>, ev: &Value) -> Option<RawListing> {
    let title = text(Some(ev), "title")?;
    let event_url = text(Some(ev), "eventUrl");
    let id = text(Some(ev), "id").or_else(|| event_url.as_deref().and_then(slug_from_url));
    let group = deref(cache, ev.get("group"));
    let venue = deref(cache, ev.get("venue"));
    let photo = deref(cache, ev.get("featuredEventPhoto"));

    let fee_free = ev.pointer("/feeSettings/amount").and_then(Value::as_f64).map(|a| a == 0.0);
    let online = ev.get("isOnline").and_then(Value::as_bool).unwrap_or(false);

    Some(RawListing {
        href: event_url.or_else(|| id.as_ref().map(|id| format!("https://www.meetup.com/events/{id}/"))),
        native_id: id,
        date_text: text(Some(ev), "dateTime").or_else(|| text(Some(ev), "startDate")),
        end_date_text: text(Some(ev), "endTime").or_else(|| text(Some(ev), "endDate")),
        venue_text: text(venue, "name"),
        address_text: text(venue, "address"),
        city_hint: text(venue, "city").or_else(|| text(group, "city")),
        location_text: online.then(|| "Online".to_string()),
        description: text(Some(ev), "description").or_else(|| text(Some(ev), "shortDescription")),
        image_url: text(Some(ev), "imageUrl").or_else(|| text(photo, "highRes")).or_else(|| text(photo, "photo")),
        organizer: text(group, "name"),
        is_free: Some(fee_free.unwrap_or(false)),
        title: Some(title),
        ..Default::default()
    })
}

fn parse_apollo(html: &str) -> Option<Vec<RawListing>> {
    let cache = apollo_cache(html)?;
    let listings = cache
        .iter()
        .filter(|(key, _)| key.starts_with("Event:"))
        .filter_map(|(_, ev)| listing_from_apollo(&cache, ev))
        .collect();
    Some(listings)
}

fn parse_cards(html: &str, base: &str) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    let p_sel = selector("p");
    let span_sel = selector("span");
    let mut out: Vec<RawListing> = Vec::new();
    for card in document.select(&selector(r#"[data-testid="categoryResults-eventCard"]"#)) {
        let Some(title) = child_text(&card, "h2, h3") else { continue };
        let href = child_attr(&card, r#"a[href*="/events/"]"#, "href").and_then(|h| absolutize(base, h.as_str()));
        let native_id = href.as_deref().and_then(|h| {
            EVENT_NUMBER.captures(h).map(|c| c[1].to_string()).or_else(|| slug_from_url(h))
        });
        let seen = match native_id.as_deref() {
            Some(id) => out.iter().any(|l| l.native_id.as_deref() == Some(id)),
            None => out.iter().any(|l| l.title.as_deref() == Some(title.as_str())),
        };
        if seen {
            continue;
        }
        // The group name sits in a `<p><span>`; the location is a bare `<p>`.
        let location = card
            .select(&p_sel)
            .filter(|p| p.select(&span_sel).next().is_none())
            .map(|p| element_text(&p))
            .find(|t| t.contains("Dubai") || t.contains("Abu Dhabi") || t.contains("Online"));
        out.push(RawListing {
            native_id,
            href,
            date_text: child_attr(&card, "time[datetime]", "datetime"),
            organizer: child_text(&card, r#"p span, [data-testid*="group"]"#),
            image_url: child_attr(&card, "img[alt]", "src"),
            location_text: location,
            is_free: Some(false),
            title: Some(title),
            ..Default::default()
        });
    }
    out
}

#[async_trait::async_trait]
impl SiteExtractor for MeetupExtractor {
    fn name(&self) -> &'static str {
        MEETUP
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("Meetup", "meetup", "https://www.meetup.com/");
        d.fallback_industry = "Technology";
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let pages = fetch_paginated(page, SEARCH_URL, ctx, "Meetup").await;

        let mut listings: Vec<RawListing> = Vec::new();
        for doc in &pages {
            match parse_apollo(&doc.body) {
                Some(found) => {
                    for listing in found {
                        if !listings.iter().any(|l| l.native_id == listing.native_id) {
                            listings.push(listing);
                        }
                    }
                }
                None => debug!("No Apollo cache on {}", doc.url),
            }
        }
        if !listings.is_empty() {
            info!("Got {} events from Apollo state", listings.len());
            return Ok(listings);
        }

        if !pages.is_empty() {
            warn!("Apollo cache empty, reading event cards");
        }
        let listings: Vec<RawListing> = pages.iter().flat_map(|doc| parse_cards(&doc.body, &doc.url)).collect();
        info!("Got {} events from DOM", listings.len());
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::scripted_session::ScriptedSession;

    fn apollo_page() -> String {
        let state = serde_json::json!({
            "Group:9": {"name": "Dubai Rust Meetup", "city": "Dubai"},
            "Venue:3": {"name": "in5 Tech", "address": "Dubai Internet City", "city": "Dubai"},
            "Event:301": {
                "id": "301", "title": "Async Rust Night",
                "eventUrl": "https://www.meetup.com/dubai-rust/events/301/",
                "dateTime": "2026-02-12T19:00:00+04:00",
                "group": {"__ref": "Group:9"}, "venue": {"__ref": "Venue:3"},
                "feeSettings": null, "isOnline": false
            },
            "Event:302": {"id": "302", "title": "Remote AI Talk", "dateTime": "2026-02-20T18:00:00+04:00", "isOnline": true,
                          "feeSettings": {"amount": 0}},
            "Event:303": {"id": "303", "title": "Paid Online Workshop", "dateTime": "2026-02-25T18:00:00+04:00", "isOnline": true},
            "Group:10": {"name": "Ignored"}
        });
        format!(r#"<html><script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{{"__APOLLO_STATE__":{state}}}}}}}</script></html>"#)
    }

    #[tokio::test]
    async fn reads_apollo_cache_from_next_data() {
        let mut session = ScriptedSession::new().with_page(SEARCH_URL, apollo_page());
        let listings = MeetupExtractor::new().extract(&mut session, &ExtractContext::immediate()).await.unwrap();
        assert_eq!(listings.len(), 3);

        let rust = listings.iter().find(|l| l.native_id.as_deref() == Some("301")).unwrap();
        assert_eq!(rust.organizer.as_deref(), Some("Dubai Rust Meetup"));
        assert_eq!(rust.venue_text.as_deref(), Some("in5 Tech"));
        assert_eq!(rust.city_hint.as_deref(), Some("Dubai"));
        assert_eq!(rust.is_free, Some(false));

        let remote = listings.iter().find(|l| l.native_id.as_deref() == Some("302")).unwrap();
        assert_eq!(remote.href.as_deref(), Some("https://www.meetup.com/events/302/"));
        assert_eq!(remote.is_free, Some(true));
        assert_eq!(remote.location_text.as_deref(), Some("Online"));

        let workshop = listings.iter().find(|l| l.native_id.as_deref() == Some("303")).unwrap();
        assert_eq!(workshop.is_free, Some(false));
    }

    #[test]
    fn reads_rendered_cards() {
        let html = r#"<div data-testid="categoryResults-eventCard">
            <a href="https://www.meetup.com/dubai-js/events/555/"><h3>JS Dubai</h3></a>
            <time datetime="2026-03-01T19:00:00+04:00">Sun, Mar 1</time>
            <p><span>Dubai JS</span></p><p>Dubai, AE</p>
        </div>"#;
        let listings = parse_cards(html, SEARCH_URL);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].native_id.as_deref(), Some("555"));
        assert_eq!(listings[0].organizer.as_deref(), Some("Dubai JS"));
        assert_eq!(listings[0].location_text.as_deref(), Some("Dubai, AE"));
    }

    #[test]
    fn repeated_card_titles_with_different_events_are_kept() {
        let html = r#"<div data-testid="categoryResults-eventCard">
            <a href="https://www.meetup.com/dubai-ai/events/301/"><h3>Dubai AI Builders Monthly</h3></a>
            <time datetime="2026-02-10T19:00:00+04:00">Tue, Feb 10</time>
        </div>
        <div data-testid="categoryResults-eventCard">
            <a href="https://www.meetup.com/dubai-ai/events/302/"><h3>Dubai AI Builders Monthly</h3></a>
            <time datetime="2026-03-10T19:00:00+04:00">Tue, Mar 10</time>
        </div>"#;
        let listings = parse_cards(html, SEARCH_URL);
        let ids: Vec<_> = listings.iter().map(|l| l.native_id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["301", "302"]);
    }
}
