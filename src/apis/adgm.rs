use crate::apis::base::{anchors, capture, json_str, slug_from_url};
use crate::app::ports::{CapturedResponse, PageSession, ResponseFilter};
use crate::constants::ADGM;
use crate::error::Result;
use crate::pipeline::processing::mapper::slugify;
use crate::pipeline::retry::capture_with_retry;
use crate::types::{City, ExtractContext, RawListing, SiteDefaults, SiteExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

const EVENTS_URL: &str = "https://www.adgm.com/events";

static NEARBY_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,2}\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{4})").unwrap()
});

/// Abu Dhabi Global Market events.
///
/// The listing is filled by XHR calls; any JSON response on an event-ish URL
/// carrying an array of `Title`d items is used. Without one, links under
/// `/events/` are read with a date from the surrounding block.
pub struct AdgmExtractor;

impl AdgmExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AdgmExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn first_str(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| json_str(item, k))
}

/// The event array inside an intercepted body: a well-known wrapper key, or
/// any top-level array whose first item has a `Title`.
fn event_array(body: &Value) -> Option<&Vec<Value>> {
    let wrapped = ["events", "data", "items", "Results"]
        .iter()
        .filter_map(|k| body.get(*k).and_then(Value::as_array))
        .find(|a| !a.is_empty());
    wrapped.or_else(|| {
        body.as_object()?
            .values()
            .filter_map(Value::as_array)
            .find(|a| a.first().and_then(|f| f.get("Title")).is_some())
    })
}

fn listing_from_api(item: &Value) -> Option<RawListing> {
    let title = first_str(item, &["Title", "title", "Name", "name"])?;
    let slug = first_str(item, &["Slug", "slug"]);
    let native_id = item
        .get("Id")
        .or_else(|| item.get("id"))
        .and_then(|v| match v {
            Value::Number(n) => Some(n.to_string()),
            _ => v.as_str().map(str::to_string),
        })
        .or_else(|| slug.clone())
        .unwrap_or_else(|| slugify(&title));
    let price_free = item.get("Price").and_then(Value::as_f64).map(|p| p == 0.0);

    Some(RawListing {
        native_id: Some(native_id),
        href: first_str(item, &["RegistrationUrl", "Url", "Link"])
            .or_else(|| slug.map(|s| format!("{EVENTS_URL}/{s}"))),
        date_text: first_str(item, &["StartDate", "startDate", "EventDate", "Date"]),
        end_date_text: first_str(item, &["EndDate", "endDate"]),
        venue_text: first_str(item, &["Venue", "venue"]),
        address_text: first_str(item, &["Address"]),
        description: first_str(item, &["Description", "description", "Summary"]),
        organizer: first_str(item, &["Organizer"]),
        image_url: first_str(item, &["ImageUrl", "Image"]),
        is_free: Some(item.get("IsFree").and_then(Value::as_bool).unwrap_or(false) || price_free.unwrap_or(false)),
        title: Some(title),
        ..Default::default()
    })
}

fn parse_captured(captured: &[CapturedResponse]) -> Vec<RawListing> {
    // Later responses supersede earlier ones, as the page re-queries on load.
    captured
        .iter()
        .rev()
        .find_map(|r| event_array(&r.body))
        .map(|items| items.iter().filter_map(listing_from_api).collect())
        .unwrap_or_default()
}

fn parse_links(html: &str, base: &str) -> Vec<RawListing> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for a in anchors(html, base, r#"a[href*="/events/"], a[href*="event"]"#) {
        let Some(slug) = slug_from_url(&a.href) else { continue };
        if slug == "events" || seen.contains(&slug) {
            continue;
        }
        seen.push(slug.clone());
        if a.text.chars().count() < 3 {
            continue;
        }
        out.push(RawListing {
            title: Some(a.text),
            native_id: Some(slug),
            href: Some(a.href),
            date_text: capture(&NEARBY_DATE, &a.context),
            is_free: Some(false),
            ..Default::default()
        });
    }
    out
}

#[async_trait::async_trait]
impl SiteExtractor for AdgmExtractor {
    fn name(&self) -> &'static str {
        ADGM
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("ADGM", "adgm", EVENTS_URL);
        d.home_city = City::AbuDhabi;
        d.organizer = Some("ADGM");
        d.venue_name = Some("ADGM");
        d.fixed_industry = Some("Finance");
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let filter = ResponseFilter::url_contains("event");
        let (doc, captured) = match capture_with_retry(page, EVENTS_URL, &filter, &ctx.retry).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Listing unavailable, returning no events: {}", e);
                return Ok(Vec::new());
            }
        };

        let listings = parse_captured(&captured);
        if !listings.is_empty() {
            info!("Got {} events from API interception", listings.len());
            return Ok(listings);
        }

        let listings = parse_links(&doc.body, &doc.url);
        info!("Got {} events from page links", listings.len());
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::scripted_session::ScriptedSession;
    use serde_json::json;

    #[tokio::test]
    async fn prefers_intercepted_event_array() {
        let body = json!({
            "total": 2,
            "List": [
                {"Title": "Abu Dhabi Finance Week", "Id": 77, "StartDate": "2026-12-08", "EndDate": "2026-12-11",
                 "Slug": "adfw-2026", "Price": 0},
                {"Title": "RegLab Roundtable", "StartDate": "2027-01-15"}
            ]
        });
        let mut session = ScriptedSession::new()
            .with_page(EVENTS_URL, "<html><a href='/events/ignored'>Ignored link</a></html>")
            .with_capture(EVENTS_URL, "https://www.adgm.com/api/EventListing?page=1", body);
        let listings = AdgmExtractor::new().extract(&mut session, &ExtractContext::immediate()).await.unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].native_id.as_deref(), Some("77"));
        assert_eq!(listings[0].href.as_deref(), Some("https://www.adgm.com/events/adfw-2026"));
        assert_eq!(listings[0].is_free, Some(true));
        assert_eq!(listings[1].native_id.as_deref(), Some("reglab-roundtable"));
    }

    #[test]
    fn reads_links_with_nearby_dates() {
        let html = r#"<ul>
            <li><div><a href="/events/fintech-summit">Fintech Summit</a></div><span>12 March 2026</span></li>
            <li><a href="/events">All events</a></li>
            <li><a href="/events/fintech-summit">Fintech Summit again</a></li>
        </ul>"#;
        let listings = parse_links(html, EVENTS_URL);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].native_id.as_deref(), Some("fintech-summit"));
        assert_eq!(listings[0].date_text.as_deref(), Some("12 March 2026"));
    }
}
