use crate::apis::base::{
    body_lines, capture, child_text, crawl_details, fetch_listing, first_text, json_ld_events, listing_from_jsonld,
    selector, slug_from_url,
};
use crate::app::ports::{Page, PageSession};
use crate::constants::AMS;
use crate::error::Result;
use crate::pipeline::processing::mapper::absolutize;
use crate::types::{City, DateOrder, ExtractContext, RawListing, Region, SiteDefaults, SiteExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::{info, warn};

const CALENDAR_URL: &str = "https://www.americanmedicalseminars.com/seminar-calendar/";

static LONG_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2}(?:\s*[-–,]\s*\d{1,2})?,?\s*\d{4}",
    )
    .unwrap()
});
static LOCATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:Location|Venue|Where)[:\s]+([^\n]{5,100})").unwrap());
static CME_CREDITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:CME|CE|Credit|AMA)").unwrap());

/// American Medical Seminars CME calendar. Every listing is a healthcare
/// seminar.
///
/// Primary: FullCalendar `a.fc-event` links, each detail page read for its
/// date, location and credit count. Fallback: JSON-LD on the calendar page.
pub struct AmsExtractor;

impl AmsExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AmsExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct CalendarEntry {
    title: String,
    href: String,
}

fn entry_url(entry: &CalendarEntry) -> &str {
    &entry.href
}

/// Seminar slug joined with the `?datetime=` occurrence, e.g.
/// `primary-care-orlando-2026-03-09`. Several seminars share a date.
fn occurrence_id(href: &str) -> Option<String> {
    let slug = slug_from_url(href);
    let when = href
        .split_once("datetime=")
        .map(|(_, rest)| rest.split(['&', '#']).next().unwrap_or(rest))
        .filter(|s| !s.is_empty());
    match (slug, when) {
        (Some(slug), Some(when)) => Some(format!("{slug}-{when}")),
        (slug, when) => slug.or_else(|| when.map(str::to_string)),
    }
}

fn parse_calendar(html: &str, base: &str) -> Vec<CalendarEntry> {
    let document = Html::parse_document(html);
    let mut out: Vec<CalendarEntry> = Vec::new();
    for a in document.select(&selector(r#"a.fc-event[href*="/events/"]"#)) {
        if a.value().classes().any(|c| c == "expired") {
            continue;
        }
        let Some(title) = child_text(&a, ".fc-event-title") else { continue };
        let Some(href) = a.value().attr("href").and_then(|h| absolutize(base, h)) else { continue };
        if out.iter().any(|e| e.href == href) {
            continue;
        }
        out.push(CalendarEntry { title, href });
    }
    out
}

fn listing_from_detail(entry: &CalendarEntry, doc: &Page) -> Option<RawListing> {
    let text = body_lines(&doc.body);
    let credits = capture(&CME_CREDITS, &text);
    let description = match credits {
        Some(n) => format!("CME/CE Conference. {n} credits available."),
        None => "CME/CE Conference.".to_string(),
    };
    Some(RawListing {
        title: first_text(&doc.body, "h1").or_else(|| Some(entry.title.clone())),
        native_id: occurrence_id(&entry.href),
        href: Some(entry.href.clone()),
        date_text: LONG_DATE.find(&text).map(|m| m.as_str().to_string()),
        address_text: capture(&LOCATION, &text),
        description: Some(description),
        is_free: Some(false),
        ..Default::default()
    })
}

#[async_trait::async_trait]
impl SiteExtractor for AmsExtractor {
    fn name(&self) -> &'static str {
        AMS
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("AMS", "ams", CALENDAR_URL);
        d.region = Region::Us;
        d.home_city = City::Online;
        d.date_order = DateOrder::MonthFirst;
        d.organizer = Some("American Medical Seminars");
        d.fixed_industry = Some("Healthcare");
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let Some(doc) = fetch_listing(page, CALENDAR_URL, ctx, "AMS").await else {
            return Ok(Vec::new());
        };

        let entries = parse_calendar(&doc.body, &doc.url);
        info!("Found {} calendar events", entries.len());
        if entries.is_empty() {
            warn!("Calendar grid empty, reading JSON-LD");
            return Ok(json_ld_events(&doc.body).iter().map(listing_from_jsonld).collect());
        }

        Ok(crawl_details(page, entries, ctx, "AMS", entry_url, listing_from_detail).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::scripted_session::ScriptedSession;

    const CALENDAR: &str = r#"<div class="fc">
        <a class="fc-event" href="/events/primary-care-orlando/?datetime=2026-03-09">
            <div class="fc-event-title">Primary Care Update</div></a>
        <a class="fc-event" href="/events/primary-care-orlando/?datetime=2026-03-09">
            <div class="fc-event-title">Primary Care Update</div></a>
        <a class="fc-event expired" href="/events/old/"><div class="fc-event-title">Old</div></a>
    </div>"#;

    const DETAIL: &str = r#"<html><body>
        <h1>Primary Care Update: Orlando</h1>
        <p>March 9-13, 2026</p>
        <p>Location: Hilton Orlando Bonnet Creek, Orlando, FL</p>
        <p>Earn up to 20 AMA PRA Category 1 Credits</p>
    </body></html>"#;

    #[test]
    fn reads_calendar_entries() {
        let entries = parse_calendar(CALENDAR, CALENDAR_URL);
        assert_eq!(entries.len(), 1);
        assert_eq!(occurrence_id(&entries[0].href).as_deref(), Some("primary-care-orlando-2026-03-09"));
    }

    #[tokio::test]
    async fn enriches_from_detail_pages() {
        let mut session = ScriptedSession::new()
            .with_page(CALENDAR_URL, CALENDAR)
            .with_page("https://www.americanmedicalseminars.com/events/primary-care-orlando/?datetime=2026-03-09", DETAIL);
        let listings = AmsExtractor::new().extract(&mut session, &ExtractContext::immediate()).await.unwrap();
        assert_eq!(listings.len(), 1);
        let l = &listings[0];
        assert_eq!(l.title.as_deref(), Some("Primary Care Update: Orlando"));
        assert_eq!(l.date_text.as_deref(), Some("March 9-13, 2026"));
        assert_eq!(l.address_text.as_deref(), Some("Hilton Orlando Bonnet Creek, Orlando, FL"));
        assert_eq!(l.description.as_deref(), Some("CME/CE Conference. 20 credits available."));
        assert_eq!(l.native_id.as_deref(), Some("primary-care-orlando-2026-03-09"));
    }

    #[tokio::test]
    async fn seminars_on_the_same_date_keep_distinct_ids() {
        let calendar = r#"<div class="fc">
            <a class="fc-event" href="/events/primary-care-orlando/?datetime=2026-03-09">
                <div class="fc-event-title">Primary Care Update</div></a>
            <a class="fc-event" href="/events/dermatology-tampa/?datetime=2026-03-09">
                <div class="fc-event-title">Dermatology Review</div></a>
        </div>"#;
        let mut session = ScriptedSession::new()
            .with_page(CALENDAR_URL, calendar)
            .with_page("https://www.americanmedicalseminars.com/events/primary-care-orlando/?datetime=2026-03-09", DETAIL)
            .with_page(
                "https://www.americanmedicalseminars.com/events/dermatology-tampa/?datetime=2026-03-09",
                "<html><body><h1>Dermatology Review: Tampa</h1><p>March 9-12, 2026</p></body></html>",
            );
        let listings = AmsExtractor::new().extract(&mut session, &ExtractContext::immediate()).await.unwrap();
        let ids: Vec<_> = listings.iter().map(|l| l.native_id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["primary-care-orlando-2026-03-09", "dermatology-tampa-2026-03-09"]);
    }
}
