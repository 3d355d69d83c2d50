use crate::apis::base::{
    capture, child_text, element_text, fetch_listing, json_ld_events, listing_from_jsonld, selector, slug_from_url,
};
use crate::app::ports::PageSession;
use crate::constants::USCHAMBER;
use crate::error::Result;
use crate::pipeline::processing::mapper::{absolutize, truncate_chars};
use crate::types::{City, DateOrder, ExtractContext, RawListing, Region, SiteDefaults, SiteExtractor};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{info, warn};

const EVENTS_URL: &str = "https://www.uschamber.com/events";

static CARD_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday),?\s*)?((?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2}(?:,?\s*\d{4})?)",
    )
    .unwrap()
});
static HAS_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}$").unwrap());
static CATEGORY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Technology|Infrastructure|Small Business|Health|Energy|International|Workforce)\b").unwrap()
});
static LOCATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"U\.S\.\s*Chamber[^.]*?\b[A-Z]{2}\s+\d{5}").unwrap());

/// U.S. Chamber of Commerce events, almost all held at its Washington
/// headquarters.
///
/// Primary: links to `events.uschamber.com` read with their container text.
/// Fallback: JSON-LD events on the listing.
pub struct UsChamberExtractor;

impl UsChamberExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UsChamberExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn container_of<'a>(link: ElementRef<'a>) -> ElementRef<'a> {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| matches!(el.value().name(), "div" | "article" | "li"))
        .unwrap_or(link)
}

fn parse_links(html: &str, base: &str, year: i32) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    let mut out: Vec<RawListing> = Vec::new();
    for link in document.select(&selector(r#"a[href*="events.uschamber.com"]"#)) {
        let Some(href) = link.value().attr("href").and_then(|h| absolutize(base, h)) else { continue };
        if out.iter().any(|l| l.href.as_deref() == Some(href.as_str())) {
            continue;
        }
        let container = container_of(link);
        let text = element_text(&container);
        let category = capture(&CATEGORY, &text);
        let heading = child_text(&container, "h2, h3, h4").unwrap_or_else(|| element_text(&link));
        let mut title = truncate_chars(&heading, 200);
        if let Some(cat) = category.as_deref() {
            title = title.replacen(cat, "", 1).trim().to_string();
        }
        if title.chars().count() <= 5 {
            continue;
        }

        let date_text = capture(&CARD_DATE, &text).map(|d| {
            if HAS_YEAR.is_match(&d) {
                d
            } else {
                format!("{d}, {year}")
            }
        });

        out.push(RawListing {
            native_id: slug_from_url(&href),
            href: Some(href),
            date_text,
            address_text: capture(&LOCATION, &text),
            description: category
                .as_ref()
                .map(|c| format!("{c} event hosted by the U.S. Chamber of Commerce.")),
            category,
            is_free: Some(false),
            title: Some(title),
            ..Default::default()
        });
    }
    out
}

#[async_trait::async_trait]
impl SiteExtractor for UsChamberExtractor {
    fn name(&self) -> &'static str {
        USCHAMBER
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("USChamber", "usc", EVENTS_URL);
        d.region = Region::Us;
        d.home_city = City::WashingtonDc;
        d.date_order = DateOrder::MonthFirst;
        d.organizer = Some("U.S. Chamber of Commerce");
        d.venue_name = Some("U.S. Chamber of Commerce");
        d.venue_address = Some("1615 H St NW, Washington, DC 20062");
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let Some(doc) = fetch_listing(page, EVENTS_URL, ctx, "USChamber").await else {
            return Ok(Vec::new());
        };

        let listings = parse_links(&doc.body, &doc.url, Utc::now().year());
        info!("Found {} events", listings.len());
        if !listings.is_empty() {
            return Ok(listings);
        }
        warn!("No events.uschamber.com links, reading JSON-LD");
        Ok(json_ld_events(&doc.body).iter().map(listing_from_jsonld).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<section>
        <div class="card">Technology <h3>Technology Global Innovation Forum</h3>
            <p>Wednesday, March 11</p><p>9:00 AM EDT</p>
            <p>U.S. Chamber of Commerce, 1615 H St NW, Washington, DC 20062</p>
            <a href="https://events.uschamber.com/gif2026">Register</a></div>
        <div class="card"><h3>America's Small Business Summit</h3><p>May 4, 2027</p>
            <a href="https://events.uschamber.com/sbsummit">Register</a></div>
        <div><a href="https://events.uschamber.com/gif2026">Register again</a></div>
    </section>"#;

    #[test]
    fn reads_links_with_container_text() {
        let listings = parse_links(LISTING, EVENTS_URL, 2026);
        assert_eq!(listings.len(), 2);

        let forum = &listings[0];
        assert_eq!(forum.title.as_deref(), Some("Global Innovation Forum"));
        assert_eq!(forum.date_text.as_deref(), Some("March 11, 2026"));
        assert_eq!(forum.category.as_deref(), Some("Technology"));
        assert_eq!(forum.native_id.as_deref(), Some("gif2026"));
        assert!(forum.address_text.as_deref().unwrap().ends_with("DC 20062"));

        assert_eq!(listings[1].date_text.as_deref(), Some("May 4, 2027"));
    }
}
