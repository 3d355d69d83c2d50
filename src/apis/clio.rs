use crate::apis::base::{
    anchors, body_lines, capture, crawl_details, fetch_listing, first_text, json_ld_events, listing_from_jsonld,
    meta_content, path_after, Anchor,
};
use crate::app::ports::{Page, PageSession};
use crate::constants::CLIO;
use crate::error::Result;
use crate::types::{City, DateOrder, ExtractContext, RawListing, Region, SiteDefaults, SiteExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

const EVENTS_URL: &str = "https://www.clio.com/events/";

static LONG_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2}(?:\s*[-–,]\s*\d{1,2})?,?\s*\d{4}",
    )
    .unwrap()
});
static LOCATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:Location|Venue|Where)[:\s]+([^\n]{5,100})").unwrap());
static ON_DEMAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)on[- ]demand|watch now|recorded").unwrap());
static FREE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)free|no cost|complimentary").unwrap());

/// Clio legal-industry conferences and webinars from its events calendar.
///
/// Primary: every `/events/<slug>` link, each detail page read for date,
/// location and price; recorded webinars are skipped.
/// Fallback: JSON-LD on the listing page.
pub struct ClioExtractor;

impl ClioExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClioExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn anchor_url(anchor: &Anchor) -> &str {
    &anchor.href
}

fn event_links(html: &str, base: &str) -> Vec<Anchor> {
    anchors(html, base, r#"a[href*="/events/"]"#)
        .into_iter()
        .filter(|a| {
            let href = a.href.trim_end_matches('#');
            !href.ends_with("/events/") && !href.contains('?') && !href.contains('#')
        })
        .filter(|a| a.text != "Register Now" && a.text != "Watch Now" && a.text.chars().count() >= 3)
        .collect()
}

fn listing_from_detail(link: &Anchor, doc: &Page) -> Option<RawListing> {
    let text = body_lines(&doc.body);
    let title = first_text(&doc.body, "h1");
    if ON_DEMAND.is_match(&text) {
        info!("Skipping on-demand: {}", title.as_deref().unwrap_or(&link.text));
        return None;
    }
    let title = title?;
    Some(RawListing {
        title: Some(title),
        native_id: path_after(&link.href, "/events/"),
        href: Some(link.href.clone()),
        date_text: LONG_DATE.find(&text).map(|m| m.as_str().to_string()),
        address_text: capture(&LOCATION, &text),
        description: meta_content(&doc.body, "description").or_else(|| meta_content(&doc.body, "og:description")),
        image_url: meta_content(&doc.body, "og:image"),
        is_free: Some(FREE.is_match(&text)),
        ..Default::default()
    })
}

#[async_trait::async_trait]
impl SiteExtractor for ClioExtractor {
    fn name(&self) -> &'static str {
        CLIO
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("Clio", "clio", EVENTS_URL);
        d.region = Region::Us;
        d.home_city = City::Online;
        d.date_order = DateOrder::MonthFirst;
        d.organizer = Some("Clio");
        d.fixed_industry = Some("Legal");
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let Some(doc) = fetch_listing(page, EVENTS_URL, ctx, "Clio").await else {
            return Ok(Vec::new());
        };

        let links = event_links(&doc.body, &doc.url);
        info!("Found {} unique event links", links.len());
        if links.is_empty() {
            warn!("No event links found, reading JSON-LD");
            return Ok(json_ld_events(&doc.body).iter().map(listing_from_jsonld).collect());
        }
        Ok(crawl_details(page, links, ctx, "Clio", anchor_url, listing_from_detail).await)
    }
}
