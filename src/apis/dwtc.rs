use crate::apis::base::{child_attr, child_text, fetch_listing, selector, slug_from_url};
use crate::app::ports::PageSession;
use crate::constants::DWTC;
use crate::error::Result;
use crate::pipeline::processing::mapper::absolutize;
use crate::types::{ExtractContext, RawListing, SiteDefaults, SiteExtractor};
use scraper::{ElementRef, Html};
use tracing::{info, warn};

const LISTING_URL: &str = "https://www.dwtc.com/en/events";

/// Dubai World Trade Centre calendar: `.event_slide` cards carrying
/// `time.e-date` ranges like "19 Feb - 20 Mar 2026".
///
/// Fallback: anchors to `/en/events/<slug>/` that wrap their own title and
/// date markup.
pub struct DwtcExtractor;

impl DwtcExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DwtcExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_event_href(href: &str) -> bool {
    href.contains("/en/events/") && !href.trim_end_matches('/').ends_with("/events") && !href.contains("/ar/")
}

fn listing_from(scope: &ElementRef, href: String, base: &str, title_css: &str) -> Option<RawListing> {
    let title = child_text(scope, title_css)?;
    if title.chars().count() < 3 {
        return None;
    }
    Some(RawListing {
        native_id: slug_from_url(&href),
        date_text: child_text(scope, "time.e-date"),
        image_url: child_attr(scope, "img", "src").and_then(|src| absolutize(base, &src)),
        category: child_text(scope, r#".event-info, [class*="EventInfo"]"#),
        title: Some(title),
        href: Some(href),
        ..Default::default()
    })
}

fn push_unique(out: &mut Vec<RawListing>, listing: RawListing) {
    if !out.iter().any(|l| l.native_id == listing.native_id) {
        out.push(listing);
    }
}

fn parse_slides(html: &str, base: &str) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    let link_sel = selector(r#"a[href*="/en/events/"]"#);
    let mut out = Vec::new();
    for slide in document.select(&selector(".event_slide")) {
        let Some(href) = slide
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|h| absolutize(base, h))
        else {
            continue;
        };
        if !is_event_href(&href) {
            continue;
        }
        if let Some(listing) = listing_from(&slide, href, base, "h3.e-title.e-grid") {
            push_unique(&mut out, listing);
        }
    }
    out
}

fn parse_link_fallback(html: &str, base: &str) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    let mut out = Vec::new();
    for a in document.select(&selector(r#"a[href*="/en/events/"][href$="/"]"#)) {
        let Some(href) = a.value().attr("href").and_then(|h| absolutize(base, h)) else { continue };
        if !is_event_href(&href) {
            continue;
        }
        if let Some(listing) = listing_from(&a, href, base, "h3.e-title.e-grid, .e-title") {
            push_unique(&mut out, listing);
        }
    }
    out
}

#[async_trait::async_trait]
impl SiteExtractor for DwtcExtractor {
    fn name(&self) -> &'static str {
        DWTC
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("DWTC", "dwtc", LISTING_URL);
        d.organizer = Some("DWTC");
        d.venue_name = Some("Dubai World Trade Centre");
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let Some(doc) = fetch_listing(page, LISTING_URL, ctx, "DWTC").await else {
            return Ok(Vec::new());
        };

        let mut listings = parse_slides(&doc.body, &doc.url);
        if listings.is_empty() {
            warn!("No .event_slide results, trying fallback");
            listings = parse_link_fallback(&doc.body, &doc.url);
            info!("Fallback got {} events", listings.len());
        }
        info!("Got {} events from event cards", listings.len());
        Ok(listings)
    }
}
