use crate::apis::base::{anchors, element_text, fetch_paginated, selector, slug_from_url};
use crate::app::ports::PageSession;
use crate::constants::DIFC;
use crate::error::Result;
use crate::pipeline::processing::mapper::absolutize;
use crate::types::{ExtractContext, RawListing, SiteDefaults, SiteExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::{info, warn};

const LISTING_URL: &str = "https://www.difc.com/whats-on/events";

static EXACT_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Date\s*:\s*(\d{1,2}\s+[A-Za-z]+\s+\d{4})").unwrap());
static ONGOING_UNTIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Available till|Open to public until)\s+(\d{1,2}\s+[A-Za-z]+\s+\d{4})").unwrap()
});

/// DIFC "What's on" events: server-rendered `.card-wrapper` cards.
///
/// Fallback: any `/whats-on/events/<slug>` anchor with a date in its
/// surrounding text.
pub struct DifcExtractor;

impl DifcExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DifcExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_event_href(href: &str) -> bool {
    let trimmed = href.trim_end_matches('/');
    (href.contains("/whats-on/events/") || href.contains("/events/"))
        && !trimmed.ends_with("/events")
        && !href.contains("host-an-event")
}

fn listing_from_text(title: String, href: String, text: &str, image: Option<String>) -> Option<RawListing> {
    if title.chars().count() < 3 {
        return None;
    }
    let slug = slug_from_url(&href)?;
    let date_text = EXACT_DATE.captures(text).map(|c| c[1].to_string());
    let ongoing_until = if date_text.is_none() {
        ONGOING_UNTIL.captures(text).map(|c| c[1].to_string())
    } else {
        None
    };
    Some(RawListing {
        title: Some(title),
        native_id: Some(slug),
        href: Some(href),
        date_text,
        ongoing_until,
        image_url: image,
        ..Default::default()
    })
}

fn parse_cards(html: &str, base: &str) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    let link_sel = selector(r#"a[href*="/whats-on/events/"], a[href*="/events/"]"#);
    let img_sel = selector("img");
    let mut out: Vec<RawListing> = Vec::new();

    for card in document.select(&selector(".card-wrapper")) {
        let Some(link) = card.select(&link_sel).next() else { continue };
        let Some(href) = link.value().attr("href").and_then(|h| absolutize(base, h)) else { continue };
        if !is_event_href(&href) {
            continue;
        }
        let image = card
            .select(&img_sel)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| absolutize(base, src));
        if let Some(listing) = listing_from_text(element_text(&link), href, &element_text(&card), image) {
            if !out.iter().any(|l| l.native_id == listing.native_id) {
                out.push(listing);
            }
        }
    }
    out
}

fn parse_anchor_fallback(html: &str, base: &str) -> Vec<RawListing> {
    anchors(html, base, r#"a[href*="/whats-on/events/"]"#)
        .into_iter()
        .filter(|a| is_event_href(&a.href))
        .filter_map(|a| listing_from_text(a.text.clone(), a.href.clone(), &a.context, None))
        .filter(|l| l.date_text.is_some() || l.ongoing_until.is_some())
        .collect()
}

#[async_trait::async_trait]
impl SiteExtractor for DifcExtractor {
    fn name(&self) -> &'static str {
        DIFC
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("DIFC", "difc", LISTING_URL);
        d.organizer = Some("DIFC");
        d.venue_name = Some("Dubai International Financial Centre");
        d.venue_address = Some("DIFC, Sheikh Zayed Road, Dubai");
        d.fixed_industry = Some("Finance");
        d.allow_ongoing = true;
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let pages = fetch_paginated(page, LISTING_URL, ctx, "DIFC").await;

        let mut listings: Vec<RawListing> = Vec::new();
        for doc in &pages {
            for listing in parse_cards(&doc.body, &doc.url) {
                if !listings.iter().any(|l| l.native_id == listing.native_id) {
                    listings.push(listing);
                }
            }
        }
        info!("Got {} events from card wrappers", listings.len());

        if listings.is_empty() && !pages.is_empty() {
            warn!("No .card-wrapper cards found, falling back to event links");
            for doc in &pages {
                listings.extend(parse_anchor_fallback(&doc.body, &doc.url));
            }
        }
        Ok(listings)
    }
}
