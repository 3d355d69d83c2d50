use crate::apis::base::{
    capture, element_text, fetch_paginated, json_ld_events, listing_from_jsonld, selector, slug_from_url,
};
use crate::app::ports::PageSession;
use crate::constants::ADNEC;
use crate::error::Result;
use crate::pipeline::processing::filters::{Verdict, TRADE_EVENTS};
use crate::pipeline::processing::mapper::{absolutize, truncate_chars};
use crate::types::{City, ExtractContext, RawListing, SiteDefaults, SiteExtractor};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{info, warn};

const LISTING_URL: &str = "https://www.adnec.ae/en/eventlisting";

const MONTHS: &str = "Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec";

// Cards print "18 Feb - 18 Mar", "28 - 29 Mar" or "18 Feb", without a year.
static CROSS_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)(\d{{1,2}})\s+({MONTHS})\w*\s*[-–]\s*(\d{{1,2}})\s+({MONTHS})")).unwrap());
static SAME_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)(\d{{1,2}})\s*[-–]\s*(\d{{1,2}})\s+({MONTHS})")).unwrap());
static SINGLE_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"(?i)(\d{{1,2}})\s+({MONTHS})")).unwrap());
static HALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Conference Halls?\s+[\w &]+|Marina Hall|Halls?\s+[\w &-]+)").unwrap());

/// Abu Dhabi National Exhibition Centre. The listing intermittently answers
/// 403, which the shared navigation retry absorbs.
///
/// Primary: `a[title]` cards linking to `/en/eventlisting/<slug>`, following
/// "Show more" pages. Fallback: JSON-LD Event nodes on the same pages.
pub struct AdnecExtractor;

impl AdnecExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AdnecExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// `(start, end)` date strings from card text, stamped with `year`.
fn card_dates(text: &str, year: i32) -> (Option<String>, Option<String>) {
    if let Some(c) = CROSS_MONTH.captures(text) {
        return (
            Some(format!("{} {} {year}", &c[1], &c[2])),
            Some(format!("{} {} {year}", &c[3], &c[4])),
        );
    }
    if let Some(c) = SAME_MONTH.captures(text) {
        return (
            Some(format!("{} {} {year}", &c[1], &c[3])),
            Some(format!("{} {} {year}", &c[2], &c[3])),
        );
    }
    let single = SINGLE_DAY.captures(text).map(|c| format!("{} {} {year}", &c[1], &c[2]));
    (single, None)
}

fn card_of<'a>(link: ElementRef<'a>) -> ElementRef<'a> {
    let is_card = |el: &ElementRef| {
        let v = el.value();
        v.name() == "article" || v.attr("wire:key").is_some() || v.classes().any(|c| c == "group")
    };
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| is_card(el))
        .or_else(|| link.parent().and_then(ElementRef::wrap))
        .unwrap_or(link)
}

fn admitted(title: &str) -> bool {
    match TRADE_EVENTS.verdict(title) {
        Verdict::Keep => true,
        Verdict::Denied(pattern) => {
            info!("Skipping (title filter {}): {}", pattern, title);
            false
        }
        Verdict::NotProfessional => {
            info!("Skipping (no professional keyword): {}", title);
            false
        }
    }
}

fn parse_cards(html: &str, base: &str, year: i32) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    let desc_sel = selector(r#"p, [class*="description"], [class*="excerpt"]"#);
    let img_sel = selector("img");
    let mut out: Vec<RawListing> = Vec::new();

    for link in document.select(&selector(r#"a[href*="/en/eventlisting/"][title]"#)) {
        let Some(href) = link.value().attr("href").and_then(|h| absolutize(base, h)) else { continue };
        let Some(slug) = slug_from_url(&href).filter(|s| s != "eventlisting") else { continue };
        if out.iter().any(|l| l.native_id.as_deref() == Some(slug.as_str())) {
            continue;
        }
        let title = link.value().attr("title").unwrap_or("").trim().to_string();
        if title.chars().count() < 3 || !admitted(&title) {
            continue;
        }

        let card = card_of(link);
        let text = element_text(&card);
        let (date_text, end_date_text) = card_dates(&text, year);
        let description = card
            .select(&desc_sel)
            .next()
            .map(|d| truncate_chars(&element_text(&d), 1000))
            .filter(|d| !d.is_empty());

        out.push(RawListing {
            title: Some(title),
            native_id: Some(slug),
            href: Some(href),
            date_text,
            end_date_text,
            venue_text: capture(&HALL, &text),
            description,
            image_url: link
                .select(&img_sel)
                .next()
                .and_then(|i| i.value().attr("src"))
                .and_then(|s| absolutize(base, s)),
            is_free: Some(false),
            ..Default::default()
        });
    }
    out
}

fn parse_jsonld(html: &str, base: &str) -> Vec<RawListing> {
    json_ld_events(html)
        .iter()
        .map(listing_from_jsonld)
        .filter(|l| l.title.as_deref().map_or(false, admitted))
        .map(|mut l| {
            l.native_id = l.href.as_deref().and_then(|h| absolutize(base, h)).and_then(|h| slug_from_url(&h));
            l
        })
        .collect()
}

#[async_trait::async_trait]
impl SiteExtractor for AdnecExtractor {
    fn name(&self) -> &'static str {
        ADNEC
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("ADNEC", "adnec", LISTING_URL);
        d.home_city = City::AbuDhabi;
        d.organizer = Some("ADNEC");
        d.venue_name = Some("ADNEC");
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let pages = fetch_paginated(page, LISTING_URL, ctx, "ADNEC").await;
        if pages.is_empty() {
            return Ok(Vec::new());
        }
        let year = Utc::now().year();

        let mut listings: Vec<RawListing> = Vec::new();
        for doc in &pages {
            for listing in parse_cards(&doc.body, &doc.url, year) {
                if !listings.iter().any(|l| l.native_id == listing.native_id) {
                    listings.push(listing);
                }
            }
        }
        if listings.is_empty() {
            warn!("No titled event cards found, reading JSON-LD");
            listings = pages.iter().flat_map(|doc| parse_jsonld(&doc.body, &doc.url)).collect();
        }
        info!("Got {} events", listings.len());
        Ok(listings)
    }
}
