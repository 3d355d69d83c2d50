use crate::apis::base::{
    child_attr, child_text, element_text, fetch_listing, json_ld_events, listing_from_jsonld, path_after, selector,
};
use crate::app::ports::PageSession;
use crate::constants::STARTUPGRIND;
use crate::error::Result;
use crate::pipeline::processing::geo::in_region;
use crate::pipeline::processing::mapper::{absolutize, truncate_chars};
use crate::types::{City, DateOrder, ExtractContext, RawListing, Region, SiteDefaults, SiteExtractor};
use scraper::Html;
use tracing::info;

const EVENTS_URL: &str = "https://www.startupgrind.com/events/";

/// US chapter names as they appear in card text.
const US_CHAPTERS: &[&str] = &[
    "austin", "san francisco", "new york", "nyc", "miami", "chicago", "los angeles", "seattle", "denver", "boston",
    "washington dc",
];

/// Startup Grind chapter events, kept to US chapters.
///
/// Primary: rendered event cards linking to `/events/details/`.
/// Fallback: JSON-LD events on the listing.
pub struct StartupGrindExtractor;

impl StartupGrindExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StartupGrindExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_us(text: &str) -> bool {
    let lower = text.to_lowercase();
    US_CHAPTERS.iter().any(|ch| lower.contains(ch)) || in_region(text, Region::Us)
}

/// Stable id from the details path; cards without one fall back to the
/// mapper's title-derived id.
fn details_id(href: &str) -> Option<String> {
    path_after(href, "/details/").map(|id| truncate_chars(&id, 50))
}

fn parse_cards(html: &str, base: &str) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    let link_sel = selector(r#"a[href*="/events/details/"]"#);
    let cards = selector(r#".event, [class*="EventCard"], [class*="event-card"], a[href*="/events/details/"]"#);
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();

    for card in document.select(&cards) {
        let link = if card.value().name() == "a" { Some(card) } else { card.select(&link_sel).next() };
        let Some(link) = link else { continue };
        let Some(href) = link.value().attr("href").and_then(|h| absolutize(base, h)) else { continue };
        if seen.contains(&href) {
            continue;
        }
        seen.push(href.clone());

        let full_text = truncate_chars(&element_text(&card), 300);
        let location = child_text(&card, r#"[class*="location"], [class*="Location"], [class*="chapter"]"#);
        if !is_us(&format!("{} {}", location.as_deref().unwrap_or(""), full_text)) {
            continue;
        }

        let date_selector = r#"time, [class*="date"], [class*="Date"]"#;
        out.push(RawListing {
            title: child_text(&card, r#"h3, h4, .event-title, [class*="Title"]"#)
                .or_else(|| Some(element_text(&link)).filter(|t| !t.is_empty()))
                .or_else(|| Some("Startup Grind Event".to_string())),
            native_id: details_id(&href),
            href: Some(href),
            date_text: child_attr(&card, date_selector, "datetime").or_else(|| child_text(&card, date_selector)),
            address_text: location,
            is_free: Some(full_text.to_lowercase().contains("free")),
            ..Default::default()
        });
    }
    out
}

#[async_trait::async_trait]
impl SiteExtractor for StartupGrindExtractor {
    fn name(&self) -> &'static str {
        STARTUPGRIND
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("StartupGrind", "sg", EVENTS_URL);
        d.region = Region::Us;
        d.home_city = City::Online;
        d.date_order = DateOrder::MonthFirst;
        d.organizer = Some("Startup Grind");
        d.fixed_industry = Some("Startup");
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let Some(doc) = fetch_listing(page, EVENTS_URL, ctx, "StartupGrind").await else {
            return Ok(Vec::new());
        };

        let listings = parse_cards(&doc.body, &doc.url);
        info!("{} US events after filtering", listings.len());
        if !listings.is_empty() {
            return Ok(listings);
        }

        let fallback: Vec<RawListing> = json_ld_events(&doc.body)
            .iter()
            .map(listing_from_jsonld)
            .filter(|l| {
                let place = [l.venue_text.as_deref(), l.address_text.as_deref()].into_iter().flatten();
                is_us(&place.collect::<Vec<_>>().join(" "))
            })
            .collect();
        info!("JSON-LD fallback found {} US events", fallback.len());
        Ok(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARDS: &str = r#"<div>
        <div class="event-card">
            <a href="/events/details/startup-grind-austin-presents-jane-doe-12345/">
              <h3>Fireside with Jane Doe</h3></a>
            <time datetime="2026-03-05T18:00:00-06:00">Mar 5</time>
            <span class="chapter-location">Austin, TX</span>
            <span>Free</span>
        </div>
        <div class="event-card">
            <a href="/events/details/startup-grind-lagos-1/"><h3>Lagos Meetup</h3></a>
            <span class="location">Lagos, Nigeria</span>
        </div>
    </div>"#;

    #[test]
    fn keeps_us_chapters_only() {
        let listings = parse_cards(CARDS, EVENTS_URL);
        assert_eq!(listings.len(), 1);
        let l = &listings[0];
        assert_eq!(l.title.as_deref(), Some("Fireside with Jane Doe"));
        assert_eq!(l.native_id.as_deref(), Some("startup-grind-austin-presents-jane-doe-12345"));
        assert_eq!(l.date_text.as_deref(), Some("2026-03-05T18:00:00-06:00"));
        assert_eq!(l.is_free, Some(true));
    }

    #[test]
    fn details_id_is_bounded() {
        let long = format!("https://www.startupgrind.com/events/details/{}/", "x".repeat(80));
        assert_eq!(details_id(&long).map(|s| s.len()), Some(50));
    }
}
