use crate::apis::base::{anchors, fetch_listing, json_ld_events, listing_from_jsonld, read_detail_page};
use crate::app::ports::PageSession;
use crate::constants::DMG;
use crate::error::Result;
use crate::pipeline::processing::dates::split_range;
use crate::pipeline::processing::geo::in_region;
use crate::pipeline::retry::navigate_with_retry;
use crate::types::{ExtractContext, RawListing, Region, SiteDefaults, SiteExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

const LISTING_URL: &str = "https://www.dmgevents.com/events/?country=United+Arab+Emirates&year=2026";

/// Shows listed once per hall or co-located zone.
const SUB_ZONE_PREFIXES: &[&str] = &["ADIPEC", "Big 5", "The Big 5"];

/// "EVENT NAME | 14 - 16 April 2026 , United Arab Emirates"
static PIPE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?)\s*\|\s*(.+?)\s*,\s*(.+?)$").unwrap());
static UAE_COUNTRY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)united arab emirates").unwrap());

/// dmg events portfolio filtered to the UAE. The site sits behind a WAF that
/// serves "Request unsuccessful" interstitials; those are retried like any
/// other challenge page.
///
/// Each show links out to its own microsite, which is visited for JSON-LD or
/// meta-tag details. A failed microsite keeps the listing as-is.
/// Fallback: JSON-LD Event nodes on the listing page itself.
pub struct DmgExtractor;

impl DmgExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DmgExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_pipe_links(html: &str, base: &str) -> Vec<RawListing> {
    let mut out = Vec::new();
    for a in anchors(html, base, "a[href]") {
        if a.text.chars().count() < 10 {
            continue;
        }
        let Some(c) = PIPE_LINK.captures(&a.text) else { continue };
        let (title, dates, country) = (c[1].trim().to_string(), c[2].trim().to_string(), c[3].trim());
        if !UAE_COUNTRY.is_match(country) {
            info!("Skipping non-UAE: {} ({})", title, country);
            continue;
        }
        let (date_text, end_date_text) = match split_range(&dates) {
            Some((start, end)) => (Some(start), Some(end)),
            None => (Some(dates), None),
        };
        out.push(RawListing {
            title: Some(title),
            href: Some(a.href),
            date_text,
            end_date_text,
            is_free: Some(false),
            ..Default::default()
        });
    }
    out
}

fn parse_jsonld(html: &str) -> Vec<RawListing> {
    json_ld_events(html)
        .iter()
        .map(listing_from_jsonld)
        .filter(|l| {
            let location = [l.venue_text.as_deref(), l.address_text.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            in_region(&location, Region::Uae)
        })
        .collect()
}

/// Fold microsite details into a listing.
fn merge_detail(listing: &mut RawListing, html: &str) {
    let detail = read_detail_page(html);
    match detail.jsonld {
        Some(jsonld) => {
            listing.description = jsonld.description.or(listing.description.take());
            listing.image_url = jsonld.image_url.or(listing.image_url.take());
            listing.venue_text = jsonld.venue_text.or(listing.venue_text.take());
        }
        None => {
            listing.description = detail.description.or(listing.description.take());
            listing.image_url = detail.image.or(listing.image_url.take());
        }
    }
}

#[async_trait::async_trait]
impl SiteExtractor for DmgExtractor {
    fn name(&self) -> &'static str {
        DMG
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("DMG", "dmg", LISTING_URL);
        d.organizer = Some("DMG Events");
        d
    }

    fn sub_zone_prefixes(&self) -> &'static [&'static str] {
        SUB_ZONE_PREFIXES
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let Some(doc) = fetch_listing(page, LISTING_URL, ctx, "DMG").await else {
            return Ok(Vec::new());
        };

        let mut listings = parse_pipe_links(&doc.body, &doc.url);
        info!("{} UAE events from link text", listings.len());
        if listings.is_empty() {
            warn!("No 'TITLE | dates , Country' links found, reading JSON-LD");
            listings = parse_jsonld(&doc.body);
            return Ok(listings);
        }

        for (i, listing) in listings.iter_mut().take(ctx.max_detail_pages).enumerate() {
            let Some(href) = listing.href.clone() else { continue };
            if i > 0 {
                page.pause(ctx.detail_pause).await;
            }
            match navigate_with_retry(page, &href, &ctx.retry).await {
                Ok(detail) => merge_detail(listing, &detail.body),
                Err(e) => warn!("Failed to fetch detail for {:?}: {}", listing.title, e),
            }
        }
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::scripted_session::ScriptedSession;

    const LISTING: &str = r#"<ul>
        <li><a href="https://www.middleeastcoatingsshow.com/">Middle East Coatings Show | 14 - 16 April 2026 , United Arab Emirates</a></li>
        <li><a href="https://www.big5global.com/">The Big 5 | 23 - 26 November 2026 , United Arab Emirates</a></li>
        <li><a href="https://www.big5global.com/big5-construct/">The Big 5 Construct Hall | 23 - 26 November 2026 , United Arab Emirates</a></li>
        <li><a href="https://www.saudi-show.test/">Saudi Build | 3 - 6 Oct 2026 , Saudi Arabia</a></li>
        <li><a href="/about">About dmg</a></li>
    </ul>"#;

    #[test]
    fn parses_pipe_links_for_uae_only() {
        let listings = parse_pipe_links(LISTING, LISTING_URL);
        assert_eq!(listings.len(), 3);
        assert_eq!(listings[0].title.as_deref(), Some("Middle East Coatings Show"));
        assert_eq!(listings[0].date_text.as_deref(), Some("14 April 2026"));
        assert_eq!(listings[0].end_date_text.as_deref(), Some("16 April 2026"));
    }

    #[tokio::test]
    async fn keeps_listing_when_microsite_fails() {
        let detail = r#"<html><head><meta property="og:image" content="https://cdn.test/coatings.jpg">
            <meta name="description" content="Coatings industry exhibition."></head></html>"#;
        let mut session = ScriptedSession::new()
            .with_page(LISTING_URL, LISTING)
            .with_page("https://www.middleeastcoatingsshow.com/", detail)
            .with_timeout("https://www.big5global.com/")
            .with_page("https://www.big5global.com/big5-construct/", "<html></html>");
        let listings = DmgExtractor::new().extract(&mut session, &ExtractContext::immediate()).await.unwrap();
        assert_eq!(listings.len(), 3);
        assert_eq!(listings[0].description.as_deref(), Some("Coatings industry exhibition."));
        assert_eq!(listings[0].image_url.as_deref(), Some("https://cdn.test/coatings.jpg"));
        assert_eq!(listings[1].description, None);
    }

    #[tokio::test]
    async fn waf_interstitial_exhausts_to_empty() {
        let mut session = ScriptedSession::new()
            .with_page(LISTING_URL, "<html><body>Request unsuccessful. Incapsula incident ID: 1</body></html>");
        let listings = DmgExtractor::new().extract(&mut session, &ExtractContext::immediate()).await.unwrap();
        assert!(listings.is_empty());
        assert_eq!(session.visits().len(), 3);
    }

    #[test]
    fn declares_sub_zone_prefixes() {
        assert!(DmgExtractor::new().sub_zone_prefixes().contains(&"Big 5"));
    }
}
