use crate::apis::base::{
    anchors, crawl_details, fetch_paginated, json_ld_events, listing_from_jsonld, read_detail_page, Anchor,
};
use crate::app::ports::{Page, PageSession};
use crate::constants::INFORMA;
use crate::error::Result;
use crate::pipeline::processing::geo::in_region;
use crate::types::{ExtractContext, RawListing, Region, SiteDefaults, SiteExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};
use url::Url;

const LISTING_URL: &str = "https://www.informaconnect.com/mea/events/";

/// Single-segment paths on the host that are not events.
const SKIP_SLUGS: &[&str] = &[
    "mea", "cookie-policy", "terms-of-use", "code-of-conduct", "about-us", "investors", "talent", "privacy-policy",
];

static UAE_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)UAE|Dubai|Abu Dhabi|Sharjah").unwrap());
static LISTING_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2}\s+[A-Za-z]{3},?\s+\d{4})").unwrap());

/// Informa Connect Middle East & Africa. Event sites live at
/// `informaconnect.com/<slug>/`; the listing anchor text runs title, date and
/// place together ("Asset Recovery Middle East28 Apr, 20262 daysDubai, UAE").
///
/// Detail pages supply JSON-LD; og/meta tags and the listing-text date are
/// the fallback. Without any UAE links, UAE events in the listing's own
/// JSON-LD are used.
pub struct InformaExtractor;

impl InformaExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InformaExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct Stub {
    href: String,
    slug: String,
    raw_text: String,
}

fn stub_url(stub: &Stub) -> &str {
    &stub.href
}

fn event_slug(href: &str) -> Option<String> {
    let url = Url::parse(href).ok()?;
    if !url.host_str()?.ends_with("informaconnect.com") {
        return None;
    }
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [slug] if !SKIP_SLUGS.contains(slug) => Some(slug.to_string()),
        _ => None,
    }
}

fn parse_stubs(found: Vec<Anchor>, out: &mut Vec<Stub>) {
    for a in found {
        let Some(slug) = event_slug(&a.href) else { continue };
        if a.text.chars().count() < 10 || !UAE_TEXT.is_match(&a.text) || out.iter().any(|s| s.slug == slug) {
            continue;
        }
        out.push(Stub { href: a.href, slug, raw_text: a.text });
    }
}

fn listing_from_detail(stub: &Stub, doc: &Page) -> Option<RawListing> {
    let detail = read_detail_page(&doc.body);
    let jsonld = detail.jsonld.unwrap_or_default();

    let title = jsonld
        .title
        .or(detail.og_title)
        .unwrap_or_else(|| stub.slug.replace('-', " "));
    let date_text = jsonld
        .date_text
        .or_else(|| LISTING_DATE.captures(&stub.raw_text).map(|c| c[1].to_string()));
    if date_text.is_none() {
        warn!("No date found for: {}", title);
        return None;
    }

    Some(RawListing {
        title: Some(title),
        native_id: Some(stub.slug.clone()),
        href: Some(stub.href.clone()),
        date_text,
        end_date_text: jsonld.end_date_text,
        venue_text: jsonld.venue_text,
        address_text: jsonld.address_text,
        location_text: Some(stub.raw_text.clone()),
        description: jsonld.description.or(detail.description),
        image_url: jsonld.image_url.or(detail.image),
        is_free: Some(false),
        ..Default::default()
    })
}

fn listing_json_ld(html: &str) -> Vec<RawListing> {
    json_ld_events(html)
        .iter()
        .map(listing_from_jsonld)
        .filter(|l| {
            let place = [l.venue_text.as_deref(), l.address_text.as_deref()].into_iter().flatten();
            in_region(&place.collect::<Vec<_>>().join(" "), Region::Uae)
        })
        .collect()
}

#[async_trait::async_trait]
impl SiteExtractor for InformaExtractor {
    fn name(&self) -> &'static str {
        INFORMA
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("Informa", "informa", LISTING_URL);
        d.organizer = Some("Informa Connect");
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let pages = fetch_paginated(page, LISTING_URL, ctx, "Informa").await;

        let mut stubs = Vec::new();
        for doc in &pages {
            parse_stubs(anchors(&doc.body, &doc.url, "a[href]"), &mut stubs);
        }
        info!("Found {} UAE event links on listing page", stubs.len());
        if stubs.is_empty() {
            if !pages.is_empty() {
                warn!("No UAE event links, reading JSON-LD on the listing");
            }
            return Ok(pages.iter().flat_map(|doc| listing_json_ld(&doc.body)).collect());
        }

        Ok(crawl_details(page, stubs, ctx, "Informa", stub_url, listing_from_detail).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::scripted_session::ScriptedSession;

    const LISTING: &str = r#"<div>
        <a href="https://www.informaconnect.com/asset-recovery-middle-east/">MEA EventAsset Recovery Middle East28 Apr, 20262 daysDubai, UAEBook Now</a>
        <a href="https://www.informaconnect.com/mea/conferences/">Conferences in Dubai and beyond</a>
        <a href="https://www.informaconnect.com/privacy-policy/">Privacy policy for Dubai users</a>
        <a href="https://www.informaconnect.com/fintech-london/">Fintech London12 May, 2026London, UK</a>
        <a href="https://www.informaconnect.com/gcc-banking/">GCC Banking Forum3 Jun, 2026Abu Dhabi, UAE</a>
    </div>"#;

    #[test]
    fn picks_uae_event_slugs() {
        let mut stubs = Vec::new();
        parse_stubs(anchors(LISTING, LISTING_URL, "a[href]"), &mut stubs);
        let slugs: Vec<&str> = stubs.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["asset-recovery-middle-east", "gcc-banking"]);
    }

    #[tokio::test]
    async fn falls_back_to_meta_and_listing_date() {
        let jsonld_detail = r#"<script type="application/ld+json">{"@type":"Event","name":"Asset Recovery Middle East 2026",
            "startDate":"2026-04-28","endDate":"2026-04-29","location":{"name":"Jumeirah Emirates Towers",
            "address":{"addressLocality":"Dubai","addressCountry":"UAE"}}}</script>"#;
        let meta_detail = r#"<head><meta property="og:title" content="GCC Banking Forum">
            <meta name="description" content="Banking leaders meet."></head>"#;
        let mut session = ScriptedSession::new()
            .with_page(LISTING_URL, LISTING)
            .with_page("https://www.informaconnect.com/asset-recovery-middle-east/", jsonld_detail)
            .with_page("https://www.informaconnect.com/gcc-banking/", meta_detail);
        let listings = InformaExtractor::new().extract(&mut session, &ExtractContext::immediate()).await.unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].date_text.as_deref(), Some("2026-04-28"));
        assert_eq!(listings[0].venue_text.as_deref(), Some("Jumeirah Emirates Towers"));
        assert_eq!(listings[1].title.as_deref(), Some("GCC Banking Forum"));
        assert_eq!(listings[1].date_text.as_deref(), Some("3 Jun, 2026"));
        assert_eq!(listings[1].description.as_deref(), Some("Banking leaders meet."));
    }

    #[tokio::test]
    async fn reads_listing_json_ld_without_uae_links() {
        let listing = r#"<div><a href="https://www.informaconnect.com/fintech-london/">Fintech London12 May, 2026London, UK</a></div>
            <script type="application/ld+json">[
                {"@type":"Event","name":"Dubai Treasury Forum","startDate":"2026-11-02",
                 "location":{"name":"Address Sky View","address":{"addressLocality":"Dubai","addressCountry":"AE"}}},
                {"@type":"Event","name":"Fintech London","startDate":"2026-05-12",
                 "location":{"name":"ExCeL","address":{"addressLocality":"London","addressCountry":"UK"}}}
            ]</script>"#;
        let mut session = ScriptedSession::new().with_page(LISTING_URL, listing);
        let listings = InformaExtractor::new().extract(&mut session, &ExtractContext::immediate()).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title.as_deref(), Some("Dubai Treasury Forum"));
    }
}
