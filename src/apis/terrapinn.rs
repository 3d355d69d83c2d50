use crate::apis::base::{
    anchors, child_text, crawl_details, element_text, fetch_listing, read_detail_page, selector, slug_from_url,
};
use crate::app::ports::{Page, PageSession};
use crate::constants::TERRAPINN;
use crate::error::Result;
use crate::pipeline::processing::geo::detect_city;
use crate::pipeline::processing::mapper::absolutize;
use crate::types::{ExtractContext, RawListing, Region, SiteDefaults, SiteExtractor};
use scraper::Html;
use tracing::{info, warn};

const LISTING_URL: &str = "https://www.terrapinn.com/events/middle-east";
const EVENT_LINKS: &str = r#"a[href*="/exhibition/"], a[href*="/conference/"], a[href*="/event/"]"#;

/// Terrapinn Middle East portfolio. The regional listing mixes in Saudi and
/// other GCC shows, so only events whose venue resolves to a UAE city are
/// kept.
///
/// Listing stubs come from `li`/`article` containers (or, when the markup has
/// none, bare event anchors); each stub's detail page supplies JSON-LD, with
/// meta tags and the stub's own text as fallback.
pub struct TerrapinnExtractor;

impl TerrapinnExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerrapinnExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Stub {
    title: String,
    href: String,
    slug: String,
    date_text: Option<String>,
    venue_text: Option<String>,
}

fn stub_url(stub: &Stub) -> &str {
    &stub.href
}

fn parse_stubs(html: &str, base: &str) -> Vec<Stub> {
    let document = Html::parse_document(html);
    let link_sel = selector(EVENT_LINKS);
    let mut out: Vec<Stub> = Vec::new();
    for item in document.select(&selector("li, .event-item, .event-card, article")) {
        let Some(link) = item.select(&link_sel).next() else { continue };
        let Some(href) = link.value().attr("href").and_then(|h| absolutize(base, h)) else { continue };
        let Some(slug) = slug_from_url(&href) else { continue };
        if out.iter().any(|s| s.slug == slug) {
            continue;
        }
        let title = child_text(&item, "h3, h4, h5, .event-title")
            .unwrap_or_else(|| element_text(&link));
        if title.chars().count() < 3 {
            continue;
        }
        out.push(Stub {
            title,
            href,
            slug,
            date_text: child_text(&item, "h6, .event-date, .date, time"),
            venue_text: child_text(&item, "p, .event-venue, .venue, .location"),
        });
    }
    out
}

fn parse_anchor_stubs(html: &str, base: &str) -> Vec<Stub> {
    let mut out: Vec<Stub> = Vec::new();
    for a in anchors(html, base, EVENT_LINKS) {
        let Some(slug) = slug_from_url(&a.href) else { continue };
        if a.text.chars().count() < 3 || out.iter().any(|s| s.slug == slug) {
            continue;
        }
        out.push(Stub { title: a.text, href: a.href, slug, date_text: None, venue_text: Some(a.context) });
    }
    out
}

fn listing_from_detail(stub: &Stub, doc: &Page) -> Option<RawListing> {
    let detail = read_detail_page(&doc.body);
    let jsonld = detail.jsonld.unwrap_or_default();

    let title = jsonld.title.unwrap_or_else(|| stub.title.clone());
    let venue = jsonld.venue_text.or_else(|| stub.venue_text.clone());
    let address = jsonld.address_text;

    let location = [venue.as_deref(), address.as_deref(), stub.venue_text.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let Some(city) = detect_city(&location, Region::Uae) else {
        info!("Skipping non-UAE event: {}", title);
        return None;
    };

    Some(RawListing {
        title: Some(title),
        native_id: Some(stub.slug.clone()),
        href: Some(stub.href.clone()),
        date_text: jsonld.date_text.or_else(|| stub.date_text.clone()),
        end_date_text: jsonld.end_date_text,
        venue_text: venue,
        address_text: address,
        description: jsonld.description.or(detail.description),
        image_url: jsonld.image_url.or(detail.image),
        city_hint: Some(city.as_str().to_string()),
        is_free: Some(false),
        ..Default::default()
    })
}

#[async_trait::async_trait]
impl SiteExtractor for TerrapinnExtractor {
    fn name(&self) -> &'static str {
        TERRAPINN
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("Terrapinn", "terrapinn", LISTING_URL);
        d.organizer = Some("Terrapinn");
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let Some(doc) = fetch_listing(page, LISTING_URL, ctx, "Terrapinn").await else {
            return Ok(Vec::new());
        };

        let mut stubs = parse_stubs(&doc.body, &doc.url);
        if stubs.is_empty() {
            warn!("No listing containers found, scanning event anchors");
            stubs = parse_anchor_stubs(&doc.body, &doc.url);
        }
        info!("Found {} event stubs on listing page", stubs.len());

        Ok(crawl_details(page, stubs, ctx, "Terrapinn", stub_url, listing_from_detail).await)
    }
}
