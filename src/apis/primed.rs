use crate::apis::base::{body_lines, capture, crawl_details, first_text, json_ld_events, listing_from_jsonld, slug_from_url};
use crate::app::ports::{Page, PageSession};
use crate::constants::PRIMED;
use crate::error::Result;
use crate::types::{City, DateOrder, ExtractContext, RawListing, Region, SiteDefaults, SiteExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

const BASE_URL: &str = "https://www.pri-med.com/cme-conferences/";

/// A regional conference and the city it is held in.
#[derive(Debug, Clone, Copy)]
struct Conference {
    name: &'static str,
    url: &'static str,
    city: &'static str,
}

const CONFERENCES: &[Conference] = &[
    Conference { name: "Pri-Med West", url: "https://www.pri-med.com/cme-conferences/west", city: "Los Angeles" },
    Conference { name: "Pri-Med South", url: "https://www.pri-med.com/cme-conferences/south", city: "Miami" },
    Conference { name: "Pri-Med Southwest", url: "https://www.pri-med.com/cme-conferences/southwest", city: "Houston" },
    Conference { name: "Pri-Med East", url: "https://www.pri-med.com/cme-conferences/east", city: "Boston" },
    Conference {
        name: "Pri-Med Atlanta",
        url: "https://www.pri-med.com/cme-conferences/regional-conference-atlanta",
        city: "Atlanta",
    },
    Conference {
        name: "Pri-Med Charleston",
        url: "https://www.pri-med.com/cme-conferences/regional-conference-charleston",
        city: "Charleston",
    },
    Conference {
        name: "Pri-Med Irving",
        url: "https://www.pri-med.com/cme-conferences/regional-conference-irving",
        city: "Dallas",
    },
    Conference {
        name: "Pri-Med Nashville",
        url: "https://www.pri-med.com/cme-conferences/regional-conference-nashville",
        city: "Nashville",
    },
    Conference {
        name: "Pri-Med Philadelphia",
        url: "https://www.pri-med.com/cme-conferences/regional-conference-philadelphia",
        city: "Philadelphia",
    },
    Conference {
        name: "Pri-Med Phoenix",
        url: "https://www.pri-med.com/cme-conferences/regional-conference-phoenix",
        city: "Phoenix",
    },
    Conference {
        name: "Pri-Med Rosemont",
        url: "https://www.pri-med.com/cme-conferences/regional-conference-rosemont",
        city: "Chicago",
    },
    Conference {
        name: "Pri-Med Tampa",
        url: "https://www.pri-med.com/cme-conferences/regional-conference-tampa",
        city: "Tampa",
    },
    Conference {
        name: "Pri-Med DC",
        url: "https://www.pri-med.com/cme-conferences/regional-conference-washington-dc",
        city: "Washington DC",
    },
];

static DATE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2}\s*[–\-−]\s*\d{1,2},?\s*\d{4}",
    )
    .unwrap()
});
static VENUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([\w ]+(?:Convention Center|Hotel|Resort|Center))[\s,|]+([^,\n]{5,50})").unwrap()
});
static CME_CREDITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Up to |Earn\s+)?(\d+(?:\.\d+)?)\s*(?:CME|CE|Credit)").unwrap());

/// Pri-Med primary-care CME conferences: one fixed page per regional
/// meeting, each carrying a "April 9–11, 2026" range.
///
/// Fallback: a JSON-LD Event on the same page when no range is printed.
pub struct PriMedExtractor;

impl PriMedExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PriMedExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn conference_url(conf: &Conference) -> &str {
    conf.url
}

fn listing_from_page(conf: &Conference, doc: &Page) -> Option<RawListing> {
    let text = body_lines(&doc.body);
    let title = first_text(&doc.body, "h1").unwrap_or_else(|| conf.name.to_string());

    let Some(range) = DATE_RANGE.find(&text).map(|m| m.as_str().replace('−', "-")) else {
        let jsonld = json_ld_events(&doc.body).first().map(listing_from_jsonld);
        if jsonld.is_none() {
            warn!("No date found for {}", conf.name);
        }
        return jsonld.map(|l| RawListing {
            title: l.title.or(Some(title)),
            native_id: slug_from_url(conf.url),
            href: Some(conf.url.to_string()),
            city_hint: Some(conf.city.to_string()),
            is_free: Some(false),
            ..l
        });
    };

    let venue = VENUE.captures(&text);
    let credits = capture(&CME_CREDITS, &text);
    let description = match credits {
        Some(n) => format!("Primary care CME/CE conference. Earn up to {n} CME/CE Credits."),
        None => "Primary care CME/CE conference.".to_string(),
    };
    info!("Found: {} ({})", title, range);

    Some(RawListing {
        title: Some(title),
        native_id: slug_from_url(conf.url),
        href: Some(conf.url.to_string()),
        date_text: Some(range),
        venue_text: venue.as_ref().map(|c| c[1].trim().to_string()),
        address_text: venue.as_ref().map(|c| c[2].trim().to_string()),
        description: Some(description),
        city_hint: Some(conf.city.to_string()),
        is_free: Some(false),
        ..Default::default()
    })
}

#[async_trait::async_trait]
impl SiteExtractor for PriMedExtractor {
    fn name(&self) -> &'static str {
        PRIMED
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("Pri-Med", "primed", BASE_URL);
        d.region = Region::Us;
        d.home_city = City::Boston;
        d.date_order = DateOrder::MonthFirst;
        d.organizer = Some("Pri-Med");
        d.fixed_industry = Some("Healthcare");
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let pages = CONFERENCES.to_vec();
        Ok(crawl_details(page, pages, ctx, "Pri-Med", conference_url, listing_from_page).await)
    }
}
