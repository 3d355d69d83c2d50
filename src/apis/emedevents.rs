use crate::apis::base::{fetch_listing, json_ld_events, listing_from_jsonld, next_data};
use crate::app::ports::PageSession;
use crate::constants::EMEDEVENTS;
use crate::error::Result;
use crate::pipeline::processing::geo::in_region;
use crate::types::{City, DateOrder, ExtractContext, RawListing, Region, SiteDefaults, SiteExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

const HOME_URL: &str = "https://www.emedevents.com/";

/// `homeData` collections that hold conferences.
const COLLECTIONS: &[&str] = &[
    "featured_conferences",
    "inperson_hybrid",
    "Internal_Medicine_Conferences",
    "live_webinar",
    "free_conferences",
];

static SHORT_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"'(\d{2})\b").unwrap());

/// eMedEvents medical conferences, kept to the USA.
///
/// Primary: `__NEXT_DATA__` `props.pageProps.homeData` collections.
/// Fallback: JSON-LD events on the home page.
pub struct EMedEventsExtractor;

impl EMedEventsExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EMedEventsExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// "11 Jul'26" -> "11 Jul 2026".
fn expand_short_year(raw: &str) -> String {
    SHORT_YEAR.replace(raw.trim(), " 20$1").to_string()
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn listing_from_item(item: &Value) -> Option<RawListing> {
    let title = str_field(item, "title")?;
    let location = str_field(item, "location").unwrap_or_default();
    if !in_region(&location, Region::Us) {
        debug!("Skipping non-US conference: {} ({})", title, location);
        return None;
    }

    let specialities: Vec<&str> = item
        .get("specialities")
        .and_then(Value::as_array)
        .map(|s| s.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let description = (!specialities.is_empty()).then(|| {
        let cme = str_field(item, "display_cme").unwrap_or_default();
        format!("Specialties: {}. {}", specialities.join(", "), cme).trim().to_string()
    });

    let price = str_field(item, "display_price");
    let free = matches!(price.as_deref(), Some("0") | Some("Free")) || title.to_lowercase().contains("free");

    Some(RawListing {
        native_id: item.get("id").and_then(id_string),
        href: str_field(item, "detailpage_url").map(|p| format!("{HOME_URL}{}", p.trim_start_matches('/'))),
        date_text: str_field(item, "startdate").map(|d| expand_short_year(&d)),
        end_date_text: str_field(item, "enddate").map(|d| expand_short_year(&d)),
        address_text: Some(location),
        description,
        organizer: str_field(item, "organization_name"),
        image_url: str_field(item, "conference_image").or_else(|| str_field(item, "featured_image")),
        is_free: Some(free),
        title: Some(title),
        ..Default::default()
    })
}

fn parse_home_data(data: &Value) -> Option<Vec<RawListing>> {
    let home = data.pointer("/props/pageProps/homeData")?;
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for key in COLLECTIONS {
        let Some(list) = home.get(*key).and_then(Value::as_array) else { continue };
        for item in list {
            let Some(id) = item.get("id").and_then(id_string) else { continue };
            if seen.insert(id) {
                items.push(item);
            }
        }
    }
    info!("Extracted {} events from __NEXT_DATA__", items.len());
    Some(items.into_iter().filter_map(listing_from_item).collect())
}

#[async_trait::async_trait]
impl SiteExtractor for EMedEventsExtractor {
    fn name(&self) -> &'static str {
        EMEDEVENTS
    }

    fn defaults(&self) -> SiteDefaults {
        let mut d = SiteDefaults::new("eMedEvents", "emed", HOME_URL);
        d.region = Region::Us;
        d.home_city = City::Online;
        d.date_order = DateOrder::MonthFirst;
        d.fixed_industry = Some("Healthcare");
        d
    }

    async fn extract(&self, page: &mut dyn PageSession, ctx: &ExtractContext) -> Result<Vec<RawListing>> {
        let Some(doc) = fetch_listing(page, HOME_URL, ctx, "eMedEvents").await else {
            return Ok(Vec::new());
        };

        if let Some(listings) = next_data(&doc.body)
            .as_ref()
            .and_then(parse_home_data)
            .filter(|found| !found.is_empty())
        {
            return Ok(listings);
        }
        warn!("No homeData in __NEXT_DATA__, reading JSON-LD");
        Ok(json_ld_events(&doc.body)
            .iter()
            .map(listing_from_jsonld)
            .filter(|l| {
                let place = [l.venue_text.as_deref(), l.address_text.as_deref()].into_iter().flatten();
                in_region(&place.collect::<Vec<_>>().join(" "), Region::Us)
            })
            .collect())
    }
}
