use crate::app::ports::PageSession;
use crate::error::Result;
use crate::pipeline::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Canonical event record posted to the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub description: String,
    #[serde(with = "iso_millis")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(with = "iso_millis")]
    pub end_date: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub city: City,
    pub organizer: Option<String>,
    pub industry: String,
    pub is_free: bool,
    pub registration_url: Option<String>,
    pub image_url: Option<String>,
    pub source: String,
    pub source_event_id: String,
}

impl Event {
    /// Number of populated optional fields, used to rank duplicates.
    pub fn completeness(&self) -> usize {
        let filled = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());
        [
            !self.description.trim().is_empty(),
            self.start_date.is_some(),
            self.end_date.is_some(),
            filled(&self.venue_name),
            filled(&self.venue_address),
            filled(&self.organizer),
            filled(&self.registration_url),
            filled(&self.image_url),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix, `null` when absent.
pub mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.format(FORMAT).to_string()
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&format(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Permitted event cities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum City {
    Dubai,
    #[serde(rename = "Abu Dhabi")]
    AbuDhabi,
    Sharjah,
    Ajman,
    #[serde(rename = "Ras Al Khaimah")]
    RasAlKhaimah,
    Fujairah,
    #[serde(rename = "Umm Al Quwain")]
    UmmAlQuwain,
    Austin,
    #[serde(rename = "San Francisco")]
    SanFrancisco,
    #[serde(rename = "New York")]
    NewYork,
    Miami,
    Chicago,
    #[serde(rename = "Los Angeles")]
    LosAngeles,
    Seattle,
    Denver,
    Boston,
    #[serde(rename = "Washington DC")]
    WashingtonDc,
    Houston,
    Dallas,
    Philadelphia,
    Atlanta,
    Nashville,
    Phoenix,
    Tampa,
    Charleston,
    Online,
}

impl City {
    pub fn as_str(&self) -> &'static str {
        match self {
            City::Dubai => "Dubai",
            City::AbuDhabi => "Abu Dhabi",
            City::Sharjah => "Sharjah",
            City::Ajman => "Ajman",
            City::RasAlKhaimah => "Ras Al Khaimah",
            City::Fujairah => "Fujairah",
            City::UmmAlQuwain => "Umm Al Quwain",
            City::Austin => "Austin",
            City::SanFrancisco => "San Francisco",
            City::NewYork => "New York",
            City::Miami => "Miami",
            City::Chicago => "Chicago",
            City::LosAngeles => "Los Angeles",
            City::Seattle => "Seattle",
            City::Denver => "Denver",
            City::Boston => "Boston",
            City::WashingtonDc => "Washington DC",
            City::Houston => "Houston",
            City::Dallas => "Dallas",
            City::Philadelphia => "Philadelphia",
            City::Atlanta => "Atlanta",
            City::Nashville => "Nashville",
            City::Phoenix => "Phoenix",
            City::Tampa => "Tampa",
            City::Charleston => "Charleston",
            City::Online => "Online",
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Region a site covers; drives city detection and geographic filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Uae,
    Us,
}

/// Convention for ambiguous all-numeric dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateOrder {
    #[default]
    MonthFirst,
    DayFirst,
}

/// Whatever fields a site exposes for one listing, still unnormalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawListing {
    pub title: Option<String>,
    pub native_id: Option<String>,
    pub href: Option<String>,
    pub date_text: Option<String>,
    pub end_date_text: Option<String>,
    /// Set for open-ended exhibitions ("Available till ...").
    pub ongoing_until: Option<String>,
    pub venue_text: Option<String>,
    pub address_text: Option<String>,
    pub location_text: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub organizer: Option<String>,
    pub category: Option<String>,
    pub city_hint: Option<String>,
    pub is_free: Option<bool>,
}

impl RawListing {
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Default::default() }
    }
}

/// Per-site values the mapper falls back to.
#[derive(Debug, Clone)]
pub struct SiteDefaults {
    pub source: &'static str,
    pub id_prefix: &'static str,
    pub base_url: &'static str,
    pub region: Region,
    pub home_city: City,
    pub organizer: Option<&'static str>,
    pub venue_name: Option<&'static str>,
    pub venue_address: Option<&'static str>,
    pub fixed_industry: Option<&'static str>,
    pub fallback_industry: &'static str,
    pub date_order: DateOrder,
    pub allow_ongoing: bool,
}

impl SiteDefaults {
    pub fn new(source: &'static str, id_prefix: &'static str, base_url: &'static str) -> Self {
        Self {
            source,
            id_prefix,
            base_url,
            region: Region::Uae,
            home_city: City::Dubai,
            organizer: None,
            venue_name: None,
            venue_address: None,
            fixed_industry: None,
            fallback_industry: "General",
            date_order: DateOrder::DayFirst,
            allow_ongoing: false,
        }
    }
}

/// Pacing and bounds handed to each extractor for one run.
#[derive(Debug, Clone)]
pub struct ExtractContext {
    pub retry: RetryPolicy,
    pub detail_pause: Duration,
    pub max_load_more: u32,
    pub max_detail_pages: usize,
}

impl Default for ExtractContext {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            detail_pause: Duration::from_millis(1500),
            max_load_more: 10,
            max_detail_pages: 60,
        }
    }
}

impl ExtractContext {
    /// Zero delays, for offline runs.
    pub fn immediate() -> Self {
        Self {
            retry: RetryPolicy::immediate(3),
            detail_pause: Duration::ZERO,
            ..Default::default()
        }
    }
}

/// A site-specific extraction strategy.
#[async_trait::async_trait]
pub trait SiteExtractor: Send + Sync {
    /// Configuration key, e.g. `difc`.
    fn name(&self) -> &'static str;

    fn defaults(&self) -> SiteDefaults;

    /// Title prefixes of umbrella events reported once per hall or zone.
    fn sub_zone_prefixes(&self) -> &'static [&'static str] {
        &[]
    }

    /// Pull raw listings using the lent page session.
    async fn extract(
        &self,
        page: &mut dyn PageSession,
        ctx: &ExtractContext,
    ) -> Result<Vec<RawListing>>;
}
