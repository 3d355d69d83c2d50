use crate::observability::metrics::RunMetrics;
use crate::pipeline::processing::dates::{parse_date_with, parse_span};
use crate::pipeline::processing::geo::resolve_city;
use crate::pipeline::processing::industry::{classify, consolidate, Industry};
use crate::types::{Event, RawListing, SiteDefaults};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

pub const MAX_DESCRIPTION_CHARS: usize = 5000;

/// Turns raw listings into canonical events for one run.
#[derive(Debug, Clone, Copy)]
pub struct RecordMapper {
    today: NaiveDate,
}

impl RecordMapper {
    /// `today` is the start date given to open-ended exhibitions.
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Map every listing, dropping the unusable ones.
    pub fn map_all(&self, raws: &[RawListing], defaults: &SiteDefaults) -> Vec<Event> {
        raws.iter().filter_map(|raw| self.map(raw, defaults)).collect()
    }

    /// `None` when the listing has no title or no usable start date.
    pub fn map(&self, raw: &RawListing, defaults: &SiteDefaults) -> Option<Event> {
        let source = defaults.source;
        let title = match raw.title.as_deref().map(clean_text).filter(|t| !t.is_empty()) {
            Some(t) => t,
            None => {
                warn!(source, href = ?raw.href, "Dropping listing without a title");
                RunMetrics::record_dropped(source, "missing_title");
                return None;
            }
        };

        let (start_date, end_date) = match self.resolve_dates(raw, defaults) {
            Some(dates) => dates,
            None => {
                warn!(source, title = %title, date_text = ?raw.date_text, "Dropping listing without a parseable date");
                RunMetrics::record_dropped(source, "unparseable_date");
                return None;
            }
        };
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                warn!(source, title = %title, "End date precedes start date, passing through");
            }
        }

        let description = raw
            .description
            .as_deref()
            .map(|d| truncate_chars(&clean_text(d), MAX_DESCRIPTION_CHARS))
            .unwrap_or_default();

        let industry = self.resolve_industry(&title, raw, defaults);

        let city = resolve_city(
            [
                raw.city_hint.as_deref(),
                raw.address_text.as_deref(),
                raw.venue_text.as_deref(),
                raw.location_text.as_deref(),
                Some(title.as_str()),
                Some(description.as_str()),
            ],
            defaults.region,
        )
        .unwrap_or(defaults.home_city);

        let source_event_id = build_source_event_id(defaults.id_prefix, raw.native_id.as_deref(), &title);

        Some(Event {
            description,
            start_date,
            end_date,
            venue_name: non_empty(raw.venue_text.as_deref()).or(defaults.venue_name.map(str::to_string)),
            venue_address: non_empty(raw.address_text.as_deref()).or(defaults.venue_address.map(str::to_string)),
            city,
            organizer: non_empty(raw.organizer.as_deref()).or(defaults.organizer.map(str::to_string)),
            industry,
            is_free: raw.is_free.unwrap_or(false),
            registration_url: raw.href.as_deref().and_then(|h| absolutize(defaults.base_url, h)),
            image_url: raw.image_url.as_deref().and_then(|h| absolutize(defaults.base_url, h)),
            source: source.to_string(),
            source_event_id,
            title,
        })
    }

    fn resolve_dates(
        &self,
        raw: &RawListing,
        defaults: &SiteDefaults,
    ) -> Option<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        let order = defaults.date_order;
        let (start, mut end) = raw
            .date_text
            .as_deref()
            .map(|text| parse_span(text, order))
            .unwrap_or((None, None));
        if let Some(explicit_end) = raw.end_date_text.as_deref().and_then(|t| parse_date_with(t, order)) {
            end = Some(explicit_end);
        }

        if let Some(start) = start {
            return Some((Some(start), end));
        }

        if defaults.allow_ongoing {
            if let Some(until) = raw.ongoing_until.as_deref() {
                let start = self.today.and_hms_opt(0, 0, 0).map(|d| Utc.from_utc_datetime(&d));
                let end = parse_date_with(until, order).or(end);
                return Some((start, end));
            }
        }
        None
    }

    fn resolve_industry(&self, title: &str, raw: &RawListing, defaults: &SiteDefaults) -> String {
        if let Some(fixed) = defaults.fixed_industry {
            return consolidate(fixed);
        }
        let fallback = Industry::from_name(defaults.fallback_industry).unwrap_or(Industry::General);
        let text = [Some(title), raw.category.as_deref(), raw.description.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        consolidate(classify(&text, fallback).as_str())
    }
}

/// `<prefix>-<native id>`, else `<prefix>-<title slug>`.
///
/// The title fallback changes whenever the site edits a title, so such ids
/// are only as stable as the title itself.
pub fn build_source_event_id(prefix: &str, native_id: Option<&str>, title: &str) -> String {
    if let Some(native) = native_id.map(|n| n.trim().trim_matches('/')).filter(|n| !n.is_empty()) {
        return format!("{prefix}-{native}");
    }
    let slug = slugify(title);
    if !slug.is_empty() {
        debug!(prefix, title, "No native id, using title slug");
        return format!("{prefix}-{slug}");
    }
    let digest = Sha256::digest(title.trim().to_lowercase().as_bytes());
    debug!(prefix, title, "No native id or slug, using title hash");
    format!("{prefix}-{}", &hex::encode(digest)[..12])
}

/// Lowercase ASCII slug with single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Collapse runs of whitespace.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Resolve `href` against `base`; `None` for non-http links.
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with("mailto:") {
        return None;
    }
    let resolved = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(href).ok()?,
        Err(_) => return None,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(clean_text).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{City, Region};

    fn defaults() -> SiteDefaults {
        let mut d = SiteDefaults::new("DWTC", "dwtc", "https://www.dwtc.com/en/events");
        d.venue_name = Some("Dubai World Trade Centre");
        d.organizer = Some("DWTC");
        d
    }

    fn mapper() -> RecordMapper {
        RecordMapper::new(NaiveDate::from_ymd_opt(2026, 1, 10).unwrap())
    }

    #[test]
    fn maps_a_complete_listing() {
        let raw = RawListing {
            title: Some("  Gulfood   2026 ".into()),
            native_id: Some("gulfood-2026".into()),
            href: Some("/en/events/gulfood-2026/".into()),
            date_text: Some("26 - 30 Jan 2026".into()),
            category: Some("Food & Beverage".into()),
            ..Default::default()
        };
        let event = mapper().map(&raw, &defaults()).unwrap();
        assert_eq!(event.title, "Gulfood 2026");
        assert_eq!(event.source, "DWTC");
        assert_eq!(event.source_event_id, "dwtc-gulfood-2026");
        assert_eq!(event.registration_url.as_deref(), Some("https://www.dwtc.com/en/events/gulfood-2026/"));
        assert_eq!(event.industry, "Hospitality & F&B");
        assert_eq!(event.city, City::Dubai);
        assert_eq!(event.venue_name.as_deref(), Some("Dubai World Trade Centre"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["start_date"], "2026-01-26T00:00:00.000Z");
        assert_eq!(json["end_date"], "2026-01-30T00:00:00.000Z");
    }

    #[test]
    fn drops_dateless_listing() {
        let raw = RawListing { date_text: Some("Coming soon".into()), ..RawListing::titled("Mystery Expo") };
        assert!(mapper().map(&raw, &defaults()).is_none());
    }

    #[test]
    fn drops_titleless_listing() {
        let raw = RawListing { date_text: Some("4 Feb 2026".into()), title: Some("   ".into()), ..Default::default() };
        assert!(mapper().map(&raw, &defaults()).is_none());
    }

    #[test]
    fn ongoing_rule_starts_today() {
        let mut d = defaults();
        d.allow_ongoing = true;
        let raw = RawListing { ongoing_until: Some("30 Apr 2026".into()), ..RawListing::titled("Art Installation") };
        let event = mapper().map(&raw, &d).unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["start_date"], "2026-01-10T00:00:00.000Z");
        assert_eq!(json["end_date"], "2026-04-30T00:00:00.000Z");

        // Without the site rule the same listing is dropped.
        assert!(mapper().map(&raw, &defaults()).is_none());
    }

    #[test]
    fn reversed_dates_pass_through() {
        let raw = RawListing {
            date_text: Some("10 Mar 2026".into()),
            end_date_text: Some("1 Mar 2026".into()),
            ..RawListing::titled("Backwards Forum")
        };
        let event = mapper().map(&raw, &defaults()).unwrap();
        assert!(event.end_date < event.start_date);
    }

    #[test]
    fn fixed_industry_and_city_detection() {
        let mut d = SiteDefaults::new("ADGM", "adgm", "https://www.adgm.com/events");
        d.fixed_industry = Some("Finance");
        d.home_city = City::AbuDhabi;
        let raw = RawListing {
            date_text: Some("2026-03-02".into()),
            venue_text: Some("Four Seasons, Al Maryah Island".into()),
            ..RawListing::titled("AI in Banking Roundtable")
        };
        let event = mapper().map(&raw, &d).unwrap();
        assert_eq!(event.industry, "Finance");
        assert_eq!(event.city, City::AbuDhabi);

        let mut us = SiteDefaults::new("AMS", "ams", "https://www.americanmedicalseminars.com/");
        us.region = Region::Us;
        us.home_city = City::Online;
        let raw = RawListing {
            date_text: Some("March 5, 2026".into()),
            location_text: Some("Hilton, Tampa, FL".into()),
            ..RawListing::titled("Primary Care Review")
        };
        assert_eq!(mapper().map(&raw, &us).unwrap().city, City::Tampa);
    }

    #[test]
    fn source_event_id_is_deterministic() {
        assert_eq!(build_source_event_id("difc", Some("/fintech-week/"), "x"), "difc-fintech-week");
        assert_eq!(build_source_event_id("dmg", None, "The Big 5 Global!"), "dmg-the-big-5-global");
        let hashed = build_source_event_id("dmg", None, "???");
        assert_eq!(hashed, build_source_event_id("dmg", None, "???"));
        assert_eq!(hashed.len(), "dmg-".len() + 12);
    }

    #[test]
    fn truncates_on_char_boundaries() {
        let text = "é".repeat(MAX_DESCRIPTION_CHARS + 10);
        assert_eq!(truncate_chars(&text, MAX_DESCRIPTION_CHARS).chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn absolutizes_links() {
        assert_eq!(
            absolutize("https://www.difc.com/whats-on/events", "/whats-on/events/x").as_deref(),
            Some("https://www.difc.com/whats-on/events/x")
        );
        assert_eq!(absolutize("https://a.com/", "mailto:x@y.z"), None);
        assert_eq!(absolutize("https://a.com/", "https://b.com/e").as_deref(), Some("https://b.com/e"));
    }
}
