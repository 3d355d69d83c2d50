//! City detection and region filtering over free-text location fields.

use crate::types::{City, Region};
use once_cell::sync::Lazy;
use regex::Regex;

// More specific names first so "Abu Dhabi, near Dubai" resolves to Abu Dhabi.
static UAE_CITIES: &[(City, &[&str])] = &[
    (City::AbuDhabi, &["abu dhabi", "abudhabi", "adnec", "yas island", "saadiyat", "al maryah"]),
    (City::Sharjah, &["sharjah"]),
    (City::Ajman, &["ajman"]),
    (City::RasAlKhaimah, &["ras al khaimah", "ras al-khaimah"]),
    (City::Fujairah, &["fujairah"]),
    (City::UmmAlQuwain, &["umm al quwain", "umm al-quwain"]),
    (City::Dubai, &["dubai", "difc", "jumeirah"]),
];

static US_CITIES: &[(City, &[&str])] = &[
    (City::SanFrancisco, &["san francisco", "bay area"]),
    (City::NewYork, &["new york", "nyc", "brooklyn", "manhattan"]),
    (City::LosAngeles, &["los angeles", "pasadena", "anaheim"]),
    (City::WashingtonDc, &["washington, dc", "washington dc", "washington, d.c", "washington d.c"]),
    (City::Austin, &["austin"]),
    (City::Miami, &["miami"]),
    (City::Chicago, &["chicago", "rosemont"]),
    (City::Seattle, &["seattle"]),
    (City::Denver, &["denver"]),
    (City::Boston, &["boston"]),
    (City::Houston, &["houston"]),
    (City::Dallas, &["dallas", "irving"]),
    (City::Philadelphia, &["philadelphia"]),
    (City::Atlanta, &["atlanta"]),
    (City::Nashville, &["nashville"]),
    (City::Phoenix, &["phoenix", "scottsdale"]),
    (City::Tampa, &["tampa"]),
    (City::Charleston, &["charleston"]),
];

static UAE_COUNTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:uae|u\.a\.e|united arab emirates)\b").unwrap());

static US_COUNTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:usa|u\.s\.a|united states)\b").unwrap());

static US_STATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:,\s*|\s)(?:AL|AK|AZ|AR|CA|CO|CT|DE|FL|GA|HI|ID|IL|IN|IA|KS|KY|LA|ME|MD|MA|MI|MN|MS|MO|MT|NE|NV|NH|NJ|NM|NY|NC|ND|OH|OK|OR|PA|RI|SC|SD|TN|TX|UT|VT|VA|WA|WV|WI|WY|DC)\b",
    )
    .unwrap()
});

static US_STATE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:alabama|alaska|arizona|arkansas|california|colorado|connecticut|delaware|florida|georgia|hawaii|idaho|illinois|indiana|iowa|kansas|kentucky|louisiana|maine|maryland|massachusetts|michigan|minnesota|mississippi|missouri|montana|nebraska|nevada|new hampshire|new jersey|new mexico|north carolina|north dakota|ohio|oklahoma|oregon|pennsylvania|rhode island|south carolina|south dakota|tennessee|texas|utah|vermont|virginia|wisconsin|wyoming)\b",
    )
    .unwrap()
});

static ONLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:online|virtual|webinar|livestream|on-demand)\b").unwrap());

fn table(region: Region) -> &'static [(City, &'static [&'static str])] {
    match region {
        Region::Uae => UAE_CITIES,
        Region::Us => US_CITIES,
    }
}

/// First permitted city of `region` mentioned in `text`.
pub fn detect_city(text: &str, region: Region) -> Option<City> {
    let lower = text.to_lowercase();
    table(region)
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(city, _)| *city)
}

/// Resolve a city from a list of candidate fields, most reliable first.
pub fn resolve_city<'a, I>(fields: I, region: Region) -> Option<City>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    fields
        .into_iter()
        .flatten()
        .find_map(|text| detect_city(text, region))
}

/// Whether `text` places an event inside `region`.
pub fn in_region(text: &str, region: Region) -> bool {
    if detect_city(text, region).is_some() {
        return true;
    }
    match region {
        Region::Uae => UAE_COUNTRY.is_match(text),
        Region::Us => US_COUNTRY.is_match(text) || US_STATE.is_match(text) || US_STATE_NAME.is_match(text),
    }
}

pub fn looks_online(text: &str) -> bool {
    ONLINE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_uae_cities_specific_first() {
        assert_eq!(detect_city("ADNEC Centre Abu Dhabi", Region::Uae), Some(City::AbuDhabi));
        assert_eq!(detect_city("Expo Centre Sharjah, UAE", Region::Uae), Some(City::Sharjah));
        assert_eq!(detect_city("Madinat Jumeirah", Region::Uae), Some(City::Dubai));
        assert_eq!(detect_city("Riyadh, Saudi Arabia", Region::Uae), None);
    }

    #[test]
    fn detects_us_cities() {
        assert_eq!(detect_city("Donald E. Stephens Convention Center, Rosemont, IL", Region::Us), Some(City::Chicago));
        assert_eq!(detect_city("Irving Convention Center", Region::Us), Some(City::Dallas));
        assert_eq!(detect_city("Washington, DC 20062", Region::Us), Some(City::WashingtonDc));
    }

    #[test]
    fn resolves_first_field_with_a_hit() {
        let city = resolve_city([None, Some("Main Hall"), Some("Dubai World Trade Centre")], Region::Uae);
        assert_eq!(city, Some(City::Dubai));
    }

    #[test]
    fn region_membership() {
        assert!(in_region("Abu Dhabi National Exhibition Centre", Region::Uae));
        assert!(in_region("Some venue, United Arab Emirates", Region::Uae));
        assert!(!in_region("Riyadh Front, Saudi Arabia", Region::Uae));
        assert!(in_region("Orlando, FL", Region::Us));
        assert!(in_region("Kansas City, Missouri", Region::Us));
        assert!(!in_region("London, United Kingdom", Region::Us));
    }

    #[test]
    fn online_markers() {
        assert!(looks_online("Live Webinar"));
        assert!(!looks_online("Dubai Marina"));
    }
}
