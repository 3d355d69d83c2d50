//! Duplicate removal at two levels: hall/zone variants within one site, and
//! identical upsert keys across the whole run.

use crate::types::Event;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

static SUB_ZONE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*[-–—|:,(]?\s*(?:hall|zone|pavilion|stage|arena)\s*[\w.]*\)?\s*$").unwrap()
});

/// Grouping key for a title, and whether a prefix or hall suffix was matched.
fn zone_key(title: &str, prefixes: &[&str]) -> (String, bool) {
    let lower = title.trim().to_lowercase();
    let lower = lower.strip_prefix("the ").unwrap_or(&lower).to_string();
    for prefix in prefixes {
        let p = prefix.trim().to_lowercase();
        let p = p.strip_prefix("the ").unwrap_or(&p);
        if !p.is_empty() && lower.starts_with(p) {
            return (format!("prefix:{p}"), true);
        }
    }
    let stripped = SUB_ZONE_SUFFIX.replace(&lower, "").trim().to_string();
    let matched = stripped != lower;
    (stripped, matched)
}

/// Collapse per-hall or per-zone variants of one umbrella event, keeping the
/// shortest title. Order of first appearance is preserved.
///
/// Two records with the same plain title and different ids are separate
/// occurrences and are both kept.
pub fn collapse_sub_zones(events: Vec<Event>, prefixes: &[&str]) -> Vec<Event> {
    let mut index: HashMap<String, (usize, bool)> = HashMap::new();
    let mut kept: Vec<Event> = Vec::with_capacity(events.len());

    for event in events {
        let (key, matched) = zone_key(&event.title, prefixes);
        match index.get(&key).copied() {
            Some((i, kept_matched))
                if matched || kept_matched || event.source_event_id == kept[i].source_event_id =>
            {
                if event.title.chars().count() < kept[i].title.chars().count() {
                    debug!(kept = %event.title, dropped = %kept[i].title, "Collapsed sub-zone variant");
                    kept[i] = event;
                    index.insert(key, (i, kept_matched || matched));
                } else {
                    debug!(kept = %kept[i].title, dropped = %event.title, "Collapsed sub-zone variant");
                }
            }
            Some(_) => kept.push(event),
            None => {
                index.insert(key, (kept.len(), matched));
                kept.push(event);
            }
        }
    }
    kept
}

/// Remove duplicate `(source, source_event_id)` keys across the run.
///
/// The first record wins unless a later one has strictly more populated
/// fields, in which case the later record takes the earlier one's slot.
pub fn dedupe(events: Vec<Event>) -> Vec<Event> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut kept: Vec<Event> = Vec::with_capacity(events.len());

    for event in events {
        let key = (event.source.clone(), event.source_event_id.clone());
        match index.get(&key).copied() {
            Some(i) => {
                if event.completeness() > kept[i].completeness() {
                    debug!(id = %event.source_event_id, "Replacing duplicate with more complete record");
                    kept[i] = event;
                } else {
                    debug!(id = %event.source_event_id, "Dropping duplicate record");
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(event);
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::City;

    fn event(title: &str, id: &str) -> Event {
        Event {
            title: title.into(),
            description: String::new(),
            start_date: None,
            end_date: None,
            venue_name: None,
            venue_address: None,
            city: City::AbuDhabi,
            organizer: None,
            industry: "General".into(),
            is_free: false,
            registration_url: None,
            image_url: None,
            source: "DMG".into(),
            source_event_id: id.into(),
        }
    }

    #[test]
    fn collapses_hall_suffix_to_shorter_title() {
        let out = collapse_sub_zones(
            vec![event("ADIPEC 2026 - Hall 3", "dmg-a"), event("ADIPEC 2026", "dmg-b")],
            &[],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "ADIPEC 2026");
    }

    #[test]
    fn collapses_by_prefix_table() {
        let out = collapse_sub_zones(
            vec![
                event("The Big 5 Construct Saudi", "dmg-1"),
                event("Big 5 Global", "dmg-2"),
                event("Middle East Energy", "dmg-3"),
            ],
            &["ADIPEC", "Big 5", "The Big 5"],
        );
        let titles: Vec<_> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Big 5 Global", "Middle East Energy"]);
    }

    #[test]
    fn recurring_events_with_the_same_title_survive() {
        let out = collapse_sub_zones(
            vec![event("Dubai AI Builders Monthly", "meetup-301"), event("Dubai AI Builders Monthly", "meetup-302")],
            &[],
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn distinct_events_survive() {
        let out = collapse_sub_zones(vec![event("Gulfood", "a"), event("Gitex", "b")], &[]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn first_record_wins_on_equal_completeness() {
        let mut a = event("First", "dmg-x");
        a.venue_name = Some("ADNEC".into());
        let mut b = event("Second", "dmg-x");
        b.organizer = Some("DMG".into());
        let out = dedupe(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "First");
    }

    #[test]
    fn more_complete_later_record_replaces() {
        let a = event("Sparse", "dmg-x");
        let mut b = event("Rich", "dmg-x");
        b.venue_name = Some("ADNEC".into());
        let c = event("Other", "dmg-y");
        let out = dedupe(vec![a, c, b]);
        let titles: Vec<_> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Rich", "Other"]);
    }

    #[test]
    fn same_id_different_source_is_not_a_duplicate() {
        let a = event("A", "x-1");
        let mut b = event("B", "x-1");
        b.source = "DWTC".into();
        assert_eq!(dedupe(vec![a, b]).len(), 2);
    }
}
