/// Extractor names, used as `[scrapers.<name>]` keys and on the command line.
pub const DIFC: &str = "difc";
pub const DWTC: &str = "dwtc";
pub const EXPOCITY: &str = "expocity";
pub const TERRAPINN: &str = "terrapinn";
pub const ADNEC: &str = "adnec";
pub const DMG: &str = "dmg";
pub const AMS: &str = "ams";
pub const CLIO: &str = "clio";
pub const PRIMED: &str = "primed";
pub const STARTUPGRIND: &str = "startupgrind";
pub const MEETUP: &str = "meetup";
pub const EMEDEVENTS: &str = "emedevents";
pub const INFORMA: &str = "informa";
pub const USCHAMBER: &str = "uschamber";
pub const ADGM: &str = "adgm";

/// Every extractor in run order.
pub fn get_supported_extractors() -> Vec<&'static str> {
    vec![
        DIFC, DWTC, EXPOCITY, TERRAPINN, ADNEC, DMG, AMS, CLIO, PRIMED, STARTUPGRIND, MEETUP, EMEDEVENTS,
        INFORMA, USCHAMBER, ADGM,
    ]
}
