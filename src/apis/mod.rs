pub mod adgm;
pub mod adnec;
pub mod ams;
pub mod base;
pub mod clio;
pub mod difc;
pub mod dmg;
pub mod dwtc;
pub mod emedevents;
pub mod expocity;
pub mod informa;
pub mod meetup;
pub mod primed;
pub mod startupgrind;
pub mod terrapinn;
pub mod uschamber;

use crate::constants;
use crate::types::SiteExtractor;

pub fn create_extractor(name: &str) -> Option<Box<dyn SiteExtractor>> {
    match name {
        constants::DIFC => Some(Box::new(difc::DifcExtractor::new())),
        constants::DWTC => Some(Box::new(dwtc::DwtcExtractor::new())),
        constants::EXPOCITY => Some(Box::new(expocity::ExpoCityExtractor::new())),
        constants::TERRAPINN => Some(Box::new(terrapinn::TerrapinnExtractor::new())),
        constants::ADNEC => Some(Box::new(adnec::AdnecExtractor::new())),
        constants::DMG => Some(Box::new(dmg::DmgExtractor::new())),
        constants::AMS => Some(Box::new(ams::AmsExtractor::new())),
        constants::CLIO => Some(Box::new(clio::ClioExtractor::new())),
        constants::PRIMED => Some(Box::new(primed::PriMedExtractor::new())),
        constants::STARTUPGRIND => Some(Box::new(startupgrind::StartupGrindExtractor::new())),
        constants::MEETUP => Some(Box::new(meetup::MeetupExtractor::new())),
        constants::EMEDEVENTS => Some(Box::new(emedevents::EMedEventsExtractor::new())),
        constants::INFORMA => Some(Box::new(informa::InformaExtractor::new())),
        constants::USCHAMBER => Some(Box::new(uschamber::UsChamberExtractor::new())),
        constants::ADGM => Some(Box::new(adgm::AdgmExtractor::new())),
        _ => None,
    }
}

/// Every extractor, in run order.
pub fn all_extractors() -> Vec<Box<dyn SiteExtractor>> {
    constants::get_supported_extractors().into_iter().filter_map(create_extractor).collect()
}
