//! Allow/deny title classification for venues that mix trade events with
//! lifestyle programming.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    /// Matched a deny pattern.
    Denied(String),
    /// Matched nothing on the allow list.
    NotProfessional,
}

impl Verdict {
    pub fn is_keep(&self) -> bool {
        matches!(self, Verdict::Keep)
    }
}

pub struct TitleFilter {
    deny: Vec<Regex>,
    allow: Vec<Regex>,
}

impl TitleFilter {
    /// Build from case-insensitive pattern sources.
    pub fn new(deny: &[&str], allow: &[&str]) -> Result<Self, regex::Error> {
        let compile = |patterns: &[&str]| -> Result<Vec<Regex>, regex::Error> {
            patterns.iter().map(|p| Regex::new(&format!("(?i){p}"))).collect()
        };
        Ok(Self { deny: compile(deny)?, allow: compile(allow)? })
    }

    /// Deny list first, then at least one allow hit is required.
    pub fn verdict(&self, title: &str) -> Verdict {
        if let Some(re) = self.deny.iter().find(|re| re.is_match(title)) {
            return Verdict::Denied(re.as_str().trim_start_matches("(?i)").to_string());
        }
        if self.allow.iter().any(|re| re.is_match(title)) {
            Verdict::Keep
        } else {
            Verdict::NotProfessional
        }
    }
}

const LIFESTYLE_PATTERNS: &[&str] = &[
    r"\byoga\b", r"\bpilates\b", r"\bfitness\b", r"\bzumba\b",
    r"\bkids?\b", r"\bchildren\b", r"\bjunior\b", r"\bfamily fun\b",
    r"\bmovie\b", r"\bcinema\b", r"\bfilm screening\b", r"\bshort films?\b",
    r"\bconcert\b", r"\blive music\b", r"\bstand.?up\b", r"\bcomedy\b",
    r"\bballet\b", r"\bdance class\b", r"\bchoir\b", r"\borchestra\b",
    r"\bcooking class\b", r"\bcraft\b", r"\bpainting\b", r"\bart workshop\b",
    r"\bart exhibition\b", r"\blight art\b",
    r"\bbirthday\b", r"\bbrunch\b", r"\bnight market\b", r"\bpop.?up\b",
    r"\bgarden\b", r"\bplant\b", r"\bnature walk\b",
    r"\bskating\b", r"\bswimming\b", r"\bsports camp\b",
    r"\bmarathon\b", r"\bhalf marathon\b", r"\brun\s", r"\bcycle\b",
    r"\bduathlon\b", r"\btriathlon\b", r"\bfitfest\b",
    r"\bcamp\b", r"\bwinter city\b", r"\bcarols\b", r"\bnew year\b",
    r"\bcelebrat", r"\bnational day\b", r"\beid\b", r"\bramadan\b",
    r"\biftar\b", r"\bhag al laila\b",
    r"\bwomen'?s day\b", r"\bwomen'?s run\b",
    r"\btechno festival\b", r"\besports\b", r"\bgaming\b",
    r"\bopera\b", r"\bclassical\b",
    r"\bwellness\b", r"\bsephori",
    r"green day live", r"eric prydz", r"holo in dubai",
];

const PROFESSIONAL_PATTERNS: &[&str] = &[
    r"\bsummit\b", r"\bconference\b", r"\bcongress\b", r"\bforum\b",
    r"\bexpo\b", r"\bexhibition\b", r"\btrade show\b",
    r"\bsymposium\b", r"\bseminar\b",
    r"\bindustry\b", r"\bb2b\b", r"\bprofessional\b",
    r"\bgulfood\b", r"\bwhx\b", r"\bgitex\b", r"\bwetex\b",
    r"\bbeautyworld\b", r"\bautomechanika\b",
    r"\bworld health\b", r"\binnovators\b",
    r"\bcarbon assessment\b", r"\bsustainable\b",
    r"\bcities.*summit\b", r"\bmayors\b",
];

/// Trade-event filter for mixed-programming venues.
pub static PROFESSIONAL_EVENTS: Lazy<TitleFilter> = Lazy::new(|| {
    TitleFilter::new(LIFESTYLE_PATTERNS, PROFESSIONAL_PATTERNS)
        .expect("built-in title patterns compile")
});

/// Venue-calendar terms that mark a trade show even without a conference
/// keyword.
const TRADE_SHOW_PATTERNS: &[&str] = &[
    r"\bshow\b", r"\bfair\b", r"\bweek\b", r"\bidex\b", r"\bnavdex\b", r"\badipec\b",
];

/// [`PROFESSIONAL_EVENTS`] widened with trade-show wording, for exhibition
/// centres whose calendars are mostly shows.
pub static TRADE_EVENTS: Lazy<TitleFilter> = Lazy::new(|| {
    let allow: Vec<&str> = PROFESSIONAL_PATTERNS.iter().chain(TRADE_SHOW_PATTERNS).copied().collect();
    TitleFilter::new(LIFESTYLE_PATTERNS, &allow).expect("built-in title patterns compile")
});
