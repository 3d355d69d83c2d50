//! Keyword-driven industry classification and the consolidation step that
//! maps fine-grained industries onto the published set.

use std::fmt;

/// Fine-grained taxonomy, in tie-breaking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Industry {
    Technology,
    Ai,
    Finance,
    Healthcare,
    RealEstate,
    Energy,
    Education,
    Marketing,
    Legal,
    Hr,
    Logistics,
    Hospitality,
    Retail,
    Media,
    Government,
    Sustainability,
    Startup,
    General,
}

impl Industry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Industry::Technology => "Technology",
            Industry::Ai => "AI",
            Industry::Finance => "Finance",
            Industry::Healthcare => "Healthcare",
            Industry::RealEstate => "Real Estate",
            Industry::Energy => "Energy",
            Industry::Education => "Education",
            Industry::Marketing => "Marketing",
            Industry::Legal => "Legal",
            Industry::Hr => "HR",
            Industry::Logistics => "Logistics",
            Industry::Hospitality => "Hospitality",
            Industry::Retail => "Retail",
            Industry::Media => "Media",
            Industry::Government => "Government",
            Industry::Sustainability => "Sustainability",
            Industry::Startup => "Startup",
            Industry::General => "General",
        }
    }

    /// Look up a taxonomy entry by its display name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Industry> {
        let wanted = name.trim();
        KEYWORDS
            .iter()
            .map(|(industry, _)| *industry)
            .chain(std::iter::once(Industry::General))
            .find(|i| i.as_str().eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword phrases per industry. Leading/trailing spaces force whole-word hits.
pub static KEYWORDS: &[(Industry, &[&str])] = &[
    (
        Industry::Technology,
        &[
            "tech", "software", "developer", "devops", "cloud", "cyber", "iot", "blockchain", "saas",
            "digital transformation", "computing", "information technology",
        ],
    ),
    (
        Industry::Ai,
        &[
            "artificial intelligence", " ai ", "machine learning", "deep learning", "llm",
            "generative ai", "chatgpt", "data science", "robotics", "automation",
        ],
    ),
    (
        Industry::Finance,
        &[
            "finance", "fintech", "banking", "investment", "wealth", "capital", "trading",
            "insurance", "fund", "asset management", "money expo", "financial", "accounting", "audit",
        ],
    ),
    (
        Industry::Healthcare,
        &[
            "health", "medical", "pharma", "biotech", "wellness", "hospital", "clinical", "dental",
            "nursing",
        ],
    ),
    (
        Industry::RealEstate,
        &[
            "real estate", "property", "construction", "architecture", "building", "housing", "ciob",
            "chartered institute of building", "infrastructure", " ibs ",
        ],
    ),
    (
        Industry::Energy,
        &[
            "energy", "oil", "gas", "solar", "renewable", "petroleum", "power", "utilities",
            "electric vehicle", "ecomobility", "ev ", "hydrogen", "nuclear",
        ],
    ),
    (
        Industry::Education,
        &[
            "education", "university", "school", "training", "learning", "academic", "edtech",
            "skills competition", "book fair", "literacy", "scholarship",
        ],
    ),
    (
        Industry::Marketing,
        &[
            "marketing", "advertising", "brand", "social media", "seo", "content", "pr ",
            "public relations", "communications",
        ],
    ),
    (
        Industry::Legal,
        &[
            "legal", "law ", "compliance", "regulation", "governance", "attorney", "crime prevention",
            "criminal justice", "judiciary",
        ],
    ),
    (
        Industry::Hr,
        &["human resources", " hr ", "recruitment", "talent", "workforce", "employee", "hiring"],
    ),
    (
        Industry::Logistics,
        &[
            "logistics", "supply chain", "shipping", "freight", "transport", "warehouse", "trade",
            "intralogist", "paper", "tissue", "packaging", "manufacturing", "industrial",
        ],
    ),
    (
        Industry::Hospitality,
        &[
            "hospitality", "hotel", "tourism", "travel", "food", "restaurant", "f&b", "catering",
            "theme park", "iaapa", "leisure", "attractions", "expo middle east",
        ],
    ),
    (
        Industry::Retail,
        &["retail", "ecommerce", "e-commerce", "consumer", "shopping", "fashion"],
    ),
    (
        Industry::Media,
        &[
            "media", "film", "broadcast", "publishing", "journalism", "entertainment", "gaming",
            "comic con", "comic-con",
        ],
    ),
    (
        Industry::Government,
        &[
            "government", "public sector", "policy", "civic", "municipality", "federal",
            "united nations", "national resilience", "security", "defence", "defense", "military",
            "make it in the emirates",
        ],
    ),
    (
        Industry::Sustainability,
        &[
            "sustainability", "esg", "green", "climate", "carbon", "environment", "circular economy",
            "net zero", "clean energy",
        ],
    ),
    (
        Industry::Startup,
        &[
            "startup", "start-up", "venture", "entrepreneurship", "incubator", "accelerator",
            "founder", "b2b networking", "business networking", "connect | b2b", "fem-preneur",
            "business connect",
        ],
    ),
];

/// Score `text` against the keyword table. Strictly-highest hit count wins,
/// ties go to the earlier table row, zero hits return `fallback`.
pub fn classify(text: &str, fallback: Industry) -> Industry {
    let haystack = format!(" {} ", text.to_lowercase());
    let mut best = fallback;
    let mut best_score = 0usize;

    for (industry, keywords) in KEYWORDS {
        let score = keywords.iter().filter(|kw| haystack.contains(*kw)).count();
        if score > best_score {
            best = *industry;
            best_score = score;
        }
    }
    best
}

/// Published industry buckets accepted downstream.
pub const TECH_AND_AI: &str = "Tech & AI";
pub const STARTUPS: &str = "Startups";
pub const REAL_ESTATE_AND_CONSTRUCTION: &str = "Real Estate & Construction";
pub const HOSPITALITY_AND_FB: &str = "Hospitality & F&B";
pub const ENERGY_AND_GOVERNMENT: &str = "Energy & Government";
pub const GENERAL: &str = "General";

static CONSOLIDATION: &[(&str, &str)] = &[
    ("technology", TECH_AND_AI),
    ("ai", TECH_AND_AI),
    ("telecom", TECH_AND_AI),
    ("telecommunications", TECH_AND_AI),
    ("startup", STARTUPS),
    ("real estate", REAL_ESTATE_AND_CONSTRUCTION),
    ("construction", REAL_ESTATE_AND_CONSTRUCTION),
    ("hospitality", HOSPITALITY_AND_FB),
    ("food & beverage", HOSPITALITY_AND_FB),
    ("retail", HOSPITALITY_AND_FB),
    ("energy", ENERGY_AND_GOVERNMENT),
    ("government", ENERGY_AND_GOVERNMENT),
    ("agriculture", ENERGY_AND_GOVERNMENT),
    ("marketing", GENERAL),
    ("education", GENERAL),
    ("media", GENERAL),
    ("manufacturing", GENERAL),
    ("transportation", GENERAL),
];

static KEEP_AS_IS: &[&str] = &[
    "finance",
    "legal",
    "healthcare",
    "startups",
    "general",
    "tech & ai",
    "real estate & construction",
    "hospitality & f&b",
    "energy & government",
];

/// Map a raw industry name onto the published set.
///
/// Mapped names return their bucket, allow-listed names come back exactly as
/// given, anything else lands in `General`.
pub fn consolidate(raw: &str) -> String {
    let key = raw.trim().to_lowercase();
    if let Some((_, bucket)) = CONSOLIDATION.iter().find(|(name, _)| *name == key) {
        return (*bucket).to_string();
    }
    if KEEP_AS_IS.contains(&key.as_str()) {
        return raw.trim().to_string();
    }
    GENERAL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_count_wins() {
        assert_eq!(
            classify("Dubai FinTech Banking & Investment Forum", Industry::General),
            Industry::Finance
        );
        assert_eq!(classify("Arab Health 2026 medical congress", Industry::General), Industry::Healthcare);
    }

    #[test]
    fn ties_go_to_first_declared_and_are_stable() {
        // "tech" (inside fintech), " ai " and "fintech" score one hit each.
        let first = classify("AI Summit Dubai fintech panel", Industry::General);
        for _ in 0..10 {
            assert_eq!(classify("AI Summit Dubai fintech panel", Industry::General), first);
        }
        assert_eq!(first, Industry::Technology);

        // One hit each for Technology and AI: the earlier row wins.
        assert_eq!(classify("cloud robotics", Industry::General), Industry::Technology);
    }

    #[test]
    fn whole_word_keywords_need_boundaries() {
        assert_eq!(classify("AI", Industry::General), Industry::Ai);
        assert_eq!(classify("Dubai Fair", Industry::General), Industry::General);
    }

    #[test]
    fn no_hits_returns_fallback() {
        assert_eq!(classify("Annual gathering", Industry::Legal), Industry::Legal);
        assert_eq!(classify("", Industry::General), Industry::General);
    }

    #[test]
    fn consolidation_table() {
        assert_eq!(consolidate("telecom"), "Tech & AI");
        assert_eq!(consolidate("Technology"), "Tech & AI");
        assert_eq!(consolidate("AI"), "Tech & AI");
        assert_eq!(consolidate("finance"), "finance");
        assert_eq!(consolidate("Finance"), "Finance");
        assert_eq!(consolidate("Startup"), "Startups");
        assert_eq!(consolidate("Real Estate"), "Real Estate & Construction");
        assert_eq!(consolidate("Marketing"), "General");
        assert_eq!(consolidate("unknown-xyz"), "General");
        assert_eq!(consolidate("Sustainability"), "General");
    }

    #[test]
    fn looks_up_by_name() {
        assert_eq!(Industry::from_name("real estate"), Some(Industry::RealEstate));
        assert_eq!(Industry::from_name("General"), Some(Industry::General));
        assert_eq!(Industry::from_name("Telecom"), None);
    }
}
