/// Article categories the feed recognises. Profile interests and AI labels map onto these.
pub const TAXONOMY: &[&str] = &[
    "Child Development",
    "Parenting Tips",
    "ADHD",
    "Autism",
    "Anxiety",
    "Sensory Processing",
    "Speech and Language",
    "Motor Skills",
    "Social Skills",
    "Emotional Regulation",
    "Behavioral Strategies",
    "Educational Support",
    "Family Activities",
    "Nutrition",
    "Sleep",
    "Screen Time",
    "Sibling Relationships",
    "School Support",
    "Therapy Resources",
    "Special Needs",
    "Developmental Milestones",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    pub categories: Vec<String>,
}

impl FeedSource {
    pub fn new(name: &str, url: &str, categories: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Exact taxonomy label for `label`, matched case-insensitively.
pub fn canonical_category(label: &str) -> Option<&'static str> {
    let label = label.trim();
    TAXONOMY
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(label))
}

pub fn default_sources() -> Vec<FeedSource> {
    vec![
        FeedSource::new(
            "ADDitude Magazine",
            "https://additudemag.libsyn.com/rss",
            &["ADHD", "Educational Support", "School Support", "Special Needs"],
        ),
        FeedSource::new(
            "Janet Lansbury - Elevating Child Care",
            "https://www.janetlansbury.com/feed",
            &["Parenting Tips", "Educational Support", "Family Activities"],
        ),
        FeedSource::new(
            "Scary Mommy",
            "https://scarymommy.com/rss",
            &["Parenting Tips", "Sleep", "Therapy Resources"],
        ),
        FeedSource::new(
            "Wrightslaw Way",
            "https://feeds.feedburner.com/TheWrig",
            &["Special Needs", "Educational Support", "School Support", "Therapy Resources"],
        ),
        FeedSource::new(
            "The Autism Cafe",
            "https://theautismcafe.com/feed",
            &["Autism", "Sensory Processing", "Special Needs", "Therapy Resources"],
        ),
        FeedSource::new(
            "Special Needs Jungle",
            "https://www.specialneedsjungle.com/feed/",
            &["Special Needs", "Educational Support", "School Support", "Therapy Resources"],
        ),
    ]
}
