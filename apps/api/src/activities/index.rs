//! Inverted keyword index over the activity catalog.
//!
//! Built once at startup. Ranking a profile touches only the postings of the profile's
//! own tokens instead of scanning every row.
//!
//! Scoring (per activity):
//! - each matched field counts once: Conditions 3, Focus Area 2, Keywords 2,
//!   Description 1, Name 1
//! - +1 when a strengths token hits Focus Area or Keywords
//! - +1 when a challenges token hits Focus Area or Keywords
//! - +2 when the child's age is inside the activity's age band
//!
//! An activity with no token hit is never a candidate, whatever its age band.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::activities::catalog::ActivityCatalog;
use crate::models::activity::BLANK;
use crate::models::profile::ChildProfile;

const AGE_MATCH_BONUS: u32 = 2;
const STRENGTH_BONUS: u32 = 1;
const CHALLENGE_BONUS: u32 = 1;

const STOP_WORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "he",
    "her", "his", "in", "is", "it", "its", "likes", "loves", "my", "nan", "no", "none", "not",
    "of", "old", "on", "or", "she", "so", "that", "the", "they", "to", "very", "was", "with",
    "year", "years", "yrs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    FocusArea,
    Conditions,
    Keywords,
    Description,
}

impl Field {
    pub fn weight(self) -> u32 {
        match self {
            Field::Conditions => 3,
            Field::FocusArea | Field::Keywords => 2,
            Field::Name | Field::Description => 1,
        }
    }

    fn is_topical(self) -> bool {
        matches!(self, Field::FocusArea | Field::Keywords)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Posting {
    position: usize,
    field: Field,
}

/// A catalog activity that matched a profile.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedActivity {
    pub position: usize,
    pub score: u32,
    pub matched_terms: Vec<String>,
    pub age_match: bool,
}

#[derive(Debug, Default)]
pub struct KeywordIndex {
    postings: HashMap<String, Vec<Posting>>,
}

/// Lower-cased alphanumeric runs of two or more characters, minus stop words.
/// Unique, in first-seen order.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 2 && !STOP_WORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

impl KeywordIndex {
    pub fn build(catalog: &ActivityCatalog) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();

        for (position, activity) in catalog.activities().iter().enumerate() {
            let description = format!("{} {}", activity.description, catalog.notes(position));
            let fields = [
                (Field::Name, activity.name.as_str()),
                (Field::FocusArea, activity.focus_area.as_str()),
                (Field::Conditions, activity.conditions.as_str()),
                (Field::Keywords, activity.keywords.as_str()),
                (Field::Description, description.as_str()),
            ];
            for (field, text) in fields {
                if text == BLANK {
                    continue;
                }
                for token in tokenize(text) {
                    postings
                        .entry(token)
                        .or_default()
                        .push(Posting { position, field });
                }
            }
        }

        Self { postings }
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Ranks catalog activities for a profile: highest score first, catalog order on ties.
    pub fn rank(&self, profile: &ChildProfile, catalog: &ActivityCatalog) -> Vec<RankedActivity> {
        #[derive(Default)]
        struct Hit {
            fields: HashSet<Field>,
            terms: BTreeSet<String>,
            strength: bool,
            challenge: bool,
        }

        let strengths: HashSet<String> = tokenize(&profile.strengths).into_iter().collect();
        let challenges: HashSet<String> = tokenize(&profile.challenges).into_iter().collect();

        let mut hits: HashMap<usize, Hit> = HashMap::new();
        for token in tokenize(&profile.query_text()) {
            let Some(postings) = self.postings.get(&token) else {
                continue;
            };
            for posting in postings {
                let hit = hits.entry(posting.position).or_default();
                hit.fields.insert(posting.field);
                hit.terms.insert(token.clone());
                if posting.field.is_topical() {
                    hit.strength |= strengths.contains(&token);
                    hit.challenge |= challenges.contains(&token);
                }
            }
        }

        let child_age = profile.age_years();
        let mut ranked: Vec<RankedActivity> = hits
            .into_iter()
            .filter_map(|(position, hit)| {
                let activity = catalog.get(position)?;
                let age_match = match (child_age, activity.age_band) {
                    (Some(age), Some(band)) => band.contains(age),
                    _ => false,
                };
                let score = hit.fields.iter().map(|f| f.weight()).sum::<u32>()
                    + if hit.strength { STRENGTH_BONUS } else { 0 }
                    + if hit.challenge { CHALLENGE_BONUS } else { 0 }
                    + if age_match { AGE_MATCH_BONUS } else { 0 };
                Some(RankedActivity {
                    position,
                    score,
                    matched_terms: hit.terms.into_iter().collect(),
                    age_match,
                })
            })
            .collect();

        ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.position.cmp(&b.position)));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::{Activity, ActivitySource, AgeBand};
    use crate::models::profile::sample_profile;

    fn activity(name: &str, focus: &str, conditions: &str, keywords: &str) -> Activity {
        Activity {
            name: name.to_string(),
            focus_area: focus.to_string(),
            conditions: conditions.to_string(),
            keywords: keywords.to_string(),
            delivery: BLANK.to_string(),
            description: BLANK.to_string(),
            age_band: None,
            source: ActivitySource::Catalog,
        }
    }

    #[test]
    fn test_tokenize_lowercases_and_drops_stop_words() {
        assert_eq!(
            tokenize("Loves Drawing, and the ADHD-friendly games!"),
            vec!["drawing", "adhd", "friendly", "games"]
        );
    }

    #[test]
    fn test_tokenize_is_unique() {
        assert_eq!(tokenize("focus Focus FOCUS"), vec!["focus"]);
    }

    #[test]
    fn test_conditions_outweigh_keywords() {
        let catalog = ActivityCatalog::from_activities(vec![
            activity("Clay Squeeze", "Strength", BLANK, "music"),
            activity("Calm Corner", "Emotional", "ADHD", BLANK),
        ]);
        let index = KeywordIndex::build(&catalog);
        let ranked = index.rank(&sample_profile(), &catalog);
        assert_eq!(ranked[0].position, 1);
        assert_eq!(ranked[0].score, 3);
        assert_eq!(ranked[0].matched_terms, vec!["adhd"]);
    }

    #[test]
    fn test_no_token_hit_means_no_candidate() {
        let mut unrelated = activity("Chess Club", "Strategy", BLANK, "board games");
        unrelated.age_band = Some(AgeBand::new(4, 8));
        let catalog = ActivityCatalog::from_activities(vec![unrelated]);
        let index = KeywordIndex::build(&catalog);
        assert!(index.rank(&sample_profile(), &catalog).is_empty());
    }

    #[test]
    fn test_age_band_and_bonuses_add_up() {
        // sample profile: 6 years, strengths "creative, loves drawing",
        // challenges "attention, sensory overload"
        let mut art = activity("Sensory Art", "Sensory, Drawing", BLANK, BLANK);
        art.age_band = Some(AgeBand::new(5, 7));
        let catalog = ActivityCatalog::from_activities(vec![art]);
        let index = KeywordIndex::build(&catalog);
        let ranked = index.rank(&sample_profile(), &catalog);

        // name (1) + focus (2) + strength (1) + challenge (1) + age (2)
        assert_eq!(ranked[0].score, 7);
        assert!(ranked[0].age_match);
        assert_eq!(ranked[0].matched_terms, vec!["drawing", "sensory"]);
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let catalog = ActivityCatalog::from_activities(vec![
            activity("Beat Keeper", BLANK, BLANK, "music"),
            activity("Rhythm Walk", BLANK, BLANK, "music"),
        ]);
        let index = KeywordIndex::build(&catalog);
        let positions: Vec<_> = index
            .rank(&sample_profile(), &catalog)
            .into_iter()
            .map(|r| r.position)
            .collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn test_blank_placeholder_is_not_indexed() {
        let catalog = ActivityCatalog::from_activities(vec![activity("Walk", BLANK, BLANK, BLANK)]);
        let index = KeywordIndex::build(&catalog);
        assert_eq!(index.term_count(), 1);
    }
}
