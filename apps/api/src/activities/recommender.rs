//! Recommender: catalog first, generated top-up second.
//!
//! Flow: rank catalog via the keyword index → de-duplicate by case-folded name →
//!       top up with generated activities until 5 or the attempt budget runs out.
//!
//! The output never exceeds `MAX_RECOMMENDATIONS` and never contains two activities
//! whose names differ only in case or surrounding whitespace.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::activities::topup::generate_activity;
use crate::activities::ActivityLibrary;
use crate::llm_client::TextGenerator;
use crate::models::activity::Activity;
use crate::models::profile::ChildProfile;

pub const MAX_RECOMMENDATIONS: usize = 5;
/// Generator calls allowed per request when topping up.
pub const MAX_TOPUP_ATTEMPTS: u32 = 10;
const STYLE_SAMPLES: usize = 3;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendedActivity {
    #[serde(flatten)]
    pub activity: Activity,
    /// Index score; `None` for generated activities.
    pub score: Option<u32>,
    pub matched_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub activities: Vec<RecommendedActivity>,
    pub from_catalog: usize,
    pub generated: usize,
    pub topup_attempts: u32,
}

/// Best catalog matches for a profile, unique by name, at most `MAX_RECOMMENDATIONS`.
pub fn select_from_catalog(
    profile: &ChildProfile,
    library: &ActivityLibrary,
) -> Vec<RecommendedActivity> {
    let mut seen = HashSet::new();
    library
        .index
        .rank(profile, &library.catalog)
        .into_iter()
        .filter_map(|ranked| {
            let activity = library.catalog.get(ranked.position)?;
            seen.insert(activity.name_key()).then(|| RecommendedActivity {
                activity: activity.clone(),
                score: Some(ranked.score),
                matched_terms: ranked.matched_terms,
            })
        })
        .take(MAX_RECOMMENDATIONS)
        .collect()
}

/// Full recommendation: catalog matches topped up with generated activities.
/// Never fails; when generation keeps failing the result may hold fewer than 5 items.
pub async fn recommend(
    profile: &ChildProfile,
    library: &ActivityLibrary,
    generator: &dyn TextGenerator,
) -> Recommendation {
    let mut chosen = select_from_catalog(profile, library);
    let from_catalog = chosen.len();
    let mut seen: HashSet<String> = chosen.iter().map(|r| r.activity.name_key()).collect();

    debug!("Catalog produced {from_catalog} matches for {}", profile.name);

    let samples: Vec<Activity> = chosen
        .iter()
        .take(STYLE_SAMPLES)
        .map(|r| r.activity.clone())
        .collect();

    let mut attempts = 0;
    while chosen.len() < MAX_RECOMMENDATIONS && attempts < MAX_TOPUP_ATTEMPTS {
        attempts += 1;
        let taken: Vec<String> = chosen.iter().map(|r| r.activity.name.clone()).collect();
        let activity = generate_activity(generator, profile, &samples, &taken).await;
        if seen.insert(activity.name_key()) {
            chosen.push(RecommendedActivity {
                activity,
                score: None,
                matched_terms: Vec::new(),
            });
        } else {
            debug!("Discarding duplicate generated activity '{}'", activity.name);
        }
    }

    let generated = chosen.len() - from_catalog;
    info!(
        "Recommended {} activities ({} catalog, {} generated, {} top-up attempts)",
        chosen.len(),
        from_catalog,
        generated,
        attempts
    );

    Recommendation {
        activities: chosen,
        from_catalog,
        generated,
        topup_attempts: attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activities::catalog::parse_catalog;
    use crate::activities::topup::FALLBACK_NAME;
    use crate::llm_client::testing::ScriptedGenerator;
    use crate::models::activity::ActivitySource;
    use crate::models::profile::sample_profile;

    fn library(csv: &str) -> ActivityLibrary {
        ActivityLibrary::new(parse_catalog(csv).unwrap())
    }

    fn generated(name: &str) -> String {
        format!(
            r#"{{"Activity Name": "{name}", "Focus Area": "Attention", "Conditions": "ADHD", "Keywords": "focus"}}"#
        )
    }

    const RICH: &str = "\
Activity Name,Focus Area(s),Conditions,Other Keywords
Focus Jar,Attention,ADHD,calm
Sticker Trail,Fine Motor,,stickers
Music Freeze,Attention,,music
Sensory Bin,Sensory,,
Drawing Race,Fine Motor,,drawing
Noise Walk,Listening,,noise
Chess Club,Strategy,,board
";

    #[test]
    fn test_catalog_selection_caps_at_five() {
        let lib = library(RICH);
        let picked = select_from_catalog(&sample_profile(), &lib);
        assert_eq!(picked.len(), MAX_RECOMMENDATIONS);
        assert!(picked.iter().all(|p| p.activity.name != "Chess Club"));
        assert_eq!(picked[0].activity.name, "Focus Jar");
    }

    #[tokio::test]
    async fn test_full_catalog_needs_no_generator_calls() {
        let lib = library(RICH);
        let generator = ScriptedGenerator::failing();
        let rec = recommend(&sample_profile(), &lib, &generator).await;
        assert_eq!(rec.activities.len(), 5);
        assert_eq!(rec.generated, 0);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_top_up_fills_to_five_and_skips_duplicates() {
        let lib = library("Activity Name,Conditions\nFocus Jar,ADHD\nChess Club,\n");
        let a = generated("Noise Detective");
        let dup_of_catalog = generated("FOCUS JAR ");
        let b = generated("Sticker Hunt");
        let dup_of_generated = generated("noise detective");
        let c = generated("Calm Breathing");
        let d = generated("Bead Threading");
        let generator = ScriptedGenerator::new(vec![
            Ok(a.as_str()),
            Ok(dup_of_catalog.as_str()),
            Ok(b.as_str()),
            Ok(dup_of_generated.as_str()),
            Ok(c.as_str()),
            Ok(d.as_str()),
        ]);

        let rec = recommend(&sample_profile(), &lib, &generator).await;
        let names: Vec<_> = rec.activities.iter().map(|r| r.activity.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Focus Jar", "Noise Detective", "Sticker Hunt", "Calm Breathing", "Bead Threading"]
        );
        assert_eq!(rec.from_catalog, 1);
        assert_eq!(rec.generated, 4);
        assert_eq!(rec.topup_attempts, 6);
    }

    #[tokio::test]
    async fn test_generator_down_yields_single_fallback_and_stops() {
        let lib = library("Activity Name\nChess Club\n");
        let generator = ScriptedGenerator::failing();
        let rec = recommend(&sample_profile(), &lib, &generator).await;

        assert_eq!(rec.activities.len(), 1);
        assert_eq!(rec.activities[0].activity.name, FALLBACK_NAME);
        assert_eq!(rec.activities[0].activity.source, ActivitySource::Generated);
        assert_eq!(rec.topup_attempts, MAX_TOPUP_ATTEMPTS);
        assert_eq!(generator.call_count(), MAX_TOPUP_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn test_names_are_unique_case_insensitively() {
        let lib = library("Activity Name,Conditions\nFocus Jar,ADHD\nfocus jar,ADHD\n");
        let generator = ScriptedGenerator::failing();
        let rec = recommend(&sample_profile(), &lib, &generator).await;
        let mut keys: Vec<_> = rec.activities.iter().map(|r| r.activity.name_key()).collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), before);
        assert!(rec.activities.len() <= MAX_RECOMMENDATIONS);
    }
}
