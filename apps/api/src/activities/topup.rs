//! Activity top-up: asks the text generator for one new activity when the catalog
//! does not cover a profile well enough.
//!
//! Never fails: any generator error, unparseable output, or missing field yields the
//! fixed fallback activity.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::activities::prompts::{ACTIVITY_PROMPT_TEMPLATE, ACTIVITY_SYSTEM};
use crate::llm_client::prompts::CHILD_SAFETY_INSTRUCTION;
use crate::llm_client::{complete_json, LlmError, TextGenerator};
use crate::models::activity::{clean_field, is_blank, Activity, ActivitySource};
use crate::models::profile::ChildProfile;

pub const FALLBACK_NAME: &str = "Engagement Activity";

#[derive(Debug, Error)]
enum TopUpError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("generated activity is missing '{0}'")]
    MissingField(&'static str),
}

/// The record used whenever generation fails.
pub fn fallback_activity() -> Activity {
    Activity {
        name: FALLBACK_NAME.to_string(),
        focus_area: "Cognitive, Fine Motor".to_string(),
        conditions: "ADHD, Autism".to_string(),
        keywords: "puzzles, matching, visual, focus".to_string(),
        delivery: "At home, one-to-one".to_string(),
        description: "Short puzzle and matching rounds that build focus and hand control."
            .to_string(),
        age_band: None,
        source: ActivitySource::Generated,
    }
}

/// Generates one activity for `profile`, using `samples` as a style reference and
/// steering away from names in `taken`.
pub async fn generate_activity(
    generator: &dyn TextGenerator,
    profile: &ChildProfile,
    samples: &[Activity],
    taken: &[String],
) -> Activity {
    match try_generate(generator, profile, samples, taken).await {
        Ok(activity) => activity,
        Err(e) => {
            warn!("Activity generation failed, using fallback ({e})");
            fallback_activity()
        }
    }
}

async fn try_generate(
    generator: &dyn TextGenerator,
    profile: &ChildProfile,
    samples: &[Activity],
    taken: &[String],
) -> Result<Activity, TopUpError> {
    let prompt = build_prompt(profile, samples, taken);
    let value: Value = complete_json(generator, &prompt, ACTIVITY_SYSTEM).await?;
    parse_generated(&value)
}

fn build_prompt(profile: &ChildProfile, samples: &[Activity], taken: &[String]) -> String {
    let samples = if samples.is_empty() {
        "(none yet)".to_string()
    } else {
        samples
            .iter()
            .map(|a| {
                format!(
                    "- {} | Focus: {} | Conditions: {} | Keywords: {}",
                    a.name, a.focus_area, a.conditions, a.keywords
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    let taken = if taken.is_empty() {
        "(none)".to_string()
    } else {
        taken.join(", ")
    };

    let mut prompt = ACTIVITY_PROMPT_TEMPLATE
        .replace("{profile}", &profile.summary())
        .replace("{samples}", &samples)
        .replace("{taken}", &taken);
    prompt.push_str("\n\n");
    prompt.push_str(CHILD_SAFETY_INSTRUCTION);
    prompt
}

/// Strings pass through; arrays of strings are joined with ", ".
fn text_of(value: &Value, key: &str) -> Option<String> {
    let text = match value.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    (!is_blank(&text)).then_some(text)
}

fn parse_generated(value: &Value) -> Result<Activity, TopUpError> {
    let required = |key: &'static str| text_of(value, key).ok_or(TopUpError::MissingField(key));

    Ok(Activity {
        name: required("Activity Name")?,
        focus_area: required("Focus Area")?,
        conditions: required("Conditions")?,
        keywords: required("Keywords")?,
        delivery: clean_field(text_of(value, "Delivery").as_deref()),
        description: clean_field(text_of(value, "Description").as_deref()),
        age_band: None,
        source: ActivitySource::Generated,
    })
}
