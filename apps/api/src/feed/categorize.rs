//! Article categorization: the source's configured categories, optionally augmented
//! with labels chosen by the text generator from `TAXONOMY`.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::feed::prompts::{CATEGORIZE_PROMPT_TEMPLATE, MAX_SUMMARY_CHARS};
use crate::feed::sources::{canonical_category, FeedSource, TAXONOMY};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{complete_json, TextGenerator};
use crate::models::article::NewArticle;

#[derive(Debug, Deserialize)]
struct CategoryAnswer {
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Clone)]
pub struct Categorizer {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Categorizer {
    /// Uses only the categories configured on each source.
    pub fn source_only() -> Self {
        Self { generator: None }
    }

    pub fn with_ai(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    pub fn uses_ai(&self) -> bool {
        self.generator.is_some()
    }

    /// Source categories first, then any extra taxonomy labels from the generator.
    pub async fn categorize(&self, article: &NewArticle, source: &FeedSource) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for category in &source.categories {
            if !categories.contains(category) {
                categories.push(category.clone());
            }
        }

        let Some(generator) = &self.generator else {
            return categories;
        };

        let prompt = build_prompt(article);
        match complete_json::<CategoryAnswer>(generator.as_ref(), &prompt, JSON_ONLY_SYSTEM).await {
            Ok(answer) => {
                for label in &answer.categories {
                    match canonical_category(label) {
                        Some(known) if !categories.iter().any(|c| c == known) => {
                            categories.push(known.to_string());
                        }
                        Some(_) => {}
                        None => debug!("Dropping unknown category label '{label}'"),
                    }
                }
            }
            Err(e) => warn!(
                "AI categorization failed for {}, keeping source categories ({e})",
                article.article_url
            ),
        }
        categories
    }
}

fn build_prompt(article: &NewArticle) -> String {
    let summary: String = article.summary.chars().take(MAX_SUMMARY_CHARS).collect();
    CATEGORIZE_PROMPT_TEMPLATE
        .replace("{taxonomy}", &TAXONOMY.join(", "))
        .replace("{title}", &article.title)
        .replace("{summary}", &summary)
}
