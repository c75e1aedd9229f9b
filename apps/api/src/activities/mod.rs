// Activity recommendation: CSV catalog, keyword index, generated top-up.
// All generative calls go through llm_client::TextGenerator.

pub mod catalog;
pub mod handlers;
pub mod index;
pub mod prompts;
pub mod recommender;
pub mod topup;

use crate::activities::catalog::ActivityCatalog;
use crate::activities::index::KeywordIndex;

/// The catalog together with its index. Built once, shared read-only.
#[derive(Debug, Default)]
pub struct ActivityLibrary {
    pub catalog: ActivityCatalog,
    pub index: KeywordIndex,
}

impl ActivityLibrary {
    pub fn new(catalog: ActivityCatalog) -> Self {
        let index = KeywordIndex::build(&catalog);
        Self { catalog, index }
    }
}
