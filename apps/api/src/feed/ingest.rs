//! RSS ingestion: fetch each configured feed, parse its items into articles,
//! categorize them and upsert them into the article store.
//!
//! One failing feed never stops the run; it is logged and counted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rss::{Channel, Item};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::feed::categorize::Categorizer;
use crate::feed::sources::FeedSource;
use crate::feed::store::ArticleStore;
use crate::models::article::NewArticle;

pub const PLACEHOLDER_IMAGE: &str = "https://placehold.co/300x200/CCCCCC/000000?text=No+Image";
const DEFAULT_TITLE: &str = "No Title";
const DEFAULT_SUMMARY: &str = "No summary available.";
const FETCH_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed returned status {0}")]
    Status(u16),

    #[error("Malformed feed: {0}")]
    Parse(#[from] rss::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct IngestReport {
    pub feeds_ok: usize,
    pub feeds_failed: usize,
    pub inserted: usize,
    pub skipped_existing: usize,
}

/// Parses an RSS document into articles tagged with `source`'s name and categories.
/// Items without a link are skipped.
pub fn parse_feed(xml: &[u8], source: &FeedSource) -> Result<Vec<NewArticle>, FeedError> {
    let channel = Channel::read_from(xml)?;
    Ok(channel
        .items()
        .iter()
        .filter_map(|item| article_from_item(item, source))
        .collect())
}

fn article_from_item(item: &Item, source: &FeedSource) -> Option<NewArticle> {
    let article_url = item.link().map(str::trim).filter(|l| !l.is_empty())?;

    let title = non_empty(item.title()).unwrap_or(DEFAULT_TITLE);
    let summary = non_empty(item.description())
        .or_else(|| non_empty(item.content()))
        .unwrap_or(DEFAULT_SUMMARY);

    Some(NewArticle {
        title: title.to_string(),
        summary: summary.to_string(),
        image_url: image_of(item).unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        article_url: article_url.to_string(),
        source_name: source.name.clone(),
        published_date: item.pub_date().and_then(parse_pub_date),
        categories: source.categories.clone(),
    })
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// First `media:content` image, then an image enclosure.
fn image_of(item: &Item) -> Option<String> {
    let media = item
        .extensions()
        .get("media")
        .and_then(|m| m.get("content"))
        .into_iter()
        .flatten()
        .find_map(|ext| {
            let attrs = ext.attrs();
            let is_image = attrs
                .get("type")
                .is_some_and(|t| t.starts_with("image/"))
                || attrs.get("medium").is_some_and(|m| m == "image");
            is_image.then(|| attrs.get("url").cloned()).flatten()
        });

    media.or_else(|| {
        item.enclosure()
            .filter(|e| e.mime_type().starts_with("image/"))
            .map(|e| e.url().to_string())
    })
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Runs one pass over every configured source.
pub struct FeedIngestor {
    http: reqwest::Client,
    sources: Vec<FeedSource>,
    categorizer: Categorizer,
    store: Arc<dyn ArticleStore>,
}

impl FeedIngestor {
    pub fn new(
        sources: Vec<FeedSource>,
        categorizer: Categorizer,
        store: Arc<dyn ArticleStore>,
    ) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            sources,
            categorizer,
            store,
        })
    }

    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    pub async fn run_once(&self) -> IngestReport {
        info!("Starting feed ingest over {} sources", self.sources.len());
        let mut report = IngestReport::default();

        for source in &self.sources {
            match self.ingest_source(source, &mut report).await {
                Ok(()) => report.feeds_ok += 1,
                Err(e) => {
                    warn!("Feed {} ({}) failed: {e}", source.name, source.url);
                    report.feeds_failed += 1;
                }
            }
        }

        info!(
            "Feed ingest done: {} ok, {} failed, {} new, {} already stored",
            report.feeds_ok, report.feeds_failed, report.inserted, report.skipped_existing
        );
        report
    }

    async fn ingest_source(
        &self,
        source: &FeedSource,
        report: &mut IngestReport,
    ) -> Result<(), FeedError> {
        let response = self.http.get(&source.url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }
        let body = response.bytes().await?;
        let articles = parse_feed(&body, source)?;
        self.store_articles(source, articles, report).await
    }

    async fn store_articles(
        &self,
        source: &FeedSource,
        articles: Vec<NewArticle>,
        report: &mut IngestReport,
    ) -> Result<(), FeedError> {
        for mut article in articles {
            // Stored articles keep their categories; skip them before any AI call.
            if self.store.exists(&article.article_url).await? {
                report.skipped_existing += 1;
                continue;
            }
            article.categories = self.categorizer.categorize(&article, source).await;
            match self.store.upsert(&article).await? {
                Some(_) => report.inserted += 1,
                None => report.skipped_existing += 1,
            }
        }
        Ok(())
    }
}
