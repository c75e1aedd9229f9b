// Parenting article feed: RSS sources -> categorize -> Postgres -> interest-filtered listing.

pub mod categorize;
pub mod handlers;
pub mod ingest;
pub mod poller;
pub mod prompts;
pub mod sources;
pub mod store;
