// Per-session JSON documents: profile, recommendations, completions, progress, bookmarks.

pub mod handlers;
pub mod mirror;
pub mod progress;
pub mod store;
