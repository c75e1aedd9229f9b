pub mod activity;
pub mod article;
pub mod profile;
