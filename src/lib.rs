//! Watches a public-procurement feed and notifies subscribers about new
//! tenders that match their keyword, region and price filters.

pub mod app;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod feed;
pub mod matcher;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod scheduler;

pub use error::{AppError, Result};
