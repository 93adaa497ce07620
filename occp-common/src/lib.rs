//! # OCCP Common Library
//!
//! Shared code for the OCCP collection services:
//! - Captured tweet/author records
//! - Backend ingestion wire contract
//! - Bootstrap configuration loading
//! - Relative time formatting

pub mod config;
pub mod error;
pub mod human_time;
pub mod ingest;
pub mod tweet;

pub use error::{Error, Result};
pub use ingest::{IngestRequest, IngestResponse, INGEST_PATH};
pub use tweet::{CapturedAuthor, CapturedTweet};
