//! Backend ingestion contract
//!
//! `POST /api/crowdsource/tweets` with `{"tweets": [...]}`; the backend
//! answers with at least `{"tweets_added": n}`. `tweets_added` may be lower
//! than the batch size because the backend deduplicates on tweet id.

use crate::tweet::CapturedTweet;
use serde::{Deserialize, Serialize};

/// Path of the ingestion endpoint, relative to the backend base URL
pub const INGEST_PATH: &str = "/api/crowdsource/tweets";

/// Request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub tweets: Vec<CapturedTweet>,
}

/// Success response body. Unknown fields are ignored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestResponse {
    pub tweets_added: u64,
}
