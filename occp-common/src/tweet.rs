//! Normalized tweet records produced by the collector
//!
//! Field names follow the backend's account/tweet columns so a record can be
//! upserted without renaming.

use serde::{Deserialize, Serialize};

/// A tweet extracted from intercepted traffic.
///
/// Only emitted with a non-empty `id`, non-empty `text` and an author whose
/// `username` is non-empty (see [`CapturedTweet::is_viable`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapturedTweet {
    /// Numeric-valued tweet id as a string
    pub id: String,
    pub text: String,
    /// RFC 3339 when the upstream value parsed, raw upstream text otherwise
    pub created_at: String,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_status_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_screen_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_status_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,

    pub retweet_count: u64,
    pub reply_count: u64,
    pub like_count: u64,
    pub quote_count: u64,
    pub bookmark_count: u64,
    pub impression_count: u64,

    pub author: CapturedAuthor,

    /// Mentions/urls/hashtags blob, passed through uninterpreted
    pub entities: serde_json::Value,
}

impl CapturedTweet {
    /// Minimum-viability check applied before a record leaves the extractor
    pub fn is_viable(&self) -> bool {
        !self.id.is_empty() && !self.text.is_empty() && !self.author.username.is_empty()
    }
}

/// Tweet author, embedded in every [`CapturedTweet`].
///
/// Everything except `id` and `username` is best-effort and defaults to
/// empty / zero / false.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapturedAuthor {
    pub id: String,
    /// Handle without the leading `@`
    pub username: String,
    pub name: String,
    pub description: String,
    pub location: String,
    pub profile_image_url: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_type: Option<String>,
    pub protected: bool,
    pub followers_count: u64,
    pub following_count: u64,
    pub tweet_count: u64,
    pub like_count: u64,
    pub listed_count: u64,
    pub media_count: u64,
    pub created_at: String,
}
