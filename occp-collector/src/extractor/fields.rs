//! Field location tables and typed resolvers
//!
//! The host's internal GraphQL schema has several versions live at once, so
//! every output field has an ordered list of JSON pointers: primary location
//! first, legacy/alternate locations after. Each field resolves on its own;
//! a miss only defaults that field.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Ordered JSON-pointer locations for one field, relative to the node
pub type FieldPaths = &'static [&'static str];

/// Locations relative to a tweet node (`__typename == "Tweet"`)
pub mod tweet {
    use super::FieldPaths;

    pub const ID: FieldPaths = &["/rest_id", "/legacy/id_str"];
    /// Long-form note text wins over the truncated legacy body
    pub const TEXT: FieldPaths = &[
        "/note_tweet/note_tweet_results/result/text",
        "/legacy/full_text",
        "/legacy/text",
    ];
    pub const CREATED_AT: FieldPaths = &["/legacy/created_at"];
    pub const CONVERSATION_ID: FieldPaths = &["/legacy/conversation_id_str"];
    pub const IN_REPLY_TO_STATUS_ID: FieldPaths = &["/legacy/in_reply_to_status_id_str"];
    pub const IN_REPLY_TO_USER_ID: FieldPaths = &["/legacy/in_reply_to_user_id_str"];
    pub const IN_REPLY_TO_SCREEN_NAME: FieldPaths = &["/legacy/in_reply_to_screen_name"];
    pub const QUOTED_STATUS_ID: FieldPaths = &[
        "/legacy/quoted_status_id_str",
        "/quoted_status_result/result/rest_id",
    ];
    pub const LANG: FieldPaths = &["/legacy/lang"];

    pub const RETWEET_COUNT: FieldPaths = &["/legacy/retweet_count"];
    pub const REPLY_COUNT: FieldPaths = &["/legacy/reply_count"];
    pub const LIKE_COUNT: FieldPaths = &["/legacy/favorite_count"];
    pub const QUOTE_COUNT: FieldPaths = &["/legacy/quote_count"];
    pub const BOOKMARK_COUNT: FieldPaths = &["/legacy/bookmark_count"];
    /// `views.count` is a numeric string upstream
    pub const IMPRESSION_COUNT: FieldPaths = &["/views/count", "/ext_views/count"];

    pub const ENTITIES: FieldPaths = &["/legacy/entities", "/entities"];

    /// Embedded user node
    pub const AUTHOR: FieldPaths = &["/core/user_results/result", "/core/user_result/result"];
}

/// Locations relative to a user node (`core.user_results.result`)
pub mod author {
    use super::FieldPaths;

    pub const ID: FieldPaths = &["/rest_id", "/legacy/id_str"];
    pub const USERNAME: FieldPaths = &["/core/screen_name", "/legacy/screen_name"];
    pub const NAME: FieldPaths = &["/core/name", "/legacy/name"];
    pub const DESCRIPTION: FieldPaths = &["/legacy/description", "/profile_bio/description"];
    pub const LOCATION: FieldPaths = &["/location/location", "/legacy/location"];
    pub const PROFILE_IMAGE_URL: FieldPaths = &[
        "/avatar/image_url",
        "/legacy/profile_image_url_https",
        "/legacy/profile_image_url",
    ];
    /// Any of these being `true` marks the author verified
    pub const VERIFIED_FLAGS: FieldPaths = &[
        "/is_blue_verified",
        "/verification/verified",
        "/legacy/verified",
    ];
    pub const VERIFIED_TYPE: FieldPaths = &["/verification/verified_type", "/legacy/verified_type"];
    pub const PROTECTED: FieldPaths = &["/privacy/protected", "/legacy/protected"];

    pub const FOLLOWERS_COUNT: FieldPaths = &["/legacy/followers_count", "/relationship_counts/followers"];
    pub const FOLLOWING_COUNT: FieldPaths = &["/legacy/friends_count", "/relationship_counts/following"];
    pub const TWEET_COUNT: FieldPaths = &["/legacy/statuses_count"];
    pub const LIKE_COUNT: FieldPaths = &["/legacy/favourites_count"];
    pub const LISTED_COUNT: FieldPaths = &["/legacy/listed_count"];
    pub const MEDIA_COUNT: FieldPaths = &["/legacy/media_count"];

    pub const CREATED_AT: FieldPaths = &["/core/created_at", "/legacy/created_at"];
}

/// First non-null value found at any of `paths`
pub fn lookup<'a>(node: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| node.pointer(path))
        .find(|value| !value.is_null())
}

/// First non-empty string. Numbers are accepted and stringified since some
/// schema versions ship ids as JSON numbers.
pub fn string_at(node: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().filter_map(|path| node.pointer(path)).find_map(|value| match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First string, or empty
pub fn string_or_empty(node: &Value, paths: &[&str]) -> String {
    string_at(node, paths).unwrap_or_default()
}

/// First value readable as a non-negative integer, or 0.
///
/// Accepts JSON numbers and numeric strings.
pub fn count_at(node: &Value, paths: &[&str]) -> u64 {
    paths
        .iter()
        .filter_map(|path| node.pointer(path))
        .find_map(as_count)
        .unwrap_or(0)
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// First boolean found, or `false`
pub fn bool_at(node: &Value, paths: &[&str]) -> bool {
    paths
        .iter()
        .filter_map(|path| node.pointer(path))
        .find_map(Value::as_bool)
        .unwrap_or(false)
}

/// `true` when any location holds `true`
pub fn any_flag(node: &Value, paths: &[&str]) -> bool {
    paths
        .iter()
        .filter_map(|path| node.pointer(path))
        .any(|value| value.as_bool() == Some(true))
}

/// Host timestamp format, e.g. `Wed Oct 10 20:19:24 +0000 2018`
const HOST_TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Normalize a host timestamp to RFC 3339 (UTC). Anything that does not
/// parse is passed through unchanged.
pub fn normalize_timestamp(raw: &str) -> String {
    match DateTime::parse_from_str(raw, HOST_TIMESTAMP_FORMAT) {
        Ok(parsed) => parsed.with_timezone(&Utc).to_rfc3339(),
        Err(_) => raw.to_string(),
    }
}
