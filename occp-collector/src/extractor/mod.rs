//! Tweet extractor
//!
//! Walks an arbitrary JSON payload and returns every embedded tweet record.
//!
//! # Qualifying nodes
//! An object qualifies when `__typename == "Tweet"` and `rest_id` is a
//! non-empty string. The inner `tweet` of a `TweetWithVisibilityResults`
//! wrapper qualifies as well, since the host drops the type tag there.
//! Nothing is assumed about where in the tree such nodes sit.
//!
//! # Tolerance
//! - Qualifying nodes that fail the viability check (no text, no author
//!   handle) are skipped; the walk continues into their children.
//! - The walk also descends into qualifying nodes, so quoted tweets and
//!   retweeted originals are emitted as records of their own.
//! - Depth is bounded by `max_depth` (default 20) so malformed payloads
//!   terminate and traversal cost stays capped.
//! - A tweet id already emitted from the same payload is not emitted again.

pub mod fields;

use fields::{any_flag, bool_at, count_at, lookup, normalize_timestamp, string_at, string_or_empty};
use occp_common::{CapturedAuthor, CapturedTweet};
use serde_json::Value;
use std::collections::HashSet;
use tracing::trace;

/// Default recursion bound, above the deepest observed real payload
pub const DEFAULT_MAX_DEPTH: usize = 20;

const TYPENAME_KEY: &str = "__typename";
const TWEET_TYPENAME: &str = "Tweet";
const VISIBILITY_WRAPPER_TYPENAME: &str = "TweetWithVisibilityResults";

/// Recursive tweet extractor
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    max_depth: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

/// Accumulator for one payload walk
#[derive(Default)]
struct Walk {
    tweets: Vec<CapturedTweet>,
    seen_ids: HashSet<String>,
    skipped: usize,
}

impl Walk {
    fn accept(&mut self, node: &Value) {
        match parse_tweet(node) {
            Some(tweet) => {
                if self.seen_ids.insert(tweet.id.clone()) {
                    self.tweets.push(tweet);
                }
            }
            None => self.skipped += 1,
        }
    }
}

impl Extractor {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Extract every viable tweet record from `payload`, in traversal order
    pub fn extract(&self, payload: &Value) -> Vec<CapturedTweet> {
        let mut walk = Walk::default();
        self.visit(payload, 0, &mut walk);

        if walk.skipped > 0 {
            trace!(
                extracted = walk.tweets.len(),
                skipped = walk.skipped,
                "Skipped partial tweet nodes"
            );
        }
        walk.tweets
    }

    fn visit(&self, node: &Value, depth: usize, walk: &mut Walk) {
        if depth > self.max_depth {
            return;
        }

        match node {
            Value::Object(map) => {
                if is_tweet_node(node) {
                    walk.accept(node);
                } else if typename(node) == Some(VISIBILITY_WRAPPER_TYPENAME) {
                    // The inner node is visited below; only take it here when
                    // it would not qualify on its own.
                    if let Some(inner) = map.get("tweet") {
                        if !is_tweet_node(inner) && has_rest_id(inner) {
                            walk.accept(inner);
                        }
                    }
                }

                for child in map.values() {
                    self.visit(child, depth + 1, walk);
                }
            }
            Value::Array(items) => {
                for child in items {
                    self.visit(child, depth + 1, walk);
                }
            }
            _ => {}
        }
    }
}

fn typename(node: &Value) -> Option<&str> {
    node.get(TYPENAME_KEY).and_then(Value::as_str)
}

fn has_rest_id(node: &Value) -> bool {
    node.get("rest_id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty())
}

/// Structural test for a single tweet record
pub fn is_tweet_node(node: &Value) -> bool {
    typename(node) == Some(TWEET_TYPENAME) && has_rest_id(node)
}

/// Convert one tweet node. `None` when the record is not viable.
pub fn parse_tweet(node: &Value) -> Option<CapturedTweet> {
    use fields::tweet as f;

    let id = string_at(node, f::ID)?;
    let text = string_at(node, f::TEXT)?;
    let author = lookup(node, f::AUTHOR).and_then(parse_author)?;

    let conversation_id = string_at(node, f::CONVERSATION_ID).unwrap_or_else(|| id.clone());

    let tweet = CapturedTweet {
        created_at: normalize_timestamp(&string_or_empty(node, f::CREATED_AT)),
        conversation_id,
        in_reply_to_status_id: string_at(node, f::IN_REPLY_TO_STATUS_ID),
        in_reply_to_user_id: string_at(node, f::IN_REPLY_TO_USER_ID),
        in_reply_to_screen_name: string_at(node, f::IN_REPLY_TO_SCREEN_NAME),
        quoted_status_id: string_at(node, f::QUOTED_STATUS_ID),
        lang: string_at(node, f::LANG),
        retweet_count: count_at(node, f::RETWEET_COUNT),
        reply_count: count_at(node, f::REPLY_COUNT),
        like_count: count_at(node, f::LIKE_COUNT),
        quote_count: count_at(node, f::QUOTE_COUNT),
        bookmark_count: count_at(node, f::BOOKMARK_COUNT),
        impression_count: count_at(node, f::IMPRESSION_COUNT),
        entities: lookup(node, f::ENTITIES).cloned().unwrap_or(Value::Null),
        id,
        text,
        author,
    };

    tweet.is_viable().then_some(tweet)
}

/// Convert a user node. `None` without a handle.
pub fn parse_author(node: &Value) -> Option<CapturedAuthor> {
    use fields::author as f;

    let username = string_at(node, f::USERNAME)?;

    Some(CapturedAuthor {
        id: string_or_empty(node, f::ID),
        username,
        name: string_or_empty(node, f::NAME),
        description: string_or_empty(node, f::DESCRIPTION),
        location: string_or_empty(node, f::LOCATION),
        profile_image_url: string_or_empty(node, f::PROFILE_IMAGE_URL),
        verified: any_flag(node, f::VERIFIED_FLAGS),
        verified_type: string_at(node, f::VERIFIED_TYPE),
        protected: bool_at(node, f::PROTECTED),
        followers_count: count_at(node, f::FOLLOWERS_COUNT),
        following_count: count_at(node, f::FOLLOWING_COUNT),
        tweet_count: count_at(node, f::TWEET_COUNT),
        like_count: count_at(node, f::LIKE_COUNT),
        listed_count: count_at(node, f::LISTED_COUNT),
        media_count: count_at(node, f::MEDIA_COUNT),
        created_at: normalize_timestamp(&string_or_empty(node, f::CREATED_AT)),
    })
}
