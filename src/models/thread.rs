//! Thread summaries and the raw listing shapes returned by the source.

use serde::{Deserialize, Serialize};

/// A thread discovered through search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadSummary {
    /// Identifier, unique within the source
    pub id: String,

    /// Thread title
    pub title: String,

    /// Path of the thread relative to the source host
    pub permalink: String,

    /// Absolute URL of the thread
    pub url: String,

    /// Number of replies, used as the priority metric
    pub activity: u64,

    /// Category the thread was posted under
    pub category: String,
}

/// A listing envelope: `{"kind": "Listing", "data": {"children": [...]}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub data: ListingData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<Thing>,
}

/// One entry of a listing. `data` stays untyped until the kind is known.
#[derive(Debug, Clone, Deserialize)]
pub struct Thing {
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Kind tag of a reply.
pub const REPLY_KIND: &str = "t1";

/// Post fields as they appear in search results.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPost {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub subreddit: String,
}

/// Thread metadata carried in the first part of a detail response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadMeta {
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub title: String,
}

/// Fields of a single reply node, minus its children.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyData {
    pub id: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_utc: Option<f64>,
}

impl Thing {
    /// Split a reply into its own fields and its child nodes.
    ///
    /// The children are moved out rather than re-parsed, so every node of a
    /// tree is touched once.
    pub fn into_reply(self) -> serde_json::Result<(ReplyData, Vec<Thing>)> {
        let mut data = self.data;
        let replies = data
            .get_mut("replies")
            .map(serde_json::Value::take)
            .unwrap_or_default();
        let reply = serde_json::from_value(data)?;
        Ok((reply, listing_children(replies)))
    }
}

/// Children of a listing value. Anything that is not a listing has none.
fn listing_children(listing: serde_json::Value) -> Vec<Thing> {
    use serde_json::Value;

    let Value::Object(mut listing) = listing else {
        return Vec::new();
    };
    let Some(Value::Object(mut data)) = listing.remove("data") else {
        return Vec::new();
    };
    let Some(Value::Array(children)) = data.remove("children") else {
        return Vec::new();
    };
    children
        .into_iter()
        .filter_map(|child| match child {
            Value::Object(mut fields) => Some(Thing {
                kind: fields
                    .remove("kind")
                    .and_then(|k| k.as_str().map(str::to_string))?,
                data: fields.remove("data").unwrap_or_default(),
            }),
            _ => None,
        })
        .collect()
}

/// The two-part detail response: `[thread listing, reply listing]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ThreadDetail {
    pub parts: Vec<Listing>,
}

impl ThreadDetail {
    /// Parse a detail response body.
    ///
    /// Every reply level nests about five JSON levels deep, so the default
    /// recursion limit is lifted and the stack grows on demand instead.
    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        let mut de = serde_json::Deserializer::from_str(body);
        de.disable_recursion_limit();
        let detail = Self::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        Ok(detail)
    }
}
