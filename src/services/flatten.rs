// src/services/flatten.rs

//! Reply tree flattening.
//!
//! Walks the nested reply listing of a thread detail response and turns every
//! live reply into a [`Record`]. The walk uses an explicit stack, so deeply
//! nested threads cannot exhaust the call stack.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{
    REPLY_KIND, Record, RecordMetadata, ReplyData, SOURCE, Thing, ThreadDetail, ThreadMeta,
};
use crate::utils::word_count;

/// Bodies that mark a reply as removed.
pub const TOMBSTONES: [&str; 2] = ["[deleted]", "[removed]"];

/// Records produced from one thread.
#[derive(Debug, Default)]
pub struct Flattened {
    pub records: Vec<Record>,
    pub record_count: u64,
    pub word_count: u64,
}

/// Flatten a thread detail response into records.
///
/// Malformed or undersized responses yield an empty result.
pub fn flatten(detail: ThreadDetail, thread_id: &str, thread_url: &str) -> Flattened {
    let mut out = Flattened::default();

    let mut parts = detail.parts.into_iter();
    let (Some(meta_part), Some(reply_part)) = (parts.next(), parts.next()) else {
        log::debug!("Detail for {} has fewer than two parts", thread_url);
        return out;
    };
    let Some(meta) = thread_meta(meta_part.data.children) else {
        log::debug!("Detail for {} carries no thread metadata", thread_url);
        return out;
    };

    // Reversed so that popping yields document order.
    let mut stack: Vec<Thing> = reply_part.data.children;
    stack.reverse();

    while let Some(thing) = stack.pop() {
        if thing.kind != REPLY_KIND {
            continue;
        }
        let (reply, mut children): (ReplyData, Vec<Thing>) = match thing.into_reply() {
            Ok(split) => split,
            Err(e) => {
                log::debug!("Skipping unreadable reply in {}: {}", thread_url, e);
                continue;
            }
        };

        children.reverse();
        stack.extend(children);

        // A reply without a body still counts, as an empty record.
        let text = reply.body.unwrap_or_default();
        if TOMBSTONES.contains(&text.as_str()) {
            continue;
        }
        let Some(timestamp) = reply.created_utc.and_then(iso_timestamp) else {
            log::debug!("Reply {} has no usable creation time", reply.id);
            continue;
        };

        out.word_count += word_count(&text);
        out.record_count += 1;
        out.records.push(Record {
            id: reply.id,
            text,
            timestamp,
            source: SOURCE.to_string(),
            metadata: RecordMetadata {
                category: meta.subreddit.clone(),
                thread_id: Some(thread_id.to_string()),
                thread_title: meta.title.clone(),
                url: thread_url.to_string(),
            },
        });
    }

    out
}

fn thread_meta(children: Vec<Thing>) -> Option<ThreadMeta> {
    let first = children.into_iter().next()?;
    serde_json::from_value(first.data).ok()
}

/// Render epoch seconds as ISO-8601 UTC, e.g. `2024-03-01T12:00:00Z`.
fn iso_timestamp(epoch: f64) -> Option<String> {
    if !epoch.is_finite() {
        return None;
    }
    let secs = epoch.floor();
    let nanos = ((epoch - secs) * 1e9).round().min(999_999_999.0) as u32;
    let time: DateTime<Utc> = DateTime::from_timestamp(secs as i64, nanos)?;
    Some(time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}
