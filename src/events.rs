//! Event ingestion - replay item and reaction events into the service
//!
//! Events arrive as JSON envelopes, one per line:
//!
//! ```text
//! {"eventType": "post.created", "payload": {"id": 1, "authorId": "alice", "text": "..."}}
//! {"eventType": "reaction.created", "payload": {"id": 7, "targetId": 1, "authorId": "bob", "type": "LIKE"}}
//! ```
//!
//! Replays are idempotent: an id that already exists is skipped with a
//! warning. Items and reactions are immutable, so update and delete events
//! are skipped too.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::BufRead;
use tracing::{info, warn};

use crate::error::{RecError, Result};
use crate::model::{ItemId, NewItem, Reaction, ReactionId};
use crate::service::RecommendationService;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(alias = "event_type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ItemCreated(NewItem),
    ReactionCreated(Reaction),
    /// Recognised but not applicable to immutable records
    Immutable(String),
    Unknown(String),
}

/// What applying one event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    ItemCreated(ItemId),
    ReactionRecorded(ReactionId),
    Duplicate,
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub items: usize,
    pub reactions: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Envelope {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line)
            .map_err(|e| RecError::InvalidArgument(format!("malformed event envelope: {}", e)))
    }

    /// Decode the payload according to the event type
    pub fn decode(self) -> Result<Event> {
        match self.event_type.as_str() {
            "item.created" | "post.created" => {
                Ok(Event::ItemCreated(decode_payload(self.payload)?))
            }
            "reaction.created" => Ok(Event::ReactionCreated(decode_payload(self.payload)?)),
            "item.updated" | "item.deleted" | "post.updated" | "post.deleted"
            | "reaction.updated" | "reaction.deleted" => Ok(Event::Immutable(self.event_type)),
            _ => Ok(Event::Unknown(self.event_type)),
        }
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(mut payload: Value) -> Result<T> {
    normalize_timestamp(&mut payload);
    serde_json::from_value(payload)
        .map_err(|e| RecError::InvalidArgument(format!("malformed event payload: {}", e)))
}

/// Producers may send `createdAt` as unix seconds; rewrite it as RFC 3339
fn normalize_timestamp(payload: &mut Value) {
    let Some(fields) = payload.as_object_mut() else {
        return;
    };
    for key in ["createdAt", "created_at"] {
        let Some(seconds) = fields.get(key).and_then(Value::as_f64) else {
            continue;
        };
        let millis = (seconds * 1000.0).round() as i64;
        if let Some(ts) = DateTime::<Utc>::from_timestamp_millis(millis) {
            fields.insert(key.to_string(), Value::String(ts.to_rfc3339()));
        }
    }
}

/// Apply one decoded envelope to the service
pub fn apply(service: &RecommendationService, envelope: Envelope) -> Result<Applied> {
    let outcome = match envelope.decode()? {
        Event::ItemCreated(item) => service.create_item(item).map(|i| Applied::ItemCreated(i.id)),
        Event::ReactionCreated(reaction) => {
            let id = reaction.id;
            service
                .record_reaction(reaction)
                .map(|()| Applied::ReactionRecorded(id))
        }
        Event::Immutable(event_type) => {
            warn!(event_type = %event_type, "records are immutable, skipping event");
            return Ok(Applied::Skipped);
        }
        Event::Unknown(event_type) => {
            warn!(event_type = %event_type, "unknown event type, skipping");
            return Ok(Applied::Skipped);
        }
    };

    match outcome {
        Err(RecError::Conflict(msg)) => {
            warn!(reason = %msg, "duplicate event, skipping");
            Ok(Applied::Duplicate)
        }
        other => other,
    }
}

/// Replay a JSON-lines stream of envelopes
///
/// A bad line is logged and counted, and the replay moves on. Only a read
/// failure aborts.
pub fn ingest<R: BufRead>(service: &RecommendationService, reader: R) -> anyhow::Result<IngestReport> {
    let mut report = IngestReport::default();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("Failed to read event line {}", line_no))?;
        if line.trim().is_empty() {
            continue;
        }

        match Envelope::parse(&line).and_then(|envelope| apply(service, envelope)) {
            Ok(Applied::ItemCreated(_)) => report.items += 1,
            Ok(Applied::ReactionRecorded(_)) => report.reactions += 1,
            Ok(Applied::Duplicate) => report.duplicates += 1,
            Ok(Applied::Skipped) => report.skipped += 1,
            Err(e) => {
                warn!(line = line_no, error = %e, "failed to apply event");
                report.failed += 1;
            }
        }
    }

    info!(
        items = report.items,
        reactions = report.reactions,
        duplicates = report.duplicates,
        skipped = report.skipped,
        failed = report.failed,
        "ingest finished"
    );
    Ok(report)
}
