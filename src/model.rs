// This file is part of LaminaDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One event as submitted by the caller.
///
/// The `data` and `metadata` payloads are opaque JSON values; the engine
/// never inspects them. This structure is what gets passed to
/// [`Appender::append`](crate::engine::Appender::append).
#[derive(Debug, Clone, PartialEq)]
pub struct EventInput {
    /// Caller-supplied unique identifier for the event.
    pub id: String,
    /// Optional tracing identifier linking related operations.
    pub correlation_id: Option<String>,
    /// Optional tracing identifier naming the event that caused this one.
    pub causation_id: Option<String>,
    /// Event type discriminator chosen by the caller.
    pub name: String,
    /// Opaque event payload.
    pub data: Value,
    /// Opaque side-channel metadata.
    pub metadata: Value,
}

impl EventInput {
    /// Creates a new `EventInput` with the given id, name and payload.
    pub fn new(id: impl Into<String>, name: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            correlation_id: None,
            causation_id: None,
            name: name.into(),
            data,
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_causation_id(mut self, id: impl Into<String>) -> Self {
        self.causation_id = Some(id.into());
        self
    }
}

/// The single metadata record of a stream.
///
/// Created on the first append to a stream and replaced in place on every
/// append after that. `last_position` is always the highest committed event
/// position; 0 means the stream has no events yet.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMeta {
    pub stream_id: String,
    pub last_position: u64,
    /// Absent until the first batch commits.
    pub last_updated_utc: Option<DateTime<Utc>>,
}

impl StreamMeta {
    /// A fresh metadata record for a stream with no events.
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            last_position: 0,
            last_updated_utc: None,
        }
    }
}

/// A fully persisted event, as decoded back from a stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: String,
    pub correlation_id: Option<String>,
    pub causation_id: Option<String>,
    pub stream_id: String,
    pub position: u64,
    pub name: String,
    pub data: Value,
    pub metadata: Value,
    pub created_utc: DateTime<Utc>,
}

/// Position and commit timestamp assigned to one appended event.
///
/// Returned in input order, one per event. Every receipt of a batch carries
/// the same `created` timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AppendReceipt {
    pub position: u64,
    pub created: DateTime<Utc>,
}

/// The caller's optimistic-concurrency expectation for an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedPosition {
    /// No precondition; append regardless of the stream's state.
    Any,
    /// The stream must have no committed events.
    NoStream,
    /// The first new event must land exactly on this position.
    Exact(u64),
}
