// This file is part of LaminaDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::constants::STREAM_KIND;
use crate::error::{Error, Result};
use crate::metrics::AppendMetrics;
use crate::model::{AppendReceipt, EventInput, ExpectedPosition, StreamMeta};
use crate::schema::Schema;
use crate::storage::{Container, DocumentLink, StoreScope};

/// Appends event batches to streams with optimistic concurrency control.
///
/// Each call to [`append`](Appender::append) runs as one atomic scope over
/// the container: every event of the batch plus the stream metadata update
/// commit together, or nothing commits at all.
///
/// # Example
///
/// ```rust
/// use laminadb::engine::Appender;
/// use laminadb::model::{EventInput, ExpectedPosition};
/// use laminadb::storage::MemoryContainer;
/// use serde_json::json;
///
/// # fn main() -> Result<(), laminadb::Error> {
/// let mut appender = Appender::new(MemoryContainer::new());
///
/// let receipts = appender.append(
///     "order-1001",
///     ExpectedPosition::NoStream,
///     &[EventInput::new("e1", "OrderPlaced", json!({ "total": 42 }))],
/// )?;
///
/// assert_eq!(receipts[0].position, 1);
/// # Ok(())
/// # }
/// ```
pub struct Appender<C> {
    container: C,
    schema: Schema,
    metrics: Option<Arc<AppendMetrics>>,
}

impl<C: Container> Appender<C> {
    pub fn new(container: C) -> Self {
        Self::with_schema(container, Schema::default())
    }

    pub fn with_schema(container: C, schema: Schema) -> Self {
        Self {
            container,
            schema,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<AppendMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut C {
        &mut self.container
    }

    /// Appends `batch` to `stream_id`, assigning contiguous positions
    /// starting right after the stream's current last position.
    ///
    /// Returns one [`AppendReceipt`] per event, in input order, all sharing
    /// a single commit timestamp. On any error the whole batch is discarded
    /// and the stream is left exactly as it was.
    pub fn append(
        &mut self,
        stream_id: &str,
        expected: ExpectedPosition,
        batch: &[EventInput],
    ) -> Result<Vec<AppendReceipt>> {
        let _timer = self
            .metrics
            .as_ref()
            .map(|m| m.append_latency.start_timer());

        if stream_id.is_empty() {
            return Err(Error::EmptyStreamId);
        }
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let created = Utc::now();
        let mut scope = self.container.begin()?;
        match append_in_scope(&mut scope, &self.schema, stream_id, expected, batch, created) {
            Ok(receipts) => {
                scope.commit()?;
                if let Some(m) = &self.metrics {
                    m.events_appended.inc_by(receipts.len() as u64);
                }
                debug!(stream_id, events = receipts.len(), "batch committed");
                Ok(receipts)
            }
            Err(err) => {
                // Dropping the scope discards every staged write.
                drop(scope);
                if let Some(m) = &self.metrics {
                    m.appends_rejected.inc();
                }
                warn!(stream_id, code = err.code(), "append aborted");
                Err(err)
            }
        }
    }
}

/// Runs the append procedure inside an already-open scope.
///
/// This is the transaction body itself: hosts that manage their own scopes
/// can call it directly and decide when to commit. The steps run strictly
/// in order (locate metadata, check the expected position, write each
/// event, replace the metadata record) and the first error aborts the
/// chain. The caller must not commit the scope after an error.
pub fn append_in_scope<S: StoreScope>(
    scope: &mut S,
    schema: &Schema,
    stream_id: &str,
    expected: ExpectedPosition,
    batch: &[EventInput],
    created: DateTime<Utc>,
) -> Result<Vec<AppendReceipt>> {
    if stream_id.is_empty() {
        return Err(Error::EmptyStreamId);
    }
    if batch.is_empty() {
        return Ok(Vec::new());
    }

    let (meta_link, mut meta) = locate_metadata(scope, schema, stream_id)?;
    check_expected(stream_id, expected, meta.last_position + 1)?;

    let mut next = meta.last_position;
    let mut receipts = Vec::with_capacity(batch.len());
    for input in batch {
        next += 1;
        let doc = schema.encode_event(stream_id, input, next, created);
        if scope.create(doc)?.is_none() {
            return Err(Error::EventWriteRejected {
                container: schema.container_name.clone(),
                position: next,
            });
        }
        receipts.push(AppendReceipt {
            position: next,
            created,
        });
    }

    meta.last_position = next;
    meta.last_updated_utc = Some(created);
    if !scope.replace(&meta_link, schema.encode_meta(&meta))? {
        return Err(Error::MetadataWriteRejected {
            stream_id: stream_id.to_string(),
        });
    }

    Ok(receipts)
}

/// Finds the stream's single metadata record, creating a fresh one at
/// position 0 when the stream has none. More than one record means the
/// store is corrupted and the operation cannot proceed.
fn locate_metadata<S: StoreScope>(
    scope: &mut S,
    schema: &Schema,
    stream_id: &str,
) -> Result<(DocumentLink, StreamMeta)> {
    let mut found = scope.query(stream_id, STREAM_KIND)?;
    if found.len() > 1 {
        return Err(Error::CorruptMetadata {
            stream_id: stream_id.to_string(),
            count: found.len(),
        });
    }
    match found.pop() {
        Some(doc) => Ok((doc.link, schema.decode_meta(&doc.body)?)),
        None => {
            let meta = StreamMeta::new(stream_id);
            let link = scope.create(schema.encode_meta(&meta))?.ok_or_else(|| {
                Error::MetadataWriteRejected {
                    stream_id: stream_id.to_string(),
                }
            })?;
            debug!(stream_id, "created stream metadata");
            Ok((link, meta))
        }
    }
}

/// Evaluates the caller's precondition against the position the first new
/// event would take. Runs before any event document is written.
fn check_expected(stream_id: &str, expected: ExpectedPosition, next: u64) -> Result<()> {
    match expected {
        ExpectedPosition::Any => Ok(()),
        ExpectedPosition::NoStream if next > 1 => Err(Error::StreamExists {
            stream_id: stream_id.to_string(),
            next,
        }),
        ExpectedPosition::NoStream => Ok(()),
        ExpectedPosition::Exact(position) if position != next => Err(Error::PositionMismatch {
            stream_id: stream_id.to_string(),
            expected: position,
            next,
        }),
        ExpectedPosition::Exact(_) => Ok(()),
    }
}
