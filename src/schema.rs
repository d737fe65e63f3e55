// This file is part of LaminaDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::constants::{
    DEFAULT_CONTAINER_NAME, EVENT_KIND, KIND_FIELD, STREAM_ID_FIELD, STREAM_KIND,
};
use crate::error::{Error, Result};
use crate::model::{EventInput, EventRecord, StreamMeta};

/// Wire name of the per-stream sequence field.
///
/// Deployments disagree on whether the sequence is called `position` or
/// `version`; the engine logic is identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionField {
    Position,
    Version,
}

impl PositionField {
    /// Field name on event documents.
    pub fn event_field(self) -> &'static str {
        match self {
            PositionField::Position => "position",
            PositionField::Version => "version",
        }
    }

    /// Field name on stream metadata documents.
    pub fn meta_field(self) -> &'static str {
        match self {
            PositionField::Position => "lastPosition",
            PositionField::Version => "lastVersion",
        }
    }
}

/// Deploy-time wire configuration for one container.
///
/// A `Schema` pins the container name used for metadata lookups, the
/// naming of the sequence field, and whether event documents carry a
/// `causationId`. It is configuration, not a runtime input: one deployment
/// uses exactly one `Schema`.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Container/collection the stream lives in.
    pub container_name: String,
    /// `position` vs `version` naming on the wire.
    pub position_field: PositionField,
    /// Whether event documents carry the `causationId` field.
    pub causation_ids: bool,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            container_name: DEFAULT_CONTAINER_NAME.to_string(),
            position_field: PositionField::Position,
            causation_ids: true,
        }
    }
}

impl Schema {
    pub fn with_container(mut self, name: impl Into<String>) -> Self {
        self.container_name = name.into();
        self
    }

    /// Encodes a stream metadata record as a wire document.
    ///
    /// `lastUpdatedUtc` is omitted entirely on a record that has never
    /// committed a batch.
    pub fn encode_meta(&self, meta: &StreamMeta) -> Value {
        let mut doc = Map::new();
        doc.insert(KIND_FIELD.into(), Value::from(STREAM_KIND));
        doc.insert(STREAM_ID_FIELD.into(), Value::from(meta.stream_id.as_str()));
        doc.insert(
            self.position_field.meta_field().into(),
            Value::from(meta.last_position),
        );
        if let Some(ts) = meta.last_updated_utc {
            doc.insert("lastUpdatedUtc".into(), Value::from(encode_timestamp(ts)));
        }
        Value::Object(doc)
    }

    pub fn decode_meta(&self, doc: &Value) -> Result<StreamMeta> {
        let stream_id = require_str(doc, STREAM_ID_FIELD)?;
        let last_position = doc
            .get(self.position_field.meta_field())
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                Error::Serialization(format!(
                    "metadata document missing {}",
                    self.position_field.meta_field()
                ))
            })?;
        let last_updated_utc = match doc.get("lastUpdatedUtc") {
            None | Some(Value::Null) => None,
            Some(v) => Some(decode_timestamp(v)?),
        };
        Ok(StreamMeta {
            stream_id: stream_id.to_string(),
            last_position,
            last_updated_utc,
        })
    }

    /// Encodes one event as a wire document, stamping the assigned position
    /// and the batch timestamp.
    pub fn encode_event(
        &self,
        stream_id: &str,
        input: &EventInput,
        position: u64,
        created: DateTime<Utc>,
    ) -> Value {
        let mut doc = Map::new();
        doc.insert(KIND_FIELD.into(), Value::from(EVENT_KIND));
        doc.insert("id".into(), Value::from(input.id.as_str()));
        doc.insert(
            "correlationId".into(),
            opt_str(input.correlation_id.as_deref()),
        );
        if self.causation_ids {
            doc.insert("causationId".into(), opt_str(input.causation_id.as_deref()));
        }
        doc.insert(STREAM_ID_FIELD.into(), Value::from(stream_id));
        doc.insert(
            self.position_field.event_field().into(),
            Value::from(position),
        );
        doc.insert("name".into(), Value::from(input.name.as_str()));
        doc.insert("data".into(), input.data.clone());
        doc.insert("metadata".into(), input.metadata.clone());
        doc.insert("createdUtc".into(), Value::from(encode_timestamp(created)));
        Value::Object(doc)
    }

    pub fn decode_event(&self, doc: &Value) -> Result<EventRecord> {
        let position = doc
            .get(self.position_field.event_field())
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                Error::Serialization(format!(
                    "event document missing {}",
                    self.position_field.event_field()
                ))
            })?;
        let created_utc = decode_timestamp(
            doc.get("createdUtc")
                .ok_or_else(|| Error::Serialization("event document missing createdUtc".into()))?,
        )?;
        Ok(EventRecord {
            id: require_str(doc, "id")?.to_string(),
            correlation_id: optional_str(doc, "correlationId"),
            causation_id: optional_str(doc, "causationId"),
            stream_id: require_str(doc, STREAM_ID_FIELD)?.to_string(),
            position,
            name: require_str(doc, "name")?.to_string(),
            data: doc.get("data").cloned().unwrap_or(Value::Null),
            metadata: doc.get("metadata").cloned().unwrap_or(Value::Null),
            created_utc,
        })
    }
}

/// Timestamps travel as RFC 3339 with millisecond precision, `Z`-suffixed.
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_timestamp(v: &Value) -> Result<DateTime<Utc>> {
    let raw = v
        .as_str()
        .ok_or_else(|| Error::Serialization("timestamp field is not a string".into()))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("invalid timestamp {raw:?}: {e}")))
}

fn opt_str(v: Option<&str>) -> Value {
    match v {
        Some(s) => Value::from(s),
        None => Value::Null,
    }
}

fn require_str<'a>(doc: &'a Value, field: &str) -> Result<&'a str> {
    doc.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Serialization(format!("document missing {field}")))
}

fn optional_str(doc: &Value, field: &str) -> Option<String> {
    doc.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_input() -> EventInput {
        EventInput::new("e1", "OrderPlaced", json!({"total": 42}))
            .with_metadata(json!({"source": "checkout"}))
            .with_correlation_id("corr-1")
            .with_causation_id("cause-1")
    }

    #[test]
    fn test_fresh_meta_omits_last_updated() {
        let schema = Schema::default();
        let doc = schema.encode_meta(&StreamMeta::new("s-1"));

        assert_eq!(doc["type"], "Stream");
        assert_eq!(doc["streamId"], "s-1");
        assert_eq!(doc["lastPosition"], 0);
        assert!(doc.get("lastUpdatedUtc").is_none());

        let meta = schema.decode_meta(&doc).unwrap();
        assert_eq!(meta, StreamMeta::new("s-1"));
    }

    #[test]
    fn test_meta_roundtrip_after_update() {
        let schema = Schema::default();
        let updated = StreamMeta {
            stream_id: "s-1".to_string(),
            last_position: 7,
            last_updated_utc: Some(Utc::now()),
        };
        let decoded = schema.decode_meta(&schema.encode_meta(&updated)).unwrap();

        assert_eq!(decoded.last_position, 7);
        // Stored timestamps carry millisecond precision.
        let stored = decoded.last_updated_utc.unwrap();
        let original = updated.last_updated_utc.unwrap();
        assert!((original - stored).num_milliseconds().abs() <= 1);
    }

    #[test]
    fn test_event_document_position_naming() {
        let schema = Schema::default();
        let doc = schema.encode_event("s-1", &sample_input(), 3, Utc::now());

        assert_eq!(doc["type"], "Event");
        assert_eq!(doc["id"], "e1");
        assert_eq!(doc["streamId"], "s-1");
        assert_eq!(doc["position"], 3);
        assert_eq!(doc["name"], "OrderPlaced");
        assert_eq!(doc["correlationId"], "corr-1");
        assert_eq!(doc["causationId"], "cause-1");
        assert_eq!(doc["data"], json!({"total": 42}));
        assert!(doc.get("version").is_none());
    }

    #[test]
    fn test_event_document_version_naming() {
        let schema = Schema {
            position_field: PositionField::Version,
            ..Schema::default()
        };
        let doc = schema.encode_event("s-1", &sample_input(), 3, Utc::now());

        assert_eq!(doc["version"], 3);
        assert!(doc.get("position").is_none());

        let record = schema.decode_event(&doc).unwrap();
        assert_eq!(record.position, 3);
    }

    #[test]
    fn test_causation_field_can_be_disabled() {
        let schema = Schema {
            causation_ids: false,
            ..Schema::default()
        };
        let doc = schema.encode_event("s-1", &sample_input(), 1, Utc::now());

        assert!(doc.get("causationId").is_none());
        assert_eq!(doc["correlationId"], "corr-1");

        let record = schema.decode_event(&doc).unwrap();
        assert_eq!(record.causation_id, None);
    }

    #[test]
    fn test_missing_tracing_ids_encode_as_null() {
        let schema = Schema::default();
        let input = EventInput::new("e1", "OrderPlaced", Value::Null);
        let doc = schema.encode_event("s-1", &input, 1, Utc::now());

        assert_eq!(doc["correlationId"], Value::Null);
        assert_eq!(doc["causationId"], Value::Null);

        let record = schema.decode_event(&doc).unwrap();
        assert_eq!(record.correlation_id, None);
        assert_eq!(record.causation_id, None);
    }

    #[test]
    fn test_decode_meta_rejects_wrong_naming() {
        let versioned = Schema {
            position_field: PositionField::Version,
            ..Schema::default()
        };
        let doc = Schema::default().encode_meta(&StreamMeta::new("s-1"));

        let err = versioned.decode_meta(&doc).unwrap_err();
        assert_eq!(err.code(), "SERIALIZATION");
    }
}
