// This file is part of LaminaDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Custom error type for LaminaDB append operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The stream already has committed events (`NoStream` expectation).
    #[error("stream {stream_id} already exists: next position would be {next}")]
    StreamExists { stream_id: String, next: u64 },

    /// Stale expected position (`Exact` expectation).
    #[error(
        "position mismatch for stream {stream_id}: expected {expected}, next position is {next}"
    )]
    PositionMismatch {
        stream_id: String,
        expected: u64,
        next: u64,
    },

    /// The store refused an event write, typically throughput exhaustion.
    /// The whole append rolls back; retry after backoff.
    #[error(
        "failed to append event on position {position} - rollback; \
         try to increase throughput for container {container}"
    )]
    EventWriteRejected { container: String, position: u64 },

    /// The store refused the metadata write. The whole append rolls back.
    #[error("failed to write metadata for stream {stream_id} - rollback")]
    MetadataWriteRejected { stream_id: String },

    /// More than one metadata record found for a stream.
    #[error("corrupt metadata for stream {stream_id}: found {count} records")]
    CorruptMetadata { stream_id: String, count: usize },

    /// Stream identifiers must be non-empty.
    #[error("empty stream id")]
    EmptyStreamId,

    /// Backend failure during lookup, create, or replace.
    #[error("store error: {0}")]
    Store(String),

    /// Document encode/decode failed.
    #[error("document serialization failed: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short machine-readable code, mirrored from the wire protocol.
    pub fn code(&self) -> &'static str {
        match self {
            Error::StreamExists { .. } => "STREAMEXISTS",
            Error::PositionMismatch { .. } => "POSITIONNOTMATCH",
            Error::EventWriteRejected { .. } => "EVENTWRITEREJECTED",
            Error::MetadataWriteRejected { .. } => "METADATAWRITEREJECTED",
            Error::CorruptMetadata { .. } => "CORRUPTMETADATA",
            Error::EmptyStreamId => "EMPTYSTREAMID",
            Error::Store(_) => "STOREFAILURE",
            Error::Serialization(_) => "SERIALIZATION",
        }
    }
}
