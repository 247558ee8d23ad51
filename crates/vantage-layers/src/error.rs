// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error type for settings decoding and edits.
//!
//! None of these escape the public entry points: message ingestion, frames and
//! settings actions are total and degrade to defaults after logging.

use thiserror::Error;

/// Errors raised while decoding or editing layer settings.
#[derive(Debug, Error)]
pub enum LayerError {
    /// A stored settings entry does not match the layer's settings schema.
    #[error("invalid settings for `{key}`: {source}")]
    InvalidSettings {
        /// Entry key (topic or instance id).
        key: String,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// An edit targeted a field the layer does not declare.
    #[error("unknown settings field `{field}`")]
    UnknownField {
        /// Field name from the action path.
        field: String,
    },
    /// A message payload did not match the partial wire shape.
    #[error("undecodable `{schema}` message on `{topic}`: {source}")]
    Message {
        /// Topic the message arrived on.
        topic: String,
        /// Schema name the message was tagged with.
        schema: String,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
}
