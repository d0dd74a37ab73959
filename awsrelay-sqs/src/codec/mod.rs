//! Protocol sniffing for the two SQS wire encodings
//!
//! SQS clients talk either the JSON protocol (`application/x-amz-json-1.0`
//! bodies, action in `X-Amz-Target`) or the query protocol (form-encoded
//! requests carrying `Action=...`, XML responses). Both are handled by a
//! [`WireCodec`] implementation picked once per exchange from the request
//! content type.
//!
//! Extraction is advisory: malformed input yields empty results, and every
//! suppressed failure is reported through `tracing` at debug level.

mod json;
mod query;
mod xml;

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

pub use json::JsonCodec;
pub use query::QueryCodec;

/// Reasons an extraction came back empty
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a JSON object at the top level")]
    NotAnObject,

    #[error("Malformed XML: {0}")]
    Xml(String),
}

/// Wire encoding of one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Query,
}

impl Encoding {
    /// JSON when the content type mentions json, query otherwise
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.to_ascii_lowercase().contains("json") {
            Self::Json
        } else {
            Self::Query
        }
    }

    pub fn codec(self) -> &'static dyn WireCodec {
        match self {
            Self::Json => &JsonCodec,
            Self::Query => &QueryCodec,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Query => f.write_str("query"),
        }
    }
}

/// SQS operation named by a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SendMessage,
    SendMessageBatch,
    ReceiveMessage,
    DeleteMessage,
    DeleteMessageBatch,
    /// A named operation the relay does not record (CreateQueue, ...)
    Other(String),
    /// No action could be found in the request
    Unknown,
}

impl Action {
    pub fn from_name(name: &str) -> Self {
        match name {
            "SendMessage" => Self::SendMessage,
            "SendMessageBatch" => Self::SendMessageBatch,
            "ReceiveMessage" => Self::ReceiveMessage,
            "DeleteMessage" => Self::DeleteMessage,
            "DeleteMessageBatch" => Self::DeleteMessageBatch,
            "" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::SendMessage => "SendMessage",
            Self::SendMessageBatch => "SendMessageBatch",
            Self::ReceiveMessage => "ReceiveMessage",
            Self::DeleteMessage => "DeleteMessage",
            Self::DeleteMessageBatch => "DeleteMessageBatch",
            Self::Other(name) => name,
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strip the namespace from an `X-Amz-Target` value (`AmazonSQS.SendMessage`)
pub fn action_from_target(target: &str) -> Option<&str> {
    target
        .split_once('.')
        .map(|(_, action)| action)
        .filter(|action| !action.is_empty())
}

/// Work out which operation a request invokes.
///
/// The target header wins; query-encoded requests fall back to their
/// `Action` parameter.
pub fn identify_action(target: Option<&str>, request: &str, encoding: Encoding) -> Action {
    if let Some(name) = target.and_then(action_from_target) {
        return Action::from_name(name);
    }

    match encoding {
        Encoding::Query => QueryCodec
            .request_field(request, "Action")
            .map_or(Action::Unknown, |name| Action::from_name(&name)),
        Encoding::Json => Action::Unknown,
    }
}

/// Queue name is the last path segment of the queue URL
pub fn queue_name(queue_url: &str) -> &str {
    queue_url.rsplit('/').next().unwrap_or(queue_url)
}

/// One message as returned by ReceiveMessage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    pub attributes: HashMap<String, String>,
}

/// Field extraction for one wire encoding
pub trait WireCodec: Send + Sync {
    fn encoding(&self) -> Encoding;

    /// A string parameter of the request
    fn request_field(&self, body: &str, field: &str) -> Option<String>;

    /// A string value of the response
    fn response_field(&self, body: &str, field: &str) -> Option<String>;

    /// Ids of the successful entries of a batch response, in document order
    fn batch_ids(&self, response: &str, result_field: &str, id_field: &str) -> Vec<String>;

    /// String message attributes of a send request
    fn message_attributes(&self, request: &str) -> HashMap<String, String>;

    /// Messages carried by a ReceiveMessage response
    fn received_messages(&self, response: &str) -> Vec<ReceivedMessage>;

    /// Receipt handles of a DeleteMessageBatch request, in document order
    fn batch_receipt_handles(&self, request: &str) -> Vec<String>;
}

/// Swallow an extraction error, leaving a trace of it
fn or_empty<T: Default>(result: Result<T, CodecError>, what: &str) -> T {
    result.unwrap_or_else(|e| {
        debug!(error = %e, what = %what, "Extraction failed");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_from_content_type() {
        assert_eq!(
            Encoding::from_content_type("application/x-amz-json-1.0"),
            Encoding::Json
        );
        assert_eq!(
            Encoding::from_content_type("application/JSON; charset=utf-8"),
            Encoding::Json
        );
        assert_eq!(
            Encoding::from_content_type("application/x-www-form-urlencoded; charset=utf-8"),
            Encoding::Query
        );
        assert_eq!(Encoding::from_content_type(""), Encoding::Query);
    }

    #[test]
    fn test_action_from_target() {
        assert_eq!(action_from_target("AmazonSQS.SendMessage"), Some("SendMessage"));
        assert_eq!(action_from_target("AmazonSQS."), None);
        assert_eq!(action_from_target("SendMessage"), None);
    }

    #[test]
    fn test_identify_action_prefers_target() {
        let action = identify_action(
            Some("AmazonSQS.ReceiveMessage"),
            "Action=SendMessage",
            Encoding::Query,
        );
        assert_eq!(action, Action::ReceiveMessage);
    }

    #[test]
    fn test_identify_action_query_fallback() {
        let action = identify_action(None, "Action=DeleteMessageBatch&Version=2012-11-05", Encoding::Query);
        assert_eq!(action, Action::DeleteMessageBatch);
    }

    #[test]
    fn test_identify_action_unknown() {
        assert_eq!(
            identify_action(None, r#"{"QueueUrl":"http://x/q1"}"#, Encoding::Json),
            Action::Unknown
        );
        assert_eq!(identify_action(None, "QueueUrl=x", Encoding::Query), Action::Unknown);
        assert_eq!(identify_action(None, "", Encoding::Query), Action::Unknown);
    }

    #[test]
    fn test_identify_action_other() {
        let action = identify_action(Some("AmazonSQS.CreateQueue"), "{}", Encoding::Json);
        assert_eq!(action, Action::Other("CreateQueue".to_string()));
        assert_eq!(action.to_string(), "CreateQueue");
    }

    #[test]
    fn test_queue_name() {
        assert_eq!(queue_name("http://localhost:4566/000000000000/orders"), "orders");
        assert_eq!(queue_name("orders"), "orders");
        assert_eq!(queue_name(""), "");
    }

    #[test]
    fn test_codec_selection() {
        assert_eq!(Encoding::Json.codec().encoding(), Encoding::Json);
        assert_eq!(Encoding::Query.codec().encoding(), Encoding::Query);
    }
}
