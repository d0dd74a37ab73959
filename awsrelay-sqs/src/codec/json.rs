//! JSON protocol (`application/x-amz-json-1.0`)

use serde_json::{Map, Value};
use std::collections::HashMap;

use super::{or_empty, CodecError, Encoding, ReceivedMessage, WireCodec};

/// Codec for JSON request and response bodies
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

fn parse_object(body: &str) -> Result<Map<String, Value>, CodecError> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(CodecError::NotAnObject),
    }
}

fn string_field(object: &Map<String, Value>, field: &str) -> Option<String> {
    object.get(field).and_then(Value::as_str).map(str::to_string)
}

/// `{"name": {"DataType": "String", "StringValue": "v"}}` -> `name = v`
fn string_attributes(object: &Map<String, Value>) -> HashMap<String, String> {
    object
        .get("MessageAttributes")
        .and_then(Value::as_object)
        .map(|attrs| {
            attrs
                .iter()
                .filter_map(|(name, attr)| {
                    attr.get("StringValue")
                        .and_then(Value::as_str)
                        .map(|value| (name.clone(), value.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `field` of each object in the `array` field
fn array_strings(object: &Map<String, Value>, array: &str, field: &str) -> Vec<String> {
    object
        .get(array)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get(field).and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl WireCodec for JsonCodec {
    fn encoding(&self) -> Encoding {
        Encoding::Json
    }

    fn request_field(&self, body: &str, field: &str) -> Option<String> {
        or_empty(parse_object(body).map(|o| string_field(&o, field)), field)
    }

    fn response_field(&self, body: &str, field: &str) -> Option<String> {
        self.request_field(body, field)
    }

    fn batch_ids(&self, response: &str, result_field: &str, id_field: &str) -> Vec<String> {
        or_empty(
            parse_object(response).map(|o| array_strings(&o, result_field, id_field)),
            result_field,
        )
    }

    fn message_attributes(&self, request: &str) -> HashMap<String, String> {
        or_empty(
            parse_object(request).map(|o| string_attributes(&o)),
            "MessageAttributes",
        )
    }

    fn received_messages(&self, response: &str) -> Vec<ReceivedMessage> {
        let messages = parse_object(response).map(|o| {
            o.get("Messages")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_object)
                        .map(|msg| ReceivedMessage {
                            message_id: string_field(msg, "MessageId").unwrap_or_default(),
                            receipt_handle: string_field(msg, "ReceiptHandle").unwrap_or_default(),
                            body: string_field(msg, "Body").unwrap_or_default(),
                            attributes: string_attributes(msg),
                        })
                        .collect()
                })
                .unwrap_or_default()
        });
        or_empty(messages, "Messages")
    }

    fn batch_receipt_handles(&self, request: &str) -> Vec<String> {
        or_empty(
            parse_object(request).map(|o| array_strings(&o, "Entries", "ReceiptHandle")),
            "Entries",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_field() {
        let body = r#"{"QueueUrl":"http://x/q1","MessageBody":"hi","DelaySeconds":5}"#;
        assert_eq!(JsonCodec.request_field(body, "QueueUrl").as_deref(), Some("http://x/q1"));
        assert_eq!(JsonCodec.request_field(body, "MessageBody").as_deref(), Some("hi"));
        // Only string fields are supported
        assert_eq!(JsonCodec.request_field(body, "DelaySeconds"), None);
        assert_eq!(JsonCodec.request_field(body, "Missing"), None);
    }

    #[test]
    fn test_malformed_bodies_yield_nothing() {
        assert_eq!(JsonCodec.request_field("{not json", "QueueUrl"), None);
        assert_eq!(JsonCodec.request_field("[1,2]", "QueueUrl"), None);
        assert_eq!(JsonCodec.request_field("", "QueueUrl"), None);
        assert!(JsonCodec.received_messages("<xml/>").is_empty());
        assert!(JsonCodec.batch_ids("", "Successful", "MessageId").is_empty());
        assert!(JsonCodec.message_attributes("oops").is_empty());
    }

    #[test]
    fn test_batch_ids() {
        let response = r#"{
            "Successful": [
                {"Id": "a", "MessageId": "m1"},
                {"Id": "b"},
                {"Id": "c", "MessageId": "m3"}
            ],
            "Failed": [{"Id": "d", "Code": "X"}]
        }"#;
        assert_eq!(
            JsonCodec.batch_ids(response, "Successful", "MessageId"),
            vec!["m1".to_string(), "m3".to_string()]
        );
    }

    #[test]
    fn test_message_attributes() {
        let request = r#"{
            "MessageAttributes": {
                "trace": {"DataType": "String", "StringValue": "abc"},
                "blob": {"DataType": "Binary", "BinaryValue": "AAEC"}
            }
        }"#;
        let attrs = JsonCodec.message_attributes(request);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("trace").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_received_messages() {
        let response = r#"{
            "Messages": [
                {
                    "MessageId": "m1",
                    "ReceiptHandle": "rh1",
                    "Body": "hello",
                    "MessageAttributes": {"k": {"DataType": "String", "StringValue": "v"}}
                },
                {"MessageId": "m2", "ReceiptHandle": "rh2", "Body": ""}
            ]
        }"#;
        let messages = JsonCodec.received_messages(response);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message_id, "m1");
        assert_eq!(messages[0].receipt_handle, "rh1");
        assert_eq!(messages[0].body, "hello");
        assert_eq!(messages[0].attributes.get("k").map(String::as_str), Some("v"));
        assert_eq!(messages[1].message_id, "m2");
        assert!(messages[1].attributes.is_empty());
    }

    #[test]
    fn test_empty_receive() {
        assert!(JsonCodec.received_messages("{}").is_empty());
    }

    #[test]
    fn test_batch_receipt_handles() {
        let request = r#"{
            "QueueUrl": "http://x/q1",
            "Entries": [
                {"Id": "1", "ReceiptHandle": "rh1"},
                {"Id": "2", "ReceiptHandle": "rh2"}
            ]
        }"#;
        assert_eq!(
            JsonCodec.batch_receipt_handles(request),
            vec!["rh1".to_string(), "rh2".to_string()]
        );
    }
}
