//! Query protocol: form-encoded requests, XML responses

use std::borrow::Cow;
use std::collections::HashMap;

use super::xml::{self, Element};
use super::{or_empty, Encoding, ReceivedMessage, WireCodec};

const ATTRIBUTE_PREFIX: &str = "MessageAttribute.";
const DELETE_ENTRY_PREFIX: &str = "DeleteMessageBatchRequestEntry.";

/// Codec for form-encoded requests and XML responses
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryCodec;

fn params(body: &str) -> form_urlencoded::Parse<'_> {
    form_urlencoded::parse(body.as_bytes())
}

/// Split `Prefix.N.rest` into `(N, rest)`
fn indexed<'a>(key: &'a str, prefix: &str) -> Option<(u32, &'a str)> {
    let (index, rest) = key.strip_prefix(prefix)?.split_once('.')?;
    Some((index.parse().ok()?, rest))
}

fn string_attributes(element: &Element) -> HashMap<String, String> {
    element
        .find_all("MessageAttribute")
        .into_iter()
        .filter_map(|attr| {
            let name = attr.text_of("Name").filter(|n| !n.is_empty())?;
            let value = attr.text_of("StringValue").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

impl WireCodec for QueryCodec {
    fn encoding(&self) -> Encoding {
        Encoding::Query
    }

    fn request_field(&self, body: &str, field: &str) -> Option<String> {
        params(body)
            .find(|(key, _)| key == field)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    fn response_field(&self, body: &str, field: &str) -> Option<String> {
        let found = xml::parse(body).map(|root| {
            root.text_of(field)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        });
        or_empty(found, field)
    }

    /// XML batch results list every id in its own element, so `result_field`
    /// is not needed to find them.
    fn batch_ids(&self, response: &str, _result_field: &str, id_field: &str) -> Vec<String> {
        let ids = xml::parse(response).map(|root| {
            root.find_all(id_field)
                .into_iter()
                .map(|e| e.text.clone())
                .filter(|id| !id.is_empty())
                .collect()
        });
        or_empty(ids, id_field)
    }

    fn message_attributes(&self, request: &str) -> HashMap<String, String> {
        let mut names: HashMap<u32, Cow<'_, str>> = HashMap::new();
        let mut values: HashMap<u32, Cow<'_, str>> = HashMap::new();

        for (key, value) in params(request) {
            match indexed(&key, ATTRIBUTE_PREFIX) {
                Some((index, "Name")) => {
                    names.insert(index, value);
                }
                Some((index, "Value.StringValue")) => {
                    values.insert(index, value);
                }
                _ => {}
            }
        }

        names
            .into_iter()
            .filter_map(|(index, name)| {
                values
                    .remove(&index)
                    .map(|value| (name.into_owned(), value.into_owned()))
            })
            .collect()
    }

    fn received_messages(&self, response: &str) -> Vec<ReceivedMessage> {
        let messages = xml::parse(response).map(|root| {
            root.find_all("Message")
                .into_iter()
                .map(|msg| ReceivedMessage {
                    message_id: msg.text_of("MessageId").unwrap_or_default().to_string(),
                    receipt_handle: msg.text_of("ReceiptHandle").unwrap_or_default().to_string(),
                    body: msg.text_of("Body").unwrap_or_default().to_string(),
                    attributes: string_attributes(msg),
                })
                .collect()
        });
        or_empty(messages, "Message")
    }

    fn batch_receipt_handles(&self, request: &str) -> Vec<String> {
        params(request)
            .filter(|(key, _)| matches!(indexed(key, DELETE_ENTRY_PREFIX), Some((_, "ReceiptHandle"))))
            .map(|(_, value)| value.into_owned())
            .collect()
    }
}
