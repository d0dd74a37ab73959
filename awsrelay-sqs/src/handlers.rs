//! HTTP relay for SQS
//!
//! Every request is forwarded to the upstream endpoint unchanged and the
//! upstream response is handed back unchanged. After a successful round trip
//! the exchange is classified and the resulting lifecycle events are recorded.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use url::Url;

use awsrelay_core::{ExchangeId, RelayError};

use crate::codec::{identify_action, queue_name, Action, Encoding};
use crate::storage::LifecycleStore;

const BATCH_BODY_PLACEHOLDER: &str = "[batch message]";

/// Parse and validate the upstream base URL
pub fn parse_upstream(upstream: &str) -> Result<Url, RelayError> {
    let url = Url::parse(upstream).map_err(|e| RelayError::invalid_upstream(upstream, e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(RelayError::invalid_upstream(
            upstream,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(RelayError::invalid_upstream(upstream, "missing host"));
    }

    Ok(url)
}

/// Headers that describe a single connection rather than the message
fn is_forwardable(name: &str) -> bool {
    !matches!(
        name,
        "host"
            | "content-length"
            | "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// What the relay learned about a request before forwarding it.
///
/// Lives only for the duration of one exchange and is never put on the wire.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub id: ExchangeId,
    pub encoding: Encoding,
    pub action: Action,
    /// Request parameters: the body, or the URL query for body-less query requests
    pub request: String,
    pub queue_url: String,
}

impl Exchange {
    pub fn capture(uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let target = headers.get("x-amz-target").and_then(|v| v.to_str().ok());
        let encoding = Encoding::from_content_type(content_type);

        let mut request = String::from_utf8_lossy(body).into_owned();
        if request.is_empty() && encoding == Encoding::Query {
            request = uri.query().unwrap_or_default().to_string();
        }

        let action = identify_action(target, &request, encoding);
        let queue_url = encoding
            .codec()
            .request_field(&request, "QueueUrl")
            .unwrap_or_default();

        Self {
            id: ExchangeId::new(),
            encoding,
            action,
            request,
            queue_url,
        }
    }

    pub fn queue_name(&self) -> &str {
        queue_name(&self.queue_url)
    }
}

/// Buffered upstream response
#[derive(Debug)]
struct UpstreamResponse {
    status: u16,
    headers: Vec<(String, Vec<u8>)>,
    body: Bytes,
}

/// State for the relay handler
#[derive(Debug)]
pub struct ProxyState {
    client: reqwest::Client,
    upstream: Url,
    store: Arc<LifecycleStore>,
}

impl ProxyState {
    pub fn new(upstream: Url, store: Arc<LifecycleStore>) -> Result<Self, RelayError> {
        // Redirects go back to the client as-is
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            upstream,
            store,
        })
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    pub fn store(&self) -> &Arc<LifecycleStore> {
        &self.store
    }

    /// Upstream scheme and authority with the inbound path and query
    pub fn target_url(&self, uri: &Uri) -> Url {
        let mut target = self.upstream.clone();
        target.set_path(uri.path());
        target.set_query(uri.query());
        target
    }

    async fn forward(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse, RelayError> {
        let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        let mut request = self.client.request(method, self.target_url(uri));
        for (name, value) in headers {
            if is_forwardable(name.as_str()) {
                request = request.header(name.as_str(), value.as_bytes());
            }
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| is_forwardable(name.as_str()))
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }

    /// Record the lifecycle events of a completed exchange.
    ///
    /// Returns the number of events recorded. Nothing here can fail the
    /// exchange: unusable input just records nothing.
    pub fn observe(&self, exchange: &Exchange, response_body: &[u8]) -> usize {
        let codec = exchange.encoding.codec();
        let response = String::from_utf8_lossy(response_body);
        let queue_url = exchange.queue_url.as_str();
        let queue = exchange.queue_name();

        match exchange.action {
            Action::SendMessage => {
                let Some(message_id) = codec.response_field(&response, "MessageId") else {
                    debug!(exchange = %exchange.id, "SendMessage response without MessageId");
                    return 0;
                };
                let body = codec
                    .request_field(&exchange.request, "MessageBody")
                    .unwrap_or_default();
                let attributes = codec.message_attributes(&exchange.request);

                self.store
                    .record_send(queue_url, queue, &message_id, &body, attributes);
                info!(message_id = %message_id, queue = %queue, "-> Sent message");
                1
            }
            Action::SendMessageBatch => {
                let ids = codec.batch_ids(&response, "Successful", "MessageId");
                for message_id in &ids {
                    self.store.record_send(
                        queue_url,
                        queue,
                        message_id,
                        BATCH_BODY_PLACEHOLDER,
                        Default::default(),
                    );
                    info!(message_id = %message_id, queue = %queue, "-> Sent batch message");
                }
                ids.len()
            }
            Action::ReceiveMessage => {
                let mut recorded = 0;
                for msg in codec.received_messages(&response) {
                    if msg.message_id.is_empty() {
                        debug!(exchange = %exchange.id, "Received message without MessageId");
                        continue;
                    }
                    self.store.record_receive(
                        queue_url,
                        queue,
                        &msg.message_id,
                        &msg.receipt_handle,
                        &msg.body,
                        msg.attributes,
                    );
                    info!(message_id = %msg.message_id, queue = %queue, "<- Received message");
                    recorded += 1;
                }
                recorded
            }
            Action::DeleteMessage => {
                let Some(receipt_handle) = codec.request_field(&exchange.request, "ReceiptHandle")
                else {
                    debug!(exchange = %exchange.id, "DeleteMessage request without ReceiptHandle");
                    return 0;
                };
                self.store.record_delete(queue_url, queue, &receipt_handle);
                info!(queue = %queue, "X Deleted message");
                1
            }
            Action::DeleteMessageBatch => {
                let handles = codec.batch_receipt_handles(&exchange.request);
                for receipt_handle in &handles {
                    self.store.record_delete(queue_url, queue, receipt_handle);
                    info!(queue = %queue, "X Deleted batch message");
                }
                handles.len()
            }
            Action::Other(_) | Action::Unknown => 0,
        }
    }
}

/// Relay one request upstream and record what it did
pub async fn handle_request(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let exchange = Exchange::capture(&uri, &headers, &body);
    let span = info_span!("exchange", id = %exchange.id);

    async move {
        info!(
            action = %exchange.action,
            encoding = %exchange.encoding,
            method = %method,
            queue_url = %exchange.queue_url,
            "Relaying request"
        );

        let upstream = match state.forward(&method, &uri, &headers, body).await {
            Ok(upstream) => upstream,
            Err(e) => {
                error!(error = %e, target = %state.target_url(&uri), "Upstream round trip failed");
                return StatusCode::BAD_GATEWAY.into_response();
            }
        };

        if (200..300).contains(&upstream.status) {
            let recorded = state.observe(&exchange, &upstream.body);
            debug!(recorded, "Observed exchange");
        } else {
            debug!(status = upstream.status, "Upstream error response, nothing recorded");
        }

        let mut response = Response::builder().status(upstream.status);
        for (name, value) in &upstream.headers {
            response = response.header(name.as_str(), value.as_slice());
        }
        response.body(Body::from(upstream.body)).unwrap_or_else(|e| {
            warn!(error = %e, "Upstream response could not be rebuilt");
            StatusCode::BAD_GATEWAY.into_response()
        })
    }
    .instrument(span)
    .await
}

/// Router relaying every path and method to the upstream endpoint
pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .fallback(handle_request)
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}
