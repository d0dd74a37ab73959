//! SQS observation for aws-relay
//!
//! Relays SQS traffic to an upstream endpoint and records what it sees:
//! - SendMessage, SendMessageBatch
//! - ReceiveMessage
//! - DeleteMessage, DeleteMessageBatch
//!
//! Both the JSON and the query (form + XML) protocols are understood.

pub mod codec;
pub mod handlers;
mod storage;


pub use handlers::{handle_request, parse_upstream, router, Exchange, ProxyState};
pub use storage::{LifecycleStore, Message, MessageAction, QueueStats};
