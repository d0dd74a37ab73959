//! Core types for aws-relay
//!
//! This crate provides the error type and exchange identifiers shared by the
//! relay's proxy, codec and binary crates.

pub mod error;
pub mod request_id;

pub use error::RelayError;
pub use request_id::ExchangeId;
