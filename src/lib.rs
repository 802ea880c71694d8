//! Dialback: decentralized identity confirmation over HTTP callbacks.
//!
//! A node issues single-use tokens on outbound requests ([`protocol::DialbackClient`]),
//! answers callback queries about them ([`protocol::Responder`]), and gates
//! its own resources by calling back to whoever claims an identity
//! ([`protocol::Verifier`]).

pub mod clock;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod protocol;
pub mod store;
