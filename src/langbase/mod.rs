//! Langbase Pipes client.
//!
//! The chat and label collaborators both run as Langbase pipes; this module
//! holds the HTTP client and the request/response types they share.

mod client;
mod types;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use client::LangbaseClient;
pub use types::*;
