//! The tracking sync engine: reconciles shipment state with an unreliable
//! carrier API.
//!
//! Orchestration lives in [`engine::SyncEngine`]; the pieces it composes are
//! each independently testable — the [`adapter::CarrierAdapter`] boundary,
//! the [`ratelimit::RateLimiter`], the [`retry::RetryPolicy`], the carrier
//! event [`mapping`], and the shared [`ingest`] pipeline that webhook and
//! polled events both flow through. The [`conflict`] detector enriches the
//! audit trail when administrators and the carrier disagree.

// Native `async fn` in traits, as in shiptrack-core.
#![allow(async_fn_in_trait)]

pub mod adapter;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod http;
pub mod ingest;
pub mod mapping;
pub mod ratelimit;
pub mod retry;

pub use engine::{BatchReport, SyncConfig, SyncEngine, SyncReport};
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
