//! Core types and trait definitions for the autoscaler event store.
//!
//! This crate is deliberately free of database dependencies. Storage
//! backends implement [`store::EventStore`]; the retention cycle in
//! [`retention`] is written against that trait only.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod error;
pub mod event;
pub mod retention;
pub mod store;

pub use error::{Error, Result};
