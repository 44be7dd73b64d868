//! gclink core: transport-agnostic GC protocol primitives.
//!
//! This crate defines the wire-level contracts shared by the session engine
//! and by tooling: the message-type enumeration, the two GC framing variants
//! (struct and protobuf) layered inside the host transport's envelope, the
//! hand-rolled struct message bodies, and the protobuf message set with its
//! type registry. It intentionally carries no runtime dependencies so it can
//! be reused outside the engine.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `GcError`/`Result` so a malformed
//! frame from the coordinator can never crash the session.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod envelope;
pub mod error;
pub mod language;
pub mod proto;
pub mod structs;

/// Shared result type.
pub use error::{GcError, Result};
