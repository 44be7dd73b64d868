//! Top-level facade crate for gclink.
//!
//! Re-exports the protocol primitives and the session engine so users can
//! depend on a single crate.

pub mod core {
    pub use gclink_core::*;
}

pub mod session {
    pub use gclink_session::*;
}
