//! gclink session engine.
//!
//! This crate wires the protocol primitives from `gclink-core` into a live
//! Game Coordinator session for one game: the connection state machine and
//! dispatch table, the shared object cache reconciler that keeps a local
//! backpack consistent with the coordinator, the crafting coordinator, and
//! the fire-and-forget item request surface. The host network client is
//! reached only through the [`host::Host`] trait.

pub mod backpack;
pub mod cache;
pub mod config;
pub mod craft;
pub mod events;
pub mod host;
pub mod item;
pub mod session;
pub mod sync;

pub use backpack::{AccountStanding, Backpack, InventorySnapshot, SnapshotItem};
pub use config::SessionConfig;
pub use events::GcEvent;
pub use host::Host;
pub use item::{Item, PositionSource};
pub use session::{GcSession, InboundFrame, InventoryView, Localization};
