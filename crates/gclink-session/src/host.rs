//! The seam to the host network client.
//!
//! Everything the engine needs from the surrounding client fits in one
//! trait: raw sends over the already-authenticated transport, event
//! fan-out to the host's listener registry, the REST inventory endpoint,
//! presence control (used only by restart recovery), and one authenticated
//! GET for the item schema document. The engine never touches sockets or
//! auth itself.

use async_trait::async_trait;
use bytes::Bytes;

use gclink_core::Result;

use crate::events::GcEvent;

#[async_trait]
pub trait Host: Send + Sync + 'static {
    /// Send one GC-wrapped envelope over the established transport session.
    /// `raw_type` carries the proto bit exactly as it must appear on the wire.
    async fn send_gc(&self, raw_type: u32, payload: Bytes) -> Result<()>;

    /// Deliver a domain event to registered listeners. Best-effort; the
    /// engine never waits on listeners.
    fn dispatch(&self, event: GcEvent);

    /// Fetch the raw REST-level inventory body for `app_id` under the local
    /// account identity.
    async fn fetch_inventory(&self, app_id: u32) -> Result<Bytes>;

    /// Advertise `app_id` as the currently played game; `None` clears it.
    /// Only the session-restart recovery path uses this.
    async fn change_presence(&self, app_id: Option<u32>) -> Result<()>;

    /// Authenticated GET. Used once per schema update announcement.
    async fn http_get(&self, url: &str) -> Result<String>;

    /// The local account's 64-bit id.
    fn account_id(&self) -> u64;
}
