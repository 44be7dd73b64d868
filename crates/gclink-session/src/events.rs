//! Domain events delivered through [`Host::dispatch`](crate::host::Host).

use gclink_core::language::GoodbyeReason;

use crate::item::Item;

/// A session-level or item-level happening worth telling listeners about.
///
/// Event delivery is best-effort and failure-silent: a dropped event is
/// always preferable to tearing down the session.
#[derive(Debug, Clone)]
pub enum GcEvent {
    /// The coordinator welcomed us; the logical session is established.
    GcConnect,
    /// The coordinator said goodbye; the logical session is gone (the
    /// transport itself stays up).
    GcDisconnect { reason: Option<GoodbyeReason> },
    /// The first full cache subscription of this session completed.
    GcReady,
    /// A new item landed in the backpack.
    ItemReceive(Item),
    /// An item left the backpack. Carries the item's last known state.
    ItemRemove(Item),
    /// An item changed. `before` is a snapshot taken before the update was
    /// applied; it is `None` when the item was never merged locally.
    ItemUpdate { before: Option<Item>, after: Item },
    /// A craft request produced these items.
    CraftingComplete(Vec<Item>),
    /// A service-wide broadcast from the coordinator.
    SystemMessage(String),
    /// A localized popup notification.
    DisplayNotification { title: String, body: String },
    /// Backpack capacity or premium standing changed.
    AccountUpdate { backpack_slots: u32, is_premium: bool },
}

impl GcEvent {
    /// The stable event name listeners register under.
    pub fn name(&self) -> &'static str {
        match self {
            GcEvent::GcConnect => "gc_connect",
            GcEvent::GcDisconnect { .. } => "gc_disconnect",
            GcEvent::GcReady => "gc_ready",
            GcEvent::ItemReceive(_) => "item_receive",
            GcEvent::ItemRemove(_) => "item_remove",
            GcEvent::ItemUpdate { .. } => "item_update",
            GcEvent::CraftingComplete(_) => "crafting_complete",
            GcEvent::SystemMessage(_) => "system_message",
            GcEvent::DisplayNotification { .. } => "display_notification",
            GcEvent::AccountUpdate { .. } => "account_update",
        }
    }
}
