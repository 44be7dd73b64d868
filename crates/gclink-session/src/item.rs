//! The backpack item model and the cache-delta overlay.

use gclink_core::language::{ItemFlags, ItemQuality};
use gclink_core::proto::{EconItem, ItemAttribute, ItemEquipped};

use crate::backpack::SnapshotItem;

/// Bit 30 of the packed inventory field: item is new/unsorted.
pub const NEW_ITEM_BIT: u32 = 1 << 30;

/// Where a packed inventory value came from, which decides how position is
/// derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    /// Part of a full cache subscription: the new-item bit means "unsorted",
    /// i.e. position 0.
    InitialSnapshot,
    /// A single create/update delta: the packed low bits are taken as-is.
    Delta,
}

/// Derive an item's slot position from the packed inventory field.
///
/// Position is never transmitted directly: it is the low 16 bits of
/// `inventory`, except that a snapshot item flagged new has no position yet.
pub fn derive_position(inventory: u32, source: PositionSource) -> u16 {
    match source {
        PositionSource::InitialSnapshot if inventory & NEW_ITEM_BIT != 0 => 0,
        _ => (inventory & 0xFFFF) as u16,
    }
}

/// One backpack item: the union of what the cache deltas carry (definition,
/// quality, position, attributes, equip state) and what only the REST
/// inventory view knows (trade/market standing).
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: u64,
    pub original_id: u64,
    pub account_id: u32,
    /// Packed position field as transmitted; see [`derive_position`].
    pub inventory: u32,
    /// Derived, never transmitted.
    pub position: u16,
    pub def_index: u32,
    pub quantity: u32,
    pub level: u32,
    pub quality: ItemQuality,
    pub flags: ItemFlags,
    pub origin: u32,
    pub custom_name: String,
    pub custom_desc: String,
    pub attributes: Vec<ItemAttribute>,
    /// Contained item, e.g. the content of an unopened gift.
    pub interior_item: Option<Box<EconItem>>,
    pub in_use: bool,
    pub style: u32,
    pub contains_equipped_state: bool,
    pub equipped_state: Vec<ItemEquipped>,
    pub contains_equipped_state_v2: bool,

    // Economy fields sourced from the REST snapshot; cache deltas never
    // carry these, so the overlay leaves them alone.
    pub tradable: bool,
    pub marketable: bool,
    pub market_hash_name: String,
}

impl Item {
    /// Build a skeleton item from one REST snapshot entry. Cache fields
    /// arrive later via [`Item::apply_delta`].
    pub fn from_snapshot(s: &SnapshotItem) -> Self {
        Self {
            id: s.asset_id,
            original_id: s.asset_id,
            account_id: 0,
            inventory: 0,
            position: 0,
            def_index: s.def_index,
            quantity: 1,
            level: 0,
            quality: ItemQuality::Normal,
            flags: ItemFlags::empty(),
            origin: 0,
            custom_name: String::new(),
            custom_desc: String::new(),
            attributes: Vec::new(),
            interior_item: None,
            in_use: false,
            style: 0,
            contains_equipped_state: false,
            equipped_state: Vec::new(),
            contains_equipped_state_v2: false,
            tradable: s.tradable,
            marketable: s.marketable,
            market_hash_name: s.market_hash_name.clone(),
        }
    }

    /// Overlay one cache delta onto this item, field by field, in place.
    ///
    /// Callers hold references to the item and expect this exact instance
    /// to reflect the update, so this replaces fields rather than the item.
    /// Every merged field is listed here; add new cache fields to this list
    /// or they silently stop syncing.
    pub fn apply_delta(&mut self, delta: &EconItem, source: PositionSource) {
        self.id = delta.id;
        self.original_id = delta.original_id;
        self.account_id = delta.account_id;
        self.inventory = delta.inventory;
        self.def_index = delta.def_index;
        self.quantity = delta.quantity;
        self.level = delta.level;
        self.quality = ItemQuality::from_wire(delta.quality);
        self.flags = ItemFlags::from_bits_retain(delta.flags);
        self.origin = delta.origin;
        self.custom_name = delta.custom_name.clone();
        self.custom_desc = delta.custom_desc.clone();
        self.attributes = delta.attribute.clone();
        self.interior_item = delta.interior_item.clone();
        self.in_use = delta.in_use;
        self.style = delta.style;
        self.contains_equipped_state = delta.contains_equipped_state;
        self.equipped_state = delta.equipped_state.clone();
        self.contains_equipped_state_v2 = delta.contains_equipped_state_v2;

        self.position = derive_position(delta.inventory, source);
    }
}
