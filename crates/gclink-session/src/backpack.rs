//! The reconciled backpack view and account standing maths.

use serde::Deserialize;

use gclink_core::proto::GameAccountClient;
use gclink_core::{GcError, Result};

use crate::item::Item;

/// Base capacity for trial accounts.
pub const TRIAL_BASE_SLOTS: u32 = 50;
/// Base capacity for full accounts.
pub const PREMIUM_BASE_SLOTS: u32 = 300;

/// Total backpack capacity for an account.
pub fn backpack_slots(trial_account: bool, additional_slots: u32) -> u32 {
    let base = if trial_account {
        TRIAL_BASE_SLOTS
    } else {
        PREMIUM_BASE_SLOTS
    };
    base + additional_slots
}

/// Account-level standing derived from the cache's metadata object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountStanding {
    pub backpack_slots: u32,
    pub is_premium: bool,
}

impl AccountStanding {
    pub fn from_wire(acct: &GameAccountClient) -> Self {
        Self {
            backpack_slots: backpack_slots(acct.trial_account, acct.additional_backpack_slots),
            is_premium: !acct.trial_account,
        }
    }
}

/// One entry of the REST-level inventory view. The REST side knows the
/// trade/market standing the cache deltas never carry.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotItem {
    pub asset_id: u64,
    #[serde(default)]
    pub def_index: u32,
    #[serde(default)]
    pub tradable: bool,
    #[serde(default)]
    pub marketable: bool,
    #[serde(default)]
    pub market_hash_name: String,
}

/// The REST-level inventory snapshot, parsed from the raw response body.
#[derive(Debug, Clone, Deserialize)]
pub struct InventorySnapshot {
    pub items: Vec<SnapshotItem>,
    #[serde(default)]
    pub total_inventory_count: u32,
}

impl InventorySnapshot {
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| GcError::Rest(format!("invalid inventory body: {e}")))
    }
}

/// The authoritative local item collection for one session.
///
/// Exactly one backpack instance is authoritative at a time; it is built
/// from a REST snapshot and kept consistent by overlaying cache deltas onto
/// the existing item instances (never by swapping them out).
#[derive(Debug, Clone, Default)]
pub struct Backpack {
    items: Vec<Item>,
}

impl Backpack {
    pub fn from_snapshot(snap: &InventorySnapshot) -> Self {
        Self {
            items: snap.items.iter().map(Item::from_snapshot).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    pub fn get(&self, id: u64) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.get(id).is_some()
    }

    pub fn contains_all(&self, ids: &[u64]) -> bool {
        ids.iter().all(|id| self.contains(*id))
    }

    /// Remove an item by id, returning its last state.
    pub fn remove(&mut self, id: u64) -> Option<Item> {
        let at = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(at))
    }

    /// Fold a fresh REST snapshot in: new ids are appended, existing items
    /// get their economy fields updated in place. Items the snapshot no
    /// longer lists are left alone — removal is the destroy delta's job.
    pub fn refresh_from(&mut self, snap: &InventorySnapshot) {
        for s in &snap.items {
            match self.get_mut(s.asset_id) {
                Some(item) => {
                    item.tradable = s.tradable;
                    item.marketable = s.marketable;
                    item.market_hash_name = s.market_hash_name.clone();
                }
                None => self.items.push(Item::from_snapshot(s)),
            }
        }
    }
}
