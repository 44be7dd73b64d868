//! Shared object cache reconciliation.
//!
//! The coordinator owns the item cache; we own a backpack built from the
//! REST inventory view and keep the two consistent by overlaying cache
//! deltas onto the existing item instances. The service has a known
//! inconsistency: a just-created item can be absent from the REST view
//! until the game session is cycled, so the merge path carries a bounded
//! recovery ladder — refresh, restart-and-refresh, then skip.

use prost::Message;
use tracing::{debug, error, info, warn};

use gclink_core::language::Language;
use gclink_core::proto::{
    self, EconItem, GameAccountClient, SoCacheSubscribed, SoSingleObject, SoMultipleObjects,
};
use gclink_core::Result;

use crate::backpack::{AccountStanding, Backpack, InventorySnapshot};
use crate::events::GcEvent;
use crate::item::{Item, PositionSource};
use crate::session::{GcBody, GcMessage, GcSession};

/// Cache object type id for backpack items.
pub(crate) const SO_TYPE_ITEM: i32 = 1;
/// Cache object type id for the account metadata blob.
pub(crate) const SO_TYPE_ACCOUNT: i32 = 7;

impl GcSession {
    // -----------------------------------------------------------------
    // Inbound cache handlers
    // -----------------------------------------------------------------

    pub(crate) async fn on_cache_subscribed(self, msg: GcMessage) {
        let GcBody::Raw(body) = msg.body else { return };
        let sub = match SoCacheSubscribed::decode(body.as_ref()) {
            Ok(sub) => sub,
            Err(err) => {
                error!(error = %err, "failed to decode cache subscription");
                return;
            }
        };

        for cache in &sub.objects {
            match cache.type_id {
                SO_TYPE_ITEM => {
                    let mut items = Vec::with_capacity(cache.object_data.len());
                    for data in &cache.object_data {
                        match EconItem::decode(data.as_slice()) {
                            Ok(item) => items.push(item),
                            Err(err) => {
                                error!(error = %err, "skipping undecodable cache item")
                            }
                        }
                    }
                    if let Err(err) = self
                        .merge_cache_items(&items, PositionSource::InitialSnapshot)
                        .await
                    {
                        error!(error = %err, "failed to merge subscribed items");
                    }
                }
                SO_TYPE_ACCOUNT => {
                    let Some(data) = cache.object_data.first() else {
                        continue;
                    };
                    match GameAccountClient::decode(data.as_slice()) {
                        Ok(acct) => self.reconcile_account(&acct, true).await,
                        Err(err) => error!(error = %err, "failed to decode account metadata"),
                    }
                }
                other => debug!(type_id = other, "unhandled cache object type in subscription"),
            }
        }

        // Ready fires once per established session: the edge-reporting flag
        // keeps a second subscription from re-announcing it.
        if self.inner.gc_connected.is_set() && self.inner.gc_ready.set() {
            self.emit(GcEvent::GcReady);
        }
    }

    /// Answer a subscription check with a refresh request for our own
    /// cache. Reached through the dispatch table when the payload decodes
    /// and through the malformed-payload short-circuit when it does not.
    pub(crate) async fn on_cache_check(self) {
        debug!("requesting cache subscription refresh");
        let refresh = proto::SoCacheSubscriptionRefresh {
            owner: self.inner.host.account_id(),
            owner_soid: None,
        };
        if let Err(err) = self
            .send_proto(Language::SoCacheSubscriptionRefresh, &refresh)
            .await
        {
            error!(error = %err, "failed to send cache subscription refresh");
        }
    }

    pub(crate) async fn on_so_create(self, msg: GcMessage) {
        let GcBody::Raw(body) = msg.body else { return };
        let single = match SoSingleObject::decode(body.as_ref()) {
            Ok(s) => s,
            Err(err) => {
                error!(error = %err, "failed to decode object create");
                return;
            }
        };
        if single.type_id != SO_TYPE_ITEM {
            return;
        }
        let item = match EconItem::decode(single.object_data.as_slice()) {
            Ok(item) => item,
            Err(err) => {
                error!(error = %err, "failed to decode created item");
                return;
            }
        };

        match self
            .merge_cache_items(std::slice::from_ref(&item), PositionSource::Delta)
            .await
        {
            Ok(merged) => {
                for item in merged {
                    self.emit(GcEvent::ItemReceive(item));
                }
            }
            Err(err) => error!(error = %err, "failed to merge created item"),
        }
    }

    pub(crate) async fn on_so_update(self, msg: GcMessage) {
        let GcBody::Raw(body) = msg.body else { return };
        let single = match SoSingleObject::decode(body.as_ref()) {
            Ok(s) => s,
            Err(err) => {
                error!(error = %err, "failed to decode object update");
                return;
            }
        };
        self.apply_so_delta(single.type_id, &single.object_data).await;
    }

    pub(crate) async fn on_so_update_multiple(self, msg: GcMessage) {
        let GcBody::Raw(body) = msg.body else { return };
        let batch = match SoMultipleObjects::decode(body.as_ref()) {
            Ok(b) => b,
            Err(err) => {
                error!(error = %err, "failed to decode object update batch");
                return;
            }
        };
        for entry in &batch.objects {
            self.apply_so_delta(entry.type_id, &entry.object_data).await;
        }
    }

    async fn apply_so_delta(&self, type_id: i32, object_data: &[u8]) {
        match type_id {
            SO_TYPE_ITEM => {
                let item = match EconItem::decode(object_data) {
                    Ok(item) => item,
                    Err(err) => {
                        error!(error = %err, "failed to decode updated item");
                        return;
                    }
                };
                // Snapshot before the destructive overlay so listeners get a
                // faithful before/after pair.
                let before = {
                    let guard = self.inner.backpack.read().await;
                    guard.as_ref().and_then(|bp| bp.get(item.id).cloned())
                };
                match self
                    .merge_cache_items(std::slice::from_ref(&item), PositionSource::Delta)
                    .await
                {
                    Ok(merged) => {
                        for after in merged {
                            self.emit(GcEvent::ItemUpdate {
                                before: before.clone(),
                                after,
                            });
                        }
                    }
                    Err(err) => error!(error = %err, "failed to merge updated item"),
                }
            }
            SO_TYPE_ACCOUNT => {
                match GameAccountClient::decode(object_data) {
                    Ok(acct) => self.reconcile_account(&acct, false).await,
                    Err(err) => error!(error = %err, "failed to decode account metadata"),
                }
            }
            other => debug!(type_id = other, "unhandled cache object type updated"),
        }
    }

    pub(crate) async fn on_so_destroy(self, msg: GcMessage) {
        let GcBody::Raw(body) = msg.body else { return };
        let single = match SoSingleObject::decode(body.as_ref()) {
            Ok(s) => s,
            Err(err) => {
                error!(error = %err, "failed to decode object destroy");
                return;
            }
        };
        if single.type_id != SO_TYPE_ITEM {
            return;
        }
        let deleted = match EconItem::decode(single.object_data.as_slice()) {
            Ok(item) => item,
            Err(err) => {
                error!(error = %err, "failed to decode destroyed item");
                return;
            }
        };

        let removed = {
            let mut guard = self.inner.backpack.write().await;
            match guard.as_mut() {
                Some(bp) => {
                    // Overlay the final known state so listeners inspecting
                    // the removed item see what the server last said.
                    if let Some(item) = bp.get_mut(deleted.id) {
                        item.apply_delta(&deleted, PositionSource::Delta);
                    }
                    let removed = bp.remove(deleted.id);
                    if removed.is_some() {
                        self.store_override(bp);
                    }
                    removed
                }
                None => None,
            }
        };

        match removed {
            Some(item) => self.emit(GcEvent::ItemRemove(item)),
            None => debug!(item_id = deleted.id, "destroy for an item we never merged; ignoring"),
        }
    }

    // -----------------------------------------------------------------
    // Merge + recovery
    // -----------------------------------------------------------------

    /// Merge incoming cache item blobs into the authoritative backpack,
    /// returning a clone of each item that was actually merged. Ids still
    /// missing after the recovery ladder are skipped, never surfaced.
    pub(crate) async fn merge_cache_items(
        &self,
        incoming: &[EconItem],
        source: PositionSource,
    ) -> Result<Vec<Item>> {
        self.inner.user_ready.wait().await;
        self.ensure_backpack().await?;

        let wanted: Vec<u64> = incoming.iter().map(|i| i.id).collect();
        if !self.backpack_contains_all(&wanted).await {
            match self.fetch_snapshot().await {
                Ok(snap) => self.refresh_backpack(&snap).await,
                Err(err) => warn!(error = %err, "inventory refresh failed during merge"),
            }
        }
        if !self.backpack_contains_all(&wanted).await {
            self.restart_game_session().await;
            match self.fetch_snapshot().await {
                Ok(snap) => self.refresh_backpack(&snap).await,
                Err(err) => warn!(error = %err, "inventory refresh failed after session restart"),
            }
        }

        let mut merged = Vec::with_capacity(incoming.len());
        let mut guard = self.inner.backpack.write().await;
        let Some(bp) = guard.as_mut() else {
            return Ok(merged);
        };
        for delta in incoming {
            match bp.get_mut(delta.id) {
                Some(item) => {
                    item.apply_delta(delta, source);
                    merged.push(item.clone());
                }
                None => debug!(item_id = delta.id, "item still missing after recovery; skipping"),
            }
        }
        self.store_override(bp);
        Ok(merged)
    }

    pub(crate) async fn reconcile_account(&self, acct: &GameAccountClient, initial: bool) {
        let standing = AccountStanding::from_wire(acct);
        let (first, changed) = {
            let mut slot = self.inner.account.write().await;
            let first = slot.is_none();
            let changed = slot.as_ref().map_or(true, |cur| *cur != standing);
            if changed {
                *slot = Some(standing);
            }
            (first, changed)
        };
        // The stream repeats identical metadata; only a real change is
        // worth announcing, and the very first snapshot is recorded quietly.
        if !changed || (initial && first) {
            return;
        }
        self.emit(GcEvent::AccountUpdate {
            backpack_slots: standing.backpack_slots,
            is_premium: standing.is_premium,
        });
    }

    async fn ensure_backpack(&self) -> Result<()> {
        if self.inner.backpack.read().await.is_some() {
            return Ok(());
        }
        let snap = self.fetch_snapshot().await?;
        let mut guard = self.inner.backpack.write().await;
        if guard.is_none() {
            let bp = Backpack::from_snapshot(&snap);
            self.store_override(&bp);
            *guard = Some(bp);
        }
        Ok(())
    }

    /// One REST fetch with a single backoff-and-retry on failure.
    pub(crate) async fn fetch_snapshot(&self) -> Result<InventorySnapshot> {
        match self.fetch_snapshot_once().await {
            Ok(snap) => Ok(snap),
            Err(err) => {
                warn!(error = %err, "inventory fetch failed; retrying once");
                tokio::time::sleep(self.inner.cfg.rest_retry_backoff()).await;
                self.fetch_snapshot_once().await
            }
        }
    }

    async fn fetch_snapshot_once(&self) -> Result<InventorySnapshot> {
        let body = self
            .inner
            .host
            .fetch_inventory(self.inner.cfg.app_id)
            .await?;
        InventorySnapshot::from_json(&body)
    }

    async fn refresh_backpack(&self, snap: &InventorySnapshot) {
        let mut guard = self.inner.backpack.write().await;
        match guard.as_mut() {
            Some(bp) => {
                bp.refresh_from(snap);
                self.store_override(bp);
            }
            None => {
                let bp = Backpack::from_snapshot(snap);
                self.store_override(&bp);
                *guard = Some(bp);
            }
        }
    }

    async fn backpack_contains_all(&self, ids: &[u64]) -> bool {
        self.inner
            .backpack
            .read()
            .await
            .as_ref()
            .is_some_and(|bp| bp.contains_all(ids))
    }

    pub(crate) fn store_override(&self, bp: &Backpack) {
        self.inner.overrides.insert(self.inner.cfg.app_id, bp.clone());
    }

    /// Cycle the logical game session. Concurrent callers coalesce onto one
    /// in-flight restart instead of each cycling the session themselves.
    pub(crate) async fn restart_game_session(&self) {
        let session = self.clone();
        self.inner
            .restart
            .run(|| async move {
                info!("cycling the game session to reconcile the item cache");
                if let Err(err) = session
                    .send_proto(Language::ClientGoodbye, &proto::ClientGoodbye::default())
                    .await
                {
                    warn!(error = %err, "goodbye send failed during restart");
                }
                session.inner.gc_connected.clear();
                session.inner.gc_ready.clear();
                if let Err(err) = session.inner.host.change_presence(None).await {
                    warn!(error = %err, "presence clear failed during restart");
                }
                if let Err(err) = session
                    .inner
                    .host
                    .change_presence(Some(session.inner.cfg.app_id))
                    .await
                {
                    warn!(error = %err, "presence restore failed during restart");
                }
                let wait = session.inner.gc_connected.wait();
                if tokio::time::timeout(session.inner.cfg.restart_timeout(), wait)
                    .await
                    .is_err()
                {
                    warn!("session did not re-establish within the restart window");
                }
            })
            .await;
    }
}
