//! The crafting coordinator.
//!
//! Craft responses correlate to requests only by FIFO order, so the session
//! allows one craft in flight at a time; a second `craft` call blocks until
//! the first resolves. The response itself and the item-creation deltas it
//! announces arrive as separate messages in no guaranteed order, so after a
//! successful response we poll the backpack for the produced ids instead of
//! trusting arrival order.

use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use gclink_core::language::Language;
use gclink_core::structs::{CraftRequest, CraftResponse, StructBody, RECIPE_WILDCARD};
use gclink_core::Result;

use crate::events::GcEvent;
use crate::item::Item;
use crate::session::{GcBody, GcMessage, GcSession};

pub(crate) struct CraftCoordinator {
    /// Serializes craft calls.
    flight: Mutex<()>,
    /// Take-once slot for the next craft response; consuming it marks the
    /// response used so it resolves at most one waiter.
    pending: Mutex<Option<oneshot::Sender<CraftResponse>>>,
}

impl CraftCoordinator {
    pub(crate) fn new() -> Self {
        Self {
            flight: Mutex::new(()),
            pending: Mutex::new(None),
        }
    }

    async fn register(&self) -> oneshot::Receiver<CraftResponse> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().await = Some(tx);
        rx
    }

    async fn clear(&self) {
        *self.pending.lock().await = None;
    }

    /// Hand an inbound response to the registered waiter, if any. Returns
    /// the response back when nobody was waiting for it.
    pub(crate) async fn resolve(&self, mut resp: CraftResponse) -> Option<CraftResponse> {
        match self.pending.lock().await.take() {
            Some(tx) => {
                resp.being_used = true;
                match tx.send(resp) {
                    Ok(()) => None,
                    // The waiter timed out between registering and now.
                    Err(resp) => Some(resp),
                }
            }
            None => Some(resp),
        }
    }
}

impl GcSession {
    /// Craft a set of items together with an optional recipe.
    ///
    /// Returns the produced items, or `None` when the coordinator rejects
    /// the combination, the response times out, or the produced items never
    /// land in the backpack. All of those are normal outcomes, not errors;
    /// `Err` is reserved for a failed outbound send.
    pub async fn craft(&self, item_ids: &[u64], recipe: Option<i16>) -> Result<Option<Vec<Item>>> {
        let _flight = self.inner.craft.flight.lock().await;

        let rx = self.inner.craft.register().await;
        let request = CraftRequest {
            recipe: recipe.unwrap_or(RECIPE_WILDCARD),
            items: item_ids.to_vec(),
        };
        if let Err(err) = self.send_struct(Language::Craft, &request.to_bytes()).await {
            self.inner.craft.clear().await;
            return Err(err);
        }

        let response =
            match tokio::time::timeout(self.inner.cfg.craft_response_timeout(), rx).await {
                Ok(Ok(resp)) => resp,
                Ok(Err(_)) => {
                    self.inner.craft.clear().await;
                    return Ok(None);
                }
                Err(_) => {
                    debug!("craft response timed out");
                    self.inner.craft.clear().await;
                    return Ok(None);
                }
            };

        if response.id_list.is_empty() {
            debug!(recipe = request.recipe, "craft rejected: incompatible items or recipe");
            return Ok(None);
        }

        match self.wait_for_items(&response.id_list).await {
            Some(items) => {
                self.emit(GcEvent::CraftingComplete(items.clone()));
                Ok(Some(items))
            }
            None => {
                debug!("crafted items never appeared in the backpack");
                Ok(None)
            }
        }
    }

    /// [`GcSession::craft`] over typed items.
    pub async fn craft_items(&self, items: &[Item], recipe: Option<i16>) -> Result<Option<Vec<Item>>> {
        let ids: Vec<u64> = items.iter().map(|i| i.id).collect();
        self.craft(&ids, recipe).await
    }

    pub(crate) async fn on_craft_response(self, msg: GcMessage) {
        let GcBody::Struct(StructBody::CraftResponse(resp)) = msg.body else {
            return;
        };
        debug!(
            recipe_id = resp.recipe_id,
            ids = resp.id_list.len(),
            "craft response received"
        );
        if let Some(resp) = self.inner.craft.resolve(resp).await {
            // No waiter registered — the craft was issued out-of-band.
            // Still surface the completion once the produced items land.
            if resp.id_list.is_empty() {
                return;
            }
            let session = self.clone();
            tokio::spawn(async move {
                if let Some(items) = session.wait_for_items(&resp.id_list).await {
                    session.emit(GcEvent::CraftingComplete(items));
                }
            });
        }
    }

    /// Poll until every id is present in the backpack, bounded by the
    /// configured wait timeout. `None` on timeout.
    pub(crate) async fn wait_for_items(&self, ids: &[u64]) -> Option<Vec<Item>> {
        let collect = async {
            loop {
                if let Some(items) = self.collect_items(ids).await {
                    return items;
                }
                tokio::time::sleep(self.inner.cfg.item_poll_interval()).await;
            }
        };
        tokio::time::timeout(self.inner.cfg.item_wait_timeout(), collect)
            .await
            .ok()
    }

    async fn collect_items(&self, ids: &[u64]) -> Option<Vec<Item>> {
        let guard = self.inner.backpack.read().await;
        let bp = guard.as_ref()?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(bp.get(*id)?.clone());
        }
        Some(out)
    }
}
