//! The GC session: connection state machine, dispatch table, and the
//! outbound request surface.
//!
//! One logical task feeds inbound frames through [`GcSession::handle_frame`]
//! in transport order. Each matched handler runs as its own task, so a
//! handler that suspends (REST refresh, waiting on a flag) does not stall
//! later traffic; nothing here assumes atomicity across a suspension point.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use prost::Message;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info};

use gclink_core::envelope::{self, clear_proto_bit};
use gclink_core::language::{BackpackSortType, GoodbyeReason, ItemSlot, Language, PlayerClass};
use gclink_core::proto::{self, ProtoBody, ProtoHeader};
use gclink_core::structs::{self, DeleteItem, DeliverGift, OpenCrate, SetItemStyle, StructBody, UnwrapItem, WrapItem};
use gclink_core::{GcError, Result};

use crate::backpack::{AccountStanding, Backpack, InventorySnapshot};
use crate::config::SessionConfig;
use crate::craft::CraftCoordinator;
use crate::events::GcEvent;
use crate::host::Host;
use crate::sync::{Flag, Singleflight};

/// One GC payload as forwarded by the host transport.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    /// The game the message is addressed to.
    pub app_id: u32,
    /// The outer type field, proto bit included.
    pub raw_type: u32,
    /// The headered GC payload.
    pub payload: Bytes,
}

/// A decoded message body, shaped by whichever registry knew the type.
#[derive(Debug, Clone)]
pub enum GcBody {
    Proto(ProtoBody),
    Struct(StructBody),
    /// No registered shape; cache framing messages decode their concrete
    /// type in their own handlers.
    Raw(Bytes),
}

/// What a handler receives: the logical type plus its decoded body.
#[derive(Debug, Clone)]
pub struct GcMessage {
    pub language: Language,
    pub body: GcBody,
}

type HandlerFn = fn(GcSession, GcMessage) -> BoxFuture<'static, ()>;

/// Key → localized string table, loaded by the caller from the game's
/// localization files. Keys may carry the conventional `#` prefix.
#[derive(Debug, Clone, Default)]
pub struct Localization {
    entries: HashMap<String, String>,
}

impl Localization {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Resolve a localization key, falling back to the bare key when the
    /// table has no entry for it.
    pub fn resolve(&self, key: &str) -> String {
        let bare = key.strip_prefix('#').unwrap_or(key);
        self.entries
            .get(bare)
            .cloned()
            .unwrap_or_else(|| bare.to_string())
    }
}

/// What [`GcSession::inventory`] yields: the cache-reconciled backpack for
/// the session's own game, the plain REST view for anything else.
#[derive(Debug, Clone)]
pub enum InventoryView {
    Reconciled(Backpack),
    Plain(InventorySnapshot),
}

pub(crate) struct SessionInner {
    pub(crate) cfg: SessionConfig,
    pub(crate) host: Arc<dyn Host>,
    handlers: HashMap<Language, HandlerFn>,

    /// The GC welcomed us and has not said goodbye since.
    pub(crate) gc_connected: Flag,
    /// The first full cache subscription of this session completed.
    pub(crate) gc_ready: Flag,
    /// The host finished logging in; user-scoped data may be fetched.
    pub(crate) user_ready: Flag,

    pub(crate) backpack: RwLock<Option<Backpack>>,
    pub(crate) account: RwLock<Option<AccountStanding>>,
    pub(crate) schema: RwLock<Option<Arc<str>>>,
    pub(crate) localization: RwLock<Option<Arc<Localization>>>,
    /// Inventory override table: app id → the richer reconciled view.
    pub(crate) overrides: DashMap<u32, Backpack>,

    pub(crate) craft: CraftCoordinator,
    pub(crate) restart: Singleflight,
}

/// A live GC session for one game. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct GcSession {
    pub(crate) inner: Arc<SessionInner>,
}

impl GcSession {
    pub fn new(cfg: SessionConfig, host: Arc<dyn Host>) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            inner: Arc::new(SessionInner {
                cfg,
                host,
                handlers: handler_table(),
                gc_connected: Flag::new(),
                gc_ready: Flag::new(),
                user_ready: Flag::new(),
                backpack: RwLock::new(None),
                account: RwLock::new(None),
                schema: RwLock::new(None),
                localization: RwLock::new(None),
                overrides: DashMap::new(),
                craft: CraftCoordinator::new(),
                restart: Singleflight::new(),
            }),
        })
    }

    /// Drive the session from a channel of forwarded frames until the
    /// sender side closes.
    pub async fn run(self, mut rx: mpsc::Receiver<InboundFrame>) {
        while let Some(frame) = rx.recv().await {
            self.handle_frame(frame).await;
        }
    }

    /// Feed one forwarded GC payload into the engine.
    pub async fn handle_frame(&self, frame: InboundFrame) {
        if frame.app_id != self.inner.cfg.app_id {
            // Addressed to another game; not even log-worthy.
            return;
        }

        let gc = match envelope::decode_frame(frame.raw_type, frame.payload.clone()) {
            Ok(gc) => gc,
            Err(GcError::UnknownType(code)) => {
                info!(raw_type = frame.raw_type, code, "ignoring unknown message type");
                return;
            }
            Err(err) => return self.on_undecodable(frame.raw_type, &frame.payload, err).await,
        };
        debug!(language = ?gc.language, proto = gc.proto, len = gc.body.len(), "gc message received");

        let body = if gc.proto {
            match proto::decode_body(gc.language, &gc.body) {
                Some(Ok(body)) => GcBody::Proto(body),
                Some(Err(err)) => {
                    return self.on_undecodable(frame.raw_type, &frame.payload, err).await
                }
                None => GcBody::Raw(gc.body),
            }
        } else {
            match structs::decode_body(gc.language, gc.body.clone()) {
                Some(Ok(body)) => GcBody::Struct(body),
                Some(Err(err)) => {
                    return self.on_undecodable(frame.raw_type, &frame.payload, err).await
                }
                None => GcBody::Raw(gc.body),
            }
        };

        let Some(handler) = self.inner.handlers.get(&gc.language) else {
            debug!(language = ?gc.language, "no handler registered; dropping");
            return;
        };
        let msg = GcMessage {
            language: gc.language,
            body,
        };
        tokio::spawn(handler(self.clone(), msg));
    }

    /// Central decode-failure policy: one message type is known to arrive
    /// malformed and short-circuits to its parameterless handler; anything
    /// else is logged with the raw payload and dropped.
    async fn on_undecodable(&self, raw_type: u32, payload: &Bytes, err: GcError) {
        let language = Language::try_from(clear_proto_bit(raw_type)).ok();
        if language == Some(Language::SoCacheSubscriptionCheck) {
            return self.clone().on_cache_check().await;
        }
        error!(
            ?language,
            error = %err,
            payload = ?payload.as_ref(),
            "failed to deserialize message"
        );
    }

    pub(crate) fn emit(&self, event: GcEvent) {
        debug!(event = event.name(), "dispatching event");
        self.inner.host.dispatch(event);
    }

    // -----------------------------------------------------------------
    // Outbound plumbing
    // -----------------------------------------------------------------

    pub(crate) async fn send_struct(&self, language: Language, body: &[u8]) -> Result<()> {
        let (raw_type, payload) = envelope::encode_struct(language, body);
        self.inner.host.send_gc(raw_type, payload).await
    }

    pub(crate) async fn send_proto<M: Message>(&self, language: Language, body: &M) -> Result<()> {
        let header = ProtoHeader {
            client_steam_id: self.inner.host.account_id(),
            source_app_id: self.inner.cfg.app_id,
            ..ProtoHeader::default()
        };
        let (raw_type, payload) = envelope::encode_proto(language, &header, &body.encode_to_vec());
        self.inner.host.send_gc(raw_type, payload).await
    }

    // -----------------------------------------------------------------
    // Session lifecycle handlers
    // -----------------------------------------------------------------

    pub(crate) async fn on_welcome(self, _msg: GcMessage) {
        if self.inner.gc_connected.set() {
            self.emit(GcEvent::GcConnect);
        }
    }

    pub(crate) async fn on_goodbye(self, msg: GcMessage) {
        let reason = match &msg.body {
            GcBody::Proto(ProtoBody::ClientGoodbye(g)) => GoodbyeReason::from_wire(g.reason),
            GcBody::Proto(ProtoBody::ServerGoodbye(g)) => GoodbyeReason::from_wire(g.reason),
            _ => None,
        };
        self.inner.gc_connected.clear();
        self.inner.gc_ready.clear();
        self.emit(GcEvent::GcDisconnect { reason });
    }

    pub(crate) async fn on_system_message(self, msg: GcMessage) {
        let GcBody::Proto(ProtoBody::SystemBroadcast(b)) = msg.body else {
            return;
        };
        self.emit(GcEvent::SystemMessage(b.message));
    }

    pub(crate) async fn on_display_notification(self, msg: GcMessage) {
        let GcBody::Proto(ProtoBody::DisplayNotification(n)) = msg.body else {
            return;
        };
        let Some(loc) = self.inner.localization.read().await.clone() else {
            debug!("display notification dropped: no localization table loaded");
            return;
        };

        let title = loc.resolve(&n.notification_title_localization_key);
        let mut body = strip_control_markers(&loc.resolve(&n.notification_body_localization_key));
        for (key, value) in n.body_substring_keys.iter().zip(&n.body_substring_values) {
            let replacement = if value.starts_with('#') {
                loc.resolve(value)
            } else {
                value.clone()
            };
            body = body.replace(&format!("%{key}%"), &replacement);
        }
        self.emit(GcEvent::DisplayNotification { title, body });
    }

    pub(crate) async fn on_update_item_schema(self, msg: GcMessage) {
        let GcBody::Proto(ProtoBody::UpdateItemSchema(update)) = msg.body else {
            return;
        };
        info!(url = %update.items_game_url, version = update.item_schema_version, "fetching item schema");
        match self.inner.host.http_get(&update.items_game_url).await {
            Ok(text) => {
                *self.inner.schema.write().await = Some(Arc::from(text));
                info!("item schema loaded");
            }
            Err(err) => error!(error = %err, "failed to fetch item schema"),
        }
    }

    // -----------------------------------------------------------------
    // Fire-and-forget requests
    // -----------------------------------------------------------------

    /// Announce ourselves to the coordinator. The host should call this on
    /// an interval until the welcome arrives.
    pub async fn say_hello(&self) -> Result<()> {
        self.send_proto(Language::ClientHello, &proto::ClientHello::default())
            .await
    }

    /// Say goodbye and drop the advertised game, ending the logical session.
    pub async fn close(&self) -> Result<()> {
        self.send_proto(Language::ClientGoodbye, &proto::ClientGoodbye::default())
            .await?;
        self.inner.host.change_presence(None).await
    }

    /// Use a consumable item.
    pub async fn use_item(&self, item_id: u64) -> Result<()> {
        self.send_proto(Language::UseItemRequest, &proto::UseItem { item_id })
            .await
    }

    /// Equip an item on a class in a slot.
    pub async fn equip(&self, item_id: u64, class: PlayerClass, slot: ItemSlot) -> Result<()> {
        self.send_proto(
            Language::AdjustItemEquippedState,
            &proto::AdjustItemEquippedState {
                item_id,
                new_class: class as u32,
                new_slot: slot as u32,
            },
        )
        .await
    }

    /// Move one item to a backpack position.
    pub async fn set_position(&self, item_id: u64, position: u32) -> Result<()> {
        self.set_positions(&[(item_id, position)]).await
    }

    /// Move several items at once.
    pub async fn set_positions(&self, pairs: &[(u64, u32)]) -> Result<()> {
        let item_positions = pairs
            .iter()
            .map(|(item_id, position)| proto::SetItemPosition {
                item_id: *item_id,
                position: *position,
            })
            .collect();
        self.send_proto(
            Language::SetItemPositions,
            &proto::SetItemPositions { item_positions },
        )
        .await
    }

    /// Ask the coordinator to sort the backpack.
    pub async fn sort(&self, order: BackpackSortType) -> Result<()> {
        self.send_proto(
            Language::SortItems,
            &proto::SortItems {
                sort_type: order as u32,
            },
        )
        .await
    }

    /// Permanently delete an item.
    pub async fn delete(&self, item_id: u64) -> Result<()> {
        self.send_struct(Language::Delete, &DeleteItem { item_id }.to_bytes())
            .await
    }

    /// Open a crate with a key.
    pub async fn open_crate(&self, crate_id: u64, key_id: u64) -> Result<()> {
        self.send_struct(
            Language::UnlockCrate,
            &OpenCrate { key_id, crate_id }.to_bytes(),
        )
        .await
    }

    /// Wrap an item into a gift.
    pub async fn wrap(&self, item_id: u64, wrapping_paper_id: u64) -> Result<()> {
        self.send_struct(
            Language::GiftWrapItem,
            &WrapItem {
                wrapping_paper_id,
                item_id,
            }
            .to_bytes(),
        )
        .await
    }

    /// Unwrap a gift.
    pub async fn unwrap(&self, gift_id: u64) -> Result<()> {
        self.send_struct(
            Language::UnwrapGiftRequest,
            &UnwrapItem { gift_id }.to_bytes(),
        )
        .await
    }

    /// Send a wrapped gift to another account.
    pub async fn send_to(&self, gift_id: u64, user_id64: u64) -> Result<()> {
        self.send_struct(
            Language::DeliverGift,
            &DeliverGift { user_id64, gift_id }.to_bytes(),
        )
        .await
    }

    /// Switch an item to one of its alternate styles.
    pub async fn set_style(&self, item_id: u64, style: u32) -> Result<()> {
        self.send_struct(
            Language::SetItemStyle,
            &SetItemStyle { item_id, style }.to_bytes(),
        )
        .await
    }

    // -----------------------------------------------------------------
    // State accessors
    // -----------------------------------------------------------------

    pub fn is_connected(&self) -> bool {
        self.inner.gc_connected.is_set()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.gc_ready.is_set()
    }

    pub async fn wait_until_connected(&self) {
        self.inner.gc_connected.wait().await
    }

    pub async fn wait_until_ready(&self) {
        self.inner.gc_ready.wait().await
    }

    /// Tell the engine the host finished logging in. Cache reconciliation
    /// holds off user-scoped fetches until this is called.
    pub fn mark_user_ready(&self) {
        self.inner.user_ready.set();
    }

    /// A clone of the current backpack, when one has been built.
    pub async fn backpack(&self) -> Option<Backpack> {
        self.inner.backpack.read().await.clone()
    }

    /// Current backpack capacity, once account metadata has arrived.
    pub async fn backpack_slots(&self) -> Option<u32> {
        self.inner.account.read().await.as_ref().map(|a| a.backpack_slots)
    }

    /// Whether the account is premium, once account metadata has arrived.
    pub async fn is_premium(&self) -> Option<bool> {
        self.inner.account.read().await.as_ref().map(|a| a.is_premium)
    }

    /// The item schema document, once announced and fetched.
    pub async fn schema(&self) -> Option<Arc<str>> {
        self.inner.schema.read().await.clone()
    }

    /// Install the localization table used by display notifications.
    pub async fn set_localization(&self, loc: Localization) {
        *self.inner.localization.write().await = Some(Arc::new(loc));
    }

    /// Inventory for any game: the cache-reconciled backpack when we have
    /// one for `app_id`, otherwise the host's plain REST view.
    pub async fn inventory(&self, app_id: u32) -> Result<InventoryView> {
        if let Some(bp) = self.inner.overrides.get(&app_id) {
            return Ok(InventoryView::Reconciled(bp.value().clone()));
        }
        let body = self.inner.host.fetch_inventory(app_id).await?;
        Ok(InventoryView::Plain(InventorySnapshot::from_json(&body)?))
    }
}

fn strip_control_markers(s: &str) -> String {
    s.chars().filter(|c| *c != '\u{1}' && *c != '\u{2}').collect()
}

/// The dispatch table: logical type → handler, built once per session.
fn handler_table() -> HashMap<Language, HandlerFn> {
    let mut t: HashMap<Language, HandlerFn> = HashMap::new();
    t.insert(Language::ClientWelcome, |s, m| Box::pin(s.on_welcome(m)));
    t.insert(Language::ServerWelcome, |s, m| Box::pin(s.on_welcome(m)));
    t.insert(Language::ClientGoodbye, |s, m| Box::pin(s.on_goodbye(m)));
    t.insert(Language::ServerGoodbye, |s, m| Box::pin(s.on_goodbye(m)));
    t.insert(Language::SystemMessage, |s, m| {
        Box::pin(s.on_system_message(m))
    });
    t.insert(Language::ClientDisplayNotification, |s, m| {
        Box::pin(s.on_display_notification(m))
    });
    t.insert(Language::UpdateItemSchema, |s, m| {
        Box::pin(s.on_update_item_schema(m))
    });
    t.insert(Language::CraftResponse, |s, m| {
        Box::pin(s.on_craft_response(m))
    });
    t.insert(Language::SoCacheSubscriptionCheck, |s, _m| {
        Box::pin(s.on_cache_check())
    });
    t.insert(Language::SoCacheSubscribed, |s, m| {
        Box::pin(s.on_cache_subscribed(m))
    });
    t.insert(Language::SoCreate, |s, m| Box::pin(s.on_so_create(m)));
    t.insert(Language::SoUpdate, |s, m| Box::pin(s.on_so_update(m)));
    t.insert(Language::SoUpdateMultiple, |s, m| {
        Box::pin(s.on_so_update_multiple(m))
    });
    t.insert(Language::SoDestroy, |s, m| Box::pin(s.on_so_destroy(m)));
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localization_resolves_hash_keys() {
        let loc = Localization::new(
            [("TF_Weapon".to_string(), "Rocket Launcher".to_string())].into(),
        );
        assert_eq!(loc.resolve("#TF_Weapon"), "Rocket Launcher");
        assert_eq!(loc.resolve("TF_Weapon"), "Rocket Launcher");
        assert_eq!(loc.resolve("#TF_Missing"), "TF_Missing");
    }

    #[test]
    fn control_markers_are_stripped() {
        assert_eq!(strip_control_markers("\u{1}New\u{2} item"), "New item");
    }

    #[test]
    fn every_handled_language_is_in_the_table() {
        let t = handler_table();
        for lang in [
            Language::ClientWelcome,
            Language::ServerWelcome,
            Language::ClientGoodbye,
            Language::ServerGoodbye,
            Language::SystemMessage,
            Language::ClientDisplayNotification,
            Language::UpdateItemSchema,
            Language::CraftResponse,
            Language::SoCacheSubscriptionCheck,
            Language::SoCacheSubscribed,
            Language::SoCreate,
            Language::SoUpdate,
            Language::SoUpdateMultiple,
            Language::SoDestroy,
        ] {
            assert!(t.contains_key(&lang), "{lang:?} missing from table");
        }
        assert!(!t.contains_key(&Language::PingRequest));
    }
}
