//! End-to-end session scenarios over a scripted host.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use prost::Message;
use tracing_subscriber::EnvFilter;

use gclink_core::envelope::{encode_proto, encode_struct, set_proto_bit};
use gclink_core::language::Language;
use gclink_core::proto::{
    EconItem, GameAccountClient, ProtoHeader, ClientWelcome, ServerGoodbye, SoCacheSubscribed,
    SoCacheSubscribedType, SoCacheSubscriptionCheck, SoSingleObject, SystemBroadcast,
};
use gclink_core::structs::CraftResponse;
use gclink_core::{GcError, Result};

use gclink_session::{GcEvent, GcSession, Host, InboundFrame, SessionConfig};

const APP: u32 = 440;
const ACCOUNT: u64 = 76_561_198_000_000_001;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

// -----------------------------------------------------------------------
// Scripted host
// -----------------------------------------------------------------------

#[derive(Default)]
struct MockHost {
    sent: Mutex<Vec<(u32, Bytes)>>,
    events: Mutex<Vec<GcEvent>>,
    inventory: Mutex<String>,
    presence: Mutex<Vec<Option<u32>>>,
}

impl MockHost {
    fn new(ids: &[u64]) -> Arc<Self> {
        let host = Arc::new(Self::default());
        host.set_inventory(ids);
        host
    }

    fn set_inventory(&self, ids: &[u64]) {
        let items: Vec<String> = ids
            .iter()
            .map(|id| format!(r#"{{"asset_id": {id}, "tradable": true}}"#))
            .collect();
        *self.inventory.lock().unwrap() = format!(
            r#"{{"items": [{}], "total_inventory_count": {}}}"#,
            items.join(","),
            ids.len()
        );
    }

    fn sent_types(&self) -> Vec<u32> {
        self.sent.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    fn events(&self) -> Vec<GcEvent> {
        self.events.lock().unwrap().clone()
    }

    fn event_names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.name()).collect()
    }

    fn count(&self, name: &str) -> usize {
        self.event_names().iter().filter(|n| **n == name).count()
    }

    fn presence_log(&self) -> Vec<Option<u32>> {
        self.presence.lock().unwrap().clone()
    }
}

#[async_trait]
impl Host for MockHost {
    async fn send_gc(&self, raw_type: u32, payload: Bytes) -> Result<()> {
        self.sent.lock().unwrap().push((raw_type, payload));
        Ok(())
    }

    fn dispatch(&self, event: GcEvent) {
        self.events.lock().unwrap().push(event);
    }

    async fn fetch_inventory(&self, app_id: u32) -> Result<Bytes> {
        if app_id != APP {
            return Err(GcError::Rest(format!("no inventory for app {app_id}")));
        }
        Ok(Bytes::from(self.inventory.lock().unwrap().clone()))
    }

    async fn change_presence(&self, app_id: Option<u32>) -> Result<()> {
        self.presence.lock().unwrap().push(app_id);
        Ok(())
    }

    async fn http_get(&self, _url: &str) -> Result<String> {
        Ok(r#""items_game" {}"#.to_string())
    }

    fn account_id(&self) -> u64 {
        ACCOUNT
    }
}

// -----------------------------------------------------------------------
// Wire helpers
// -----------------------------------------------------------------------

fn proto_frame<M: Message>(lang: Language, body: &M) -> InboundFrame {
    let (raw_type, payload) = encode_proto(lang, &ProtoHeader::default(), &body.encode_to_vec());
    InboundFrame {
        app_id: APP,
        raw_type,
        payload,
    }
}

fn struct_frame(lang: Language, body: &[u8]) -> InboundFrame {
    let (raw_type, payload) = encode_struct(lang, body);
    InboundFrame {
        app_id: APP,
        raw_type,
        payload,
    }
}

fn econ_item(id: u64, inventory: u32, def_index: u32) -> EconItem {
    EconItem {
        id,
        original_id: id,
        inventory,
        def_index,
        quality: 6,
        level: 5,
        quantity: 1,
        ..EconItem::default()
    }
}

fn subscription(items: &[EconItem], account: Option<&GameAccountClient>) -> SoCacheSubscribed {
    let mut objects = vec![SoCacheSubscribedType {
        type_id: 1,
        object_data: items.iter().map(|i| i.encode_to_vec()).collect(),
    }];
    if let Some(acct) = account {
        objects.push(SoCacheSubscribedType {
            type_id: 7,
            object_data: vec![acct.encode_to_vec()],
        });
    }
    SoCacheSubscribed {
        owner: ACCOUNT,
        objects,
        version: 1,
        ..SoCacheSubscribed::default()
    }
}

fn single_object(type_id: i32, data: Vec<u8>) -> SoSingleObject {
    SoSingleObject {
        owner: ACCOUNT,
        type_id,
        object_data: data,
        version: 2,
        ..SoSingleObject::default()
    }
}

fn account_meta(trial: bool, additional: u32) -> GameAccountClient {
    GameAccountClient {
        trial_account: trial,
        additional_backpack_slots: additional,
        ..GameAccountClient::default()
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

fn test_config() -> SessionConfig {
    SessionConfig {
        restart_timeout_ms: 2_000,
        item_wait_timeout_ms: 5_000,
        ..SessionConfig::default()
    }
}

fn session_with(host: &Arc<MockHost>) -> GcSession {
    init_tracing();
    let session = GcSession::new(test_config(), host.clone()).expect("valid config");
    session.mark_user_ready();
    session
}

/// Welcome + initial cache subscription: the usual path to a ready session.
async fn establish(session: &GcSession, items: &[EconItem]) {
    session
        .handle_frame(proto_frame(Language::ClientWelcome, &ClientWelcome::default()))
        .await;
    settle().await;
    session
        .handle_frame(proto_frame(
            Language::SoCacheSubscribed,
            &subscription(items, Some(&account_meta(false, 0))),
        ))
        .await;
    settle().await;
}

// -----------------------------------------------------------------------
// Scenarios
// -----------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn welcome_connects_exactly_once() {
    let host = MockHost::new(&[]);
    let session = session_with(&host);

    let welcome = proto_frame(Language::ClientWelcome, &ClientWelcome::default());
    session.handle_frame(welcome.clone()).await;
    session.handle_frame(welcome).await;
    settle().await;

    assert_eq!(host.count("gc_connect"), 1);
    assert!(session.is_connected());
}

#[tokio::test(start_paused = true)]
async fn goodbye_resets_the_session_and_ready_recomputes() {
    let host = MockHost::new(&[1]);
    let session = session_with(&host);

    establish(&session, &[econ_item(1, 3, 10)]).await;
    assert_eq!(host.count("gc_ready"), 1);

    session
        .handle_frame(proto_frame(
            Language::ServerGoodbye,
            &ServerGoodbye { reason: 1 },
        ))
        .await;
    settle().await;
    assert_eq!(host.count("gc_disconnect"), 1);
    assert!(!session.is_connected());
    assert!(!session.is_ready());

    // Reconnect: ready must fire again for the new session.
    establish(&session, &[econ_item(1, 3, 10)]).await;
    assert_eq!(host.count("gc_connect"), 2);
    assert_eq!(host.count("gc_ready"), 2);
}

#[tokio::test(start_paused = true)]
async fn repeated_subscription_is_idempotent() {
    let host = MockHost::new(&[1, 2]);
    let session = session_with(&host);

    let items = [econ_item(1, 1, 10), econ_item(2, 2, 11)];
    establish(&session, &items).await;

    session
        .handle_frame(proto_frame(
            Language::SoCacheSubscribed,
            &subscription(&items, None),
        ))
        .await;
    settle().await;

    assert_eq!(host.count("gc_ready"), 1);
    let bp = session.backpack().await.expect("backpack built");
    assert_eq!(bp.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn ready_is_never_signaled_before_connect() {
    let host = MockHost::new(&[1]);
    let session = session_with(&host);

    session
        .handle_frame(proto_frame(
            Language::SoCacheSubscribed,
            &subscription(&[econ_item(1, 1, 10)], None),
        ))
        .await;
    settle().await;
    assert_eq!(host.count("gc_ready"), 0);

    session
        .handle_frame(proto_frame(Language::ClientWelcome, &ClientWelcome::default()))
        .await;
    settle().await;
    session
        .handle_frame(proto_frame(
            Language::SoCacheSubscribed,
            &subscription(&[econ_item(1, 1, 10)], None),
        ))
        .await;
    settle().await;

    assert_eq!(host.event_names().first().copied(), Some("gc_connect"));
    assert_eq!(host.count("gc_ready"), 1);
}

#[tokio::test(start_paused = true)]
async fn snapshot_position_honors_the_new_item_bit() {
    let host = MockHost::new(&[1, 2]);
    let session = session_with(&host);

    establish(
        &session,
        &[econ_item(1, 0x4000_0005, 10), econ_item(2, 0x0000_0007, 11)],
    )
    .await;

    let bp = session.backpack().await.expect("backpack built");
    assert_eq!(bp.get(1).unwrap().position, 0);
    assert_eq!(bp.get(2).unwrap().position, 7);
}

#[tokio::test(start_paused = true)]
async fn account_update_fires_only_on_change() {
    let host = MockHost::new(&[]);
    let session = session_with(&host);

    establish(&session, &[]).await;
    assert_eq!(session.backpack_slots().await, Some(300));
    assert_eq!(session.is_premium().await, Some(true));
    // The initial snapshot is recorded without an event.
    assert_eq!(host.count("account_update"), 0);

    // Identical metadata repeats are routine and stay silent.
    session
        .handle_frame(proto_frame(
            Language::SoUpdate,
            &single_object(7, account_meta(false, 0).encode_to_vec()),
        ))
        .await;
    settle().await;
    assert_eq!(host.count("account_update"), 0);

    session
        .handle_frame(proto_frame(
            Language::SoUpdate,
            &single_object(7, account_meta(false, 100).encode_to_vec()),
        ))
        .await;
    settle().await;
    assert_eq!(host.count("account_update"), 1);
    assert_eq!(session.backpack_slots().await, Some(400));
}

#[tokio::test(start_paused = true)]
async fn item_update_carries_before_and_after() {
    let host = MockHost::new(&[1]);
    let session = session_with(&host);
    establish(&session, &[econ_item(1, 3, 10)]).await;

    session
        .handle_frame(proto_frame(
            Language::SoUpdate,
            &single_object(1, econ_item(1, 9, 10).encode_to_vec()),
        ))
        .await;
    settle().await;

    let update = host
        .events()
        .into_iter()
        .find_map(|e| match e {
            GcEvent::ItemUpdate { before, after } => Some((before, after)),
            _ => None,
        })
        .expect("item_update emitted");
    assert_eq!(update.0.expect("before snapshot").position, 3);
    assert_eq!(update.1.position, 9);
}

#[tokio::test(start_paused = true)]
async fn destroy_overlays_final_state_and_removes() {
    let host = MockHost::new(&[1, 2]);
    let session = session_with(&host);
    establish(&session, &[econ_item(1, 3, 10), econ_item(2, 4, 11)]).await;

    session
        .handle_frame(proto_frame(
            Language::SoDestroy,
            &single_object(1, econ_item(2, 4, 999).encode_to_vec()),
        ))
        .await;
    settle().await;

    assert_eq!(host.count("item_remove"), 1);
    let removed = host
        .events()
        .into_iter()
        .find_map(|e| match e {
            GcEvent::ItemRemove(item) => Some(item),
            _ => None,
        })
        .unwrap();
    assert_eq!(removed.def_index, 999);
    assert!(!session.backpack().await.unwrap().contains(2));
}

#[tokio::test(start_paused = true)]
async fn destroy_of_unknown_item_is_silent() {
    let host = MockHost::new(&[1]);
    let session = session_with(&host);
    establish(&session, &[econ_item(1, 3, 10)]).await;

    session
        .handle_frame(proto_frame(
            Language::SoDestroy,
            &single_object(1, econ_item(404, 0, 0).encode_to_vec()),
        ))
        .await;
    settle().await;

    assert_eq!(host.count("item_remove"), 0);
    assert_eq!(session.backpack().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn craft_resolves_despite_out_of_order_deltas() {
    let host = MockHost::new(&[1, 2]);
    let session = session_with(&host);
    establish(&session, &[econ_item(1, 1, 10), econ_item(2, 2, 10)]).await;

    let crafting = {
        let session = session.clone();
        tokio::spawn(async move { session.craft(&[1, 2], None).await })
    };
    settle().await;
    assert!(host.sent_types().contains(&Language::Craft.code()));

    // The response names the new ids before their creation deltas arrive.
    let response = CraftResponse {
        recipe_id: 0,
        id_list: vec![100, 101],
        being_used: false,
    };
    session
        .handle_frame(struct_frame(Language::CraftResponse, &response.to_bytes()))
        .await;
    settle().await;

    // The REST view catches up, then the deltas land.
    host.set_inventory(&[1, 2, 100, 101]);
    session
        .handle_frame(proto_frame(
            Language::SoCreate,
            &single_object(1, econ_item(100, 5, 20).encode_to_vec()),
        ))
        .await;
    session
        .handle_frame(proto_frame(
            Language::SoCreate,
            &single_object(1, econ_item(101, 6, 20).encode_to_vec()),
        ))
        .await;

    let produced = crafting
        .await
        .expect("craft task")
        .expect("send ok")
        .expect("craft produced items");
    let mut ids: Vec<u64> = produced.iter().map(|i| i.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![100, 101]);
    assert_eq!(host.count("crafting_complete"), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_craft_response_means_failure_without_leaks() {
    let host = MockHost::new(&[1]);
    let session = session_with(&host);
    establish(&session, &[econ_item(1, 1, 10)]).await;

    let crafting = {
        let session = session.clone();
        tokio::spawn(async move { session.craft(&[1], Some(3)).await })
    };
    settle().await;

    let response = CraftResponse {
        recipe_id: -1,
        id_list: vec![],
        being_used: false,
    };
    session
        .handle_frame(struct_frame(Language::CraftResponse, &response.to_bytes()))
        .await;

    let outcome = crafting.await.expect("craft task").expect("send ok");
    assert!(outcome.is_none());

    // A later stray response finds no waiter and produces nothing.
    session
        .handle_frame(struct_frame(
            Language::CraftResponse,
            &CraftResponse {
                recipe_id: -1,
                id_list: vec![],
                being_used: false,
            }
            .to_bytes(),
        ))
        .await;
    settle().await;
    assert_eq!(host.count("crafting_complete"), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_item_triggers_coalesced_session_restart() {
    let host = MockHost::new(&[1]);
    let session = session_with(&host);
    establish(&session, &[econ_item(1, 1, 10)]).await;

    // A delta for an item the REST view never reports.
    session
        .handle_frame(proto_frame(
            Language::SoCreate,
            &single_object(1, econ_item(999, 1, 20).encode_to_vec()),
        ))
        .await;
    settle().await;

    // Recovery dropped the session and is waiting for it to come back.
    assert_eq!(host.presence_log(), vec![None, Some(APP)]);
    assert!(!session.is_connected());

    session
        .handle_frame(proto_frame(Language::ClientWelcome, &ClientWelcome::default()))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Item is still unknown after the final refresh: skipped, no event.
    assert_eq!(host.count("item_receive"), 0);
    assert!(!session.backpack().await.unwrap().contains(999));
    // One restart, not one per recovery check.
    assert_eq!(host.presence_log().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn malformed_subscription_check_still_requests_refresh() {
    let host = MockHost::new(&[]);
    let session = session_with(&host);

    // Garbage payload: shorter than any framing header.
    session
        .handle_frame(InboundFrame {
            app_id: APP,
            raw_type: set_proto_bit(Language::SoCacheSubscriptionCheck.code()),
            payload: Bytes::from_static(&[1, 2, 3]),
        })
        .await;
    settle().await;

    let refresh_type = set_proto_bit(Language::SoCacheSubscriptionRefresh.code());
    assert_eq!(host.sent_types(), vec![refresh_type]);

    // The well-formed variant goes through the dispatch table to the same
    // handler.
    session
        .handle_frame(proto_frame(
            Language::SoCacheSubscriptionCheck,
            &SoCacheSubscriptionCheck {
                owner: ACCOUNT,
                version: 1,
                ..SoCacheSubscriptionCheck::default()
            },
        ))
        .await;
    settle().await;
    assert_eq!(host.sent_types(), vec![refresh_type, refresh_type]);
}

#[tokio::test(start_paused = true)]
async fn traffic_for_other_games_is_ignored() {
    let host = MockHost::new(&[]);
    let session = session_with(&host);

    let mut frame = proto_frame(Language::ClientWelcome, &ClientWelcome::default());
    frame.app_id = 570;
    session.handle_frame(frame).await;
    settle().await;

    assert!(host.events().is_empty());
    assert!(!session.is_connected());
}

#[tokio::test(start_paused = true)]
async fn unknown_message_types_are_dropped_quietly() {
    let host = MockHost::new(&[]);
    let session = session_with(&host);

    session
        .handle_frame(InboundFrame {
            app_id: APP,
            raw_type: 999_999,
            payload: Bytes::new(),
        })
        .await;
    settle().await;

    assert!(host.events().is_empty());
    assert!(host.sent_types().is_empty());
}

#[tokio::test(start_paused = true)]
async fn system_messages_reach_listeners() {
    let host = MockHost::new(&[]);
    let session = session_with(&host);

    session
        .handle_frame(proto_frame(
            Language::SystemMessage,
            &SystemBroadcast {
                message: "Trading is temporarily disabled".into(),
            },
        ))
        .await;
    settle().await;

    assert!(host.events().iter().any(|e| matches!(
        e,
        GcEvent::SystemMessage(m) if m == "Trading is temporarily disabled"
    )));
}
