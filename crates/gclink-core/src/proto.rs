//! Protobuf-bodied GC messages (hand-defined to match the coordinator's
//! externally-published schema) and the body-shape registry.
//!
//! The schema is owned by the remote service; these structs mirror its
//! field numbers exactly. Messages that frame the shared object cache
//! (`So*`) are deliberately not part of [`decode_body`]: the dispatcher
//! routes those to the cache sub-handlers, which decode the concrete type
//! themselves.

use prost::Message;

use crate::error::{GcError, Result};
use crate::language::Language;

/// The protobuf extension header embedded in proto-framed GC envelopes.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoHeader {
    #[prost(fixed64, tag = "1")]
    pub client_steam_id: u64,
    #[prost(int32, tag = "2")]
    pub client_session_id: i32,
    #[prost(uint32, tag = "3")]
    pub source_app_id: u32,
    #[prost(fixed64, tag = "10")]
    pub job_id_source: u64,
    #[prost(fixed64, tag = "11")]
    pub job_id_target: u64,
    #[prost(string, tag = "12")]
    pub target_job_name: String,
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct ClientHello {
    #[prost(uint32, tag = "1")]
    pub version: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ServerHello {
    #[prost(uint32, tag = "1")]
    pub version: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClientWelcome {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub game_data: Vec<u8>,
    #[prost(string, tag = "3")]
    pub txn_country_code: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ServerWelcome {
    #[prost(uint32, tag = "1")]
    pub min_allowed_version: u32,
    #[prost(uint32, tag = "2")]
    pub active_version: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClientGoodbye {
    #[prost(int64, tag = "1")]
    pub reason: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ServerGoodbye {
    #[prost(int64, tag = "1")]
    pub reason: i64,
}

// ---------------------------------------------------------------------------
// Broadcasts / notifications
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct SystemBroadcast {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct DisplayNotification {
    #[prost(string, tag = "1")]
    pub notification_title_localization_key: String,
    #[prost(string, tag = "2")]
    pub notification_body_localization_key: String,
    #[prost(string, repeated, tag = "3")]
    pub body_substring_keys: Vec<String>,
    #[prost(string, repeated, tag = "4")]
    pub body_substring_values: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct UpdateItemSchema {
    #[prost(uint32, tag = "1")]
    pub item_schema_version: u32,
    #[prost(string, tag = "2")]
    pub items_game_url: String,
}

// ---------------------------------------------------------------------------
// Shared object cache framing
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct SoIdOwner {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(uint64, tag = "2")]
    pub id: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct SoSingleObject {
    #[prost(fixed64, tag = "1")]
    pub owner: u64,
    #[prost(int32, tag = "2")]
    pub type_id: i32,
    #[prost(bytes = "vec", tag = "3")]
    pub object_data: Vec<u8>,
    #[prost(fixed64, tag = "4")]
    pub version: u64,
    #[prost(message, optional, tag = "5")]
    pub owner_soid: Option<SoIdOwner>,
    #[prost(uint32, tag = "6")]
    pub service_id: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SoMultipleObjectsEntry {
    #[prost(int32, tag = "1")]
    pub type_id: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub object_data: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SoMultipleObjects {
    #[prost(fixed64, tag = "1")]
    pub owner: u64,
    #[prost(message, repeated, tag = "2")]
    pub objects: Vec<SoMultipleObjectsEntry>,
    #[prost(fixed64, tag = "3")]
    pub version: u64,
    #[prost(message, optional, tag = "6")]
    pub owner_soid: Option<SoIdOwner>,
    #[prost(uint32, tag = "7")]
    pub service_id: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SoCacheSubscribedType {
    #[prost(int32, tag = "1")]
    pub type_id: i32,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub object_data: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SoCacheSubscribed {
    #[prost(fixed64, tag = "1")]
    pub owner: u64,
    #[prost(message, repeated, tag = "2")]
    pub objects: Vec<SoCacheSubscribedType>,
    #[prost(fixed64, tag = "3")]
    pub version: u64,
    #[prost(message, optional, tag = "4")]
    pub owner_soid: Option<SoIdOwner>,
    #[prost(uint32, tag = "5")]
    pub service_id: u32,
    #[prost(uint32, repeated, tag = "6")]
    pub service_list: Vec<u32>,
    #[prost(fixed64, tag = "7")]
    pub sync_version: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct SoCacheSubscribedUpToDate {
    #[prost(fixed64, tag = "1")]
    pub version: u64,
    #[prost(message, optional, tag = "2")]
    pub owner_soid: Option<SoIdOwner>,
    #[prost(uint32, tag = "3")]
    pub service_id: u32,
    #[prost(uint32, repeated, tag = "4")]
    pub service_list: Vec<u32>,
    #[prost(fixed64, tag = "5")]
    pub sync_version: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct SoCacheUnsubscribed {
    #[prost(fixed64, tag = "1")]
    pub owner: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct SoCacheSubscriptionCheck {
    #[prost(fixed64, tag = "1")]
    pub owner: u64,
    #[prost(fixed64, tag = "2")]
    pub version: u64,
    #[prost(message, optional, tag = "3")]
    pub owner_soid: Option<SoIdOwner>,
    #[prost(uint32, tag = "4")]
    pub service_id: u32,
    #[prost(uint32, repeated, tag = "5")]
    pub service_list: Vec<u32>,
    #[prost(fixed64, tag = "6")]
    pub sync_version: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct SoCacheSubscriptionRefresh {
    #[prost(fixed64, tag = "1")]
    pub owner: u64,
    #[prost(message, optional, tag = "2")]
    pub owner_soid: Option<SoIdOwner>,
}

// ---------------------------------------------------------------------------
// Cache object payloads
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct ItemAttribute {
    #[prost(uint32, tag = "1")]
    pub def_index: u32,
    #[prost(uint32, tag = "2")]
    pub value: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub value_bytes: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ItemEquipped {
    #[prost(uint32, tag = "1")]
    pub new_class: u32,
    #[prost(uint32, tag = "2")]
    pub new_slot: u32,
}

/// One backpack item as the cache transmits it.
#[derive(Clone, PartialEq, Message)]
pub struct EconItem {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint32, tag = "2")]
    pub account_id: u32,
    #[prost(uint32, tag = "3")]
    pub inventory: u32,
    #[prost(uint32, tag = "4")]
    pub def_index: u32,
    #[prost(uint32, tag = "5")]
    pub quantity: u32,
    #[prost(uint32, tag = "6")]
    pub level: u32,
    #[prost(uint32, tag = "7")]
    pub quality: u32,
    #[prost(uint32, tag = "8")]
    pub flags: u32,
    #[prost(uint32, tag = "9")]
    pub origin: u32,
    #[prost(string, tag = "10")]
    pub custom_name: String,
    #[prost(string, tag = "11")]
    pub custom_desc: String,
    #[prost(message, repeated, tag = "12")]
    pub attribute: Vec<ItemAttribute>,
    #[prost(message, optional, boxed, tag = "13")]
    pub interior_item: Option<Box<EconItem>>,
    #[prost(bool, tag = "14")]
    pub in_use: bool,
    #[prost(uint32, tag = "15")]
    pub style: u32,
    #[prost(uint64, tag = "16")]
    pub original_id: u64,
    #[prost(bool, tag = "17")]
    pub contains_equipped_state: bool,
    #[prost(message, repeated, tag = "18")]
    pub equipped_state: Vec<ItemEquipped>,
    #[prost(bool, tag = "19")]
    pub contains_equipped_state_v2: bool,
}

/// Per-account metadata object (cache type id 7).
#[derive(Clone, PartialEq, Message)]
pub struct GameAccountClient {
    #[prost(uint32, tag = "1")]
    pub additional_backpack_slots: u32,
    #[prost(bool, tag = "2")]
    pub trial_account: bool,
    #[prost(bool, tag = "4")]
    pub need_to_choose_most_helpful_friend: bool,
    #[prost(bool, tag = "5")]
    pub in_coaches_list: bool,
    #[prost(fixed32, tag = "6")]
    pub trade_ban_expiration: u32,
    #[prost(fixed32, tag = "7")]
    pub duel_ban_expiration: u32,
    #[prost(uint32, tag = "8")]
    pub preview_item_def: u32,
    #[prost(bool, tag = "19")]
    pub phone_verified: bool,
    #[prost(bool, tag = "23")]
    pub competitive_access: bool,
}

// ---------------------------------------------------------------------------
// Outbound proto-framed requests
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct UseItem {
    #[prost(uint64, tag = "1")]
    pub item_id: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct AdjustItemEquippedState {
    #[prost(uint64, tag = "1")]
    pub item_id: u64,
    #[prost(uint32, tag = "2")]
    pub new_class: u32,
    #[prost(uint32, tag = "3")]
    pub new_slot: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetItemPosition {
    #[prost(uint64, tag = "1")]
    pub item_id: u64,
    #[prost(uint32, tag = "2")]
    pub position: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetItemPositions {
    #[prost(message, repeated, tag = "1")]
    pub item_positions: Vec<SetItemPosition>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SortItems {
    #[prost(uint32, tag = "1")]
    pub sort_type: u32,
}

// ---------------------------------------------------------------------------
// Body-shape registry
// ---------------------------------------------------------------------------

/// A decoded protobuf body for a message type with a registered shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtoBody {
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    ClientWelcome(ClientWelcome),
    ServerWelcome(ServerWelcome),
    ClientGoodbye(ClientGoodbye),
    ServerGoodbye(ServerGoodbye),
    SystemBroadcast(SystemBroadcast),
    DisplayNotification(DisplayNotification),
    UpdateItemSchema(UpdateItemSchema),
}

/// Look up the registered body shape for `language` and decode `body`.
///
/// `None` means no shape is registered for this type; the dispatcher routes
/// such messages through its cache sub-handlers (or drops them), it does
/// not treat the absence as an error.
pub fn decode_body(language: Language, body: &[u8]) -> Option<Result<ProtoBody>> {
    fn wrap<M, F>(r: std::result::Result<M, prost::DecodeError>, f: F) -> Result<ProtoBody>
    where
        F: FnOnce(M) -> ProtoBody,
    {
        r.map(f).map_err(GcError::Proto)
    }

    match language {
        Language::ClientHello => Some(wrap(ClientHello::decode(body), ProtoBody::ClientHello)),
        Language::ServerHello => Some(wrap(ServerHello::decode(body), ProtoBody::ServerHello)),
        Language::ClientWelcome => Some(wrap(ClientWelcome::decode(body), ProtoBody::ClientWelcome)),
        Language::ServerWelcome => Some(wrap(ServerWelcome::decode(body), ProtoBody::ServerWelcome)),
        Language::ClientGoodbye => Some(wrap(ClientGoodbye::decode(body), ProtoBody::ClientGoodbye)),
        Language::ServerGoodbye => Some(wrap(ServerGoodbye::decode(body), ProtoBody::ServerGoodbye)),
        Language::SystemMessage => {
            Some(wrap(SystemBroadcast::decode(body), ProtoBody::SystemBroadcast))
        }
        Language::ClientDisplayNotification => Some(wrap(
            DisplayNotification::decode(body),
            ProtoBody::DisplayNotification,
        )),
        Language::UpdateItemSchema => {
            Some(wrap(UpdateItemSchema::decode(body), ProtoBody::UpdateItemSchema))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn registry_covers_lifecycle_messages() {
        let welcome = ClientWelcome {
            version: 42,
            game_data: vec![1, 2],
            txn_country_code: "GB".into(),
        };
        let bytes = welcome.encode_to_vec();

        let body = decode_body(Language::ClientWelcome, &bytes).unwrap().unwrap();
        assert_eq!(body, ProtoBody::ClientWelcome(welcome));
    }

    #[test]
    fn cache_framing_is_not_in_the_registry() {
        assert!(decode_body(Language::SoCreate, &[]).is_none());
        assert!(decode_body(Language::SoCacheSubscribed, &[]).is_none());
        assert!(decode_body(Language::SoCacheSubscriptionCheck, &[]).is_none());
    }

    #[test]
    fn econ_item_round_trips_with_interior_item() {
        let item = EconItem {
            id: 7001,
            inventory: 0x4000_0005,
            def_index: 5021,
            quality: 6,
            interior_item: Some(Box::new(EconItem {
                id: 7002,
                ..EconItem::default()
            })),
            ..EconItem::default()
        };
        let decoded = EconItem::decode(item.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, item);
    }
}
