//! The GC message-type enumeration and item-economy enums.
//!
//! `Language` is the closed registry of message-type codes spoken between
//! the client and the coordinator. The full registry runs to hundreds of
//! values; this enumeration carries the subset the session engine handles
//! plus the surrounding codes of each family, so unknown-but-plausible
//! traffic still resolves and can be logged by name.

use crate::error::GcError;

macro_rules! language {
    ($($name:ident = $code:literal,)+) => {
        /// GC message-type codes. The proto bit on the outer envelope's
        /// type field must be cleared before conversion.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum Language {
            $($name = $code,)+
        }

        impl TryFrom<u32> for Language {
            type Error = GcError;

            fn try_from(code: u32) -> Result<Self, GcError> {
                match code {
                    $($code => Ok(Language::$name),)+
                    other => Err(GcError::UnknownType(other)),
                }
            }
        }
    };
}

language! {
    // shared object cache framing
    SoCreate = 21,
    SoUpdate = 22,
    SoDestroy = 23,
    SoCacheSubscribed = 24,
    SoCacheUnsubscribed = 25,
    SoUpdateMultiple = 26,
    SoCacheSubscriptionCheck = 27,
    SoCacheSubscriptionRefresh = 28,
    SoCacheSubscribedUpToDate = 29,

    // item economy requests / responses
    Base = 1000,
    SetSingleItemPosition = 1001,
    Craft = 1002,
    CraftResponse = 1003,
    Delete = 1004,
    VerifyCacheSubscription = 1005,
    NameItem = 1006,
    UnlockCrate = 1007,
    UnlockCrateResponse = 1008,
    PaintItem = 1009,
    PaintItemResponse = 1010,
    MotdRequest = 1012,
    MotdRequestResponse = 1013,
    UseItemRequest = 1025,
    UseItemResponse = 1026,
    RemoveItemName = 1030,
    RemoveItemPaint = 1031,
    GiftWrapItem = 1032,
    GiftWrapItemResponse = 1033,
    DeliverGift = 1034,
    DeliverGiftResponseReceiver = 1036,
    UnwrapGiftRequest = 1037,
    UnwrapGiftResponse = 1038,
    SetItemStyle = 1039,
    SortItems = 1041,
    UpdateItemSchema = 1049,
    RequestInventoryRefresh = 1050,
    BackpackSortFinished = 1058,
    AdjustItemEquippedState = 1059,
    ItemAcknowledged = 1062,
    NameItemNotification = 1068,
    ClientDisplayNotification = 1069,
    GiftedItems = 1075,
    SetItemPositions = 1100,

    // trading
    TradingBase = 1500,
    TradingInitiateTradeRequest = 1501,
    TradingInitiateTradeResponse = 1502,
    TradingStartSession = 1503,
    TradingSessionClosed = 1509,
    TradingCancelSession = 1510,

    // store
    StoreGetUserData = 2500,
    StoreGetUserDataResponse = 2501,
    StorePurchaseInit = 2510,
    StorePurchaseInitResponse = 2511,
    StorePurchaseFinalize = 2512,
    StorePurchaseFinalizeResponse = 2513,
    StorePurchaseCancel = 2514,
    StorePurchaseCancelResponse = 2515,

    // session lifecycle + broadcasts
    PingRequest = 3001,
    PingResponse = 3002,
    SystemMessage = 4001,
    ReplicateConVars = 4002,
    ConVarUpdated = 4003,
    ClientWelcome = 4004,
    ServerWelcome = 4005,
    ClientHello = 4006,
    ServerHello = 4007,
    ClientGoodbye = 4008,
    ServerGoodbye = 4009,
    ServerAvailable = 4506,
    ClientConnectToServer = 4507,
    GameServerInfo = 4508,
    Error = 4509,
    LanServerAvailable = 4511,
}

impl Language {
    /// The on-wire code (without the proto bit).
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Reason codes carried by client/server goodbye messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum GoodbyeReason {
    GcGoingDown = 1,
    NoSession = 2,
}

impl GoodbyeReason {
    /// Best-effort conversion; the coordinator occasionally sends values
    /// outside the documented pair.
    pub fn from_wire(reason: i64) -> Option<Self> {
        match reason {
            1 => Some(GoodbyeReason::GcGoingDown),
            2 => Some(GoodbyeReason::NoSession),
            _ => None,
        }
    }
}

/// Item quality tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ItemQuality {
    Normal = 0,
    Genuine = 1,
    Vintage = 3,
    Rarity3 = 4,
    Unusual = 5,
    Unique = 6,
    Community = 7,
    Valve = 8,
    SelfMade = 9,
    Customized = 10,
    Strange = 11,
    Completed = 12,
    Haunted = 13,
    Collectors = 14,
    DecoratedWeapon = 15,
}

impl ItemQuality {
    /// Decode a quality code, falling back to `Normal` for values the
    /// schema has not caught up with yet.
    pub fn from_wire(code: u32) -> Self {
        match code {
            1 => ItemQuality::Genuine,
            3 => ItemQuality::Vintage,
            4 => ItemQuality::Rarity3,
            5 => ItemQuality::Unusual,
            6 => ItemQuality::Unique,
            7 => ItemQuality::Community,
            8 => ItemQuality::Valve,
            9 => ItemQuality::SelfMade,
            10 => ItemQuality::Customized,
            11 => ItemQuality::Strange,
            12 => ItemQuality::Completed,
            13 => ItemQuality::Haunted,
            14 => ItemQuality::Collectors,
            15 => ItemQuality::DecoratedWeapon,
            _ => ItemQuality::Normal,
        }
    }
}

bitflags::bitflags! {
    /// Per-item restriction flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ItemFlags: u32 {
        const CANNOT_TRADE = 1 << 0;
        const CANNOT_CRAFT = 1 << 1;
        const NOT_ECON = 1 << 3;
        const PREVIEW = 1 << 7;
    }
}

/// In-game backpack sort orders. Only orders the game client itself offers
/// are honored by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BackpackSortType {
    Name = 1,
    DefIndex = 2,
    Rarity = 3,
    Type = 4,
    Date = 5,
    Class = 101,
    Slot = 102,
}

/// Playable classes an item can be equipped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PlayerClass {
    Scout = 1,
    Sniper = 2,
    Soldier = 3,
    Demoman = 4,
    Medic = 5,
    Heavy = 6,
    Pyro = 7,
    Spy = 8,
    Engineer = 9,
}

/// Equip slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ItemSlot {
    Primary = 0,
    Secondary = 1,
    Melee = 2,
    Sapper = 4,
    Pda = 5,
    Pda2 = 6,
    Cosmetic1 = 7,
    Cosmetic2 = 8,
    Action = 9,
    Cosmetic3 = 10,
    Taunt1 = 11,
    Taunt2 = 12,
    Taunt3 = 13,
    Taunt4 = 14,
    Taunt5 = 15,
    Taunt6 = 16,
    Taunt7 = 17,
    Taunt8 = 18,
}
