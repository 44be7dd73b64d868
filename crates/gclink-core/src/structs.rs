//! Hand-rolled struct message bodies (panic-free).
//!
//! A handful of GC messages predate the protobuf framing and carry fixed
//! little-endian struct bodies instead. Parsing rules match the rest of the
//! crate:
//! - Never index (`buf[0]`) — always use `Buf` and `remaining()` checks.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{GcError, Result};
use crate::language::Language;

/// Craft recipe code meaning "let the coordinator pick" (wildcard).
pub const RECIPE_WILDCARD: i16 = -2;

fn need(buf: &impl Buf, n: usize, what: &'static str) -> Result<()> {
    if buf.remaining() < n {
        return Err(GcError::Truncated(what));
    }
    Ok(())
}

fn read_ids(buf: &mut Bytes, count: i16, what: &'static str) -> Result<Vec<u64>> {
    if count < 0 {
        return Err(GcError::Decode(format!("{what}: negative id count {count}")));
    }
    let count = count as usize;
    need(buf, count * 8, what)?;
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(buf.get_u64_le());
    }
    Ok(ids)
}

/// Consume a set of items under a recipe.
///
/// Layout: `i16 recipe, i16 item_count, item_count x u64 item_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraftRequest {
    pub recipe: i16,
    pub items: Vec<u64>,
}

impl CraftRequest {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 + self.items.len() * 8);
        buf.put_i16_le(self.recipe);
        buf.put_i16_le(self.items.len() as i16);
        for id in &self.items {
            buf.put_u64_le(*id);
        }
        buf.freeze()
    }

    pub fn parse(mut body: Bytes) -> Result<Self> {
        need(&body, 4, "craft request header")?;
        let recipe = body.get_i16_le();
        let count = body.get_i16_le();
        let items = read_ids(&mut body, count, "craft request ids")?;
        Ok(Self { recipe, items })
    }
}

/// The coordinator's answer to a craft request.
///
/// Layout: `i16 recipe_id, u32 reserved (always observed 0), i16 id_count,
/// id_count x u64 item_id`. The reserved word is read and discarded.
///
/// `being_used` is not on the wire: it defaults to `false` and is flipped by
/// the crafting coordinator when a waiter consumes the response, so a
/// response observed by several listeners resolves at most one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraftResponse {
    pub recipe_id: i16,
    pub id_list: Vec<u64>,
    pub being_used: bool,
}

impl CraftResponse {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8 + self.id_list.len() * 8);
        buf.put_i16_le(self.recipe_id);
        buf.put_u32_le(0);
        buf.put_i16_le(self.id_list.len() as i16);
        for id in &self.id_list {
            buf.put_u64_le(*id);
        }
        buf.freeze()
    }

    pub fn parse(mut body: Bytes) -> Result<Self> {
        need(&body, 8, "craft response header")?;
        let recipe_id = body.get_i16_le();
        let _reserved = body.get_u32_le();
        let count = body.get_i16_le();
        let id_list = read_ids(&mut body, count, "craft response ids")?;
        Ok(Self {
            recipe_id,
            id_list,
            being_used: false,
        })
    }
}

/// Switch an item to one of its alternate styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetItemStyle {
    pub item_id: u64,
    pub style: u32,
}

impl SetItemStyle {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(12);
        buf.put_u64_le(self.item_id);
        buf.put_u32_le(self.style);
        buf.freeze()
    }

    pub fn parse(mut body: Bytes) -> Result<Self> {
        need(&body, 12, "set item style")?;
        Ok(Self {
            item_id: body.get_u64_le(),
            style: body.get_u32_le(),
        })
    }
}

/// Permanently delete an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteItem {
    pub item_id: u64,
}

impl DeleteItem {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u64_le(self.item_id);
        buf.freeze()
    }

    pub fn parse(mut body: Bytes) -> Result<Self> {
        need(&body, 8, "delete item")?;
        Ok(Self {
            item_id: body.get_u64_le(),
        })
    }
}

/// Wrap an item with wrapping paper, producing a gift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapItem {
    pub wrapping_paper_id: u64,
    pub item_id: u64,
}

impl WrapItem {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_u64_le(self.wrapping_paper_id);
        buf.put_u64_le(self.item_id);
        buf.freeze()
    }

    pub fn parse(mut body: Bytes) -> Result<Self> {
        need(&body, 16, "wrap item")?;
        Ok(Self {
            wrapping_paper_id: body.get_u64_le(),
            item_id: body.get_u64_le(),
        })
    }
}

/// Unwrap a gift back into its contained item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnwrapItem {
    pub gift_id: u64,
}

impl UnwrapItem {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u64_le(self.gift_id);
        buf.freeze()
    }

    pub fn parse(mut body: Bytes) -> Result<Self> {
        need(&body, 8, "unwrap item")?;
        Ok(Self {
            gift_id: body.get_u64_le(),
        })
    }
}

/// Send a wrapped gift to another account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverGift {
    pub user_id64: u64,
    pub gift_id: u64,
}

impl DeliverGift {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_u64_le(self.user_id64);
        buf.put_u64_le(self.gift_id);
        buf.freeze()
    }

    pub fn parse(mut body: Bytes) -> Result<Self> {
        need(&body, 16, "deliver gift")?;
        Ok(Self {
            user_id64: body.get_u64_le(),
            gift_id: body.get_u64_le(),
        })
    }
}

/// Open a crate with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenCrate {
    pub key_id: u64,
    pub crate_id: u64,
}

impl OpenCrate {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_u64_le(self.key_id);
        buf.put_u64_le(self.crate_id);
        buf.freeze()
    }

    pub fn parse(mut body: Bytes) -> Result<Self> {
        need(&body, 16, "open crate")?;
        Ok(Self {
            key_id: body.get_u64_le(),
            crate_id: body.get_u64_le(),
        })
    }
}

/// A decoded struct body for an inbound message type with a registered
/// layout. Only the craft response arrives struct-framed in practice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructBody {
    CraftResponse(CraftResponse),
}

/// Look up the registered struct layout for `language` and parse `body`.
/// `None` means no struct shape is registered for this type.
pub fn decode_body(language: Language, body: Bytes) -> Option<Result<StructBody>> {
    match language {
        Language::CraftResponse => Some(CraftResponse::parse(body).map(StructBody::CraftResponse)),
        _ => None,
    }
}
