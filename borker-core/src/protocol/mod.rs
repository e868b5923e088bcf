//! Bork protocol
//!
//! Social actions are carried in `OP_RETURN` outputs. Every payload starts
//! with [`MAGIC`] followed by a one byte [`BorkType`] tag; the remaining
//! layout depends on the type and is documented in [`codec`].

pub mod codec;
pub mod lexer;

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use crate::address::{decode_address_payload, ADDRESS_PAYLOAD_LEN};
use crate::error::ProtocolError;

pub use codec::{decode, encode, Payload};
pub use lexer::{extract_mentions, extract_tags};

/// Prefix of every protocol payload
pub const MAGIC: [u8; 2] = [0x00, 0x00];

/// Maximum length of a profile field (name, bio, avatar)
pub const MAX_PROFILE_FIELD: usize = 77;

/// Longest bork id prefix a reference may carry
pub const MAX_REFERENCE_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorkType {
    SetName,
    SetBio,
    SetAvatar,
    Bork,
    Comment,
    Rebork,
    Extension,
    Delete,
    Like,
    Unlike,
    Flag,
    Unflag,
    Follow,
    Unfollow,
    Block,
    Unblock,
}

impl BorkType {
    pub const ALL: [BorkType; 16] = [
        BorkType::SetName,
        BorkType::SetBio,
        BorkType::SetAvatar,
        BorkType::Bork,
        BorkType::Comment,
        BorkType::Rebork,
        BorkType::Extension,
        BorkType::Delete,
        BorkType::Like,
        BorkType::Unlike,
        BorkType::Flag,
        BorkType::Unflag,
        BorkType::Follow,
        BorkType::Unfollow,
        BorkType::Block,
        BorkType::Unblock,
    ];

    /// Wire tag byte
    pub fn tag(&self) -> u8 {
        *self as u8
    }

    pub fn from_tag(tag: u8) -> Option<BorkType> {
        BorkType::ALL.get(tag as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BorkType::SetName => "set_name",
            BorkType::SetBio => "set_bio",
            BorkType::SetAvatar => "set_avatar",
            BorkType::Bork => "bork",
            BorkType::Comment => "comment",
            BorkType::Rebork => "rebork",
            BorkType::Extension => "extension",
            BorkType::Delete => "delete",
            BorkType::Like => "like",
            BorkType::Unlike => "unlike",
            BorkType::Flag => "flag",
            BorkType::Unflag => "unflag",
            BorkType::Follow => "follow",
            BorkType::Unfollow => "unfollow",
            BorkType::Block => "block",
            BorkType::Unblock => "unblock",
        }
    }
}

impl fmt::Display for BorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BorkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BorkType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Invalid bork type: {}", s))
    }
}

/// Request to publish a new action, as received from callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBorkData {
    #[serde(rename = "type")]
    pub bork_type: BorkType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reference_id: Option<String>,
    /// Only used by explicit extension continuations
    #[serde(default)]
    pub nonce: Option<u8>,
    /// Only used by explicit extension continuations
    #[serde(default)]
    pub position: Option<u8>,
}

impl NewBorkData {
    pub fn new(bork_type: BorkType) -> Self {
        Self {
            bork_type,
            content: None,
            reference_id: None,
            nonce: None,
            position: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }
}

/// Prefix of the transaction id of the bork being referenced, in display
/// (big-endian hex) byte order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BorkRef(Vec<u8>);

impl BorkRef {
    pub fn from_bytes(bytes: &[u8]) -> Option<BorkRef> {
        if bytes.is_empty() || bytes.len() > MAX_REFERENCE_LEN {
            return None;
        }
        Some(BorkRef(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl FromStr for BorkRef {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)
            .map_err(|e| ProtocolError::InvalidReference(format!("{}: {}", s, e)))?;
        BorkRef::from_bytes(&bytes).ok_or_else(|| {
            ProtocolError::InvalidReference(format!(
                "{}: must be 1 to {} bytes",
                s, MAX_REFERENCE_LEN
            ))
        })
    }
}

/// Address being followed or blocked: `version || hash160`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRef(pub [u8; ADDRESS_PAYLOAD_LEN]);

impl AddressRef {
    pub fn to_address(&self) -> String {
        crate::address::encode_base58check(&self.0)
    }
}

impl FromStr for AddressRef {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_address_payload(s).map(AddressRef)
    }
}

/// A validated action, one variant per type, each carrying exactly the
/// fields its semantics require
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewBork {
    SetName { content: String },
    SetBio { content: String },
    SetAvatar { content: String },
    Bork { content: String },
    Comment { reference: BorkRef, content: String },
    Rebork { reference: BorkRef, content: String },
    Extension { nonce: u8, position: u8, content: String },
    Delete { reference: BorkRef },
    Like { reference: BorkRef },
    Unlike { reference: BorkRef },
    Flag { reference: BorkRef },
    Unflag { reference: BorkRef },
    Follow { address: AddressRef },
    Unfollow { address: AddressRef },
    Block { address: AddressRef },
    Unblock { address: AddressRef },
}

impl NewBork {
    pub fn bork_type(&self) -> BorkType {
        match self {
            NewBork::SetName { .. } => BorkType::SetName,
            NewBork::SetBio { .. } => BorkType::SetBio,
            NewBork::SetAvatar { .. } => BorkType::SetAvatar,
            NewBork::Bork { .. } => BorkType::Bork,
            NewBork::Comment { .. } => BorkType::Comment,
            NewBork::Rebork { .. } => BorkType::Rebork,
            NewBork::Extension { .. } => BorkType::Extension,
            NewBork::Delete { .. } => BorkType::Delete,
            NewBork::Like { .. } => BorkType::Like,
            NewBork::Unlike { .. } => BorkType::Unlike,
            NewBork::Flag { .. } => BorkType::Flag,
            NewBork::Unflag { .. } => BorkType::Unflag,
            NewBork::Follow { .. } => BorkType::Follow,
            NewBork::Unfollow { .. } => BorkType::Unfollow,
            NewBork::Block { .. } => BorkType::Block,
            NewBork::Unblock { .. } => BorkType::Unblock,
        }
    }

    /// Whether the payload carries a nonce that extensions can refer to
    pub fn has_nonce(&self) -> bool {
        matches!(
            self,
            NewBork::Bork { .. }
                | NewBork::Comment { .. }
                | NewBork::Rebork { .. }
                | NewBork::Extension { .. }
        )
    }
}

fn missing(bork_type: BorkType, field: &str) -> ProtocolError {
    ProtocolError::InvalidBorkData(format!("{} requires {}", bork_type, field))
}

fn forbidden(bork_type: BorkType, field: &str) -> ProtocolError {
    ProtocolError::InvalidBorkData(format!("{} does not take {}", bork_type, field))
}

impl TryFrom<NewBorkData> for NewBork {
    type Error = ProtocolError;

    fn try_from(data: NewBorkData) -> Result<Self, Self::Error> {
        let bork = validate(data)?;
        // Content must fit the root plus the available extension positions
        codec::encode(&bork, 0).map_err(|e| ProtocolError::InvalidBorkData(e.to_string()))?;
        Ok(bork)
    }
}

fn validate(data: NewBorkData) -> Result<NewBork, ProtocolError> {
    let bork_type = data.bork_type;
    let content = data.content.filter(|c| !c.is_empty());
    let reference = data.reference_id.filter(|r| !r.is_empty());

    if bork_type != BorkType::Extension && (data.nonce.is_some() || data.position.is_some()) {
        return Err(forbidden(bork_type, "a nonce or position"));
    }

    let require_content =
        |content: Option<String>| content.ok_or_else(|| missing(bork_type, "content"));
    let forbid_content = |content: &Option<String>| match content {
        Some(_) => Err(forbidden(bork_type, "content")),
        None => Ok(()),
    };
    let forbid_reference = |reference: &Option<String>| match reference {
        Some(_) => Err(forbidden(bork_type, "a reference")),
        None => Ok(()),
    };
    let bork_ref = |reference: Option<String>| -> Result<BorkRef, ProtocolError> {
        reference
            .ok_or_else(|| missing(bork_type, "a reference"))?
            .parse()
    };
    let address_ref = |reference: Option<String>| -> Result<AddressRef, ProtocolError> {
        reference
            .ok_or_else(|| missing(bork_type, "a reference address"))?
            .parse()
    };
    let profile_field = |content: Option<String>| -> Result<String, ProtocolError> {
        let content = require_content(content)?;
        if content.len() > MAX_PROFILE_FIELD {
            return Err(ProtocolError::ContentTooLong {
                len: content.len(),
                max: MAX_PROFILE_FIELD,
            });
        }
        Ok(content)
    };

    match bork_type {
        BorkType::SetName => {
            forbid_reference(&reference)?;
            Ok(NewBork::SetName { content: profile_field(content)? })
        }
        BorkType::SetBio => {
            forbid_reference(&reference)?;
            Ok(NewBork::SetBio { content: profile_field(content)? })
        }
        BorkType::SetAvatar => {
            forbid_reference(&reference)?;
            Ok(NewBork::SetAvatar { content: profile_field(content)? })
        }
        BorkType::Bork => {
            forbid_reference(&reference)?;
            Ok(NewBork::Bork { content: require_content(content)? })
        }
        BorkType::Comment => Ok(NewBork::Comment {
            content: require_content(content)?,
            reference: bork_ref(reference)?,
        }),
        BorkType::Rebork => Ok(NewBork::Rebork {
            content: require_content(content)?,
            reference: bork_ref(reference)?,
        }),
        BorkType::Extension => {
            forbid_reference(&reference)?;
            let position = data.position.ok_or_else(|| missing(bork_type, "a position"))?;
            if position == 0 {
                return Err(ProtocolError::InvalidBorkData(
                    "extension positions start at 1".to_string(),
                ));
            }
            Ok(NewBork::Extension {
                nonce: data.nonce.ok_or_else(|| missing(bork_type, "a nonce"))?,
                position,
                content: require_content(content)?,
            })
        }
        BorkType::Delete => {
            forbid_content(&content)?;
            Ok(NewBork::Delete { reference: bork_ref(reference)? })
        }
        BorkType::Like => {
            forbid_content(&content)?;
            Ok(NewBork::Like { reference: bork_ref(reference)? })
        }
        BorkType::Unlike => {
            forbid_content(&content)?;
            Ok(NewBork::Unlike { reference: bork_ref(reference)? })
        }
        BorkType::Flag => {
            forbid_content(&content)?;
            Ok(NewBork::Flag { reference: bork_ref(reference)? })
        }
        BorkType::Unflag => {
            forbid_content(&content)?;
            Ok(NewBork::Unflag { reference: bork_ref(reference)? })
        }
        BorkType::Follow => {
            forbid_content(&content)?;
            Ok(NewBork::Follow { address: address_ref(reference)? })
        }
        BorkType::Unfollow => {
            forbid_content(&content)?;
            Ok(NewBork::Unfollow { address: address_ref(reference)? })
        }
        BorkType::Block => {
            forbid_content(&content)?;
            Ok(NewBork::Block { address: address_ref(reference)? })
        }
        BorkType::Unblock => {
            forbid_content(&content)?;
            Ok(NewBork::Unblock { address: address_ref(reference)? })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BORK_ID: &str = "5c6f1a0d2e9b8c7d6e5f4a3b2c1d0e9f8a7b6c5d4e3f2a1b0c9d8e7f6a5b4c3d";
    const ADDRESS: &str = "DCuKLtD2iahf25s61QtxsLQT1DUpXj1WhQ";

    #[test]
    fn test_tags_match_table() {
        for (i, bork_type) in BorkType::ALL.iter().enumerate() {
            assert_eq!(bork_type.tag() as usize, i);
            assert_eq!(BorkType::from_tag(i as u8), Some(*bork_type));
            assert_eq!(bork_type.as_str().parse::<BorkType>().unwrap(), *bork_type);
        }
        assert_eq!(BorkType::from_tag(16), None);
        assert_eq!(BorkType::Unflag.tag(), 0x0b);
    }

    #[test]
    fn test_bork_type_serde_uses_snake_case() {
        let json = serde_json::to_string(&BorkType::SetAvatar).unwrap();
        assert_eq!(json, "\"set_avatar\"");
    }

    #[test]
    fn test_new_bork_data_from_json() {
        let json = format!(
            r#"{{"type":"comment","content":"hi","referenceId":"{}"}}"#,
            BORK_ID
        );
        let data: NewBorkData = serde_json::from_str(&json).unwrap();
        let bork = NewBork::try_from(data).unwrap();
        assert_eq!(bork.bork_type(), BorkType::Comment);
    }

    #[test]
    fn test_bork_requires_content_and_forbids_reference() {
        let err = NewBork::try_from(NewBorkData::new(BorkType::Bork)).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidBorkData(_)));

        let err = NewBork::try_from(
            NewBorkData::new(BorkType::Bork).with_content("hi").with_reference(BORK_ID),
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidBorkData(_)));

        let bork = NewBork::try_from(NewBorkData::new(BorkType::Bork).with_content("hi")).unwrap();
        assert_eq!(bork, NewBork::Bork { content: "hi".to_string() });
    }

    #[test]
    fn test_empty_content_counts_as_missing() {
        let err =
            NewBork::try_from(NewBorkData::new(BorkType::SetName).with_content("")).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidBorkData(_)));
    }

    #[test]
    fn test_comment_and_rebork_need_both_fields() {
        for bork_type in [BorkType::Comment, BorkType::Rebork] {
            assert!(NewBork::try_from(NewBorkData::new(bork_type).with_content("x")).is_err());
            assert!(
                NewBork::try_from(NewBorkData::new(bork_type).with_reference(BORK_ID)).is_err()
            );
            assert!(NewBork::try_from(
                NewBorkData::new(bork_type).with_content("x").with_reference(BORK_ID)
            )
            .is_ok());
        }
    }

    #[test]
    fn test_reference_actions_forbid_content() {
        for bork_type in [
            BorkType::Delete,
            BorkType::Like,
            BorkType::Unlike,
            BorkType::Flag,
            BorkType::Unflag,
        ] {
            assert!(NewBork::try_from(NewBorkData::new(bork_type).with_reference(BORK_ID)).is_ok());
            assert!(NewBork::try_from(
                NewBorkData::new(bork_type).with_reference(BORK_ID).with_content("x")
            )
            .is_err());
            assert!(NewBork::try_from(NewBorkData::new(bork_type)).is_err());
        }
    }

    #[test]
    fn test_address_actions_need_valid_address() {
        for bork_type in [
            BorkType::Follow,
            BorkType::Unfollow,
            BorkType::Block,
            BorkType::Unblock,
        ] {
            assert!(NewBork::try_from(NewBorkData::new(bork_type).with_reference(ADDRESS)).is_ok());
            let err =
                NewBork::try_from(NewBorkData::new(bork_type).with_reference(BORK_ID)).unwrap_err();
            assert!(matches!(err, ProtocolError::InvalidAddress(_)));
        }
    }

    #[test]
    fn test_profile_field_length_limit() {
        let long = "a".repeat(MAX_PROFILE_FIELD + 1);
        let err =
            NewBork::try_from(NewBorkData::new(BorkType::SetBio).with_content(long)).unwrap_err();
        assert_eq!(err, ProtocolError::ContentTooLong { len: 78, max: 77 });
    }

    #[test]
    fn test_reference_must_be_hex_prefix() {
        assert!("zz".parse::<BorkRef>().is_err());
        assert!("".parse::<BorkRef>().is_err());
        assert!("ab".parse::<BorkRef>().is_ok());
        assert!(format!("{}00", BORK_ID).parse::<BorkRef>().is_err());
    }

    #[test]
    fn test_extension_needs_nonce_and_position() {
        let mut data = NewBorkData::new(BorkType::Extension).with_content("more");
        assert!(NewBork::try_from(data.clone()).is_err());
        data.nonce = Some(4);
        data.position = Some(0);
        assert!(NewBork::try_from(data.clone()).is_err());
        data.position = Some(2);
        assert_eq!(
            NewBork::try_from(data).unwrap(),
            NewBork::Extension { nonce: 4, position: 2, content: "more".to_string() }
        );
    }

    #[test]
    fn test_content_must_fit_extension_chain() {
        let huge = "a".repeat(80 * 256);
        let err =
            NewBork::try_from(NewBorkData::new(BorkType::Bork).with_content(huge)).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidBorkData(_)));
    }

    #[test]
    fn test_nonce_only_allowed_on_extensions() {
        let mut data = NewBorkData::new(BorkType::Bork).with_content("hi");
        data.nonce = Some(1);
        assert!(NewBork::try_from(data).is_err());
    }

    #[test]
    fn test_address_ref_round_trip() {
        let address: AddressRef = ADDRESS.parse().unwrap();
        assert_eq!(address.to_address(), ADDRESS);
    }
}
