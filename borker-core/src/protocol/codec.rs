//! Wire encoding of protocol payloads
//!
//! ```text
//! SetName/SetBio/SetAvatar  MAGIC tag content
//! Bork                      MAGIC tag nonce content
//! Comment/Rebork            MAGIC tag nonce reflen ref content
//! Extension                 MAGIC tag nonce position content
//! Delete/Like/Unlike/
//! Flag/Unflag               MAGIC tag reflen ref
//! Follow/Unfollow/
//! Block/Unblock             MAGIC tag address
//! ```
//!
//! Content that does not fit the root payload continues in `Extension`
//! payloads carrying the root's nonce and ascending positions.

use bitcoin::Transaction;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::lexer::{extract_mentions, extract_tags};
use super::{AddressRef, BorkRef, BorkType, NewBork, MAGIC, MAX_PROFILE_FIELD, MAX_REFERENCE_LEN};
use crate::address::{script_to_address, ADDRESS_PAYLOAD_LEN};
use crate::error::ProtocolError;
use crate::network::Network;
use crate::script::{op_return_payload, Signer, MAX_OP_RETURN_PAYLOAD};
use crate::types::BorkTxData;

/// Content bytes carried by one extension payload
pub const EXTENSION_CAPACITY: usize = MAX_OP_RETURN_PAYLOAD - 5;

/// Highest extension position
pub const MAX_POSITION: u8 = u8::MAX;

/// A single decoded payload. Chunked content is kept as raw bytes until the
/// chain it belongs to has been reassembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    SetName { content: String },
    SetBio { content: String },
    SetAvatar { content: String },
    Bork { nonce: u8, content: Vec<u8> },
    Comment { nonce: u8, reference: BorkRef, content: Vec<u8> },
    Rebork { nonce: u8, reference: BorkRef, content: Vec<u8> },
    Extension { nonce: u8, position: u8, content: Vec<u8> },
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

impl Payload {
    pub fn bork_type(&self) -> BorkType {
        match self {
            Payload::SetName { .. } => BorkType::SetName,
            Payload::SetBio { .. } => BorkType::SetBio,
            Payload::SetAvatar { .. } => BorkType::SetAvatar,
            Payload::Bork { .. } => BorkType::Bork,
            Payload::Comment { .. } => BorkType::Comment,
            Payload::Rebork { .. } => BorkType::Rebork,
            Payload::Extension { .. } => BorkType::Extension,
            Payload::Delete { .. } => BorkType::Delete,
            Payload::Like { .. } => BorkType::Like,
            Payload::Unlike { .. } => BorkType::Unlike,
            Payload::Flag { .. } => BorkType::Flag,
            Payload::Unflag { .. } => BorkType::Unflag,
            Payload::Follow { .. } => BorkType::Follow,
            Payload::Unfollow { .. } => BorkType::Unfollow,
            Payload::Block { .. } => BorkType::Block,
            Payload::Unblock { .. } => BorkType::Unblock,
        }
    }

    pub fn nonce(&self) -> Option<u8> {
        match self {
            Payload::Bork { nonce, .. }
            | Payload::Comment { nonce, .. }
            | Payload::Rebork { nonce, .. }
            | Payload::Extension { nonce, .. } => Some(*nonce),
            _ => None,
        }
    }

    pub fn position(&self) -> Option<u8> {
        match self {
            Payload::Extension { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Content bytes of payloads that may be continued by extensions
    fn chunk(&self) -> Option<&[u8]> {
        match self {
            Payload::Bork { content, .. }
            | Payload::Comment { content, .. }
            | Payload::Rebork { content, .. }
            | Payload::Extension { content, .. } => Some(content),
            _ => None,
        }
    }

    fn reference_id(&self) -> Option<String> {
        match self {
            Payload::Comment { reference, .. }
            | Payload::Rebork { reference, .. }
            | Payload::Delete { reference }
            | Payload::Like { reference }
            | Payload::Unlike { reference }
            | Payload::Flag { reference }
            | Payload::Unflag { reference } => Some(reference.to_hex()),
            Payload::Follow { address }
            | Payload::Unfollow { address }
            | Payload::Block { address }
            | Payload::Unblock { address } => Some(address.to_address()),
            _ => None,
        }
    }
}

fn header(bork_type: BorkType) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_OP_RETURN_PAYLOAD);
    buf.extend_from_slice(&MAGIC);
    buf.push(bork_type.tag());
    buf
}

fn push_reference(buf: &mut Vec<u8>, reference: &BorkRef) {
    buf.push(reference.as_bytes().len() as u8);
    buf.extend_from_slice(reference.as_bytes());
}

/// Longest prefix of `s` no longer than `max` bytes that ends on a char
/// boundary
fn split_at_boundary(s: &str, max: usize) -> (&str, &str) {
    let mut idx = max.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    s.split_at(idx)
}

/// Fill the root payload with as much content as fits, then emit extension
/// payloads for the remainder starting at `first_position`
fn chunked(
    mut root: Vec<u8>,
    content: &str,
    nonce: u8,
    first_position: u16,
) -> Result<Vec<Vec<u8>>, ProtocolError> {
    let (head, mut rest) = split_at_boundary(content, MAX_OP_RETURN_PAYLOAD - root.len());
    root.extend_from_slice(head.as_bytes());
    let mut payloads = vec![root];

    let mut position = first_position;
    while !rest.is_empty() {
        if position > MAX_POSITION as u16 {
            return Err(ProtocolError::ContentTooLong {
                len: content.len(),
                max: content.len() - rest.len(),
            });
        }
        let (chunk, remainder) = split_at_boundary(rest, EXTENSION_CAPACITY);
        let mut buf = header(BorkType::Extension);
        buf.push(nonce);
        buf.push(position as u8);
        buf.extend_from_slice(chunk.as_bytes());
        payloads.push(buf);
        rest = remainder;
        position += 1;
    }

    Ok(payloads)
}

/// Encode a validated action into one or more `OP_RETURN` payloads.
///
/// `nonce` tags the root of borks, comments and reborks so extensions can
/// be linked to it; other actions ignore it. An explicit extension keeps
/// its own nonce and continues from its own position.
pub fn encode(bork: &NewBork, nonce: u8) -> Result<Vec<Vec<u8>>, ProtocolError> {
    let mut buf = header(bork.bork_type());

    match bork {
        NewBork::SetName { content }
        | NewBork::SetBio { content }
        | NewBork::SetAvatar { content } => {
            if content.len() > MAX_PROFILE_FIELD {
                return Err(ProtocolError::ContentTooLong {
                    len: content.len(),
                    max: MAX_PROFILE_FIELD,
                });
            }
            buf.extend_from_slice(content.as_bytes());
            Ok(vec![buf])
        }
        NewBork::Bork { content } => {
            buf.push(nonce);
            chunked(buf, content, nonce, 1)
        }
        NewBork::Comment { reference, content } | NewBork::Rebork { reference, content } => {
            buf.push(nonce);
            push_reference(&mut buf, reference);
            chunked(buf, content, nonce, 1)
        }
        NewBork::Extension { nonce, position, content } => {
            buf.push(*nonce);
            buf.push(*position);
            chunked(buf, content, *nonce, *position as u16 + 1)
        }
        NewBork::Delete { reference }
        | NewBork::Like { reference }
        | NewBork::Unlike { reference }
        | NewBork::Flag { reference }
        | NewBork::Unflag { reference } => {
            push_reference(&mut buf, reference);
            Ok(vec![buf])
        }
        NewBork::Follow { address }
        | NewBork::Unfollow { address }
        | NewBork::Block { address }
        | NewBork::Unblock { address } => {
            buf.extend_from_slice(&address.0);
            Ok(vec![buf])
        }
    }
}

fn read_reference(data: &[u8]) -> Option<(BorkRef, &[u8])> {
    let (&len, rest) = data.split_first()?;
    let len = len as usize;
    if len == 0 || len > MAX_REFERENCE_LEN || rest.len() < len {
        return None;
    }
    Some((BorkRef::from_bytes(&rest[..len])?, &rest[len..]))
}

fn read_exact_reference(data: &[u8]) -> Option<BorkRef> {
    match read_reference(data)? {
        (reference, []) => Some(reference),
        _ => None,
    }
}

fn read_address(data: &[u8]) -> Option<AddressRef> {
    if data.len() != ADDRESS_PAYLOAD_LEN {
        return None;
    }
    let mut address = [0u8; ADDRESS_PAYLOAD_LEN];
    address.copy_from_slice(data);
    Some(AddressRef(address))
}

fn read_profile(data: &[u8]) -> Option<String> {
    if data.len() > MAX_PROFILE_FIELD {
        return None;
    }
    String::from_utf8(data.to_vec()).ok()
}

/// Decode one payload. Anything that is not a well-formed protocol payload
/// yields `None`.
pub fn decode(data: &[u8]) -> Option<Payload> {
    if data.len() < 3 || data[..2] != MAGIC {
        return None;
    }
    let bork_type = BorkType::from_tag(data[2])?;
    let body = &data[3..];

    let payload = match bork_type {
        BorkType::SetName => Payload::SetName { content: read_profile(body)? },
        BorkType::SetBio => Payload::SetBio { content: read_profile(body)? },
        BorkType::SetAvatar => Payload::SetAvatar { content: read_profile(body)? },
        BorkType::Bork => {
            let (&nonce, content) = body.split_first()?;
            Payload::Bork { nonce, content: content.to_vec() }
        }
        BorkType::Comment | BorkType::Rebork => {
            let (&nonce, rest) = body.split_first()?;
            let (reference, content) = read_reference(rest)?;
            let content = content.to_vec();
            if bork_type == BorkType::Comment {
                Payload::Comment { nonce, reference, content }
            } else {
                Payload::Rebork { nonce, reference, content }
            }
        }
        BorkType::Extension => {
            if body.len() < 2 || body[1] == 0 {
                return None;
            }
            Payload::Extension {
                nonce: body[0],
                position: body[1],
                content: body[2..].to_vec(),
            }
        }
        BorkType::Delete => Payload::Delete { reference: read_exact_reference(body)? },
        BorkType::Like => Payload::Like { reference: read_exact_reference(body)? },
        BorkType::Unlike => Payload::Unlike { reference: read_exact_reference(body)? },
        BorkType::Flag => Payload::Flag { reference: read_exact_reference(body)? },
        BorkType::Unflag => Payload::Unflag { reference: read_exact_reference(body)? },
        BorkType::Follow => Payload::Follow { address: read_address(body)? },
        BorkType::Unfollow => Payload::Unfollow { address: read_address(body)? },
        BorkType::Block => Payload::Block { address: read_address(body)? },
        BorkType::Unblock => Payload::Unblock { address: read_address(body)? },
    };

    Some(payload)
}

/// Decode the protocol action carried by a transaction, if any.
///
/// Protocol payloads are read in output order. The first is the root and
/// every later one must extend it: same nonce, consecutive positions. A
/// transaction that breaks this, has no recognisable signer, or whose
/// reassembled content is not UTF-8 is ignored.
pub fn decode_transaction(
    tx: &Transaction,
    timestamp: DateTime<Utc>,
    network: Network,
) -> Option<BorkTxData> {
    let txid = tx.compute_txid().to_string();

    let payloads: Vec<Payload> = tx
        .output
        .iter()
        .filter_map(|output| op_return_payload(&output.script_pubkey))
        .filter_map(|data| decode(&data))
        .collect();

    let (root, extensions) = payloads.split_first()?;

    let sender_address = match tx.input.first().and_then(Signer::from_input) {
        Some(signer) => signer.address(network)?,
        None => {
            debug!(txid = %txid, reason = "unrecognised signer", "Dropping bork transaction");
            return None;
        }
    };

    let mut content = root.chunk().map(|chunk| chunk.to_vec());
    let mut last_position = root.position();
    let mut expected = root.position().unwrap_or(0) as u16 + 1;
    for extension in extensions {
        let (
            Some(buf),
            Payload::Extension {
                nonce,
                position,
                content: chunk,
            },
        ) = (content.as_mut(), extension)
        else {
            debug!(
                txid = %txid,
                reason = "unexpected payload after root",
                "Dropping bork transaction"
            );
            return None;
        };
        if Some(*nonce) != root.nonce() || *position as u16 != expected {
            debug!(txid = %txid, reason = "broken extension chain", "Dropping bork transaction");
            return None;
        }
        buf.extend_from_slice(chunk);
        last_position = Some(*position);
        expected += 1;
    }

    let content = match (root, content) {
        (
            Payload::SetName { content }
            | Payload::SetBio { content }
            | Payload::SetAvatar { content },
            _,
        ) => Some(content.clone()),
        (_, Some(bytes)) => match String::from_utf8(bytes) {
            Ok(content) => Some(content),
            Err(_) => {
                debug!(txid = %txid, reason = "content is not utf-8", "Dropping bork transaction");
                return None;
            }
        },
        (_, None) => None,
    };

    let (mentions, tags) = match (root.bork_type(), content.as_deref()) {
        (
            BorkType::Bork | BorkType::Comment | BorkType::Rebork | BorkType::Extension,
            Some(text),
        ) => {
            (extract_mentions(text), extract_tags(text))
        }
        _ => (Vec::new(), Vec::new()),
    };

    let recipient_address = tx
        .output
        .iter()
        .filter(|output| !output.script_pubkey.is_op_return())
        .filter_map(|output| script_to_address(&output.script_pubkey, network))
        .find(|address| *address != sender_address && !mentions.contains(address));

    Some(BorkTxData {
        timestamp,
        txid,
        bork_type: root.bork_type(),
        nonce: root.nonce(),
        position: root.position(),
        last_position,
        reference_id: root.reference_id(),
        content,
        sender_address,
        recipient_address,
        mentions,
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryFrom;

    use crate::protocol::NewBorkData;

    fn bork(content: &str) -> NewBork {
        NewBork::try_from(NewBorkData::new(BorkType::Bork).with_content(content)).unwrap()
    }

    #[test]
    fn test_encode_short_bork() {
        let payloads = encode(&bork("hello"), 7).unwrap();
        assert_eq!(payloads, vec![b"\x00\x00\x03\x07hello".to_vec()]);
        assert_eq!(
            decode(&payloads[0]),
            Some(Payload::Bork { nonce: 7, content: b"hello".to_vec() })
        );
    }

    #[test]
    fn test_long_bork_splits_into_extensions() {
        let content = "x".repeat(76 + 75 + 10);
        let payloads = encode(&bork(&content), 9).unwrap();
        assert_eq!(payloads.len(), 3);
        assert!(payloads.iter().all(|p| p.len() <= MAX_OP_RETURN_PAYLOAD));
        assert_eq!(payloads[0].len(), MAX_OP_RETURN_PAYLOAD);
        assert_eq!(&payloads[1][..5], &[0x00, 0x00, 0x06, 9, 1]);
        assert_eq!(&payloads[2][..5], &[0x00, 0x00, 0x06, 9, 2]);
        assert_eq!(payloads[2].len(), 15);
    }

    #[test]
    fn test_split_never_breaks_a_code_point() {
        // 3-byte chars do not divide 76 evenly
        let content = "\u{20ac}".repeat(40);
        let payloads = encode(&bork(&content), 0).unwrap();
        let mut joined = Vec::new();
        for payload in &payloads {
            let decoded = decode(payload).unwrap();
            let chunk = decoded.chunk().unwrap();
            assert!(std::str::from_utf8(chunk).is_ok());
            joined.extend_from_slice(chunk);
        }
        assert_eq!(String::from_utf8(joined).unwrap(), content);
    }

    #[test]
    fn test_comment_layout() {
        let comment = NewBork::try_from(
            NewBorkData::new(BorkType::Comment)
                .with_content("nice")
                .with_reference("abcd"),
        )
        .unwrap();
        let payloads = encode(&comment, 1).unwrap();
        assert_eq!(payloads, vec![b"\x00\x00\x04\x01\x02\xab\xcdnice".to_vec()]);
        match decode(&payloads[0]).unwrap() {
            Payload::Comment { nonce, reference, content } => {
                assert_eq!(nonce, 1);
                assert_eq!(reference.to_hex(), "abcd");
                assert_eq!(content, b"nice");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_follow_layout() {
        let follow = NewBork::try_from(
            NewBorkData::new(BorkType::Follow).with_reference("DCuKLtD2iahf25s61QtxsLQT1DUpXj1WhQ"),
        )
        .unwrap();
        let payloads = encode(&follow, 0).unwrap();
        assert_eq!(payloads[0].len(), 3 + ADDRESS_PAYLOAD_LEN);
        assert_eq!(payloads[0][3], 0x1E);
        assert_eq!(decode(&payloads[0]).unwrap().bork_type(), BorkType::Follow);
    }

    #[test]
    fn test_like_rejects_trailing_bytes() {
        assert!(decode(b"\x00\x00\x08\x01\xab").is_some());
        assert!(decode(b"\x00\x00\x08\x01\xab\xff").is_none());
    }

    #[test]
    fn test_decode_rejects_foreign_data() {
        assert_eq!(decode(b""), None);
        assert_eq!(decode(b"\x00\x00"), None);
        assert_eq!(decode(b"\x01\x00\x03\x00hi"), None);
        assert_eq!(decode(b"\x00\x00\x10\x00hi"), None);
        // zero length reference
        assert_eq!(decode(b"\x00\x00\x08\x00"), None);
        // truncated reference
        assert_eq!(decode(b"\x00\x00\x04\x00\x05\xab"), None);
        // extension position zero
        assert_eq!(decode(b"\x00\x00\x06\x00\x00hi"), None);
        // non utf-8 profile field
        assert_eq!(decode(b"\x00\x00\x00\xff"), None);
    }

    #[test]
    fn test_explicit_extension_continues_from_its_position() {
        let mut data = NewBorkData::new(BorkType::Extension).with_content("y".repeat(100));
        data.nonce = Some(3);
        data.position = Some(4);
        let payloads = encode(&NewBork::try_from(data).unwrap(), 0).unwrap();
        assert_eq!(payloads.len(), 2);
        assert_eq!(decode(&payloads[0]).unwrap().position(), Some(4));
        assert_eq!(decode(&payloads[1]).unwrap().position(), Some(5));
        assert_eq!(decode(&payloads[1]).unwrap().nonce(), Some(3));
    }

    #[test]
    fn test_content_beyond_last_position_is_rejected() {
        let content = "z".repeat(76 + EXTENSION_CAPACITY * MAX_POSITION as usize + 1);
        let bork = NewBork::Bork { content };
        assert!(matches!(encode(&bork, 0), Err(ProtocolError::ContentTooLong { .. })));
    }
}
