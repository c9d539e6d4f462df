//! Recursive Length Prefix (RLP) serialization.
//!
//! RLP is the canonical encoding used throughout the protocol: account and
//! storage trie nodes, block headers, transactions, and peer-wire messages
//! are all RLP-encoded before hashing or transmission. This crate provides
//! the encoding rules exactly as specified, independent of any particular
//! data type, so every other crate in the workspace builds its wire formats
//! on top of it instead of rolling its own.
//!
//! An RLP payload is either a single byte string or a list of payloads,
//! nested to arbitrary depth. There is no notion of integers, maps, or
//! signed values at this layer - callers encode those as byte strings
//! (big-endian, no leading zero byte) or lists of items.

mod decode;
mod encode;
mod error;
mod item;

pub use decode::decode;
pub use encode::encode;
pub use error::RlpError;
pub use item::RlpItem;

/// Types that can be turned into an RLP item tree.
pub trait Encodable {
    fn rlp_append(&self) -> RlpItem;

    /// Convenience: encode straight to bytes.
    fn rlp_bytes(&self) -> Vec<u8> {
        encode(&self.rlp_append())
    }
}

/// Types that can be parsed back out of an RLP item tree.
pub trait Decodable: Sized {
    fn rlp_parse(item: &RlpItem) -> Result<Self, RlpError>;

    /// Convenience: decode straight from bytes, rejecting trailing data.
    fn rlp_decode(data: &[u8]) -> Result<Self, RlpError> {
        let item = decode(data)?;
        Self::rlp_parse(&item)
    }
}

impl Encodable for Vec<u8> {
    fn rlp_append(&self) -> RlpItem {
        RlpItem::Bytes(self.clone())
    }
}

impl Decodable for Vec<u8> {
    fn rlp_parse(item: &RlpItem) -> Result<Self, RlpError> {
        match item {
            RlpItem::Bytes(b) => Ok(b.clone()),
            RlpItem::List(_) => Err(RlpError::UnexpectedList),
        }
    }
}

impl Encodable for u64 {
    fn rlp_append(&self) -> RlpItem {
        RlpItem::Bytes(strip_leading_zeros(&self.to_be_bytes()))
    }
}

impl Decodable for u64 {
    fn rlp_parse(item: &RlpItem) -> Result<Self, RlpError> {
        let bytes = match item {
            RlpItem::Bytes(b) => b,
            RlpItem::List(_) => return Err(RlpError::UnexpectedList),
        };
        if bytes.len() > 8 {
            return Err(RlpError::SizeOverflow);
        }
        if !bytes.is_empty() && bytes[0] == 0 {
            return Err(RlpError::LeadingZero);
        }
        let mut buf = [0u8; 8];
        buf[8 - bytes.len()..].copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }
}

impl Encodable for primitive_types::U256 {
    fn rlp_append(&self) -> RlpItem {
        let mut bytes = [0u8; 32];
        self.to_big_endian(&mut bytes);
        RlpItem::Bytes(strip_leading_zeros(&bytes))
    }
}

impl Decodable for primitive_types::U256 {
    fn rlp_parse(item: &RlpItem) -> Result<Self, RlpError> {
        let bytes = match item {
            RlpItem::Bytes(b) => b,
            RlpItem::List(_) => return Err(RlpError::UnexpectedList),
        };
        if bytes.len() > 32 {
            return Err(RlpError::SizeOverflow);
        }
        if !bytes.is_empty() && bytes[0] == 0 {
            return Err(RlpError::LeadingZero);
        }
        Ok(primitive_types::U256::from_big_endian(bytes))
    }
}

/// Encode a homogeneous slice as an RLP list. Named rather than a blanket
/// `Encodable` impl on `Vec<T>`/`[T]` because those would overlap with the
/// `Vec<u8>` byte-string impl above for `T = u8`.
pub fn encode_list<T: Encodable>(items: &[T]) -> RlpItem {
    RlpItem::List(items.iter().map(Encodable::rlp_append).collect())
}

/// Decode an RLP list into a homogeneous `Vec<T>`.
pub fn decode_list<T: Decodable>(item: &RlpItem) -> Result<Vec<T>, RlpError> {
    match item {
        RlpItem::List(items) => items.iter().map(T::rlp_parse).collect(),
        RlpItem::Bytes(_) => Err(RlpError::UnexpectedString),
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_single_byte_below_0x80_as_itself() {
        assert_eq!(encode(&RlpItem::Bytes(vec![0x00])), vec![0x00]);
        assert_eq!(encode(&RlpItem::Bytes(vec![0x7f])), vec![0x7f]);
    }

    #[test]
    fn encodes_empty_string() {
        assert_eq!(encode(&RlpItem::Bytes(vec![])), vec![0x80]);
    }

    #[test]
    fn encodes_dog_per_seed_vector() {
        let out = encode(&RlpItem::Bytes(b"dog".to_vec()));
        assert_eq!(out, hex::decode("83646f67").unwrap());
    }

    #[test]
    fn encodes_short_list_of_strings() {
        let item = RlpItem::List(vec![
            RlpItem::Bytes(b"cat".to_vec()),
            RlpItem::Bytes(b"dog".to_vec()),
        ]);
        let out = encode(&item);
        assert_eq!(out, hex::decode("c88363617483646f67").unwrap());
    }

    #[test]
    fn encodes_empty_list() {
        assert_eq!(encode(&RlpItem::List(vec![])), vec![0xc0]);
    }

    #[test]
    fn round_trips_long_string() {
        let data = vec![0x42u8; 1024];
        let item = RlpItem::Bytes(data.clone());
        let encoded = encode(&item);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, item);
        assert_eq!(Vec::<u8>::rlp_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn round_trips_nested_lists() {
        let item = RlpItem::List(vec![
            RlpItem::Bytes(vec![]),
            RlpItem::List(vec![RlpItem::Bytes(vec![0x01])]),
            RlpItem::List(vec![]),
        ]);
        let encoded = encode(&item);
        assert_eq!(decode(&encoded).unwrap(), item);
    }

    #[test]
    fn rejects_trailing_bytes_on_strict_decode() {
        let mut encoded = encode(&RlpItem::Bytes(b"dog".to_vec()));
        encoded.push(0xff);
        assert!(Vec::<u8>::rlp_decode(&encoded).is_err());
    }

    #[test]
    fn u64_round_trips_and_rejects_leading_zero() {
        let n: u64 = 1_000_000_007;
        let encoded = n.rlp_append();
        let bytes = encode(&encoded);
        assert_eq!(u64::rlp_decode(&bytes).unwrap(), n);

        let malformed = RlpItem::Bytes(vec![0x00, 0x01]);
        assert!(u64::rlp_parse(&malformed).is_err());
    }

    #[test]
    fn zero_encodes_as_empty_string_not_zero_byte() {
        assert_eq!(encode(&0u64.rlp_append()), vec![0x80]);
    }
}
