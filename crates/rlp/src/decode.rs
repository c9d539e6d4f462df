use crate::error::RlpError;
use crate::item::RlpItem;

/// Decode a single RLP item, rejecting any trailing bytes.
pub fn decode(data: &[u8]) -> Result<RlpItem, RlpError> {
    let (item, rest) = decode_one(data)?;
    if !rest.is_empty() {
        return Err(RlpError::TrailingBytes);
    }
    Ok(item)
}

/// Decode one RLP item from the front of `data`, returning it along with
/// whatever bytes follow it. Used internally for recursing into lists and
/// exposed for callers that stream several concatenated items (e.g. frame
/// payloads that carry a message id followed by its RLP body).
pub fn decode_one(data: &[u8]) -> Result<(RlpItem, &[u8]), RlpError> {
    let prefix = *data.first().ok_or(RlpError::InputTooShort)?;

    match prefix {
        0x00..=0x7f => Ok((RlpItem::Bytes(vec![prefix]), &data[1..])),

        0x80..=0xb7 => {
            let len = (prefix - 0x80) as usize;
            let (payload, rest) = take(&data[1..], len)?;
            if len == 1 && payload[0] < 0x80 {
                return Err(RlpError::NonCanonicalSize);
            }
            Ok((RlpItem::Bytes(payload.to_vec()), rest))
        }

        0xb8..=0xbf => {
            let len_of_len = (prefix - 0xb7) as usize;
            let (len_bytes, after_len) = take(&data[1..], len_of_len)?;
            let len = decode_length(len_bytes)?;
            if len < 56 {
                return Err(RlpError::NonCanonicalLength);
            }
            let (payload, rest) = take(after_len, len)?;
            Ok((RlpItem::Bytes(payload.to_vec()), rest))
        }

        0xc0..=0xf7 => {
            let len = (prefix - 0xc0) as usize;
            let (payload, rest) = take(&data[1..], len)?;
            Ok((RlpItem::List(decode_items(payload)?), rest))
        }

        0xf8..=0xff => {
            let len_of_len = (prefix - 0xf7) as usize;
            let (len_bytes, after_len) = take(&data[1..], len_of_len)?;
            let len = decode_length(len_bytes)?;
            if len < 56 {
                return Err(RlpError::NonCanonicalLength);
            }
            let (payload, rest) = take(after_len, len)?;
            Ok((RlpItem::List(decode_items(payload)?), rest))
        }
    }
}

fn decode_items(mut payload: &[u8]) -> Result<Vec<RlpItem>, RlpError> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, rest) = decode_one(payload)?;
        items.push(item);
        payload = rest;
    }
    Ok(items)
}

fn take(data: &[u8], len: usize) -> Result<(&[u8], &[u8]), RlpError> {
    if data.len() < len {
        return Err(RlpError::InputTooShort);
    }
    Ok(data.split_at(len))
}

fn decode_length(bytes: &[u8]) -> Result<usize, RlpError> {
    if bytes.is_empty() {
        return Err(RlpError::InputTooShort);
    }
    if bytes[0] == 0 {
        return Err(RlpError::LeadingZero);
    }
    if bytes.len() > std::mem::size_of::<usize>() {
        return Err(RlpError::SizeOverflow);
    }
    let mut buf = [0u8; std::mem::size_of::<usize>()];
    buf[std::mem::size_of::<usize>() - bytes.len()..].copy_from_slice(bytes);
    Ok(usize::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_prefix_rejects_redundant_short_form() {
        // 0x81 0x00 encodes the single byte 0x00, which should have been
        // encoded as just 0x00.
        assert_eq!(decode(&[0x81, 0x00]), Err(RlpError::NonCanonicalSize));
    }

    #[test]
    fn rejects_truncated_length_prefix() {
        assert_eq!(decode(&[0xb8, 0x05, 0x01, 0x02]), Err(RlpError::InputTooShort));
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(decode(&[]), Err(RlpError::InputTooShort));
    }
}
