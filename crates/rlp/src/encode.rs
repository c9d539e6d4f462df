use crate::item::RlpItem;

/// Encode an RLP item tree to its canonical byte representation.
pub fn encode(item: &RlpItem) -> Vec<u8> {
    match item {
        RlpItem::Bytes(data) => encode_bytes(data),
        RlpItem::List(items) => encode_list(items),
    }
}

fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else if data.len() < 56 {
        let mut out = Vec::with_capacity(1 + data.len());
        out.push(0x80 + data.len() as u8);
        out.extend_from_slice(data);
        out
    } else {
        let len_bytes = encode_length(data.len());
        let mut out = Vec::with_capacity(1 + len_bytes.len() + data.len());
        out.push(0xb7 + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(data);
        out
    }
}

fn encode_list(items: &[RlpItem]) -> Vec<u8> {
    let encoded_items: Vec<Vec<u8>> = items.iter().map(encode).collect();
    let payload_len: usize = encoded_items.iter().map(Vec::len).sum();

    let mut out = Vec::with_capacity(payload_len + 9);
    if payload_len < 56 {
        out.push(0xc0 + payload_len as u8);
    } else {
        let len_bytes = encode_length(payload_len);
        out.push(0xf7 + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
    }
    for encoded in encoded_items {
        out.extend(encoded);
    }
    out
}

/// Encode a length as the minimal big-endian byte representation (no
/// leading zero byte, per the canonical RLP length-prefix rule).
fn encode_length(len: usize) -> Vec<u8> {
    let bytes = len.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    bytes[start..].to_vec()
}
