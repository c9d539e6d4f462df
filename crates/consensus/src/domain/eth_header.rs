//! The wire-format block header: every field the reference chain RLP-encodes
//! and hashes.

use primitive_types::U256;
use rlp::{decode_list, encode_list, Decodable, Encodable, RlpError, RlpItem};

use super::eth_transaction::EthTransaction;

/// 256-byte / 2048-bit logs bloom filter, embedded verbatim in the header.
pub type LogsBloom = [u8; 256];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EthHeader {
    pub parent_hash: [u8; 32],
    pub ommers_hash: [u8; 32],
    pub beneficiary: [u8; 20],
    pub state_root: [u8; 32],
    pub transactions_root: [u8; 32],
    pub receipts_root: [u8; 32],
    pub logs_bloom: LogsBloom,
    pub difficulty: U256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Vec<u8>,
    pub mix_hash: [u8; 32],
    pub nonce: [u8; 8],
}

impl EthHeader {
    /// The canonical header hash: `Keccak(RLP(header))`.
    pub fn hash(&self) -> [u8; 32] {
        shared_crypto::keccak256(&self.rlp_bytes())
    }
}

impl Encodable for EthHeader {
    fn rlp_append(&self) -> RlpItem {
        RlpItem::List(vec![
            RlpItem::Bytes(self.parent_hash.to_vec()),
            RlpItem::Bytes(self.ommers_hash.to_vec()),
            RlpItem::Bytes(self.beneficiary.to_vec()),
            RlpItem::Bytes(self.state_root.to_vec()),
            RlpItem::Bytes(self.transactions_root.to_vec()),
            RlpItem::Bytes(self.receipts_root.to_vec()),
            RlpItem::Bytes(self.logs_bloom.to_vec()),
            self.difficulty.rlp_append(),
            self.number.rlp_append(),
            self.gas_limit.rlp_append(),
            self.gas_used.rlp_append(),
            self.timestamp.rlp_append(),
            RlpItem::Bytes(self.extra_data.clone()),
            RlpItem::Bytes(self.mix_hash.to_vec()),
            RlpItem::Bytes(self.nonce.to_vec()),
        ])
    }
}

impl Decodable for EthHeader {
    fn rlp_parse(item: &RlpItem) -> Result<Self, RlpError> {
        let fields = match item {
            RlpItem::List(fields) => fields,
            RlpItem::Bytes(_) => return Err(RlpError::UnexpectedString),
        };
        if fields.len() != 15 {
            return Err(RlpError::SizeOverflow);
        }

        Ok(EthHeader {
            parent_hash: fixed_bytes(&fields[0])?,
            ommers_hash: fixed_bytes(&fields[1])?,
            beneficiary: fixed_bytes(&fields[2])?,
            state_root: fixed_bytes(&fields[3])?,
            transactions_root: fixed_bytes(&fields[4])?,
            receipts_root: fixed_bytes(&fields[5])?,
            logs_bloom: fixed_bytes(&fields[6])?,
            difficulty: U256::rlp_parse(&fields[7])?,
            number: u64::rlp_parse(&fields[8])?,
            gas_limit: u64::rlp_parse(&fields[9])?,
            gas_used: u64::rlp_parse(&fields[10])?,
            timestamp: u64::rlp_parse(&fields[11])?,
            extra_data: Vec::<u8>::rlp_parse(&fields[12])?,
            mix_hash: fixed_bytes(&fields[13])?,
            nonce: fixed_bytes(&fields[14])?,
        })
    }
}

fn fixed_bytes<const N: usize>(item: &RlpItem) -> Result<[u8; N], RlpError> {
    let bytes = match item {
        RlpItem::Bytes(b) => b,
        RlpItem::List(_) => return Err(RlpError::UnexpectedList),
    };
    bytes.as_slice().try_into().map_err(|_| RlpError::SizeOverflow)
}

/// A header together with its ommers and transaction bodies - the unit the
/// sync loop downloads and the state layer applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EthBlock {
    pub header: EthHeader,
    pub transactions: Vec<EthTransaction>,
    pub ommers: Vec<EthHeader>,
}

impl Encodable for EthBlock {
    fn rlp_append(&self) -> RlpItem {
        RlpItem::List(vec![
            self.header.rlp_append(),
            encode_list(&self.transactions),
            encode_list(&self.ommers),
        ])
    }
}

impl Decodable for EthBlock {
    fn rlp_parse(item: &RlpItem) -> Result<Self, RlpError> {
        let fields = match item {
            RlpItem::List(fields) => fields,
            RlpItem::Bytes(_) => return Err(RlpError::UnexpectedString),
        };
        if fields.len() != 3 {
            return Err(RlpError::SizeOverflow);
        }
        Ok(EthBlock {
            header: EthHeader::rlp_parse(&fields[0])?,
            transactions: decode_list(&fields[1])?,
            ommers: decode_list(&fields[2])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> EthHeader {
        EthHeader {
            parent_hash: [0x11; 32],
            ommers_hash: [0x22; 32],
            beneficiary: [0x33; 20],
            state_root: [0x44; 32],
            transactions_root: [0x55; 32],
            receipts_root: [0x66; 32],
            logs_bloom: [0u8; 256],
            difficulty: U256::from(131_072u64),
            number: 1,
            gas_limit: 200_000,
            gas_used: 0,
            timestamp: 65,
            extra_data: vec![],
            mix_hash: [0x77; 32],
            nonce: [0u8; 8],
        }
    }

    #[test]
    fn header_round_trips_through_rlp() {
        let header = sample_header();
        let bytes = header.rlp_bytes();
        let decoded = EthHeader::rlp_decode(&bytes).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_hash_is_keccak_of_rlp() {
        let header = sample_header();
        assert_eq!(header.hash(), shared_crypto::keccak256(&header.rlp_bytes()));
    }

    #[test]
    fn block_round_trips_with_empty_bodies() {
        let block = EthBlock {
            header: sample_header(),
            transactions: vec![],
            ommers: vec![],
        };
        let bytes = block.rlp_bytes();
        assert_eq!(EthBlock::rlp_decode(&bytes).unwrap(), block);
    }
}
