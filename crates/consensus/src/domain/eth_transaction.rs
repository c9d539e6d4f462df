//! Signed transactions: wire encoding, intrinsic gas, and sender recovery.
//!
//! This sits alongside [`crate::domain::block::SignedTransaction`] (the
//! PoS-era shape with a single opaque signature blob) rather than replacing
//! it, since the attestation pipeline in `service.rs` still depends on that
//! type; this one carries the split `v, r, s` the reference chain actually
//! signs and verifies.

use primitive_types::U256;
use rlp::{Decodable, Encodable, RlpError, RlpItem};
use shared_crypto::ecdsa::{recover_address, Secp256k1RecoverableSignature};
use shared_crypto::keccak256;

/// secp256k1 curve order, used for the post-Homestead low-s check (EIP-2).
const SECP256K1_N: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

fn secp256k1_half_n() -> U256 {
    U256::from_big_endian(&SECP256K1_N) / U256::from(2u64)
}

/// `to = None` for a contract-creation transaction (the payload is then
/// `init_code` rather than call `data`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EthTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Option<[u8; 20]>,
    pub value: U256,
    pub data: Vec<u8>,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    InvalidSignature,
    HighS,
    RecoveryFailed,
}

impl EthTransaction {
    /// The 9-field signing-form RLP list (pre-EIP-155, `chain_id = None`) or
    /// the 9-field list with `v = chain_id, 0, 0` appended for signing per
    /// EIP-155 - used both to produce the hash a sender signs and the hash
    /// recovery is performed against.
    fn signing_rlp(&self, chain_id: Option<u64>) -> RlpItem {
        let mut fields = vec![
            self.nonce.rlp_append(),
            self.gas_price.rlp_append(),
            self.gas_limit.rlp_append(),
            match &self.to {
                Some(addr) => RlpItem::Bytes(addr.to_vec()),
                None => RlpItem::Bytes(vec![]),
            },
            self.value.rlp_append(),
            RlpItem::Bytes(self.data.clone()),
        ];
        if let Some(chain_id) = chain_id {
            fields.push(chain_id.rlp_append());
            fields.push(RlpItem::Bytes(vec![]));
            fields.push(RlpItem::Bytes(vec![]));
        }
        RlpItem::List(fields)
    }

    /// Chain id encoded in `v`, if this transaction uses EIP-155 replay
    /// protection (`v` is `27`/`28` otherwise).
    pub fn chain_id(&self) -> Option<u64> {
        if self.v >= 35 {
            Some((self.v - 35) / 2)
        } else {
            None
        }
    }

    fn recovery_id(&self) -> u8 {
        match self.chain_id() {
            Some(chain_id) => (self.v - (chain_id * 2 + 35)) as u8,
            None => (self.v - 27) as u8,
        }
    }

    /// Hash over which the signature was produced (signing-form RLP).
    pub fn signing_hash(&self) -> [u8; 32] {
        let encoded = rlp::encode(&self.signing_rlp(self.chain_id()));
        keccak256(&encoded)
    }

    /// Require `s <= n/2` - the malleability rule post-Homestead.
    pub fn check_low_s(&self) -> Result<(), TransactionError> {
        if self.s > secp256k1_half_n() {
            return Err(TransactionError::HighS);
        }
        Ok(())
    }

    /// `v in {27, 28}` pre-EIP-155, `v in {chain_id*2+35, chain_id*2+36}`
    /// after, for the given chain.
    pub fn check_v_range(&self, expected_chain_id: u64) -> Result<(), TransactionError> {
        let valid = self.v == 27
            || self.v == 28
            || self.v == expected_chain_id * 2 + 35
            || self.v == expected_chain_id * 2 + 36;
        if valid {
            Ok(())
        } else {
            Err(TransactionError::InvalidSignature)
        }
    }

    /// Recover the sender's address from `(v, r, s)` over the signing hash.
    pub fn recover_sender(&self) -> Result<[u8; 20], TransactionError> {
        self.check_low_s()?;

        let mut rs = [0u8; 64];
        self.r.to_big_endian(&mut rs[..32]);
        self.s.to_big_endian(&mut rs[32..]);

        let signature = Secp256k1RecoverableSignature::from_parts(rs, self.recovery_id())
            .map_err(|_| TransactionError::InvalidSignature)?;

        recover_address(&self.signing_hash(), &signature)
            .map_err(|_| TransactionError::RecoveryFailed)
    }

    /// `21000` base + `32000` if this is a contract creation + per-byte data
    /// cost (`4` per zero byte, `16` per non-zero byte post-EIP-2028, `68`
    /// before it).
    pub fn intrinsic_gas(&self, is_contract_creation: bool, eip_2028: bool) -> u64 {
        const BASE_GAS: u64 = 21_000;
        const CREATION_GAS: u64 = 32_000;
        let zero_cost = 4u64;
        let nonzero_cost = if eip_2028 { 16u64 } else { 68u64 };

        let mut gas = BASE_GAS;
        if is_contract_creation {
            gas += CREATION_GAS;
        }
        for &byte in &self.data {
            gas += if byte == 0 { zero_cost } else { nonzero_cost };
        }
        gas
    }
}

impl Encodable for EthTransaction {
    fn rlp_append(&self) -> RlpItem {
        RlpItem::List(vec![
            self.nonce.rlp_append(),
            self.gas_price.rlp_append(),
            self.gas_limit.rlp_append(),
            match &self.to {
                Some(addr) => RlpItem::Bytes(addr.to_vec()),
                None => RlpItem::Bytes(vec![]),
            },
            self.value.rlp_append(),
            RlpItem::Bytes(self.data.clone()),
            self.v.rlp_append(),
            self.r.rlp_append(),
            self.s.rlp_append(),
        ])
    }
}

impl Decodable for EthTransaction {
    fn rlp_parse(item: &RlpItem) -> Result<Self, RlpError> {
        let fields = match item {
            RlpItem::List(fields) => fields,
            RlpItem::Bytes(_) => return Err(RlpError::UnexpectedString),
        };
        if fields.len() != 9 {
            return Err(RlpError::SizeOverflow);
        }

        let to = match &fields[3] {
            RlpItem::Bytes(b) if b.is_empty() => None,
            RlpItem::Bytes(b) => Some(b.as_slice().try_into().map_err(|_| RlpError::SizeOverflow)?),
            RlpItem::List(_) => return Err(RlpError::UnexpectedList),
        };

        Ok(EthTransaction {
            nonce: u64::rlp_parse(&fields[0])?,
            gas_price: U256::rlp_parse(&fields[1])?,
            gas_limit: u64::rlp_parse(&fields[2])?,
            to,
            value: U256::rlp_parse(&fields[4])?,
            data: Vec::<u8>::rlp_parse(&fields[5])?,
            v: u64::rlp_parse(&fields[6])?,
            r: U256::rlp_parse(&fields[7])?,
            s: U256::rlp_parse(&fields[8])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::ecdsa::Secp256k1KeyPair;

    fn signed_transaction(
        keypair: &Secp256k1KeyPair,
        nonce: u64,
        to: Option<[u8; 20]>,
        data: Vec<u8>,
        chain_id: Option<u64>,
    ) -> EthTransaction {
        let mut tx = EthTransaction {
            nonce,
            gas_price: U256::from(1_000_000_000u64),
            gas_limit: 21_000,
            to,
            value: U256::zero(),
            data,
            v: 0,
            r: U256::zero(),
            s: U256::zero(),
        };

        let hash = {
            let encoded = rlp::encode(&tx.signing_rlp(chain_id));
            keccak256(&encoded)
        };
        let sig = keypair.sign_recoverable(&hash);
        tx.r = U256::from_big_endian(&sig.rs_bytes()[..32]);
        tx.s = U256::from_big_endian(&sig.rs_bytes()[32..]);
        tx.v = match chain_id {
            Some(id) => id * 2 + 35 + sig.recovery_id() as u64,
            None => 27 + sig.recovery_id() as u64,
        };
        tx
    }

    #[test]
    fn recovers_sender_for_legacy_signature() {
        let keypair = Secp256k1KeyPair::generate();
        let tx = signed_transaction(&keypair, 0, Some([0xAB; 20]), vec![], None);

        let sender = tx.recover_sender().unwrap();
        assert_eq!(sender, keypair.public_key().to_ethereum_address().unwrap());
    }

    #[test]
    fn recovers_sender_for_eip155_signature() {
        let keypair = Secp256k1KeyPair::generate();
        let tx = signed_transaction(&keypair, 3, Some([0xCD; 20]), vec![], Some(1));

        assert_eq!(tx.chain_id(), Some(1));
        let sender = tx.recover_sender().unwrap();
        assert_eq!(sender, keypair.public_key().to_ethereum_address().unwrap());
    }

    #[test]
    fn high_s_signature_is_rejected() {
        let keypair = Secp256k1KeyPair::generate();
        let mut tx = signed_transaction(&keypair, 0, Some([0xAB; 20]), vec![], None);

        tx.s = U256::from_big_endian(&SECP256K1_N) - tx.s;
        assert_eq!(tx.recover_sender(), Err(TransactionError::HighS));
    }

    #[test]
    fn v_range_accepts_legacy_and_eip155_forms() {
        let keypair = Secp256k1KeyPair::generate();
        let legacy = signed_transaction(&keypair, 0, Some([0xAB; 20]), vec![], None);
        assert!(legacy.check_v_range(1).is_ok());

        let eip155 = signed_transaction(&keypair, 0, Some([0xAB; 20]), vec![], Some(1));
        assert!(eip155.check_v_range(1).is_ok());
        assert!(eip155.check_v_range(5).is_err());
    }

    #[test]
    fn intrinsic_gas_counts_zero_and_nonzero_bytes_post_eip2028() {
        let tx = EthTransaction {
            nonce: 0,
            gas_price: U256::zero(),
            gas_limit: 0,
            to: Some([0u8; 20]),
            value: U256::zero(),
            data: vec![0x00, 0x00, 0x01, 0x02],
            v: 0,
            r: U256::zero(),
            s: U256::zero(),
        };

        // base 21000 + 2 zero bytes * 4 + 2 nonzero bytes * 16
        assert_eq!(tx.intrinsic_gas(false, true), 21_000 + 8 + 32);
    }

    #[test]
    fn intrinsic_gas_adds_creation_cost() {
        let tx = EthTransaction {
            nonce: 0,
            gas_price: U256::zero(),
            gas_limit: 0,
            to: None,
            value: U256::zero(),
            data: vec![],
            v: 0,
            r: U256::zero(),
            s: U256::zero(),
        };

        assert_eq!(tx.intrinsic_gas(true, true), 21_000 + 32_000);
    }
}
