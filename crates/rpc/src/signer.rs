//! Local key management and EIP-1559 transaction signing.

use ethereum_types::{Address, H256, U256};
use rlp::RlpStream;
use secp256k1::{Message, PublicKey, SECP256K1, SecretKey};
use sha3::{Digest, Keccak256};

use crate::error::SignerError;

pub fn keccak(data: &[u8]) -> H256 {
    H256(Keccak256::digest(data).into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Call(Address),
    Create,
}

/// Unsigned type-2 transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u64,
    pub max_fee_per_gas: u64,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Vec<u8>,
}

impl Eip1559Transaction {
    fn append_payload(&self, stream: &mut RlpStream) {
        stream.append(&self.chain_id);
        stream.append(&self.nonce);
        stream.append(&self.max_priority_fee_per_gas);
        stream.append(&self.max_fee_per_gas);
        stream.append(&self.gas_limit);
        match self.to {
            TxKind::Call(address) => stream.append(&address),
            TxKind::Create => stream.append_empty_data(),
        };
        stream.append(&self.value);
        stream.append(&self.data);
        // access list
        stream.begin_list(0);
    }

    /// `keccak256(0x02 || rlp(payload))`
    pub fn signing_hash(&self) -> H256 {
        let mut stream = RlpStream::new_list(9);
        self.append_payload(&mut stream);
        let mut buf = vec![0x02u8];
        buf.extend_from_slice(&stream.out());
        keccak(&buf)
    }
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: H256,
    pub raw: Vec<u8>,
}

#[derive(Clone)]
pub struct Signer {
    secret: SecretKey,
    address: Address,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(secret: SecretKey) -> Self {
        let public = PublicKey::from_secret_key(SECP256K1, &secret);
        let hash = keccak(&public.serialize_uncompressed()[1..]);
        Self {
            secret,
            address: Address::from_slice(&hash[12..]),
        }
    }

    /// Parse a hex-encoded private key, with or without `0x`.
    pub fn from_hex(raw: &str) -> Result<Self, SignerError> {
        let trimmed = raw.trim();
        let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let secret =
            SecretKey::from_slice(&bytes).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::new(secret))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign(&self, tx: &Eip1559Transaction) -> Result<SignedTransaction, SignerError> {
        let digest = tx.signing_hash();
        let (recovery_id, signature) = SECP256K1
            .sign_ecdsa_recoverable(&Message::from_digest(digest.0), &self.secret)
            .serialize_compact();
        let y_parity: u8 = Into::<i32>::into(recovery_id)
            .try_into()
            .map_err(|e| SignerError::RecoveryId(format!("{e}")))?;

        let r = U256::from_big_endian(&signature[..32]);
        let s = U256::from_big_endian(&signature[32..64]);

        let mut stream = RlpStream::new_list(12);
        tx.append_payload(&mut stream);
        stream.append(&y_parity);
        stream.append(&r);
        stream.append(&s);

        let mut raw = vec![0x02u8];
        raw.extend_from_slice(&stream.out());
        Ok(SignedTransaction {
            hash: keccak(&raw),
            raw,
        })
    }
}
