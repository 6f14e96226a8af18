//! Transparent address derivation from an extended public key
//!
//! Contribution addresses live on the external chain `m/0/{index}` below the
//! configured xpub and are encoded as Zcash P2PKH (`t1...` / `tm...`).

use bitcoin::bip32::{ChildNumber, Xpub};
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::PublicKey;
use std::str::FromStr;

use crate::error::DeriveError;

/// Largest index usable for non-hardened derivation
pub const MAX_INDEX: u32 = (1 << 31) - 1;

/// Zcash network selector for address encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Map a node chain name (`main`, `test`, `regtest`) to an address network
    pub fn from_chain(chain: &str) -> Result<Self, DeriveError> {
        if chain.is_empty() {
            return Err(DeriveError::EmptyChain);
        }
        if chain.contains("test") {
            Ok(Network::Testnet)
        } else {
            Ok(Network::Mainnet)
        }
    }

    /// Two-byte base58check version prefix for transparent P2PKH addresses
    fn p2pkh_prefix(&self) -> [u8; 2] {
        match self {
            Network::Mainnet => [0x1c, 0xb8],
            Network::Testnet => [0x1d, 0x25],
        }
    }
}

/// HD path recorded on a contribution derived at `index`
pub fn contribution_path(index: u32) -> String {
    format!("m/0/{}", index)
}

/// Derive the transparent address at `m/0/{index}` below `xpub`
///
/// The network embedded in the xpub is ignored; `network` alone decides the
/// address encoding.
pub fn derive_transparent_address(
    xpub: &str,
    index: u32,
    network: Network,
) -> Result<String, DeriveError> {
    if index > MAX_INDEX {
        return Err(DeriveError::IndexOutOfRange(index));
    }
    let root = Xpub::from_str(xpub.trim()).map_err(|e| DeriveError::InvalidXpub(e.to_string()))?;
    let secp = Secp256k1::verification_only();

    let external_child =
        ChildNumber::from_normal_idx(0).map_err(|e| DeriveError::Derivation(e.to_string()))?;
    let child_number = ChildNumber::from_normal_idx(index)
        .map_err(|_| DeriveError::IndexOutOfRange(index))?;

    let derived = root
        .derive_pub(&secp, &[external_child, child_number])
        .map_err(|e| DeriveError::Derivation(e.to_string()))?;

    let pubkey_hash = PublicKey::new(derived.public_key).pubkey_hash();

    let mut payload = Vec::with_capacity(22);
    payload.extend_from_slice(&network.p2pkh_prefix());
    payload.extend_from_slice(&pubkey_hash.to_byte_array());

    Ok(bitcoin::base58::encode_check(&payload))
}

/// Derive the address and path pair for one contribution index
pub fn derive_contribution(
    xpub: &str,
    index: u32,
    network: Network,
) -> Result<(String, String), DeriveError> {
    let address = derive_transparent_address(xpub, index, network)?;
    Ok((address, contribution_path(index)))
}
